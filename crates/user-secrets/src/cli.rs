//! CLI definitions and the resolve, load, dispatch pipeline

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

use user_secrets::dispatch::parse_json_input;
use user_secrets::{execute, Command, CommandContext, ProjectIdResolver, Reporter, SecretStore};
use user_secrets_core::{Config, Paths};

#[derive(Parser)]
#[command(name = "user-secrets")]
#[command(about = "Manage development secrets stored outside the project tree")]
#[command(version)]
#[command(after_help = r#"IDENTIFYING THE STORE:
    --id wins when given. Otherwise the UserSecretsId property is read from
    the project file in the current directory (or --project), following its
    imports and the nearest Directory.Build.props.

STORAGE:
    ~/.config/user-secrets/stores/<id>/secrets.json
    Override the root with USER_SECRETS_ROOT or "store_root" in
    ~/.config/user-secrets/config.json. Values are NOT encrypted.

EXAMPLES:
    user-secrets set "ConnectionStrings:Default" "Server=localhost"
    cat secrets.json | user-secrets set
    user-secrets list --json
    user-secrets --id my-app-dev remove Api:Key"#)]
pub struct Cli {
    /// User secrets id to use instead of the project's UserSecretsId
    #[arg(long, global = true)]
    pub id: Option<String>,

    /// Project file, or directory containing exactly one project file
    #[arg(short, long, global = true)]
    pub project: Option<PathBuf>,

    /// Build configuration used to evaluate the project file
    #[arg(short, long, global = true)]
    pub configuration: Option<String>,

    /// Show diagnostic output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set a secret (or read a JSON object from stdin when no name is given)
    Set {
        /// Secret name (e.g., ConnectionStrings:Default)
        #[arg(requires = "value")]
        name: Option<String>,
        /// Secret value
        value: Option<String>,
    },

    /// Remove a secret
    Remove {
        /// Secret name
        name: String,
    },

    /// List all secrets
    List {
        /// Output as JSON between //BEGIN and //END markers
        #[arg(long)]
        json: bool,
    },

    /// Remove every secret in the store
    Clear,
}

/// Resolve the store, load it, and run the requested command
pub fn run(cli: Cli, reporter: &dyn Reporter) -> Result<()> {
    let base = Paths::new();
    let config = Config::load(&base.config_file())?;
    let paths = config.apply_env(base);

    let working_dir = std::env::current_dir().context("Failed to get current directory")?;
    let id = resolve_id(&cli, &config, &working_dir)?;
    debug!("Using user secrets id {}", id);

    let command = into_command(cli.command)?;

    let mut store = SecretStore::load(&paths, &id)?;
    execute(
        command,
        CommandContext {
            store: &mut store,
            reporter,
            mask_values: config.mask_values,
        },
    )?;

    Ok(())
}

fn resolve_id(cli: &Cli, config: &Config, working_dir: &Path) -> Result<String> {
    let resolver = ProjectIdResolver::new(working_dir, config);
    let id = resolver.resolve(
        cli.id.as_deref(),
        cli.project.as_deref(),
        cli.configuration.as_deref(),
    )?;
    Ok(id)
}

fn into_command(command: Commands) -> Result<Command> {
    Ok(match command {
        Commands::Set {
            name: Some(name),
            value: Some(value),
        } => Command::Set { name, value },
        Commands::Set { .. } => Command::SetMany(read_stdin_pairs()?),
        Commands::Remove { name } => Command::Remove { name },
        Commands::List { json } => Command::List { json },
        Commands::Clear => Command::Clear,
    })
}

fn read_stdin_pairs() -> Result<Vec<(String, String)>> {
    let mut stdin = std::io::stdin();
    if stdin.is_terminal() {
        bail!("Usage: user-secrets set <NAME> <VALUE>, or pipe a JSON object into 'user-secrets set'");
    }

    let mut input = String::new();
    stdin
        .read_to_string(&mut input)
        .context("Failed to read JSON from stdin")?;

    Ok(parse_json_input(&input)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse() {
        let cli = Cli::try_parse_from(["user-secrets", "set", "Foo:Bar", "1"]).unwrap();
        if let Commands::Set { name, value } = cli.command {
            assert_eq!(name.as_deref(), Some("Foo:Bar"));
            assert_eq!(value.as_deref(), Some("1"));
        } else {
            panic!("Expected Set command");
        }

        let cli = Cli::try_parse_from(["user-secrets", "remove", "Foo:Bar"]).unwrap();
        assert!(matches!(cli.command, Commands::Remove { ref name } if name == "Foo:Bar"));

        let cli = Cli::try_parse_from(["user-secrets", "list", "--json"]).unwrap();
        assert!(matches!(cli.command, Commands::List { json: true }));

        let cli = Cli::try_parse_from(["user-secrets", "clear"]).unwrap();
        assert!(matches!(cli.command, Commands::Clear));
    }

    #[test]
    fn test_cli_global_options() {
        let cli = Cli::try_parse_from([
            "user-secrets",
            "list",
            "--id",
            "my-id",
            "-p",
            "src/app",
            "-c",
            "Release",
            "-v",
        ])
        .unwrap();

        assert_eq!(cli.id.as_deref(), Some("my-id"));
        assert_eq!(cli.project, Some(PathBuf::from("src/app")));
        assert_eq!(cli.configuration.as_deref(), Some("Release"));
        assert!(cli.verbose);
    }

    #[test]
    fn test_cli_set_needs_value() {
        assert!(Cli::try_parse_from(["user-secrets", "set", "OnlyName"]).is_err());

        let cli = Cli::try_parse_from(["user-secrets", "set"]).unwrap();
        assert!(matches!(cli.command, Commands::Set { name: None, value: None }));
    }

    #[test]
    fn test_into_command() {
        let command = into_command(Commands::Remove {
            name: "a".to_string(),
        })
        .unwrap();
        assert_eq!(command, Command::Remove { name: "a".to_string() });

        let command = into_command(Commands::Set {
            name: Some("a".to_string()),
            value: Some(String::new()),
        })
        .unwrap();
        assert_eq!(
            command,
            Command::Set {
                name: "a".to_string(),
                value: String::new()
            }
        );
    }

    #[test]
    fn test_resolve_id_prefers_explicit() {
        let cli = Cli::try_parse_from(["user-secrets", "--id", "explicit", "clear"]).unwrap();
        let id = resolve_id(&cli, &Config::default(), Path::new("/no/such/dir")).unwrap();
        assert_eq!(id, "explicit");
    }
}
