//! user-secrets - Development secrets kept outside the project tree
//!
//! Commands:
//! - set <NAME> <VALUE>: Store a secret (JSON object on stdin when omitted)
//! - remove <NAME>: Remove a secret
//! - list [--json]: Show all secrets
//! - clear: Remove every secret

mod cli;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use user_secrets::{ConsoleReporter, Reporter};

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let reporter = ConsoleReporter::new(cli.verbose);

    if let Err(e) = cli::run(cli, &reporter) {
        reporter.error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
