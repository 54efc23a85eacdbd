//! Commands that operate on a loaded secret store
//!
//! Each command applies all of its mutations, then saves once. A failure
//! part way through returns before the save, so the file on disk never
//! holds half a command.

use serde_json::Value;
use thiserror::Error;
use user_secrets_core::format;

use crate::error::SecretsError;
use crate::reporter::Reporter;
use crate::store::SecretStore;

/// Marker lines around `list --json` output
pub const JSON_BEGIN: &str = "//BEGIN";
pub const JSON_END: &str = "//END";

/// A parsed command, ready to run
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Set one secret
    Set { name: String, value: String },
    /// Set many secrets at once (from a JSON document)
    SetMany(Vec<(String, String)>),
    /// Remove one secret
    Remove { name: String },
    /// Show every secret
    List { json: bool },
    /// Remove every secret
    Clear,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Set { .. } | Self::SetMany(_) => "set",
            Self::Remove { .. } => "remove",
            Self::List { .. } => "list",
            Self::Clear => "clear",
        }
    }
}

/// A store failure, tagged with the command that was running
#[derive(Error, Debug)]
#[error("Command '{command}' failed: {source}")]
pub struct CommandFailed {
    pub command: &'static str,
    #[source]
    pub source: SecretsError,
}

/// What a command gets to work with
pub struct CommandContext<'a> {
    pub store: &'a mut SecretStore,
    pub reporter: &'a dyn Reporter,
    /// Mask the value echoed back by `set`
    pub mask_values: bool,
}

/// Run `command` against the store in `ctx`
pub fn execute(command: Command, ctx: CommandContext<'_>) -> Result<(), CommandFailed> {
    let name = command.name();
    run(command, ctx).map_err(|source| CommandFailed {
        command: name,
        source,
    })
}

fn run(command: Command, ctx: CommandContext<'_>) -> Result<(), SecretsError> {
    let CommandContext {
        store,
        reporter,
        mask_values,
    } = ctx;

    reporter.verbose(&format!("Secrets file path {}", store.path().display()));

    match command {
        Command::Set { name, value } => {
            store.set(&name, &value)?;
            save(store, reporter)?;

            let shown = if mask_values {
                format::mask(&value)
            } else {
                value
            };
            reporter.output(&format!(
                "Successfully saved {} to the secret store.",
                format::pair(&name, &shown)
            ));
        }

        Command::SetMany(pairs) => {
            // Reject the whole batch before touching the store
            if pairs.iter().any(|(name, _)| name.is_empty()) {
                return Err(SecretsError::InvalidName(
                    "Name cannot be empty".to_string(),
                ));
            }

            for (name, value) in &pairs {
                store.set(name, value)?;
            }
            save(store, reporter)?;

            reporter.output(&format!(
                "Successfully saved {} secrets to the secret store.",
                pairs.len()
            ));
        }

        Command::Remove { name } => {
            if !store.remove(&name) {
                reporter.warn(&format!("A secret with the name '{}' was not found.", name));
            }
            save(store, reporter)?;
        }

        Command::List { json } => {
            if json {
                let map: serde_json::Map<String, Value> = store
                    .iter()
                    .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
                    .collect();
                let rendered = serde_json::to_string_pretty(&map)
                    .map_err(|e| SecretsError::InvalidInput(e.to_string()))?;

                reporter.output(JSON_BEGIN);
                reporter.output(&rendered);
                reporter.output(JSON_END);
            } else if store.is_empty() {
                reporter.output("No secrets configured for this application.");
            } else {
                for (name, value) in store.iter() {
                    reporter.output(&format::pair(name, value));
                }
            }
        }

        Command::Clear => {
            let removed = store.clear();
            save(store, reporter)?;
            reporter.output(&format!("Removed {} secrets from the secret store.", removed));
        }
    }

    Ok(())
}

fn save(store: &SecretStore, reporter: &dyn Reporter) -> Result<(), SecretsError> {
    store.save()?;
    reporter.verbose(&format!("Saved secrets to {}", store.path().display()));
    Ok(())
}

/// Flatten a JSON document into `name = value` pairs.
///
/// Nested keys are joined with `:` and array elements use their index,
/// so `{"Db": {"Hosts": ["a"]}}` becomes `Db:Hosts:0 = a`.
pub fn parse_json_input(input: &str) -> Result<Vec<(String, String)>, SecretsError> {
    let value: Value = serde_json::from_str(input.trim_start_matches('\u{feff}'))
        .map_err(|e| SecretsError::InvalidInput(format!("could not parse JSON: {}", e)))?;

    if !value.is_object() {
        return Err(SecretsError::InvalidInput(
            "expected a JSON object".to_string(),
        ));
    }

    let mut pairs = Vec::new();
    flatten("", &value, &mut pairs);
    Ok(pairs)
}

fn flatten(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
    let child = |key: &str| {
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", prefix, key)
        }
    };

    match value {
        Value::Object(map) => {
            for (key, value) in map {
                flatten(&child(key), value, out);
            }
        }
        Value::Array(items) => {
            for (index, value) in items.iter().enumerate() {
                flatten(&child(&index.to_string()), value, out);
            }
        }
        Value::String(s) => out.push((prefix.to_string(), s.clone())),
        Value::Number(n) => out.push((prefix.to_string(), n.to_string())),
        Value::Bool(b) => out.push((prefix.to_string(), b.to_string())),
        Value::Null => out.push((prefix.to_string(), String::new())),
    }
}
