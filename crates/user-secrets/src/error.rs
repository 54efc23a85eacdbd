//! Error kinds surfaced by identity resolution and the secret store

use std::path::PathBuf;
use thiserror::Error;

/// Every way a user-secrets operation can fail.
///
/// Removing a name that is not present is deliberately absent: it is a
/// warning, not a failure.
#[derive(Error, Debug)]
pub enum SecretsError {
    #[error("Could not find a project file in '{0}'. Use --project to specify one")]
    ProjectNotFound(PathBuf),

    #[error("Multiple project files found in '{dir}': {}. Use --project to pick one", names.join(", "))]
    AmbiguousProject { dir: PathBuf, names: Vec<String> },

    #[error("Could not find the UserSecretsId property in '{0}' or its imports. Add a UserSecretsId to the project or pass --id")]
    MissingIdentifier(PathBuf),

    #[error("Could not read project file '{path}': {reason}")]
    ProjectUnreadable { path: PathBuf, reason: String },

    #[error("Invalid secret name: {0}")]
    InvalidName(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid user secrets id '{id}': {reason}")]
    InvalidIdentifier { id: String, reason: String },

    #[error("Secret store '{path}' is corrupt: {reason}")]
    StoreCorrupt { path: PathBuf, reason: String },

    #[error("Failed to save secret store '{path}': {source}")]
    StorePersistFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, SecretsError>;
