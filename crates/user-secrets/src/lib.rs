//! user-secrets - Per-project secrets for local development
//!
//! "Secrets belong next to the project, not inside it."
//!
//! A project names its store with a `UserSecretsId` property. Secrets for
//! that id live in `~/.config/user-secrets/stores/<id>/secrets.json`, well
//! away from version control. Values are stored as plain JSON: this keeps
//! secrets out of the repository, it does not encrypt them.

pub mod condition;
pub mod dispatch;
pub mod error;
pub mod project;
pub mod reporter;
pub mod resolver;
pub mod store;

pub use dispatch::{execute, Command, CommandContext, CommandFailed};
pub use error::SecretsError;
pub use reporter::{ConsoleReporter, MemoryReporter, Reporter, Severity};
pub use resolver::ProjectIdResolver;
pub use store::SecretStore;
