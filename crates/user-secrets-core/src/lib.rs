//! user-secrets core - Shared functionality for the user-secrets tool
//!
//! Secrets for local development live outside the project tree, one store
//! per identifier, under the per-user configuration directory.

pub mod config;
pub mod format;
pub mod paths;

pub use config::Config;
pub use paths::Paths;
