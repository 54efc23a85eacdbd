//! Standard paths used by user-secrets

use std::path::PathBuf;

/// Environment variable that overrides the stores root
pub const ROOT_ENV_VAR: &str = "USER_SECRETS_ROOT";

/// Name of the durable artifact inside each store directory
pub const SECRETS_FILE_NAME: &str = "secrets.json";

/// Standard user-secrets paths
#[derive(Debug, Clone)]
pub struct Paths {
    /// Config directory (~/.config/user-secrets)
    pub config: PathBuf,
    /// Root of all per-identifier stores (~/.config/user-secrets/stores)
    pub stores: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

impl Paths {
    pub fn new() -> Self {
        let config = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("user-secrets");

        let stores = config.join("stores");

        Self { config, stores }
    }

    /// Paths rooted somewhere other than the user's config directory
    pub fn with_stores_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.stores = root.into();
        self
    }

    /// Path of the tool's own configuration file
    pub fn config_file(&self) -> PathBuf {
        self.config.join("config.json")
    }

    /// Directory holding the store for one identifier.
    ///
    /// The identifier is joined as a single component, so callers must
    /// validate it first (see `user_secrets::store::validate_id`).
    pub fn store_dir(&self, id: &str) -> PathBuf {
        self.stores.join(id)
    }

    /// Durable artifact for one identifier
    pub fn secrets_file(&self, id: &str) -> PathBuf {
        self.store_dir(id).join(SECRETS_FILE_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secrets_file_layout() {
        let paths = Paths::new().with_stores_root("/tmp/stores");
        assert_eq!(
            paths.secrets_file("abc-123"),
            PathBuf::from("/tmp/stores/abc-123/secrets.json")
        );
    }

    #[test]
    fn test_distinct_ids_distinct_files() {
        let paths = Paths::new().with_stores_root("/tmp/stores");
        assert_ne!(paths.secrets_file("Abc"), paths.secrets_file("abc"));
        assert!(paths.secrets_file("abc").starts_with(&paths.stores));
    }

    #[test]
    fn test_config_file_under_config_dir() {
        let paths = Paths::new();
        assert!(paths.config_file().starts_with(&paths.config));
        assert!(paths.stores.starts_with(&paths.config));
    }
}
