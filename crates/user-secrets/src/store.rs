//! Secret store - one flat JSON object per user secrets id
//!
//! Each store lives at `<stores>/<id>/secrets.json`. The whole mapping is
//! loaded into memory, mutated, and written back in one piece with a
//! temp-file-then-rename so a reader never sees a half-written file.
//!
//! Concurrent writers are last-writer-wins: nothing is locked and nothing
//! is merged.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;
use user_secrets_core::Paths;

use crate::error::{Result, SecretsError};

/// Check that `id` can name a store directory.
///
/// The id becomes exactly one path component, which keeps the id to path
/// mapping injective.
pub fn validate_id(id: &str) -> Result<()> {
    let invalid = |reason: String| SecretsError::InvalidIdentifier {
        id: id.to_string(),
        reason,
    };

    if id.is_empty() {
        return Err(invalid("id cannot be empty".to_string()));
    }

    if id == "." || id == ".." {
        return Err(invalid("id cannot be a relative path".to_string()));
    }

    for (index, c) in id.chars().enumerate() {
        if matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') || c.is_control() {
            return Err(invalid(format!(
                "invalid character '{}' at index {}",
                c.escape_default(),
                index
            )));
        }
    }

    Ok(())
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(SecretsError::InvalidName(
            "Name cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// In-memory view of one store, ordered lexically by name
#[derive(Debug)]
pub struct SecretStore {
    /// Durable artifact backing this store
    path: PathBuf,
    secrets: BTreeMap<String, String>,
}

impl SecretStore {
    /// Load the store for `id` from its standard location
    pub fn load(paths: &Paths, id: &str) -> Result<Self> {
        validate_id(id)?;
        Self::open(paths.secrets_file(id))
    }

    /// Load a store from an explicit artifact path.
    ///
    /// A missing or blank file is an empty store. Anything else that is not
    /// a flat JSON object of scalars fails as `StoreCorrupt`, and the file
    /// is left as it was.
    pub fn open(path: PathBuf) -> Result<Self> {
        let secrets = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| SecretsError::StoreCorrupt {
                path: path.clone(),
                reason: format!("could not read file: {}", e),
            })?;
            parse(&path, &content)?
        } else {
            BTreeMap::new()
        };

        debug!("Loaded {} secrets from {}", secrets.len(), path.display());

        Ok(Self { path, secrets })
    }

    /// Path of the durable artifact
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.secrets.get(name).map(String::as_str)
    }

    /// Insert or replace a secret
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        validate_name(name)?;
        self.secrets.insert(name.to_string(), value.to_string());
        Ok(())
    }

    /// Remove a secret, returning whether it was present
    pub fn remove(&mut self, name: &str) -> bool {
        self.secrets.remove(name).is_some()
    }

    /// Remove every secret, returning how many there were
    pub fn clear(&mut self) -> usize {
        let count = self.secrets.len();
        self.secrets.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    /// All secrets in lexical (byte-wise) name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.secrets.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Write the whole store back to disk.
    ///
    /// The JSON goes to a temp file in the store directory, is synced, then
    /// renamed over the artifact. On any failure the previous artifact is
    /// untouched and the temp file is removed.
    pub fn save(&self) -> Result<()> {
        let persist_failed = |source: io::Error| SecretsError::StorePersistFailed {
            path: self.path.clone(),
            source,
        };

        let dir = self
            .path
            .parent()
            .ok_or_else(|| persist_failed(io::Error::new(io::ErrorKind::InvalidInput, "no parent directory")))?;

        create_private_dir(dir).map_err(persist_failed)?;

        let content = serde_json::to_string_pretty(&self.secrets)
            .map_err(|e| persist_failed(io::Error::new(io::ErrorKind::InvalidData, e)))?;

        let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(persist_failed)?;
        temp.write_all(content.as_bytes()).map_err(persist_failed)?;
        temp.write_all(b"\n").map_err(persist_failed)?;
        temp.as_file().sync_all().map_err(persist_failed)?;

        temp.persist(&self.path).map_err(|e| persist_failed(e.error))?;

        debug!("Saved {} secrets to {}", self.secrets.len(), self.path.display());
        Ok(())
    }
}

fn parse(path: &Path, content: &str) -> Result<BTreeMap<String, String>> {
    let corrupt = |reason: String| SecretsError::StoreCorrupt {
        path: path.to_path_buf(),
        reason,
    };

    let content = content.trim_start_matches('\u{feff}');
    if content.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    let value: Value = serde_json::from_str(content).map_err(|e| corrupt(e.to_string()))?;

    let Value::Object(entries) = value else {
        return Err(corrupt("expected a JSON object at the top level".to_string()));
    };

    let mut secrets = BTreeMap::new();
    for (name, value) in entries {
        let value = match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => return Err(corrupt(format!("'{}' is null", name))),
            Value::Array(_) | Value::Object(_) => {
                return Err(corrupt(format!("'{}' is nested; values must be flat", name)))
            }
        };
        secrets.insert(name, value);
    }

    Ok(secrets)
}

/// Create `dir` (and parents) readable only by the owner where supported
fn create_private_dir(dir: &Path) -> io::Result<()> {
    if dir.is_dir() {
        return Ok(());
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
    }

    #[cfg(not(unix))]
    {
        fs::create_dir_all(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_store() -> (SecretStore, Paths, TempDir) {
        let temp = TempDir::new().unwrap();
        let paths = Paths::new().with_stores_root(temp.path().join("stores"));
        let store = SecretStore::load(&paths, "test-id").unwrap();
        (store, paths, temp)
    }

    #[test]
    fn test_missing_artifact_is_empty() {
        let (store, paths, _temp) = temp_store();
        assert!(store.is_empty());
        assert_eq!(store.path(), paths.secrets_file("test-id"));
        assert!(!store.path().exists());
    }

    #[test]
    fn test_blank_artifact_is_empty() {
        let (store, paths, _temp) = temp_store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "  \n").unwrap();

        let reloaded = SecretStore::load(&paths, "test-id").unwrap();
        assert!(reloaded.is_empty());
    }

    #[test]
    fn test_set_get_remove() {
        let (mut store, _paths, _temp) = temp_store();

        store.set("Foo:Bar", "1").unwrap();
        store.set("empty", "").unwrap();
        assert_eq!(store.get("Foo:Bar"), Some("1"));
        assert_eq!(store.get("empty"), Some(""));
        assert_eq!(store.get("foo:bar"), None);

        store.set("Foo:Bar", "2").unwrap();
        assert_eq!(store.get("Foo:Bar"), Some("2"));
        assert_eq!(store.len(), 2);

        assert!(store.remove("Foo:Bar"));
        assert!(!store.remove("Foo:Bar"));
        assert!(store.get("Foo:Bar").is_none());
    }

    #[test]
    fn test_empty_name_rejected() {
        let (mut store, _paths, _temp) = temp_store();
        let err = store.set("", "value").unwrap_err();
        assert!(matches!(err, SecretsError::InvalidName(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let (mut store, paths, _temp) = temp_store();

        store.set("ConnectionStrings:Default", "Server=.;Database=app").unwrap();
        store.set("Api:Key", "sk-123").unwrap();
        store.set("Quote", "say \"hi\"\n").unwrap();
        store.set("Blank", "").unwrap();
        store.save().unwrap();

        let reloaded = SecretStore::load(&paths, "test-id").unwrap();
        let before: Vec<_> = store.iter().collect();
        let after: Vec<_> = reloaded.iter().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_enumeration_is_lexical() {
        let (mut store, paths, _temp) = temp_store();

        store.set("b", "2").unwrap();
        store.set("a", "1").unwrap();
        store.set("B", "3").unwrap();
        store.save().unwrap();

        let reloaded = SecretStore::load(&paths, "test-id").unwrap();
        let names: Vec<_> = reloaded.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["B", "a", "b"]);
    }

    #[test]
    fn test_clear_twice() {
        let (mut store, _paths, _temp) = temp_store();
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();

        assert_eq!(store.clear(), 2);
        assert_eq!(store.clear(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_ids_are_isolated() {
        let (mut store, paths, _temp) = temp_store();
        store.set("shared", "one").unwrap();
        store.save().unwrap();

        let other = SecretStore::load(&paths, "Test-Id").unwrap();
        assert!(other.is_empty());
    }

    #[test]
    fn test_scalars_are_stringified() {
        let (store, paths, _temp) = temp_store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "\u{feff}{\"Port\": 5000, \"Debug\": true}").unwrap();

        let reloaded = SecretStore::load(&paths, "test-id").unwrap();
        assert_eq!(reloaded.get("Port"), Some("5000"));
        assert_eq!(reloaded.get("Debug"), Some("true"));
    }

    #[test]
    fn test_corrupt_artifact() {
        let (store, paths, _temp) = temp_store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();

        for content in ["{ not json", "[1, 2]", r#"{"a": {"b": "c"}}"#, r#"{"a": null}"#] {
            fs::write(store.path(), content).unwrap();

            match SecretStore::load(&paths, "test-id") {
                Err(SecretsError::StoreCorrupt { path, .. }) => assert_eq!(path, store.path()),
                other => panic!("Expected StoreCorrupt for {:?}, got {:?}", content, other),
            }

            // Left for manual inspection
            assert_eq!(fs::read_to_string(store.path()).unwrap(), content);
        }
    }

    #[test]
    fn test_interrupted_save_keeps_previous() {
        let (mut store, paths, _temp) = temp_store();
        store.set("kept", "yes").unwrap();
        store.save().unwrap();

        // A temp file that was written but never renamed into place
        let dir = store.path().parent().unwrap();
        fs::write(dir.join(".tmpXYZ123"), "{\"kept\": \"no\", \"partial").unwrap();

        let reloaded = SecretStore::load(&paths, "test-id").unwrap();
        assert_eq!(reloaded.get("kept"), Some("yes"));
    }

    #[test]
    fn test_failed_save_leaves_target_alone() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("secrets.json");

        // A non-empty directory where the artifact should be makes the rename fail
        fs::create_dir_all(target.join("blocker")).unwrap();

        let mut store = SecretStore {
            path: target.clone(),
            secrets: BTreeMap::new(),
        };
        store.set("a", "1").unwrap();

        let err = store.save().unwrap_err();
        assert!(matches!(err, SecretsError::StorePersistFailed { .. }));
        assert!(target.join("blocker").is_dir());

        // No stray temp files
        let leftovers: Vec<_> = fs::read_dir(temp.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_read_only_dir_keeps_previous() {
        use std::os::unix::fs::PermissionsExt;

        let (mut store, paths, _temp) = temp_store();
        store.set("a", "1").unwrap();
        store.save().unwrap();

        let dir = store.path().parent().unwrap().to_path_buf();
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o500)).unwrap();

        // Permission bits do not bind a privileged user
        if fs::write(dir.join(".write-check"), "").is_ok() {
            fs::remove_file(dir.join(".write-check")).unwrap();
            fs::set_permissions(&dir, fs::Permissions::from_mode(0o700)).unwrap();
            return;
        }

        store.set("b", "2").unwrap();
        let result = store.save();
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o700)).unwrap();

        match result {
            Err(SecretsError::StorePersistFailed { path, .. }) => assert_eq!(path, store.path()),
            other => panic!("Expected StorePersistFailed, got {:?}", other),
        }

        let reloaded = SecretStore::load(&paths, "test-id").unwrap();
        assert_eq!(reloaded.get("a"), Some("1"));
        assert_eq!(reloaded.get("b"), None);
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_store_dir_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let (mut store, _paths, _temp) = temp_store();
        store.set("a", "1").unwrap();
        store.save().unwrap();

        let dir = store.path().parent().unwrap();
        let mode = fs::metadata(dir).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o700);

        let mode = fs::metadata(store.path()).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("aspnet-WebApp-1234").is_ok());
        assert!(validate_id("6a9fb3a4-0d1c-4b5e-9f7a-2c3d4e5f6a7b").is_ok());

        for bad in ["", ".", "..", "a/b", "a\\b", "a:b", "a\0b"] {
            let err = validate_id(bad).unwrap_err();
            assert!(matches!(err, SecretsError::InvalidIdentifier { .. }), "{:?}", bad);
        }
    }
}
