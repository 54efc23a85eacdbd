//! Resolving which user secrets id applies to an invocation
//!
//! An explicit `--id` always wins. Otherwise the id comes from the project
//! file: its own `UserSecretsId`, then its imports depth-first, then the
//! nearest `Directory.Build.props`.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use user_secrets_core::Config;

use crate::condition::Properties;
use crate::error::{Result, SecretsError};
use crate::project::{is_project_file, ProjectDocument, DIRECTORY_BUILD_PROPS};

/// Finds the store identifier for a project
#[derive(Debug, Clone)]
pub struct ProjectIdResolver {
    working_dir: PathBuf,
    default_configuration: String,
    max_import_depth: usize,
}

impl ProjectIdResolver {
    pub fn new(working_dir: impl Into<PathBuf>, config: &Config) -> Self {
        Self {
            working_dir: working_dir.into(),
            default_configuration: config.default_configuration.clone(),
            max_import_depth: config.max_import_depth,
        }
    }

    /// Resolve the id for this invocation.
    ///
    /// A non-empty `explicit_id` is returned as given without touching the
    /// file system. Read-only otherwise.
    pub fn resolve(
        &self,
        explicit_id: Option<&str>,
        project: Option<&Path>,
        configuration: Option<&str>,
    ) -> Result<String> {
        if let Some(id) = explicit_id.filter(|id| !id.is_empty()) {
            return Ok(id.to_string());
        }

        let project_file = self.find_project(project)?;
        debug!("Using project file {}", project_file.display());

        let configuration = configuration
            .filter(|c| !c.is_empty())
            .unwrap_or(self.default_configuration.as_str());

        let mut properties = Properties::new();
        properties.set("Configuration", configuration);
        if let Some(dir) = project_file.parent() {
            properties.set("MSBuildProjectDirectory", dir.display().to_string());
        }
        if let Some(name) = project_file.file_stem() {
            properties.set("MSBuildProjectName", name.to_string_lossy().to_string());
        }

        let mut visited = HashSet::new();
        if let Some(id) = self.search(&project_file, &properties, 0, &mut visited)? {
            return Ok(id);
        }

        if let Some(props_file) = find_directory_build_props(&project_file) {
            debug!("Searching implicit import {}", props_file.display());
            if let Some(id) = self.search(&props_file, &properties, 0, &mut visited)? {
                return Ok(id);
            }
        }

        Err(SecretsError::MissingIdentifier(project_file))
    }

    /// Locate the project file from an optional file or directory hint
    pub fn find_project(&self, hint: Option<&Path>) -> Result<PathBuf> {
        let path = match hint {
            Some(hint) => self.working_dir.join(hint),
            None => self.working_dir.clone(),
        };

        if path.is_file() {
            return Ok(path);
        }

        if !path.is_dir() {
            return Err(SecretsError::ProjectNotFound(path));
        }

        let entries = fs::read_dir(&path).map_err(|_| SecretsError::ProjectNotFound(path.clone()))?;

        let mut projects: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| is_project_file(p))
            .collect();
        projects.sort();

        match projects.len() {
            0 => Err(SecretsError::ProjectNotFound(path)),
            1 => Ok(projects.remove(0)),
            _ => Err(SecretsError::AmbiguousProject {
                names: projects
                    .iter()
                    .filter_map(|p| p.file_name())
                    .map(|n| n.to_string_lossy().to_string())
                    .collect(),
                dir: path,
            }),
        }
    }

    /// Depth-first search of `path` and its imports, first match wins
    fn search(
        &self,
        path: &Path,
        inherited: &Properties,
        depth: usize,
        visited: &mut HashSet<PathBuf>,
    ) -> Result<Option<String>> {
        let key = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if !visited.insert(key) {
            debug!("Already visited {}, skipping", path.display());
            return Ok(None);
        }

        let doc = ProjectDocument::load(path, inherited)?;
        if let Some(id) = doc.id {
            debug!("Found {} in {}", crate::project::ID_PROPERTY, path.display());
            return Ok(Some(id));
        }

        if depth >= self.max_import_depth {
            if !doc.imports.is_empty() {
                warn!(
                    "Import depth limit ({}) reached at {}, not following its imports",
                    self.max_import_depth,
                    path.display()
                );
            }
            return Ok(None);
        }

        for import in &doc.imports {
            if !import.is_file() {
                debug!("Import {} does not exist, skipping", import.display());
                continue;
            }
            if let Some(id) = self.search(import, &doc.properties, depth + 1, visited)? {
                return Ok(Some(id));
            }
        }

        Ok(None)
    }
}

/// Nearest `Directory.Build.props` at or above the project's directory
fn find_directory_build_props(project_file: &Path) -> Option<PathBuf> {
    project_file
        .parent()?
        .ancestors()
        .map(|dir| dir.join(DIRECTORY_BUILD_PROPS))
        .find(|candidate| candidate.is_file())
}
