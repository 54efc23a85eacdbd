//! Reading MSBuild project documents
//!
//! A document is scanned once, top to bottom, the way MSBuild's property
//! pass sees it: property groups update the property table, imports are
//! collected with the table as it stands at that point.

use std::fs;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};

use roxmltree::Node;
use tracing::{debug, warn};
use user_secrets_core::format;

use crate::condition::{self, Properties};
use crate::error::{Result, SecretsError};

/// Property that carries the store identifier
pub const ID_PROPERTY: &str = "UserSecretsId";

/// File MSBuild imports implicitly from the project directory or above
pub const DIRECTORY_BUILD_PROPS: &str = "Directory.Build.props";

/// Whether `path` looks like a project file (`*.*proj`)
pub fn is_project_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase().ends_with("proj"))
            .unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq)]
struct IdCandidate {
    value: String,
    /// Only applies under some build configuration
    conditioned: bool,
}

/// What one document contributes to identity resolution
#[derive(Debug)]
pub struct ProjectDocument {
    /// Identifier declared directly in this document
    pub id: Option<String>,
    /// Imports whose conditions held, in declaration order
    pub imports: Vec<PathBuf>,
    /// Property table after the whole document was read
    pub properties: Properties,
}

impl ProjectDocument {
    /// Parse and scan the document at `path`, starting from `inherited`
    pub fn load(path: &Path, inherited: &Properties) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| SecretsError::ProjectUnreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(path, &text, inherited)
    }

    pub fn parse(path: &Path, text: &str, inherited: &Properties) -> Result<Self> {
        let doc = roxmltree::Document::parse(text).map_err(|e| SecretsError::ProjectUnreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let base_dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();

        let mut scan = Scan {
            path,
            base_dir: &base_dir,
            properties: inherited.clone(),
            id: None,
            imports: Vec::new(),
        };
        scan.properties.set("MSBuildThisFile", file_name(path));
        scan.properties.set("MSBuildThisFileFullPath", path.display().to_string());
        scan.properties.set("MSBuildThisFileDirectory", dir_with_separator(&base_dir));

        for node in doc.root_element().children().filter(Node::is_element) {
            match node.tag_name().name() {
                "PropertyGroup" => scan.property_group(node, false),
                "Choose" => scan.choose(node, false),
                "Import" => scan.import(node),
                "ImportGroup" => {
                    if scan.condition_holds(node) {
                        for child in node.children().filter(|n| n.has_tag_name("Import")) {
                            scan.import(child);
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(Self {
            id: scan.id.map(|c| c.value),
            imports: scan.imports,
            properties: scan.properties,
        })
    }
}

struct Scan<'a> {
    path: &'a Path,
    base_dir: &'a Path,
    properties: Properties,
    id: Option<IdCandidate>,
    imports: Vec<PathBuf>,
}

impl Scan<'_> {
    fn condition_holds(&self, node: Node) -> bool {
        let Some(condition) = node.attribute("Condition") else {
            return true;
        };

        match condition::evaluate(condition, &self.properties, self.base_dir) {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    "Ignoring element with unsupported condition \"{}\" in {}: {}",
                    format::truncate(condition, 80),
                    self.path.display(),
                    e
                );
                false
            }
        }
    }

    /// `conditioned` is set when an enclosing `When` depends on the configuration
    fn property_group(&mut self, group: Node, conditioned: bool) {
        if !self.condition_holds(group) {
            return;
        }
        let group_conditioned = conditioned || depends_on_configuration(group);

        for property in group.children().filter(Node::is_element) {
            if !self.condition_holds(property) {
                continue;
            }

            let name = property.tag_name().name();
            let value = self.properties.expand(property.text().unwrap_or("").trim());

            if name.eq_ignore_ascii_case(ID_PROPERTY) && !value.is_empty() {
                self.offer_id(IdCandidate {
                    value: value.clone(),
                    conditioned: group_conditioned || depends_on_configuration(property),
                });
            }

            self.properties.set(name, value);
        }
    }

    /// A configuration-specific id beats a general one; otherwise the later wins
    fn offer_id(&mut self, candidate: IdCandidate) {
        let replace = match &self.id {
            None => true,
            Some(current) => candidate.conditioned || !current.conditioned,
        };
        if replace {
            self.id = Some(candidate);
        }
    }

    /// Take the first `When` whose condition holds, else `Otherwise`
    fn choose(&mut self, choose: Node, conditioned: bool) {
        let branches: Vec<Node> = choose.children().filter(Node::is_element).collect();
        let conditioned = conditioned
            || branches
                .iter()
                .any(|b| b.has_tag_name("When") && depends_on_configuration(*b));

        let chosen = branches
            .iter()
            .find(|b| b.has_tag_name("When") && self.condition_holds(**b))
            .or_else(|| branches.iter().find(|b| b.has_tag_name("Otherwise")));

        let Some(branch) = chosen else {
            return;
        };

        for child in branch.children().filter(Node::is_element) {
            match child.tag_name().name() {
                "PropertyGroup" => self.property_group(child, conditioned),
                "Choose" => self.choose(child, conditioned),
                _ => {}
            }
        }
    }

    fn import(&mut self, node: Node) {
        if !self.condition_holds(node) {
            return;
        }

        let Some(project) = node.attribute("Project") else {
            return;
        };

        let expanded = self.properties.expand(project);
        let expanded = expanded.trim();
        if expanded.is_empty() {
            return;
        }

        if expanded.contains('*') || expanded.contains('?') {
            debug!("Skipping wildcard import {} in {}", expanded, self.path.display());
            return;
        }

        self.imports.push(self.base_dir.join(expanded.replace('\\', "/")));
    }
}

/// Whether the node's `Condition` mentions `$(Configuration)`
fn depends_on_configuration(node: Node) -> bool {
    node.attribute("Condition")
        .map(|c| c.to_ascii_lowercase().contains("$(configuration)"))
        .unwrap_or(false)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn dir_with_separator(dir: &Path) -> String {
    let mut s = dir.display().to_string();
    if !s.ends_with(MAIN_SEPARATOR) {
        s.push(MAIN_SEPARATOR);
    }
    s
}
