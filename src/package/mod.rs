//! Fetched packages and the descriptor derived from them
//!
//! A package is the file tree of a repository at one ref. Configurations are
//! discovered from `config.<name>.yaml` files and matched with
//! `README.<name>.md` documentation.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::error::ApiError;

pub mod workspace;

pub use workspace::{Workspace, WorkspaceStats};

/// README filename variants accepted for a configuration, in priority order
const README_PATTERNS: [(&str, &str); 4] = [
    ("README.", ".md"),
    ("readme.", ".md"),
    ("README.", ".MD"),
    ("readme.", ".MD"),
];

/// Extracted file tree: repository-relative path to contents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageSnapshot {
    files: BTreeMap<String, Vec<u8>>,
}

impl PackageSnapshot {
    pub fn new(files: BTreeMap<String, Vec<u8>>) -> Self {
        Self { files }
    }

    pub fn files(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.files
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Total payload size in bytes
    pub fn size_bytes(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }
}

impl FromIterator<(String, Vec<u8>)> for PackageSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, Vec<u8>)>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

/// Caller-facing summary of a package
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackageDescriptor {
    pub name: String,

    /// Configuration name to README text
    pub readme_files: BTreeMap<String, String>,

    pub available_configs: BTreeSet<String>,

    /// Configuration name to the path of its `config.<name>.yaml`
    pub config_paths: BTreeMap<String, String>,
}

impl PackageDescriptor {
    /// Derive the descriptor, treating a package without configurations as
    /// empty rather than failing.
    pub fn from_snapshot(name: &str, snapshot: &PackageSnapshot) -> Self {
        match Self::parse(name, snapshot) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                log::warn!("{}: {}", name, err);
                Self {
                    name: name.to_string(),
                    ..Self::default()
                }
            }
        }
    }

    /// Derive the descriptor, failing with `MalformedPackage` when no
    /// configuration files exist.
    pub fn parse(name: &str, snapshot: &PackageSnapshot) -> Result<Self, ApiError> {
        let mut config_paths: BTreeMap<String, String> = BTreeMap::new();
        for path in snapshot.files().keys() {
            if let Some(config) = config_name(basename(path)) {
                // Shallowest path wins, ties broken by path order
                let replace = match config_paths.get(config) {
                    Some(existing) => depth(path) < depth(existing),
                    None => true,
                };
                if replace {
                    config_paths.insert(config.to_string(), path.clone());
                }
            }
        }

        if config_paths.is_empty() {
            return Err(ApiError::MalformedPackage(format!(
                "no config.<name>.yaml files among {} files",
                snapshot.len()
            )));
        }

        let readme_files = config_paths
            .keys()
            .filter_map(|config| {
                find_readme(snapshot, config).map(|text| (config.clone(), text))
            })
            .collect();

        Ok(Self {
            name: name.to_string(),
            readme_files,
            available_configs: config_paths.keys().cloned().collect(),
            config_paths,
        })
    }

    pub fn readme_for(&self, config: &str) -> Option<&str> {
        self.readme_files.get(config).map(String::as_str)
    }

    pub fn has_config(&self, config: &str) -> bool {
        self.available_configs.contains(config)
    }

    /// Directory (relative to the package root) holding a configuration's
    /// file; the toolkit runs from there.
    pub fn project_dir(&self, config: &str) -> Option<&str> {
        self.config_paths
            .get(config)
            .map(|path| path.rsplit_once('/').map_or("", |(dir, _)| dir))
    }
}

/// `config.<name>.yaml` to `<name>`
fn config_name(file: &str) -> Option<&str> {
    file.strip_prefix("config.")
        .and_then(|rest| rest.strip_suffix(".yaml"))
        .filter(|name| !name.is_empty())
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn depth(path: &str) -> usize {
    path.matches('/').count()
}

fn find_readme(snapshot: &PackageSnapshot, config: &str) -> Option<String> {
    let candidates: Vec<String> = README_PATTERNS
        .iter()
        .map(|(prefix, suffix)| format!("{}{}{}", prefix, config, suffix))
        .collect();

    // Root-level files first, in pattern priority
    for candidate in &candidates {
        if let Some(bytes) = snapshot.get(candidate) {
            return Some(String::from_utf8_lossy(bytes).into_owned());
        }
    }

    snapshot
        .files()
        .iter()
        .find(|(path, _)| candidates.iter().any(|c| c == basename(path)))
        .map(|(_, bytes)| String::from_utf8_lossy(bytes).into_owned())
}
