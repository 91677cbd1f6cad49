//! On-disk working copies of fetched packages
//!
//! The toolkit operates on real files, so a snapshot is written out under
//! `<root>/<key digest>/` before a build or deploy. Each materialization
//! replaces the previous copy for the same key.

use std::fs;
use std::path::{Component, Path, PathBuf};

use log::debug;
use serde::Serialize;

use super::PackageSnapshot;
use crate::cache::CacheKey;
use crate::error::{ApiError, ConfigError, Result};

/// Directory holding materialized packages
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

/// Disk usage of the workspace root
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkspaceStats {
    pub packages: usize,
    pub total_size_bytes: u64,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `<user cache dir>/repodeploy/workspaces`
    pub fn default_root() -> Result<PathBuf> {
        let base = dirs::cache_dir().ok_or_else(|| {
            ConfigError::Invalid("Could not determine the user cache directory".to_string())
        })?;
        Ok(base.join("repodeploy").join("workspaces"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where a package is (or would be) materialized
    pub fn package_dir(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.digest())
    }

    /// Write a snapshot to disk, replacing any previous copy for the key.
    /// Paths that would escape the package directory are rejected before
    /// anything is written.
    pub fn materialize(&self, key: &CacheKey, snapshot: &PackageSnapshot) -> Result<PathBuf> {
        for path in snapshot.files().keys() {
            if !is_safe_relative(path) {
                return Err(ApiError::MalformedPackage(format!(
                    "unsafe path in package: {}",
                    path
                ))
                .into());
            }
        }

        let dir = self.package_dir(key);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        fs::create_dir_all(&dir)?;

        for (path, contents) in snapshot.files() {
            let target = dir.join(path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, contents)?;
        }

        debug!("Materialized {} into {}", key, dir.display());
        Ok(dir)
    }

    pub fn stats(&self) -> Result<WorkspaceStats> {
        if !self.root.exists() {
            return Ok(WorkspaceStats::default());
        }

        let mut stats = WorkspaceStats::default();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                stats.packages += 1;
                stats.total_size_bytes += dir_size(&entry.path())?;
            }
        }
        Ok(stats)
    }

    /// Remove every materialized package, returning how many were removed
    pub fn clear(&self) -> Result<usize> {
        if !self.root.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                fs::remove_dir_all(entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn is_safe_relative(path: &str) -> bool {
    !path.is_empty()
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

fn dir_size(path: &Path) -> std::io::Result<u64> {
    let mut total = 0;
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        total += if meta.is_dir() {
            dir_size(&entry.path())?
        } else {
            meta.len()
        };
    }
    Ok(total)
}
