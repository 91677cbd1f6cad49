//! Cache keys: the logical identity of a fetched package

use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};

/// (owner, repository, ref)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CacheKey {
    pub owner: String,
    pub repo: String,
    pub reference: String,
}

impl CacheKey {
    pub fn new(owner: &str, repo: &str, reference: &str) -> Self {
        Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            reference: reference.to_string(),
        }
    }

    /// Deterministic hex digest of the key, safe to use as a directory name.
    ///
    /// Fields are separated so that ("a/b", "c") and ("a", "b/c") differ.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.owner.as_bytes());
        hasher.update(b"|");
        hasher.update(self.repo.as_bytes());
        hasher.update(b"|");
        hasher.update(self.reference.as_bytes());

        format!("{:x}", hasher.finalize())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.repo, self.reference)
    }
}
