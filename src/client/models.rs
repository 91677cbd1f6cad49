//! GitHub REST response models

use base64::{Engine as _, engine::general_purpose};
use chrono::DateTime;
use serde::{Deserialize, Serialize};

use super::rate_limit::QuotaState;
use crate::error::ApiError;

/// `GET /repos/{owner}/{repo}/git/trees/{ref}?recursive=1`
#[derive(Debug, Clone, Deserialize)]
pub struct TreeResponse {
    pub sha: String,

    #[serde(default)]
    pub tree: Vec<TreeEntry>,

    /// Set when GitHub cut the listing short (very large repositories)
    #[serde(default)]
    pub truncated: bool,
}

/// One entry in a git tree listing
#[derive(Debug, Clone, Deserialize)]
pub struct TreeEntry {
    pub path: String,

    /// `blob`, `tree` or `commit` (submodule)
    #[serde(rename = "type")]
    pub kind: String,

    pub sha: String,

    #[serde(default)]
    pub size: Option<u64>,
}

impl TreeEntry {
    pub fn is_blob(&self) -> bool {
        self.kind == "blob"
    }
}

/// `GET /repos/{owner}/{repo}/git/blobs/{sha}`
#[derive(Debug, Clone, Deserialize)]
pub struct BlobResponse {
    pub content: String,

    pub encoding: String,
}

impl BlobResponse {
    /// Decode the blob body. GitHub wraps base64 content at 60 columns.
    pub fn decode(&self) -> Result<Vec<u8>, ApiError> {
        match self.encoding.as_str() {
            "base64" => {
                let compact: String = self
                    .content
                    .chars()
                    .filter(|c| !c.is_ascii_whitespace())
                    .collect();
                general_purpose::STANDARD
                    .decode(compact)
                    .map_err(|e| ApiError::InvalidResponse(format!("Invalid blob content: {}", e)))
            }
            "utf-8" => Ok(self.content.clone().into_bytes()),
            other => Err(ApiError::InvalidResponse(format!(
                "Unsupported blob encoding '{}'",
                other
            ))),
        }
    }
}

/// `GET /repos/{owner}/{repo}/branches` element
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,

    #[serde(default)]
    pub protected: bool,
}

/// `GET /rate_limit`
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitResponse {
    pub resources: RateLimitResources,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitResources {
    pub core: RateLimitInfo,
}

/// One quota bucket as reported by the `/rate_limit` endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    /// Epoch seconds
    pub reset: i64,
    #[serde(default)]
    pub used: u32,
}

impl RateLimitInfo {
    pub fn to_quota(&self) -> Result<QuotaState, ApiError> {
        let reset_at = DateTime::from_timestamp(self.reset, 0).ok_or_else(|| {
            ApiError::InvalidResponse(format!("Invalid reset timestamp {}", self.reset))
        })?;
        let limit = self.limit.max(1);
        Ok(QuotaState {
            remaining: self.remaining.min(limit),
            limit,
            reset_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_decode_wrapped_base64() {
        let blob = BlobResponse {
            content: "aGVsbG8g\nd29ybGQ=\n".to_string(),
            encoding: "base64".to_string(),
        };
        assert_eq!(blob.decode().unwrap(), b"hello world".to_vec());
    }

    #[test]
    fn test_blob_decode_unknown_encoding() {
        let blob = BlobResponse {
            content: "x".to_string(),
            encoding: "rot13".to_string(),
        };
        assert!(matches!(blob.decode(), Err(ApiError::InvalidResponse(_))));
    }

    #[test]
    fn test_tree_parses_entries() {
        let json = r#"{
            "sha": "abc",
            "tree": [
                {"path": "config.dev.yaml", "type": "blob", "sha": "s1", "size": 10},
                {"path": "modules", "type": "tree", "sha": "s2"}
            ],
            "truncated": false
        }"#;
        let tree: TreeResponse = serde_json::from_str(json).unwrap();

        assert_eq!(tree.tree.len(), 2);
        assert!(tree.tree[0].is_blob());
        assert!(!tree.tree[1].is_blob());
    }

    #[test]
    fn test_rate_limit_info_to_quota() {
        let json = r#"{"resources": {"core": {"limit": 60, "remaining": 12, "reset": 1700000000, "used": 48}}}"#;
        let resp: RateLimitResponse = serde_json::from_str(json).unwrap();
        let quota = resp.resources.core.to_quota().unwrap();

        assert_eq!(quota.remaining, 12);
        assert_eq!(quota.limit, 60);
        assert_eq!(quota.reset_at.timestamp(), 1_700_000_000);
    }
}
