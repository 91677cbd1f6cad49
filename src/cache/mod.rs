//! Session cache for fetched packages
//!
//! Keyed by (owner, repository, ref). Entries are overwritten on refetch and
//! dropped on `clear`; there is no TTL and no size bound.

pub mod key;
pub mod storage;

pub use key::CacheKey;
pub use storage::{CacheEntry, CacheStats, RepositoryCache};
