//! Display models for CLI output
//!
//! Converts domain types (package descriptors, quota, toolkit runs) into
//! rows for table and JSON output.

pub mod display;

pub use display::{BranchDisplay, ConfigDisplay, PackageDisplay, QuotaDisplay, RunDisplay};
