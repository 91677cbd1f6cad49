//! Shared CLI argument types
//!
//! This module contains reusable argument structs that can be flattened
//! into commands using `#[command(flatten)]`.

mod common;
mod global;
mod repo;

pub use common::OutputFormat;
pub use global::GlobalOptions;
pub use repo::{DEFAULT_REF, RepoArgs, RepoRef};
