//! Display model implementations for table and JSON output

mod branch;
mod common;
mod config;
mod package;
mod quota;
mod run;

pub use branch::BranchDisplay;
pub use config::ConfigDisplay;
pub use package::PackageDisplay;
pub use quota::QuotaDisplay;
pub use run::RunDisplay;
