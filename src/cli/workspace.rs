//! Workspace management commands
//!
//! These only touch the local filesystem and never call GitHub.

use std::path::PathBuf;

use crate::cli::args::GlobalOptions;
use crate::cli::OutputFormat;
use crate::config::Config;
use crate::error::Result;
use crate::output::formatters::format_size;
use crate::package::Workspace;

/// Workspace location from the config, without building a GitHub client
fn open(opts: &GlobalOptions) -> Result<Workspace> {
    let config = Config::load_at(opts.config_ref())?;
    let root: PathBuf = match config.workspace_dir {
        Some(dir) => dir,
        None => Workspace::default_root()?,
    };
    Ok(Workspace::new(root))
}

/// Show workspace status/statistics
pub fn status(opts: &GlobalOptions) -> Result<()> {
    let workspace = open(opts)?;
    let stats = workspace.stats()?;

    match opts.format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "path": workspace.root().display().to_string(),
                "packages": stats.packages,
                "total_size_bytes": stats.total_size_bytes,
                "total_size_human": format_size(stats.total_size_bytes),
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        _ => {
            println!("Workspace Status");
            println!("────────────────────────────────────────");
            println!("Location:    {}", workspace.root().display());
            println!("Packages:    {}", stats.packages);
            println!("Total size:  {}", format_size(stats.total_size_bytes));
        }
    }

    Ok(())
}

/// Remove all extracted packages
pub fn clear(opts: &GlobalOptions) -> Result<()> {
    let removed = open(opts)?.clear()?;

    match opts.format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "packages_removed": removed,
                "success": true,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        _ => {
            if removed > 0 {
                println!("Removed {} extracted packages", removed);
            } else {
                println!("Workspace was already empty");
            }
        }
    }

    Ok(())
}

/// Show workspace path
pub fn path(opts: &GlobalOptions) -> Result<()> {
    println!("{}", open(opts)?.root().display());
    Ok(())
}
