//! Fetched package summary

use serde::Serialize;
use tabled::Tabled;

use crate::cache::CacheEntry;
use crate::output::formatters::format_size;

#[derive(Debug, Clone, Tabled, Serialize)]
pub struct PackageDisplay {
    #[tabled(rename = "REPOSITORY")]
    pub repository: String,

    #[tabled(rename = "REF")]
    pub reference: String,

    #[tabled(rename = "FILES")]
    pub files: usize,

    #[tabled(rename = "SIZE")]
    pub size: String,

    #[tabled(rename = "CONFIGS")]
    pub configs: String,
}

impl From<&CacheEntry> for PackageDisplay {
    fn from(entry: &CacheEntry) -> Self {
        let descriptor = entry.descriptor();
        let configs = if descriptor.available_configs.is_empty() {
            "--".to_string()
        } else {
            descriptor
                .available_configs
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        };

        Self {
            repository: format!("{}/{}", entry.key.owner, entry.key.repo),
            reference: entry.key.reference.clone(),
            files: entry.payload.len(),
            size: format_size(entry.payload.size_bytes() as u64),
            configs,
        }
    }
}
