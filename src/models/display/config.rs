//! Package configuration display model

use serde::Serialize;
use tabled::Tabled;

use super::common::{check, truncate_string};
use crate::package::PackageDescriptor;

/// One configuration of a fetched package
#[derive(Debug, Clone, Tabled, Serialize)]
pub struct ConfigDisplay {
    #[tabled(rename = "CONFIG")]
    pub name: String,

    /// Path of the `config.<name>.yaml` file
    #[tabled(rename = "FILE")]
    pub path: String,

    #[tabled(rename = "README")]
    pub has_readme: String,

    /// First line of the README, if any
    #[tabled(rename = "SUMMARY")]
    pub summary: String,
}

impl ConfigDisplay {
    /// One row per configuration, in name order
    pub fn rows(descriptor: &PackageDescriptor) -> Vec<Self> {
        descriptor
            .available_configs
            .iter()
            .map(|name| {
                let readme = descriptor.readme_for(name);
                let summary = readme
                    .and_then(|text| text.lines().map(str::trim).find(|l| !l.is_empty()))
                    .map(|line| truncate_string(line.trim_start_matches('#').trim(), 50))
                    .unwrap_or_else(|| "--".to_string());

                Self {
                    name: name.clone(),
                    path: descriptor
                        .config_paths
                        .get(name)
                        .cloned()
                        .unwrap_or_default(),
                    has_readme: check(readme.is_some()),
                    summary,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::PackageSnapshot;

    #[test]
    fn test_rows_from_descriptor() {
        let snapshot: PackageSnapshot = [
            ("config.dev.yaml", ""),
            ("sub/config.prod.yaml", ""),
            ("README.prod.md", "\n# Production rollout\n\nDetails"),
        ]
        .into_iter()
        .map(|(p, c)| (p.to_string(), c.as_bytes().to_vec()))
        .collect();
        let descriptor = PackageDescriptor::from_snapshot("widgets", &snapshot);

        let rows = ConfigDisplay::rows(&descriptor);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "dev");
        assert_eq!(rows[0].summary, "--");
        assert_eq!(rows[0].has_readme, "");
        assert_eq!(rows[1].path, "sub/config.prod.yaml");
        assert_eq!(rows[1].summary, "Production rollout");
    }
}
