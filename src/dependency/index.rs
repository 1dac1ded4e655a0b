//! Installed-index store: `dependencies.json` inside an install
//! directory, listing every dependency installed there.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::DependenciesIndexEntry;
use crate::error::HostError;

const API_VERSION: &str = "wharf/v1";
const KIND: &str = "DependenciesIndex";
pub const INDEX_FILE_NAME: &str = "dependencies.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependenciesIndex {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub entries: Vec<DependenciesIndexEntry>,
}

fn default_api_version() -> String {
    API_VERSION.to_string()
}

fn default_kind() -> String {
    KIND.to_string()
}

impl Default for DependenciesIndex {
    fn default() -> Self {
        DependenciesIndex {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            entries: Vec::new(),
        }
    }
}

impl DependenciesIndex {
    /// Loads the index at `<install_dir>/dependencies.json`. A missing file
    /// is treated as an empty index rather than an error.
    pub fn load(install_dir: &Path) -> Result<Self, HostError> {
        let path = install_dir.join(INDEX_FILE_NAME);
        if !path.exists() {
            return Ok(DependenciesIndex::default());
        }

        let data = fs::read_to_string(&path)
            .map_err(|e| HostError::IndexError(format!("reading {}: {e}", path.display())))?;

        serde_json::from_str(&data)
            .map_err(|e| HostError::IndexError(format!("parsing {}: {e}", path.display())))
    }

    /// Writes the index back through `O_TRUNC|O_CREAT|O_WRONLY` semantics
    /// (the default behavior of [`std::fs::write`]) as indented JSON.
    pub fn save(&self, install_dir: &Path) -> Result<(), HostError> {
        let path = install_dir.join(INDEX_FILE_NAME);
        let data = serde_json::to_string_pretty(self)
            .map_err(|e| HostError::IndexError(format!("serializing index: {e}")))?;
        fs::write(&path, data)
            .map_err(|e| HostError::IndexError(format!("writing {}: {e}", path.display())))
    }

    pub fn find_by_alias(&self, alias: &str) -> Option<&DependenciesIndexEntry> {
        self.entries.iter().find(|e| e.alias == alias)
    }

    /// Replaces any existing entry with the same alias, returning the
    /// replaced entries so the caller can decide whether to clean up their
    /// on-disk artifact directories.
    pub fn upsert(&mut self, entry: DependenciesIndexEntry) -> Vec<DependenciesIndexEntry> {
        let mut replaced = Vec::new();
        self.entries.retain(|e| {
            if e.alias == entry.alias {
                replaced.push(e.clone());
                false
            } else {
                true
            }
        });
        self.entries.push(entry);
        replaced
    }

    /// Removes every entry with the given alias, returning them.
    pub fn remove_alias(&mut self, alias: &str) -> Vec<DependenciesIndexEntry> {
        let mut removed = Vec::new();
        self.entries.retain(|e| {
            if e.alias == alias {
                removed.push(e.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Resolves an entry's relative `path` to an absolute directory under
    /// `install_dir`, and validates the command manifest invariant:
    /// the path must exist and contain a readable `command.yaml`.
    pub fn validate_entry(
        entry: &DependenciesIndexEntry,
        install_dir: &Path,
    ) -> Result<PathBuf, HostError> {
        let abs = install_dir.join(&entry.path);
        if !abs.is_dir() {
            return Err(HostError::IndexError(format!(
                "entry '{}' points to missing directory {}",
                entry.alias,
                abs.display()
            )));
        }
        let manifest = abs.join("command.yaml");
        if !manifest.is_file() {
            return Err(HostError::IndexError(format!(
                "entry '{}' is missing command.yaml at {}",
                entry.alias,
                manifest.display()
            )));
        }
        Ok(abs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_entry(alias: &str, checksum: &str) -> DependenciesIndexEntry {
        DependenciesIndexEntry {
            alias: alias.to_string(),
            registry: "file:///reg.yaml".to_string(),
            name: alias.to_string(),
            version: "1.0.0".to_string(),
            os: String::new(),
            arch: String::new(),
            checksum: checksum.to_string(),
            path: format!("dependencies/{checksum}"),
        }
    }

    #[test]
    fn missing_file_loads_as_empty_index() {
        let dir = TempDir::new().unwrap();
        let index = DependenciesIndex::load(dir.path()).unwrap();
        assert!(index.entries.is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let mut index = DependenciesIndex::default();
        index.upsert(sample_entry("foo", "sha256-aaa"));
        index.save(dir.path()).unwrap();

        let reloaded = DependenciesIndex::load(dir.path()).unwrap();
        assert_eq!(reloaded.entries.len(), 1);
        assert_eq!(reloaded.entries[0].alias, "foo");
    }

    #[test]
    fn upsert_replaces_same_alias_and_reports_replaced() {
        let mut index = DependenciesIndex::default();
        index.upsert(sample_entry("foo", "sha256-aaa"));
        let replaced = index.upsert(sample_entry("foo", "sha256-bbb"));

        assert_eq!(index.entries.len(), 1);
        assert_eq!(index.entries[0].checksum, "sha256-bbb");
        assert_eq!(replaced.len(), 1);
        assert_eq!(replaced[0].checksum, "sha256-aaa");
    }

    #[test]
    fn remove_alias_is_noop_for_unknown_alias() {
        let mut index = DependenciesIndex::default();
        let removed = index.remove_alias("nope");
        assert!(removed.is_empty());
    }
}
