//! Registry client: loads a registry index from a local file or a
//! remote HTTP endpoint and answers version-selection queries over it.
//!
//! Local and remote registries share one contract (this module's
//! [`Registry`] trait) and a common query helper built on
//! [`crate::version::find_best`]; only `load()` differs in transport.

mod local;
mod remote;

use std::collections::HashMap;

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::dependency::Dependency;
use crate::error::HostError;
use crate::version::{self, Predicate};

/// One row of a registry index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub arch: String,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    pub url: String,
    #[serde(default)]
    pub checksum: String,
}

/// The document a registry URL resolves to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    #[serde(default)]
    pub entries: Vec<Entry>,
}

/// Shared contract implemented by the local and remote variants.
pub trait Registry {
    /// Fetches and parses the index. Safe to call more than once; the
    /// manager only calls it lazily on first query.
    fn update(&mut self) -> Result<(), HostError>;
    fn get_exact_match(&self, dep: &Dependency) -> Result<Option<Entry>, HostError>;
    fn get_highest_non_breaking(&self, dep: &Dependency) -> Result<Option<Entry>, HostError>;
    fn get_highest_breaking(&self, dep: &Dependency) -> Result<Option<Entry>, HostError>;
}

/// Picks the local or remote implementation based on the URL scheme.
pub fn new(url: &str) -> Box<dyn Registry> {
    if let Some(path) = url.strip_prefix("file://") {
        Box::new(local::LocalRegistry::new(path.to_string()))
    } else {
        Box::new(remote::RemoteRegistry::new(url.to_string()))
    }
}

fn find_highest_matching(
    entries: &[Entry],
    dep: &Dependency,
    predicate_for: impl FnOnce(&Version) -> Predicate,
) -> Result<Option<Entry>, HostError> {
    let current = Version::parse(&dep.version).map_err(|e| {
        HostError::InvalidRequest(format!(
            "invalid version constraint '{}' for '{}': {e}",
            dep.version, dep.name
        ))
    })?;
    let predicate = predicate_for(&current);
    let found = version::find_best(entries, &dep.name, &predicate)?;
    Ok(found.cloned())
}

fn find_exact_match(entries: &[Entry], dep: &Dependency) -> Result<Option<Entry>, HostError> {
    let predicate = Predicate::Exact {
        range: &dep.version,
    };
    let found = version::find_best(entries, &dep.name, &predicate)?;
    Ok(found.cloned())
}

fn find_highest_non_breaking(
    entries: &[Entry],
    dep: &Dependency,
) -> Result<Option<Entry>, HostError> {
    find_highest_matching(entries, dep, |current| Predicate::HighestNonBreaking {
        current,
    })
}

fn find_highest_breaking(entries: &[Entry], dep: &Dependency) -> Result<Option<Entry>, HostError> {
    find_highest_matching(entries, dep, |current| Predicate::HighestBreaking {
        current,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_with_no_entries_key_is_still_parseable_as_empty() {
        let index: Index = serde_yaml::from_str("apiVersion: v1\nkind: Registry\n").unwrap();
        assert!(index.entries.is_empty());
        assert_eq!(index.api_version, "v1");
    }
}
