//! Dependency request/entry types shared by the registry, manager, loader,
//! and scope resolver.

pub mod index;
pub mod manager;

use serde::{Deserialize, Serialize};

/// A `{name, version_range, registry_url, alias}` request, as produced by
/// the CLI or read back out of a project config entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    /// Semver constraint string, e.g. `^1.2`, `*`, `>1.0`, or an exact version.
    pub version: String,
    pub registry: String,
    pub alias: String,
    /// Caller-pinned expected checksum, e.g. `sha256-...`. Empty means no
    /// pin: only the registry entry's own checksum (if any) is enforced.
    #[serde(default)]
    pub checksum: String,
}

impl Dependency {
    /// Applies the `alias ← alias || name` / `registry ← registry ||
    /// default` defaulting.
    pub fn with_defaults(mut self, default_registry: &str) -> Self {
        if self.alias.is_empty() {
            self.alias = self.name.clone();
        }
        if self.registry.is_empty() {
            self.registry = default_registry.to_string();
        }
        self
    }
}

/// One row of the installed-index, also what gets registered as a
/// dynamic subcommand by the loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependenciesIndexEntry {
    pub alias: String,
    pub registry: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub arch: String,
    pub checksum: String,
    /// Relative to the install directory the index resides in.
    pub path: String,
}

impl DependenciesIndexEntry {
    pub fn to_dependency(&self) -> Dependency {
        Dependency {
            name: self.name.clone(),
            version: self.version.clone(),
            registry: self.registry.clone(),
            alias: self.alias.clone(),
            checksum: self.checksum.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_defaults_fills_alias_and_registry_only_when_empty() {
        let dep = Dependency {
            name: "foo".into(),
            version: "1.0.0".into(),
            registry: String::new(),
            alias: String::new(),
            checksum: String::new(),
        }
        .with_defaults("https://example.com/registry.yaml");
        assert_eq!(dep.alias, "foo");
        assert_eq!(dep.registry, "https://example.com/registry.yaml");

        let pinned = Dependency {
            name: "foo".into(),
            version: "1.0.0".into(),
            registry: "https://other".into(),
            alias: "f".into(),
            checksum: String::new(),
        }
        .with_defaults("https://example.com/registry.yaml");
        assert_eq!(pinned.alias, "f");
        assert_eq!(pinned.registry, "https://other");
    }
}
