//! Project configuration: the `wharf.yaml` file discovered by walking
//! upward from the current directory, listing the project's pinned
//! dependency versions.
//!
//! Loading is a plain typed decode. Saving is the interesting part:
//! re-saving a config nobody changed must produce a byte-identical
//! file, and any save must preserve key order and (where possible) comments
//! and formatting a human put there. We get there with a two-tier strategy:
//!
//! - If the file already exists and the only difference from the loaded
//!   value is in a handful of known scalar fields, we edit the existing
//!   document in place with [`nondestructive`], touching only the bytes that
//!   actually changed. No edits means no bytes change, which is what gives
//!   us the round-trip guarantee for free.
//! - If a dependency alias is being added or removed (a structural change
//!   `nondestructive`'s scalar-patching can't express safely), or the file
//!   doesn't exist yet, we fall back to full regeneration through
//!   `serde_yaml::Mapping`. That's still order-preserving (`Mapping` keeps
//!   insertion order) but loses any comments in the original file. This is a
//!   deliberate tradeoff, not an oversight — see DESIGN.md.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

pub const PROJECT_CONFIG_FILE_NAME: &str = "wharf.yaml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDependencyEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    pub version: String,
    /// Pinned expected checksum of the downloaded archive; enforced on
    /// install if present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// A loaded project config, with `dependencies` kept as an ordered list of
/// `(alias, entry)` pairs rather than a `HashMap` so save can reproduce the
/// original key order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectConfig {
    pub default_registry: String,
    pub dependencies: Vec<(String, ProjectDependencyEntry)>,
}

/// Decode-only mirror of the on-disk shape. `serde_yaml::Mapping` preserves
/// insertion order, which is what lets us recover `dependencies`' original
/// ordering without a non-teacher `indexmap` dependency.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProjectConfig {
    #[serde(default)]
    default_registry: String,
    #[serde(default)]
    dependencies: serde_yaml::Mapping,
}

impl ProjectConfig {
    pub fn find(&self, alias: &str) -> Option<&ProjectDependencyEntry> {
        self.dependencies
            .iter()
            .find(|(a, _)| a == alias)
            .map(|(_, e)| e)
    }

    /// Inserts or replaces an alias's entry, preserving its original
    /// position if it already existed, appending otherwise.
    pub fn upsert(&mut self, alias: &str, entry: ProjectDependencyEntry) {
        if let Some(slot) = self.dependencies.iter_mut().find(|(a, _)| a == alias) {
            slot.1 = entry;
        } else {
            self.dependencies.push((alias.to_string(), entry));
        }
    }

    pub fn remove(&mut self, alias: &str) -> Option<ProjectDependencyEntry> {
        let idx = self.dependencies.iter().position(|(a, _)| a == alias)?;
        Some(self.dependencies.remove(idx).1)
    }
}

pub fn load_project_config(path: &Path) -> anyhow::Result<ProjectConfig> {
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading project config {}", path.display()))?;
    let expanded = super::expand_env_placeholders(&data);
    let raw: RawProjectConfig = serde_yaml::from_str(&expanded)
        .with_context(|| format!("parsing project config {}", path.display()))?;

    let mut dependencies = Vec::with_capacity(raw.dependencies.len());
    for (key, value) in raw.dependencies {
        let alias = key
            .as_str()
            .with_context(|| format!("{}: dependency keys must be strings", path.display()))?
            .to_string();
        let entry: ProjectDependencyEntry = serde_yaml::from_value(value)
            .with_context(|| format!("{}: dependency '{alias}' is malformed", path.display()))?;
        dependencies.push((alias, entry));
    }

    Ok(ProjectConfig {
        default_registry: raw.default_registry,
        dependencies,
    })
}

/// Saves `cfg` to `path`, preferring an in-place incremental edit of the
/// existing file over full regeneration. See the module docs for why.
pub fn save_project_config(path: &Path, cfg: &ProjectConfig) -> anyhow::Result<()> {
    if path.exists() {
        let original = fs::read_to_string(path)
            .with_context(|| format!("reading project config {}", path.display()))?;
        if let Some(patched) = try_incremental_patch(&original, cfg)? {
            if patched == original {
                return Ok(());
            }
            fs::write(path, patched)
                .with_context(|| format!("writing project config {}", path.display()))?;
            return Ok(());
        }
    }
    regenerate(path, cfg)
}

/// Attempts an in-place edit of `original` using [`nondestructive`]. Returns
/// `Ok(None)` when the change is structural (alias added or removed) and a
/// scalar patch can't safely express it, signalling the caller to fall back
/// to [`regenerate`].
fn try_incremental_patch(original: &str, cfg: &ProjectConfig) -> anyhow::Result<Option<String>> {
    let before = load_project_config_str(original)?;

    let before_aliases: Vec<&str> = before.dependencies.iter().map(|(a, _)| a.as_str()).collect();
    let after_aliases: Vec<&str> = cfg.dependencies.iter().map(|(a, _)| a.as_str()).collect();
    if before_aliases != after_aliases {
        return Ok(None);
    }

    let mut doc = nondestructive::yaml::from_slice(original.as_bytes())
        .with_context(|| "parsing project config for incremental edit")?;
    let mut root = doc.as_mut();
    let Some(mut mapping) = root.as_mapping_mut() else {
        return Ok(None);
    };

    if before.default_registry != cfg.default_registry {
        match mapping.get_mut("defaultRegistry") {
            Some(mut value) => {
                value.set_string(&cfg.default_registry);
            }
            None => return Ok(None),
        }
    }

    let before_by_alias: HashMap<&str, &ProjectDependencyEntry> =
        before.dependencies.iter().map(|(a, e)| (a.as_str(), e)).collect();

    for (alias, after_entry) in &cfg.dependencies {
        let Some(before_entry) = before_by_alias.get(alias.as_str()) else {
            return Ok(None);
        };
        if *before_entry == after_entry {
            continue;
        }
        let Some(mut deps_mapping) = mapping.get_mut("dependencies").and_then(|v| v.into_mapping_mut()) else {
            return Ok(None);
        };
        let Some(mut entry_mapping) = deps_mapping
            .get_mut(alias.as_str())
            .and_then(|v| v.into_mapping_mut())
        else {
            return Ok(None);
        };

        if before_entry.version != after_entry.version {
            match entry_mapping.get_mut("version") {
                Some(mut v) => v.set_string(&after_entry.version),
                None => return Ok(None),
            }
        }
        if before_entry.registry != after_entry.registry {
            match (after_entry.registry.as_ref(), entry_mapping.get_mut("registry")) {
                (Some(new), Some(mut v)) => v.set_string(new),
                _ => return Ok(None),
            }
        }
        if before_entry.name != after_entry.name {
            match (after_entry.name.as_ref(), entry_mapping.get_mut("name")) {
                (Some(new), Some(mut v)) => v.set_string(new),
                _ => return Ok(None),
            }
        }
        if before_entry.checksum != after_entry.checksum {
            match (after_entry.checksum.as_ref(), entry_mapping.get_mut("checksum")) {
                (Some(new), Some(mut v)) => v.set_string(new),
                _ => return Ok(None),
            }
        }
    }

    Ok(Some(doc.to_string()))
}

fn load_project_config_str(data: &str) -> anyhow::Result<ProjectConfig> {
    let raw: RawProjectConfig =
        serde_yaml::from_str(data).with_context(|| "parsing project config")?;
    let mut dependencies = Vec::with_capacity(raw.dependencies.len());
    for (key, value) in raw.dependencies {
        let alias = key
            .as_str()
            .context("dependency keys must be strings")?
            .to_string();
        let entry: ProjectDependencyEntry = serde_yaml::from_value(value)
            .with_context(|| format!("dependency '{alias}' is malformed"))?;
        dependencies.push((alias, entry));
    }
    Ok(ProjectConfig {
        default_registry: raw.default_registry,
        dependencies,
    })
}

/// Full regeneration through `serde_yaml::Mapping`: order-preserving, but
/// any comments or unusual formatting in a prior file are lost.
fn regenerate(path: &Path, cfg: &ProjectConfig) -> anyhow::Result<()> {
    let mut root = serde_yaml::Mapping::new();
    root.insert(
        Value::String("defaultRegistry".into()),
        Value::String(cfg.default_registry.clone()),
    );

    let mut deps = serde_yaml::Mapping::new();
    for (alias, entry) in &cfg.dependencies {
        let value = serde_yaml::to_value(entry)
            .with_context(|| format!("serializing dependency '{alias}'"))?;
        deps.insert(Value::String(alias.clone()), value);
    }
    root.insert(Value::String("dependencies".into()), Value::Mapping(deps));

    let rendered = serde_yaml::to_string(&Value::Mapping(root))
        .with_context(|| "rendering project config")?;
    fs::write(path, rendered).with_context(|| format!("writing project config {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> ProjectConfig {
        let mut cfg = ProjectConfig {
            default_registry: "https://example.invalid/registry.yaml".to_string(),
            dependencies: Vec::new(),
        };
        cfg.upsert(
            "lint",
            ProjectDependencyEntry {
                name: None,
                registry: None,
                version: "1.0.0".to_string(),
                checksum: None,
            },
        );
        cfg
    }

    #[test]
    fn round_trips_through_load_and_save() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(PROJECT_CONFIG_FILE_NAME);
        let cfg = sample();
        save_project_config(&path, &cfg).unwrap();
        let reloaded = load_project_config(&path).unwrap();
        assert_eq!(reloaded, cfg);
    }

    #[test]
    fn resaving_unchanged_config_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(PROJECT_CONFIG_FILE_NAME);
        let cfg = sample();
        save_project_config(&path, &cfg).unwrap();
        let before = fs::read_to_string(&path).unwrap();

        let reloaded = load_project_config(&path).unwrap();
        save_project_config(&path, &reloaded).unwrap();
        let after = fs::read_to_string(&path).unwrap();

        assert_eq!(before, after);
    }

    #[test]
    fn adding_a_new_alias_falls_back_to_regeneration_and_keeps_both() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(PROJECT_CONFIG_FILE_NAME);
        let mut cfg = sample();
        save_project_config(&path, &cfg).unwrap();

        cfg.upsert(
            "fmt",
            ProjectDependencyEntry {
                name: None,
                registry: None,
                version: "2.0.0".to_string(),
                checksum: None,
            },
        );
        save_project_config(&path, &cfg).unwrap();

        let reloaded = load_project_config(&path).unwrap();
        assert_eq!(reloaded, cfg);
        assert!(reloaded.find("lint").is_some());
        assert!(reloaded.find("fmt").is_some());
    }

    #[test]
    fn changing_a_version_in_place_preserves_surrounding_comment() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(PROJECT_CONFIG_FILE_NAME);
        fs::write(
            &path,
            "defaultRegistry: https://example.invalid/registry.yaml\n# pinned for the release branch\ndependencies:\n  lint:\n    version: 1.0.0\n",
        )
        .unwrap();

        let mut cfg = load_project_config(&path).unwrap();
        cfg.upsert(
            "lint",
            ProjectDependencyEntry {
                name: None,
                registry: None,
                version: "1.1.0".to_string(),
                checksum: None,
            },
        );
        save_project_config(&path, &cfg).unwrap();

        let after = fs::read_to_string(&path).unwrap();
        assert!(after.contains("# pinned for the release branch"));
        assert!(after.contains("1.1.0"));
    }

    #[test]
    fn missing_file_loads_as_empty_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(PROJECT_CONFIG_FILE_NAME);
        let cfg = load_project_config(&path).unwrap();
        assert_eq!(cfg, ProjectConfig::default());
    }
}
