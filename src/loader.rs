//! Command loader: turns installed-index entries into a registry of
//! runnable commands, handling scope precedence, manifest validation, and
//! the project auto-reinstall hook.
//!
//! Registration is first-writer-wins (project entries merged before global
//! ones), a bad manifest is a warn-and-skip rather than a hard failure, and
//! the version-mismatch reinstall hook is gated by an environment
//! opt-out.

use std::path::PathBuf;

use crate::config::manifest::CommandManifest;
use crate::config::project::ProjectConfig;
use crate::dependency::index::DependenciesIndex;
use crate::dependency::manager::Manager;
use crate::dependency::DependenciesIndexEntry;
use crate::scope::{Paths, Scope};

pub const SKIP_AUTO_DOWNLOAD_ENV_VAR: &str = "WHARF_SKIP_PROJECT_COMMAND_AUTO_DOWNLOAD";

/// An installed command ready to be registered as a subcommand.
pub struct LoadedCommand {
    pub entry: DependenciesIndexEntry,
    pub manifest: CommandManifest,
    pub command_dir: PathBuf,
    pub scope: Scope,
}

/// Reads both install directories' indexes, validates each entry's
/// manifest, and applies the auto-reinstall hook, returning one
/// [`LoadedCommand`] per alias with project entries taking precedence over
/// global ones.
pub fn load_commands(
    paths: &Paths,
    project_config: Option<&ProjectConfig>,
    manager: &mut Manager,
    first_arg: Option<&str>,
) -> Vec<LoadedCommand> {
    let mut seen = std::collections::HashSet::new();
    let mut loaded = Vec::new();

    if let Some(project_dir) = &paths.project_install_dir {
        load_scope(
            project_dir,
            Scope::Project,
            &mut seen,
            &mut loaded,
            project_config,
            manager,
            first_arg,
        );
    }

    if let Some(global_dir) = &paths.global_install_dir {
        load_scope(
            global_dir,
            Scope::Global,
            &mut seen,
            &mut loaded,
            project_config,
            manager,
            first_arg,
        );
    }

    loaded
}

#[allow(clippy::too_many_arguments)]
fn load_scope(
    install_dir: &std::path::Path,
    scope: Scope,
    seen: &mut std::collections::HashSet<String>,
    loaded: &mut Vec<LoadedCommand>,
    project_config: Option<&ProjectConfig>,
    manager: &mut Manager,
    first_arg: Option<&str>,
) {
    let index = match DependenciesIndex::load(install_dir) {
        Ok(idx) => idx,
        Err(e) => {
            crate::log::debug(format!("cannot load index at {}: {e}", install_dir.display()));
            return;
        }
    };

    for mut entry in index.entries {
        if seen.contains(&entry.alias) {
            crate::log::spam(format!(
                "cannot register already registered command '{}'",
                entry.alias
            ));
            continue;
        }

        if scope == Scope::Project {
            maybe_auto_reinstall(&mut entry, project_config, manager, install_dir, first_arg);
        }

        let command_dir = match DependenciesIndex::validate_entry(&entry, install_dir) {
            Ok(dir) => dir,
            Err(e) => {
                crate::log::warn(format!("cannot load command '{}': {e}", entry.alias));
                continue;
            }
        };

        let manifest = match CommandManifest::load(&command_dir) {
            Ok(m) => m,
            Err(e) => {
                crate::log::warn(format!("cannot load command '{}': {e}", entry.alias));
                continue;
            }
        };

        if !manifest.is_supported() {
            crate::log::warn(format!(
                "command '{}' uses unsupported API version '{}', skipping",
                entry.alias, manifest.api_version
            ));
            continue;
        }

        if let Err(e) = manifest.validate_binary(&command_dir) {
            crate::log::warn(format!("cannot load command '{}': {e}", entry.alias));
            continue;
        }

        seen.insert(entry.alias.clone());
        loaded.push(LoadedCommand {
            entry,
            manifest,
            command_dir,
            scope,
        });
    }
}

/// If the user is about to run this exact alias and the
/// project config pins a different version than what's installed,
/// synchronously reinstall the pinned version before registering it.
fn maybe_auto_reinstall(
    entry: &mut DependenciesIndexEntry,
    project_config: Option<&ProjectConfig>,
    manager: &mut Manager,
    install_dir: &std::path::Path,
    first_arg: Option<&str>,
) {
    if std::env::var(SKIP_AUTO_DOWNLOAD_ENV_VAR)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
    {
        return;
    }

    if first_arg != Some(entry.alias.as_str()) {
        return;
    }

    let Some(project_config) = project_config else {
        return;
    };
    let Some(pinned) = project_config.find(&entry.alias) else {
        return;
    };
    if pinned.version == entry.version {
        return;
    }

    let dep = crate::dependency::Dependency {
        name: pinned.name.clone().unwrap_or_else(|| entry.name.clone()),
        version: pinned.version.clone(),
        registry: pinned.registry.clone().unwrap_or_else(|| entry.registry.clone()),
        alias: entry.alias.clone(),
        checksum: pinned.checksum.clone().unwrap_or_default(),
    };

    crate::log::info(format!(
        "{} is pinned to {} but {} is installed, reinstalling",
        entry.alias, pinned.version, entry.version
    ));

    match manager.install(dep, install_dir) {
        Ok((_, new_entry)) => *entry = new_entry,
        Err(e) => crate::log::warn(format!("failed to auto-reinstall '{}': {e}", entry.alias)),
    }
}
