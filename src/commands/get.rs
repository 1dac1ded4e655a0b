//! `wharf get`: installs one dependency, or every dependency
//! pinned in the project config when no alias is given.
//!
//! Picks a scope (global vs. project), validates/initializes its paths,
//! installs, then (project scope only, unless `--no-save`) writes the
//! result back to the project config.

use std::fs;

use anyhow::{bail, Context};

use crate::cli::GetArgs;
use crate::config::project::{self, ProjectDependencyEntry};
use crate::config::GlobalConfig;
use crate::dependency::manager::Manager;
use crate::dependency::Dependency;
use crate::scope::{self, Paths};

pub fn run(args: GetArgs, paths: &Paths, global_config: &GlobalConfig) -> anyhow::Result<()> {
    if args.global {
        run_global(args, paths, global_config)
    } else {
        run_project(args, paths, global_config)
    }
}

fn run_global(args: GetArgs, paths: &Paths, global_config: &GlobalConfig) -> anyhow::Result<()> {
    let install_dir = paths
        .global_install_dir
        .clone()
        .context("cannot determine home directory")?;
    fs::create_dir_all(&install_dir)
        .with_context(|| format!("creating {}", install_dir.display()))?;

    let Some(alias) = &args.alias else {
        bail!("an alias is required when installing with --global");
    };

    let dep = request_from_args(alias, &args);
    let mut manager = Manager::new(global_config.default_registry.clone());
    let (resolved, _) = manager
        .install_with_mode(dep, &install_dir, args.upgrade)
        .with_context(|| format!("installing {alias}"))?;

    crate::log::info(format!(
        "Installed {}@{} from {} as {}",
        resolved.name, resolved.version, resolved.registry, resolved.alias
    ));
    Ok(())
}

fn run_project(args: GetArgs, paths: &Paths, global_config: &GlobalConfig) -> anyhow::Result<()> {
    let project_config_path = match &paths.project_config_file {
        Some(path) => path.clone(),
        None => {
            if args.no_init {
                bail!(
                    "{} not found; make sure it exists before running with --no-init",
                    project::PROJECT_CONFIG_FILE_NAME
                );
            }
            std::env::current_dir()
                .context("determining current directory")?
                .join(project::PROJECT_CONFIG_FILE_NAME)
        }
    };

    let install_dir = match &paths.project_install_dir {
        Some(dir) => dir.clone(),
        None => project_config_path
            .parent()
            .context("project config path has no parent directory")?
            .join(scope::install_dir_name()),
    };
    fs::create_dir_all(&install_dir)
        .with_context(|| format!("creating {}", install_dir.display()))?;

    let mut project_config = project::load_project_config(&project_config_path)?;
    if project_config.default_registry.is_empty() {
        project_config.default_registry = global_config.default_registry.clone();
    }

    let mut manager = Manager::new(project_config.default_registry.clone());

    let to_install: Vec<Dependency> = match &args.alias {
        Some(alias) => vec![request_from_args(alias, &args)],
        None => {
            if project_config.dependencies.is_empty() {
                bail!("no dependencies provided for the project");
            }
            project_config
                .dependencies
                .iter()
                .map(|(alias, entry)| Dependency {
                    name: entry.name.clone().unwrap_or_else(|| alias.clone()),
                    version: entry.version.clone(),
                    registry: entry
                        .registry
                        .clone()
                        .unwrap_or_else(|| project_config.default_registry.clone()),
                    alias: alias.clone(),
                    checksum: entry.checksum.clone().unwrap_or_default(),
                })
                .collect()
        }
    };

    // Per-dependency failures are reported but don't abort the rest of the
    // batch; the successes still get installed and saved, and the command
    // exits non-zero if any alias failed.
    let mut installed = Vec::with_capacity(to_install.len());
    let mut failed_aliases = Vec::new();
    for dep in to_install {
        let alias = dep.alias.clone();
        match manager.install_with_mode(dep, &install_dir, args.upgrade) {
            Ok((resolved, _)) => {
                crate::log::info(format!(
                    "Installed {}@{} from {} as {}",
                    resolved.name, resolved.version, resolved.registry, resolved.alias
                ));
                installed.push(resolved);
            }
            Err(e) => {
                crate::log::error(format!("failed to install {alias}: {e}"));
                failed_aliases.push(alias);
            }
        }
    }

    if !args.no_save {
        for dep in &installed {
            project_config.upsert(
                &dep.alias,
                ProjectDependencyEntry {
                    name: if dep.name == dep.alias {
                        None
                    } else {
                        Some(dep.name.clone())
                    },
                    registry: Some(dep.registry.clone()),
                    version: dep.version.clone(),
                    checksum: if dep.checksum.is_empty() {
                        None
                    } else {
                        Some(dep.checksum.clone())
                    },
                },
            );
        }
        project::save_project_config(&project_config_path, &project_config)
            .with_context(|| format!("unable to update dependencies in {}", project_config_path.display()))?;
    }

    if !failed_aliases.is_empty() {
        bail!("failed to install: {}", failed_aliases.join(", "));
    }

    Ok(())
}

fn request_from_args(alias: &str, args: &GetArgs) -> Dependency {
    let name = alias.to_string();
    let version = args.version.clone().unwrap_or_else(|| "*".to_string());
    // Leave empty when `--from` is absent: `Dependency::with_defaults` (applied
    // inside `Manager::install`) fills it from the manager's own default
    // registry, which is already the right one for the active scope (the
    // project's `defaultRegistry` for a project install, the global config's
    // for `--global`). Defaulting to the global registry here would shadow
    // that per-scope fallback.
    let registry = args.from.clone().unwrap_or_default();
    let resolved_alias = args.as_alias.clone().unwrap_or_else(|| name.clone());
    let checksum = args.checksum.clone().unwrap_or_default();

    Dependency {
        name,
        version,
        registry,
        alias: resolved_alias,
        checksum,
    }
}
