//! `wharf remove`: deletes an installed command from the
//! chosen scope's index and artifact directory, and drops it from the
//! project config unless the scope is global.

use anyhow::Context;

use crate::cli::RemoveArgs;
use crate::config::project;
use crate::dependency::manager::Manager;
use crate::scope::Paths;

pub fn run(args: RemoveArgs, paths: &Paths) -> anyhow::Result<()> {
    if args.global {
        let install_dir = paths
            .global_install_dir
            .as_ref()
            .context("cannot determine home directory")?;
        let manager = Manager::new(String::new());
        manager
            .remove(&args.alias, install_dir)
            .with_context(|| format!("removing {}", args.alias))?;
        crate::log::info(format!("Removed {}", args.alias));
        return Ok(());
    }

    let install_dir = paths
        .project_install_dir
        .as_ref()
        .context("no project found in this directory or any parent directory")?;
    let manager = Manager::new(String::new());
    manager
        .remove(&args.alias, install_dir)
        .with_context(|| format!("removing {}", args.alias))?;

    if let Some(config_path) = &paths.project_config_file {
        let mut project_config = project::load_project_config(config_path)?;
        if project_config.remove(&args.alias).is_some() {
            project::save_project_config(config_path, &project_config)
                .with_context(|| format!("unable to update dependencies in {}", config_path.display()))?;
        }
    }

    crate::log::info(format!("Removed {}", args.alias));
    Ok(())
}
