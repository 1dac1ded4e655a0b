//! Install-directory resolution: deciding where a dependency lives —
//! under the user's home directory (global scope) or under a project root
//! discovered by walking upward from the current directory (project scope).
//!
//! A project root is the nearest ancestor of the current directory
//! containing the project config file, stopping at (and never including)
//! the home directory or the filesystem root.

use std::path::{Path, PathBuf};

use crate::config::project::PROJECT_CONFIG_FILE_NAME;

pub const INSTALL_DIR_NAME: &str = ".wharf";

/// Overrides [`INSTALL_DIR_NAME`] for both the user-home and project install
/// directories. Primarily for tests, so an end-to-end test can run
/// against an isolated temporary home without mutating the real one.
pub const INSTALL_SUBDIR_ENV_VAR: &str = "WHARF_INSTALL_SUBDIR";

pub fn install_dir_name() -> String {
    std::env::var(INSTALL_SUBDIR_ENV_VAR).unwrap_or_else(|_| INSTALL_DIR_NAME.to_string())
}

/// Where a dependency was (or would be) installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Global,
    Project,
}

#[derive(Debug, Clone)]
pub struct Paths {
    pub home_dir: Option<PathBuf>,
    pub global_install_dir: Option<PathBuf>,
    /// `None` when no ancestor directory holds a project config file.
    pub project_config_file: Option<PathBuf>,
    pub project_install_dir: Option<PathBuf>,
}

impl Paths {
    pub fn discover() -> Paths {
        let home_dir = dirs::home_dir().and_then(|p| std::fs::canonicalize(&p).ok().or(Some(p)));
        let global_install_dir = home_dir.as_ref().map(|h| h.join(install_dir_name()));

        let cwd = std::env::current_dir().ok();
        let project_config_file = cwd.and_then(|dir| {
            let dir = std::fs::canonicalize(&dir).unwrap_or(dir);
            find_project_config_file(&dir, home_dir.as_deref())
        });
        let project_install_dir = project_config_file
            .as_ref()
            .and_then(|f| f.parent())
            .map(|dir| dir.join(install_dir_name()));

        Paths {
            home_dir,
            global_install_dir,
            project_config_file,
            project_install_dir,
        }
    }

    /// Classifies `installed_path` (a command's install directory) as
    /// belonging to the global or project scope, based on which install
    /// directory contains it. Commands outside both are not classified
    /// (returns `None`) — callers should skip them.
    pub fn classify(&self, installed_path: &Path) -> Option<Scope> {
        if let Some(project_dir) = &self.project_install_dir {
            if installed_path.starts_with(project_dir) {
                return Some(Scope::Project);
            }
        }
        if let Some(global_dir) = &self.global_install_dir {
            if installed_path.starts_with(global_dir) {
                return Some(Scope::Global);
            }
        }
        None
    }
}

/// Walks upward from `start` looking for `wharf.yaml`, stopping before
/// crossing into the home directory and before reaching the filesystem
/// root. A bare home directory can never itself be treated as a project
/// root, even if it happens to contain a stray config file.
fn find_project_config_file(start: &Path, home_dir: Option<&Path>) -> Option<PathBuf> {
    let mut dir = start;
    loop {
        if Some(dir) == home_dir {
            return None;
        }

        let candidate = dir.join(PROJECT_CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }

        match dir.parent() {
            Some(parent) if parent != dir => dir = parent,
            _ => return None,
        }
    }
}
