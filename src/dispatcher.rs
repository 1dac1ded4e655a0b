//! Dispatcher: spawns an installed command's binary, wires its
//! stdio, races an update-check against a 5-second timeout, and surfaces
//! its exit code as the host's own.
//!
//! Passthrough vs. piped stdio is chosen by manifest API version, stdin
//! is always bound to the parent's, and the update-check thread races a
//! channel receive against a timeout alongside the child's `wait()`.

use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use crate::config::manifest::{CommandManifest, PASSTHROUGH_API_VERSION};
use crate::dependency::manager::Manager;
use crate::dependency::DependenciesIndexEntry;
use crate::error::HostError;
use crate::log::Level;
use crate::log::processor::Processor;

pub const GLOBAL_COMMAND_ENV_VAR: &str = "WHARF_GLOBAL_COMMAND";
pub const SKIP_UPDATE_CHECK_ENV_VAR: &str = "WHARF_SKIP_UPDATE_CHECK";

const UPDATE_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs `entry`'s binary (resolved via `manifest` inside `command_dir`)
/// with `args` forwarded verbatim, and returns the process's exit code.
pub fn dispatch(
    manifest: &CommandManifest,
    command_dir: &Path,
    entry: &DependenciesIndexEntry,
    is_global: bool,
    args: &[String],
) -> Result<i32, HostError> {
    let bin_path = manifest.binary_path(command_dir);

    let mut cmd = if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.arg("/c").arg(&bin_path).args(args);
        c
    } else {
        let mut c = Command::new(&bin_path);
        c.args(args);
        c
    };

    cmd.env(
        GLOBAL_COMMAND_ENV_VAR,
        if is_global { "true" } else { "false" },
    );
    cmd.stdin(Stdio::inherit());

    let structured = manifest.api_version != PASSTHROUGH_API_VERSION;
    if structured {
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
    } else {
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::inherit());
    }

    crate::log::debug(format!(
        "running {} {}",
        bin_path.display(),
        args.join(" ")
    ));

    let mut child = cmd
        .spawn()
        .map_err(|e| HostError::FilesystemError(format!("spawning {}: {e}", bin_path.display())))?;

    let mut log_threads = Vec::new();
    if structured {
        if let Some(stdout) = child.stdout.take() {
            let logger = crate::log::default_logger();
            log_threads.push(thread::spawn(move || {
                Processor::new(Level::Info, logger, stdout).process();
            }));
        }
        if let Some(stderr) = child.stderr.take() {
            let logger = crate::log::error_logger();
            log_threads.push(thread::spawn(move || {
                Processor::new(Level::Error, logger, stderr).process();
            }));
        }
    }

    let update_hint = spawn_update_check(entry.clone(), is_global);

    for handle in log_threads {
        let _ = handle.join();
    }

    let status = child
        .wait()
        .map_err(|e| HostError::FilesystemError(format!("waiting for {}: {e}", bin_path.display())))?;

    if let Some(hint) = update_hint.join_with_timeout(UPDATE_CHECK_TIMEOUT) {
        for line in hint.lines() {
            crate::log::warn(line.to_string());
        }
    }

    Ok(status.code().unwrap_or(1))
}

/// Handle to a background update-check. `join_with_timeout` never blocks
/// past the deadline; if the check hasn't finished by then its result is
/// discarded once the deadline passes.
struct UpdateCheckHandle {
    receiver: Option<std::sync::mpsc::Receiver<Option<String>>>,
}

impl UpdateCheckHandle {
    fn join_with_timeout(self, timeout: Duration) -> Option<String> {
        self.receiver?.recv_timeout(timeout).ok().flatten()
    }
}

fn spawn_update_check(entry: DependenciesIndexEntry, is_global: bool) -> UpdateCheckHandle {
    if std::env::var(SKIP_UPDATE_CHECK_ENV_VAR)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
    {
        return UpdateCheckHandle { receiver: None };
    }

    let (tx, rx) = std::sync::mpsc::channel();
    thread::spawn(move || {
        let dep = entry.to_dependency();
        let mut manager = Manager::new(dep.registry.clone());
        let updates = manager.check_for_update(&dep);

        let install_cmd = |version: &str| {
            let mut cmd = "wharf get".to_string();
            if is_global {
                cmd.push_str(" -g");
            }
            cmd.push_str(&format!(
                " {} --version {} --from {}",
                dep.name, version, dep.registry
            ));
            if dep.name != dep.alias {
                cmd.push_str(&format!(" --as {}", dep.alias));
            }
            cmd
        };

        let message = if !updates.non_breaking.is_empty() {
            Some(format!(
                "New version of this command is available, please update it using:\n    {}",
                install_cmd(&updates.non_breaking)
            ))
        } else if !updates.breaking.is_empty() {
            Some(format!(
                "New version of this command is available, but it may introduce some BREAKING CHANGES. Please consider updating it using:\n    {}",
                install_cmd(&updates.breaking)
            ))
        } else {
            None
        };

        let _ = tx.send(message);
    });

    UpdateCheckHandle { receiver: Some(rx) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn install_script(dir: &Path, body: &str) {
        let bin_dir = dir.join("bin");
        fs::create_dir_all(&bin_dir).unwrap();
        let script_path = bin_dir.join("cmd");
        fs::write(&script_path, format!("#!/bin/sh\n{body}\n")).unwrap();
        let mut perms = fs::metadata(&script_path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&script_path, perms).unwrap();
    }

    fn passthrough_manifest() -> CommandManifest {
        CommandManifest {
            api_version: PASSTHROUGH_API_VERSION.to_string(),
            kind: "Command".to_string(),
            bin_path: "bin/cmd".to_string(),
            description: String::new(),
            version: "1.0.0".to_string(),
        }
    }

    fn dummy_entry() -> DependenciesIndexEntry {
        DependenciesIndexEntry {
            alias: "cmd".to_string(),
            registry: "file:///dev/null".to_string(),
            name: "cmd".to_string(),
            version: "1.0.0".to_string(),
            os: String::new(),
            arch: String::new(),
            checksum: "sha256-test".to_string(),
            path: "dependencies/sha256-test".to_string(),
        }
    }

    /// Scenario 5 from the testable-properties section: the host's exit
    /// code matches whatever the dispatched child returned.
    #[test]
    fn forwards_child_exit_code() {
        std::env::set_var(SKIP_UPDATE_CHECK_ENV_VAR, "true");
        let dir = TempDir::new().unwrap();
        install_script(dir.path(), "exit 42");

        let code = dispatch(
            &passthrough_manifest(),
            dir.path(),
            &dummy_entry(),
            true,
            &[],
        )
        .unwrap();

        assert_eq!(code, 42);
        std::env::remove_var(SKIP_UPDATE_CHECK_ENV_VAR);
    }

    #[test]
    fn passes_global_command_flag_to_child() {
        std::env::set_var(SKIP_UPDATE_CHECK_ENV_VAR, "true");
        let dir = TempDir::new().unwrap();
        let out_file = dir.path().join("out.txt");
        install_script(
            dir.path(),
            &format!("echo \"$WHARF_GLOBAL_COMMAND\" > {}", out_file.display()),
        );

        let code = dispatch(
            &passthrough_manifest(),
            dir.path(),
            &dummy_entry(),
            true,
            &[],
        )
        .unwrap();

        assert_eq!(code, 0);
        assert_eq!(fs::read_to_string(&out_file).unwrap().trim(), "true");
        std::env::remove_var(SKIP_UPDATE_CHECK_ENV_VAR);
    }
}
