//! Built-in command glue: ties the CLI surface to the scope
//! resolver, dependency manager, loader, and dispatcher.
//!
//! Verbosity is parsed before anything else runs (so even argument parsing
//! errors get the right log level), then installed commands are
//! discovered, built-ins are registered first, and dynamic subcommands are
//! merged in for everything the loader found.

pub mod completions;
pub mod get;
pub mod remove;

use std::env;
use std::io::Read;
use std::process::{Command as ProcessCommand, Stdio};

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command, CommandFactory, FromArgMatches};

use crate::cli::{BuiltinCommand, Cli};
use crate::config::{self, GlobalConfig};
use crate::dependency::manager::Manager;
use crate::dispatcher;
use crate::loader::{self, LoadedCommand};
use crate::log::{self, Level};
use crate::scope::Paths;

pub const LOG_LEVEL_ENV_VAR: &str = "WHARF_LOG_LEVEL";

/// Parses arguments, discovers installed commands, and dispatches to
/// whichever built-in or installed command was requested. Returns the
/// process exit code the caller should use.
pub fn run() -> Result<i32> {
    let raw_args: Vec<String> = env::args().collect();

    let level = resolve_initial_level(&raw_args);
    log::init(level);
    env::set_var(LOG_LEVEL_ENV_VAR, level.as_str());

    let paths = Paths::discover();
    let global_config = config::load_global_config().unwrap_or_else(|e| {
        log::warn(format!("failed to load global config: {e}"));
        GlobalConfig::default()
    });

    let project_config = paths
        .project_config_file
        .as_ref()
        .and_then(|p| config::project::load_project_config(p).ok());

    let registry_for_reinstall = project_config
        .as_ref()
        .map(|c| c.default_registry.clone())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| global_config.default_registry.clone());
    let mut reinstall_manager = Manager::new(registry_for_reinstall);

    let first_arg = raw_args.get(1).filter(|a| !a.starts_with('-')).cloned();

    let loaded = loader::load_commands(
        &paths,
        project_config.as_ref(),
        &mut reinstall_manager,
        first_arg.as_deref(),
    );

    let mut cmd = Cli::command();
    for lc in &loaded {
        cmd = cmd.subcommand(dynamic_subcommand(lc));
    }
    cmd = cmd.subcommand(
        Command::new("__complete")
            .hide(true)
            .disable_help_flag(true)
            .arg(
                Arg::new("args")
                    .num_args(0..)
                    .trailing_var_arg(true)
                    .allow_hyphen_values(true),
            ),
    );

    let matches = cmd.clone().try_get_matches_from(&raw_args)?;

    if let Some((name, sub_matches)) = matches.subcommand() {
        if name == "__complete" {
            return forward_completion(sub_matches, &loaded);
        }
        if let Some(lc) = loaded.iter().find(|lc| lc.entry.alias == name) {
            let forwarded = forwarded_args(sub_matches);
            let exit = dispatcher::dispatch(
                &lc.manifest,
                &lc.command_dir,
                &lc.entry,
                lc.scope == crate::scope::Scope::Global,
                &forwarded,
            )?;
            return Ok(exit);
        }
    }

    let cli = Cli::from_arg_matches(&matches).context("parsing built-in command arguments")?;
    match cli.command {
        Some(BuiltinCommand::Get(args)) => {
            get::run(args, &paths, &global_config)?;
            Ok(0)
        }
        Some(BuiltinCommand::Remove(args)) => {
            remove::run(args, &paths)?;
            Ok(0)
        }
        Some(BuiltinCommand::Completions(args)) => {
            completions::run(args)?;
            Ok(0)
        }
        None => {
            cmd.clone().print_help().ok();
            Ok(1)
        }
    }
}

fn dynamic_subcommand(lc: &LoadedCommand) -> Command {
    Command::new(lc.entry.alias.clone())
        .about(lc.manifest.description.clone())
        .disable_help_flag(true)
        .disable_version_flag(true)
        .arg(
            Arg::new("args")
                .num_args(0..)
                .trailing_var_arg(true)
                .allow_hyphen_values(true),
        )
}

fn forwarded_args(sub_matches: &ArgMatches) -> Vec<String> {
    sub_matches
        .get_many::<String>("args")
        .map(|vals| vals.cloned().collect())
        .unwrap_or_default()
}

/// Forwards a shell completion request to the target alias's own binary,
/// the child is invoked with `__complete` plus the forwarded
/// argv, and replies with candidate lines terminated by a `:<directive>`
/// trailer line that we pass straight through.
fn forward_completion(sub_matches: &ArgMatches, loaded: &[LoadedCommand]) -> Result<i32> {
    let args = forwarded_args(sub_matches);
    let Some(alias) = args.first() else {
        return Ok(0);
    };
    let Some(lc) = loaded.iter().find(|lc| &lc.entry.alias == alias) else {
        return Ok(0);
    };

    let bin_path = lc.manifest.binary_path(&lc.command_dir);
    let mut child_args = vec!["__complete".to_string()];
    child_args.extend(args.iter().skip(1).cloned());

    let output = ProcessCommand::new(&bin_path)
        .args(&child_args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .with_context(|| format!("forwarding completion request to {}", bin_path.display()))?;

    print!("{}", String::from_utf8_lossy(&output.stdout));
    Ok(0)
}

/// Determines the initial log level: start from `-v`/`--log-level`, then
/// let `WHARF_LOG_LEVEL` override if set. This runs before full CLI
/// parsing so early failures still log at the right level.
fn resolve_initial_level(raw_args: &[String]) -> Level {
    let mut level = Level::Info;

    if let Some(idx) = raw_args.iter().position(|a| a == "--log-level") {
        if let Some(name) = raw_args.get(idx + 1) {
            if let Ok(parsed) = name.parse() {
                level = parsed;
            }
        }
    }

    let verbosity = raw_args
        .iter()
        .filter(|a| {
            a.starts_with('-')
                && !a.starts_with("--")
                && a.trim_start_matches('-').chars().all(|c| c == 'v')
                && a.len() > 1
        })
        .map(|a| a.trim_start_matches('-').len())
        .sum::<usize>();
    level = level.increase(verbosity as u8);

    if let Ok(env_level) = env::var(LOG_LEVEL_ENV_VAR) {
        if let Ok(parsed) = env_level.parse() {
            level = parsed;
        }
    }

    level
}
