//! Root CLI surface: the built-in verbs known at compile time.
//! Installed commands are data-driven dynamic subcommands and are merged
//! onto this tree's `clap::Command` at runtime by [`crate::commands::run`],
//! since `#[derive(Parser)]` cannot express subcommands whose names aren't
//! known until the installed-index has been read.

use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "wharf",
    version,
    about = "Extensible command host: install and run versioned command plugins"
)]
pub struct Cli {
    /// Increase log verbosity; repeat for more (-vv, -vvv).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Set the log level explicitly, overriding -v.
    #[arg(long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<BuiltinCommand>,
}

#[derive(Subcommand)]
pub enum BuiltinCommand {
    /// Install one or all of the project's pinned dependencies.
    Get(GetArgs),
    /// Remove an installed command.
    Remove(RemoveArgs),
    /// Generate a shell completion script for the host's built-in commands.
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct GetArgs {
    /// Alias of the dependency to install. Omitted: install everything
    /// pinned in the project config.
    pub alias: Option<String>,

    /// Install into the user-home scope instead of the project scope.
    #[arg(short = 'g', long = "global")]
    pub global: bool,

    /// Install but don't record the result in the project config.
    #[arg(long = "no-save")]
    pub no_save: bool,

    /// Fail instead of creating the project config/install dir if missing.
    #[arg(long = "no-init")]
    pub no_init: bool,

    /// Registry URL to install from, overriding any configured default.
    #[arg(long = "from")]
    pub from: Option<String>,

    /// Alias to register the installed command under.
    #[arg(long = "as")]
    pub as_alias: Option<String>,

    /// Semver constraint, e.g. `^1.2`, `*`, `>1.0`, or an exact version.
    #[arg(long = "version")]
    pub version: Option<String>,

    /// Install the highest available version instead of an exact match.
    #[arg(long = "upgrade")]
    pub upgrade: bool,

    /// Expected checksum of the downloaded archive, e.g. `sha256-...`;
    /// fails the install if the download doesn't match.
    #[arg(long = "checksum")]
    pub checksum: Option<String>,
}

#[derive(Args)]
pub struct RemoveArgs {
    pub alias: String,

    #[arg(short = 'g', long = "global")]
    pub global: bool,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate the script for (bash, zsh, fish, powershell, elvish).
    pub shell: clap_complete::Shell,
}
