//! `wharf completions <shell>`: static completion script for
//! the host's own built-in subcommands. Dynamic subcommands are out of
//! scope here; they're served per-invocation by the `__complete`
//! forwarding protocol in the loader/dispatcher instead.

use clap::CommandFactory;
use clap_complete::generate;

use crate::cli::{Cli, CompletionsArgs};

pub fn run(args: CompletionsArgs) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(args.shell, &mut cmd, name, &mut std::io::stdout());
    Ok(())
}
