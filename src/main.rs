//! # wharf
//!
//! Entry point: all real work happens in [`wharf::commands::run`], which
//! resolves logging, scope, and the installed-command set before parsing
//! the full CLI. Kept here is just the exit-code plumbing.

fn main() {
    match wharf::commands::run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err:?}");
            std::process::exit(1);
        }
    }
}
