//! # wharf
//!
//! An extensible CLI host: a small built-in surface (`get`, `remove`,
//! `completions`) for managing installed subcommands, plus a dispatcher
//! that forwards everything else to whatever external binaries those
//! subcommands installed, piping their structured log output back through
//! the host's own logger.
//!
//! Installed commands are fetched from a registry (a `file://` directory
//! or an HTTP endpoint serving a YAML index), content-addressed and
//! checksum-verified on disk, and recorded in a per-scope dependency
//! index so they can be resolved, updated, or removed later.

pub mod cli;
pub mod commands;
pub mod config;
pub mod dependency;
pub mod dispatcher;
pub mod error;
pub mod filelock;
pub mod loader;
pub mod log;
pub mod registry;
pub mod scope;
pub mod tarball;
pub mod version;
