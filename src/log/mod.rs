//! Host diagnostics logging.
//!
//! Two process-wide sinks back every log statement the host itself makes
//! ([`default_logger`] for informational output on stdout, [`error_logger`]
//! for warnings/errors on stderr). Only the top-level entry point installs
//! their level from flags or `WHARF_LOG_LEVEL`; everything downstream
//! receives a `&Logger` handle rather than reaching for the globals
//! directly, except for the small `info!`/`warn!`/... convenience macros
//! below which mirror common package-level logging helpers.

pub mod level;
pub mod logger;
pub mod message;
pub mod processor;

use std::sync::OnceLock;

pub use level::Level;
pub use logger::{Logger, Output};
pub use message::Message;

static DEFAULT_LOGGER: OnceLock<Logger> = OnceLock::new();
static ERROR_LOGGER: OnceLock<Logger> = OnceLock::new();

/// Install the two global sinks at the given level. Must be called once,
/// early in `main`, before any other code logs anything.
pub fn init(level: Level) {
    let _ = DEFAULT_LOGGER.set(Logger::new(Output::Stdout, level));
    let _ = ERROR_LOGGER.set(Logger::new(Output::Stderr, level));
}

/// The stdout sink. Panics if [`init`] has not run yet.
pub fn default_logger() -> &'static Logger {
    DEFAULT_LOGGER
        .get()
        .expect("log::init must run before default_logger is used")
}

/// The stderr sink. Panics if [`init`] has not run yet.
pub fn error_logger() -> &'static Logger {
    ERROR_LOGGER
        .get()
        .expect("log::init must run before error_logger is used")
}

pub fn info(text: impl Into<String>) {
    default_logger().println(&Message::new(Level::Info, text));
}

pub fn verbose(text: impl Into<String>) {
    default_logger().println(&Message::new(Level::Verbose, text));
}

pub fn debug(text: impl Into<String>) {
    default_logger().println(&Message::new(Level::Debug, text));
}

pub fn spam(text: impl Into<String>) {
    default_logger().println(&Message::new(Level::Spam, text));
}

pub fn warn(text: impl Into<String>) {
    error_logger().println(&Message::new(Level::Warn, text));
}

pub fn error(text: impl Into<String>) {
    error_logger().println(&Message::new(Level::Error, text));
}
