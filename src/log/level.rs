//! Log level taxonomy shared by the host's own diagnostics and the
//! structured subprocess pipeline.
//!
//! Small-to-large means "more verbose, less important" — a message prints
//! when its level is less than or equal to the sink's threshold.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Disable = 0,
    Fatal = 1,
    Error = 2,
    Warn = 3,
    Info = 4,
    Verbose = 5,
    Debug = 6,
    Spam = 7,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Disable => "disable",
            Level::Fatal => "fatal",
            Level::Error => "error",
            Level::Warn => "warn",
            Level::Info => "info",
            Level::Verbose => "verbose",
            Level::Debug => "debug",
            Level::Spam => "spam",
        }
    }

    /// Display text used in the `[TAG]` prefix of a rendered record.
    pub fn display_text(&self) -> &'static str {
        match self {
            Level::Disable => "",
            Level::Fatal => "FATAL",
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Verbose => "VERBOSE",
            Level::Debug => "DEBUG",
            Level::Spam => "SPAM",
        }
    }

    /// One step more verbose, saturating at `spam`. Used by repeated `-v` flags.
    pub fn increase(self, steps: u8) -> Level {
        let next = (self as u8).saturating_add(steps).min(Level::Spam as u8);
        Level::from_u8(next)
    }

    fn from_u8(v: u8) -> Level {
        match v {
            0 => Level::Disable,
            1 => Level::Fatal,
            2 => Level::Error,
            3 => Level::Warn,
            4 => Level::Info,
            5 => Level::Verbose,
            6 => Level::Debug,
            _ => Level::Spam,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "disable" => Ok(Level::Disable),
            "fatal" => Ok(Level::Fatal),
            "error" => Ok(Level::Error),
            "warn" | "warning" => Ok(Level::Warn),
            "info" => Ok(Level::Info),
            "verbose" => Ok(Level::Verbose),
            "debug" => Ok(Level::Debug),
            "spam" => Ok(Level::Spam),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}
