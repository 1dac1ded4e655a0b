//! Error kinds shared across the dependency manager, loader, and dispatcher.
//!
//! Most call sites just want `anyhow::Result` with a readable context chain,
//! but a few callers (the loader deciding whether to warn-and-skip, the
//! dispatcher deciding which exit code to use) need to match on *kind*. This
//! is that small, stable vocabulary.

use std::fmt;

/// A classified failure from one of the host's core subsystems.
///
/// Implements [`std::error::Error`] so it composes with `anyhow::Context`;
/// callers that only care about a human-readable message can ignore the
/// variant and just format it.
#[derive(Debug)]
pub enum HostError {
    /// Bad CLI input: invalid name, invalid URL, invalid semver constraint.
    InvalidRequest(String),
    /// No registry entry satisfies the requested version/os/arch.
    NoMatchingVersion(String),
    /// The registry index could not be fetched (network, missing file, HTTP >= 300).
    RegistryUnreachable(String),
    /// The registry index was fetched but is not a valid index document.
    RegistryMalformed(String),
    /// The artifact archive could not be downloaded.
    ArtifactUnreachable(String),
    /// The downloaded artifact's SHA-256 does not match the expected value.
    ChecksumMismatch { expected: String, actual: String },
    /// The archive is malformed or contains an entry type we don't support.
    ExtractionError(String),
    /// The installed-index JSON could not be read or written.
    IndexError(String),
    /// Another process currently holds the install-directory lock.
    LockBusy(String),
    /// A generic filesystem operation (mkdir, remove, rename) failed.
    FilesystemError(String),
    /// The dispatched child exited with a non-zero status.
    ChildExitNonZero(i32),
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::InvalidRequest(msg) => write!(f, "invalid request: {msg}"),
            HostError::NoMatchingVersion(msg) => write!(f, "no matching version: {msg}"),
            HostError::RegistryUnreachable(msg) => write!(f, "registry unreachable: {msg}"),
            HostError::RegistryMalformed(msg) => write!(f, "registry malformed: {msg}"),
            HostError::ArtifactUnreachable(msg) => write!(f, "artifact unreachable: {msg}"),
            HostError::ChecksumMismatch { expected, actual } => write!(
                f,
                "checksum mismatch: expected {expected}, computed {actual}"
            ),
            HostError::ExtractionError(msg) => write!(f, "extraction error: {msg}"),
            HostError::IndexError(msg) => write!(f, "index error: {msg}"),
            HostError::LockBusy(msg) => write!(f, "lock busy: {msg}"),
            HostError::FilesystemError(msg) => write!(f, "filesystem error: {msg}"),
            HostError::ChildExitNonZero(code) => write!(f, "child exited with status {code}"),
        }
    }
}

impl std::error::Error for HostError {}
