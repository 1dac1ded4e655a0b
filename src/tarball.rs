//! Archive extractor: unpacks a gzipped tar stream into a target
//! directory, preserving mode bits on non-Windows hosts.

use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use tar::{Archive, EntryType};

use crate::error::HostError;

/// Extracts `gzip_stream` (a gzipped tar byte stream) into `output_dir`.
/// Directories are created if missing and tolerated if they already exist;
/// regular files are written and chmod'd from their tar header (Unix only).
/// Any other entry type is rejected.
pub fn extract(gzip_stream: impl Read, output_dir: &Path) -> Result<(), HostError> {
    crate::log::debug(format!("Start extracting tarball to {}", output_dir.display()));

    let decoder = GzDecoder::new(gzip_stream);
    let mut archive = Archive::new(decoder);

    let entries = archive
        .entries()
        .map_err(|e| HostError::ExtractionError(format!("reading tar stream: {e}")))?;

    for entry in entries {
        let mut entry =
            entry.map_err(|e| HostError::ExtractionError(format!("reading tar entry: {e}")))?;

        let entry_path = entry
            .path()
            .map_err(|e| HostError::ExtractionError(format!("invalid entry path: {e}")))?
            .into_owned();
        let path = output_dir.join(&entry_path);

        match entry.header().entry_type() {
            EntryType::Directory => {
                crate::log::spam(format!("Creating directory: {}", path.display()));
                match fs::create_dir_all(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
                    Err(e) => {
                        return Err(HostError::ExtractionError(format!(
                            "creating directory {}: {e}",
                            path.display()
                        )))
                    }
                }
            }
            EntryType::Regular => {
                crate::log::spam(format!("Creating file: {}", path.display()));
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).map_err(|e| {
                        HostError::ExtractionError(format!(
                            "creating parent directory for {}: {e}",
                            path.display()
                        ))
                    })?;
                }

                let mode = entry.header().mode().ok();
                let mut out_file = File::create(&path).map_err(|e| {
                    HostError::ExtractionError(format!("creating file {}: {e}", path.display()))
                })?;
                std::io::copy(&mut entry, &mut out_file).map_err(|e| {
                    HostError::ExtractionError(format!("writing file {}: {e}", path.display()))
                })?;

                // Close promptly: archives with many members must not hold
                // every handle open until the loop finishes.
                drop(out_file);

                #[cfg(unix)]
                if let Some(mode) = mode {
                    use std::os::unix::fs::PermissionsExt;
                    let perms = fs::Permissions::from_mode(mode);
                    fs::set_permissions(&path, perms).map_err(|e| {
                        HostError::ExtractionError(format!(
                            "setting permissions on {}: {e}",
                            path.display()
                        ))
                    })?;
                }
            }
            other => {
                return Err(HostError::ExtractionError(format!(
                    "tarball contains unsupported entry type {other:?} in {}",
                    path.display()
                )))
            }
        }
    }

    Ok(())
}
