//! Command manifest (`command.yaml`): the file inside every installed
//! dependency's directory that tells the loader how to run it.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::HostError;

/// API versions the loader knows how to dispatch. Anything else is an
/// unsupported manifest: warn and skip rather than registering it.
pub const SUPPORTED_API_VERSIONS: &[&str] = &["wharf/v1beta1", "wharf/v1"];

/// API version that gets passthrough stdio instead of the structured log
/// pipeline — kept for commands built against the older,
/// pre-structured-logging contract.
pub const PASSTHROUGH_API_VERSION: &str = "wharf/v1beta1";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandManifest {
    pub api_version: String,
    pub kind: String,
    pub bin_path: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: String,
}

pub const MANIFEST_FILE_NAME: &str = "command.yaml";

impl CommandManifest {
    /// Loads and validates `<dir>/command.yaml`. Does not check the API
    /// version allow-list here — that's the loader's call, since an
    /// unsupported version is a "skip with warning", not a hard error.
    pub fn load(dir: &Path) -> Result<CommandManifest, HostError> {
        let path = dir.join(MANIFEST_FILE_NAME);
        let data = fs::read_to_string(&path)
            .map_err(|e| HostError::IndexError(format!("reading {}: {e}", path.display())))?;
        let manifest: CommandManifest = serde_yaml::from_str(&data)
            .map_err(|e| HostError::IndexError(format!("parsing {}: {e}", path.display())))?;
        if manifest.kind != "Command" {
            return Err(HostError::IndexError(format!(
                "{}: expected kind 'Command', got '{}'",
                path.display(),
                manifest.kind
            )));
        }
        Ok(manifest)
    }

    pub fn is_supported(&self) -> bool {
        SUPPORTED_API_VERSIONS.contains(&self.api_version.as_str())
    }

    /// Absolute path to the binary this manifest points at, resolved
    /// relative to `dir` (the directory containing the manifest).
    pub fn binary_path(&self, dir: &Path) -> std::path::PathBuf {
        dir.join(&self.bin_path)
    }

    /// Checks that `bin_path` resolves to an existing file that's
    /// executable on Unix (any of the owner/group/other exec bits set).
    pub fn validate_binary(&self, dir: &Path) -> Result<(), HostError> {
        let path = self.binary_path(dir);
        let metadata = fs::metadata(&path).map_err(|e| {
            HostError::IndexError(format!("bin_path {} does not exist: {e}", path.display()))
        })?;
        if !metadata.is_file() {
            return Err(HostError::IndexError(format!(
                "bin_path {} is not a regular file",
                path.display()
            )));
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if metadata.permissions().mode() & 0o111 == 0 {
                return Err(HostError::IndexError(format!(
                    "bin_path {} is not executable",
                    path.display()
                )));
            }
        }

        Ok(())
    }
}
