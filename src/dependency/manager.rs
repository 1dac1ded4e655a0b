//! Dependency manager: orchestrates the version matcher, registry
//! client, file lock, archive extractor, and installed-index store to
//! install, remove, and check updates for dependencies.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::dependency::index::DependenciesIndex;
use crate::dependency::{Dependency, DependenciesIndexEntry};
use crate::error::HostError;
use crate::filelock::FileLock;
use crate::registry::{self, Registry};
use crate::tarball;

/// Result of an update check: either field is empty
/// when no newer version of that kind is available.
#[derive(Debug, Default, Clone)]
pub struct Updates {
    pub non_breaking: String,
    pub breaking: String,
}

/// Orchestrates installs/removals/update-checks against one or more
/// registries, memoizing each registry's loaded index for the lifetime of
/// the manager (one host invocation).
pub struct Manager {
    pub default_registry: String,
    registries: HashMap<String, Box<dyn Registry>>,
}

impl Manager {
    pub fn new(default_registry: impl Into<String>) -> Self {
        Manager {
            default_registry: default_registry.into(),
            registries: HashMap::new(),
        }
    }

    fn registry_for(&mut self, url: &str) -> Result<&mut Box<dyn Registry>, HostError> {
        if !self.registries.contains_key(url) {
            let mut reg = registry::new(url);
            reg.update()?;
            self.registries.insert(url.to_string(), reg);
        }
        Ok(self.registries.get_mut(url).expect("just inserted"))
    }

    /// Installs `dep` into `install_dir`, following the eleven steps of
    /// Returns the entry that was written to the index, with `dep`'s
    /// version resolved to the concrete version that was installed.
    pub fn install(
        &mut self,
        dep: Dependency,
        install_dir: &Path,
    ) -> Result<(Dependency, DependenciesIndexEntry), HostError> {
        self.install_with_mode(dep, install_dir, false)
    }

    /// Installs `dep`, honoring `--upgrade`: instead of the exact-match
    /// selection, resolve the highest-breaking entry above whatever version
    /// of `dep.alias` is currently installed in `install_dir` (or above
    /// `0.0.0` when nothing is installed yet).
    pub fn install_with_mode(
        &mut self,
        mut dep: Dependency,
        install_dir: &Path,
        upgrade: bool,
    ) -> Result<(Dependency, DependenciesIndexEntry), HostError> {
        dep = dep.with_defaults(&self.default_registry);

        fs::create_dir_all(install_dir)
            .map_err(|e| HostError::FilesystemError(format!("creating {}: {e}", install_dir.display())))?;

        let lock = FileLock::acquire(install_dir)?;
        let result = self.install_locked(&dep, install_dir, upgrade);
        lock.release();

        let (entry, resolved_version, checksum) = result?;
        dep.version = resolved_version;
        dep.checksum = checksum.clone();
        crate::log::spam(format!("resolved {} to checksum {}", dep.name, checksum));
        Ok((dep, entry))
    }

    fn install_locked(
        &mut self,
        dep: &Dependency,
        install_dir: &Path,
        upgrade: bool,
    ) -> Result<(DependenciesIndexEntry, String, String), HostError> {
        let entry = if upgrade {
            let current = DependenciesIndex::load(install_dir)
                .ok()
                .and_then(|idx| idx.find_by_alias(&dep.alias).map(|e| e.version.clone()))
                .unwrap_or_else(|| "0.0.0".to_string());
            let query = Dependency {
                version: current,
                ..dep.clone()
            };
            let reg = self.registry_for(&dep.registry)?;
            reg.get_highest_breaking(&query)?
        } else {
            let reg = self.registry_for(&dep.registry)?;
            reg.get_exact_match(dep)?
        };
        let entry = entry
            .ok_or_else(|| HostError::NoMatchingVersion(format!("{}@{}", dep.name, dep.version)))?;

        let mut tmp = tempfile::NamedTempFile::new()
            .map_err(|e| HostError::FilesystemError(format!("creating temp file: {e}")))?;

        let checksum = download_with_checksum(&entry.url, tmp.as_file_mut())?;

        if !entry.checksum.is_empty() && entry.checksum != checksum {
            return Err(HostError::ChecksumMismatch {
                expected: entry.checksum.clone(),
                actual: checksum,
            });
        }
        if !dep.checksum.is_empty() && dep.checksum != checksum {
            return Err(HostError::ChecksumMismatch {
                expected: dep.checksum.clone(),
                actual: checksum,
            });
        }

        let output_rel = format!("dependencies/{checksum}");
        let output_abs = install_dir.join(&output_rel);

        if let Some(parent) = output_abs.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| HostError::FilesystemError(format!("creating {}: {e}", parent.display())))?;
        }
        if output_abs.exists() {
            fs::remove_dir_all(&output_abs).map_err(|e| {
                HostError::FilesystemError(format!("removing {}: {e}", output_abs.display()))
            })?;
        }
        fs::create_dir_all(&output_abs)
            .map_err(|e| HostError::FilesystemError(format!("creating {}: {e}", output_abs.display())))?;

        tmp.as_file_mut()
            .seek(SeekFrom::Start(0))
            .map_err(|e| HostError::FilesystemError(format!("seeking downloaded archive: {e}")))?;
        tarball::extract(tmp.as_file(), &output_abs)?;

        let mut index = DependenciesIndex::load(install_dir)?;
        let new_entry = DependenciesIndexEntry {
            alias: dep.alias.clone(),
            registry: dep.registry.clone(),
            name: dep.name.clone(),
            version: entry.version.clone(),
            os: entry.os.clone(),
            arch: entry.arch.clone(),
            checksum: checksum.clone(),
            path: output_rel,
        };
        let replaced = index.upsert(new_entry.clone());
        index.save(install_dir)?;

        for old in replaced {
            if old.checksum == checksum {
                // Same checksum: this is the directory we just populated.
                continue;
            }
            let old_abs = install_dir.join(&old.path);
            if old_abs.is_dir() {
                let _ = fs::remove_dir_all(&old_abs);
            }
        }

        Ok((new_entry, entry.version, checksum))
    }

    /// Removes every entry matching `alias` from the index, deleting each
    /// on-disk artifact directory. A no-op alias is logged at debug level,
    /// not treated as an error.
    pub fn remove(&self, alias: &str, install_dir: &Path) -> Result<(), HostError> {
        let lock = FileLock::acquire(install_dir)?;
        let result = self.remove_locked(alias, install_dir);
        lock.release();
        result
    }

    fn remove_locked(&self, alias: &str, install_dir: &Path) -> Result<(), HostError> {
        let mut index = DependenciesIndex::load(install_dir)?;
        let removed = index.remove_alias(alias);

        if removed.is_empty() {
            crate::log::debug(format!("no installed dependency with alias '{alias}'"));
            return Ok(());
        }

        for entry in &removed {
            let abs = install_dir.join(&entry.path);
            if abs.is_dir() {
                fs::remove_dir_all(&abs).map_err(|e| {
                    HostError::FilesystemError(format!("removing {}: {e}", abs.display()))
                })?;
            }
        }

        index.save(install_dir)
    }

    /// Checks for newer versions of `dep`. Never
    /// fails the caller: registry errors are logged at debug and leave the
    /// corresponding field empty.
    pub fn check_for_update(&mut self, dep: &Dependency) -> Updates {
        let reg = match self.registry_for(&dep.registry) {
            Ok(reg) => reg,
            Err(e) => {
                crate::log::debug(format!("update check for {} failed: {e}", dep.name));
                return Updates::default();
            }
        };

        let mut updates = Updates::default();

        match reg.get_highest_non_breaking(dep) {
            Ok(Some(entry)) => updates.non_breaking = entry.version,
            Ok(None) => {}
            Err(e) => crate::log::debug(format!(
                "checking non-breaking update for {} failed: {e}",
                dep.name
            )),
        }

        match reg.get_highest_breaking(dep) {
            Ok(Some(entry)) => updates.breaking = entry.version,
            Ok(None) => {}
            Err(e) => crate::log::debug(format!(
                "checking breaking update for {} failed: {e}",
                dep.name
            )),
        }

        updates
    }
}

/// Streams `url` into `file`, computing the SHA-256 checksum over a tee as
/// it goes. Supports `file://` and `http(s)://` URLs.
fn download_with_checksum(url: &str, file: &mut File) -> Result<String, HostError> {
    crate::log::verbose(format!("Downloading {url}"));

    let mut hasher = Sha256::new();

    if let Some(path) = url.strip_prefix("file://") {
        let mut source = File::open(path)
            .map_err(|e| HostError::ArtifactUnreachable(format!("{url}: {e}")))?;
        let mut buf = [0u8; 8192];
        loop {
            let n = source
                .read(&mut buf)
                .map_err(|e| HostError::ArtifactUnreachable(format!("{url}: {e}")))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            file.write_all(&buf[..n])
                .map_err(|e| HostError::FilesystemError(format!("writing temp file: {e}")))?;
        }
    } else {
        let response = reqwest::blocking::get(url)
            .map_err(|e| HostError::ArtifactUnreachable(format!("{url}: {e}")))?;
        if response.status().as_u16() >= 300 {
            return Err(HostError::ArtifactUnreachable(format!(
                "{url} returned {}",
                response.status()
            )));
        }
        let mut response = response;
        let mut buf = [0u8; 8192];
        loop {
            let n = response
                .read(&mut buf)
                .map_err(|e| HostError::ArtifactUnreachable(format!("{url}: {e}")))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            file.write_all(&buf[..n])
                .map_err(|e| HostError::FilesystemError(format!("writing temp file: {e}")))?;
        }
    }

    Ok(format!("sha256-{}", hex::encode(hasher.finalize())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut f = File::create(&path).unwrap();
        f.write_all(contents).unwrap();
        path
    }

    fn build_tarball(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, contents) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder.append_data(&mut header, name, *contents).unwrap();
        }
        let tar_bytes = builder.into_inner().unwrap();
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&tar_bytes).unwrap();
        encoder.finish().unwrap()
    }

    fn sha256_hex(data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        format!("sha256-{}", hex::encode(hasher.finalize()))
    }

    /// Scenario 1 from the testable-properties section: a fresh global
    /// install against a `file://` registry and artifact.
    #[test]
    fn fresh_install_populates_index_and_extracts_artifact() {
        let work = TempDir::new().unwrap();
        let install_dir = work.path().join("install");

        let archive = build_tarball(&[
            ("bin/foo", b"#!/bin/sh\necho hi\n"),
            ("command.yaml", b"apiVersion: v1\nkind: Command\nbinPath: bin/foo\nversion: 1.2.3\n"),
        ]);
        let checksum = sha256_hex(&archive);
        let artifact_path = write_file(work.path(), "foo.tgz", &archive);

        let registry_yaml = format!(
            "apiVersion: v1\nkind: Registry\nentries:\n  - name: foo\n    version: 1.2.3\n    os: \"\"\n    arch: \"\"\n    url: file://{}\n    checksum: {checksum}\n",
            artifact_path.display()
        );
        let registry_path = write_file(work.path(), "reg.yaml", registry_yaml.as_bytes());

        let mut manager = Manager::new(format!("file://{}", registry_path.display()));
        let dep = Dependency {
            name: "foo".into(),
            version: "1.2.3".into(),
            registry: String::new(),
            alias: String::new(),
            checksum: String::new(),
        };

        let (resolved, entry) = manager.install(dep, &install_dir).unwrap();

        assert_eq!(resolved.version, "1.2.3");
        assert_eq!(entry.path, format!("dependencies/{checksum}"));
        assert!(install_dir.join(&entry.path).join("bin/foo").is_file());

        let index = DependenciesIndex::load(&install_dir).unwrap();
        assert_eq!(index.entries.len(), 1);
        assert_eq!(index.entries[0].alias, "foo");
    }

    #[test]
    fn checksum_mismatch_leaves_index_untouched() {
        let work = TempDir::new().unwrap();
        let install_dir = work.path().join("install");

        let archive = build_tarball(&[("command.yaml", b"apiVersion: v1\n")]);
        let artifact_path = write_file(work.path(), "foo.tgz", &archive);

        let registry_yaml = format!(
            "apiVersion: v1\nkind: Registry\nentries:\n  - name: foo\n    version: 1.0.0\n    os: \"\"\n    arch: \"\"\n    url: file://{}\n    checksum: sha256-deadbeef\n",
            artifact_path.display()
        );
        let registry_path = write_file(work.path(), "reg.yaml", registry_yaml.as_bytes());

        let mut manager = Manager::new(format!("file://{}", registry_path.display()));
        let dep = Dependency {
            name: "foo".into(),
            version: "1.0.0".into(),
            registry: String::new(),
            alias: String::new(),
            checksum: String::new(),
        };

        let err = manager.install(dep, &install_dir).unwrap_err();
        assert!(matches!(err, HostError::ChecksumMismatch { .. }));
        assert!(!install_dir.join("dependencies.json").exists());
    }

    /// A caller-pinned checksum that doesn't match the downloaded archive is
    /// rejected even when the registry entry itself carries no checksum.
    #[test]
    fn pinned_checksum_mismatch_is_rejected() {
        let work = TempDir::new().unwrap();
        let install_dir = work.path().join("install");

        let archive = build_tarball(&[(
            "command.yaml",
            b"apiVersion: v1\nkind: Command\nbinPath: bin/foo\nversion: 1.0.0\n",
        )]);
        let artifact_path = write_file(work.path(), "foo.tgz", &archive);

        let registry_yaml = format!(
            "apiVersion: v1\nkind: Registry\nentries:\n  - name: foo\n    version: 1.0.0\n    os: \"\"\n    arch: \"\"\n    url: file://{}\n",
            artifact_path.display()
        );
        let registry_path = write_file(work.path(), "reg.yaml", registry_yaml.as_bytes());

        let mut manager = Manager::new(format!("file://{}", registry_path.display()));
        let dep = Dependency {
            name: "foo".into(),
            version: "1.0.0".into(),
            registry: String::new(),
            alias: String::new(),
            checksum: "sha256-not-the-real-one".into(),
        };

        let err = manager.install(dep, &install_dir).unwrap_err();
        assert!(matches!(err, HostError::ChecksumMismatch { .. }));
        assert!(!install_dir.join("dependencies.json").exists());
    }

    /// A caller-pinned checksum that matches the downloaded archive installs
    /// normally, and the resolved dependency reports the checksum it pinned.
    #[test]
    fn pinned_checksum_match_installs_and_resolves_checksum() {
        let work = TempDir::new().unwrap();
        let install_dir = work.path().join("install");

        let archive = build_tarball(&[(
            "command.yaml",
            b"apiVersion: v1\nkind: Command\nbinPath: bin/foo\nversion: 1.0.0\n",
        )]);
        let checksum = sha256_hex(&archive);
        let artifact_path = write_file(work.path(), "foo.tgz", &archive);

        let registry_yaml = format!(
            "apiVersion: v1\nkind: Registry\nentries:\n  - name: foo\n    version: 1.0.0\n    os: \"\"\n    arch: \"\"\n    url: file://{}\n",
            artifact_path.display()
        );
        let registry_path = write_file(work.path(), "reg.yaml", registry_yaml.as_bytes());

        let mut manager = Manager::new(format!("file://{}", registry_path.display()));
        let dep = Dependency {
            name: "foo".into(),
            version: "1.0.0".into(),
            registry: String::new(),
            alias: String::new(),
            checksum: checksum.clone(),
        };

        let (resolved, _) = manager.install(dep, &install_dir).unwrap();
        assert_eq!(resolved.checksum, checksum);
    }

    #[test]
    fn removing_unknown_alias_is_a_noop() {
        let work = TempDir::new().unwrap();
        let install_dir = work.path().join("install");
        fs::create_dir_all(&install_dir).unwrap();

        let manager = Manager::new("file:///dev/null".to_string());
        manager.remove("nope", &install_dir).unwrap();
    }

    /// `--upgrade` resolves against the highest-breaking entry above
    /// whatever is currently installed, instead of an exact-match range.
    #[test]
    fn upgrade_mode_installs_highest_breaking_over_current_version() {
        let work = TempDir::new().unwrap();
        let install_dir = work.path().join("install");

        let mut entries_yaml = String::new();
        for version in ["1.0.0", "1.5.0", "2.0.0"] {
            let archive = build_tarball(&[(
                "command.yaml",
                format!("apiVersion: v1\nkind: Command\nbinPath: bin/foo\nversion: {version}\n")
                    .as_bytes(),
            )]);
            let checksum = sha256_hex(&archive);
            let artifact_path = write_file(work.path(), &format!("foo-{version}.tgz"), &archive);
            entries_yaml.push_str(&format!(
                "  - name: foo\n    version: {version}\n    os: \"\"\n    arch: \"\"\n    url: file://{}\n    checksum: {checksum}\n",
                artifact_path.display()
            ));
        }
        let registry_yaml = format!("apiVersion: v1\nkind: Registry\nentries:\n{entries_yaml}");
        let registry_path = write_file(work.path(), "reg.yaml", registry_yaml.as_bytes());

        let mut manager = Manager::new(format!("file://{}", registry_path.display()));
        let dep = Dependency {
            name: "foo".into(),
            version: "1.0.0".into(),
            registry: String::new(),
            alias: String::new(),
            checksum: String::new(),
        };

        // First install pins an exact version...
        let (first, _) = manager.install(dep.clone(), &install_dir).unwrap();
        assert_eq!(first.version, "1.0.0");

        // ...then --upgrade jumps straight to the highest entry available,
        // including the major bump, rather than re-matching "1.0.0".
        let (upgraded, entry) = manager
            .install_with_mode(dep, &install_dir, true)
            .unwrap();
        assert_eq!(upgraded.version, "2.0.0");
        assert_eq!(entry.version, "2.0.0");
    }
}
