//! Registry hosted on the local filesystem (`file://` URLs).

use std::fs;

use super::{find_exact_match, find_highest_breaking, find_highest_non_breaking, Entry, Index, Registry};
use crate::dependency::Dependency;
use crate::error::HostError;

pub struct LocalRegistry {
    path: String,
    index: Option<Index>,
}

impl LocalRegistry {
    pub fn new(path: String) -> Self {
        LocalRegistry { path, index: None }
    }

    fn entries(&self) -> &[Entry] {
        self.index.as_ref().map(|i| i.entries.as_slice()).unwrap_or(&[])
    }
}

impl Registry for LocalRegistry {
    fn update(&mut self) -> Result<(), HostError> {
        crate::log::spam(format!("Loading registry: file://{}", self.path));

        let data = fs::read_to_string(&self.path)
            .map_err(|e| HostError::RegistryUnreachable(format!("{}: {e}", self.path)))?;

        let index: Index = serde_yaml::from_str(&data)
            .map_err(|e| HostError::RegistryMalformed(format!("{}: {e}", self.path)))?;

        self.index = Some(index);
        Ok(())
    }

    fn get_exact_match(&self, dep: &Dependency) -> Result<Option<Entry>, HostError> {
        find_exact_match(self.entries(), dep)
    }

    fn get_highest_non_breaking(&self, dep: &Dependency) -> Result<Option<Entry>, HostError> {
        find_highest_non_breaking(self.entries(), dep)
    }

    fn get_highest_breaking(&self, dep: &Dependency) -> Result<Option<Entry>, HostError> {
        find_highest_breaking(self.entries(), dep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_is_registry_unreachable() {
        let mut reg = LocalRegistry::new("/nonexistent/path/reg.yaml".to_string());
        let err = reg.update().unwrap_err();
        assert!(matches!(err, HostError::RegistryUnreachable(_)));
    }

    #[test]
    fn malformed_yaml_is_registry_malformed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not: [valid yaml for our schema: :").unwrap();
        let mut reg = LocalRegistry::new(file.path().to_string_lossy().to_string());
        let err = reg.update().unwrap_err();
        assert!(matches!(err, HostError::RegistryMalformed(_)));
    }
}
