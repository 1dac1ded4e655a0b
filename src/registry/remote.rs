//! Registry hosted on an HTTP(S) server.

use super::{find_exact_match, find_highest_breaking, find_highest_non_breaking, Entry, Index, Registry};
use crate::dependency::Dependency;
use crate::error::HostError;

pub struct RemoteRegistry {
    url: String,
    index: Option<Index>,
}

impl RemoteRegistry {
    pub fn new(url: String) -> Self {
        RemoteRegistry { url, index: None }
    }

    fn entries(&self) -> &[Entry] {
        self.index.as_ref().map(|i| i.entries.as_slice()).unwrap_or(&[])
    }
}

impl Registry for RemoteRegistry {
    fn update(&mut self) -> Result<(), HostError> {
        crate::log::spam(format!("Loading registry: {}", self.url));

        let response = reqwest::blocking::get(&self.url)
            .map_err(|e| HostError::RegistryUnreachable(format!("{}: {e}", self.url)))?;

        if response.status().as_u16() >= 300 {
            return Err(HostError::RegistryUnreachable(format!(
                "{} returned {}",
                self.url,
                response.status()
            )));
        }

        let body = response
            .text()
            .map_err(|e| HostError::RegistryUnreachable(format!("{}: {e}", self.url)))?;

        if body.trim().is_empty() {
            return Err(HostError::RegistryMalformed(format!(
                "{}: empty registry index",
                self.url
            )));
        }

        let raw: serde_yaml::Value = serde_yaml::from_str(&body)
            .map_err(|e| HostError::RegistryMalformed(format!("{}: {e}", self.url)))?;
        if raw.as_mapping().map_or(true, |m| !m.contains_key("entries")) {
            return Err(HostError::RegistryMalformed(format!(
                "{}: registry index is missing an 'entries' key",
                self.url
            )));
        }

        let index: Index = serde_yaml::from_value(raw)
            .map_err(|e| HostError::RegistryMalformed(format!("{}: {e}", self.url)))?;

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
