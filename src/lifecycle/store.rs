//! Persisted allocation state.
//!
//! The record is stored as pretty JSON. An absent allocation is written as
//! `null`, and a missing file reads as absent.

use super::PrefixRecord;
use color_eyre::eyre::{Context, Result};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// JSON file holding at most one [`PrefixRecord`]
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<PrefixRecord>> {
        if !self.path.exists() {
            debug!("State file {:?} does not exist, allocation is absent", self.path);
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .wrap_err_with(|| format!("Failed to read state file '{}'", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&content)
            .wrap_err_with(|| format!("Failed to parse state file '{}'", self.path.display()))
    }

    pub fn save(&self, state: &Option<PrefixRecord>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .wrap_err_with(|| format!("Failed to create directory '{}'", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(state).wrap_err("Failed to serialize state")?;

        // Write then rename so a crash never leaves a half-written record.
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json).wrap_err_with(|| format!("Failed to write '{}'", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .wrap_err_with(|| format!("Failed to replace state file '{}'", self.path.display()))?;
        debug!("Saved state to {:?}", self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::TagMap;
    use chrono::Utc;

    #[test]
    fn test_missing_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("nested").join("state.json"));

        let mut tags = TagMap::new();
        tags.insert("name".to_string(), "a".to_string());
        tags.insert("unique".to_string(), "b".to_string());
        let record = PrefixRecord {
            id: 17,
            prefix: "10.224.3.0/24".to_string(),
            prefix_length: 24,
            tags,
            resource_type: "depot".to_string(),
            environment: "prod1".to_string(),
            vrf: Some("prod".to_string()),
            last_refreshed: Some(Utc::now()),
        };

        store.save(&Some(record.clone())).unwrap();
        assert_eq!(store.load().unwrap(), Some(record));

        store.save(&None).unwrap();
        assert_eq!(fs::read_to_string(store.path()).unwrap().trim(), "null");
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();
        assert!(StateStore::new(path).load().is_err());
    }
}
