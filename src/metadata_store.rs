//! Persistent store of routine metadata.
//!
//! The file is a pretty-printed JSON object `{"routines": {<name>: {...}}}`.
//! It is both the input of the wrapper generator and the "prior metadata"
//! of the next run's reload decision.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use routine_loader_core::metadata::RoutineMetadata;

#[derive(Debug, Default, Serialize, Deserialize)]
struct MetadataFile {
    #[serde(default)]
    routines: BTreeMap<String, RoutineMetadata>,
}

#[derive(Debug)]
pub struct MetadataStore {
    path: PathBuf,
    routines: BTreeMap<String, RoutineMetadata>,
}

impl MetadataStore {
    /// Reads the store at `path`; a missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        let routines = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read metadata file: {}", path.display()))?;
            let file: MetadataFile = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse metadata file: {}", path.display()))?;
            file.routines
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            routines,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, routine: &str) -> Option<&RoutineMetadata> {
        self.routines.get(routine)
    }

    pub fn insert(&mut self, metadata: RoutineMetadata) {
        self.routines
            .insert(metadata.routine_name.clone(), metadata);
    }

    pub fn remove(&mut self, routine: &str) -> Option<RoutineMetadata> {
        self.routines.remove(routine)
    }

    /// Keeps only the records for which `keep` returns true; returns the
    /// names of the removed records.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) -> Vec<String> {
        let removed: Vec<String> = self
            .routines
            .keys()
            .filter(|name| !keep(name))
            .cloned()
            .collect();
        for name in &removed {
            self.routines.remove(name);
        }
        removed
    }

    pub fn routine_names(&self) -> impl Iterator<Item = &str> {
        self.routines.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.routines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routines.is_empty()
    }

    /// Writes the store to a sibling temporary file, then renames it over
    /// the target.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create metadata directory: {}", parent.display())
                })?;
            }
        }

        let file = MetadataFile {
            routines: self.routines.clone(),
        };
        let mut json = serde_json::to_string_pretty(&file)?;
        json.push('\n');

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        std::fs::write(&tmp_path, json)
            .with_context(|| format!("Failed to write metadata file: {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to replace metadata file: {}", self.path.display()))?;

        Ok(())
    }
}
