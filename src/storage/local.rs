//! File-backed local dataset cache.
//!
//! Layout under the cache directory:
//!
//! ```text
//! index.json            DatasetIndex, newest first
//! datasets/ds-<hex>.json one serialized Dataset per entry, keyed by hex name
//! ```
//!
//! Every file is written to a temporary sibling and renamed into place, so a
//! reader never observes a half-written index or dataset.

use crate::error::CacheError;
use crate::models::{Dataset, DatasetIndex};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

const INDEX_FILE: &str = "index.json";
const DATASETS_DIR: &str = "datasets";

/// Durable key-value store of named datasets.
#[derive(Debug, Clone)]
pub struct LocalCache {
    root: PathBuf,
}

impl LocalCache {
    /// Open a cache rooted at `root`, creating the directory layout.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        fs::create_dir_all(root.join(DATASETS_DIR))?;
        debug!("Local cache at {}", root.display());
        Ok(Self { root })
    }

    /// Current index. A missing index file is an empty cache.
    pub fn list(&self) -> Result<DatasetIndex, CacheError> {
        let path = self.root.join(INDEX_FILE);
        if !path.exists() {
            return Ok(DatasetIndex::default());
        }
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Insert or replace a dataset by name.
    pub fn put(&self, dataset: &Dataset) -> Result<(), CacheError> {
        write_json_atomic(&self.dataset_path(&dataset.name), dataset)?;

        let mut index = self.list()?;
        index.upsert(dataset.entry());
        self.write_index(&index)?;

        debug!("Cached dataset {} ({})", dataset.name, dataset.tier);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Dataset, CacheError> {
        if !self.list()?.contains(name) {
            return Err(CacheError::NotFound(name.to_string()));
        }
        let path = self.dataset_path(name);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CacheError::NotFound(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    /// Remove a dataset. Absent names are a no-op; returns whether it existed.
    pub fn delete(&self, name: &str) -> Result<bool, CacheError> {
        let mut index = self.list()?;
        let existed = index.remove(name);
        if existed {
            self.write_index(&index)?;
        }

        match fs::remove_file(self.dataset_path(name)) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        Ok(existed)
    }

    /// Remove every dataset. Returns how many index entries were dropped.
    pub fn clear(&self) -> Result<usize, CacheError> {
        let index = self.list()?;
        self.write_index(&DatasetIndex::default())?;
        for entry in &index.entries {
            match fs::remove_file(self.dataset_path(&entry.name)) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(index.len())
    }

    /// Write a cached dataset as pretty JSON to `dest`.
    pub fn export(&self, name: &str, dest: &Path) -> Result<(), CacheError> {
        let dataset = self.get(name)?;
        let content = serde_json::to_string_pretty(&dataset)?;
        fs::write(dest, content)?;
        Ok(())
    }

    fn write_index(&self, index: &DatasetIndex) -> Result<(), CacheError> {
        write_json_atomic(&self.root.join(INDEX_FILE), index)
    }

    fn dataset_path(&self, name: &str) -> PathBuf {
        self.root.join(DATASETS_DIR).join(file_stem(name))
    }
}

/// Map a dataset name onto its file name. Hex keeps the mapping one-to-one,
/// case-insensitive filesystems included, and confined to the datasets folder.
fn file_stem(name: &str) -> String {
    let hex: String = name.bytes().map(|b| format!("{:02x}", b)).collect();
    format!("ds-{}.json", hex)
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), CacheError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let bytes = serde_json::to_vec(value)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| CacheError::Io(e.error))?;
    Ok(())
}
