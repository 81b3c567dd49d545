//! Intermediate results file.
//!
//! Holds model responses that have not been written to the database yet, so
//! an interrupted run can resume without paying for the same LLM calls
//! twice. Entries are removed once their update is written.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sparza_core::types::{Fields, RecordId, Timestamp};

use crate::error::CacheError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResult {
    pub fields: Fields,
    pub cached_at: Timestamp,
}

#[derive(Serialize, Deserialize)]
struct CacheEntry {
    id: RecordId,
    #[serde(flatten)]
    result: CachedResult,
}

#[derive(Serialize, Deserialize)]
struct CacheFile {
    entries: Vec<CacheEntry>,
}

/// JSON-file-backed map from record id to the model's response.
#[derive(Debug)]
pub struct IntermediateResults {
    path: PathBuf,
    entries: HashMap<RecordId, CachedResult>,
    dirty: bool,
}

impl IntermediateResults {
    /// Load the cache at `path`.
    ///
    /// A missing file yields an empty cache. A file that fails to parse is
    /// renamed to `<path>.corrupt` and an empty cache is returned.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        let entries = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<CacheFile>(&bytes) {
                Ok(file) => file
                    .entries
                    .into_iter()
                    .map(|e| (e.id, e.result))
                    .collect(),
                Err(e) => {
                    let aside = sidecar(&path, "corrupt");
                    tracing::warn!(
                        path = %path.display(),
                        moved_to = %aside.display(),
                        error = %e,
                        "Intermediate results file is corrupt, starting empty",
                    );
                    std::fs::rename(&path, &aside).map_err(|source| CacheError::Io {
                        path: path.clone(),
                        source,
                    })?;
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(source) => return Err(CacheError::Io { path, source }),
        };

        if !entries.is_empty() {
            tracing::info!(path = %path.display(), entries = entries.len(), "Loaded intermediate results");
        }

        Ok(Self {
            path,
            entries,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &RecordId) -> Option<&CachedResult> {
        self.entries.get(id)
    }

    pub fn insert(&mut self, id: RecordId, fields: Fields) {
        self.entries.insert(
            id,
            CachedResult {
                fields,
                cached_at: chrono::Utc::now(),
            },
        );
        self.dirty = true;
    }

    pub fn remove(&mut self, id: &RecordId) {
        if self.entries.remove(id).is_some() {
            self.dirty = true;
        }
    }

    pub fn remove_many<'a>(&mut self, ids: impl IntoIterator<Item = &'a RecordId>) {
        for id in ids {
            self.remove(id);
        }
    }

    /// Write the cache to disk if it changed since the last persist.
    ///
    /// Writes `<path>.tmp` then renames it over `path`. An empty cache
    /// removes the file.
    pub fn persist(&mut self) -> Result<(), CacheError> {
        if !self.dirty {
            return Ok(());
        }

        if self.entries.is_empty() {
            match std::fs::remove_file(&self.path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(CacheError::Io {
                        path: self.path.clone(),
                        source,
                    })
                }
            }
            self.dirty = false;
            return Ok(());
        }

        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| CacheError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let mut entries: Vec<CacheEntry> = self
            .entries
            .iter()
            .map(|(id, result)| CacheEntry {
                id: id.clone(),
                result: result.clone(),
            })
            .collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        let bytes = serde_json::to_vec_pretty(&CacheFile { entries })?;

        let tmp = sidecar(&self.path, "tmp");
        std::fs::write(&tmp, bytes).map_err(|source| CacheError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|source| CacheError::Io {
            path: self.path.clone(),
            source,
        })?;

        self.dirty = false;
        Ok(())
    }
}

/// `<path>.<suffix>`
fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}
