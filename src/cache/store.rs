//! Versioned model cache stores.
//!
//! Entries are keyed by artifact name and stamped with the version tag of the
//! build that wrote them. A lookup under a different version tag is a miss.

use crate::core::errors::{OCRError, OcrResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// One cached model artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCacheEntry {
    pub name: String,
    pub version_tag: String,
    pub payload: Vec<u8>,
    /// Seconds since the Unix epoch.
    pub cached_at: u64,
}

impl ModelCacheEntry {
    /// Creates an entry stamped with the current time.
    pub fn new(name: impl Into<String>, version_tag: impl Into<String>, payload: Vec<u8>) -> Self {
        let cached_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            name: name.into(),
            version_tag: version_tag.into(),
            payload,
            cached_at,
        }
    }
}

/// A persistent key-value store for model bytes.
pub trait ModelCacheStore: Send + Sync {
    /// Returns the entry stored under `name`, whatever its version.
    fn get(&self, name: &str) -> OcrResult<Option<ModelCacheEntry>>;

    /// Stores an entry, replacing any previous one with the same name.
    fn put(&self, entry: ModelCacheEntry) -> OcrResult<()>;

    /// Removes the entry stored under `name`, if any.
    fn remove(&self, name: &str) -> OcrResult<()>;

    /// Removes every entry.
    fn clear(&self) -> OcrResult<()>;

    /// Returns the entry under `name` only if it carries `version_tag`.
    fn lookup(&self, name: &str, version_tag: &str) -> OcrResult<Option<ModelCacheEntry>> {
        Ok(self.get(name)?.filter(|entry| {
            let usable = entry.version_tag == version_tag;
            if !usable {
                debug!(
                    "Cached {name} has version {}, expected {version_tag}",
                    entry.version_tag
                );
            }
            usable
        }))
    }
}

/// In-memory store, for tests and embedders that manage persistence themselves.
#[derive(Debug, Default)]
pub struct MemoryModelCache {
    entries: Mutex<HashMap<String, ModelCacheEntry>>,
}

impl MemoryModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> OcrResult<std::sync::MutexGuard<'_, HashMap<String, ModelCacheEntry>>> {
        self.entries.lock().map_err(|_| OCRError::Cache {
            message: "memory cache lock poisoned".to_string(),
            source: None,
        })
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries().map(|e| e.len()).unwrap_or(0)
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ModelCacheStore for MemoryModelCache {
    fn get(&self, name: &str) -> OcrResult<Option<ModelCacheEntry>> {
        Ok(self.entries()?.get(name).cloned())
    }

    fn put(&self, entry: ModelCacheEntry) -> OcrResult<()> {
        self.entries()?.insert(entry.name.clone(), entry);
        Ok(())
    }

    fn remove(&self, name: &str) -> OcrResult<()> {
        self.entries()?.remove(name);
        Ok(())
    }

    fn clear(&self) -> OcrResult<()> {
        self.entries()?.clear();
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct EntryMetadata {
    name: String,
    version_tag: String,
    cached_at: u64,
    size: usize,
}

/// Filesystem store writing `<name>.bin` and `<name>.meta.json` into one directory.
///
/// The payload is written before its metadata, so an interrupted write leaves
/// either no entry or the previous one.
#[derive(Debug, Clone)]
pub struct FsModelCache {
    dir: PathBuf,
}

impl FsModelCache {
    /// Opens (and creates if needed) a cache directory.
    pub fn open(dir: impl Into<PathBuf>) -> OcrResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| OCRError::cache(format!("cannot create {}", dir.display()), e))?;
        Ok(Self { dir })
    }

    /// The cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn payload_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.bin"))
    }

    fn metadata_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.meta.json"))
    }

    fn validate_name(name: &str) -> OcrResult<()> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(OCRError::invalid_input(format!(
                "invalid cache entry name '{name}'"
            )));
        }
        Ok(())
    }

    fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)
    }
}

impl ModelCacheStore for FsModelCache {
    fn get(&self, name: &str) -> OcrResult<Option<ModelCacheEntry>> {
        Self::validate_name(name)?;
        let meta_path = self.metadata_path(name);
        if !meta_path.exists() {
            return Ok(None);
        }

        let meta: EntryMetadata = serde_json::from_slice(&fs::read(&meta_path)?)?;
        let payload = match fs::read(self.payload_path(name)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(OCRError::cache(format!("cannot read {name}"), e)),
        };
        if payload.len() != meta.size {
            debug!(
                "Cached {name} is truncated ({} of {} bytes)",
                payload.len(),
                meta.size
            );
            return Ok(None);
        }

        Ok(Some(ModelCacheEntry {
            name: meta.name,
            version_tag: meta.version_tag,
            payload,
            cached_at: meta.cached_at,
        }))
    }

    fn put(&self, entry: ModelCacheEntry) -> OcrResult<()> {
        Self::validate_name(&entry.name)?;
        let meta = EntryMetadata {
            name: entry.name.clone(),
            version_tag: entry.version_tag.clone(),
            cached_at: entry.cached_at,
            size: entry.payload.len(),
        };

        Self::write_atomic(&self.payload_path(&entry.name), &entry.payload)
            .map_err(|e| OCRError::cache(format!("cannot write {}", entry.name), e))?;
        Self::write_atomic(
            &self.metadata_path(&entry.name),
            &serde_json::to_vec_pretty(&meta)?,
        )
        .map_err(|e| OCRError::cache(format!("cannot write metadata for {}", entry.name), e))?;
        Ok(())
    }

    fn remove(&self, name: &str) -> OcrResult<()> {
        Self::validate_name(name)?;
        for path in [self.metadata_path(name), self.payload_path(name)] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(OCRError::cache(format!("cannot remove {}", path.display()), e));
                }
            }
        }
        Ok(())
    }

    fn clear(&self) -> OcrResult<()> {
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_cache_file = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(".bin") || n.ends_with(".meta.json"));
            if is_cache_file {
                fs::remove_file(&path)
                    .map_err(|e| OCRError::cache(format!("cannot remove {}", path.display()), e))?;
            }
        }
        Ok(())
    }
}
