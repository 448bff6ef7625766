use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::filter::Filter;
use crate::record::Record;

/// A JSONL-backed collection store.
///
/// Every collection lives in its own `<base_path>/<collection>.jsonl` file,
/// one JSON object per line. Mutations read the whole file, apply the
/// change, and rewrite it under an exclusive advisory lock — simple and
/// correct at the scale this engine operates at (one task's worth of
/// records at a time), not optimized for large collections.
#[derive(Debug, Clone)]
pub struct Store {
    base_path: PathBuf,
}

impl Store {
    /// Open (creating if needed) a store rooted at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let base_path = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path).map_err(|e| StoreError::Io {
            path: base_path.clone(),
            source: e,
        })?;
        debug!(path = %base_path.display(), "Store::open");
        Ok(Self { base_path })
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.base_path.join(format!("{collection}.jsonl"))
    }

    fn read_all<T: Record>(&self) -> Result<Vec<T>, StoreError> {
        let path = self.collection_path(T::collection_name());
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&path).map_err(|e| StoreError::Io {
            path: path.clone(),
            source: e,
        })?;
        file.lock_shared().map_err(|e| StoreError::Lock {
            path: path.clone(),
            source: e,
        })?;
        let reader = BufReader::new(&file);
        let mut out = Vec::new();
        for line in reader.lines() {
            let line = line.map_err(|e| StoreError::Io {
                path: path.clone(),
                source: e,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let record: T = serde_json::from_str(&line).map_err(|e| StoreError::Serde {
                collection: T::collection_name(),
                source: e,
            })?;
            out.push(record);
        }
        FileExt::unlock(&file).ok();
        Ok(out)
    }

    fn write_all<T: Record>(&self, records: &[T]) -> Result<(), StoreError> {
        let path = self.collection_path(T::collection_name());
        let tmp_path = path.with_extension("jsonl.tmp");
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)
            .map_err(|e| StoreError::Io {
                path: tmp_path.clone(),
                source: e,
            })?;
        file.lock_exclusive().map_err(|e| StoreError::Lock {
            path: tmp_path.clone(),
            source: e,
        })?;
        for record in records {
            let line = serde_json::to_string(record).map_err(|e| StoreError::Serde {
                collection: T::collection_name(),
                source: e,
            })?;
            writeln!(file, "{line}").map_err(|e| StoreError::Io {
                path: tmp_path.clone(),
                source: e,
            })?;
        }
        file.sync_all().map_err(|e| StoreError::Io {
            path: tmp_path.clone(),
            source: e,
        })?;
        FileExt::unlock(&file).ok();
        std::fs::rename(&tmp_path, &path).map_err(|e| StoreError::Io { path, source: e })?;
        Ok(())
    }

    /// Insert a new record. Overwrites an existing record with the same id.
    pub fn create<T: Record>(&self, record: T) -> Result<(), StoreError> {
        let mut all = self.read_all::<T>()?;
        if let Some(existing) = all.iter_mut().find(|r| r.id() == record.id()) {
            *existing = record;
        } else {
            all.push(record);
        }
        self.write_all(&all)
    }

    /// Fetch a record by id.
    pub fn get<T: Record>(&self, id: &str) -> Result<T, StoreError> {
        self.read_all::<T>()?
            .into_iter()
            .find(|r| r.id() == id)
            .ok_or_else(|| StoreError::NotFound {
                collection: T::collection_name(),
                id: id.to_string(),
            })
    }

    /// Fetch a record by id, if present.
    pub fn get_opt<T: Record>(&self, id: &str) -> Result<Option<T>, StoreError> {
        Ok(self.read_all::<T>()?.into_iter().find(|r| r.id() == id))
    }

    /// Replace an existing record (matched by id). Errors if absent.
    pub fn update<T: Record>(&self, record: T) -> Result<(), StoreError> {
        let mut all = self.read_all::<T>()?;
        let slot = all.iter_mut().find(|r| r.id() == record.id()).ok_or_else(|| StoreError::NotFound {
            collection: T::collection_name(),
            id: record.id().to_string(),
        })?;
        *slot = record;
        self.write_all(&all)
    }

    /// List records matching every filter (AND semantics). Empty filters returns all.
    pub fn list<T: Record>(&self, filters: &[Filter]) -> Result<Vec<T>, StoreError> {
        let all = self.read_all::<T>()?;
        Ok(all
            .into_iter()
            .filter(|r| filters.iter().all(|f| f.matches(&r.indexed_fields())))
            .collect())
    }

    /// Remove a record by id. No-op (not an error) if absent.
    pub fn delete<T: Record>(&self, id: &str) -> Result<(), StoreError> {
        let mut all = self.read_all::<T>()?;
        let before = all.len();
        all.retain(|r| r.id() != id);
        if all.len() != before {
            self.write_all(&all)?;
        }
        Ok(())
    }

    /// Force a full read/rewrite of the collection, surfacing any malformed lines.
    /// Exists for startup integrity checks; this store has no separate index to rebuild.
    pub fn rebuild_indexes<T: Record>(&self) -> Result<(), StoreError> {
        let all = self.read_all::<T>()?;
        debug!(collection = T::collection_name(), count = all.len(), "rebuild_indexes");
        self.write_all(&all)
    }

    /// Flush is implicit (every write is synced and renamed atomically);
    /// kept as an explicit call site for callers that want a checkpoint boundary.
    pub fn sync(&self) -> Result<(), StoreError> {
        warn_if_dirty(&self.base_path);
        Ok(())
    }
}

fn warn_if_dirty(path: &Path) {
    if !path.exists() {
        warn!(path = %path.display(), "Store::sync: base path missing");
    }
}
