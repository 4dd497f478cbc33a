//! OKR persistence.
//!
//! Stores hold whole aggregates. Writes are version-checked: the caller
//! passes the record with the version it read, and the store rejects the
//! write if another writer got there first.
//!
//! # Storage Format
//!
//! ```text
//! <data_dir>/okrs/
//! ├── {okr_id_1}.json
//! ├── {okr_id_2}.json
//! └── ...
//! ```

use crate::model::Okr;
use alignflow_ids::OkrId;
use anyhow::{anyhow, Context};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("version conflict on OKR {id}: expected {expected}, found {found}")]
    Conflict { id: OkrId, expected: u64, found: u64 },

    #[error("OKR not found: {0}")]
    NotFound(OkrId),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Aggregate store for OKRs.
pub trait OkrStore: Send + Sync {
    /// Every stored OKR, oldest first.
    fn load_all(&self) -> Result<Vec<Okr>, StoreError>;

    fn load(&self, id: &OkrId) -> Result<Option<Okr>, StoreError>;

    /// Persist `okr` if its `version` matches the stored one (0 for a new
    /// record). Returns the new version.
    fn save(&self, okr: &Okr) -> Result<u64, StoreError>;

    /// Remove a record; `false` if it did not exist.
    fn delete(&self, id: &OkrId) -> Result<bool, StoreError>;
}

fn check_version(okr: &Okr, stored: Option<u64>) -> Result<u64, StoreError> {
    let found = stored.unwrap_or(0);
    if okr.version != found {
        return Err(StoreError::Conflict {
            id: okr.id.clone(),
            expected: okr.version,
            found,
        });
    }
    Ok(found + 1)
}

fn sort_oldest_first(okrs: &mut [Okr]) {
    okrs.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

// ============================================================================
// JSON file store
// ============================================================================

/// One pretty-printed JSON file per OKR.
pub struct JsonOkrStore {
    dir: PathBuf,
    /// Serializes check-then-write within this process
    write_lock: Mutex<()>,
}

impl JsonOkrStore {
    pub fn new(dir: PathBuf) -> anyhow::Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create OKR store directory: {}", dir.display()))?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn okr_path(&self, id: &OkrId) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    fn read_file(path: &Path) -> anyhow::Result<Okr> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read OKR file: {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse OKR file: {}", path.display()))
    }
}

impl OkrStore for JsonOkrStore {
    fn load_all(&self) -> Result<Vec<Okr>, StoreError> {
        let entries = fs::read_dir(&self.dir).with_context(|| {
            format!("Failed to read OKR store directory: {}", self.dir.display())
        })?;

        let mut okrs = Vec::new();
        for entry in entries {
            let path = entry.context("Failed to read directory entry")?.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            okrs.push(Self::read_file(&path)?);
        }
        sort_oldest_first(&mut okrs);

        debug!("Loaded {} OKRs from {}", okrs.len(), self.dir.display());
        Ok(okrs)
    }

    fn load(&self, id: &OkrId) -> Result<Option<Okr>, StoreError> {
        let path = self.okr_path(id);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(Self::read_file(&path)?))
    }

    fn save(&self, okr: &Okr) -> Result<u64, StoreError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow!("OKR store write lock poisoned"))?;

        let stored = self.load(&okr.id)?.map(|o| o.version);
        let version = check_version(okr, stored)?;

        let mut record = okr.clone();
        record.version = version;
        let path = self.okr_path(&okr.id);
        let json = serde_json::to_string_pretty(&record).context("Failed to serialize OKR")?;
        atomic_write(&path, json.as_bytes())
            .with_context(|| format!("Failed to write OKR file: {}", path.display()))?;

        debug!("Saved OKR {} (v{}) to {}", okr.id, version, path.display());
        Ok(version)
    }

    fn delete(&self, id: &OkrId) -> Result<bool, StoreError> {
        let path = self.okr_path(id);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)
            .with_context(|| format!("Failed to delete OKR file: {}", path.display()))?;
        debug!("Deleted OKR {} from {}", id, path.display());
        Ok(true)
    }
}

/// Atomic write via temp file + rename
fn atomic_write(path: &Path, content: &[u8]) -> anyhow::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let temp_path = parent.join(format!(".tmp_{}", uuid::Uuid::new_v4()));
    fs::write(&temp_path, content)
        .with_context(|| format!("Failed to write temp file: {}", temp_path.display()))?;
    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename temp file to {}", path.display()))?;
    Ok(())
}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Default)]
pub struct MemoryOkrStore {
    records: Mutex<BTreeMap<OkrId, Okr>>,
}

impl MemoryOkrStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<OkrId, Okr>>, StoreError> {
        self.records
            .lock()
            .map_err(|_| StoreError::Backend(anyhow!("memory store lock poisoned")))
    }
}

impl OkrStore for MemoryOkrStore {
    fn load_all(&self) -> Result<Vec<Okr>, StoreError> {
        let mut okrs: Vec<Okr> = self.records()?.values().cloned().collect();
        sort_oldest_first(&mut okrs);
        Ok(okrs)
    }

    fn load(&self, id: &OkrId) -> Result<Option<Okr>, StoreError> {
        Ok(self.records()?.get(id).cloned())
    }

    fn save(&self, okr: &Okr) -> Result<u64, StoreError> {
        let mut records = self.records()?;
        let version = check_version(okr, records.get(&okr.id).map(|o| o.version))?;
        let mut record = okr.clone();
        record.version = version;
        records.insert(okr.id.clone(), record);
        Ok(version)
    }

    fn delete(&self, id: &OkrId) -> Result<bool, StoreError> {
        Ok(self.records()?.remove(id).is_some())
    }
}
