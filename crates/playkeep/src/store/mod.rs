//! Durable diff records that outlive the live session.
//!
//! Each store is one JSON file holding a flat list of records. Every mutation rewrites the
//! file atomically, so a host reload between two operations never loses an accepted change.

mod atomic_io;
mod records;

use std::fs;
use std::mem;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub(crate) use atomic_io::write_text_atomic;
pub use records::{
    ComponentDiffRecord, ComponentRecordKey, DiffRecord, SerializedFields, TransformDiffRecord,
    TransformRecordKey,
};

pub const STORE_FORMAT_VERSION: u16 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read diff store {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write diff store {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode diff store {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Serialize)]
struct StoreFileRef<'a, R> {
    format_version: u16,
    store: &'a str,
    records: &'a [R],
}

#[derive(Debug, Deserialize)]
struct StoreFile<R> {
    format_version: u16,
    records: Vec<R>,
}

#[derive(Debug)]
enum StoreReadState<R> {
    Missing,
    Unreadable(String),
    Present(Vec<R>),
}

#[derive(Debug)]
pub struct DiffStore<R> {
    path: Option<PathBuf>,
    records: Vec<R>,
}

impl<R: DiffRecord> DiffStore<R> {
    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            records: Vec::new(),
        }
    }

    /// Loads the store at `path`. A missing file is an empty store; so is a file that does not
    /// parse or has an unknown format version, which is logged and overwritten on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let records = load_records(&path)?;
        Ok(Self {
            path: Some(path),
            records,
        })
    }

    /// Re-reads the backing file, dropping in-memory state.
    pub fn reload(&mut self) -> Result<(), StoreError> {
        if let Some(path) = &self.path {
            self.records = load_records(path)?;
        }
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn find(&self, key: &R::Key) -> Option<&R> {
        self.records.iter().find(|record| record.matches(key))
    }

    /// Replaces the record with the same key in place, or appends a new one. When the file
    /// cannot be written the in-memory records are left as they were.
    pub fn upsert(&mut self, record: R) -> Result<(), StoreError> {
        let key = record.key();
        let position = self.records.iter().position(|existing| existing.matches(&key));
        let replaced = match position {
            Some(index) => Some(mem::replace(&mut self.records[index], record)),
            None => {
                self.records.push(record);
                None
            }
        };
        if let Err(error) = self.persist() {
            match (position, replaced) {
                (Some(index), Some(previous)) => self.records[index] = previous,
                _ => {
                    self.records.pop();
                }
            }
            return Err(error);
        }
        debug!(store = R::STORE_NAME, key = %key, "diff_record_upserted");
        Ok(())
    }

    pub fn remove(&mut self, key: &R::Key) -> Result<bool, StoreError> {
        if !self.records.iter().any(|record| record.matches(key)) {
            return Ok(false);
        }
        let kept = self
            .records
            .iter()
            .filter(|record| !record.matches(key))
            .cloned()
            .collect();
        self.commit(kept)?;
        debug!(store = R::STORE_NAME, key = %key, "diff_record_removed");
        Ok(true)
    }

    pub fn clear(&mut self) -> Result<(), StoreError> {
        if self.records.is_empty() && self.path.as_ref().map_or(true, |path| !path.exists()) {
            return Ok(());
        }
        self.commit(Vec::new())?;
        debug!(store = R::STORE_NAME, "diff_store_cleared");
        Ok(())
    }

    /// Swaps in `records` and persists them, restoring the previous list on failure.
    fn commit(&mut self, records: Vec<R>) -> Result<(), StoreError> {
        let previous = mem::replace(&mut self.records, records);
        if let Err(error) = self.persist() {
            self.records = previous;
            return Err(error);
        }
        Ok(())
    }

    fn persist(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let file = StoreFileRef {
            format_version: STORE_FORMAT_VERSION,
            store: R::STORE_NAME,
            records: &self.records,
        };
        let text = serde_json::to_string_pretty(&file).map_err(|source| StoreError::Encode {
            path: path.clone(),
            source,
        })?;
        write_text_atomic(path, &text).map_err(|source| StoreError::Write {
            path: path.clone(),
            source,
        })
    }
}

fn load_records<R: DiffRecord>(path: &Path) -> Result<Vec<R>, StoreError> {
    match read_store_file(path)? {
        StoreReadState::Missing => Ok(Vec::new()),
        StoreReadState::Unreadable(reason) => {
            warn!(
                store = R::STORE_NAME,
                path = %path.display(),
                reason = %reason,
                "diff_store_unreadable_starting_empty"
            );
            Ok(Vec::new())
        }
        StoreReadState::Present(records) => Ok(records),
    }
}

fn read_store_file<R: DiffRecord>(path: &Path) -> Result<StoreReadState<R>, StoreError> {
    if !path.exists() {
        return Ok(StoreReadState::Missing);
    }
    let raw = fs::read_to_string(path).map_err(|source| StoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let file = match serde_json::from_str::<StoreFile<R>>(&raw) {
        Ok(file) => file,
        Err(error) => return Ok(StoreReadState::Unreadable(error.to_string())),
    };
    if file.format_version != STORE_FORMAT_VERSION {
        return Ok(StoreReadState::Unreadable(format!(
            "format_version {} is not {STORE_FORMAT_VERSION}",
            file.format_version
        )));
    }
    Ok(StoreReadState::Present(file.records))
}

/// The transform and component stores, opened and cleared together.
#[derive(Debug)]
pub struct DiffStores {
    pub transforms: DiffStore<TransformDiffRecord>,
    pub components: DiffStore<ComponentDiffRecord>,
}

impl DiffStores {
    pub fn in_memory() -> Self {
        Self {
            transforms: DiffStore::in_memory(),
            components: DiffStore::in_memory(),
        }
    }

    pub fn open(transform_path: &Path, component_path: &Path) -> Result<Self, StoreError> {
        Ok(Self {
            transforms: DiffStore::open(transform_path)?,
            components: DiffStore::open(component_path)?,
        })
    }

    pub fn reload(&mut self) -> Result<(), StoreError> {
        self.transforms.reload()?;
        self.components.reload()
    }

    pub fn clear_all(&mut self) -> Result<(), StoreError> {
        self.transforms.clear()?;
        self.components.clear()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty() && self.components.is_empty()
    }
}
