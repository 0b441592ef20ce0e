use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use super::{FileCandidate, StorageTier};
use crate::{
    KeyfileError, Result,
    connection::Connection,
    core::invariant_violation,
};

/// Opaque handle the store hands out for an exported profile.
///
/// A handle stays valid while its profile remains exported; it is dropped
/// when the profile is removed or masked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageHandle(u64);

impl fmt::Display for StorageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Everything the store knows about one UUID.
#[derive(Debug, Clone)]
pub struct ProfileRecord {
    uuid: String,
    pub(crate) candidates: Vec<FileCandidate>,
    pub(crate) exported_tier: Option<StorageTier>,
    pub(crate) exported: Option<Arc<Connection>>,
    pub(crate) handle: Option<StorageHandle>,
    pub(crate) loaded_path_run: Option<PathBuf>,
    pub(crate) loaded_path_etc: Option<PathBuf>,
}

impl ProfileRecord {
    fn new(uuid: &str) -> Self {
        Self {
            uuid: uuid.to_string(),
            candidates: Vec::new(),
            exported_tier: None,
            exported: None,
            handle: None,
            loaded_path_run: None,
            loaded_path_etc: None,
        }
    }

    /// The profile UUID.
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// The exported profile, if any.
    pub fn exported(&self) -> Option<&Arc<Connection>> {
        self.exported.as_ref()
    }

    /// Tier the exported profile came from.
    pub fn exported_tier(&self) -> Option<StorageTier> {
        self.exported_tier
    }

    /// Handle of the exported profile.
    pub fn handle(&self) -> Option<StorageHandle> {
        self.handle
    }

    /// Files providing this UUID, best first.
    pub fn candidates(&self) -> &[FileCandidate] {
        &self.candidates
    }

    /// Path of the file the exported profile was read from.
    pub fn exported_path(&self) -> Option<&Path> {
        match self.exported_tier {
            Some(StorageTier::InMemory) | None => None,
            Some(_) => self.candidates.first().map(FileCandidate::path),
        }
    }
}

/// Records keyed by UUID, plus the path and handle indexes.
///
/// Records keep their detection order, so reconciliation and listing are
/// deterministic.
#[derive(Debug, Default)]
pub(crate) struct ProfileIndex {
    records: HashMap<String, ProfileRecord>,
    order: Vec<String>,
    paths: HashMap<PathBuf, String>,
    handles: HashMap<StorageHandle, String>,
    next_handle: u64,
}

impl ProfileIndex {
    pub(crate) fn get(&self, uuid: &str) -> Option<&ProfileRecord> {
        self.records.get(uuid)
    }

    pub(crate) fn get_mut(&mut self, uuid: &str) -> Option<&mut ProfileRecord> {
        self.records.get_mut(uuid)
    }

    pub(crate) fn get_or_create(&mut self, uuid: &str) -> &mut ProfileRecord {
        if !self.records.contains_key(uuid) {
            self.order.push(uuid.to_string());
        }
        self.records
            .entry(uuid.to_string())
            .or_insert_with(|| ProfileRecord::new(uuid))
    }

    /// Drops a record together with its paths and handle.
    pub(crate) fn remove(&mut self, uuid: &str) -> Option<ProfileRecord> {
        let record = self.records.remove(uuid)?;
        self.order.retain(|known| known != uuid);
        self.forget_paths(uuid);
        if let Some(handle) = record.handle {
            self.handles.remove(&handle);
        }
        Some(record)
    }

    /// All UUIDs in detection order.
    pub(crate) fn uuids(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Records in detection order.
    pub(crate) fn records(&self) -> impl Iterator<Item = &ProfileRecord> {
        self.order.iter().filter_map(|uuid| self.records.get(uuid))
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn reset_for_scan(&mut self) {
        self.paths.clear();
        for record in self.records.values_mut() {
            record.candidates.clear();
            record.loaded_path_run = None;
            record.loaded_path_etc = None;
        }
    }

    pub(crate) fn owner_of(&self, path: &Path) -> Option<&str> {
        self.paths.get(path).map(String::as_str)
    }

    pub(crate) fn forget_paths(&mut self, uuid: &str) {
        self.paths.retain(|_, owner| owner != uuid);
    }

    /// Claims every candidate path of `uuid` for it.
    ///
    /// A path already owned by a different UUID is a broken invariant.
    pub(crate) fn publish_paths(&mut self, uuid: &str) {
        let Some(record) = self.records.get(uuid) else {
            return;
        };

        for candidate in &record.candidates {
            match self.paths.get(&candidate.path) {
                Some(owner) if owner != uuid => invariant_violation(format_args!(
                    "\"{}\" claimed by {owner} and {uuid}",
                    candidate.path.display()
                )),
                _ => {
                    self.paths.insert(candidate.path.clone(), uuid.to_string());
                }
            }
        }
    }

    /// Gives an exported record a handle if it has none yet.
    pub(crate) fn ensure_handle(&mut self, uuid: &str) -> Option<StorageHandle> {
        let record = self.records.get_mut(uuid)?;
        if record.exported.is_none() {
            return None;
        }
        if let Some(handle) = record.handle {
            return Some(handle);
        }

        self.next_handle += 1;
        let handle = StorageHandle(self.next_handle);
        record.handle = Some(handle);
        self.handles.insert(handle, uuid.to_string());
        Some(handle)
    }

    pub(crate) fn clear_handle(&mut self, uuid: &str) -> Option<StorageHandle> {
        let handle = self.records.get_mut(uuid)?.handle.take()?;
        self.handles.remove(&handle);
        Some(handle)
    }

    /// Resolves a handle to the UUID of its record.
    ///
    /// # Errors
    ///
    /// Returns `KeyfileError::MissingStorage` for handles this index does
    /// not know.
    pub(crate) fn resolve_handle(&self, handle: StorageHandle) -> Result<&str> {
        let Some(uuid) = self.handles.get(&handle) else {
            return Err(KeyfileError::MissingStorage {
                details: format!("unknown storage handle {handle}"),
            });
        };

        match self.records.get(uuid) {
            Some(record) if record.handle == Some(handle) => Ok(uuid.as_str()),
            _ => invariant_violation(format_args!("handle {handle} does not refer back to {uuid}")),
        }
    }
}
