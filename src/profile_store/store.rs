use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::{
    FileCandidate, ProfileChange, ProfileRecord, StorageHandle, StorageTier, index::ProfileIndex,
    candidate::LoadContext,
    path_ops::{classify_path, path_equal},
    pointer::{self, MASKED_TARGET, is_masked, read_pointer},
    reload::{PendingChanges, reconcile, reload_all},
};
use crate::{
    KeyfileError, Result,
    config::{KeyfileConfig, KeyfileDirs, split_match_specs},
    connection::{Connection, KeyfileFormat, ProfileReader, ProfileWriter, parse_uuid},
};

/// What a loaded-UUID pointer should point at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointerTarget {
    /// Prefer this file for the UUID.
    Path(PathBuf),
    /// Hide the UUID.
    Masked,
    /// Remove the pointer.
    Clear,
}

/// The keyfile profile store.
///
/// Owns the profile index for a set of keyfile directories, reconciles it
/// against the files on disk and publishes every change of the exported
/// profile set to subscribers.
pub struct ProfileStore {
    dirs: KeyfileDirs,
    config: KeyfileConfig,
    reader: Box<dyn ProfileReader>,
    writer: Box<dyn ProfileWriter>,
    index: ProfileIndex,
    change_sender: broadcast::Sender<ProfileChange>,
}

impl ProfileStore {
    /// Creates an empty store for the directories named by `config`.
    ///
    /// Nothing is read until [`reload`](Self::reload) is called.
    pub fn new(config: &KeyfileConfig) -> Self {
        Self::with_dirs(KeyfileDirs::resolve(config), config)
    }

    /// Creates an empty store for explicit directories.
    pub fn with_dirs(dirs: KeyfileDirs, config: &KeyfileConfig) -> Self {
        let (change_sender, _) = broadcast::channel(1000);

        Self {
            dirs,
            config: config.clone(),
            reader: Box::new(KeyfileFormat),
            writer: Box::new(KeyfileFormat),
            index: ProfileIndex::default(),
            change_sender,
        }
    }

    /// Replaces the profile reader and writer.
    pub fn with_io(
        mut self,
        reader: impl ProfileReader + 'static,
        writer: impl ProfileWriter + 'static,
    ) -> Self {
        self.reader = Box::new(reader);
        self.writer = Box::new(writer);
        self
    }

    /// The directories this store works on.
    pub fn dirs(&self) -> &KeyfileDirs {
        &self.dirs
    }

    /// The active `[keyfile]` configuration.
    pub fn config(&self) -> &KeyfileConfig {
        &self.config
    }

    /// Receives every change the store publishes from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ProfileChange> {
        self.change_sender.subscribe()
    }

    /// Looks up the record of `uuid`.
    pub fn get(&self, uuid: &str) -> Option<&ProfileRecord> {
        parse_uuid(uuid).and_then(|uuid| self.index.get(&uuid))
    }

    /// Looks up the record an exported handle refers to.
    pub fn get_by_handle(&self, handle: StorageHandle) -> Option<&ProfileRecord> {
        self.index
            .resolve_handle(handle)
            .ok()
            .and_then(|uuid| self.index.get(uuid))
    }

    /// Exported profiles in detection order.
    pub fn profiles(&self) -> impl Iterator<Item = &ProfileRecord> {
        self.index
            .records()
            .filter(|record| record.exported.is_some())
    }

    /// All records, including masked ones, in detection order.
    pub fn records(&self) -> impl Iterator<Item = &ProfileRecord> {
        self.index.records()
    }

    /// Finds the record that owns the file at `path`.
    pub fn find_by_path(&self, path: &Path) -> Option<&ProfileRecord> {
        self.index
            .owner_of(path)
            .and_then(|uuid| self.index.get(uuid))
    }

    /// Rescans all directories and reconciles every profile.
    ///
    /// Returns the changes, removals first; they are also published.
    pub fn reload(&mut self) -> Vec<ProfileChange> {
        let ctx = LoadContext {
            dirs: &self.dirs,
            reader: self.reader.as_ref(),
            check_permissions: self.config.check_permissions,
        };
        let changes = reload_all(&mut self.index, &ctx);

        info!("keyfile: reloaded, {} changes", changes.len());
        self.publish(changes)
    }

    /// Re-reads a single file and reconciles the UUIDs it affects.
    ///
    /// A file that no longer exists drops out of its record. A file whose
    /// UUID changed moves to the new record and both are reconciled.
    ///
    /// # Errors
    ///
    /// Returns `KeyfileError::NotAbsolute` or `KeyfileError::NotInKnownDirectory`
    /// for paths the store does not manage, and `KeyfileError::Access`,
    /// `KeyfileError::Permission` or `KeyfileError::Parse` if the file cannot
    /// be loaded. Changes caused by dropping an unreadable file are still
    /// published in that case.
    pub fn load_one(&mut self, path: &Path) -> Result<Vec<ProfileChange>> {
        let classified = classify_path(path, &self.dirs)?;
        let Some(priority) = classified.tier.priority() else {
            return Ok(Vec::new());
        };
        let path = classified.dir.join(&classified.filename);
        let previous_owner = self.index.owner_of(&path).map(str::to_string);

        let loaded = LoadContext {
            dirs: &self.dirs,
            reader: self.reader.as_ref(),
            check_permissions: self.config.check_permissions,
        }
        .load_file(&path);

        let mut affected = Vec::new();
        if let Some(previous) = &previous_owner {
            if let Some(record) = self.index.get_mut(previous) {
                record.candidates.retain(|candidate| candidate.path != path);
            }
            affected.push(previous.clone());
        }

        let failure = match loaded {
            Ok((connection, identity)) => match connection.uuid().map(str::to_string) {
                Some(uuid) => {
                    debug!("keyfile: loading \"{}\" for {uuid}", path.display());

                    self.index.get_or_create(&uuid).candidates.push(FileCandidate::new(
                        path.clone(),
                        classified.tier,
                        priority,
                        identity,
                        connection,
                    ));
                    if !affected.contains(&uuid) {
                        affected.push(uuid);
                    }
                    None
                }
                None => Some(KeyfileError::parse("profile has no UUID", &path)),
            },
            Err(e) if is_gone(&path) => {
                debug!("keyfile: \"{}\" was removed ({e})", path.display());
                None
            }
            Err(e) => {
                warn!("keyfile: cannot load \"{}\": {e}", path.display());
                Some(e)
            }
        };

        let changes = self.reconcile_uuids(&affected);
        match failure {
            Some(e) => Err(e),
            None => Ok(changes),
        }
    }

    /// Adds a new profile.
    ///
    /// With `save_to_disk` the profile is written to the writable directory
    /// and loaded from there, after removing pointers that mask the UUID;
    /// otherwise it is exported in memory, shadowing any file for the same
    /// UUID.
    ///
    /// # Errors
    ///
    /// Returns `KeyfileError::Parse` for invalid profiles,
    /// `KeyfileError::DuplicateUuid` if the UUID is already exported,
    /// `KeyfileError::ReadOnly` if there is nowhere to write, and write
    /// errors from the profile writer.
    pub fn add_connection(
        &mut self,
        mut connection: Connection,
        save_to_disk: bool,
    ) -> Result<StorageHandle> {
        connection.normalize_and_verify()?;
        let uuid = connection
            .uuid()
            .map(str::to_string)
            .ok_or_else(|| KeyfileError::parse("profile has no UUID", Path::new("connection")))?;

        if self
            .index
            .get(&uuid)
            .is_some_and(|record| record.exported.is_some())
        {
            return Err(KeyfileError::DuplicateUuid { uuid });
        }

        if save_to_disk {
            let dir = self
                .dirs
                .writable_dir()
                .ok_or(KeyfileError::ReadOnly { operation: "add" })?
                .to_path_buf();
            self.clear_masks(&uuid)?;
            let path = self.writer.write_profile(&connection, &dir, None)?;
            self.load_one(&path)?;

            if let Some(handle) = self.index.get(&uuid).and_then(ProfileRecord::handle) {
                return Ok(handle);
            }

            self.writer.delete_profile(&path)?;
            self.load_one(&path)?;
            return Err(KeyfileError::MissingStorage {
                details: format!("{uuid} is not exported after writing \"{}\"", path.display()),
            });
        }

        let record = self.index.get_or_create(&uuid);
        record.exported = Some(Arc::new(connection));
        record.exported_tier = Some(StorageTier::InMemory);
        let handle = self
            .index
            .ensure_handle(&uuid)
            .ok_or_else(|| KeyfileError::MissingStorage {
                details: format!("{uuid} has no handle"),
            })?;

        info!("keyfile: {uuid}: added in-memory profile");
        let exported = self.index.get(&uuid).and_then(|record| record.exported.clone());
        self.publish(vec![ProfileChange {
            uuid,
            handle,
            connection: exported,
        }]);

        Ok(handle)
    }

    /// Replaces the content of an exported profile.
    ///
    /// In-memory profiles are updated in place. File-backed profiles are
    /// written over their winning file if it is writable, else to the
    /// writable directory, and reloaded. Pointers of the UUID that name
    /// another file are moved to the written one.
    ///
    /// # Errors
    ///
    /// Returns `KeyfileError::MissingStorage` for unknown handles,
    /// `KeyfileError::Parse` for invalid profiles or a changed UUID,
    /// `KeyfileError::Write` if the written file does not end up exported,
    /// and errors from writing and reloading the file.
    pub fn commit(
        &mut self,
        handle: StorageHandle,
        mut connection: Connection,
    ) -> Result<Arc<Connection>> {
        let uuid = self.index.resolve_handle(handle)?.to_string();
        connection.normalize_and_verify()?;
        if connection.uuid() != Some(uuid.as_str()) {
            return Err(KeyfileError::Parse {
                location: uuid,
                details: "the UUID of a profile cannot change".to_string(),
            });
        }

        let Some(record) = self.index.get_mut(&uuid) else {
            return Err(missing(handle));
        };

        if record.exported_tier == Some(StorageTier::InMemory) {
            let changed = !record
                .exported
                .as_ref()
                .is_some_and(|exported| exported.equivalent(&connection));
            let exported = Arc::new(connection);
            record.exported = Some(Arc::clone(&exported));
            if changed {
                self.publish(vec![ProfileChange {
                    uuid,
                    handle,
                    connection: Some(Arc::clone(&exported)),
                }]);
            }
            return Ok(exported);
        }

        let target = match record.candidates.first() {
            Some(best) if best.tier.is_writable() => {
                let dir = best.path.parent().map(Path::to_path_buf);
                dir.map(|dir| (dir, Some(best.path.clone())))
            }
            _ => None,
        };
        let (dir, existing) = match target {
            Some(target) => target,
            None => (
                self.dirs
                    .writable_dir()
                    .ok_or(KeyfileError::ReadOnly { operation: "commit" })?
                    .to_path_buf(),
                None,
            ),
        };

        let path = self
            .writer
            .write_profile(&connection, &dir, existing.as_deref())?;
        self.repoint_pointers(&uuid, &path)?;
        self.load_one(&path)?;

        let Some(record) = self.index.get(&uuid) else {
            return Err(missing(handle));
        };
        match (record.exported_path(), &record.exported) {
            (Some(winner), Some(exported)) if path_equal(winner, &path) => Ok(Arc::clone(exported)),
            (winner, _) => Err(KeyfileError::Write {
                path,
                details: format!(
                    "written profile is shadowed by {}",
                    winner.map_or_else(|| "a mask".to_string(), |w| format!("\"{}\"", w.display()))
                ),
            }),
        }
    }

    /// Deletes an exported profile.
    ///
    /// In-memory profiles are dropped, which may uncover a file for the
    /// same UUID. For file-backed profiles all writable files and pointers
    /// for the UUID are removed, and read-only files left behind are masked.
    ///
    /// # Errors
    ///
    /// Returns `KeyfileError::MissingStorage` for unknown handles and
    /// `KeyfileError::Write` if files cannot be removed.
    pub fn delete(&mut self, handle: StorageHandle) -> Result<()> {
        let uuid = self.index.resolve_handle(handle)?.to_string();
        let Some(record) = self.index.get_mut(&uuid) else {
            return Err(missing(handle));
        };

        if record.exported_tier == Some(StorageTier::InMemory) {
            record.exported = None;
            record.exported_tier = None;
            self.index.clear_handle(&uuid);
            info!("keyfile: {uuid}: deleted in-memory profile");

            self.publish(vec![ProfileChange {
                uuid: uuid.clone(),
                handle,
                connection: None,
            }]);
            self.reconcile_uuids(&[uuid]);
            return Ok(());
        }

        let (writable, read_only): (Vec<&FileCandidate>, Vec<&FileCandidate>) = record
            .candidates
            .iter()
            .partition(|candidate| candidate.tier.is_writable());
        let writable: Vec<PathBuf> = writable
            .iter()
            .map(|candidate| candidate.path.clone())
            .collect();
        let needs_mask = !read_only.is_empty();

        for path in &writable {
            self.writer.delete_profile(path)?;
        }
        if let Some(record) = self.index.get_mut(&uuid) {
            record.candidates.retain(|candidate| !writable.contains(&candidate.path));
        }

        let allow_relative = self.config.allow_relative_links;
        for dir in [self.dirs.run(), self.dirs.etc()].into_iter().flatten() {
            pointer::write_pointer(dir, &uuid, None, allow_relative)?;
        }
        if needs_mask {
            let dir = self
                .dirs
                .writable_dir()
                .ok_or(KeyfileError::ReadOnly { operation: "delete" })?;
            pointer::write_pointer(dir, &uuid, Some(Path::new(MASKED_TARGET)), allow_relative)?;
        }

        info!("keyfile: {uuid}: deleted profile files");
        self.reconcile_uuids(&[uuid]);
        Ok(())
    }

    /// Writes or removes the loaded-UUID pointer for `uuid` and reconciles it.
    ///
    /// `tier` selects the directory and must be volatile or persistent.
    ///
    /// # Errors
    ///
    /// Returns `KeyfileError::Parse` for an invalid UUID,
    /// `KeyfileError::ReadOnly` if the tier has no writable directory, and
    /// `KeyfileError::Write` if the pointer cannot be written.
    pub fn write_pointer(
        &mut self,
        uuid: &str,
        tier: StorageTier,
        target: PointerTarget,
    ) -> Result<Vec<ProfileChange>> {
        let uuid = parse_uuid(uuid).ok_or_else(|| KeyfileError::Parse {
            location: uuid.to_string(),
            details: "not a valid UUID".to_string(),
        })?;
        let dir = match tier {
            StorageTier::Volatile => self.dirs.run(),
            StorageTier::Persistent => self.dirs.etc(),
            _ => None,
        }
        .ok_or(KeyfileError::ReadOnly {
            operation: "write pointer",
        })?;

        let target = match &target {
            PointerTarget::Path(path) => Some(path.as_path()),
            PointerTarget::Masked => Some(Path::new(MASKED_TARGET)),
            PointerTarget::Clear => None,
        };
        let path = pointer::write_pointer(dir, &uuid, target, self.config.allow_relative_links)?;
        debug!("keyfile: {uuid}: updated \"{}\"", path.display());

        if self.index.get(&uuid).is_none() {
            return Ok(Vec::new());
        }
        Ok(self.reconcile_uuids(&[uuid]))
    }

    /// Device match specs of devices that must stay unmanaged.
    pub fn unmanaged_specs(&self) -> Vec<String> {
        self.config
            .unmanaged_devices
            .as_deref()
            .map(split_match_specs)
            .unwrap_or_default()
    }

    /// Applies a changed `[keyfile]` configuration.
    ///
    /// Only the unmanaged device list and file flags take effect at
    /// runtime; the directories are fixed at creation. Returns whether the
    /// unmanaged device specs changed.
    pub fn apply_config(&mut self, config: &KeyfileConfig) -> bool {
        let before = self.unmanaged_specs();

        self.config.unmanaged_devices = config.unmanaged_devices.clone();
        self.config.allow_relative_links = config.allow_relative_links;
        self.config.check_permissions = config.check_permissions;
        self.config.monitor_connection_files = config.monitor_connection_files;

        let changed = before != self.unmanaged_specs();
        if changed {
            info!("keyfile: unmanaged devices changed");
        }
        changed
    }

    /// Points every pointer of `uuid` that names another file at `path`.
    fn repoint_pointers(&self, uuid: &str, path: &Path) -> Result<()> {
        for dir in [self.dirs.run(), self.dirs.etc()].into_iter().flatten() {
            let Some(target) = read_pointer_for(dir, uuid, self.config.check_permissions) else {
                continue;
            };
            if path_equal(&target, path) {
                continue;
            }
            debug!(
                "keyfile: {uuid}: pointer in \"{}\" now names \"{}\"",
                dir.display(),
                path.display()
            );
            pointer::write_pointer(dir, uuid, Some(path), self.config.allow_relative_links)?;
        }
        Ok(())
    }

    /// Removes pointers that mask `uuid`.
    fn clear_masks(&self, uuid: &str) -> Result<()> {
        for dir in [self.dirs.run(), self.dirs.etc()].into_iter().flatten() {
            let masked = read_pointer_for(dir, uuid, self.config.check_permissions)
                .is_some_and(|target| is_masked(&target));
            if masked {
                debug!("keyfile: {uuid}: unmasking in \"{}\"", dir.display());
                pointer::write_pointer(dir, uuid, None, self.config.allow_relative_links)?;
            }
        }
        Ok(())
    }

    /// Re-reads the pointer files of `uuids` and reconciles them.
    fn reconcile_uuids(&mut self, uuids: &[String]) -> Vec<ProfileChange> {
        let ctx = LoadContext {
            dirs: &self.dirs,
            reader: self.reader.as_ref(),
            check_permissions: self.config.check_permissions,
        };

        let mut pending = PendingChanges::default();
        for uuid in uuids {
            let Some(record) = self.index.get_mut(uuid) else {
                continue;
            };
            record.loaded_path_run = self
                .dirs
                .run()
                .and_then(|dir| read_pointer_for(dir, uuid, ctx.check_permissions));
            record.loaded_path_etc = self
                .dirs
                .etc()
                .and_then(|dir| read_pointer_for(dir, uuid, ctx.check_permissions));

            self.index.forget_paths(uuid);
            reconcile(&mut self.index, &ctx, uuid, &mut pending);
        }

        let changes = pending.into_changes(&self.index);
        self.publish(changes)
    }

    fn publish(&self, changes: Vec<ProfileChange>) -> Vec<ProfileChange> {
        for change in &changes {
            let _ = self.change_sender.send(change.clone());
        }
        changes
    }
}

fn read_pointer_for(dir: &Path, uuid: &str, check_owner: bool) -> Option<PathBuf> {
    let path = pointer::pointer_filename(dir, uuid, false);
    let filename = path.file_name()?.to_str()?;
    read_pointer(dir, filename, check_owner).map(|pointer| pointer.target)
}

fn is_gone(path: &Path) -> bool {
    matches!(fs::symlink_metadata(path), Err(e) if e.kind() == ErrorKind::NotFound)
}

fn missing(handle: StorageHandle) -> KeyfileError {
    KeyfileError::MissingStorage {
        details: format!("no profile for storage handle {handle}"),
    }
}
