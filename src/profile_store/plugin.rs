use std::{path::Path, sync::Arc};

use super::{ProfileChange, ProfileStore, StorageHandle};
use crate::{Result, connection::Connection};

/// The interface a settings host drives a profile backend through.
pub trait SettingsPlugin: Send {
    /// Rescans everything; see [`ProfileStore::reload`].
    fn reload_connections(&mut self) -> Vec<ProfileChange>;

    /// Re-reads one file; see [`ProfileStore::load_one`].
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not managed or cannot be loaded.
    fn load_connection(&mut self, path: &Path) -> Result<Vec<ProfileChange>>;

    /// Adds a profile; see [`ProfileStore::add_connection`].
    ///
    /// # Errors
    ///
    /// Returns an error if the profile is invalid or cannot be stored.
    fn add_connection(
        &mut self,
        connection: Connection,
        save_to_disk: bool,
    ) -> Result<StorageHandle>;

    /// Updates a profile; see [`ProfileStore::commit`].
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is stale or the profile cannot be stored.
    fn commit_connection(
        &mut self,
        handle: StorageHandle,
        connection: Connection,
    ) -> Result<Arc<Connection>>;

    /// Deletes a profile; see [`ProfileStore::delete`].
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is stale or files cannot be removed.
    fn delete_connection(&mut self, handle: StorageHandle) -> Result<()>;

    /// Device match specs that must stay unmanaged.
    fn unmanaged_specs(&self) -> Vec<String>;
}

impl SettingsPlugin for ProfileStore {
    fn reload_connections(&mut self) -> Vec<ProfileChange> {
        self.reload()
    }

    fn load_connection(&mut self, path: &Path) -> Result<Vec<ProfileChange>> {
        self.load_one(path)
    }

    fn add_connection(
        &mut self,
        connection: Connection,
        save_to_disk: bool,
    ) -> Result<StorageHandle> {
        ProfileStore::add_connection(self, connection, save_to_disk)
    }

    fn commit_connection(
        &mut self,
        handle: StorageHandle,
        connection: Connection,
    ) -> Result<Arc<Connection>> {
        self.commit(handle, connection)
    }

    fn delete_connection(&mut self, handle: StorageHandle) -> Result<()> {
        self.delete(handle)
    }

    fn unmanaged_specs(&self) -> Vec<String> {
        ProfileStore::unmanaged_specs(self)
    }
}
