//! Keyfile profile store with reload and reconciliation.
//!
//! Profiles live as files in up to three kinds of directories: a volatile
//! one, a persistent one and any number of read-only ones. Several files
//! may carry the same UUID; the store picks one winner per UUID, honours
//! loaded-UUID pointer files that promote a specific file or mask the UUID,
//! and reports every change of the exported set as a [`ProfileChange`].

mod candidate;
mod changes;
mod file_watcher;
mod file_watching;
mod index;
mod path_ops;
mod permissions;
mod plugin;
pub mod pointer;
mod reload;
mod scanner;
mod store;
mod tier;

#[cfg(test)]
mod tests;

pub use candidate::{FileCandidate, FileIdentity};
pub use changes::ProfileChange;
pub use file_watcher::{DirWatcher, FileEvent, FileEventKind};
pub use file_watching::{MonitorAction, SharedStore, lock_store, plan_actions};
pub use index::{ProfileRecord, StorageHandle};
pub use path_ops::{ClassifiedPath, classify_path, escape_filename, path_equal, should_ignore};
pub use permissions::{FileKind, check_file, check_metadata};
pub use plugin::SettingsPlugin;
pub use store::{PointerTarget, ProfileStore};
pub use tier::StorageTier;
