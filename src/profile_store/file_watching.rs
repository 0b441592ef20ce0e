use std::{
    collections::BTreeSet,
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{
    ProfileStore, StorageTier,
    file_watcher::DirWatcher,
    path_ops::should_ignore,
    pointer::LOADED_PREFIX,
};
use crate::{KeyfileError, Result};

/// A store shared between the host and the monitoring task.
pub type SharedStore = Arc<Mutex<ProfileStore>>;

const DEBOUNCE: Duration = Duration::from_millis(500);

/// What a batch of file events asks the store to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorAction {
    /// A pointer changed; rescan everything.
    ReloadAll,
    /// Re-read these files, in order.
    LoadPaths(Vec<PathBuf>),
}

/// Plans the work for a batch of changed paths.
///
/// Pointer changes can affect any candidate, so they trigger a full reload.
/// Hidden and temporary files are dropped from the batch.
pub fn plan_actions(paths: impl IntoIterator<Item = PathBuf>) -> MonitorAction {
    let mut load = BTreeSet::new();

    for path in paths {
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if name.starts_with(LOADED_PREFIX) {
            return MonitorAction::ReloadAll;
        }
        if should_ignore(StorageTier::Persistent, name) {
            continue;
        }
        load.insert(path);
    }

    MonitorAction::LoadPaths(load.into_iter().collect())
}

/// Locks the store, recovering from a poisoned lock.
pub fn lock_store(store: &SharedStore) -> MutexGuard<'_, ProfileStore> {
    match store.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl ProfileStore {
    /// Watches the keyfile directories and applies changes as they happen.
    ///
    /// Events are debounced; after a quiet period the collected paths are
    /// re-read one by one, or everything is reloaded if a pointer changed.
    /// Must be called from within a Tokio runtime.
    ///
    /// Returns `None` without watching anything unless
    /// `monitor_connection_files` is set.
    ///
    /// # Errors
    /// Returns error if file watching cannot be initialized.
    pub fn start_monitoring(store: SharedStore) -> Result<Option<JoinHandle<()>>> {
        let dirs: Vec<PathBuf> = {
            let guard = lock_store(&store);
            if !guard.config().monitor_connection_files {
                debug!("keyfile: monitor_connection_files is off, not watching");
                return Ok(None);
            }
            guard.dirs().all().map(PathBuf::from).collect()
        };

        let (mut watcher, mut event_rx) = DirWatcher::new().map_err(|e| {
            KeyfileError::FileWatchError {
                path: PathBuf::new(),
                details: format!("failed to create file watcher: {e}"),
            }
        })?;
        watcher
            .update_watched_dirs(&dirs)
            .map_err(|e| KeyfileError::FileWatchError {
                path: e.paths.first().cloned().unwrap_or_default(),
                details: format!("failed to watch keyfile directories: {e}"),
            })?;

        for dir in watcher.watched_dirs() {
            info!("keyfile: monitoring \"{}\"", dir.display());
        }

        let handle = tokio::spawn(async move {
            let _watcher = watcher;
            let mut pending: BTreeSet<PathBuf> = BTreeSet::new();

            let debounce_sleep = tokio::time::sleep(DEBOUNCE);
            tokio::pin!(debounce_sleep);

            loop {
                tokio::select! {
                    event = event_rx.recv() => {
                        let Some(event) = event else {
                            break;
                        };
                        debug!("keyfile: {:?} \"{}\"", event.kind, event.path.display());
                        pending.insert(event.path);

                        debounce_sleep.as_mut().reset(tokio::time::Instant::now() + DEBOUNCE);
                    }

                    _ = &mut debounce_sleep, if !pending.is_empty() => {
                        let action = plan_actions(std::mem::take(&mut pending));
                        apply_action(&store, action);
                    }
                }
            }
        });

        Ok(Some(handle))
    }
}

fn apply_action(store: &SharedStore, action: MonitorAction) {
    let mut store = lock_store(store);

    match action {
        MonitorAction::ReloadAll => {
            store.reload();
        }
        MonitorAction::LoadPaths(paths) => {
            for path in paths {
                if let Err(e) = store.load_one(&path) {
                    warn!("keyfile: failed to update \"{}\": {e}", path.display());
                }
            }
        }
    }
}
