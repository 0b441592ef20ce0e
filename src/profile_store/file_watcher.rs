use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher, recommended_watcher};
use tokio::sync::mpsc;

/// A file system event inside a watched directory.
#[derive(Debug, Clone)]
pub struct FileEvent {
    /// The path of the file that changed
    pub path: PathBuf,
    /// The type of change that occurred
    pub kind: FileEventKind,
}

/// The type of file system change that occurred.
#[derive(Debug, Clone, PartialEq)]
pub enum FileEventKind {
    /// File was modified
    Modified,
    /// File was created
    Created,
    /// File was removed
    Removed,
}

impl FileEventKind {
    /// Maps a notify event kind, dropping access and metadata-less noise.
    pub fn from_notify(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(FileEventKind::Created),
            EventKind::Modify(_) => Some(FileEventKind::Modified),
            EventKind::Remove(_) => Some(FileEventKind::Removed),
            _ => None,
        }
    }
}

/// Watches keyfile directories (not recursively) for changes.
///
/// Events are forwarded to an unbounded Tokio channel; they are bursty but
/// rare, and the consumer debounces them.
pub struct DirWatcher {
    watcher: RecommendedWatcher,
    watched_dirs: HashSet<PathBuf>,
}

impl DirWatcher {
    /// Creates a new watcher and returns it with its event receiver.
    ///
    /// # Errors
    /// Returns error if the underlying file system watcher cannot be initialized.
    pub fn new() -> Result<(Self, mpsc::UnboundedReceiver<FileEvent>), notify::Error> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let watcher = recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else {
                return;
            };
            let Some(kind) = FileEventKind::from_notify(&event.kind) else {
                return;
            };

            for path in event.paths {
                let _ = event_tx.send(FileEvent {
                    path,
                    kind: kind.clone(),
                });
            }
        })?;

        Ok((
            Self {
                watcher,
                watched_dirs: HashSet::new(),
            },
            event_rx,
        ))
    }

    /// Starts watching `dir`. Watching a directory twice is a no-op.
    ///
    /// # Errors
    /// Returns error if the watcher fails to monitor the directory.
    pub fn watch_dir(&mut self, dir: &Path) -> Result<(), notify::Error> {
        if self.watched_dirs.contains(dir) {
            return Ok(());
        }

        self.watcher.watch(dir, RecursiveMode::NonRecursive)?;
        self.watched_dirs.insert(dir.to_path_buf());

        Ok(())
    }

    /// Stops watching `dir` if it is watched.
    ///
    /// # Errors
    /// Returns error if the watcher fails to stop monitoring.
    pub fn unwatch_dir(&mut self, dir: &Path) -> Result<(), notify::Error> {
        if self.watched_dirs.remove(dir) {
            self.watcher.unwatch(dir)?;
        }

        Ok(())
    }

    /// Makes the watched set equal to `dirs`, skipping ones that do not exist.
    ///
    /// # Errors
    /// Returns error if any directory cannot be watched or unwatched.
    pub fn update_watched_dirs(&mut self, dirs: &[PathBuf]) -> Result<(), notify::Error> {
        let wanted: HashSet<PathBuf> = dirs.iter().filter(|dir| dir.is_dir()).cloned().collect();
        let current = self.watched_dirs.clone();

        for dir in current.difference(&wanted) {
            self.unwatch_dir(dir)?;
        }
        for dir in wanted.difference(&current) {
            self.watch_dir(dir)?;
        }

        Ok(())
    }

    /// Directories currently watched.
    pub fn watched_dirs(&self) -> impl Iterator<Item = &Path> {
        self.watched_dirs.iter().map(PathBuf::as_path)
    }
}
