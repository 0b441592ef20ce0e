use std::{
    cmp::Ordering,
    fs::Metadata,
    os::unix::fs::MetadataExt,
    path::{Path, PathBuf},
};

use super::{
    StorageTier,
    permissions::{FileKind, check_file},
};
use crate::{
    KeyfileError, Result,
    config::KeyfileDirs,
    connection::{Connection, ProfileReader},
};

/// Identity and modification time of a file as seen at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileIdentity {
    /// Device number.
    pub dev: u64,
    /// Inode number.
    pub ino: u64,
    /// Modification time, seconds.
    pub mtime_sec: i64,
    /// Modification time, nanoseconds.
    pub mtime_nsec: i64,
}

impl FileIdentity {
    /// Captures the identity from stat data.
    pub fn from_metadata(metadata: &Metadata) -> Self {
        Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
            mtime_sec: metadata.mtime(),
            mtime_nsec: metadata.mtime_nsec(),
        }
    }

    /// Whether `metadata` describes the same file (device and inode).
    pub fn same_file(&self, metadata: &Metadata) -> bool {
        self.dev == metadata.dev() && self.ino == metadata.ino()
    }
}

/// One on-disk file providing a profile.
#[derive(Debug, Clone)]
pub struct FileCandidate {
    pub(crate) path: PathBuf,
    pub(crate) tier: StorageTier,
    pub(crate) priority: u32,
    pub(crate) identity: FileIdentity,
    pub(crate) connection: Option<Connection>,
}

impl FileCandidate {
    pub(crate) fn new(
        path: PathBuf,
        tier: StorageTier,
        priority: u32,
        identity: FileIdentity,
        connection: Connection,
    ) -> Self {
        Self {
            path,
            tier,
            priority,
            identity,
            connection: Some(connection),
        }
    }

    /// Full path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Tier of the directory holding the file.
    pub fn tier(&self) -> StorageTier {
        self.tier
    }

    /// Scan priority; smaller is more important.
    pub fn priority(&self) -> u32 {
        self.priority
    }

    /// Identity captured when the file was last read.
    pub fn identity(&self) -> FileIdentity {
        self.identity
    }

    fn filename(&self) -> &std::ffi::OsStr {
        self.path.file_name().unwrap_or(self.path.as_os_str())
    }
}

/// Orders candidates best first.
///
/// Smaller priority wins, then the newer file, then the smaller filename.
pub(crate) fn compare_candidates(a: &FileCandidate, b: &FileCandidate) -> Ordering {
    if a.tier != b.tier {
        debug_assert_eq!(
            a.tier > b.tier,
            a.priority < b.priority,
            "tier and priority disagree for {} and {}",
            a.path.display(),
            b.path.display(),
        );
    }

    a.priority
        .cmp(&b.priority)
        .then_with(|| b.identity.mtime_sec.cmp(&a.identity.mtime_sec))
        .then_with(|| b.identity.mtime_nsec.cmp(&a.identity.mtime_nsec))
        .then_with(|| a.filename().cmp(b.filename()))
}

/// Everything needed to read profiles from disk.
pub(crate) struct LoadContext<'a> {
    pub(crate) dirs: &'a KeyfileDirs,
    pub(crate) reader: &'a dyn ProfileReader,
    pub(crate) check_permissions: bool,
}

impl LoadContext<'_> {
    /// Stats, checks and parses the profile at `path`.
    ///
    /// # Errors
    ///
    /// Returns `KeyfileError::Access` if the file cannot be stat'ed,
    /// `KeyfileError::Permission` if it fails the permission checks and
    /// `KeyfileError::Parse` if it is not a valid profile.
    pub(crate) fn load_file(&self, path: &Path) -> Result<(Connection, FileIdentity)> {
        let metadata = check_file(FileKind::Keyfile, path, self.check_permissions)?;
        let connection = self.reader.read_profile(path, self.dirs.plugin_dir())?;

        if connection.uuid().is_none() {
            return Err(KeyfileError::parse("profile has no UUID", path));
        }

        Ok((connection, FileIdentity::from_metadata(&metadata)))
    }
}
