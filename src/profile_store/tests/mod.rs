//! Unit tests for the profile store.
//!
//! Filesystem tests run in temporary directories with ownership checks
//! disabled, so they work without root.

#![allow(clippy::panic, clippy::unwrap_used)]

mod pointer;

use std::{
    fs,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use tempfile::TempDir;

use crate::config::{KeyfileConfig, KeyfileDirs};

use super::ProfileStore;

pub(super) const U1: &str = "0d3e2e0a-3bd5-4c5e-8a57-4ef9c7f2b4a1";
pub(super) const U2: &str = "5f6c7d8e-1a2b-4c3d-9e8f-001122334455";

/// A volatile, a persistent and one read-only directory in a tempdir.
pub(super) struct Fixture {
    _root: TempDir,
    pub run: PathBuf,
    pub etc: PathBuf,
    pub lib: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        let run = root.path().join("run");
        let etc = root.path().join("etc");
        let lib = root.path().join("lib");
        for dir in [&run, &etc, &lib] {
            fs::create_dir(dir).unwrap();
        }

        Self {
            _root: root,
            run,
            etc,
            lib,
        }
    }

    pub fn dirs(&self) -> KeyfileDirs {
        KeyfileDirs::new(
            Some(self.run.clone()),
            Some(self.etc.clone()),
            vec![self.lib.clone()],
        )
    }

    pub fn store(&self) -> ProfileStore {
        ProfileStore::with_dirs(self.dirs(), &test_config())
    }
}

pub(super) fn test_config() -> KeyfileConfig {
    KeyfileConfig {
        check_permissions: false,
        ..KeyfileConfig::default()
    }
}

/// Writes a minimal ethernet profile and returns its path.
pub(super) fn write_profile(dir: &Path, name: &str, uuid: &str, id: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(
        &path,
        format!("[connection]\nid={id}\nuuid={uuid}\ntype=802-3-ethernet\n"),
    )
    .unwrap();
    path
}

/// Sets the modification time to `secs` after the epoch.
pub(super) fn set_mtime(path: &Path, secs: u64) {
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap();
}
