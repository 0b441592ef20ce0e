//! Loaded-UUID pointer files.
//!
//! A pointer is a symlink named `.loaded-<uuid>.nmkeyfile` inside the
//! volatile or persistent directory. Its target names the file that should
//! provide the profile for that UUID, or `/dev/null` to mask the UUID.

use std::{
    fs,
    io::ErrorKind,
    os::unix::fs::symlink,
    path::{Path, PathBuf},
};

use tracing::trace;

use super::{
    path_ops::path_equal,
    permissions::{FileKind, check_file},
};
use crate::{KeyfileError, Result, connection::parse_uuid};

/// Filename prefix of pointer files.
pub const LOADED_PREFIX: &str = ".loaded-";
/// Filename suffix of pointer files.
pub const LOADED_SUFFIX: &str = ".nmkeyfile";
/// Pointer target that masks a UUID.
pub const MASKED_TARGET: &str = "/dev/null";

/// A pointer file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedPointer {
    /// UUID the pointer is for.
    pub uuid: String,
    /// Full path of the pointer file.
    pub path: PathBuf,
    /// Absolute symlink target.
    pub target: PathBuf,
}

/// Whether a pointer target masks its UUID.
pub fn is_masked(target: &Path) -> bool {
    path_equal(target, Path::new(MASKED_TARGET))
}

/// Path of the pointer file for `uuid` in `dir`.
///
/// The temporary variant carries a trailing `~`.
pub fn pointer_filename(dir: &Path, uuid: &str, temporary: bool) -> PathBuf {
    let tilde = if temporary { "~" } else { "" };
    dir.join(format!("{LOADED_PREFIX}{uuid}{LOADED_SUFFIX}{tilde}"))
}

/// Extracts the UUID from a pointer filename.
///
/// Only the lower-case hyphenated form names a pointer, so every UUID has
/// exactly one pointer filename per directory.
pub fn decode_filename(filename: &str) -> Option<String> {
    let middle = filename
        .strip_prefix(LOADED_PREFIX)?
        .strip_suffix(LOADED_SUFFIX)?;
    parse_uuid(middle).filter(|uuid| uuid == middle)
}

/// Reads the pointer `filename` inside `dir`.
///
/// Returns `None` if the name is not a pointer name, the file is not a
/// symlink (or fails the ownership check), or the link cannot be read.
pub fn read_pointer(dir: &Path, filename: &str, check_owner: bool) -> Option<LoadedPointer> {
    let uuid = decode_filename(filename)?;
    let path = dir.join(filename);

    if let Err(e) = check_file(FileKind::Pointer, &path, check_owner) {
        trace!("keyfile: ignoring pointer \"{}\": {e}", path.display());
        return None;
    }

    let target = fs::read_link(&path).ok()?;
    let target = if target.is_absolute() {
        target
    } else {
        dir.join(target)
    };

    Some(LoadedPointer { uuid, path, target })
}

/// Creates, replaces or removes the pointer for `uuid` in `dir`.
///
/// With `target` unset the pointer is removed. With `allow_relative` a
/// target directly inside `dir` is stored as a bare filename. The link is
/// created under the temporary name and renamed into place.
///
/// # Errors
///
/// Returns `KeyfileError::Write` if the symlink cannot be created or renamed.
pub fn write_pointer(
    dir: &Path,
    uuid: &str,
    target: Option<&Path>,
    allow_relative: bool,
) -> Result<PathBuf> {
    let tmp = pointer_filename(dir, uuid, true);
    let path = pointer_filename(dir, uuid, false);

    remove_if_exists(&tmp);

    let Some(target) = target else {
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(KeyfileError::write(e, &path)),
        }
        return Ok(path);
    };

    let link_target = match target.parent().zip(target.file_name()) {
        Some((parent, name)) if allow_relative && path_equal(parent, dir) => PathBuf::from(name),
        _ => target.to_path_buf(),
    };

    symlink(&link_target, &tmp).map_err(|e| KeyfileError::write(e, &tmp))?;

    if let Err(e) = fs::rename(&tmp, &path) {
        remove_if_exists(&tmp);
        return Err(KeyfileError::write(e, &path));
    }

    Ok(path)
}

fn remove_if_exists(path: &Path) {
    let _ = fs::remove_file(path);
}
