use std::{
    fs::{self, Metadata},
    os::unix::fs::MetadataExt,
    path::Path,
};

use crate::{KeyfileError, Result};

/// What a file in a keyfile directory is expected to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// A profile; must be a regular file.
    Keyfile,
    /// A loaded-UUID pointer; must be a symbolic link.
    Pointer,
}

/// Checks already gathered metadata of `path`.
///
/// With `check_owner` set the file must belong to root, and profiles must
/// not be accessible by group or others.
///
/// # Errors
///
/// Returns `KeyfileError::Permission` describing the first failed check.
pub fn check_metadata(
    kind: FileKind,
    metadata: &Metadata,
    path: &Path,
    check_owner: bool,
) -> Result<()> {
    let file_type = metadata.file_type();
    match kind {
        FileKind::Keyfile if !file_type.is_file() => {
            return Err(KeyfileError::permission("file is not a regular file", path));
        }
        FileKind::Pointer if !file_type.is_symlink() => {
            return Err(KeyfileError::permission("file is not a symlink", path));
        }
        _ => {}
    }

    if !check_owner {
        return Ok(());
    }

    if metadata.uid() != 0 {
        return Err(KeyfileError::permission(
            format!("file owner ({}) is insecure", metadata.uid()),
            path,
        ));
    }
    if kind == FileKind::Keyfile && metadata.mode() & 0o077 != 0 {
        return Err(KeyfileError::permission(
            format!("file permissions ({:03o}) are insecure", metadata.mode() & 0o7777),
            path,
        ));
    }

    Ok(())
}

/// Stats `path` and checks it; pointers are not followed.
///
/// # Errors
///
/// Returns `KeyfileError::Access` if the file cannot be stat'ed and
/// `KeyfileError::Permission` if a check fails.
pub fn check_file(kind: FileKind, path: &Path, check_owner: bool) -> Result<Metadata> {
    let metadata = match kind {
        FileKind::Keyfile => fs::metadata(path),
        FileKind::Pointer => fs::symlink_metadata(path),
    }
    .map_err(|e| KeyfileError::access(e, path))?;

    check_metadata(kind, &metadata, path, check_owner)?;
    Ok(metadata)
}
