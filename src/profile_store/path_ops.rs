use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};

use regex::Regex;

use super::StorageTier;
use crate::{KeyfileError, Result, config::KeyfileDirs};

/// Suffixes of files that are never profiles, matched case-insensitively.
const IGNORED_SUFFIXES: &[&str] = &[".swp", ".swpx", ".pem", ".der"];

/// Where a profile path lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedPath {
    /// Tier of the containing directory.
    pub tier: StorageTier,
    /// The containing keyfile directory.
    pub dir: PathBuf,
    /// Last path component.
    pub filename: String,
}

#[allow(clippy::expect_used)]
fn mkstemp_suffix() -> &'static Regex {
    static MKSTEMP: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\.[A-Za-z0-9]{6}$").expect("mkstemp suffix pattern is valid")
    });
    &MKSTEMP
}

fn has_suffix_ignore_case(name: &str, suffix: &str) -> bool {
    name.len() > suffix.len()
        && name
            .get(name.len() - suffix.len()..)
            .is_some_and(|tail| tail.eq_ignore_ascii_case(suffix))
}

/// Whether a directory entry is skipped instead of being read as a profile.
///
/// Hidden files, editor backups and swap files, temporary files in
/// `mkstemp` style and certificates are ignored. The rule is the same for
/// every tier; pointer files are hidden and recognized separately.
pub fn should_ignore(_tier: StorageTier, filename: &str) -> bool {
    if filename.is_empty() || filename.starts_with('.') {
        return true;
    }
    if filename.len() > 1 && filename.ends_with('~') {
        return true;
    }
    if mkstemp_suffix().is_match(filename) {
        return true;
    }
    IGNORED_SUFFIXES
        .iter()
        .any(|suffix| has_suffix_ignore_case(filename, suffix))
}

/// Turns a profile name into a filename the store will not ignore.
pub fn escape_filename(name: &str) -> String {
    let mut escaped: String = name
        .chars()
        .map(|c| if c == '/' { '*' } else { c })
        .collect();

    if escaped.starts_with('.') {
        escaped.replace_range(..1, "_");
    }
    if escaped.ends_with('~') {
        let last = escaped.len() - 1;
        escaped.replace_range(last.., "_");
    }
    if mkstemp_suffix().is_match(&escaped)
        || IGNORED_SUFFIXES
            .iter()
            .any(|suffix| has_suffix_ignore_case(&escaped, suffix))
    {
        escaped.push('_');
    }
    if escaped.is_empty() {
        escaped.push('_');
    }

    escaped
}

/// Compares two paths component-wise, so `/a//b` equals `/a/b`.
pub fn path_equal(a: &Path, b: &Path) -> bool {
    a.components().eq(b.components())
}

/// Determines which keyfile directory `path` belongs to.
///
/// The volatile directory is checked first, then the persistent one, then
/// the read-only ones in order.
///
/// # Errors
///
/// Returns `KeyfileError::NotAbsolute` for relative paths and
/// `KeyfileError::NotInKnownDirectory` for paths outside every keyfile
/// directory or whose filename is ignored.
pub fn classify_path(path: &Path, dirs: &KeyfileDirs) -> Result<ClassifiedPath> {
    if !path.is_absolute() {
        return Err(KeyfileError::NotAbsolute {
            path: path.to_path_buf(),
        });
    }

    let rejected = |reason: &str| KeyfileError::NotInKnownDirectory {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| rejected("no valid filename"))?;
    let parent = path.parent().ok_or_else(|| rejected("no parent directory"))?;

    let candidates = dirs
        .run()
        .map(|dir| (StorageTier::Volatile, dir))
        .into_iter()
        .chain(dirs.etc().map(|dir| (StorageTier::Persistent, dir)))
        .chain(
            dirs.libs()
                .iter()
                .enumerate()
                .map(|(index, dir)| (StorageTier::ReadOnly(index), dir.as_path())),
        );

    for (tier, dir) in candidates {
        if !path_equal(parent, dir) {
            continue;
        }
        if should_ignore(tier, filename) {
            return Err(rejected("filename is ignored"));
        }
        return Ok(ClassifiedPath {
            tier,
            dir: dir.to_path_buf(),
            filename: filename.to_string(),
        });
    }

    Err(rejected("not inside a keyfile directory"))
}
