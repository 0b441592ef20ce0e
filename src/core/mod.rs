use std::{
    fmt,
    path::{Path, PathBuf},
    result,
};

use thiserror::Error;

/// Error types for the keyfile profile store.
///
/// Per-file failures during a directory scan (`Access`, `Parse`, `Permission`)
/// are logged and skipped by the reload engine; they only reach callers of the
/// single-file operations.
#[derive(Error, Debug)]
pub enum KeyfileError {
    /// The given filename is not an absolute path
    #[error("'{path}' is not an absolute path")]
    NotAbsolute {
        /// The offending path
        path: PathBuf,
    },

    /// The file does not live directly inside one of the keyfile directories,
    /// or its name is one the store ignores
    #[error("'{path}' is not a keyfile inside a keyfile directory: {reason}")]
    NotInKnownDirectory {
        /// The offending path
        path: PathBuf,
        /// Why the path was rejected
        reason: String,
    },

    /// stat/lstat/open failed
    #[error("cannot access '{path}': {details}")]
    Access {
        /// Path that could not be accessed
        path: PathBuf,
        /// Underlying error details
        details: String,
    },

    /// Malformed profile content
    #[error("failed to parse profile '{location}': {details}")]
    Parse {
        /// File path, or "string" for in-memory content
        location: String,
        /// Parse error details
        details: String,
    },

    /// Wrong owner, mode or file type
    #[error("insecure or unexpected file '{path}': {details}")]
    Permission {
        /// Path that failed the check
        path: PathBuf,
        /// Reason the check failed
        details: String,
    },

    /// Writing, renaming or unlinking a file failed
    #[error("failed to write '{path}': {details}")]
    Write {
        /// Path being written
        path: PathBuf,
        /// Underlying error details
        details: String,
    },

    /// A storage handle does not address a record of this store
    #[error("missing storage for keyfile: {details}")]
    MissingStorage {
        /// Details about the stale handle
        details: String,
    },

    /// No writable keyfile directory is configured
    #[error("no writable keyfile directory for {operation}")]
    ReadOnly {
        /// The operation that needed a writable directory
        operation: &'static str,
    },

    /// A profile with this UUID is already exported
    #[error("a profile with UUID {uuid} already exists")]
    DuplicateUuid {
        /// The conflicting UUID
        uuid: String,
    },

    /// Failed to set up directory monitoring
    #[error("file watcher error for '{path}': {details}")]
    FileWatchError {
        /// Path being watched when error occurred
        path: PathBuf,
        /// File watcher error details
        details: String,
    },

    /// Configuration validation error
    #[error("configuration validation failed for '{component}': {details}")]
    ConfigValidation {
        /// Component that failed validation
        component: String,
        /// Validation error details
        details: String,
    },

    /// TOML parsing error with location context
    #[error("failed to parse TOML at '{location}': {details}")]
    TomlParseError {
        /// Location of TOML being parsed (file path or "string")
        location: String,
        /// Parse error details
        details: String,
    },
}

/// A specialized `Result` type for keyfile store operations.
pub type Result<T> = result::Result<T, KeyfileError>;

impl KeyfileError {
    /// Creates a TOML parsing error with optional file path context.
    ///
    /// # Arguments
    ///
    /// * `error` - The underlying parsing error
    /// * `path` - Optional path to the file that failed to parse
    pub fn toml_parse(error: impl fmt::Display, path: Option<&Path>) -> Self {
        let location = match path {
            Some(p) => p.to_string_lossy().to_string(),
            None => "string".to_string(),
        };

        KeyfileError::TomlParseError {
            location,
            details: error.to_string(),
        }
    }

    /// Creates a profile parse error for a file.
    pub fn parse(error: impl fmt::Display, path: &Path) -> Self {
        KeyfileError::Parse {
            location: path.to_string_lossy().to_string(),
            details: error.to_string(),
        }
    }

    /// Creates an access error from an I/O failure on `path`.
    pub fn access(error: impl fmt::Display, path: &Path) -> Self {
        KeyfileError::Access {
            path: path.to_path_buf(),
            details: error.to_string(),
        }
    }

    /// Creates a write error from an I/O failure on `path`.
    pub fn write(error: impl fmt::Display, path: &Path) -> Self {
        KeyfileError::Write {
            path: path.to_path_buf(),
            details: error.to_string(),
        }
    }

    /// Creates a permission error for `path`.
    pub fn permission(details: impl Into<String>, path: &Path) -> Self {
        KeyfileError::Permission {
            path: path.to_path_buf(),
            details: details.into(),
        }
    }
}

/// Aborts on a broken internal invariant of the store.
///
/// These are programming errors (for example two records claiming one file),
/// never conditions caused by directory contents.
#[allow(clippy::panic)]
pub(crate) fn invariant_violation(details: fmt::Arguments<'_>) -> ! {
    tracing::error!("keyfile: invariant violated: {details}");
    panic!("keyfile: invariant violated: {details}");
}
