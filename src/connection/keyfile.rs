//! The keyfile text format.
//!
//! A keyfile is an INI-style document:
//!
//! ```text
//! [connection]
//! id=Home
//! uuid=0d3e2e0a-3bd5-4c5e-8a57-4ef9c7f2b4a1
//! type=802-11-wireless
//!
//! [802-11-wireless-security]
//! psk=secret
//! psk-flags=0
//! ```

use std::{
    collections::BTreeMap,
    fs,
    io::{ErrorKind, Write},
    os::unix::fs::OpenOptionsExt,
    path::{Path, PathBuf},
};

use tracing::debug;

use super::{Connection, KEY_ID, SETTING_CONNECTION, SettingGroups};
use crate::{KeyfileError, Result, profile_store::escape_filename};

/// Properties holding certificate or key paths, resolved against the plugin dir.
const PATH_KEYS: &[&str] = &[
    "ca-cert",
    "client-cert",
    "private-key",
    "phase2-ca-cert",
    "phase2-client-cert",
    "phase2-private-key",
];

/// Parses profile files.
pub trait ProfileReader: Send + Sync {
    /// Reads and validates the profile stored at `path`.
    ///
    /// On success the profile carries a valid, normalized UUID.
    ///
    /// # Errors
    ///
    /// Returns `KeyfileError::Access` if the file cannot be read and
    /// `KeyfileError::Parse` if its content is not a valid profile.
    fn read_profile(&self, path: &Path, plugin_dir: &Path) -> Result<Connection>;
}

/// Persists and removes profile files.
pub trait ProfileWriter: Send + Sync {
    /// Writes `connection` into `dir`, reusing `existing` when it lives there.
    ///
    /// Returns the path written.
    ///
    /// # Errors
    ///
    /// Returns `KeyfileError::Write` if the file cannot be written.
    fn write_profile(
        &self,
        connection: &Connection,
        dir: &Path,
        existing: Option<&Path>,
    ) -> Result<PathBuf>;

    /// Removes the profile file at `path`. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns `KeyfileError::Write` if the file cannot be removed.
    fn delete_profile(&self, path: &Path) -> Result<()>;
}

/// Reader and writer for the keyfile text format.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyfileFormat;

impl ProfileReader for KeyfileFormat {
    fn read_profile(&self, path: &Path, plugin_dir: &Path) -> Result<Connection> {
        let content = fs::read_to_string(path).map_err(|e| KeyfileError::access(e, path))?;
        let fallback_id = path.file_name().map(|name| name.to_string_lossy());

        let mut connection = parse(&content, fallback_id.as_deref())
            .map_err(|details| KeyfileError::parse(details, path))?;
        resolve_relative_paths(&mut connection, plugin_dir);
        connection.normalize_and_verify().map_err(|e| match e {
            KeyfileError::Parse { details, .. } => KeyfileError::parse(details, path),
            other => other,
        })?;

        Ok(connection)
    }
}

impl ProfileWriter for KeyfileFormat {
    fn write_profile(
        &self,
        connection: &Connection,
        dir: &Path,
        existing: Option<&Path>,
    ) -> Result<PathBuf> {
        let path = choose_path(self, connection, dir, existing);
        let Some(name) = path.file_name().map(|name| name.to_string_lossy().to_string()) else {
            return Err(KeyfileError::write("no filename", &path));
        };
        let tmp = dir.join(format!(".{name}~"));

        let result = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&tmp)
            .and_then(|mut file| {
                file.write_all(serialize(connection).as_bytes())?;
                file.sync_all()
            })
            .and_then(|()| fs::rename(&tmp, &path));

        if let Err(e) = result {
            let _ = fs::remove_file(&tmp);
            return Err(KeyfileError::write(e, &path));
        }

        debug!("keyfile: wrote \"{}\"", path.display());
        Ok(path)
    }

    fn delete_profile(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(KeyfileError::write(e, path)),
        }
    }
}

/// Parses keyfile text into setting groups.
///
/// `fallback_id` is used when the `[connection]` group has no `id`.
pub fn parse(content: &str, fallback_id: Option<&str>) -> std::result::Result<Connection, String> {
    let mut groups = SettingGroups::new();
    let mut current: Option<String> = None;

    for (number, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(header) = line.strip_prefix('[') {
            let name = header
                .strip_suffix(']')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .ok_or_else(|| format!("line {}: malformed group header", number + 1))?;
            groups.entry(name.to_string()).or_default();
            current = Some(name.to_string());
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            return Err(format!("line {}: expected key=value", number + 1));
        };
        let Some(group) = current.as_ref() else {
            return Err(format!("line {}: key outside of a group", number + 1));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("line {}: empty key", number + 1));
        }

        groups
            .entry(group.clone())
            .or_default()
            .insert(key.to_string(), value.trim().to_string());
    }

    let mut connection = Connection::from_groups(groups);
    if connection.id().is_none_or(str::is_empty) {
        if let Some(id) = fallback_id {
            connection.set(SETTING_CONNECTION, KEY_ID, id);
        }
    }

    Ok(connection)
}

/// Serializes a profile, `[connection]` first and other groups sorted.
pub fn serialize(connection: &Connection) -> String {
    let mut out = String::new();
    let groups = connection.groups();

    let ordered = groups
        .get_key_value(SETTING_CONNECTION)
        .into_iter()
        .chain(groups.iter().filter(|(name, _)| *name != SETTING_CONNECTION));

    for (name, settings) in ordered {
        if !out.is_empty() {
            out.push('\n');
        }
        write_group(&mut out, name, settings);
    }

    out
}

fn write_group(out: &mut String, name: &str, settings: &BTreeMap<String, String>) {
    out.push('[');
    out.push_str(name);
    out.push_str("]\n");
    for (key, value) in settings {
        out.push_str(key);
        out.push('=');
        out.push_str(value);
        out.push('\n');
    }
}

fn resolve_relative_paths(connection: &mut Connection, plugin_dir: &Path) {
    let mut updates = Vec::new();

    for (group, settings) in connection.groups() {
        for key in PATH_KEYS {
            let Some(value) = settings.get(*key) else {
                continue;
            };
            if value.is_empty() || value.starts_with('/') || value.contains("://") {
                continue;
            }
            let resolved = plugin_dir.join(value).to_string_lossy().to_string();
            updates.push((group.clone(), *key, resolved));
        }
    }

    for (group, key, value) in updates {
        connection.set(&group, key, value);
    }
}

fn choose_path(
    reader: &impl ProfileReader,
    connection: &Connection,
    dir: &Path,
    existing: Option<&Path>,
) -> PathBuf {
    if let Some(existing) = existing.filter(|existing| existing.parent() == Some(dir)) {
        return existing.to_path_buf();
    }

    let id = connection.id().unwrap_or("connection");
    let uuid = connection.uuid().unwrap_or_default();
    let base = escape_filename(id);
    let first = dir.join(&base);

    let taken = match fs::symlink_metadata(&first) {
        Err(_) => false,
        Ok(_) => reader
            .read_profile(&first, dir)
            .map(|other| other.uuid() != Some(uuid))
            .unwrap_or(true),
    };

    if taken {
        dir.join(format!("{base}-{uuid}"))
    } else {
        first
    }
}
