//! Connection profile model.
//!
//! A [`Connection`] is the parsed form of one keyfile: named setting groups
//! holding string properties. The `[connection]` group carries the identity
//! (`uuid`, `id`, `type`). Reading and writing the on-disk format lives in
//! [`keyfile`].

mod diff;
pub mod keyfile;
mod secrets;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;

use uuid::Uuid;

pub use keyfile::{KeyfileFormat, ProfileReader, ProfileWriter};
pub use secrets::{CompareFlags, SecretFlags};

use crate::{KeyfileError, Result};

/// Name of the setting group holding the profile identity.
pub const SETTING_CONNECTION: &str = "connection";
/// Property holding the profile UUID.
pub const KEY_UUID: &str = "uuid";
/// Property holding the human readable profile name.
pub const KEY_ID: &str = "id";
/// Property holding the connection type.
pub const KEY_TYPE: &str = "type";

/// Setting group name to its properties.
pub type SettingGroups = BTreeMap<String, BTreeMap<String, String>>;

/// A connection profile.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Connection {
    groups: SettingGroups,
}

impl Connection {
    /// Creates a minimal profile with the given identity.
    ///
    /// # Errors
    ///
    /// Returns `KeyfileError::Parse` if `uuid` is not a valid UUID or `id`
    /// or `connection_type` is empty.
    pub fn new(id: &str, uuid: &str, connection_type: &str) -> Result<Self> {
        let mut connection = Self::default();
        connection.set(SETTING_CONNECTION, KEY_ID, id);
        connection.set(SETTING_CONNECTION, KEY_UUID, uuid);
        connection.set(SETTING_CONNECTION, KEY_TYPE, connection_type);
        connection.normalize_and_verify()?;
        Ok(connection)
    }

    pub(crate) fn from_groups(groups: SettingGroups) -> Self {
        Self { groups }
    }

    /// The profile UUID.
    pub fn uuid(&self) -> Option<&str> {
        self.get(SETTING_CONNECTION, KEY_UUID)
    }

    /// The profile name.
    pub fn id(&self) -> Option<&str> {
        self.get(SETTING_CONNECTION, KEY_ID)
    }

    /// The connection type (e.g. "802-3-ethernet").
    pub fn connection_type(&self) -> Option<&str> {
        self.get(SETTING_CONNECTION, KEY_TYPE)
    }

    /// Looks up a property.
    pub fn get(&self, group: &str, key: &str) -> Option<&str> {
        self.groups
            .get(group)
            .and_then(|settings| settings.get(key))
            .map(String::as_str)
    }

    /// Sets a property, creating the group if needed.
    pub fn set(&mut self, group: &str, key: &str, value: impl Into<String>) {
        self.groups
            .entry(group.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
    }

    /// Removes a property, returning its previous value.
    pub fn remove(&mut self, group: &str, key: &str) -> Option<String> {
        self.groups.get_mut(group).and_then(|settings| settings.remove(key))
    }

    /// All setting groups, sorted by name.
    pub fn groups(&self) -> &SettingGroups {
        &self.groups
    }

    /// Checks the profile identity and normalizes the UUID.
    ///
    /// The UUID is rewritten in lower-case hyphenated form so that it can key
    /// indexes and pointer filenames.
    ///
    /// # Errors
    ///
    /// Returns `KeyfileError::Parse` if the UUID, id or type is missing or invalid.
    pub fn normalize_and_verify(&mut self) -> Result<()> {
        let uuid = self.uuid().ok_or_else(|| invalid("missing connection.uuid"))?;
        let parsed = parse_uuid(uuid)
            .ok_or_else(|| invalid(format!("invalid connection.uuid '{uuid}'")))?;
        self.set(SETTING_CONNECTION, KEY_UUID, parsed);

        if self.id().is_none_or(str::is_empty) {
            return Err(invalid("missing connection.id"));
        }
        if self.connection_type().is_none_or(str::is_empty) {
            return Err(invalid("missing connection.type"));
        }
        Ok(())
    }
}

/// Parses a hyphenated UUID, returning its normalized form.
pub fn parse_uuid(value: &str) -> Option<String> {
    if value.len() != 36 {
        return None;
    }
    Uuid::try_parse(value)
        .ok()
        .map(|uuid| uuid.hyphenated().to_string())
}

fn invalid(details: impl Into<String>) -> KeyfileError {
    KeyfileError::Parse {
        location: "connection".to_string(),
        details: details.into(),
    }
}
