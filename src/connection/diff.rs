use std::collections::{BTreeMap, BTreeSet};

use super::{CompareFlags, Connection, secrets::is_ignored};

impl Connection {
    /// Compares two profiles property by property.
    ///
    /// Secrets excluded by `flags` are skipped on both sides, and a missing
    /// group equals an empty one.
    pub fn compare(&self, other: &Connection, flags: CompareFlags) -> bool {
        let names: BTreeSet<&String> = self.groups.keys().chain(other.groups.keys()).collect();

        names.into_iter().all(|name| {
            let ours = filtered(self.groups.get(name), flags);
            let theirs = filtered(other.groups.get(name), flags);
            ours == theirs
        })
    }

    /// Compares ignoring agent-owned and not-saved secrets.
    ///
    /// This is the comparison the store uses to decide whether a reloaded
    /// profile differs from the exported one.
    pub fn equivalent(&self, other: &Connection) -> bool {
        self.compare(
            other,
            CompareFlags::IGNORE_AGENT_OWNED_SECRETS | CompareFlags::IGNORE_NOT_SAVED_SECRETS,
        )
    }
}

fn filtered(
    settings: Option<&BTreeMap<String, String>>,
    flags: CompareFlags,
) -> BTreeMap<&str, &str> {
    let Some(settings) = settings else {
        return BTreeMap::new();
    };

    settings
        .iter()
        .filter(|(key, _)| !is_ignored(settings, key, flags))
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect()
}
