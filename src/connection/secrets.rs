use std::collections::BTreeMap;

use bitflags::bitflags;

bitflags! {
    /// Storage flags of a secret property (`<key>-flags`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SecretFlags: u32 {
        /// Stored by the system together with the profile.
        const NONE = 0x0;
        /// Owned by a user secret agent.
        const AGENT_OWNED = 0x1;
        /// Never stored; asked for on every activation.
        const NOT_SAVED = 0x2;
        /// Not needed for activation.
        const NOT_REQUIRED = 0x4;
    }

    /// Options for [`Connection::compare`](super::Connection::compare).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CompareFlags: u32 {
        /// Compare every property.
        const EXACT = 0x0;
        /// Skip secrets owned by a secret agent.
        const IGNORE_AGENT_OWNED_SECRETS = 0x1;
        /// Skip secrets that are never saved.
        const IGNORE_NOT_SAVED_SECRETS = 0x2;
    }
}

const SECRET_KEYS: &[&str] = &[
    "psk",
    "password",
    "wep-key0",
    "wep-key1",
    "wep-key2",
    "wep-key3",
    "leap-password",
    "pin",
    "private-key-password",
    "phase2-private-key-password",
];

/// Name of the flags property governing `key`, if `key` is a secret.
pub(crate) fn flags_key(key: &str) -> Option<String> {
    if !SECRET_KEYS.contains(&key) {
        return None;
    }
    if key.starts_with("wep-key") {
        return Some("wep-key-flags".to_string());
    }
    Some(format!("{key}-flags"))
}

/// Secret flags of `key` within one setting group.
pub(crate) fn secret_flags(settings: &BTreeMap<String, String>, key: &str) -> SecretFlags {
    flags_key(key)
        .and_then(|flags_key| settings.get(&flags_key))
        .and_then(|value| value.trim().parse::<u32>().ok())
        .map(SecretFlags::from_bits_truncate)
        .unwrap_or(SecretFlags::NONE)
}

/// Whether `key` is skipped when comparing with `flags`.
pub(crate) fn is_ignored(
    settings: &BTreeMap<String, String>,
    key: &str,
    flags: CompareFlags,
) -> bool {
    if flags_key(key).is_none() {
        return false;
    }

    let secret = secret_flags(settings, key);
    (flags.contains(CompareFlags::IGNORE_AGENT_OWNED_SECRETS)
        && secret.contains(SecretFlags::AGENT_OWNED))
        || (flags.contains(CompareFlags::IGNORE_NOT_SAVED_SECRETS)
            && secret.contains(SecretFlags::NOT_SAVED))
}
