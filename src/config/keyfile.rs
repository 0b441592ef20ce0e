use serde::{Deserialize, Serialize};

/// Settings of the `[keyfile]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyfileConfig {
    /// Persistent profile directory.
    ///
    /// Unset selects the default, an empty value disables the persistent tier
    /// and a relative value is replaced by the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Read-only profile directories, most important first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lib_dirs: Option<Vec<String>>,

    /// Volatile (runtime) profile directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_dir: Option<String>,

    /// Device match specs the host must leave unmanaged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unmanaged_devices: Option<String>,

    /// Deprecated, has no effect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    /// Watch the profile directories and apply changes as they happen.
    #[serde(default)]
    pub monitor_connection_files: bool,

    /// Store pointer-file targets relative to their directory when possible.
    #[serde(default = "default_true")]
    pub allow_relative_links: bool,

    /// Enforce root ownership and private modes on profile and pointer files.
    #[serde(default = "default_true")]
    pub check_permissions: bool,
}

fn default_true() -> bool {
    true
}

impl Default for KeyfileConfig {
    fn default() -> Self {
        Self {
            path: None,
            lib_dirs: None,
            run_dir: None,
            unmanaged_devices: None,
            hostname: None,
            monitor_connection_files: false,
            allow_relative_links: true,
            check_permissions: true,
        }
    }
}
