//! Configuration schema definitions and directory resolution.
//!
//! Defines the configuration structure for the keyfile store: general
//! settings (logging) and the `[keyfile]` section that selects the profile
//! directories. All configurations are serializable to/from TOML format.

mod general;
mod keyfile;
mod loading;
mod paths;

#[cfg(test)]
mod tests;

pub use general::GeneralConfig;
pub use keyfile::KeyfileConfig;
pub use paths::{
    KeyfileDirs, PATH_CONFIG_DEFAULT, PATH_NAME_ETC_DEFAULT, PATH_NAME_LIB, PATH_NAME_RUN,
    split_match_specs,
};

use serde::{Deserialize, Serialize};

/// Main configuration structure.
///
/// Represents the complete configuration schema that can be loaded
/// from a TOML file. All fields have sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// General application settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Keyfile plugin settings.
    #[serde(default)]
    pub keyfile: KeyfileConfig,
}
