use std::{fs, io::ErrorKind, path::Path};

use tracing::{debug, warn};

use super::Config;
use crate::{KeyfileError, Result};

impl Config {
    /// Loads the configuration from a TOML file.
    ///
    /// A missing file yields the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file exists but cannot be read
    /// - The TOML content is invalid or does not match the schema
    /// - A volatile or read-only directory is not absolute
    pub fn load(path: &Path) -> Result<Config> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("config file {} not found, using defaults", path.display());
                return Ok(Config::default());
            }
            Err(e) => {
                return Err(KeyfileError::Access {
                    path: path.to_path_buf(),
                    details: format!("Failed to read config: {e}"),
                });
            }
        };

        let config = Self::from_toml_str(&content, Some(path))?;
        config.validate()?;
        config.warn_deprecated();
        Ok(config)
    }

    /// Checks the directory settings that have no fallback.
    ///
    /// # Errors
    ///
    /// Returns `KeyfileError::ConfigValidation` if `run_dir` or any entry of
    /// `lib_dirs` is not an absolute path.
    pub fn validate(&self) -> Result<()> {
        if let Some(run_dir) = &self.keyfile.run_dir {
            if !Path::new(run_dir).is_absolute() {
                return Err(KeyfileError::ConfigValidation {
                    component: "keyfile.run_dir".to_string(),
                    details: format!("'{run_dir}' is not an absolute path"),
                });
            }
        }

        for lib_dir in self.keyfile.lib_dirs.iter().flatten() {
            if !Path::new(lib_dir).is_absolute() {
                return Err(KeyfileError::ConfigValidation {
                    component: "keyfile.lib_dirs".to_string(),
                    details: format!("'{lib_dir}' is not an absolute path"),
                });
            }
        }

        Ok(())
    }

    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `KeyfileError::TomlParseError` if the content is not valid TOML
    /// or does not match the schema.
    pub fn from_toml_str(content: &str, path: Option<&Path>) -> Result<Config> {
        toml::from_str(content).map_err(|e| KeyfileError::toml_parse(e, path))
    }

    fn warn_deprecated(&self) {
        if self.keyfile.hostname.is_some() {
            warn!("keyfile: 'hostname' option is deprecated and has no effect");
        }
    }
}
