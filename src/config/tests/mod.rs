//! Unit tests for config module
//!
//! Tests configuration defaults, TOML parsing and directory resolution.
//! No filesystem dependencies - all in-memory.

#![allow(clippy::panic, clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use crate::config::{
    Config, KeyfileConfig, KeyfileDirs, PATH_NAME_ETC_DEFAULT, PATH_NAME_LIB, PATH_NAME_RUN,
    split_match_specs,
};

#[test]
fn config_default() {
    let config = Config::default();

    assert_eq!(config.general.log_level, "info");
    assert!(config.keyfile.check_permissions);
    assert!(config.keyfile.allow_relative_links);
    assert!(!config.keyfile.monitor_connection_files);
}

#[test]
fn config_empty_toml() {
    let config = Config::from_toml_str("", None).unwrap();

    assert_eq!(config, Config::default());
}

#[test]
fn config_deserialize_toml() {
    let toml_str = r#"
        [general]
        log_level = "debug"

        [keyfile]
        path = "/srv/profiles"
        lib_dirs = ["/usr/share/profiles", "/usr/lib/profiles"]
        unmanaged_devices = "interface-name:eth1"
        check_permissions = false
    "#;

    let config = Config::from_toml_str(toml_str, None).unwrap();

    assert_eq!(config.general.log_level, "debug");
    assert_eq!(config.keyfile.path.as_deref(), Some("/srv/profiles"));
    assert_eq!(config.keyfile.lib_dirs.as_ref().map(Vec::len), Some(2));
    assert!(!config.keyfile.check_permissions);
    assert!(config.keyfile.allow_relative_links);
}

#[test]
fn config_invalid_toml() {
    let result = Config::from_toml_str("[keyfile\npath = 1", None);

    assert!(matches!(
        result,
        Err(crate::KeyfileError::TomlParseError { .. })
    ));
}

#[test]
fn config_missing_file_yields_defaults() {
    let config = Config::load(Path::new("/nonexistent/keyfile-store/config.toml")).unwrap();

    assert_eq!(config, Config::default());
}

#[test]
fn config_rejects_relative_directories() {
    let config = Config::from_toml_str("[keyfile]\nrun_dir = \"run\"\n", None).unwrap();
    assert!(matches!(
        config.validate(),
        Err(crate::KeyfileError::ConfigValidation { .. })
    ));

    let config =
        Config::from_toml_str("[keyfile]\nlib_dirs = [\"/usr/lib/p\", \"lib\"]\n", None).unwrap();
    assert!(matches!(
        config.validate(),
        Err(crate::KeyfileError::ConfigValidation { .. })
    ));

    assert!(Config::default().validate().is_ok());
}

#[test]
fn dirs_default() {
    let dirs = KeyfileDirs::resolve(&KeyfileConfig::default());

    assert_eq!(dirs.run(), Some(Path::new(PATH_NAME_RUN)));
    assert_eq!(dirs.etc(), Some(Path::new(PATH_NAME_ETC_DEFAULT)));
    assert_eq!(dirs.libs(), &[PathBuf::from(PATH_NAME_LIB)]);
}

#[test]
fn dirs_empty_path_disables_persistent_dir() {
    let config = KeyfileConfig {
        path: Some("  ".to_string()),
        ..KeyfileConfig::default()
    };

    let dirs = KeyfileDirs::resolve(&config);

    assert_eq!(dirs.etc(), None);
    assert_eq!(dirs.plugin_dir(), Path::new(PATH_NAME_ETC_DEFAULT));
    assert_eq!(dirs.writable_dir(), Some(Path::new(PATH_NAME_RUN)));
}

#[test]
fn dirs_relative_path_falls_back_to_default() {
    let config = KeyfileConfig {
        path: Some("relative/dir".to_string()),
        ..KeyfileConfig::default()
    };

    let dirs = KeyfileDirs::resolve(&config);

    assert_eq!(dirs.etc(), Some(Path::new(PATH_NAME_ETC_DEFAULT)));
}

#[test]
fn dirs_drop_duplicates() {
    let dirs = KeyfileDirs::new(
        Some(PathBuf::from("/run/p")),
        Some(PathBuf::from("/run/p/")),
        vec![
            PathBuf::from("/lib/a"),
            PathBuf::from("/run/p"),
            PathBuf::from("/lib/a"),
            PathBuf::from("/lib/b"),
        ],
    );

    assert_eq!(dirs.etc(), None);
    assert_eq!(dirs.libs(), &[PathBuf::from("/lib/a"), PathBuf::from("/lib/b")]);
}

#[test]
fn dirs_all_in_priority_order() {
    let dirs = KeyfileDirs::new(
        Some(PathBuf::from("/run/p")),
        Some(PathBuf::from("/etc/p")),
        vec![PathBuf::from("/lib/a"), PathBuf::from("/lib/b")],
    );

    let all: Vec<&Path> = dirs.all().collect();

    assert_eq!(
        all,
        vec![
            Path::new("/run/p"),
            Path::new("/etc/p"),
            Path::new("/lib/a"),
            Path::new("/lib/b")
        ]
    );
}

#[test]
fn match_specs_split_and_trim() {
    let specs = split_match_specs(" interface-name:eth1 ,mac:00:11:22:33:44:55;; except:foo\\,bar ");

    assert_eq!(
        specs,
        vec![
            "interface-name:eth1".to_string(),
            "mac:00:11:22:33:44:55".to_string(),
            "except:foo,bar".to_string(),
        ]
    );
}

#[test]
fn match_specs_empty() {
    assert!(split_match_specs("").is_empty());
    assert!(split_match_specs(" ; , ").is_empty());
}
