use std::path::{Path, PathBuf};

use super::KeyfileConfig;

/// Default read-only profile directory.
pub const PATH_NAME_LIB: &str = "/usr/lib/NetworkManager/profiles";
/// Default persistent profile directory.
pub const PATH_NAME_ETC_DEFAULT: &str = "/etc/NetworkManager/system-connections";
/// Default volatile profile directory.
pub const PATH_NAME_RUN: &str = "/run/NetworkManager/profiles";
/// Default location of the store configuration file.
pub const PATH_CONFIG_DEFAULT: &str = "/etc/NetworkManager/keyfile-store.toml";

/// The resolved set of profile directories the store works on.
///
/// Read-only directories that come first are more important; the volatile
/// directory shadows the persistent one, which shadows all read-only ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyfileDirs {
    libs: Vec<PathBuf>,
    etc: Option<PathBuf>,
    run: Option<PathBuf>,
}

impl KeyfileDirs {
    /// Builds a directory set, dropping duplicates.
    ///
    /// A read-only directory equal to the persistent or volatile one is
    /// dropped, as is a persistent directory equal to the volatile one.
    pub fn new(run: Option<PathBuf>, etc: Option<PathBuf>, libs: Vec<PathBuf>) -> Self {
        let etc = etc.filter(|etc| run.as_deref() != Some(etc.as_path()));

        let mut kept: Vec<PathBuf> = Vec::with_capacity(libs.len());
        for lib in libs {
            if run.as_deref() == Some(lib.as_path())
                || etc.as_deref() == Some(lib.as_path())
                || kept.contains(&lib)
            {
                continue;
            }
            kept.push(lib);
        }

        Self {
            libs: kept,
            etc,
            run,
        }
    }

    /// Resolves the directories from the `[keyfile]` configuration section.
    pub fn resolve(config: &KeyfileConfig) -> Self {
        let run = PathBuf::from(config.run_dir.as_deref().unwrap_or(PATH_NAME_RUN));

        let libs = match &config.lib_dirs {
            Some(dirs) => dirs.iter().map(PathBuf::from).collect(),
            None => vec![PathBuf::from(PATH_NAME_LIB)],
        };

        let etc = match config.path.as_deref().map(str::trim) {
            Some("") => None,
            Some(path) if path.starts_with('/') => Some(PathBuf::from(path)),
            _ => Some(PathBuf::from(PATH_NAME_ETC_DEFAULT)),
        };

        Self::new(Some(run), etc, libs)
    }

    /// Read-only directories, in priority order.
    pub fn libs(&self) -> &[PathBuf] {
        &self.libs
    }

    /// The persistent directory, if one is configured.
    pub fn etc(&self) -> Option<&Path> {
        self.etc.as_deref()
    }

    /// The volatile directory, if one is configured.
    pub fn run(&self) -> Option<&Path> {
        self.run.as_deref()
    }

    /// Directory passed to the profile reader as parsing context.
    pub fn plugin_dir(&self) -> &Path {
        self.etc
            .as_deref()
            .unwrap_or_else(|| Path::new(PATH_NAME_ETC_DEFAULT))
    }

    /// Directory new on-disk profiles go to: persistent, else volatile.
    pub fn writable_dir(&self) -> Option<&Path> {
        self.etc().or_else(|| self.run())
    }

    /// All configured directories, most important first.
    pub fn all(&self) -> impl Iterator<Item = &Path> {
        self.run()
            .into_iter()
            .chain(self.etc())
            .chain(self.libs.iter().map(PathBuf::as_path))
    }
}

/// Splits a device match-spec list on `,` and `;`.
///
/// A backslash escapes the following character, entries are trimmed and
/// empty entries are dropped.
pub fn split_match_specs(value: &str) -> Vec<String> {
    let mut specs = Vec::new();
    let mut current = String::new();
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            ',' | ';' => {
                push_spec(&mut specs, &mut current);
            }
            _ => current.push(c),
        }
    }
    push_spec(&mut specs, &mut current);

    specs
}

fn push_spec(specs: &mut Vec<String>, current: &mut String) {
    let spec = current.trim();
    if !spec.is_empty() {
        specs.push(spec.to_string());
    }
    current.clear();
}
