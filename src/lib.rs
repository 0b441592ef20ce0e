//! Keyfile connection profile store.
//!
//! Loads network connection profiles from a volatile, a persistent and any
//! number of read-only directories, decides which file provides each
//! profile UUID and keeps that decision up to date as files change.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use keyfile_store::{config::KeyfileConfig, profile_store::ProfileStore};
//!
//! let mut store = ProfileStore::new(&KeyfileConfig::default());
//! for change in store.reload() {
//!     println!("{}: {:?}", change.uuid, change.connection.map(|c| c.id().map(String::from)));
//! }
//! ```

/// Configuration schema and directory resolution.
pub mod config;

/// Connection profiles and the keyfile format.
pub mod connection;

/// Core error types and result aliases.
pub mod core;

/// The profile store and its reload engine.
pub mod profile_store;

/// Logging setup.
pub mod tracing_config;

/// Re-exported core types for convenience.
pub use core::{KeyfileError, Result};
