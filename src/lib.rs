//! Saved MongoDB connection profiles with export and import.
//!
//! Profiles live in a local SQLite store with their secrets in the system
//! keyring. `ConnectionExchange` moves them in and out of portable
//! "Compass Connections" files, optionally encrypting secrets with a
//! passphrase.

pub mod config;
pub mod services;
