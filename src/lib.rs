//! Bosun - bootstrap layer for a command-line API client.
//!
//! This library resolves the effective runtime configuration (file,
//! environment, flags) and gates API commands behind an automatic
//! authentication step backed by a credential cache.

pub mod auth;
pub mod cache;
pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod logging;
pub mod tree;

use std::path::PathBuf;


/// Library-level error type for Bosun operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unable to find home dir")]
    HomeDirUnavailable,

    #[error("config file does not exist: {}", .0.display())]
    ConfigFileMissing(PathBuf),

    #[error("unable to read config: no config named '{name}' found in {searched}")]
    ProfileNotFound { name: String, searched: String },

    #[error("unable to read config {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to read config {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("unable to read config {}: top level must be a mapping", .0.display())]
    ConfigNotMapping(PathBuf),

    #[error("auto auth error: {0}")]
    AutoAuth(#[source] auth::AuthError),

    #[error("{0}")]
    Auth(#[from] auth::AuthError),

    #[error("{0}")]
    Transport(#[from] client::TransportError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for Bosun operations.
pub type Result<T> = std::result::Result<T, Error>;
