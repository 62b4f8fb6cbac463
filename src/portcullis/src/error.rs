//! Error types for gate construction.
//!
//! Request handling never surfaces these: every request resolves to a
//! [`crate::Decision`]. They only arise while loading configuration and
//! seeding the root store.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building a gate.
#[derive(Debug, Error)]
pub enum GateError {
    /// A configured root is not an absolute path.
    #[error("Invalid root '{}': {reason}", path.display())]
    InvalidRoot { path: PathBuf, reason: String },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed.
    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GateError>;
