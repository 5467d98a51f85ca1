//! Custom error types for the archiver.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchiverError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Raised by the preflight check before any subprocess is started.
    #[error("Not enough free space in target directory: {required} bytes required, {available} bytes available")]
    InsufficientSpace { required: u64, available: u64 },

    #[error("Version parse error: {0}")]
    VersionParse(String),

    #[error("Command failed: {0}")]
    Command(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl ArchiverError {
    /// True for the preflight failure that short-circuits the whole run.
    pub fn is_insufficient_space(&self) -> bool {
        matches!(self, ArchiverError::InsufficientSpace { .. })
    }
}

pub type Result<T> = std::result::Result<T, ArchiverError>;
