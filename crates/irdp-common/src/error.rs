//! Error types for IRDP

use thiserror::Error;

/// Result type alias for IRDP operations
pub type Result<T> = std::result::Result<T, IrdpError>;

/// Main error type for IRDP
#[derive(Error, Debug)]
pub enum IrdpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Fingerprint mismatch: expected {expected}, got {actual}")]
    FingerprintMismatch { expected: String, actual: String },

    #[error("Invalid doc_id: {0}")]
    InvalidDocId(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
