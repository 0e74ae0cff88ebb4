//! Error types for the hemo_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for hemo_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A key string outside the canonical vocabulary
    #[error("Unknown canonical key: {0}")]
    UnknownKey(String),

    /// A calculation entry that cannot be built or parsed
    #[error("Invalid entry: {0}")]
    InvalidEntry(String),

    /// Durable study storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Autosave pipeline error (worker gone, save task aborted)
    #[error("Autosave error: {0}")]
    Autosave(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
