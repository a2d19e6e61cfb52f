use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in the pixelbot pipeline
#[derive(Error, Debug)]
pub enum PixelbotError {
    /// Error reading or interpreting configuration
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Error loading the canvas snapshot
    #[error("Failed to load canvas from {path}: {message}")]
    CanvasLoadError { path: PathBuf, message: String },

    /// Error saving the canvas snapshot
    #[error("Failed to save canvas to {path}: {message}")]
    CanvasSaveError { path: PathBuf, message: String },

    /// Error reading or writing the usage ledger
    #[error("Usage ledger error: {0}")]
    LedgerError(String),

    /// Network error for HTTP requests
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Error returned by the generative model API
    #[error("Model API error: {0}")]
    ModelApiError(String),

    /// No candidate model produced any answer text
    #[error("All candidate models exhausted: {0}")]
    ModelsExhausted(String),

    /// The model's final answer did not yield any applicable edits
    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    /// Serialization / deserialization failure
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Type alias for Result with `PixelbotError`
pub type Result<T> = std::result::Result<T, PixelbotError>;
