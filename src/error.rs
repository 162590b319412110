//! Error types for protoscribe.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtoscribeError {
    // Configuration errors
    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Segment input errors (the only caller-facing failures)
    #[error("Invalid segment {id}: {message}")]
    InvalidSegment { id: String, message: String },

    // Enhancement errors (resolved inside the pipeline, never surfaced raw)
    #[error("Enhancement request failed: {message}")]
    Enhancement { message: String },

    #[error("Enhancement service returned status {status}: {message}")]
    EnhancementStatus { status: u16, message: String },

    #[cfg(feature = "remote")]
    #[error("Enhancement transport error: {0}")]
    EnhancementTransport(#[from] reqwest::Error),

    // Queue errors
    #[error("Transcript queue is shut down")]
    QueueClosed,

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, ProtoscribeError>;
