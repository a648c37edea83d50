//! Error types for the stack store

use thiserror::Error;
use uuid::Uuid;

/// Stack store error type
#[derive(Error, Debug)]
pub enum Error {
    /// Stack not found in the store
    #[error("Stack not found: {0}")]
    StackNotFound(Uuid),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
