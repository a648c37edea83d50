//! Error types for the HTTP adapters

use thiserror::Error;

/// Errors from the netpalm and NetBox adapters
#[derive(Debug, Error)]
pub enum Error {
    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Malformed endpoint URL
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The API answered with a non-success status
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body, as far as it could be read
        message: String,
    },

    /// A queued task finished in the failed state
    #[error("Job failed: {0}")]
    JobFailed(String),

    /// A queued task did not finish within the polling budget
    #[error("Job {task_id} did not finish within {waited_secs}s")]
    JobTimeout {
        /// Task id that was being polled
        task_id: String,
        /// Seconds spent polling
        waited_secs: u64,
    },

    /// The response parsed but the expected field was absent
    #[error("Unexpected response shape: {0}")]
    UnexpectedResponse(String),

    /// The requested object does not exist on the remote side
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
