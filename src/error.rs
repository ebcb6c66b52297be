//! Error types for playlist loading and batch submission.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Transport-level failure (DNS, connection reset, TLS, ...)
    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout")]
    Timeout,

    /// A GET that required JSON returned something else
    #[error("Invalid JSON from {url}")]
    InvalidJson { url: String },

    /// Non-2xx status on a GET. POSTs report status in `SubmissionResult` instead.
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("No downloadURL found in playlist {playlist_id} metadata")]
    MissingDownloadUrl { playlist_id: String },

    #[error("No songs found in playlist {playlist_id}")]
    NoSongs { playlist_id: String },

    #[error("Unrecognized playlist shape from {url}")]
    UnrecognizedShape { url: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Network(e.to_string())
        }
    }
}
