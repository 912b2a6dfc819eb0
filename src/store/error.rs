//! Error types for the remote datastore.

use thiserror::Error;

/// Errors raised by a [`super::Datastore`] backend.
///
/// `RemoteStore` logs these and downgrades reads to "nothing saved"; only
/// writes hand them back to the caller.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The datastore answered with a non-success status.
    #[error("Datastore returned HTTP {status} for {path}")]
    HttpStatus { status: u16, path: String },

    /// The request never produced a response.
    #[error("Datastore request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A payload could not be encoded or decoded.
    #[error("Datastore payload error: {0}")]
    Json(#[from] serde_json::Error),

    /// The response parsed but did not have the expected structure.
    #[error("Unexpected datastore response at {path}: {reason}")]
    UnexpectedShape { path: String, reason: String },
}

impl StoreError {
    pub fn unexpected(path: &str, reason: impl Into<String>) -> Self {
        Self::UnexpectedShape {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}
