use thiserror::Error;

/// Reasons a photo list fetch can fail.
///
/// The fetch state machine collapses every variant into its `Error` state;
/// the distinction only survives in logs.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error {status} fetching {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Request to photo endpoint failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed photo list: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Photo list was empty")]
    Empty,
}
