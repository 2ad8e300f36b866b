//! Drive client error types.

use thiserror::Error;

/// Errors from the remote file store.
#[derive(Debug, Error)]
pub enum DriveError {
    /// Transport-level failure (connect, timeout, TLS).
    #[error("drive request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote store rejected the request (bad token, folder not found,
    /// channel quota exceeded).
    #[error("drive rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The remote store answered with a body we could not understand.
    #[error("unexpected drive response: {0}")]
    UnexpectedResponse(String),
}
