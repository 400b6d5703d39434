//! Service-specific error types

use axum::http::StatusCode;
use thiserror::Error;

/// Warehouse (resource-access) failures.
///
/// Kept apart from `oauth_client::Error`: a failed statement says nothing
/// about the token, so none of these clear the token store.
#[derive(Error, Debug)]
pub enum Error {
    #[error("warehouse request failed: {0}")]
    Request(String),

    #[error("warehouse rejected statement ({status}): {message}")]
    Rejected {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("statement {statement_handle} still running")]
    Pending { statement_handle: String },

    #[error("invalid warehouse response: {0}")]
    InvalidResponse(String),
}

impl Error {
    /// Status returned to our own caller.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Pending { .. } => StatusCode::ACCEPTED,
            Error::Rejected { status, .. } if (400..500).contains(status) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            _ => StatusCode::BAD_GATEWAY,
        }
    }

    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Request(_) => "request",
            Error::Rejected { .. } => "rejected",
            Error::Pending { .. } => "pending",
            Error::InvalidResponse(_) => "invalid_response",
        }
    }
}

/// Result alias using service Error
pub type Result<T> = std::result::Result<T, Error>;
