//! Errors from the consent and transaction backend

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// A consent call was attempted without a session token. Raised before any I/O.
    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("HTTP request error during {operation}: {source}")]
    Http {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation} failed: {status} {body}")]
    Status {
        operation: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Invalid response from {operation}: {message}")]
    InvalidResponse {
        operation: &'static str,
        message: String,
    },
}

impl ApiError {
    pub fn is_auth_required(&self) -> bool {
        matches!(self, ApiError::AuthenticationRequired)
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
