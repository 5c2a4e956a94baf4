use std::error::Error;
use std::fmt;

use crate::core::storage::StorageError;

/// Failures raised by the store's request/response operations.
///
/// Catalog fetches never return these to the caller; they are rendered
/// into the store's observable error state instead.
#[derive(Debug)]
pub enum StoreError {
    /// No API key is set. Raised before any network activity.
    AuthenticationMissing,
    /// The API answered with a non-success status.
    Http { status: u16, body: String },
    /// The request could not be sent or the response body could not be read.
    Transport(reqwest::Error),
    /// The response did not have the expected JSON shape.
    InvalidResponse(String),
    /// Persisting the store state failed.
    Storage(StorageError),
}

impl StoreError {
    pub fn invalid_response(detail: impl Into<String>) -> Self {
        StoreError::InvalidResponse(detail.into())
    }

    pub fn is_authentication_missing(&self) -> bool {
        matches!(self, StoreError::AuthenticationMissing)
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::AuthenticationMissing => {
                write!(f, "OpenRouter API key not set. Run 'opencreator auth <KEY>' first.")
            }
            StoreError::Http { status, body } => {
                let body = body.trim();
                if body.is_empty() {
                    write!(f, "HTTP error! status: {status}")
                } else {
                    write!(f, "HTTP error! status: {status}: {body}")
                }
            }
            StoreError::Transport(err) => write!(f, "Request to OpenRouter failed: {err}"),
            StoreError::InvalidResponse(detail) => {
                write!(f, "Invalid response format from OpenRouter: {detail}")
            }
            StoreError::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StoreError::Transport(err) => Some(err),
            StoreError::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Transport(err)
    }
}

impl From<StorageError> for StoreError {
    fn from(err: StorageError) -> Self {
        StoreError::Storage(err)
    }
}
