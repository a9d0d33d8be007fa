//! Error taxonomy shared by the backend client, the session store and the
//! page-view record helpers.

use thiserror::Error;

/// Authentication failures reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("session expired")]
    SessionExpired,

    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    #[error("auth provider rejected the request: {0}")]
    Rejected(String),
}

/// Failures of a remote call against the hosted backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("no matching row in '{table}'")]
    NotFound { table: String },

    #[error("write failed: {0}")]
    WriteFailed(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected backend response: {0}")]
    Unexpected(String),
}

impl BackendError {
    /// Whether retrying the same request could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Network(_))
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Unexpected(err.to_string())
        } else {
            BackendError::Network(err.to_string())
        }
    }
}

/// Errors surfaced by [`crate::session::SessionStore`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("no active session")]
    NoSession,

    /// The session changed (sign-out, expiry, another sign-in) while the
    /// request was in flight, so its result was discarded.
    #[error("session changed while the request was in flight")]
    Superseded,
}

impl From<AuthError> for SessionError {
    fn from(err: AuthError) -> Self {
        SessionError::Backend(BackendError::Auth(err))
    }
}

/// Local key/value storage failures.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("local storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("local storage is corrupt: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from the document and grievance helpers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("{0}")]
    Validation(String),

    #[error("a signed-in profile is required")]
    NoProfile,

    #[error(transparent)]
    Backend(#[from] BackendError),
}
