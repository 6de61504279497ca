//! Failure taxonomy for gateway calls and local session storage.

use thiserror::Error;

/// Errors surfaced by the remote data gateway and the ledger store.
///
/// Fetch operations absorb these into the store's `error` read model;
/// mutations record them AND return them so forms can show inline messages.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport failure, timeout, or an unclassifiable server response.
    #[error("network error: {0}")]
    Network(String),

    /// Rejected payload, either client-side fast-fail or a server 400/422.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The target id (or the active group scope) no longer exists or is not
    /// accessible. Covers 404 and 403; a forbidden group is handled the same
    /// way as a vanished one.
    #[error("not found: {0}")]
    NotFound(String),

    /// Referential constraint rejected the mutation, e.g. deleting a category
    /// that transactions still reference (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Bearer token rejected (401). Session teardown is the host app's
    /// interceptor's job; the store only aborts without touching caches.
    #[error("session expired")]
    AuthExpired,
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::Network(e.to_string())
    }
}

/// Errors from the local key/value session store.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session storage: {0}")]
    Backend(String),
}

impl From<rusqlite::Error> for SessionError {
    fn from(e: rusqlite::Error) -> Self {
        SessionError::Backend(e.to_string())
    }
}

/// Map an HTTP status + response body onto the taxonomy.
///
/// The body text is kept in the message so the UI can show what the server
/// actually said.
pub(crate) fn classify_status(status: u16, body: &str) -> ApiError {
    match status {
        400 | 422 => ApiError::Validation(body.to_string()),
        401 => ApiError::AuthExpired,
        403 | 404 => ApiError::NotFound(body.to_string()),
        409 => ApiError::Conflict(body.to_string()),
        _ => ApiError::Network(format!("{} {}", status, body)),
    }
}
