//! Common error types used throughout gradnet.
//!
//! This module provides a unified error type covering the failure cases of
//! the media layer: missing records, rejected uploads, ledger failures, and
//! errors surfaced by the external image store.

/// Common error type for gradnet.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested record was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An upload was rejected before any I/O took place.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A ledger (database) operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// The external image store returned a non-success response.
    #[error("External store error (status {status}): {body}")]
    ExternalStore { status: u16, body: String },

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new NotFound error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new Validation error.
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new Database error.
    pub fn database<S: Into<String>>(msg: S) -> Self {
        Self::Database(msg.into())
    }

    /// Create a new ExternalStore error from a response status and body.
    pub fn external_store<S: Into<String>>(status: u16, body: S) -> Self {
        Self::ExternalStore {
            status,
            body: body.into(),
        }
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error was produced by upload validation,
    /// i.e. it is guaranteed no store or ledger mutation happened.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::not_found("media asset");
        assert_eq!(err.to_string(), "Not found: media asset");

        let err = Error::validation("file too large");
        assert_eq!(err.to_string(), "Validation failed: file too large");

        let err = Error::database("locked");
        assert_eq!(err.to_string(), "Database error: locked");

        let err = Error::external_store(502, "bad gateway");
        assert_eq!(
            err.to_string(),
            "External store error (status 502): bad gateway"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_is_validation() {
        assert!(Error::validation("bad mime type").is_validation());
        assert!(!Error::external_store(500, "boom").is_validation());
    }
}
