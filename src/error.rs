//! Error types for pgwire-query.
//!
//! All errors in this crate are represented by [`PgWireError`], which covers:
//! - I/O errors (dial failure, socket reset)
//! - Protocol errors (malformed messages, unexpected message order)
//! - Server errors (PostgreSQL ErrorResponse with severity ERROR/FATAL/PANIC)
//! - Authentication errors (rejected password, unsupported method)
//! - Connection closed (query still pending when the session ended)
//! - Task errors (worker terminated unexpectedly)

use thiserror::Error;

use crate::protocol::messages::ErrorFields;

/// Error type for all pgwire-query operations.
///
/// The type is `Clone` so that a single fatal error can be delivered to the
/// active query and to every query still waiting in the pipeline.
#[derive(Debug, Error, Clone)]
pub enum PgWireError {
    /// I/O error (dial failure, read/write on the socket).
    ///
    /// Note: `std::io::Error` is not `Clone`, so we store the message.
    #[error("io error: {0}")]
    Io(String),

    /// Protocol error - malformed message or unexpected message sequence.
    ///
    /// Always fatal to the connection.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Server error - PostgreSQL returned an ErrorResponse for the active query.
    #[error("server error: {0}")]
    Server(ErrorFields),

    /// Authentication error - rejected credentials or unsupported method.
    #[error("authentication error: {0}")]
    Auth(String),

    /// The connection was closed before the request completed.
    #[error("connection closed")]
    Closed,

    /// Task error - worker panicked or terminated unexpectedly.
    #[error("task error: {0}")]
    Task(String),
}

impl PgWireError {
    /// Returns `true` if this is an I/O error.
    #[inline]
    pub fn is_io(&self) -> bool {
        matches!(self, PgWireError::Io(_))
    }

    /// Returns `true` if this is a server error.
    #[inline]
    pub fn is_server(&self) -> bool {
        matches!(self, PgWireError::Server(_))
    }

    /// Returns `true` if this is an authentication error.
    #[inline]
    pub fn is_auth(&self) -> bool {
        matches!(self, PgWireError::Auth(_))
    }

    /// Returns `true` if the request failed because the connection closed.
    #[inline]
    pub fn is_closed(&self) -> bool {
        matches!(self, PgWireError::Closed)
    }

    /// SQLSTATE code of a server error, if any.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            PgWireError::Server(fields) => fields.code.as_deref(),
            _ => None,
        }
    }

    /// Returns `true` if this error is likely transient and retryable.
    ///
    /// Transient errors include I/O, task and closed-connection errors. Non-transient
    /// errors (auth, server, protocol) typically require a change on the caller side.
    /// Nothing in this crate retries on its own.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PgWireError::Io(_) | PgWireError::Task(_) | PgWireError::Closed
        )
    }
}

// Manual From impl since io::Error isn't Clone
impl From<std::io::Error> for PgWireError {
    fn from(err: std::io::Error) -> Self {
        PgWireError::Io(err.to_string())
    }
}

/// Result type alias for pgwire-query operations.
pub type Result<T> = std::result::Result<T, PgWireError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_exposes_sqlstate() {
        let err = PgWireError::Server(ErrorFields {
            severity: Some("ERROR".into()),
            code: Some("42P01".into()),
            message: Some("relation \"nope\" does not exist".into()),
            ..Default::default()
        });
        assert!(err.is_server());
        assert_eq!(err.sqlstate(), Some("42P01"));
        assert!(!err.is_transient());
        assert!(err.to_string().contains("42P01"));
    }

    #[test]
    fn io_error_converts_and_is_transient() {
        let err: PgWireError =
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused").into();
        assert!(err.is_io());
        assert!(err.is_transient());
        assert_eq!(err.sqlstate(), None);
    }

    #[test]
    fn closed_is_transient() {
        assert!(PgWireError::Closed.is_closed());
        assert!(PgWireError::Closed.is_transient());
    }
}
