//! Error types for the Matchday engine
//!
//! One unified `Error` enum covers every failure the core surfaces, so the
//! dispatch layer can map an error to a response without inspecting message
//! strings. We use `thiserror` for the `Display`/`Error` implementations.
//!
//! ## Error Categories
//!
//! - **Validation**: bad input, unsafe name content, malformed scores (400)
//! - **Not Found**: unknown league, date, or player (404)
//! - **Conflict**: duplicate player, invariant violation, invalid state
//!   transition (409)
//! - **Auth**: missing api key (401) or bad access/admin code (403)
//! - **Rate Limited**: sliding-window overflow (429)
//! - **Body Too Large**: request body over the configured cap (413)
//! - **Parse / Io**: file corruption or disk failure (500). A `Parse` error
//!   must never cause the corrupt file to be overwritten.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Matchday operations
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for all Matchday operations
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid input: bad names, malformed dates, out-of-range scores.
    ///
    /// Not retryable; the input must be corrected.
    #[error("validation error: {message}")]
    Validation {
        /// What is wrong with the input
        message: String,
    },

    /// The referenced entity does not exist.
    ///
    /// Could be a league, a session date, a player, or a ranking year.
    #[error("not found: {what}")]
    NotFound {
        /// Description of the missing entity
        what: String,
    },

    /// The operation would violate a session invariant or an invalid state
    /// transition was attempted (e.g. assigning a non-available player).
    #[error("conflict: {message}")]
    Conflict {
        /// Why the operation conflicts with current state
        message: String,
    },

    /// Credentials are missing entirely (maps to 401).
    #[error("unauthenticated: {message}")]
    Unauthenticated {
        /// What credential is missing
        message: String,
    },

    /// Credentials are present but wrong, or the caller is not allowed to
    /// touch the entity (maps to 403).
    #[error("forbidden: {message}")]
    Forbidden {
        /// Why access is denied
        message: String,
    },

    /// A rate-limit rule rejected the request before any side effect.
    #[error("rate limit exceeded, retry in {retry_after_ms}ms")]
    RateLimited {
        /// Suggested wait before retrying, in milliseconds
        retry_after_ms: u64,
    },

    /// Request body exceeds the configured size cap.
    #[error("body too large: {actual} bytes (limit {limit})")]
    BodyTooLarge {
        /// Configured limit in bytes
        limit: usize,
        /// Observed body size in bytes
        actual: usize,
    },

    /// A stored JSON document failed to parse.
    ///
    /// The file on disk is corrupt. Callers must leave it in place; the
    /// store never writes over a document it could not read.
    #[error("parse error in {path}: {message}")]
    Parse {
        /// Path of the corrupt document
        path: PathBuf,
        /// Parser diagnostic
        message: String,
    },

    /// I/O failure (disk, rename, directory creation).
    #[error("I/O error: {message}")]
    Io {
        /// Error message
        message: String,
        /// Underlying error, when available
        #[source]
        source: Option<io::Error>,
    },
}

impl Error {
    /// Create a Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }

    /// Create a NotFound error
    pub fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound { what: what.into() }
    }

    /// Create a Conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Error::Conflict {
            message: message.into(),
        }
    }

    /// Create an Unauthenticated error (missing credentials)
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Error::Unauthenticated {
            message: message.into(),
        }
    }

    /// Create a Forbidden error (bad credentials or no ownership)
    pub fn forbidden(message: impl Into<String>) -> Self {
        Error::Forbidden {
            message: message.into(),
        }
    }

    /// Create a RateLimited error
    pub fn rate_limited(retry_after_ms: u64) -> Self {
        Error::RateLimited { retry_after_ms }
    }

    /// Create a Parse error for a corrupt document
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an Io error without a source
    pub fn io(message: impl Into<String>) -> Self {
        Error::Io {
            message: message.into(),
            source: None,
        }
    }

    // =========================================================================
    // Classification
    // =========================================================================

    /// True for input errors the caller must fix before retrying
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }

    /// True when the referenced entity does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// True when the operation lost against current state
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }

    /// True for both credential failures (401 and 403)
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            Error::Unauthenticated { .. } | Error::Forbidden { .. }
        )
    }

    /// True for storage-level failures (parse or I/O)
    ///
    /// These are the only errors where an optimistic retry of the whole
    /// request is reasonable, and only for the `Io` variant.
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Parse { .. } | Error::Io { .. })
    }

    /// Transient storage failures may be retried once by the enclosing
    /// request; everything else is surfaced as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Io { .. })
    }

    /// HTTP status code the dispatch layer should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation { .. } => 400,
            Error::Unauthenticated { .. } => 401,
            Error::Forbidden { .. } => 403,
            Error::NotFound { .. } => 404,
            Error::Conflict { .. } => 409,
            Error::BodyTooLarge { .. } => 413,
            Error::RateLimited { .. } => 429,
            Error::Parse { .. } | Error::Io { .. } => 500,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io {
            message: e.to_string(),
            source: Some(e),
        }
    }
}
