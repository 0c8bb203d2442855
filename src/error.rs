//! Error types shared across the crate.
//!
//! Every failure surfaced by the public API carries one of these variants.
//! The [`Error::kind`] tag is the machine-readable name serialized into HTTP
//! error bodies; the `Display` form is the human-readable message. The
//! HTTP status mapping lives in [`crate::server`].

use thiserror::Error;

/// Errors that can occur in corpusdb operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A library, document, or chunk does not exist.
    #[error("{0}")]
    NotFound(String),

    /// A request body or parameter failed validation.
    #[error("{0}")]
    Validation(String),

    /// Two vectors (or a query and an index) disagree on dimension.
    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimMismatch {
        /// The expected dimension.
        expected: usize,
        /// The actual dimension.
        actual: usize,
    },

    /// A vector cannot be normalized (zero norm).
    #[error("cannot normalize a vector with zero norm")]
    BadVector,

    /// Search was attempted against a library whose index is absent or stale.
    #[error("{0}")]
    NotIndexed(String),

    /// An index build was requested while one is already running.
    #[error("{0}")]
    AlreadyIndexing(String),

    /// An index build was invalidated by a concurrent mutation and discarded.
    #[error("index build superseded by a concurrent mutation")]
    Superseded,

    /// An index-state transition that the state machine does not permit.
    #[error("{0}")]
    InvalidState(String),

    /// The embedding provider failed after exhausting retries.
    #[error("embedding provider unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// The embedding provider rejected our credentials.
    #[error("embedding authentication failed: {0}")]
    EmbeddingAuth(String),

    /// The embedding provider returned a malformed or inconsistent response.
    #[error("unexpected embedding provider response: {0}")]
    EmbeddingProtocol(String),

    /// A disk read/write failed. Write failures are logged, never surfaced.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Catch-all for internal invariant violations.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// The machine-readable tag for this error, as serialized in API bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "NotFound",
            Error::Validation(_) => "Validation",
            Error::DimMismatch { .. } => "DimMismatch",
            Error::BadVector => "BadVector",
            Error::NotIndexed(_) => "NotIndexed",
            Error::AlreadyIndexing(_) => "AlreadyIndexing",
            Error::Superseded => "Superseded",
            Error::InvalidState(_) => "InvalidState",
            Error::EmbeddingUnavailable(_) => "EmbeddingUnavailable",
            Error::EmbeddingAuth(_) => "EmbeddingAuth",
            Error::EmbeddingProtocol(_) => "EmbeddingProtocol",
            Error::Persistence(_) => "Persistence",
            Error::Internal(_) => "Internal",
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags_are_stable() {
        assert_eq!(Error::NotFound("x".into()).kind(), "NotFound");
        assert_eq!(
            Error::DimMismatch {
                expected: 3,
                actual: 4
            }
            .kind(),
            "DimMismatch"
        );
        assert_eq!(Error::Superseded.kind(), "Superseded");
    }

    #[test]
    fn test_dim_mismatch_message() {
        let e = Error::DimMismatch {
            expected: 1024,
            actual: 768,
        };
        assert_eq!(
            e.to_string(),
            "vector dimension mismatch: expected 1024, got 768"
        );
    }
}
