//! Error types for staging store operations.
//!
//! Refusals (capacity reached, unknown token, backup already chosen) are not
//! errors; those operations return `bool` or `Option`. The variants here are
//! reserved for conditions the caller must not ignore.

/// Error type for staging store operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No live session for the token.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// The session exists but has no entry for the directory.
    #[error("Directory '{dir}' not staged in session {token}")]
    DirectoryNotFound { token: String, dir: String },

    /// Category value is not one of the recognised kinds.
    #[error("Invalid config category: {0}")]
    InvalidCategory(String),

    /// A required string argument was empty.
    #[error("Missing required argument: {0}")]
    EmptyArgument(&'static str),
}

impl Error {
    /// Whether this is one of the not-found variants.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::SessionNotFound(_) | Error::DirectoryNotFound { .. }
        )
    }
}

/// Result type for staging store operations.
pub type Result<T> = std::result::Result<T, Error>;
