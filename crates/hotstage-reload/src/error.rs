//! Error types for reload resolution and orchestration.

use thiserror::Error;

/// Result type for reload operations.
pub type Result<T> = std::result::Result<T, ReloadError>;

/// Reload and staging errors.
#[derive(Debug, Error)]
pub enum ReloadError {
    /// Request carried no session token.
    #[error("missing session token")]
    MissingToken,

    /// The store refused to admit a new session.
    #[error("cache uuid failed, please try again later")]
    AdmissionRefused,

    /// Another session holds the staging slot, or this one has expired.
    #[error("someone is currently hot reloading, please try again later")]
    SessionBusy,

    /// Address pattern did not have four well-formed fields.
    #[error("invalid address pattern '{0}'")]
    InvalidPattern(String),

    /// Deployment manifest could not be parsed.
    #[error("invalid deployment manifest: {0}")]
    Manifest(String),

    /// Store rejected an entry mutation.
    #[error(transparent)]
    Store(#[from] hotstage_session::Error),

    /// The reload task ended without producing an outcome.
    #[error("reload interrupted: {0}")]
    Interrupted(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReloadError {
    /// True for refusals that a client should retry later.
    pub fn is_refusal(&self) -> bool {
        matches!(
            self,
            ReloadError::MissingToken | ReloadError::AdmissionRefused | ReloadError::SessionBusy
        )
    }
}
