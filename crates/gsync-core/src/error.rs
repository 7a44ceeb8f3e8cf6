use thiserror::Error;

pub type GsyncResult<T> = Result<T, GsyncError>;

/// Error taxonomy shared by the ciphers, the bridge, and the HTTP surface.
///
/// `Decryption` carries no detail: a wrong password, a wrong
/// derived key, and a tampered envelope all look the same to the caller.
#[derive(Debug, Error)]
pub enum GsyncError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("decryption failed: check your password")]
    Decryption,

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GsyncError {
    /// Whether the failure is worth retrying (only transport problems are).
    pub fn is_transient(&self) -> bool {
        matches!(self, GsyncError::Network(_))
    }
}
