use gsync_core::GsyncError;

/// Errors the sync client can raise.
///
/// Network failures are not here: they resolve into a fallback result or a
/// stored-locally-only push.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("a sync or push for user {0} is already in flight")]
    InFlight(String),

    #[error("refusing plaintext base URL {0}: client.enforce_tls is enabled")]
    InsecureBaseUrl(String),

    #[error("http client setup failed: {0}")]
    Client(String),

    #[error(transparent)]
    Local(#[from] GsyncError),
}
