//! Cloud document store: where the web client keeps its encrypted grades
//!
//! One object per user at `grades/<userId>.env`, holding the web envelope's
//! base64 transport string. The store never sees plaintext.

use gsync_core::{GsyncError, GsyncResult};
use opendal::{ErrorKind, Operator};
use tracing::{debug, info};

use crate::local::validate_key;

#[derive(Clone, Debug)]
pub struct DocumentStore {
    op: Operator,
}

impl DocumentStore {
    pub fn new(op: Operator) -> Self {
        Self { op }
    }

    pub fn operator(&self) -> &Operator {
        &self.op
    }

    /// Object key for a user's web envelope.
    pub fn key_for(user_id: &str) -> GsyncResult<String> {
        if user_id.is_empty() || user_id.contains('/') || user_id.starts_with('.') {
            return Err(GsyncError::Validation(format!(
                "invalid user id for document key: {user_id:?}"
            )));
        }
        let key = format!("grades/{user_id}.env");
        validate_key(&key)?;
        Ok(key)
    }

    /// Load the stored web envelope for `user_id`, if any.
    pub async fn get_web_envelope(&self, user_id: &str) -> GsyncResult<Option<String>> {
        let key = Self::key_for(user_id)?;
        match self.op.read(&key).await {
            Ok(buf) => {
                let text = String::from_utf8(buf.to_vec()).map_err(|_| {
                    GsyncError::Storage(format!("{key} is not valid UTF-8"))
                })?;
                Ok(Some(text.trim().to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(user_id, "no web envelope stored");
                Ok(None)
            }
            Err(e) => Err(GsyncError::Storage(format!("reading {key}: {e}"))),
        }
    }

    /// Replace the stored web envelope for `user_id`.
    pub async fn put_web_envelope(&self, user_id: &str, envelope: &str) -> GsyncResult<()> {
        let key = Self::key_for(user_id)?;
        self.op
            .write(&key, envelope.as_bytes().to_vec())
            .await
            .map_err(|e| GsyncError::Storage(format!("writing {key}: {e}")))?;
        info!(user_id, bytes = envelope.len(), "web envelope stored");
        Ok(())
    }
}
