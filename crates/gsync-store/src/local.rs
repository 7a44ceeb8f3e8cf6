//! Local persistence adapter: the device-side key-value store
//!
//! Values are opaque bytes (in practice, mobile envelopes). Keys are
//! slash-separated relative paths such as `grades/<userId>`.

use async_trait::async_trait;
use gsync_core::{GsyncError, GsyncResult};
use opendal::{ErrorKind, Operator};
use tracing::debug;

/// Async key-value persistence for the sync client.
///
/// `set` overwrites; the store is last-writer-wins.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn get(&self, key: &str) -> GsyncResult<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: Vec<u8>) -> GsyncResult<()>;
}

/// `LocalStore` backed by any OpenDAL operator (fs on device, memory in tests).
#[derive(Clone, Debug)]
pub struct OperatorStore {
    op: Operator,
}

impl OperatorStore {
    pub fn new(op: Operator) -> Self {
        Self { op }
    }

    pub fn operator(&self) -> &Operator {
        &self.op
    }
}

#[async_trait]
impl LocalStore for OperatorStore {
    async fn get(&self, key: &str) -> GsyncResult<Option<Vec<u8>>> {
        validate_key(key)?;
        match self.op.read(key).await {
            Ok(buf) => Ok(Some(buf.to_vec())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(key, "local store miss");
                Ok(None)
            }
            Err(e) => Err(GsyncError::Storage(format!("reading {key}: {e}"))),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> GsyncResult<()> {
        validate_key(key)?;
        let len = value.len();
        self.op
            .write(key, value)
            .await
            .map_err(|e| GsyncError::Storage(format!("writing {key}: {e}")))?;
        debug!(key, bytes = len, "local store write");
        Ok(())
    }
}

/// Reject keys that could escape the store root or name a directory.
pub(crate) fn validate_key(key: &str) -> GsyncResult<()> {
    if key.is_empty()
        || key.starts_with('/')
        || key.ends_with('/')
        || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..")
    {
        return Err(GsyncError::Validation(format!("invalid storage key: {key:?}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::{build_fs_operator, build_memory_operator};

    fn memory_store() -> OperatorStore {
        OperatorStore::new(build_memory_operator().unwrap())
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let store = memory_store();
        assert_eq!(store.get("grades/nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let store = memory_store();
        store.set("grades/u1", b"envelope".to_vec()).await.unwrap();
        assert_eq!(
            store.get("grades/u1").await.unwrap().as_deref(),
            Some(&b"envelope"[..])
        );
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let store = memory_store();
        store.set("grades/u1", b"first".to_vec()).await.unwrap();
        store.set("grades/u1", b"second".to_vec()).await.unwrap();
        assert_eq!(
            store.get("grades/u1").await.unwrap().as_deref(),
            Some(&b"second"[..])
        );
    }

    #[tokio::test]
    async fn test_fs_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let a = OperatorStore::new(build_fs_operator(dir.path()).unwrap());
        a.set("grades/u1", b"persisted".to_vec()).await.unwrap();

        let b = OperatorStore::new(build_fs_operator(dir.path()).unwrap());
        assert_eq!(
            b.get("grades/u1").await.unwrap().as_deref(),
            Some(&b"persisted"[..])
        );
        assert!(dir.path().join("grades").join("u1").is_file());
    }

    #[test]
    fn test_key_validation() {
        assert!(validate_key("grades/u1").is_ok());
        for bad in ["", "/abs", "grades/", "grades/../etc", "a//b", "./x"] {
            assert!(
                matches!(validate_key(bad), Err(GsyncError::Validation(_))),
                "{bad:?} should be rejected"
            );
        }
    }
}
