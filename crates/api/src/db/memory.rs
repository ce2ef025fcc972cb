//! In-process key-value backend.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use super::{BackendError, KvBackend};
use crate::shutdown::{CloseError, Closeable};

/// Key-value backend backed by a `HashMap`.
///
/// Used by tests and by `IAM_STORE=memory` local runs. Behaves like Redis for
/// the operations the service uses, including failing with
/// [`BackendError::Closed`] after shutdown.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    closed: AtomicBool,
}

impl MemoryBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map_or(0, |entries| entries.len())
    }

    /// Whether no keys are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_entries<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, Vec<u8>>) -> T,
    ) -> Result<T, BackendError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BackendError::Closed);
        }
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| BackendError::Unavailable("memory store lock poisoned".to_owned()))?;
        Ok(f(&mut entries))
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        self.with_entries(|entries| entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), BackendError> {
        self.with_entries(|entries| {
            entries.insert(key.to_owned(), value);
        })
    }

    async fn set_if_absent(&self, key: &str, value: Vec<u8>) -> Result<bool, BackendError> {
        self.with_entries(|entries| {
            if entries.contains_key(key) {
                false
            } else {
                entries.insert(key.to_owned(), value);
                true
            }
        })
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        self.with_entries(|entries| {
            entries.remove(key);
        })
    }

    async fn exists(&self, key: &str) -> Result<bool, BackendError> {
        self.with_entries(|entries| entries.contains_key(key))
    }

    async fn ping(&self) -> Result<(), BackendError> {
        self.with_entries(|_| ())
    }
}

#[async_trait]
impl Closeable for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn close(&self) -> Result<(), CloseError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_if_absent_does_not_overwrite() {
        let backend = MemoryBackend::new();

        assert!(backend.set_if_absent("k", b"one".to_vec()).await.unwrap());
        assert!(!backend.set_if_absent("k", b"two".to_vec()).await.unwrap());
        assert_eq!(backend.get("k").await.unwrap(), Some(b"one".to_vec()));
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_ok() {
        let backend = MemoryBackend::new();
        backend.delete("missing").await.unwrap();
        assert!(!backend.exists("missing").await.unwrap());
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_closed_backend_rejects_calls() {
        let backend = MemoryBackend::new();
        backend.set("k", b"v".to_vec()).await.unwrap();
        backend.close().await.unwrap();

        assert!(matches!(backend.get("k").await, Err(BackendError::Closed)));
        assert!(matches!(backend.ping().await, Err(BackendError::Closed)));
    }
}
