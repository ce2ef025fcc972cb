//! Key-value storage for user records.
//!
//! # Layout
//!
//! One key per user. The key is the email address, verbatim; the value is a
//! UTF-8 JSON document:
//!
//! ```json
//! {"first_name": "A", "last_name": "X", "email": "a@x.com", "password": "$argon2id$..."}
//! ```
//!
//! # Modules
//!
//! - [`KvBackend`] - the injected byte-level client (get/set/delete/exists/ping)
//! - [`redis`] - Redis implementation over a multiplexed connection
//! - [`memory`] - in-process implementation for tests and local runs
//! - [`users`] - [`RecordStore`], the typed wrapper the services use

pub mod memory;
pub mod redis;
pub mod users;

use async_trait::async_trait;
use thiserror::Error;

use crate::context::Interrupted;

pub use memory::MemoryBackend;
pub use redis::RedisBackend;
pub use users::RecordStore;

/// Errors from the raw key-value client.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Redis command or connection failure.
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    /// The backend has been closed during shutdown.
    #[error("backend is closed")]
    Closed,

    /// Any other transport failure (used by alternative backends).
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Errors from [`RecordStore`] operations.
///
/// A missing record is not an error; lookups return `Ok(None)`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached or rejected the command.
    #[error("store unavailable: {0}")]
    Unavailable(#[from] BackendError),

    /// A stored value is not a valid user record.
    #[error("corrupt record for {key}: {source}")]
    Corrupt {
        /// Key holding the bad value.
        key: String,
        /// Decode error.
        source: serde_json::Error,
    },

    /// A record could not be encoded.
    #[error("failed to encode record: {0}")]
    Encode(serde_json::Error),

    /// The caller cancelled the request.
    #[error("store call cancelled")]
    Cancelled,

    /// The request deadline passed before the backend answered.
    #[error("store call exceeded its deadline")]
    DeadlineExceeded,
}

impl From<Interrupted> for StoreError {
    fn from(interrupted: Interrupted) -> Self {
        match interrupted {
            Interrupted::Cancelled => Self::Cancelled,
            Interrupted::DeadlineExceeded => Self::DeadlineExceeded,
        }
    }
}

/// Byte-level key-value client.
///
/// Values are opaque bytes. Every single call is atomic at the key level;
/// there is no multi-key transaction.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Fetch the value at `key`, `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError>;

    /// Store `value` at `key`, overwriting any existing value.
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), BackendError>;

    /// Store `value` at `key` only if the key is absent.
    ///
    /// Returns `true` if the value was written.
    async fn set_if_absent(&self, key: &str, value: Vec<u8>) -> Result<bool, BackendError>;

    /// Remove `key`. Removing a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), BackendError>;

    /// Whether `key` is present.
    async fn exists(&self, key: &str) -> Result<bool, BackendError>;

    /// Round-trip to the backend to check it is reachable.
    async fn ping(&self) -> Result<(), BackendError>;
}
