//! Redis key-value backend.

use std::sync::RwLock;

use ::redis::AsyncCommands;
use ::redis::aio::ConnectionManager;
use async_trait::async_trait;
use secrecy::ExposeSecret;

use super::{BackendError, KvBackend};
use crate::config::RedisConfig;
use crate::shutdown::{CloseError, Closeable};

/// Redis backend over a single multiplexed, auto-reconnecting connection.
///
/// The connection is shared by all requests; each call works on a cheap
/// clone of the manager. After [`Closeable::close`] every call fails with
/// [`BackendError::Closed`].
pub struct RedisBackend {
    conn: RwLock<Option<ConnectionManager>>,
}

impl RedisBackend {
    /// Connect to Redis.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Redis` if the URL is invalid or the initial
    /// connection fails.
    pub async fn connect(config: &RedisConfig) -> Result<Self, BackendError> {
        let client = ::redis::Client::open(config.connection_url().expose_secret())?;
        let conn = ConnectionManager::new(client).await?;

        tracing::info!(
            host = %config.host,
            port = config.port,
            db = config.db,
            "Redis connection established"
        );

        Ok(Self {
            conn: RwLock::new(Some(conn)),
        })
    }

    fn connection(&self) -> Result<ConnectionManager, BackendError> {
        let guard = self.conn.read().map_err(|_| BackendError::Closed)?;
        guard.clone().ok_or(BackendError::Closed)
    }
}

#[async_trait]
impl KvBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        let mut conn = self.connection()?;
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), BackendError> {
        let mut conn = self.connection()?;
        let () = conn.set(key, value).await?;
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: Vec<u8>) -> Result<bool, BackendError> {
        let mut conn = self.connection()?;
        let written: bool = conn.set_nx(key, value).await?;
        Ok(written)
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        let mut conn = self.connection()?;
        let _removed: usize = conn.del(key).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, BackendError> {
        let mut conn = self.connection()?;
        let present: bool = conn.exists(key).await?;
        Ok(present)
    }

    async fn ping(&self) -> Result<(), BackendError> {
        let mut conn = self.connection()?;
        let _pong: String = ::redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl Closeable for RedisBackend {
    fn name(&self) -> &str {
        "redis"
    }

    async fn close(&self) -> Result<(), CloseError> {
        let mut guard = self
            .conn
            .write()
            .map_err(|_| "redis connection lock poisoned")?;
        // In-flight calls hold their own clones; the connection task stops
        // once the last one is dropped.
        guard.take();
        Ok(())
    }
}
