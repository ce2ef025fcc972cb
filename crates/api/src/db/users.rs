//! Typed user-record storage over a [`KvBackend`].

use std::sync::Arc;

use orion_core::Email;

use super::{KvBackend, StoreError};
use crate::context::RequestContext;
use crate::models::UserRecord;

/// Store of [`UserRecord`]s keyed by email.
///
/// Cheap to clone; clones share the backend connection. Every call runs under
/// the caller's [`RequestContext`], so it is abandoned when the request is
/// cancelled or its deadline passes.
#[derive(Clone)]
pub struct RecordStore {
    backend: Arc<dyn KvBackend>,
}

impl RecordStore {
    /// Create a record store over `backend`.
    #[must_use]
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self { backend }
    }

    /// Whether a record exists for `email`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` on backend failure, or
    /// `Cancelled`/`DeadlineExceeded` if the context fires first.
    pub async fn exists(&self, ctx: &RequestContext, email: &Email) -> Result<bool, StoreError> {
        Ok(ctx.run(self.backend.exists(email.as_str())).await??)
    }

    /// Get the record for `email`, `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Corrupt` if the stored value does not decode,
    /// plus the errors of [`RecordStore::exists`].
    pub async fn get(
        &self,
        ctx: &RequestContext,
        email: &Email,
    ) -> Result<Option<UserRecord>, StoreError> {
        let Some(bytes) = ctx.run(self.backend.get(email.as_str())).await?? else {
            return Ok(None);
        };

        let record = serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
            key: email.to_string(),
            source,
        })?;

        Ok(Some(record))
    }

    /// Write `record` under `email`, overwriting whatever is there.
    ///
    /// # Errors
    ///
    /// See [`RecordStore::exists`].
    pub async fn set(
        &self,
        ctx: &RequestContext,
        email: &Email,
        record: &UserRecord,
    ) -> Result<(), StoreError> {
        let bytes = encode(record)?;
        ctx.run(self.backend.set(email.as_str(), bytes)).await??;
        Ok(())
    }

    /// Write `record` under `email` only if no record exists there.
    ///
    /// Returns `false` (and writes nothing) when the key is taken.
    ///
    /// # Errors
    ///
    /// See [`RecordStore::exists`].
    pub async fn insert(
        &self,
        ctx: &RequestContext,
        email: &Email,
        record: &UserRecord,
    ) -> Result<bool, StoreError> {
        let bytes = encode(record)?;
        Ok(ctx
            .run(self.backend.set_if_absent(email.as_str(), bytes))
            .await??)
    }

    /// Remove the record for `email`. Removing a missing record succeeds.
    ///
    /// # Errors
    ///
    /// See [`RecordStore::exists`].
    pub async fn delete(&self, ctx: &RequestContext, email: &Email) -> Result<(), StoreError> {
        ctx.run(self.backend.delete(email.as_str())).await??;
        Ok(())
    }

    /// Check the backend is reachable.
    ///
    /// # Errors
    ///
    /// See [`RecordStore::exists`].
    pub async fn ping(&self, ctx: &RequestContext) -> Result<(), StoreError> {
        ctx.run(self.backend.ping()).await??;
        Ok(())
    }
}

fn encode(record: &UserRecord) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(record).map_err(StoreError::Encode)
}
