//! Identity service.
//!
//! User record lifecycle: create, read, update profile, update password,
//! delete. Every operation re-reads the store; nothing is cached between
//! calls.

mod error;

pub use error::IdentityError;

use std::sync::Arc;
use std::time::Duration;

use orion_core::{Email, UserProfile};
use secrecy::{ExposeSecret, SecretString};

use crate::context::RequestContext;
use crate::db::{RecordStore, StoreError};
use crate::models::{NewUser, UserRecord, UserUpdate};
use crate::services::hasher::PasswordHasher;

/// Budget for settling a half-finished email change after the caller's own
/// context has been cancelled or run out.
const REKEY_CLEANUP_TIMEOUT: Duration = Duration::from_secs(2);

/// User lifecycle operations over a [`RecordStore`].
#[derive(Clone)]
pub struct IdentityService {
    records: RecordStore,
    hasher: Arc<dyn PasswordHasher>,
}

impl IdentityService {
    /// Create a new identity service.
    #[must_use]
    pub fn new(records: RecordStore, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { records, hasher }
    }

    /// Create a user.
    ///
    /// The write is set-if-absent, so two concurrent creates for the same
    /// email cannot both succeed and a conflict never overwrites.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::BadInput` if the password is empty.
    /// Returns `IdentityError::Conflict` if a user with this email exists.
    pub async fn create_user(
        &self,
        ctx: &RequestContext,
        new_user: NewUser,
    ) -> Result<UserProfile, IdentityError> {
        validate_password(&new_user.password)?;

        if self.records.exists(ctx, &new_user.email).await? {
            tracing::warn!(parent: ctx.span(), email = %new_user.email, "User already exists");
            return Err(IdentityError::Conflict);
        }

        let password_hash = self.hasher.hash(new_user.password.expose_secret())?;
        let record = UserRecord {
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            email: new_user.email,
            password_hash,
        };

        if !self.records.insert(ctx, &record.email, &record).await? {
            tracing::warn!(
                parent: ctx.span(),
                email = %record.email,
                "User created concurrently by another request"
            );
            return Err(IdentityError::Conflict);
        }

        tracing::info!(parent: ctx.span(), email = %record.email, "User created");
        Ok(record.into_profile())
    }

    /// Get a user's profile. The password hash is never returned.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::NotFound` if no user has this email.
    pub async fn get_user(
        &self,
        ctx: &RequestContext,
        email: &Email,
    ) -> Result<UserProfile, IdentityError> {
        let record = self.fetch(ctx, email).await?;
        tracing::debug!(parent: ctx.span(), email = %email, "User found");
        Ok(record.into_profile())
    }

    /// Replace a user's profile fields, keeping the password hash.
    ///
    /// If `update.email` differs from `email` the record is moved to the new
    /// key: it is written there set-if-absent and only then removed from the
    /// old key. If that removal fails the record is settled on a single key
    /// before returning, even when the caller has gone away.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::NotFound` if no user has `email`.
    /// Returns `IdentityError::Conflict` if the new email belongs to another user.
    pub async fn update_user(
        &self,
        ctx: &RequestContext,
        email: &Email,
        update: UserUpdate,
    ) -> Result<UserProfile, IdentityError> {
        let mut record = self.fetch(ctx, email).await?;
        record.first_name = update.first_name;
        record.last_name = update.last_name;
        record.email = update.email;

        if record.email == *email {
            self.records.set(ctx, email, &record).await?;
            tracing::info!(parent: ctx.span(), email = %email, "User updated");
            return Ok(record.into_profile());
        }

        if !self.records.insert(ctx, &record.email, &record).await? {
            tracing::warn!(
                parent: ctx.span(),
                from = %email,
                to = %record.email,
                "Email change rejected: target already exists"
            );
            return Err(IdentityError::Conflict);
        }

        if let Err(e) = self.records.delete(ctx, email).await {
            return self.settle_rekey(ctx, email, record, e).await;
        }

        tracing::info!(
            parent: ctx.span(),
            from = %email,
            to = %record.email,
            "User email changed"
        );
        Ok(record.into_profile())
    }

    /// The record is stored under both `old` and `record.email` because
    /// removing `old` failed with `cause`. Retry the removal, and failing
    /// that remove the copy, on a context detached from the caller's limits.
    async fn settle_rekey(
        &self,
        ctx: &RequestContext,
        old: &Email,
        record: UserRecord,
        cause: StoreError,
    ) -> Result<UserProfile, IdentityError> {
        let cleanup = ctx.detached(REKEY_CLEANUP_TIMEOUT);

        match self.records.delete(&cleanup, old).await {
            Ok(()) => {
                tracing::warn!(
                    parent: ctx.span(),
                    from = %old,
                    to = %record.email,
                    error = %cause,
                    "Old key removed on retry; email change completed"
                );
                return Ok(record.into_profile());
            }
            Err(retry) => tracing::warn!(
                parent: ctx.span(),
                from = %old,
                to = %record.email,
                error = %retry,
                "Retry of old key removal failed, rolling back email change"
            ),
        }

        if let Err(rollback) = self.records.delete(&cleanup, &record.email).await {
            tracing::error!(
                parent: ctx.span(),
                from = %old,
                to = %record.email,
                error = %rollback,
                "Failed to roll back email change; user exists under both keys"
            );
        }
        Err(cause.into())
    }

    /// Replace a user's password hash, leaving the profile untouched.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::BadInput` if the password is empty.
    /// Returns `IdentityError::NotFound` if no user has this email.
    pub async fn update_user_password(
        &self,
        ctx: &RequestContext,
        email: &Email,
        password: &SecretString,
    ) -> Result<(), IdentityError> {
        validate_password(password)?;

        let mut record = self.fetch(ctx, email).await?;
        record.password_hash = self.hasher.hash(password.expose_secret())?;
        self.records.set(ctx, email, &record).await?;

        tracing::info!(parent: ctx.span(), email = %email, "User password updated");
        Ok(())
    }

    /// Delete a user. Deleting a user that does not exist succeeds.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Store` if the backend fails.
    pub async fn delete_user(
        &self,
        ctx: &RequestContext,
        email: &Email,
    ) -> Result<(), IdentityError> {
        self.records.delete(ctx, email).await?;
        tracing::info!(parent: ctx.span(), email = %email, "User deleted");
        Ok(())
    }

    async fn fetch(
        &self,
        ctx: &RequestContext,
        email: &Email,
    ) -> Result<UserRecord, IdentityError> {
        self.records.get(ctx, email).await?.ok_or_else(|| {
            tracing::debug!(parent: ctx.span(), email = %email, "User not found");
            IdentityError::NotFound
        })
    }
}

/// Validate a new password before hashing it.
fn validate_password(password: &SecretString) -> Result<(), IdentityError> {
    if password.expose_secret().is_empty() {
        return Err(IdentityError::BadInput("password cannot be empty".to_owned()));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::context::{CancelHandle, Cancellation};
    use crate::db::{BackendError, KvBackend, MemoryBackend};
    use crate::services::hasher::Argon2Hasher;

    struct Fixture {
        backend: Arc<MemoryBackend>,
        service: IdentityService,
        hasher: Arc<Argon2Hasher>,
    }

    fn fixture() -> Fixture {
        let backend = Arc::new(MemoryBackend::new());
        let hasher = Arc::new(Argon2Hasher::with_params(8, 1, 1).unwrap());
        let service = IdentityService::new(RecordStore::new(backend.clone()), hasher.clone());
        Fixture {
            backend,
            service,
            hasher,
        }
    }

    fn ctx() -> RequestContext {
        RequestContext::background("identity-test")
    }

    fn email(s: &str) -> Email {
        Email::parse(s).unwrap()
    }

    fn new_user(addr: &str, password: &str) -> NewUser {
        NewUser {
            email: email(addr),
            first_name: "A".to_owned(),
            last_name: "X".to_owned(),
            password: SecretString::from(password.to_owned()),
        }
    }

    async fn stored(f: &Fixture, addr: &str) -> Option<UserRecord> {
        RecordStore::new(f.backend.clone())
            .get(&ctx(), &email(addr))
            .await
            .unwrap()
    }

    /// Memory backend with faults injected around an email change.
    struct Faulty {
        inner: Arc<MemoryBackend>,
        /// Fired right after a set-if-absent write lands.
        cancel_after_insert: Option<CancelHandle>,
        /// Deletes of this key always fail.
        undeletable: Option<String>,
    }

    #[async_trait]
    impl KvBackend for Faulty {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
            self.inner.get(key).await
        }
        async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), BackendError> {
            self.inner.set(key, value).await
        }
        async fn set_if_absent(&self, key: &str, value: Vec<u8>) -> Result<bool, BackendError> {
            let inserted = self.inner.set_if_absent(key, value).await;
            if let Some(handle) = &self.cancel_after_insert {
                handle.cancel();
            }
            inserted
        }
        async fn delete(&self, key: &str) -> Result<(), BackendError> {
            if self.undeletable.as_deref() == Some(key) {
                return Err(BackendError::Unavailable("delete refused".to_owned()));
            }
            self.inner.delete(key).await
        }
        async fn exists(&self, key: &str) -> Result<bool, BackendError> {
            self.inner.exists(key).await
        }
        async fn ping(&self) -> Result<(), BackendError> {
            self.inner.ping().await
        }
    }

    /// Fixture seeded with a@x.com, plus a service over the same data that
    /// goes through `faulty`.
    async fn faulty_fixture(
        cancel_after_insert: Option<CancelHandle>,
        undeletable: Option<&str>,
    ) -> (Fixture, IdentityService) {
        let f = fixture();
        f.service
            .create_user(&ctx(), new_user("a@x.com", "secret"))
            .await
            .unwrap();

        let faulty = Faulty {
            inner: f.backend.clone(),
            cancel_after_insert,
            undeletable: undeletable.map(str::to_owned),
        };
        let service = IdentityService::new(RecordStore::new(Arc::new(faulty)), f.hasher.clone());
        (f, service)
    }

    fn move_to(addr: &str) -> UserUpdate {
        UserUpdate {
            email: email(addr),
            first_name: "A".to_owned(),
            last_name: "X".to_owned(),
        }
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let f = fixture();
        f.service
            .create_user(&ctx(), new_user("a@x.com", "secret"))
            .await
            .unwrap();

        let profile = f.service.get_user(&ctx(), &email("a@x.com")).await.unwrap();
        assert_eq!(profile.first_name, "A");
        assert_eq!(profile.last_name, "X");
        assert_eq!(profile.email.as_str(), "a@x.com");

        let record = stored(&f, "a@x.com").await.unwrap();
        assert!(f.hasher.compare("secret", &record.password_hash).unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_create_conflicts_without_overwriting() {
        let f = fixture();
        f.service
            .create_user(&ctx(), new_user("a@x.com", "secret"))
            .await
            .unwrap();
        let before = stored(&f, "a@x.com").await.unwrap();

        let mut again = new_user("a@x.com", "other");
        again.first_name = "Mallory".to_owned();
        let err = f.service.create_user(&ctx(), again).await.unwrap_err();

        assert!(matches!(err, IdentityError::Conflict));
        assert_eq!(stored(&f, "a@x.com").await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_empty_password_is_bad_input() {
        let f = fixture();
        let err = f
            .service
            .create_user(&ctx(), new_user("a@x.com", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::BadInput(_)));
        assert!(f.backend.is_empty());
    }

    #[tokio::test]
    async fn test_missing_user_is_not_found() {
        let f = fixture();
        let missing = email("nobody@x.com");

        assert!(matches!(
            f.service.get_user(&ctx(), &missing).await,
            Err(IdentityError::NotFound)
        ));
        let update = UserUpdate {
            email: missing.clone(),
            first_name: "N".to_owned(),
            last_name: "O".to_owned(),
        };
        assert!(matches!(
            f.service.update_user(&ctx(), &missing, update).await,
            Err(IdentityError::NotFound)
        ));
        assert!(matches!(
            f.service
                .update_user_password(&ctx(), &missing, &SecretString::from("pw".to_owned()))
                .await,
            Err(IdentityError::NotFound)
        ));
        assert!(f.backend.is_empty());
    }

    #[tokio::test]
    async fn test_update_in_place_preserves_hash() {
        let f = fixture();
        f.service
            .create_user(&ctx(), new_user("a@x.com", "secret"))
            .await
            .unwrap();
        let before = stored(&f, "a@x.com").await.unwrap();

        let update = UserUpdate {
            email: email("a@x.com"),
            first_name: "Ada".to_owned(),
            last_name: "Lovelace".to_owned(),
        };
        f.service
            .update_user(&ctx(), &email("a@x.com"), update)
            .await
            .unwrap();

        let after = stored(&f, "a@x.com").await.unwrap();
        assert_eq!(after.first_name, "Ada");
        assert_eq!(after.last_name, "Lovelace");
        assert_eq!(after.password_hash, before.password_hash);
    }

    #[tokio::test]
    async fn test_update_with_new_email_moves_record() {
        let f = fixture();
        f.service
            .create_user(&ctx(), new_user("a@x.com", "secret"))
            .await
            .unwrap();
        let before = stored(&f, "a@x.com").await.unwrap();

        let update = UserUpdate {
            email: email("b@x.com"),
            first_name: "A".to_owned(),
            last_name: "X".to_owned(),
        };
        let profile = f
            .service
            .update_user(&ctx(), &email("a@x.com"), update)
            .await
            .unwrap();

        assert_eq!(profile.email.as_str(), "b@x.com");
        assert!(stored(&f, "a@x.com").await.is_none());
        let moved = stored(&f, "b@x.com").await.unwrap();
        assert_eq!(moved.email.as_str(), "b@x.com");
        assert_eq!(moved.password_hash, before.password_hash);
        assert_eq!(f.backend.len(), 1);
    }

    #[tokio::test]
    async fn test_update_onto_existing_email_conflicts() {
        let f = fixture();
        f.service
            .create_user(&ctx(), new_user("a@x.com", "secret"))
            .await
            .unwrap();
        f.service
            .create_user(&ctx(), new_user("b@x.com", "other"))
            .await
            .unwrap();
        let a_before = stored(&f, "a@x.com").await.unwrap();
        let b_before = stored(&f, "b@x.com").await.unwrap();

        let update = UserUpdate {
            email: email("b@x.com"),
            first_name: "Z".to_owned(),
            last_name: "Z".to_owned(),
        };
        let err = f
            .service
            .update_user(&ctx(), &email("a@x.com"), update)
            .await
            .unwrap_err();

        assert!(matches!(err, IdentityError::Conflict));
        assert_eq!(stored(&f, "a@x.com").await.unwrap(), a_before);
        assert_eq!(stored(&f, "b@x.com").await.unwrap(), b_before);
    }

    #[tokio::test]
    async fn test_email_change_cancelled_midway_lands_on_one_key() {
        let (handle, cancel) = Cancellation::pair();
        let (f, service) = faulty_fixture(Some(handle), None).await;
        let ctx = ctx().with_cancellation(cancel);

        let profile = service
            .update_user(&ctx, &email("a@x.com"), move_to("b@x.com"))
            .await
            .unwrap();

        assert_eq!(profile.email.as_str(), "b@x.com");
        assert_eq!(f.backend.len(), 1);
        assert!(stored(&f, "a@x.com").await.is_none());
        assert!(stored(&f, "b@x.com").await.is_some());
    }

    #[tokio::test]
    async fn test_email_change_rolls_back_when_old_key_sticks() {
        let (f, service) = faulty_fixture(None, Some("a@x.com")).await;
        let before = stored(&f, "a@x.com").await.unwrap();

        let err = service
            .update_user(&ctx(), &email("a@x.com"), move_to("b@x.com"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            IdentityError::Store(StoreError::Unavailable(BackendError::Unavailable(_)))
        ));
        assert_eq!(f.backend.len(), 1);
        assert_eq!(stored(&f, "a@x.com").await.unwrap(), before);
        assert!(stored(&f, "b@x.com").await.is_none());
    }

    #[tokio::test]
    async fn test_update_password_changes_only_hash() {
        let f = fixture();
        f.service
            .create_user(&ctx(), new_user("a@x.com", "secret"))
            .await
            .unwrap();

        let fresh = SecretString::from("fresh".to_owned());
        f.service
            .update_user_password(&ctx(), &email("a@x.com"), &fresh)
            .await
            .unwrap();

        let record = stored(&f, "a@x.com").await.unwrap();
        assert_eq!(record.first_name, "A");
        assert!(f.hasher.compare("fresh", &record.password_hash).unwrap());
        assert!(!f.hasher.compare("secret", &record.password_hash).unwrap());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let f = fixture();
        f.service
            .create_user(&ctx(), new_user("a@x.com", "secret"))
            .await
            .unwrap();

        f.service.delete_user(&ctx(), &email("a@x.com")).await.unwrap();
        assert!(matches!(
            f.service.get_user(&ctx(), &email("a@x.com")).await,
            Err(IdentityError::NotFound)
        ));
        f.service.delete_user(&ctx(), &email("a@x.com")).await.unwrap();
        assert!(!f.backend.exists("a@x.com").await.unwrap());
    }
}
