//! Authentication service.
//!
//! Password login. A successful login issues nothing itself: the caller is
//! sent on to the external SSO confirmation endpoint, which owns sessions.

mod error;

pub use error::AuthnError;

use std::sync::Arc;

use secrecy::ExposeSecret;
use url::Url;

use crate::context::RequestContext;
use crate::db::{RecordStore, StoreError};
use crate::models::Credentials;
use crate::services::hasher::PasswordHasher;

/// Result of a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Credentials verified; continue at the SSO confirmation URL.
    RedirectToSso(Url),
}

/// Plaintext behind the decoy hash. Never stored under any user.
const DECOY_PASSWORD: &str = "orion-decoy-password";

/// Login validation over a [`RecordStore`].
#[derive(Clone)]
pub struct AuthnService {
    records: RecordStore,
    hasher: Arc<dyn PasswordHasher>,
    sso_confirm_url: Url,
    /// Hash compared against when there is no real one, so a rejected login
    /// costs one compare whatever the cause.
    decoy_hash: Option<Arc<str>>,
}

impl AuthnService {
    /// Create a new authentication service.
    ///
    /// Hashes the decoy password once with `hasher`, so decoy compares use
    /// the same cost parameters as real ones.
    #[must_use]
    pub fn new(
        records: RecordStore,
        hasher: Arc<dyn PasswordHasher>,
        sso_confirm_url: Url,
    ) -> Self {
        let decoy_hash = match hasher.hash(DECOY_PASSWORD) {
            Ok(hash) => Some(Arc::from(hash)),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to hash decoy password");
                None
            }
        };

        Self {
            records,
            hasher,
            sso_confirm_url,
            decoy_hash,
        }
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthnError::Unauthorized` for every credential or store
    /// failure, so callers cannot tell a missing account from a wrong
    /// password. Returns `Cancelled`/`DeadlineExceeded` if the request is
    /// abandoned.
    pub async fn login(
        &self,
        ctx: &RequestContext,
        credentials: Credentials,
    ) -> Result<LoginOutcome, AuthnError> {
        let email = &credentials.email;

        let record = match self.records.get(ctx, email).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                self.decoy_compare(credentials.password.expose_secret());
                tracing::warn!(
                    parent: ctx.span(),
                    email = %email,
                    "Login rejected: user not found"
                );
                return Err(AuthnError::Unauthorized);
            }
            Err(StoreError::Cancelled) => return Err(AuthnError::Cancelled),
            Err(StoreError::DeadlineExceeded) => return Err(AuthnError::DeadlineExceeded),
            Err(e) => {
                self.decoy_compare(credentials.password.expose_secret());
                tracing::error!(
                    parent: ctx.span(),
                    email = %email,
                    error = %e,
                    "Login rejected: store error"
                );
                return Err(AuthnError::Unauthorized);
            }
        };

        match self
            .hasher
            .compare(credentials.password.expose_secret(), &record.password_hash)
        {
            Ok(true) => {
                tracing::info!(parent: ctx.span(), email = %email, "Login succeeded");
                Ok(LoginOutcome::RedirectToSso(self.sso_confirm_url.clone()))
            }
            Ok(false) => {
                tracing::warn!(
                    parent: ctx.span(),
                    email = %email,
                    "Login rejected: invalid password"
                );
                Err(AuthnError::Unauthorized)
            }
            Err(e) => {
                tracing::error!(
                    parent: ctx.span(),
                    email = %email,
                    error = %e,
                    "Login rejected: password compare failed"
                );
                Err(AuthnError::Unauthorized)
            }
        }
    }

    /// Spend the same hashing work as a real compare. The result is ignored.
    fn decoy_compare(&self, password: &str) {
        if let Some(decoy) = &self.decoy_hash {
            let _ = self.hasher.compare(password, decoy);
        }
    }

    /// Logout. There is no server-side session to end, so this only
    /// acknowledges the call.
    pub fn logout(&self, ctx: &RequestContext) {
        tracing::debug!(parent: ctx.span(), "Logout acknowledged");
    }
}
