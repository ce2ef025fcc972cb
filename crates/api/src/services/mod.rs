//! Business logic services.
//!
//! # Services
//!
//! - `identity` - User record lifecycle (create, read, update, delete)
//! - `authn` - Password login, logout
//! - `health` - Backend liveness/readiness
//! - `hasher` - Argon2 password hashing
//!
//! Routes never talk to the services directly. They go through
//! [`Handlers`], which owns one of each and exposes them as the
//! [`IdentityOperations`], [`AuthnOperations`] and [`HealthOperations`]
//! capabilities.

pub mod authn;
pub mod hasher;
pub mod health;
pub mod identity;

use std::sync::Arc;

use async_trait::async_trait;
use orion_core::{Email, UserProfile};
use secrecy::SecretString;
use url::Url;

use crate::context::RequestContext;
use crate::db::RecordStore;
use crate::models::{Credentials, NewUser, UserUpdate};

use self::authn::{AuthnError, AuthnService, LoginOutcome};
use self::hasher::PasswordHasher;
use self::health::{HealthError, HealthService};
use self::identity::{IdentityError, IdentityService};

/// User lifecycle capability.
#[async_trait]
pub trait IdentityOperations: Send + Sync {
    /// See [`IdentityService::create_user`].
    async fn create_user(
        &self,
        ctx: &RequestContext,
        new_user: NewUser,
    ) -> Result<UserProfile, IdentityError>;

    /// See [`IdentityService::get_user`].
    async fn get_user(
        &self,
        ctx: &RequestContext,
        email: &Email,
    ) -> Result<UserProfile, IdentityError>;

    /// See [`IdentityService::update_user`].
    async fn update_user(
        &self,
        ctx: &RequestContext,
        email: &Email,
        update: UserUpdate,
    ) -> Result<UserProfile, IdentityError>;

    /// See [`IdentityService::update_user_password`].
    async fn update_user_password(
        &self,
        ctx: &RequestContext,
        email: &Email,
        password: &SecretString,
    ) -> Result<(), IdentityError>;

    /// See [`IdentityService::delete_user`].
    async fn delete_user(&self, ctx: &RequestContext, email: &Email) -> Result<(), IdentityError>;
}

/// Login capability.
#[async_trait]
pub trait AuthnOperations: Send + Sync {
    /// See [`AuthnService::login`].
    async fn login(
        &self,
        ctx: &RequestContext,
        credentials: Credentials,
    ) -> Result<LoginOutcome, AuthnError>;

    /// See [`AuthnService::logout`].
    fn logout(&self, ctx: &RequestContext);
}

/// Health check capability.
#[async_trait]
pub trait HealthOperations: Send + Sync {
    /// See [`HealthService::alive`].
    async fn alive(&self, ctx: &RequestContext) -> Result<(), HealthError>;

    /// See [`HealthService::ready`].
    async fn ready(&self, ctx: &RequestContext) -> Result<(), HealthError>;
}

/// Facade owning every service, delegating each capability explicitly.
#[derive(Clone)]
pub struct Handlers {
    identity: IdentityService,
    authn: AuthnService,
    health: HealthService,
}

impl Handlers {
    /// Build all services over one record store and hasher.
    #[must_use]
    pub fn new(
        records: RecordStore,
        hasher: Arc<dyn PasswordHasher>,
        sso_confirm_url: Url,
    ) -> Self {
        Self {
            identity: IdentityService::new(records.clone(), Arc::clone(&hasher)),
            authn: AuthnService::new(records.clone(), hasher, sso_confirm_url),
            health: HealthService::new(records),
        }
    }

    /// The health service.
    #[must_use]
    pub const fn health(&self) -> &HealthService {
        &self.health
    }
}

#[async_trait]
impl IdentityOperations for Handlers {
    async fn create_user(
        &self,
        ctx: &RequestContext,
        new_user: NewUser,
    ) -> Result<UserProfile, IdentityError> {
        self.identity.create_user(ctx, new_user).await
    }

    async fn get_user(
        &self,
        ctx: &RequestContext,
        email: &Email,
    ) -> Result<UserProfile, IdentityError> {
        self.identity.get_user(ctx, email).await
    }

    async fn update_user(
        &self,
        ctx: &RequestContext,
        email: &Email,
        update: UserUpdate,
    ) -> Result<UserProfile, IdentityError> {
        self.identity.update_user(ctx, email, update).await
    }

    async fn update_user_password(
        &self,
        ctx: &RequestContext,
        email: &Email,
        password: &SecretString,
    ) -> Result<(), IdentityError> {
        self.identity.update_user_password(ctx, email, password).await
    }

    async fn delete_user(&self, ctx: &RequestContext, email: &Email) -> Result<(), IdentityError> {
        self.identity.delete_user(ctx, email).await
    }
}

#[async_trait]
impl AuthnOperations for Handlers {
    async fn login(
        &self,
        ctx: &RequestContext,
        credentials: Credentials,
    ) -> Result<LoginOutcome, AuthnError> {
        self.authn.login(ctx, credentials).await
    }

    fn logout(&self, ctx: &RequestContext) {
        self.authn.logout(ctx);
    }
}

#[async_trait]
impl HealthOperations for Handlers {
    async fn alive(&self, ctx: &RequestContext) -> Result<(), HealthError> {
        self.health.alive(ctx).await
    }

    async fn ready(&self, ctx: &RequestContext) -> Result<(), HealthError> {
        self.health.ready(ctx).await
    }
}
