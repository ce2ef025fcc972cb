//! Identity service error types.

use thiserror::Error;

use crate::db::StoreError;
use crate::services::hasher::HashError;

/// Errors that can occur during user lifecycle operations.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Request payload failed validation.
    #[error("invalid input: {0}")]
    BadInput(String),

    /// A user already exists for this email.
    #[error("user already exists")]
    Conflict,

    /// No user exists for this email.
    #[error("user not found")]
    NotFound,

    /// Key-value store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Password hashing failure.
    #[error("password hashing error: {0}")]
    Hashing(#[from] HashError),
}
