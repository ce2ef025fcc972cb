//! User domain types.
//!
//! [`UserRecord`] is the stored form and the only type that carries a
//! password hash. Everything handed back to callers is a
//! [`UserProfile`](orion_core::UserProfile).

use std::fmt;

use orion_core::{Email, UserProfile};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// A stored user record.
///
/// The JSON field for the hash is `password`, matching the documents
/// already in the key-value store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// User's first name.
    pub first_name: String,
    /// User's last name.
    pub last_name: String,
    /// User's email address.
    pub email: Email,
    /// Argon2 PHC string. Never empty once the record is created.
    #[serde(rename = "password")]
    pub password_hash: String,
}

impl UserRecord {
    /// Strip the password hash for an external-facing read.
    #[must_use]
    pub fn into_profile(self) -> UserProfile {
        UserProfile {
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
        }
    }
}

impl fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRecord")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .field("password_hash", &"[REDACTED]")
            .finish()
    }
}

/// Input for creating a user.
#[derive(Debug)]
pub struct NewUser {
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub password: SecretString,
}

/// Profile fields replaced by an update. `email` may differ from the lookup
/// key, in which case the record moves.
#[derive(Debug, Clone)]
pub struct UserUpdate {
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
}

/// Email + plaintext password pair, dropped after hashing or comparison.
#[derive(Debug)]
pub struct Credentials {
    pub email: Email,
    pub password: SecretString,
}
