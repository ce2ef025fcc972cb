//! Public view of a user record.

use serde::{Deserialize, Serialize};

use crate::Email;

/// A user's profile as returned to callers.
///
/// This is the stored record minus its password hash. There is no way to
/// build one that carries credential material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// User's first name (free text).
    pub first_name: String,
    /// User's last name (free text).
    pub last_name: String,
    /// User's email address, also the record key.
    pub email: Email,
}
