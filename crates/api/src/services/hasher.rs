//! Password hashing.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        self, PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
        rand_core::OsRng,
    },
};
use thiserror::Error;

/// Errors from hashing or comparing passwords.
#[derive(Debug, Error)]
pub enum HashError {
    /// The hash could not be computed.
    #[error("password hashing failed: {0}")]
    Hash(password_hash::Error),

    /// A stored hash could not be parsed or uses unsupported parameters.
    #[error("malformed password hash: {0}")]
    MalformedHash(password_hash::Error),

    /// Cost parameters out of range.
    #[error("invalid argon2 parameters: {0}")]
    Params(argon2::Error),
}

/// One-way password hash and verify.
pub trait PasswordHasher: Send + Sync {
    /// Hash `plaintext` with a fresh random salt.
    ///
    /// # Errors
    ///
    /// Returns `HashError::Hash` if the hasher cannot run.
    fn hash(&self, plaintext: &str) -> Result<String, HashError>;

    /// Check `plaintext` against `hash`, using the parameters embedded in
    /// `hash`.
    ///
    /// A wrong password is `Ok(false)`, not an error.
    ///
    /// # Errors
    ///
    /// Returns `HashError::MalformedHash` only when `hash` is unusable.
    fn compare(&self, plaintext: &str, hash: &str) -> Result<bool, HashError>;
}

/// Argon2id hasher producing PHC strings.
#[derive(Clone, Default)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Argon2Hasher {
    /// Hasher with the crate's recommended Argon2id parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hasher with explicit cost parameters (memory KiB, iterations, lanes).
    ///
    /// # Errors
    ///
    /// Returns `HashError::Params` if the parameters are out of range.
    pub fn with_params(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self, HashError> {
        let params = Params::new(m_cost, t_cost, p_cost, None).map_err(HashError::Params)?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, plaintext: &str) -> Result<String, HashError> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(HashError::Hash)
    }

    fn compare(&self, plaintext: &str, hash: &str) -> Result<bool, HashError> {
        let parsed = PasswordHash::new(hash).map_err(HashError::MalformedHash)?;

        match self.argon2.verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(other) => Err(HashError::MalformedHash(other)),
        }
    }
}
