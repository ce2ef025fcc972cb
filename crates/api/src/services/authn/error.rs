//! Authentication error types.

use thiserror::Error;

/// Errors that can occur during login.
///
/// Every credential failure collapses into `Unauthorized`; the specific cause
/// is only logged.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthnError {
    /// Invalid credentials (unknown user, wrong password, unusable record).
    #[error("unauthorized")]
    Unauthorized,

    /// The caller cancelled the request.
    #[error("login cancelled")]
    Cancelled,

    /// The request deadline passed.
    #[error("login exceeded its deadline")]
    DeadlineExceeded,
}
