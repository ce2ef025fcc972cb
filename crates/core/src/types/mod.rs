//! Core types for Orion.
//!
//! This module provides type-safe wrappers for identity concepts.

pub mod email;
pub mod profile;

pub use email::{Email, EmailError};
pub use profile::UserProfile;
