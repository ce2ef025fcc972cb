//! Orion Core - Shared identity types.
//!
//! This crate provides the types shared between the Orion IAM service and
//! anything that talks to it (integration tests, future clients).
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no key-value access,
//! no HTTP. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Validated email addresses and the public user profile

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
