//! HTTP middleware stack.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (`http_request` span per request)
//! 3. Request ID (assign or propagate `x-request-id`)
//!
//! Handlers then pull a [`RequestContext`](crate::context::RequestContext)
//! out of the request; see [`context`].

pub mod context;
pub mod request_id;

pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_middleware};
