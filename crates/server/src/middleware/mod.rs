//! HTTP middleware stack.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request span with method, uri, status, latency)
//! 3. Request ID
//! 4. CORS
//! 5. Security headers
//!
//! Authentication is not a layer: handlers declare it through the
//! extractors in [`auth`].

pub mod auth;
pub mod request_id;
pub mod security_headers;

pub use auth::{
    CurrentCustomer, CurrentUser, RequireAdmin, RequireCustomer, RequireManager, RequireStaff,
};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
