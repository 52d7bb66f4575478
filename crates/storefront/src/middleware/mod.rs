//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors, bind hub per request)
//! 2. `TraceLayer` (request tracing)
//! 3. Path normalization (trailing slashes)
//!
//! Caller identity is read per handler through the extractors in
//! [`identity`].

pub mod identity;

pub use identity::{IdentityRejection, RequireAdmin, RequireCaller, caller_from_headers};
