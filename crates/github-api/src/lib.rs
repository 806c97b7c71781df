//! GitHub REST v3 protocol layer
//!
//! Describes single remote calls as values that can be executed against any
//! credential. The pool crate decides which credential a call runs under;
//! this crate only knows how to send it and how to read the quota and
//! pagination metadata GitHub attaches to every response.
//!
//! - [`Call`] is the request-descriptor capability: "run me with this token"
//! - [`ApiRequest`] is the reqwest-backed implementation built by [`GitHubClient`]
//! - [`RateLimit`] is parsed from `x-ratelimit-remaining` / `x-ratelimit-reset`
//! - [`link::last_page`] reads the `rel="last"` entry of the `Link` header

pub mod client;
pub mod constants;
pub mod error;
pub mod link;
pub mod rate_limit;

pub use client::{ApiRequest, GitHubClient};
pub use error::{Error, Result};
pub use rate_limit::RateLimit;

use std::future::Future;
use std::pin::Pin;

/// One successful response from the API.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    /// Decoded JSON body, `Null` for empty bodies.
    pub body: serde_json::Value,
    /// Quota state reported alongside this response, if GitHub sent it.
    pub rate_limit: Option<RateLimit>,
    /// Raw `Link` header for paginated endpoints.
    pub link: Option<String>,
}

/// A single remote call that can be executed under any credential.
///
/// Implementations must be cheap to run more than once: the executor
/// re-invokes the same call after every transient failure.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn Call>`).
pub trait Call: Send + Sync {
    /// Short description for logs (method and path, never the token).
    fn describe(&self) -> String;

    /// Execute the call authenticated with `token`.
    fn call<'a>(
        &'a self,
        token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Response>> + Send + 'a>>;
}
