//! Error types for GitHub API calls

use crate::rate_limit::RateLimit;

/// Errors from a single API call.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("GitHub returned {status}: {body}")]
    Status {
        status: u16,
        body: String,
        /// Quota headers are present on most error responses too
        /// (notably 403 "API rate limit exceeded").
        rate_limit: Option<RateLimit>,
    },

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("invalid URL: {0}")]
    Url(String),

    #[error("invalid Link header: {0}")]
    Link(String),
}

impl Error {
    /// Quota state carried by the failed response, if any.
    pub fn rate_limit(&self) -> Option<RateLimit> {
        match self {
            Error::Status { rate_limit, .. } => *rate_limit,
            _ => None,
        }
    }

    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Http(_) => "http",
            Error::Timeout(_) => "timeout",
            Error::Status { .. } => "status",
            Error::Decode(_) => "decode",
            Error::Url(_) => "url",
            Error::Link(_) => "link",
        }
    }
}

/// Result alias for API calls.
pub type Result<T> = std::result::Result<T, Error>;
