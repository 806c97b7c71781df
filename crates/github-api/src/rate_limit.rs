//! Quota metadata from GitHub response headers

use reqwest::header::HeaderMap;

use crate::constants::{HEADER_RATELIMIT_REMAINING, HEADER_RATELIMIT_RESET};

/// Quota state of one credential as reported by GitHub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    /// Calls left in the current window
    pub remaining: u32,
    /// Window reset, unix seconds
    pub reset: u64,
}

impl RateLimit {
    /// Parse both quota headers. Returns `None` unless both are present and
    /// numeric; a half-reported quota is never recorded.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let remaining = header_number(headers, HEADER_RATELIMIT_REMAINING)?;
        let reset = header_number(headers, HEADER_RATELIMIT_RESET)?;
        Some(Self {
            remaining: u32::try_from(remaining).ok()?,
            reset,
        })
    }

    /// True when no calls are left in the current window.
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

fn header_number(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}
