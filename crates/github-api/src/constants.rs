//! GitHub API constants

/// Public GitHub REST endpoint
pub const API_URL: &str = "https://api.github.com";

/// Default User-Agent; GitHub rejects requests without one.
pub const DEFAULT_USER_AGENT: &str = "github-pool";

/// Page size requested for every collection endpoint (GitHub's maximum).
pub const PER_PAGE: u32 = 100;

/// Default JSON media type
pub const MEDIA_TYPE_JSON: &str = "application/vnd.github.v3+json";

/// Stargazer listing with `starred_at` timestamps
pub const MEDIA_TYPE_STAR: &str = "application/vnd.github.v3.star+json";

/// Label payloads including `description`
pub const MEDIA_TYPE_LABELS: &str = "application/vnd.github.symmetra-preview+json";

/// Response header carrying the calls left in the current window
pub const HEADER_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// Response header carrying the window reset as unix seconds
pub const HEADER_RATELIMIT_RESET: &str = "x-ratelimit-reset";
