//! Error types for pool operations

/// Errors from pool operations.
///
/// Transient call failures never show up here under the default retry
/// policy; `RetriesExhausted` only exists for bounded policies.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("at least one credential is required")]
    NoCredentials,

    #[error("invalid pool configuration: {0}")]
    Config(String),

    #[error("{call} gave up after {attempts} attempts: {source}")]
    RetriesExhausted {
        call: String,
        attempts: u32,
        #[source]
        source: github_api::Error,
    },

    #[error("invalid repository name {0:?}, expected \"owner/repo\"")]
    InvalidRepoName(String),
}

/// Result alias for pool operations.
pub type Result<T> = std::result::Result<T, Error>;
