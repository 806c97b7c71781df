//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! Tokens are loaded from the GITHUB_TOKENS env var or `github.tokens_file`,
//! never stored in the TOML directly.

use common::Secret;
use github_api::constants::{API_URL, DEFAULT_USER_AGENT};
use github_pool::PoolOptions;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Env var holding comma-separated tokens.
pub const TOKENS_ENV: &str = "GITHUB_TOKENS";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    pub server: ServerConfig,
    #[serde(skip)]
    pub tokens: Vec<Secret<String>>,
}

/// Remote API settings
#[derive(Debug, Deserialize)]
pub struct GitHubConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// File with one token per line (alternative to GITHUB_TOKENS)
    #[serde(default)]
    pub tokens_file: Option<PathBuf>,
}

/// Admission and cooldown tunables
#[derive(Debug, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_reset_margin")]
    pub reset_margin_secs: u64,
    #[serde(default = "default_reset_retry")]
    pub reset_retry_millis: u64,
}

/// Inbound HTTP settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_api_url() -> String {
    API_URL.to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_timeout() -> u64 {
    600
}

fn default_max_concurrency() -> usize {
    10
}

fn default_poll_interval() -> u64 {
    10
}

fn default_reset_margin() -> u64 {
    1
}

fn default_reset_retry() -> u64 {
    1000
}

fn default_max_connections() -> usize {
    1000
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout(),
            tokens_file: None,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            poll_interval_secs: default_poll_interval(),
            reset_margin_secs: default_reset_margin(),
            reset_retry_millis: default_reset_retry(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then resolve tokens.
    ///
    /// Token resolution order:
    /// 1. GITHUB_TOKENS env var
    /// 2. tokens_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.validate()?;

        let tokens = match std::env::var(TOKENS_ENV) {
            Ok(value) => parse_tokens(&value.replace(',', "\n")),
            Err(_) => match config.github.tokens_file {
                Some(ref file) => {
                    let contents = std::fs::read_to_string(file).map_err(|e| {
                        common::Error::Config(format!(
                            "failed to read tokens_file {}: {e}",
                            file.display()
                        ))
                    })?;
                    parse_tokens(&contents)
                }
                None => Vec::new(),
            },
        };
        if tokens.is_empty() {
            return Err(common::Error::NoCredentials(format!(
                "set {TOKENS_ENV} or github.tokens_file"
            )));
        }
        config.tokens = tokens.into_iter().map(Secret::new).collect();

        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if !self.github.api_url.starts_with("http://")
            && !self.github.api_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "api_url must start with http:// or https://, got: {}",
                self.github.api_url
            )));
        }

        let non_zero = [
            ("timeout_secs", self.github.timeout_secs),
            ("max_concurrency", self.pool.max_concurrency as u64),
            ("poll_interval_secs", self.pool.poll_interval_secs),
            ("reset_retry_millis", self.pool.reset_retry_millis),
            ("max_connections", self.server.max_connections as u64),
        ];
        if let Some((name, _)) = non_zero.iter().find(|(_, value)| *value == 0) {
            return Err(common::Error::Config(format!(
                "{name} must be greater than 0"
            )));
        }
        Ok(())
    }

    /// Pool tunables derived from the `[pool]` section.
    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            max_in_flight: self.pool.max_concurrency,
            poll_interval: Duration::from_secs(self.pool.poll_interval_secs),
            reset_margin: Duration::from_secs(self.pool.reset_margin_secs),
            reset_retry_interval: Duration::from_millis(self.pool.reset_retry_millis),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.github.timeout_secs)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("github-pool-gateway.toml")
    }
}

/// One token per line; blank lines and `#` comments are skipped.
fn parse_tokens(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_owned)
        .collect()
}
