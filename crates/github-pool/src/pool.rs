//! The assembled connection pool

use std::sync::Arc;
use std::time::Duration;

use github_api::{Call, GitHubClient, Response};
use serde_json::Value;
use tracing::info;

use crate::admission::{AdmissionController, DEFAULT_MAX_IN_FLIGHT, DEFAULT_POLL_INTERVAL};
use crate::cooldown::{CooldownScheduler, DEFAULT_RESET_MARGIN, DEFAULT_RESET_RETRY_INTERVAL};
use crate::error::{Error, Result};
use crate::executor::{Executor, RetryForever, RetryPolicy};
use crate::pagination::PageSource;
use crate::proxy::{Repos, Search, Users};
use crate::slot::{Slot, TokenStatus};

/// Tunables for [`GitHubPool::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolOptions {
    /// Maximum concurrent remote calls across all tokens
    pub max_in_flight: usize,
    /// How often blocked callers re-check without a wakeup
    pub poll_interval: Duration,
    /// Added to the reported reset instant before the reset check
    pub reset_margin: Duration,
    /// Delay between failed reset checks
    pub reset_retry_interval: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            reset_margin: DEFAULT_RESET_MARGIN,
            reset_retry_interval: DEFAULT_RESET_RETRY_INTERVAL,
        }
    }
}

/// Rate-limit-aware pool of GitHub credentials.
///
/// Cheap to clone; clones share slots, admission state and cooldowns.
#[derive(Clone)]
pub struct GitHubPool {
    client: GitHubClient,
    executor: Executor,
}

impl GitHubPool {
    /// Build a pool with one slot per token. Empty tokens are skipped.
    pub fn new(tokens: Vec<String>, client: GitHubClient, options: PoolOptions) -> Result<Self> {
        let tokens: Vec<String> = tokens
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if tokens.is_empty() {
            return Err(Error::NoCredentials);
        }
        if options.max_in_flight == 0 {
            return Err(Error::Config("max_in_flight must be greater than zero".into()));
        }

        let slots: Vec<Arc<Slot>> = tokens
            .into_iter()
            .enumerate()
            .map(|(i, token)| Arc::new(Slot::new(i, token)))
            .collect();
        info!(
            tokens = slots.len(),
            max_in_flight = options.max_in_flight,
            base_url = client.base_url(),
            "GitHub pool initialized"
        );

        let controller = Arc::new(AdmissionController::new(
            slots,
            options.max_in_flight,
            options.poll_interval,
        ));
        let cooldown = CooldownScheduler::new(
            Arc::clone(&controller),
            Arc::new(client.rate_limit()),
            options.reset_margin,
            options.reset_retry_interval,
        );
        let executor = Executor::new(controller, cooldown, Arc::new(RetryForever));

        Ok(Self { client, executor })
    }

    /// Replace the default retry-forever policy.
    pub fn with_retry_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
        self.executor.set_policy(policy);
        self
    }

    /// Run one logical request, retrying per the pool's policy.
    pub async fn execute(&self, call: &dyn Call) -> Result<Response> {
        self.executor.execute(call).await
    }

    /// Fetch and concatenate every page of `source`.
    pub async fn fetch_all<S: PageSource>(&self, source: &S) -> Result<Vec<Value>> {
        self.executor.fetch_all(source).await
    }

    pub fn repos(&self) -> Repos<'_> {
        Repos::new(&self.client, &self.executor)
    }

    pub fn search(&self) -> Search<'_> {
        Search::new(&self.client, &self.executor)
    }

    pub fn users(&self) -> Users<'_> {
        Users::new(&self.client, &self.executor)
    }

    pub fn client(&self) -> &GitHubClient {
        &self.client
    }

    /// Per-token quota with masked tokens, in configuration order.
    pub fn status(&self) -> Vec<TokenStatus> {
        self.executor
            .controller()
            .slots()
            .iter()
            .map(|slot| slot.status())
            .collect()
    }

    pub fn in_flight(&self) -> usize {
        self.executor.controller().in_flight()
    }

    /// Pool health summary for the health endpoint.
    ///
    /// All tokens selectable → healthy, some → degraded, none → unhealthy.
    pub fn health(&self) -> Value {
        let controller = self.executor.controller();
        let slots = controller.slots();
        let available = slots.iter().filter(|s| s.selectable()).count();
        let status = if available == slots.len() {
            "healthy"
        } else if available > 0 {
            "degraded"
        } else {
            "unhealthy"
        };

        let tokens: Vec<Value> = self
            .status()
            .into_iter()
            .map(|s| {
                serde_json::json!({
                    "token": s.token,
                    "remaining": s.remaining,
                    "reset": s.reset,
                })
            })
            .collect();

        serde_json::json!({
            "status": status,
            "tokens_total": slots.len(),
            "tokens_available": available,
            "in_flight": controller.in_flight(),
            "max_concurrency": controller.max_in_flight(),
            "tokens": tokens,
        })
    }
}
