//! Request execution with quota accounting and retry
//!
//! One logical request = one [`Call`] run through [`Executor::execute`]. Each
//! attempt leases a slot, runs the call with the slot's token, records the
//! quota headers of whatever came back (success or error) and drops the
//! lease before deciding what to do next, so a retry never holds two leases.
//!
//! Failures are assumed transient. The default [`RetryForever`] policy keeps
//! retrying with no bound and no backoff beyond what admission control
//! imposes; a request that can never succeed (e.g. a deleted repository)
//! therefore retries forever. Bounded policies exist for tests and for
//! callers that prefer failing fast.

use std::sync::Arc;

use github_api::{Call, Response};
use tracing::{debug, warn};

use crate::admission::AdmissionController;
use crate::cooldown::CooldownScheduler;
use crate::error::{Error, Result};

/// Decides whether a failed attempt is retried.
pub trait RetryPolicy: Send + Sync {
    /// `attempts` is the number of attempts made so far (≥ 1).
    fn should_retry(&self, attempts: u32, error: &github_api::Error) -> bool;
}

/// Retry every failure, forever.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryForever;

impl RetryPolicy for RetryForever {
    fn should_retry(&self, _attempts: u32, _error: &github_api::Error) -> bool {
        true
    }
}

/// Give up after a fixed number of attempts.
#[derive(Debug, Clone, Copy)]
pub struct MaxAttempts(pub u32);

impl RetryPolicy for MaxAttempts {
    fn should_retry(&self, attempts: u32, _error: &github_api::Error) -> bool {
        attempts < self.0
    }
}

/// Runs calls through admission control and feeds quota back into slots.
#[derive(Clone)]
pub struct Executor {
    controller: Arc<AdmissionController>,
    cooldown: CooldownScheduler,
    policy: Arc<dyn RetryPolicy>,
}

impl Executor {
    pub fn new(
        controller: Arc<AdmissionController>,
        cooldown: CooldownScheduler,
        policy: Arc<dyn RetryPolicy>,
    ) -> Self {
        Self {
            controller,
            cooldown,
            policy,
        }
    }

    pub fn controller(&self) -> &Arc<AdmissionController> {
        &self.controller
    }

    pub(crate) fn set_policy(&mut self, policy: Arc<dyn RetryPolicy>) {
        self.policy = policy;
    }

    /// Run `call` until it succeeds or the retry policy gives up.
    pub async fn execute(&self, call: &dyn Call) -> Result<Response> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let lease = self.controller.acquire().await;
            let result = call.call(lease.token()).await;

            let reported = match &result {
                Ok(response) => response.rate_limit,
                Err(e) => e.rate_limit(),
            };
            if let Some(limit) = reported
                && lease.slot().record_usage(limit)
            {
                self.cooldown.schedule(Arc::clone(lease.slot()));
            }
            let slot = lease.slot().index();
            drop(lease);

            match result {
                Ok(response) => {
                    metrics::counter!("github_pool_requests_total", "outcome" => "success")
                        .increment(1);
                    debug!(
                        call = %call.describe(),
                        slot,
                        attempts,
                        remaining = ?response.rate_limit.map(|l| l.remaining),
                        "request succeeded"
                    );
                    return Ok(response);
                }
                Err(e) => {
                    metrics::counter!("github_pool_requests_total", "outcome" => "failure")
                        .increment(1);
                    if !self.policy.should_retry(attempts, &e) {
                        warn!(call = %call.describe(), slot, attempts, error = %e, "request failed, giving up");
                        return Err(Error::RetriesExhausted {
                            call: call.describe(),
                            attempts,
                            source: e,
                        });
                    }
                    metrics::counter!("github_pool_retries_total", "error_type" => e.kind())
                        .increment(1);
                    warn!(call = %call.describe(), slot, attempts, error = %e, "request failed, retrying");
                }
            }
        }
    }
}
