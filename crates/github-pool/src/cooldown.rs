//! Quota cooldown scheduling
//!
//! When a response drives a slot to zero remaining calls, one background task
//! takes ownership of that slot: it sleeps until the reported reset instant
//! plus a small safety margin, then asks `GET /rate_limit` for the real quota.
//! The check is authoritative; the slot only becomes selectable again once it
//! reports calls left. Failed checks are retried on a short fixed interval
//! forever, since giving up would leave the credential permanently dead.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use github_api::Call;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::admission::AdmissionController;
use crate::slot::Slot;

/// Added to the reported reset instant before checking (clock skew).
pub const DEFAULT_RESET_MARGIN: Duration = Duration::from_secs(1);

/// Delay before re-running a failed reset check.
pub const DEFAULT_RESET_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Spawns one cooldown task per exhausted slot.
#[derive(Clone)]
pub struct CooldownScheduler {
    controller: Arc<AdmissionController>,
    check: Arc<dyn Call>,
    margin: Duration,
    retry_interval: Duration,
}

impl CooldownScheduler {
    /// `check` is the quota check run with the exhausted slot's token,
    /// normally [`github_api::GitHubClient::rate_limit`].
    pub fn new(
        controller: Arc<AdmissionController>,
        check: Arc<dyn Call>,
        margin: Duration,
        retry_interval: Duration,
    ) -> Self {
        Self {
            controller,
            check,
            margin,
            retry_interval,
        }
    }

    /// Start the cooldown for `slot`. Must be called from within a tokio runtime.
    pub fn schedule(&self, slot: Arc<Slot>) -> JoinHandle<()> {
        let scheduler = self.clone();
        metrics::counter!("github_pool_cooldowns_total").increment(1);
        info!(
            slot = slot.index(),
            reset = ?slot.quota().reset,
            "slot quota exhausted, cooling down"
        );
        tokio::spawn(async move { scheduler.run(slot).await })
    }

    async fn run(self, slot: Arc<Slot>) {
        let mut delay = match slot.quota().reset {
            Some(reset) => delay_until_reset(reset, self.margin, unix_millis()),
            None => self.retry_interval,
        };

        loop {
            debug!(
                slot = slot.index(),
                delay_ms = delay.as_millis() as u64,
                "waiting for quota reset"
            );
            tokio::time::sleep(delay).await;

            match self.check.call(slot.token()).await {
                Ok(response) => match response.rate_limit {
                    Some(limit) if slot.confirm_reset(limit) => {
                        info!(
                            slot = slot.index(),
                            remaining = limit.remaining,
                            "slot quota reset confirmed"
                        );
                        self.controller.notify_quota_reset();
                        return;
                    }
                    Some(limit) => {
                        // Still exhausted: wait for the (possibly new) reset instant
                        delay = delay_until_reset(limit.reset, self.margin, unix_millis());
                        if delay.is_zero() {
                            delay = self.retry_interval;
                        }
                        debug!(
                            slot = slot.index(),
                            reset = limit.reset,
                            "quota not yet reset, rescheduling"
                        );
                    }
                    None => {
                        warn!(
                            slot = slot.index(),
                            retry_ms = self.retry_interval.as_millis() as u64,
                            "reset check returned no quota headers, retrying"
                        );
                        delay = self.retry_interval;
                    }
                },
                Err(e) => {
                    warn!(
                        slot = slot.index(),
                        error = %e,
                        retry_ms = self.retry_interval.as_millis() as u64,
                        "reset check failed, retrying"
                    );
                    delay = self.retry_interval;
                }
            }
        }
    }
}

/// Time from `now_millis` until `reset` (unix seconds) plus `margin`.
/// Zero if that instant has already passed.
pub fn delay_until_reset(reset: u64, margin: Duration, now_millis: u64) -> Duration {
    let due_millis = reset
        .saturating_mul(1000)
        .saturating_add(margin.as_millis() as u64);
    Duration::from_millis(due_millis.saturating_sub(now_millis))
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::DEFAULT_POLL_INTERVAL;
    use github_api::{RateLimit, Response};
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reset check that replays scripted results, then keeps reporting
    /// a replenished quota.
    struct ScriptedCheck {
        script: Mutex<VecDeque<github_api::Result<Response>>>,
        calls: AtomicUsize,
    }

    impl ScriptedCheck {
        fn new(script: Vec<github_api::Result<Response>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl Call for ScriptedCheck {
        fn describe(&self) -> String {
            "GET /rate_limit".into()
        }

        fn call<'a>(
            &'a self,
            _token: &'a str,
        ) -> Pin<Box<dyn Future<Output = github_api::Result<Response>> + Send + 'a>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                self.script
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(|| Ok(quota_response(5000, now_secs() + 3600)))
            })
        }
    }

    fn now_secs() -> u64 {
        unix_millis() / 1000
    }

    fn quota_response(remaining: u32, reset: u64) -> Response {
        Response {
            status: 200,
            body: serde_json::json!({}),
            rate_limit: Some(RateLimit { remaining, reset }),
            link: None,
        }
    }

    fn exhausted_slot(reset: u64) -> (Arc<AdmissionController>, Arc<Slot>) {
        let slot = Arc::new(Slot::new(0, "ghp_cooling".into()));
        assert!(slot.record_usage(RateLimit {
            remaining: 0,
            reset
        }));
        let controller = Arc::new(AdmissionController::new(
            vec![Arc::clone(&slot)],
            10,
            DEFAULT_POLL_INTERVAL,
        ));
        (controller, slot)
    }

    #[test]
    fn delay_adds_margin_to_reset() {
        let delay = delay_until_reset(1_000, Duration::from_secs(1), 990_000);
        assert_eq!(delay, Duration::from_secs(11));
    }

    #[test]
    fn delay_is_zero_for_past_reset() {
        let delay = delay_until_reset(1_000, Duration::from_secs(1), 5_000_000);
        assert_eq!(delay, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_confirmed_after_reset_instant() {
        let (controller, slot) = exhausted_slot(now_secs() + 2);
        let check = ScriptedCheck::new(vec![]);
        let scheduler = CooldownScheduler::new(
            Arc::clone(&controller),
            check.clone(),
            DEFAULT_RESET_MARGIN,
            DEFAULT_RESET_RETRY_INTERVAL,
        );

        let task = scheduler.schedule(Arc::clone(&slot));

        // Before the reset instant nothing is checked
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(check.calls.load(Ordering::SeqCst), 0);
        assert!(!slot.selectable());

        task.await.unwrap();
        assert_eq!(check.calls.load(Ordering::SeqCst), 1);
        assert!(slot.selectable());
        assert!(!slot.is_cooling());
        assert_eq!(slot.quota().remaining, Some(5000));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_check_is_retried() {
        let (controller, slot) = exhausted_slot(now_secs());
        let check = ScriptedCheck::new(vec![
            Err(github_api::Error::Timeout("rate_limit".into())),
            Err(github_api::Error::Http("connection reset".into())),
        ]);
        let scheduler = CooldownScheduler::new(
            controller,
            check.clone(),
            DEFAULT_RESET_MARGIN,
            DEFAULT_RESET_RETRY_INTERVAL,
        );

        scheduler.schedule(Arc::clone(&slot)).await.unwrap();

        assert_eq!(check.calls.load(Ordering::SeqCst), 3);
        assert!(slot.selectable());
    }

    #[tokio::test(start_paused = true)]
    async fn still_exhausted_check_reschedules() {
        let (controller, slot) = exhausted_slot(now_secs());
        let check = ScriptedCheck::new(vec![Ok(quota_response(0, now_secs() + 5))]);
        let scheduler = CooldownScheduler::new(
            controller,
            check.clone(),
            DEFAULT_RESET_MARGIN,
            DEFAULT_RESET_RETRY_INTERVAL,
        );

        let task = scheduler.schedule(Arc::clone(&slot));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(check.calls.load(Ordering::SeqCst), 1);
        assert!(!slot.selectable(), "zero quota from the check keeps the slot out");

        task.await.unwrap();
        assert_eq!(check.calls.load(Ordering::SeqCst), 2);
        assert!(slot.selectable());
    }

    #[tokio::test(start_paused = true)]
    async fn confirmed_reset_wakes_waiters() {
        let (controller, slot) = exhausted_slot(now_secs() + 1);
        let scheduler = CooldownScheduler::new(
            Arc::clone(&controller),
            ScriptedCheck::new(vec![]),
            DEFAULT_RESET_MARGIN,
            DEFAULT_RESET_RETRY_INTERVAL,
        );

        let waiter = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move {
                drop(controller.acquire().await);
            })
        };
        scheduler.schedule(slot);

        // Reset is ~2s away; the waiter must be released well before the
        // next 10s poll would have caught it.
        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("cooldown must notify waiters")
            .unwrap();
    }
}
