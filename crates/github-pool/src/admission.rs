//! Admission control and slot selection
//!
//! Every remote call holds a [`SlotLease`] for its duration. A lease is only
//! granted while the in-flight count is below the configured maximum and at
//! least one slot still has quota; among the selectable slots one is picked
//! uniformly at random so no credential is starved and selection does not
//! correlate with call order.
//!
//! Waiters are woken when a lease is dropped and when a cooldown confirms a
//! reset. They also re-check every `poll_interval` so a missed notification
//! can only delay, never stall, a waiter.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rand::RngExt;
use tokio::sync::Notify;
use tracing::debug;

use crate::slot::Slot;

/// Default maximum number of concurrent remote calls.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 10;

/// Default re-check interval for waiters (quota windows are hour-granular).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Bounds concurrent calls across all slots and hands out slots with quota.
#[derive(Debug)]
pub struct AdmissionController {
    slots: Vec<Arc<Slot>>,
    in_flight: Mutex<usize>,
    max_in_flight: usize,
    poll_interval: Duration,
    notify: Notify,
}

/// Proof of a granted admission. Releases its in-flight count on drop.
#[derive(Debug)]
pub struct SlotLease<'a> {
    controller: &'a AdmissionController,
    slot: Arc<Slot>,
}

impl AdmissionController {
    /// `slots` must be non-empty and `max_in_flight` greater than zero;
    /// the pool validates both before construction.
    pub fn new(slots: Vec<Arc<Slot>>, max_in_flight: usize, poll_interval: Duration) -> Self {
        Self {
            slots,
            in_flight: Mutex::new(0),
            max_in_flight,
            poll_interval,
            notify: Notify::new(),
        }
    }

    pub fn slots(&self) -> &[Arc<Slot>] {
        &self.slots
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Number of leases currently held.
    pub fn in_flight(&self) -> usize {
        *self.lock_in_flight()
    }

    /// Wait until a call may start, then lease a random slot with quota.
    ///
    /// Never fails: if no slot ever regains quota the caller waits forever.
    pub async fn acquire(&self) -> SlotLease<'_> {
        loop {
            // Register interest before checking so a release between the
            // check and the await is not lost.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(lease) = self.try_acquire() {
                return lease;
            }

            debug!(
                in_flight = self.in_flight(),
                max_in_flight = self.max_in_flight,
                "no slot admissible, waiting"
            );
            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// Lease a slot if one is admissible right now.
    pub fn try_acquire(&self) -> Option<SlotLease<'_>> {
        let mut in_flight = self.lock_in_flight();
        if *in_flight >= self.max_in_flight {
            return None;
        }

        let candidates: Vec<&Arc<Slot>> = self.slots.iter().filter(|s| s.selectable()).collect();
        if candidates.is_empty() {
            return None;
        }
        let pick = rand::rng().random_range(0..candidates.len());
        let slot = Arc::clone(candidates[pick]);

        *in_flight += 1;
        metrics::gauge!("github_pool_in_flight").set(*in_flight as f64);

        Some(SlotLease {
            controller: self,
            slot,
        })
    }

    /// Wake every waiter to re-check slot quota (called after a reset).
    pub fn notify_quota_reset(&self) {
        self.notify.notify_waiters();
    }

    fn release(&self) {
        {
            let mut in_flight = self.lock_in_flight();
            debug_assert!(*in_flight > 0, "release without matching acquire");
            *in_flight = in_flight.saturating_sub(1);
            metrics::gauge!("github_pool_in_flight").set(*in_flight as f64);
        }
        self.notify.notify_waiters();
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, usize> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SlotLease<'_> {
    pub fn slot(&self) -> &Arc<Slot> {
        &self.slot
    }

    pub fn token(&self) -> &str {
        self.slot.token()
    }
}

impl Drop for SlotLease<'_> {
    fn drop(&mut self) {
        self.controller.release();
    }
}
