//! Credential slots
//!
//! A slot is one token plus the quota GitHub last reported for it. Quota is
//! only ever written from response headers: before the first response the
//! quota is unknown and the slot is selectable; once a response reports zero
//! remaining calls the slot stays unselectable until the cooldown scheduler
//! confirms the window has reset.

use std::sync::{Mutex, MutexGuard, PoisonError};

use common::Secret;
use github_api::RateLimit;

/// Last reported quota of a slot. `None` fields mean "not reported yet".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Quota {
    pub remaining: Option<u32>,
    /// Window reset, unix seconds
    pub reset: Option<u64>,
}

#[derive(Debug, Default)]
struct SlotState {
    quota: Quota,
    /// A cooldown task owns this slot until it confirms replenishment.
    cooling: bool,
}

/// One credential and its live quota state.
#[derive(Debug)]
pub struct Slot {
    index: usize,
    token: Secret<String>,
    state: Mutex<SlotState>,
}

/// Redacted view of a slot for status endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenStatus {
    /// Token with everything but the first and last 3 characters masked
    pub token: String,
    pub remaining: Option<u32>,
    pub reset: Option<u64>,
}

impl Slot {
    pub fn new(index: usize, token: String) -> Self {
        Self {
            index,
            token: Secret::new(token),
            state: Mutex::new(SlotState::default()),
        }
    }

    /// Position of this slot in the pool (stable for the pool's lifetime).
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn token(&self) -> &str {
        self.token.expose()
    }

    /// True unless GitHub reported zero remaining calls.
    pub fn selectable(&self) -> bool {
        self.lock().quota.remaining != Some(0)
    }

    pub fn quota(&self) -> Quota {
        self.lock().quota
    }

    /// Whether a cooldown task currently owns this slot.
    pub fn is_cooling(&self) -> bool {
        self.lock().cooling
    }

    /// Overwrite the quota with the values from the response just received.
    ///
    /// Returns `true` when this write exhausted a slot that had no cooldown
    /// pending; the caller must then schedule exactly one cooldown.
    pub fn record_usage(&self, limit: RateLimit) -> bool {
        let mut state = self.lock();
        state.quota = Quota {
            remaining: Some(limit.remaining),
            reset: Some(limit.reset),
        };
        if limit.is_exhausted() && !state.cooling {
            state.cooling = true;
            return true;
        }
        false
    }

    /// Record the result of a reset check. Ends the cooldown and returns
    /// `true` if the quota was replenished; otherwise the cooldown continues.
    pub fn confirm_reset(&self, limit: RateLimit) -> bool {
        let mut state = self.lock();
        state.quota = Quota {
            remaining: Some(limit.remaining),
            reset: Some(limit.reset),
        };
        if limit.is_exhausted() {
            return false;
        }
        state.cooling = false;
        true
    }

    pub fn status(&self) -> TokenStatus {
        let quota = self.quota();
        TokenStatus {
            token: self.token.masked(),
            remaining: quota.remaining,
            reset: quota.reset,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
