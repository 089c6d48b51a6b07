//! Suggestion pacing
//!
//! Owns at most one pending one-shot timer. A timer is a deadline plus a
//! token; cancelling removes both, so a cancelled timer has nothing left that
//! could fire. The event loop sleeps until [`SuggestionScheduler::deadline`]
//! and then claims the token it was woken for.

use std::time::Duration;

use tokio::time::Instant;

use crate::config::{DEFAULT_PPS, MIN_PPS};

/// Identifies one arming of the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

#[derive(Debug, Clone, Copy)]
struct PendingTimer {
    token: TimerToken,
    deadline: Instant,
}

#[derive(Debug)]
pub struct SuggestionScheduler {
    pps: f32,
    pending: Option<PendingTimer>,
    next_token: u64,
}

impl SuggestionScheduler {
    pub fn new(pps: f32) -> Self {
        let mut scheduler = Self {
            pps: DEFAULT_PPS,
            pending: None,
            next_token: 0,
        };
        scheduler.set_pps(pps);
        scheduler
    }

    /// Change the rate; applies from the next [`arm`](Self::arm).
    pub fn set_pps(&mut self, pps: f32) {
        self.pps = if pps.is_finite() { pps.max(MIN_PPS) } else { DEFAULT_PPS };
    }

    pub fn pps(&self) -> f32 {
        self.pps
    }

    /// Delay between requests: `1000 / max(pps, 0.1)` ms.
    pub fn period(&self) -> Duration {
        let ms = 1000.0 / f64::from(self.pps.max(MIN_PPS));
        Duration::from_millis(ms.round() as u64)
    }

    /// Replace any pending timer with a fresh one due one period from `now`.
    pub fn arm(&mut self, now: Instant) -> TimerToken {
        self.cancel();
        self.next_token += 1;
        let token = TimerToken(self.next_token);
        self.pending = Some(PendingTimer {
            token,
            deadline: now + self.period(),
        });
        token
    }

    /// Drop the pending timer. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.map(|p| p.deadline)
    }

    /// Token of the pending timer if it is due at `now`.
    pub fn due(&self, now: Instant) -> Option<TimerToken> {
        self.pending
            .filter(|p| p.deadline <= now)
            .map(|p| p.token)
    }

    /// Consume the pending timer if `token` names it. A token from a cancelled
    /// or replaced timer claims nothing.
    pub fn claim(&mut self, token: TimerToken) -> bool {
        match self.pending {
            Some(p) if p.token == token => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }
}
