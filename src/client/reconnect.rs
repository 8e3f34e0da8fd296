//! Reconnection controller
//!
//! Decides, on each event-loop turn where the link is down, whether enough
//! time has passed to try again. It never sleeps; the loop asks it and uses
//! the answer to size its readiness wait.
//!
//! ```text
//!  Connecting ──ok──▶ Connected
//!      │                  │
//!    fail             disconnect
//!      ▼                  │
//!  BackingOff ◀───────────┘
//!      │ attempts exhausted
//!      ▼
//!   GivenUp
//! ```

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::ReconnectPolicy;

/// Connection lifecycle as seen by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connecting,
    Connected,
    BackingOff,
    GivenUp,
}

/// What the event loop should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Start connect attempt number `attempt`
    Connect { attempt: u32 },

    /// Check back after this long
    Wait(Duration),

    /// Stop the client
    GiveUp,

    /// A connection is up or in progress
    Idle,
}

/// Exponential backoff with jitter
pub struct Reconnect {
    policy: ReconnectPolicy,
    state: LinkState,
    delay: Duration,
    attempts: u32,
    last_attempt: Option<Instant>,
    rng: StdRng,
}

impl Reconnect {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self::with_rng(policy, StdRng::from_entropy())
    }

    /// Deterministic jitter for tests
    pub fn with_seed(policy: ReconnectPolicy, seed: u64) -> Self {
        Self::with_rng(policy, StdRng::seed_from_u64(seed))
    }

    fn with_rng(policy: ReconnectPolicy, rng: StdRng) -> Self {
        Self {
            policy,
            state: LinkState::Connecting,
            delay: policy.initial_delay,
            attempts: 0,
            last_attempt: None,
            rng,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Retries made since the last successful connect
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Minimum wait before the next retry
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Record the initial connect, which does not count as a retry
    pub fn begin(&mut self, now: Instant) {
        self.state = LinkState::Connecting;
        self.last_attempt = Some(now);
    }

    /// A connect completed
    pub fn on_connected(&mut self) {
        self.state = LinkState::Connected;
        self.delay = self.policy.initial_delay;
        self.attempts = 0;
    }

    /// A connect failed or an established connection dropped
    pub fn on_failure(&mut self) {
        if self.state == LinkState::GivenUp {
            return;
        }
        self.state = if self.attempts >= self.policy.max_attempts {
            LinkState::GivenUp
        } else {
            LinkState::BackingOff
        };
    }

    /// Decide what to do at `now`
    pub fn poll(&mut self, now: Instant) -> Decision {
        match self.state {
            LinkState::GivenUp => Decision::GiveUp,
            LinkState::Connected | LinkState::Connecting => Decision::Idle,
            LinkState::BackingOff => {
                if self.attempts >= self.policy.max_attempts {
                    self.state = LinkState::GivenUp;
                    return Decision::GiveUp;
                }

                if let Some(last) = self.last_attempt {
                    let elapsed = now.saturating_duration_since(last);
                    if elapsed < self.delay {
                        return Decision::Wait(self.delay - elapsed);
                    }
                }

                self.attempts += 1;
                self.last_attempt = Some(now);
                self.state = LinkState::Connecting;

                // Jitter applies to the next wait, not the one just served
                let doubled = self.delay.saturating_mul(2).min(self.policy.max_delay);
                self.delay = self.jitter(doubled);

                Decision::Connect {
                    attempt: self.attempts,
                }
            }
        }
    }

    fn jitter(&mut self, delay: Duration) -> Duration {
        let (min, max) = (self.policy.jitter_min, self.policy.jitter_max);
        let factor = if max > min {
            self.rng.gen_range(min..=max)
        } else {
            min
        };
        delay.mul_f64(factor)
    }
}
