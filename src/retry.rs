//! Bounded retry with fixed or exponential back-off.
//!
//! Shared by the sensor reader and the persistence store. Sleeping goes
//! through the injected [`Clock`] so tests can count back-off waits
//! without actually waiting.

use std::time::Duration;

use log::debug;
use serde::Deserialize;

use crate::app::ports::Clock;
use crate::error::{ConfigError, Transient};

/// How many times to try an operation and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Must be at least 1.
    pub max_attempts: u32,
    /// Base delay between attempts.
    #[serde(with = "millis")]
    pub backoff: Duration,
    /// Double the delay after every failed attempt.
    pub exponential: bool,
    /// Upper bound for exponential delays.
    #[serde(with = "millis")]
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(2),
            exponential: false,
            max_backoff: Duration::from_secs(30),
        }
    }
}

/// Outcome of [`RetryPolicy::run`]: the final result plus how many
/// attempts it took.
#[derive(Debug)]
pub struct Attempted<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
}

impl RetryPolicy {
    pub const fn fixed(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
            exponential: false,
            max_backoff: backoff,
        }
    }

    pub const fn exponential(max_attempts: u32, backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
            exponential: true,
            max_backoff,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if !self.exponential {
            return self.backoff;
        }
        let shift = attempt.saturating_sub(1).min(31);
        self.backoff
            .checked_mul(1u32 << shift)
            .map_or(self.max_backoff, |d| d.min(self.max_backoff))
    }

    pub fn validate(&self, field: &'static str) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid(field, "max_attempts must be at least 1"));
        }
        if self.exponential && self.max_backoff < self.backoff {
            return Err(ConfigError::invalid(
                field,
                "max_backoff must not be shorter than backoff",
            ));
        }
        Ok(())
    }

    /// Run `op` until it succeeds, fails with a non-transient error, or
    /// `max_attempts` is reached. `op` receives the 1-based attempt number.
    ///
    /// There is no sleep after the final attempt.
    pub fn run<T, E, F>(&self, clock: &dyn Clock, label: &str, mut op: F) -> Attempted<T, E>
    where
        E: Transient + std::fmt::Display,
        F: FnMut(u32) -> Result<T, E>,
    {
        let max = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => {
                    return Attempted {
                        result: Ok(value),
                        attempts: attempt,
                    };
                }
                Err(e) if e.is_transient() && attempt < max => {
                    let delay = self.delay_for(attempt);
                    debug!(
                        "{}: attempt {}/{} failed ({}), retrying in {:?}",
                        label, attempt, max, e, delay
                    );
                    clock.sleep(delay);
                    attempt += 1;
                }
                Err(e) => {
                    return Attempted {
                        result: Err(e),
                        attempts: attempt,
                    };
                }
            }
        }
    }
}

/// Serialise a `Duration` as whole milliseconds.
pub(crate) mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
