//! Backoff between status queries.
//!
//! Polling backoff carries no jitter: the delay only grows so the status
//! service is queried less often the longer a credential takes to settle.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Policy for growing the delay between successive status queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// Keep the same interval
    None,
    /// Add one base unit per retry
    #[default]
    Linear,
    /// Double the interval per retry
    Exponential,
}

impl BackoffStrategy {
    /// Next retry interval after `current`.
    ///
    /// `unit` is the step added by [`BackoffStrategy::Linear`]; it is the
    /// configured base interval.
    pub fn next_interval(self, current: Duration, unit: Duration) -> Duration {
        match self {
            Self::None => current,
            Self::Linear => current.saturating_add(unit),
            Self::Exponential => current.checked_mul(2).unwrap_or(Duration::MAX),
        }
    }
}

/// Mutable interval owned by a single poller.
#[derive(Debug, Clone)]
pub struct BackoffState {
    strategy: BackoffStrategy,
    base: Duration,
    max: Option<Duration>,
    current: Duration,
}

impl BackoffState {
    pub fn new(strategy: BackoffStrategy, base: Duration, max: Option<Duration>) -> Self {
        Self {
            strategy,
            base,
            max,
            current: base,
        }
    }

    /// Delay the next query would wait.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Returns the delay for a retry being scheduled now, then advances the
    /// interval for the one after it.
    pub fn schedule_retry(&mut self) -> Duration {
        let delay = self.current;
        let next = self.strategy.next_interval(self.current, self.base);
        self.current = match self.max {
            Some(max) => next.min(max),
            None => next,
        };
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.base;
    }
}
