//! Capped exponential backoff with jitter

use crate::config::RetryConfig;
use crate::harvester::pacing::{seconds, Jitter};
use std::time::Duration;

/// Backoff schedule between fetch attempts
///
/// `delay(n) = min(base * factor^(n-1) + U[0, jitter], max_delay)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    base: f64,
    factor: f64,
    jitter_max: f64,
    max_delay: f64,
}

impl RetryPolicy {
    /// All values are seconds; negative values are clamped to zero
    pub fn new(base: f64, factor: f64, jitter_max: f64, max_delay: f64) -> Self {
        Self {
            base: base.max(0.0),
            factor: factor.max(0.0),
            jitter_max: jitter_max.max(0.0),
            max_delay: max_delay.max(0.0),
        }
    }

    /// Delay after failed attempt `attempt` (1-based; 0 is treated as 1)
    pub fn delay(&self, attempt: u32, jitter: &Jitter) -> Duration {
        let raw = self.backoff_secs(attempt) + jitter.uniform(0.0, self.jitter_max);
        self.capped(raw)
    }

    /// The jitter-free lower bound of `delay(attempt)`
    pub fn floor(&self, attempt: u32) -> Duration {
        self.capped(self.backoff_secs(attempt))
    }

    pub fn max_delay(&self) -> Duration {
        seconds(self.max_delay)
    }

    fn backoff_secs(&self, attempt: u32) -> f64 {
        let exponent = attempt.max(1) - 1;
        self.base * self.factor.powf(exponent as f64)
    }

    fn capped(&self, secs: f64) -> Duration {
        let secs = if secs.is_finite() {
            secs.min(self.max_delay)
        } else {
            self.max_delay
        };
        seconds(secs)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.base_delay,
            config.backoff_factor,
            config.jitter,
            config.max_delay,
        )
    }
}
