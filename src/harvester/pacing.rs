//! Pacing primitives shared by backoff and courtesy delays
//!
//! Randomness and sleeping are both injected so a harvest can be replayed
//! deterministically in tests without waiting on the wall clock.

use crate::config::ThrottleConfig;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Shared uniform random source
pub struct Jitter {
    rng: Mutex<StdRng>,
}

impl Jitter {
    /// Seeds from the operating system
    pub fn from_os() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Fixed seed; the same seed yields the same sequence
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Uniform sample in `[low, high]`
    ///
    /// Returns `low` when the range is empty or degenerate.
    pub fn uniform(&self, low: f64, high: f64) -> f64 {
        if !(high > low) {
            return low;
        }
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.random_range(low..=high)
    }
}

/// Suspends the current task
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Randomized pause taken before every page fetch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CourtesyDelay {
    base: f64,
    extra_min: f64,
    extra_max: f64,
}

impl CourtesyDelay {
    /// `base + U[extra_min, extra_max]` seconds
    pub fn new(base: f64, extra_min: f64, extra_max: f64) -> Self {
        Self {
            base: base.max(0.0),
            extra_min: extra_min.max(0.0),
            extra_max: extra_max.max(0.0),
        }
    }

    pub fn none() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn sample(&self, jitter: &Jitter) -> Duration {
        seconds(self.base + jitter.uniform(self.extra_min, self.extra_max))
    }
}

/// Converts seconds to a `Duration`, saturating instead of panicking
///
/// Negative and NaN values become zero; anything too large for a
/// `Duration` becomes `Duration::MAX`.
pub(crate) fn seconds(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

impl From<&ThrottleConfig> for CourtesyDelay {
    fn from(config: &ThrottleConfig) -> Self {
        Self::new(
            config.base_delay,
            config.random_delay_min,
            config.random_delay_max,
        )
    }
}
