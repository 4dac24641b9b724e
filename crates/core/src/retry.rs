//! Retry policies with exponential backoff.
//!
//! A policy describes how many times an operation may be attempted and how
//! long to wait between attempts. The delay before retry `n` (0-based) is
//! `min(base_delay * multiplier^n, max_delay)`, optionally raised by up to
//! 25% uniform jitter and clamped to `max_delay` again.

use rand::Rng;
use std::time::Duration;

/// Fraction of the computed delay added as jitter at most (1/4 = 25%).
const JITTER_DIVISOR: u64 = 4;

/// Backoff configuration for a class of fallible operations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Growth factor applied per attempt
    pub multiplier: f64,
    /// Add up to 25% random jitter to each delay
    pub jitter: bool,
}

impl RetryPolicy {
    /// General-purpose policy.
    pub const DEFAULT: Self = Self {
        max_attempts: 3,
        base_delay: Duration::from_millis(100),
        max_delay: Duration::from_millis(5_000),
        multiplier: 2.0,
        jitter: true,
    };

    /// Radio sends: more attempts, slower growth, long ceiling.
    pub const NETWORK: Self = Self {
        max_attempts: 5,
        base_delay: Duration::from_millis(500),
        max_delay: Duration::from_millis(30_000),
        multiplier: 1.5,
        jitter: true,
    };

    /// Audio path: short, deterministic delays.
    pub const AUDIO: Self = Self {
        max_attempts: 3,
        base_delay: Duration::from_millis(50),
        max_delay: Duration::from_millis(1_000),
        multiplier: 2.0,
        jitter: false,
    };

    /// Flash/storage: few attempts with long pauses.
    pub const STORAGE: Self = Self {
        max_attempts: 3,
        base_delay: Duration::from_millis(1_000),
        max_delay: Duration::from_millis(10_000),
        multiplier: 2.0,
        jitter: true,
    };

    /// Deterministic delay before retry `attempt` (0-based), without jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as f64;
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let scaled = base_ms * self.multiplier.powi(exponent);

        let delay_ms = if scaled.is_finite() { scaled.min(max_ms) } else { max_ms };
        Duration::from_millis(delay_ms.max(0.0) as u64)
    }

    /// Delay before retry `attempt` with jitter drawn from `rng`.
    ///
    /// Jitter is only applied below the ceiling and the result never
    /// exceeds `max_delay`.
    pub fn jittered_delay<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let delay = self.delay_for(attempt);
        if delay >= self.max_delay {
            return self.max_delay;
        }

        let jitter_max_ms = delay.as_millis() as u64 / JITTER_DIVISOR;
        if jitter_max_ms == 0 {
            return delay;
        }

        let jitter = Duration::from_millis(rng.gen_range(0..jitter_max_ms));
        (delay + jitter).min(self.max_delay)
    }

    /// Delay before retry `attempt`, honoring the policy's jitter flag.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        if self.jitter {
            self.jittered_delay(attempt, &mut rand::thread_rng())
        } else {
            self.delay_for(attempt)
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}
