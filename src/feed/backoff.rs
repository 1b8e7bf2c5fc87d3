use std::time::Duration;

use rand::Rng;

/// Exponential backoff for reconnection, with full jitter on top of the
/// deterministic schedule and a cap on the number of attempts.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    current: Duration,
    initial: Duration,
    max: Duration,
    factor: f64,
    max_attempts: u32,
    attempts: u32,
    jitter: bool,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration, factor: f64, max_attempts: u32) -> Self {
        Self {
            current: initial,
            initial,
            max,
            factor: factor.max(1.0),
            max_attempts,
            attempts: 0,
            jitter: true,
        }
    }

    /// Disable jitter, making every delay deterministic.
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Next delay, or `None` once `max_attempts` retries have been handed out.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.max_attempts {
            return None;
        }
        self.attempts += 1;
        let base = self.current;
        self.current = Duration::from_secs_f64(
            (self.current.as_secs_f64() * self.factor).min(self.max.as_secs_f64()),
        );
        if !self.jitter || base.is_zero() {
            return Some(base);
        }
        // Half fixed, half random: never shorter than base/2, never above base.
        let half = base.as_secs_f64() / 2.0;
        let extra = rand::rng().random_range(0.0..=half);
        Some(Duration::from_secs_f64(half + extra))
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Called after a successful connection.
    pub fn reset(&mut self) {
        self.current = self.initial;
        self.attempts = 0;
    }
}
