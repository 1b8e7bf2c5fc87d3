use std::collections::VecDeque;

use super::ema::Ema;
use crate::model::signal::MomentumDirection;

/// Tick-to-tick momentum, velocity and acceleration with an EMA-smoothed
/// momentum signal for direction classification.
///
/// * momentum: price delta between consecutive samples
/// * velocity: momentum per second of exchange time
/// * acceleration: velocity change over `lookback` samples
/// The first sample yields no momentum, so the smoothing EMA starts one
/// sample late.
pub const WARMUP_EXTRA: usize = 1;
/// Acceleration compares velocities `lookback` apart; velocity itself needs
/// two samples.
pub const ACCELERATION_WARMUP_EXTRA: usize = 2;

#[derive(Debug, Clone)]
pub struct MomentumTracker {
    prev: Option<(f64, f64)>,
    momentum: f64,
    velocity: f64,
    velocities: VecDeque<f64>,
    lookback: usize,
    smoothed: Ema,
    deadband: f64,
    samples: usize,
}

impl MomentumTracker {
    pub fn new(ema_period: usize, lookback: usize, deadband: f64) -> Self {
        assert!(lookback > 0, "acceleration lookback must be > 0");
        Self {
            prev: None,
            momentum: 0.0,
            velocity: 0.0,
            velocities: VecDeque::with_capacity(lookback + 1),
            lookback,
            smoothed: Ema::new(ema_period),
            deadband: deadband.abs(),
            samples: 0,
        }
    }

    /// Feed one price observed at `timestamp_secs`.
    ///
    /// A sample with no elapsed time keeps the previous velocity.
    pub fn push(&mut self, price: f64, timestamp_secs: f64) {
        self.samples += 1;
        let Some((prev_price, prev_ts)) = self.prev.replace((price, timestamp_secs)) else {
            return;
        };

        self.momentum = price - prev_price;
        let elapsed = timestamp_secs - prev_ts;
        if elapsed > f64::EPSILON {
            self.velocity = self.momentum / elapsed;
        }
        self.velocities.push_back(self.velocity);
        while self.velocities.len() > self.lookback + 1 {
            let _ = self.velocities.pop_front();
        }
        self.smoothed.push(self.momentum);
    }

    /// Samples needed before the smoothed signal exists.
    pub fn min_samples(&self) -> usize {
        self.smoothed.period() + WARMUP_EXTRA
    }

    /// Samples needed before acceleration is defined.
    pub fn acceleration_min_samples(&self) -> usize {
        self.lookback + ACCELERATION_WARMUP_EXTRA
    }

    pub fn momentum(&self) -> f64 {
        self.momentum
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    pub fn acceleration(&self) -> f64 {
        if self.velocities.len() <= self.lookback {
            return 0.0;
        }
        match (self.velocities.back(), self.velocities.front()) {
            (Some(newest), Some(oldest)) => newest - oldest,
            _ => 0.0,
        }
    }

    pub fn smoothed(&self) -> f64 {
        self.smoothed.value().unwrap_or(0.0)
    }

    pub fn direction(&self) -> MomentumDirection {
        let Some(ema) = self.smoothed.value() else {
            return MomentumDirection::Flat;
        };
        if ema > self.deadband {
            MomentumDirection::Increasing
        } else if ema < -self.deadband {
            MomentumDirection::Decreasing
        } else {
            MomentumDirection::Flat
        }
    }

    pub fn is_ready(&self) -> bool {
        self.smoothed.is_ready() && self.velocities.len() > self.lookback
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn reset(&mut self) {
        self.prev = None;
        self.momentum = 0.0;
        self.velocity = 0.0;
        self.velocities.clear();
        self.smoothed.reset();
        self.samples = 0;
    }
}
