/// Wilder-smoothed relative strength index.
///
/// The first `period` moves seed the averages with a plain mean; later moves
/// are folded in exponentially. A zero average loss saturates at 100.
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    prev_price: Option<f64>,
    warmup_count: usize,
    gain_sum: f64,
    loss_sum: f64,
    avg_gain: Option<f64>,
    avg_loss: Option<f64>,
}

/// Extra price on top of `period`: the seed that the first move is taken from.
pub const WARMUP_EXTRA: usize = 1;

/// Reported while warming up and for a perfectly flat series.
pub const RSI_NEUTRAL: f64 = 50.0;

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "RSI period must be > 0");
        Self {
            period,
            prev_price: None,
            warmup_count: 0,
            gain_sum: 0.0,
            loss_sum: 0.0,
            avg_gain: None,
            avg_loss: None,
        }
    }

    pub fn push(&mut self, price: f64) -> Option<f64> {
        let Some(prev) = self.prev_price.replace(price) else {
            return None;
        };

        let delta = price - prev;
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);

        match (self.avg_gain, self.avg_loss) {
            (Some(prev_gain), Some(prev_loss)) => {
                let period = self.period as f64;
                self.avg_gain = Some((prev_gain * (period - 1.0) + gain) / period);
                self.avg_loss = Some((prev_loss * (period - 1.0) + loss) / period);
            }
            _ => {
                self.gain_sum += gain;
                self.loss_sum += loss;
                self.warmup_count += 1;
                if self.warmup_count >= self.period {
                    self.avg_gain = Some(self.gain_sum / self.period as f64);
                    self.avg_loss = Some(self.loss_sum / self.period as f64);
                }
            }
        }
        self.value()
    }

    pub fn value(&self) -> Option<f64> {
        let avg_gain = self.avg_gain?;
        let avg_loss = self.avg_loss?;
        if avg_loss <= f64::EPSILON {
            if avg_gain <= f64::EPSILON {
                return Some(RSI_NEUTRAL);
            }
            return Some(100.0);
        }
        let rs = avg_gain / avg_loss;
        Some(100.0 - (100.0 / (1.0 + rs)))
    }

    /// Prices needed before the first value: one seed plus `period` moves.
    pub fn min_samples(&self) -> usize {
        self.period + WARMUP_EXTRA
    }

    pub fn is_ready(&self) -> bool {
        self.avg_gain.is_some()
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.period);
    }
}
