use std::collections::VecDeque;

/// Kaufman adaptive moving average.
///
/// The smoothing constant follows the efficiency ratio of the last `period`
/// moves: trending paths track price closely, choppy paths barely move the
/// filter. Volatility is a rolling sum of absolute moves, so each push is O(1).
#[derive(Debug, Clone)]
pub struct Kama {
    period: usize,
    fast_sc: f64,
    slow_sc: f64,
    prices: VecDeque<f64>,
    volatility: f64,
    value: Option<f64>,
}

/// Extra price on top of `period`: the efficiency ratio needs `period` moves.
pub const WARMUP_EXTRA: usize = 1;

const FAST_PERIOD: f64 = 2.0;
const SLOW_PERIOD: f64 = 30.0;

impl Kama {
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "KAMA period must be > 0");
        Self {
            period,
            fast_sc: 2.0 / (FAST_PERIOD + 1.0),
            slow_sc: 2.0 / (SLOW_PERIOD + 1.0),
            prices: VecDeque::with_capacity(period + 2),
            volatility: 0.0,
            value: None,
        }
    }

    pub fn push(&mut self, price: f64) -> Option<f64> {
        if let Some(&last) = self.prices.back() {
            self.volatility += (price - last).abs();
        }
        self.prices.push_back(price);
        if self.prices.len() > self.period + WARMUP_EXTRA {
            if let (Some(old), Some(&next)) = (self.prices.pop_front(), self.prices.front()) {
                self.volatility -= (next - old).abs();
            }
            self.volatility = self.volatility.max(0.0);
        }
        if self.prices.len() < self.min_samples() {
            return None;
        }

        let first = self.prices.front().copied().unwrap_or(price);
        let change = (price - first).abs();
        let efficiency = if self.volatility > f64::EPSILON {
            (change / self.volatility).min(1.0)
        } else {
            0.0
        };
        let sc = (efficiency * (self.fast_sc - self.slow_sc) + self.slow_sc).powi(2);
        let next = match self.value {
            Some(prev) => prev + sc * (price - prev),
            None => price,
        };
        self.value = Some(next);
        self.value
    }

    /// Prices needed before the first value.
    pub fn min_samples(&self) -> usize {
        self.period + WARMUP_EXTRA
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn is_ready(&self) -> bool {
        self.value.is_some()
    }

    pub fn reset(&mut self) {
        self.prices.clear();
        self.volatility = 0.0;
        self.value = None;
    }
}
