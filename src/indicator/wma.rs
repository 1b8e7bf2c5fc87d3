/// Linearly weighted moving average (newest sample weighted `period`).
///
/// The weighted sum is updated in O(1): shifting the window subtracts the
/// plain sum once from the weighted sum before adding the new value with
/// the full weight. Both sums are rebuilt from the buffer every
/// `RESYNC_EVERY` pushes to bound floating-point drift.
#[derive(Debug, Clone)]
pub struct Wma {
    period: usize,
    buffer: Vec<f64>,
    head: usize,
    count: usize,
    sum: f64,
    weighted_sum: f64,
    denominator: f64,
    pushes_since_resync: usize,
}

const RESYNC_EVERY: usize = 4_096;

impl Wma {
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "WMA period must be > 0");
        Self {
            period,
            buffer: vec![0.0; period],
            head: 0,
            count: 0,
            sum: 0.0,
            weighted_sum: 0.0,
            denominator: (period * (period + 1)) as f64 / 2.0,
            pushes_since_resync: 0,
        }
    }

    pub fn push(&mut self, value: f64) -> Option<f64> {
        if self.count >= self.period {
            let oldest = self.buffer[self.head];
            self.weighted_sum = self.weighted_sum - self.sum + self.period as f64 * value;
            self.sum = self.sum - oldest + value;
        } else {
            self.count += 1;
            self.weighted_sum += self.count as f64 * value;
            self.sum += value;
        }
        self.buffer[self.head] = value;
        self.head = (self.head + 1) % self.period;

        self.pushes_since_resync += 1;
        if self.pushes_since_resync >= RESYNC_EVERY && self.is_ready() {
            self.resync();
        }
        self.value()
    }

    /// Recompute both sums from the buffer, oldest sample first.
    fn resync(&mut self) {
        let mut sum = 0.0;
        let mut weighted = 0.0;
        for i in 0..self.period {
            let v = self.buffer[(self.head + i) % self.period];
            sum += v;
            weighted += (i + 1) as f64 * v;
        }
        self.sum = sum;
        self.weighted_sum = weighted;
        self.pushes_since_resync = 0;
    }

    pub fn value(&self) -> Option<f64> {
        if self.is_ready() {
            Some(self.weighted_sum / self.denominator)
        } else {
            None
        }
    }

    pub fn is_ready(&self) -> bool {
        self.count >= self.period
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.period);
    }
}
