use super::wma::Wma;

/// Hull moving average: `WMA(2 * WMA(n/2) - WMA(n), sqrt(n))`.
///
/// Tracks the previous output so callers can read the slope without keeping
/// their own history.
/// Samples shared between the full window and the smoothing window: the
/// first smoothed input is produced by the last sample of the full window.
pub const WARMUP_SHARED: usize = 1;

#[derive(Debug, Clone)]
pub struct HullMa {
    period: usize,
    half: Wma,
    full: Wma,
    smooth: Wma,
    value: Option<f64>,
    prev_value: Option<f64>,
}

impl HullMa {
    pub fn new(period: usize) -> Self {
        assert!(period >= 2, "Hull period must be >= 2");
        let half = (period / 2).max(1);
        let smooth = ((period as f64).sqrt().round() as usize).max(1);
        Self {
            period,
            half: Wma::new(half),
            full: Wma::new(period),
            smooth: Wma::new(smooth),
            value: None,
            prev_value: None,
        }
    }

    pub fn push(&mut self, price: f64) -> Option<f64> {
        let half = self.half.push(price);
        let full = self.full.push(price);
        if let (Some(h), Some(f)) = (half, full) {
            let raw = 2.0 * h - f;
            if let Some(v) = self.smooth.push(raw) {
                self.prev_value = self.value.replace(v);
            }
        }
        self.value
    }

    /// Pushes needed before the first value: the full window plus the
    /// smoothing window, sharing one sample.
    pub fn min_samples(&self) -> usize {
        self.period + self.smooth.period() - WARMUP_SHARED
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    /// Change between the last two outputs.
    pub fn slope(&self) -> Option<f64> {
        Some(self.value? - self.prev_value?)
    }

    pub fn is_ready(&self) -> bool {
        self.value.is_some()
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn reset(&mut self) {
        self.half.reset();
        self.full.reset();
        self.smooth.reset();
        self.value = None;
        self.prev_value = None;
    }
}
