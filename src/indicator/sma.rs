/// Simple Moving Average using a ring buffer for O(1) push.
#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    buffer: Vec<f64>,
    head: usize,
    count: usize,
    sum: f64,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "SMA period must be > 0");
        Self {
            period,
            buffer: vec![0.0; period],
            head: 0,
            count: 0,
            sum: 0.0,
        }
    }

    /// Push a new value, return the current SMA if enough data.
    pub fn push(&mut self, value: f64) -> Option<f64> {
        if self.count >= self.period {
            self.sum -= self.buffer[self.head];
        }
        self.buffer[self.head] = value;
        self.sum += value;
        self.head = (self.head + 1) % self.period;
        if self.count < self.period {
            self.count += 1;
        }
        self.value()
    }

    pub fn value(&self) -> Option<f64> {
        if self.is_ready() {
            Some(self.sum / self.period as f64)
        } else {
            None
        }
    }

    /// Minimum number of pushes before `value` is defined.
    pub fn min_samples(&self) -> usize {
        self.period
    }

    pub fn is_ready(&self) -> bool {
        self.count >= self.min_samples()
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn reset(&mut self) {
        self.buffer.iter_mut().for_each(|v| *v = 0.0);
        self.head = 0;
        self.count = 0;
        self.sum = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_buffer_wraps_correctly() {
        let mut sma = Sma::new(3);
        sma.push(10.0);
        sma.push(20.0);
        sma.push(30.0);
        // [40, 20, 30] -> avg = 30
        let v = sma.push(40.0).unwrap();
        assert!((v - 30.0).abs() < f64::EPSILON);

        let v = sma.push(50.0).unwrap();
        assert!((v - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn reset_clears_history() {
        let mut sma = Sma::new(2);
        sma.push(1.0);
        sma.push(3.0);
        assert!(sma.is_ready());
        sma.reset();
        assert!(!sma.is_ready());
        assert_eq!(sma.push(5.0), None);
        assert!((sma.push(7.0).unwrap() - 6.0).abs() < f64::EPSILON);
    }

    #[test]
    #[should_panic(expected = "SMA period must be > 0")]
    fn zero_period_panics() {
        Sma::new(0);
    }
}
