//! Rolling statistics per symbol and per sample stream.
//!
//! Every indicator keeps only its own recurrence state, so a push is O(1)
//! regardless of how many ticks the symbol has seen.

use crate::config::IndicatorConfig;
use crate::indicator::{HullMa, Kama, MomentumTracker, Rsi, Sma, RSI_NEUTRAL};
use crate::model::analysis::{IndicatorSnapshot, StatsTimeframe};
use crate::model::candle::Candle;
use crate::model::tick::TickEvent;

#[derive(Debug, Clone)]
pub struct IndicatorState {
    timeframe: StatsTimeframe,
    sma: Sma,
    hull: HullMa,
    kama: Kama,
    rsi: Rsi,
    momentum: MomentumTracker,
    samples: u64,
}

impl IndicatorState {
    pub fn new(timeframe: StatsTimeframe, config: &IndicatorConfig) -> Self {
        Self {
            timeframe,
            sma: Sma::new(config.sma_period),
            hull: HullMa::new(config.hull_period),
            kama: Kama::new(config.kama_period),
            rsi: Rsi::new(config.rsi_period),
            momentum: MomentumTracker::new(
                config.momentum_ema_period,
                config.acceleration_lookback,
                config.momentum_deadband,
            ),
            samples: 0,
        }
    }

    pub fn push(&mut self, price: f64, timestamp_secs: f64) {
        self.samples += 1;
        self.sma.push(price);
        self.hull.push(price);
        self.kama.push(price);
        self.rsi.push(price);
        self.momentum.push(price, timestamp_secs);
    }

    pub fn timeframe(&self) -> StatsTimeframe {
        self.timeframe
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    pub fn is_ready(&self) -> bool {
        self.sma.is_ready()
            && self.hull.is_ready()
            && self.kama.is_ready()
            && self.rsi.is_ready()
            && self.momentum.is_ready()
    }

    pub fn snapshot(&self) -> IndicatorSnapshot {
        IndicatorSnapshot {
            timeframe: self.timeframe,
            samples: self.samples,
            sma: self.sma.value().unwrap_or(0.0),
            hull: self.hull.value().unwrap_or(0.0),
            hull_slope: self.hull.slope().unwrap_or(0.0),
            kama: self.kama.value().unwrap_or(0.0),
            rsi: self.rsi.value().unwrap_or(RSI_NEUTRAL),
            momentum: self.momentum.momentum(),
            smoothed_momentum: self.momentum.smoothed(),
            velocity: self.momentum.velocity(),
            acceleration: self.momentum.acceleration(),
            momentum_direction: self.momentum.direction(),
            ready: self.is_ready(),
        }
    }

    pub fn reset(&mut self) {
        self.sma.reset();
        self.hull.reset();
        self.kama.reset();
        self.rsi.reset();
        self.momentum.reset();
        self.samples = 0;
    }
}

/// Tick-level indicators plus one set per candle interval.
#[derive(Debug, Clone)]
pub struct SymbolStats {
    tick: IndicatorState,
    candles: Vec<(u64, IndicatorState)>,
}

impl SymbolStats {
    pub fn new(candle_intervals_ms: &[u64], config: &IndicatorConfig) -> Self {
        Self {
            tick: IndicatorState::new(StatsTimeframe::Tick, config),
            candles: candle_intervals_ms
                .iter()
                .map(|&ms| (ms, IndicatorState::new(StatsTimeframe::Candle(ms), config)))
                .collect(),
        }
    }

    pub fn on_tick(&mut self, tick: &TickEvent) {
        self.tick.push(tick.price, tick.timestamp_secs());
    }

    /// Candle indicators advance on close, stamped at the candle close time.
    pub fn on_candle(&mut self, candle: &Candle) {
        let interval = candle.interval_ms();
        if let Some((_, state)) = self.candles.iter_mut().find(|(ms, _)| *ms == interval) {
            state.push(candle.close, candle.close_time as f64 / 1_000.0);
        }
    }

    pub fn tick_state(&self) -> &IndicatorState {
        &self.tick
    }

    pub fn snapshots(&self) -> Vec<IndicatorSnapshot> {
        std::iter::once(self.tick.snapshot())
            .chain(self.candles.iter().map(|(_, s)| s.snapshot()))
            .collect()
    }

    pub fn reset(&mut self) {
        self.tick.reset();
        for (_, state) in &mut self.candles {
            state.reset();
        }
    }
}
