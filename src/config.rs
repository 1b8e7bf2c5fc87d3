use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::model::signal::VolatilityTier;
use crate::trend::{TimeframeSpec, CASCADE};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub feed: FeedConfig,
    #[serde(default)]
    pub candles: CandleConfig,
    #[serde(default)]
    pub indicators: IndicatorConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub ranker: RankerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedMode {
    Binance,
    Replay,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub mode: FeedMode,
    #[serde(default = "default_rest_base_url")]
    pub rest_base_url: String,
    #[serde(default = "default_ws_base_url")]
    pub ws_base_url: String,
    #[serde(default)]
    pub symbols: Vec<String>,
    #[serde(default = "default_backfill_limit")]
    pub backfill_limit: usize,
    #[serde(default)]
    pub replay_path: Option<PathBuf>,
    #[serde(default = "default_max_subscribe_attempts")]
    pub max_subscribe_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_rest_base_url() -> String {
    "https://api.binance.com".to_string()
}

fn default_ws_base_url() -> String {
    "wss://stream.binance.com:9443/ws".to_string()
}

fn default_backfill_limit() -> usize {
    500
}

fn default_max_subscribe_attempts() -> u32 {
    8
}

fn default_initial_backoff_ms() -> u64 {
    1_000
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CandleConfig {
    pub intervals: Vec<String>,
    pub max_candles: usize,
}

impl Default for CandleConfig {
    fn default() -> Self {
        Self {
            intervals: vec!["1m".to_string(), "5m".to_string()],
            max_candles: 500,
        }
    }
}

impl CandleConfig {
    pub fn intervals_ms(&self) -> Result<Vec<u64>> {
        let mut out = Vec::with_capacity(self.intervals.len());
        for s in &self.intervals {
            let ms = parse_interval_ms(s)?;
            if !out.contains(&ms) {
                out.push(ms);
            }
        }
        out.sort_unstable();
        Ok(out)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub sma_period: usize,
    pub hull_period: usize,
    pub kama_period: usize,
    pub rsi_period: usize,
    pub momentum_ema_period: usize,
    pub acceleration_lookback: usize,
    pub momentum_deadband: f64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            sma_period: 20,
            hull_period: 16,
            kama_period: 10,
            rsi_period: 14,
            momentum_ema_period: 10,
            acceleration_lookback: 5,
            momentum_deadband: 1e-6,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub scan_interval_ms: u64,
    pub cleanup_interval_ms: u64,
    pub stale_after_ms: u64,
    pub max_pending_live_ticks: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            scan_interval_ms: 2_000,
            cleanup_interval_ms: 60_000,
            stale_after_ms: 300_000,
            max_pending_live_ticks: 1_024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RankerConfig {
    pub alignment_threshold: f64,
    pub momentum_threshold: f64,
    pub min_longest_confidence: f64,
    pub strong_strength: f64,
    pub strong_confidence: f64,
    pub strong_cascade: f64,
    pub max_recommendations: usize,
    pub max_analysis_age_ms: u64,
    /// Per-symbol override of the inferred volatility tier.
    pub volatility_overrides: HashMap<String, VolatilityTier>,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            alignment_threshold: 75.0,
            momentum_threshold: 20.0,
            min_longest_confidence: 60.0,
            strong_strength: 70.0,
            strong_confidence: 80.0,
            strong_cascade: 0.66,
            max_recommendations: 10,
            max_analysis_age_ms: 30_000,
            volatility_overrides: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Everything a `ScannerEngine` needs, independent of how ticks arrive.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub candle_intervals_ms: Vec<u64>,
    pub max_candles: usize,
    pub indicators: IndicatorConfig,
    pub scanner: ScannerConfig,
    pub ranker: RankerConfig,
    pub timeframes: Vec<TimeframeSpec>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            candle_intervals_ms: vec![60_000, 300_000],
            max_candles: CandleConfig::default().max_candles,
            indicators: IndicatorConfig::default(),
            scanner: ScannerConfig::default(),
            ranker: RankerConfig::default(),
            timeframes: CASCADE.to_vec(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.candle_intervals_ms.is_empty() || self.candle_intervals_ms.contains(&0) {
            bail!("candle intervals must be non-empty and > 0");
        }
        if self.max_candles == 0 {
            bail!("candles.max_candles must be > 0");
        }
        let ind = &self.indicators;
        if ind.sma_period == 0
            || ind.hull_period < 2
            || ind.kama_period == 0
            || ind.rsi_period == 0
            || ind.momentum_ema_period == 0
            || ind.acceleration_lookback == 0
        {
            bail!("indicator periods must be > 0 (hull_period >= 2)");
        }
        if self.timeframes.is_empty() || self.timeframes.iter().any(|tf| tf.period < 2) {
            bail!("timeframe cascade must be non-empty with periods >= 2");
        }
        let weight_sum: f64 = self.timeframes.iter().map(|tf| tf.weight).sum();
        if (weight_sum - 1.0).abs() > 1e-6 {
            bail!("timeframe weights must sum to 1.0, got {}", weight_sum);
        }
        let r = &self.ranker;
        for (name, v) in [
            ("alignment_threshold", r.alignment_threshold),
            ("momentum_threshold", r.momentum_threshold),
            ("min_longest_confidence", r.min_longest_confidence),
            ("strong_strength", r.strong_strength),
            ("strong_confidence", r.strong_confidence),
        ] {
            if !(0.0..=100.0).contains(&v) {
                bail!("ranker.{} must be within [0, 100], got {}", name, v);
            }
        }
        if !(0.0..=1.0).contains(&r.strong_cascade) {
            bail!("ranker.strong_cascade must be within [0, 1]");
        }
        Ok(())
    }
}

/// Parse an interval string (e.g. "1s", "1m", "1h", "1d", "1w", "1M") into milliseconds.
pub fn parse_interval_ms(s: &str) -> Result<u64> {
    if s.len() < 2 {
        bail!("invalid interval '{}': expected format like '1m'", s);
    }

    let (num_str, suffix) = s.split_at(s.len() - 1);
    let n: u64 = num_str.parse().with_context(|| {
        format!(
            "invalid interval '{}': quantity must be a positive integer",
            s
        )
    })?;
    if n == 0 {
        bail!("invalid interval '{}': quantity must be > 0", s);
    }

    let unit_ms = match suffix {
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        "d" => 86_400_000,
        "w" => 7 * 86_400_000,
        "M" => 30 * 86_400_000,
        _ => bail!(
            "invalid interval '{}': unsupported suffix '{}', expected one of s/m/h/d/w/M",
            s,
            suffix
        ),
    };

    n.checked_mul(unit_ms)
        .with_context(|| format!("invalid interval '{}': value is too large", s))
}

impl FeedConfig {
    /// Upper-cased, deduplicated symbol list in configured order.
    pub fn tradable_symbols(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for sym in &self.symbols {
            let s = sym.trim().to_ascii_uppercase();
            if !s.is_empty() && !out.iter().any(|v| v == &s) {
                out.push(s);
            }
        }
        out
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = std::env::var("TREND_SCANNER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));
        Self::load_from_path(&config_path)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = Self::from_toml_str(&config_str)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).context("invalid config toml")?;
        if config.feed.mode == FeedMode::Replay && config.feed.replay_path.is_none() {
            bail!("feed.replay_path is required when feed.mode = \"replay\"");
        }
        if config.feed.mode == FeedMode::Binance && config.feed.tradable_symbols().is_empty() {
            bail!("feed.symbols must list at least one symbol for binance mode");
        }
        config.engine_config()?.validate()?;
        Ok(config)
    }

    pub fn engine_config(&self) -> Result<EngineConfig> {
        Ok(EngineConfig {
            candle_intervals_ms: self
                .candles
                .intervals_ms()
                .context("candles.intervals is invalid")?,
            max_candles: self.candles.max_candles,
            indicators: self.indicators.clone(),
            scanner: self.scanner.clone(),
            ranker: self.ranker.clone(),
            timeframes: CASCADE.to_vec(),
        })
    }
}
