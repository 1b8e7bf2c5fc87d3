use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScannerError {
    #[error("config error: {0}")]
    Config(String),

    #[error("malformed tick for {symbol}: {reason}")]
    MalformedTick { symbol: String, reason: String },

    #[error("out-of-order tick for {symbol}: {timestamp_ms} < last accepted {last_ms}")]
    OutOfOrderTick {
        symbol: String,
        timestamp_ms: u64,
        last_ms: u64,
    },

    #[error("late tick for {symbol}: bucket {bucket_start} is not after bucket {open_start}")]
    LateTick {
        symbol: String,
        bucket_start: u64,
        open_start: u64,
    },

    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("subscription for {symbol} failed after {attempts} attempts: {reason}")]
    Subscription {
        symbol: String,
        attempts: u32,
        reason: String,
    },

    #[error("{0} lock poisoned")]
    LockPoisoned(&'static str),

    #[error("pipeline for {0} poisoned by an earlier panic; symbol dropped")]
    PipelinePoisoned(String),

    #[error("worker queue for {0} full, live tick dropped")]
    QueueFull(String),
}

/// Stable taxonomy used for counters and the status error log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Malformed,
    OutOfOrder,
    Subscription,
    Dropped,
    Other,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Malformed => "input.malformed",
            Self::OutOfOrder => "input.out_of_order",
            Self::Subscription => "feed.subscription",
            Self::Dropped => "runtime.dropped",
            Self::Other => "engine.other",
        }
    }
}

impl ScannerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedTick { .. } => ErrorKind::Malformed,
            Self::OutOfOrderTick { .. } | Self::LateTick { .. } => ErrorKind::OutOfOrder,
            Self::Subscription { .. } => ErrorKind::Subscription,
            Self::QueueFull(_) => ErrorKind::Dropped,
            _ => ErrorKind::Other,
        }
    }

    pub fn symbol(&self) -> Option<&str> {
        match self {
            Self::MalformedTick { symbol, .. }
            | Self::OutOfOrderTick { symbol, .. }
            | Self::LateTick { symbol, .. }
            | Self::Subscription { symbol, .. } => Some(symbol),
            Self::UnknownSymbol(symbol)
            | Self::PipelinePoisoned(symbol)
            | Self::QueueFull(symbol) => Some(symbol),
            _ => None,
        }
    }
}

pub type ScannerResult<T> = std::result::Result<T, ScannerError>;
