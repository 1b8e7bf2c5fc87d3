use crate::error::ScannerError;
use crate::ingest::FeedMessage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedStatus {
    Connected,
    Disconnected,
    Reconnecting { attempt: u32, delay_ms: u64 },
    /// Retry budget spent; the feed for this symbol has stopped.
    Exhausted { attempts: u32 },
}

/// Everything a feed task reports back to the runtime.
#[derive(Debug)]
pub enum FeedEvent {
    Message(FeedMessage),
    Status { symbol: String, status: FeedStatus },
    /// The symbol's backfill could not be fetched; parked live ticks go through.
    BackfillUnavailable { symbol: String },
    Error(ScannerError),
    /// The feed has nothing more to send.
    Finished,
}
