//! Replays a recorded tick log through the normal ingestion path.
//!
//! Each non-empty line is either a JSON `FeedMessage`
//! (`{"type":"live",...}`, `{"type":"backfill",...}`) or a CSV row
//! `symbol,timestamp_ms,price`. Lines starting with `#` are comments.

use std::path::Path;

use anyhow::{Context, Result};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};

use crate::error::ScannerError;
use crate::event::FeedEvent;
use crate::ingest::{FeedMessage, LiveQuote};

/// Parse one log line. `Ok(None)` for blank and comment lines.
pub fn parse_line(line: &str) -> Result<Option<FeedMessage>, ScannerError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    if line.starts_with('{') {
        return serde_json::from_str(line)
            .map(Some)
            .map_err(|e| ScannerError::MalformedTick {
                symbol: String::new(),
                reason: format!("bad JSON line: {}", e),
            });
    }

    let mut fields = line.split(',').map(str::trim);
    let symbol = fields.next().unwrap_or_default().to_string();
    let malformed = |reason: String| ScannerError::MalformedTick {
        symbol: symbol.clone(),
        reason,
    };
    let (Some(ts), Some(price), None) = (fields.next(), fields.next(), fields.next()) else {
        return Err(malformed(format!("expected symbol,timestamp_ms,price: {:?}", line)));
    };
    // The header row of an exported CSV.
    if ts == "timestamp_ms" {
        return Ok(None);
    }
    let timestamp_ms = ts
        .parse::<u64>()
        .map_err(|e| malformed(format!("bad timestamp {:?}: {}", ts, e)))?;
    // Unparseable prices go through as missing so the engine counts them.
    let price = price.parse::<f64>().ok();
    Ok(Some(FeedMessage::Live(LiveQuote {
        symbol,
        timestamp_ms: Some(timestamp_ms),
        price,
    })))
}

/// Stream the file into `event_tx`, then send `Finished`.
pub async fn run(
    path: &Path,
    event_tx: mpsc::Sender<FeedEvent>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let file = File::open(path)
        .await
        .with_context(|| format!("failed to open replay file {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();
    let mut line_no = 0usize;
    let mut sent = 0usize;

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.with_context(|| format!("failed to read {}", path.display()))?,
            _ = shutdown.changed() => {
                tracing::info!(line_no, "Replay interrupted");
                break;
            }
        };
        let Some(line) = line else {
            break;
        };
        line_no += 1;
        let event = match parse_line(&line) {
            Ok(Some(message)) => {
                sent += 1;
                FeedEvent::Message(message)
            }
            Ok(None) => continue,
            Err(e) => {
                tracing::debug!(line_no, error = %e, "Bad replay line");
                FeedEvent::Error(e)
            }
        };
        if event_tx.send(event).await.is_err() {
            return Ok(());
        }
    }

    tracing::info!(path = %path.display(), lines = line_no, messages = sent, "Replay finished");
    let _ = event_tx.send(FeedEvent::Finished).await;
    Ok(())
}
