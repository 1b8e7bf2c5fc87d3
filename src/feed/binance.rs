//! Binance spot feed: REST backfill of recent trades plus one `@trade`
//! websocket stream per symbol.

use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio_tungstenite::tungstenite;

use super::backoff::ExponentialBackoff;
use super::types::{BinanceApiErrorResponse, BinanceRecentTrade, BinanceTradeEvent};
use crate::config::FeedConfig;
use crate::error::ScannerError;
use crate::event::{FeedEvent, FeedStatus};
use crate::ingest::FeedMessage;

/// Binance caps `/api/v3/trades` at 1000 entries.
const MAX_BACKFILL_LIMIT: usize = 1_000;

pub struct BinanceRestClient {
    http: reqwest::Client,
    base_url: String,
}

impl BinanceRestClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn ping(&self) -> Result<()> {
        let url = format!("{}/api/v3/ping", self.base_url);
        self.http
            .get(&url)
            .send()
            .await
            .context("ping failed")?
            .error_for_status()
            .context("ping returned error status")?;
        Ok(())
    }

    pub async fn recent_trades(&self, symbol: &str, limit: usize) -> Result<Vec<BinanceRecentTrade>> {
        let url = format!(
            "{}/api/v3/trades?symbol={}&limit={}",
            self.base_url,
            symbol,
            limit.clamp(1, MAX_BACKFILL_LIMIT)
        );
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("recent_trades HTTP failed")?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            if let Ok(err) = serde_json::from_str::<BinanceApiErrorResponse>(&body) {
                anyhow::bail!("Binance API error {}: {}", err.code, err.msg);
            }
            anyhow::bail!("recent_trades request failed: {}", body);
        }
        Ok(resp.json().await?)
    }

    /// Recent trades as one backfill batch, oldest first.
    pub async fn backfill(&self, symbol: &str, limit: usize) -> Result<FeedMessage> {
        let mut trades = self.recent_trades(symbol, limit).await?;
        trades.sort_by_key(|t| (t.time, t.id));
        let (timestamps, prices) = trades.iter().map(|t| (t.time, t.price)).unzip();
        Ok(FeedMessage::backfill(symbol, timestamps, prices))
    }
}

/// Convert a raw trade-stream frame into a live quote.
pub fn parse_trade_message(text: &str) -> Result<FeedMessage> {
    let event: BinanceTradeEvent =
        serde_json::from_str(text).context("Failed to parse trade event")?;
    Ok(FeedMessage::live(event.symbol, event.trade_time, event.price))
}

/// Map a text frame to what the runtime receives. A frame that does not
/// parse becomes a counted `MalformedTick`.
pub fn frame_event(symbol: &str, text: &str) -> FeedEvent {
    match parse_trade_message(text) {
        Ok(message) => FeedEvent::Message(message),
        Err(e) => {
            tracing::warn!(symbol, error = %e, "Failed to parse WS message");
            FeedEvent::Error(ScannerError::MalformedTick {
                symbol: symbol.to_string(),
                reason: format!("{:#}", e),
            })
        }
    }
}

pub struct BinanceWsClient {
    url: String,
    symbol: String,
}

impl BinanceWsClient {
    pub fn new(ws_base_url: &str, symbol: &str) -> Self {
        Self {
            url: format!(
                "{}/{}@trade",
                ws_base_url.trim_end_matches('/'),
                symbol.to_ascii_lowercase()
            ),
            symbol: symbol.to_ascii_uppercase(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send_status(&self, event_tx: &mpsc::Sender<FeedEvent>, status: FeedStatus) {
        let _ = event_tx
            .send(FeedEvent::Status {
                symbol: self.symbol.clone(),
                status,
            })
            .await;
    }

    /// Connect and run the WebSocket loop with automatic reconnection until
    /// shutdown or until the backoff runs out of attempts.
    pub async fn connect_and_run(
        &self,
        mut backoff: ExponentialBackoff,
        event_tx: mpsc::Sender<FeedEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        loop {
            match self.connect_once(&event_tx, &mut backoff, &mut shutdown).await {
                Ok(()) => {
                    self.send_status(&event_tx, FeedStatus::Disconnected).await;
                    break;
                }
                Err(e) => {
                    self.send_status(&event_tx, FeedStatus::Disconnected).await;
                    tracing::warn!(symbol = %self.symbol, error = %e, "WS error");

                    let Some(delay) = backoff.next_delay() else {
                        let attempts = backoff.attempts();
                        self.send_status(&event_tx, FeedStatus::Exhausted { attempts })
                            .await;
                        let _ = event_tx
                            .send(FeedEvent::Error(ScannerError::Subscription {
                                symbol: self.symbol.clone(),
                                attempts,
                                reason: format!("{:#}", e),
                            }))
                            .await;
                        break;
                    };
                    self.send_status(
                        &event_tx,
                        FeedStatus::Reconnecting {
                            attempt: backoff.attempts(),
                            delay_ms: delay.as_millis() as u64,
                        },
                    )
                    .await;

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => continue,
                        _ = shutdown.changed() => {
                            tracing::info!(symbol = %self.symbol, "Shutdown during reconnect");
                            break;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    async fn connect_once(
        &self,
        event_tx: &mpsc::Sender<FeedEvent>,
        backoff: &mut ExponentialBackoff,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        tracing::info!(url = %self.url, "Connecting");

        let (ws_stream, _resp) = tokio_tungstenite::connect_async(&self.url)
            .await
            .context("WebSocket connect failed")?;

        backoff.reset();
        self.send_status(event_tx, FeedStatus::Connected).await;
        tracing::info!(symbol = %self.symbol, "WebSocket connected");

        let (_write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(tungstenite::Message::Text(text))) => {
                            if event_tx.send(frame_event(&self.symbol, &text)).await.is_err() {
                                // Runtime is gone.
                                return Ok(());
                            }
                        }
                        Some(Ok(tungstenite::Message::Ping(_))) => {
                            // tokio-tungstenite handles pong automatically
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            return Err(anyhow::anyhow!("WebSocket read error: {}", e));
                        }
                        None => {
                            return Err(anyhow::anyhow!("WebSocket stream ended"));
                        }
                    }
                }
                _ = shutdown.changed() => {
                    return Ok(());
                }
            }
        }
    }
}

fn backoff_for(config: &FeedConfig) -> ExponentialBackoff {
    ExponentialBackoff::new(
        Duration::from_millis(config.initial_backoff_ms),
        Duration::from_millis(config.max_backoff_ms),
        2.0,
        config.max_subscribe_attempts,
    )
}

/// Fetch the backfill with retries. On failure the runtime is told to stop
/// waiting for it.
async fn backfill_with_retry(
    rest: &BinanceRestClient,
    config: &FeedConfig,
    symbol: &str,
    event_tx: &mpsc::Sender<FeedEvent>,
    shutdown: &mut watch::Receiver<bool>,
) {
    let mut backoff = backoff_for(config);
    loop {
        match rest.backfill(symbol, config.backfill_limit).await {
            Ok(message) => {
                let _ = event_tx.send(FeedEvent::Message(message)).await;
                return;
            }
            Err(e) => {
                tracing::warn!(symbol, error = %e, "Backfill request failed");
                let Some(delay) = backoff.next_delay() else {
                    let _ = event_tx
                        .send(FeedEvent::Error(ScannerError::Subscription {
                            symbol: symbol.to_string(),
                            attempts: backoff.attempts(),
                            reason: format!("backfill: {:#}", e),
                        }))
                        .await;
                    break;
                };
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown.changed() => break,
                }
            }
        }
    }
    let _ = event_tx
        .send(FeedEvent::BackfillUnavailable {
            symbol: symbol.to_string(),
        })
        .await;
}

/// Run the live stream and the backfill of one symbol.
pub async fn run_symbol(
    config: FeedConfig,
    symbol: String,
    event_tx: mpsc::Sender<FeedEvent>,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let ws = BinanceWsClient::new(&config.ws_base_url, &symbol);
    let ws_backoff = backoff_for(&config);
    let ws_tx = event_tx.clone();
    let ws_shutdown = shutdown.clone();
    // Live stream first so ticks are parked while the backfill is in flight.
    let ws_task =
        tokio::spawn(async move { ws.connect_and_run(ws_backoff, ws_tx, ws_shutdown).await });

    let rest = BinanceRestClient::new(&config.rest_base_url);
    let mut backfill_shutdown = shutdown;
    backfill_with_retry(&rest, &config, &symbol, &event_tx, &mut backfill_shutdown).await;

    ws_task.await.context("websocket task panicked")?
}

/// Run every configured symbol until shutdown, then report `Finished`.
pub async fn run(
    config: FeedConfig,
    event_tx: mpsc::Sender<FeedEvent>,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let mut tasks = JoinSet::new();
    for symbol in config.tradable_symbols() {
        tasks.spawn(run_symbol(
            config.clone(),
            symbol,
            event_tx.clone(),
            shutdown.clone(),
        ));
    }
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Symbol feed failed"),
            Err(e) => tracing::error!(error = %e, "Symbol feed task panicked"),
        }
    }
    let _ = event_tx.send(FeedEvent::Finished).await;
    Ok(())
}
