use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use trend_scanner::config::{Config, FeedMode, LoggingConfig};
use trend_scanner::engine::{now_ms, ScannerEngine};
use trend_scanner::event::FeedEvent;
use trend_scanner::feed::{binance, replay};
use trend_scanner::runtime::{self, scheduler};

const FEED_CHANNEL_CAPACITY: usize = 1_024;
const WORKER_QUEUE_CAPACITY: usize = 256;

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let writer = match &logging.file {
        Some(path) => {
            let log_file = std::fs::File::create(path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            BoxMakeWriter::new(log_file)
        }
        None => BoxMakeWriter::new(std::io::stdout),
    };
    let level = logging.level.clone();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(&level))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .json()
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider (required by rustls 0.23+)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            eprintln!("Set TREND_SCANNER_CONFIG or create config/default.toml");
            std::process::exit(1);
        }
    };

    init_tracing(&config.logging)?;

    let symbols = config.feed.tradable_symbols();
    tracing::info!(
        mode = ?config.feed.mode,
        symbols = ?symbols,
        "Starting trend-scanner"
    );

    let engine = Arc::new(ScannerEngine::new(config.engine_config()?)?);
    engine.on_recommendations(|list| {
        for rec in list.iter().take(3) {
            tracing::info!(
                symbol = %rec.symbol,
                label = %rec.label(),
                confidence = rec.confidence,
                duration_ticks = rec.suggested_duration_ticks,
                reason = %rec.reason,
                "Recommendation"
            );
        }
        Ok(())
    });
    engine.on_status(|status| {
        tracing::debug!(
            connected = status.connected_symbols,
            average_confidence = status.average_confidence,
            errors = status.error_count,
            "Status"
        );
        Ok(())
    });

    // Channels
    let (event_tx, event_rx) = mpsc::channel::<FeedEvent>(FEED_CHANNEL_CAPACITY);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let feed_task = match config.feed.mode {
        FeedMode::Binance => {
            for symbol in &symbols {
                engine.subscribe(symbol, true)?;
            }
            let feed_config = config.feed.clone();
            let feed_shutdown = shutdown_rx.clone();
            tokio::spawn(async move { binance::run(feed_config, event_tx, feed_shutdown).await })
        }
        FeedMode::Replay => {
            let path = config
                .feed
                .replay_path
                .clone()
                .context("feed.replay_path is required for replay mode")?;
            let feed_shutdown = shutdown_rx.clone();
            tokio::spawn(async move { replay::run(&path, event_tx, feed_shutdown).await })
        }
    };

    let scan_task = scheduler::spawn_scan_loop(
        Arc::clone(&engine),
        Duration::from_millis(config.scanner.scan_interval_ms),
        shutdown_rx.clone(),
    );
    let cleanup_task = scheduler::spawn_cleanup_loop(
        Arc::clone(&engine),
        Duration::from_millis(config.scanner.cleanup_interval_ms),
        shutdown_rx.clone(),
    );

    // Ctrl+C handler
    let ctrl_c_shutdown = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Ctrl+C received");
        let _ = ctrl_c_shutdown.send(true);
    });

    let exit = runtime::run_event_loop(
        Arc::clone(&engine),
        event_rx,
        shutdown_rx,
        WORKER_QUEUE_CAPACITY,
    )
    .await;

    let _ = shutdown_tx.send(true);
    let flushed = engine.shutdown()?;
    let final_list = engine.run_scan(now_ms())?;
    tracing::info!(?exit, flushed = flushed.len(), "Shutting down");

    for (name, task) in [("scan", scan_task), ("cleanup", cleanup_task)] {
        if let Err(e) = task.await {
            tracing::error!(task = name, error = %e, "Task panicked");
        }
    }
    match feed_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "Feed failed"),
        Err(e) => tracing::error!(error = %e, "Feed task panicked"),
    }

    println!(
        "{}",
        serde_json::to_string_pretty(final_list.as_ref())
            .context("failed to serialize recommendations")?
    );
    Ok(())
}
