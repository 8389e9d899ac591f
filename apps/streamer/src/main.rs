//! Ticktape Streamer Binary
//!
//! Connects to the streaming service with an environment-injected session,
//! subscribes the configured symbol lists and logs decoded events until
//! interrupted.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin ticktape-streamer
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `STREAMER_HOST`: streaming socket host (or full `wss://` URL)
//! - `STREAMER_TOKEN`: per-session streaming token
//! - `STREAMER_ACCOUNT_ID`: account identifier
//!
//! ## Optional
//! - `STREAMER_TOKEN_TIMESTAMP_MS`: token issue time, epoch ms (default: 0)
//! - `STREAMER_APP_ID`, `STREAMER_ACL`, `STREAMER_USER_GROUP`,
//!   `STREAMER_ACCESS_LEVEL`, `STREAMER_COMPANY`, `STREAMER_SEGMENT`,
//!   `STREAMER_ACCOUNT_CD_DOMAIN_ID`: remaining session payload fields
//! - `STREAMER_QUOTE_SYMBOLS`: comma-joined quote subscriptions
//! - `STREAMER_CHART_EQUITY_SYMBOLS`: comma-joined equity chart subscriptions
//! - `STREAMER_CHART_FUTURES_SYMBOLS`: comma-joined futures chart subscriptions
//! - `STREAMER_TIMESALE_SYMBOLS`: comma-joined equity time & sales subscriptions
//! - `STREAMER_BOOK_SYMBOLS`: comma-joined NASDAQ book subscriptions
//! - `STREAMER_QOS_LEVEL`: update-rate tier 0-5 requested after connect
//! - `STREAMER_CLOSE_TIMEOUT_SECS`: graceful close bound (default: 5)
//! - `RUST_LOG`: log level (default: info)

use std::sync::Arc;

use tokio::signal;

use ticktape_streamer::{
    EventHub, StaticSessionProvider, StreamerClient, StreamerSettings, session_from_env,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    let _ = dotenvy::dotenv();

    ticktape_streamer::init_telemetry();

    tracing::info!("starting ticktape streamer");

    let settings = StreamerSettings::from_env();
    let session = session_from_env()?;
    let provider = Arc::new(StaticSessionProvider::new(session));

    let hub = Arc::new(EventHub::default());
    let client = Arc::new(StreamerClient::new(
        settings.clone(),
        provider,
        Arc::clone(&hub),
    ));

    spawn_event_loggers(&hub);

    client.connect().await?;

    if let Some(level) = settings.startup_qos {
        client.request_qos(level).await?;
    }

    subscribe_from_env(&client).await?;

    tracing::info!("streamer ready");

    await_shutdown().await;

    client.disconnect().await?;
    let stats = client.stats();
    tracing::info!(
        frames = stats.frames_received,
        quotes = stats.quotes,
        heartbeats = stats.heartbeats,
        decode_errors = stats.decode_errors,
        "streamer stopped"
    );
    Ok(())
}

/// Issue subscriptions for every symbol list present in the environment.
async fn subscribe_from_env(client: &StreamerClient) -> anyhow::Result<()> {
    if let Ok(symbols) = std::env::var("STREAMER_QUOTE_SYMBOLS") {
        client.subscribe_quotes(&symbols).await?;
    }
    if let Ok(symbols) = std::env::var("STREAMER_CHART_EQUITY_SYMBOLS") {
        client.subscribe_chart_equity(&symbols).await?;
    }
    if let Ok(symbols) = std::env::var("STREAMER_CHART_FUTURES_SYMBOLS") {
        client.subscribe_chart_futures(&symbols).await?;
    }
    if let Ok(symbols) = std::env::var("STREAMER_TIMESALE_SYMBOLS") {
        client.subscribe_timesale_equity(&symbols).await?;
    }
    if let Ok(symbols) = std::env::var("STREAMER_BOOK_SYMBOLS") {
        client.subscribe_nasdaq_book(&symbols).await?;
    }
    Ok(())
}

/// Log every decoded event; one task per feed channel.
fn spawn_event_loggers(hub: &Arc<EventHub>) {
    let mut quotes = hub.quotes();
    tokio::spawn(async move {
        while let Ok(quote) = quotes.recv().await {
            tracing::info!(
                symbol = %quote.symbol,
                bid = %quote.bid_price,
                ask = %quote.ask_price,
                last = %quote.last_price,
                "quote"
            );
        }
    });

    let mut charts = hub.charts();
    tokio::spawn(async move {
        while let Ok(bar) = charts.recv().await {
            tracing::info!(
                symbol = %bar.symbol,
                open = %bar.open,
                close = %bar.close,
                volume = bar.volume,
                "chart bar"
            );
        }
    });

    let mut timesales = hub.timesales();
    tokio::spawn(async move {
        while let Ok(print) = timesales.recv().await {
            tracing::info!(
                symbol = %print.symbol,
                price = %print.last_price,
                size = print.last_size,
                "time & sale"
            );
        }
    });

    let mut books = hub.books();
    tokio::spawn(async move {
        while let Ok(book) = books.recv().await {
            tracing::info!(
                symbol = %book.symbol,
                source = ?book.source,
                bids = book.bids.len(),
                asks = book.asks.len(),
                "book snapshot"
            );
        }
    });

    let mut heartbeats = hub.heartbeats();
    tokio::spawn(async move {
        while let Ok(hb) = heartbeats.recv().await {
            tracing::debug!(at = %hb.timestamp, "heartbeat");
        }
    });

    let mut errors = hub.errors();
    tokio::spawn(async move {
        while let Ok(event) = errors.recv().await {
            tracing::error!(
                context = event.context,
                fatal = event.fatal,
                error = %event.message,
                "stream error"
            );
        }
    });

    let mut states = hub.states();
    tokio::spawn(async move {
        while let Ok(state) = states.recv().await {
            tracing::info!(?state, "connection state");
        }
    });
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received Ctrl+C, shutting down");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, shutting down");
        }
    }
}
