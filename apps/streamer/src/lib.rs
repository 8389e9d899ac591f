#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::default_trait_access
    )
)]

//! Ticktape Streamer - Market Data Streaming Client
//!
//! A persistent-socket client for the vendor's streaming market-data
//! service. It performs the service login handshake, issues and withdraws
//! per-feed subscriptions, and decodes the positionally-keyed wire format
//! into typed events fanned out over broadcast channels.
//!
//! # Layers (inside -> outside)
//!
//! - **Domain**: pure types with no I/O
//!   - `events`: decoded market events (quotes, bars, time & sales, books)
//!   - `schema`: per-service positional field schemas
//!
//! - **Application**: port definitions
//!   - `ports`: the `SessionProvider` contract and session parameters
//!
//! - **Infrastructure**: adapters
//!   - `streamer`: envelope codec, connection lifecycle, subscription façade
//!   - `hub`: broadcast fan-out of decoded events
//!   - `config`: environment-driven settings
//!   - `telemetry`: tracing setup
//!
//! # Data Flow
//!
//! ```text
//! subscribe calls --> envelope codec --> send gate --> writer task --> socket
//! socket --> receive loop --> envelope codec --> field schemas --> event hub
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ticktape_streamer::{
//!     EventHub, StaticSessionProvider, StreamerClient, StreamerSettings,
//! };
//! # async fn run(params: ticktape_streamer::SessionParameters) -> anyhow::Result<()> {
//! let hub = Arc::new(EventHub::default());
//! let client = Arc::new(StreamerClient::new(
//!     StreamerSettings::default(),
//!     Arc::new(StaticSessionProvider::new(params)),
//!     Arc::clone(&hub),
//! ));
//!
//! let mut quotes = hub.quotes();
//! client.connect().await?;
//! client.subscribe_quotes("AAPL,MSFT").await?;
//!
//! while let Ok(quote) = quotes.recv().await {
//!     println!("{} {} x {}", quote.symbol, quote.bid_price, quote.ask_price);
//! }
//! client.disconnect().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - decoded events and field schemas, no external dependencies.
pub mod domain;

/// Application layer - port definitions.
pub mod application;

/// Infrastructure layer - adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::events::{
    BookLevel, BookSnapshot, BookSource, ChartBar, Heartbeat, MarketEvent, QuoteUpdate, TimeSale,
};
pub use domain::schema::Service;

// Ports
pub use application::ports::{
    SessionError, SessionParameters, SessionProvider, StaticSessionProvider,
};

// Streamer client
pub use infrastructure::streamer::{ConnectionState, QosLevel, StreamerClient, StreamerError};
pub use infrastructure::streamer::stats::StatsSnapshot;

// Event hub
pub use infrastructure::hub::{ErrorEvent, EventHub, HubConfig};

// Configuration
pub use infrastructure::config::{ConfigError, StreamerSettings, session_from_env};

// Telemetry
pub use infrastructure::telemetry::init as init_telemetry;
