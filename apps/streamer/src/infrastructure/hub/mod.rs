//! Event Fan-Out Hub
//!
//! Distributes decoded events to subscribers over tokio broadcast channels,
//! one channel per feed plus channels for connection-state changes and
//! asynchronous errors.
//!
//! Sends happen synchronously from the connection's receive loop, so
//! per-feed ordering matches wire order exactly - no reordering, no
//! coalescing. Isolation is per-receiver: a subscriber that falls behind
//! sees `RecvError::Lagged` on its own receiver and can never stall or
//! fault the stream itself.

use tokio::sync::broadcast;

use crate::domain::events::{BookSnapshot, ChartBar, Heartbeat, MarketEvent, QuoteUpdate, TimeSale};
use crate::infrastructure::streamer::connection::ConnectionState;

// =============================================================================
// Error Events
// =============================================================================

/// An asynchronous failure surfaced on the error channel.
///
/// Faults raised off the caller's task (receive loop, writer) are reported
/// here rather than thrown back into any call stack.
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    /// Where the failure was observed.
    pub context: &'static str,
    /// Human-readable description.
    pub message: String,
    /// Whether the failure tore the connection down.
    pub fatal: bool,
}

// =============================================================================
// Hub
// =============================================================================

/// Channel capacities for the hub.
#[derive(Debug, Clone, Copy)]
pub struct HubConfig {
    /// Capacity of the heartbeat channel.
    pub heartbeats_capacity: usize,
    /// Capacity of the quote channel.
    pub quotes_capacity: usize,
    /// Capacity of the chart-bar channel.
    pub charts_capacity: usize,
    /// Capacity of the time & sales channel.
    pub timesales_capacity: usize,
    /// Capacity of the book-snapshot channel.
    pub books_capacity: usize,
    /// Capacity of the error channel.
    pub errors_capacity: usize,
    /// Capacity of the connection-state channel.
    pub states_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            heartbeats_capacity: 64,
            quotes_capacity: 4096,
            charts_capacity: 1024,
            timesales_capacity: 4096,
            books_capacity: 1024,
            errors_capacity: 256,
            states_capacity: 64,
        }
    }
}

/// Central hub for all event channels.
#[derive(Debug)]
pub struct EventHub {
    heartbeats_tx: broadcast::Sender<Heartbeat>,
    quotes_tx: broadcast::Sender<QuoteUpdate>,
    charts_tx: broadcast::Sender<ChartBar>,
    timesales_tx: broadcast::Sender<TimeSale>,
    books_tx: broadcast::Sender<BookSnapshot>,
    errors_tx: broadcast::Sender<ErrorEvent>,
    states_tx: broadcast::Sender<ConnectionState>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

impl EventHub {
    /// Create a hub with the given channel capacities.
    #[must_use]
    pub fn new(config: HubConfig) -> Self {
        Self {
            heartbeats_tx: broadcast::channel(config.heartbeats_capacity).0,
            quotes_tx: broadcast::channel(config.quotes_capacity).0,
            charts_tx: broadcast::channel(config.charts_capacity).0,
            timesales_tx: broadcast::channel(config.timesales_capacity).0,
            books_tx: broadcast::channel(config.books_capacity).0,
            errors_tx: broadcast::channel(config.errors_capacity).0,
            states_tx: broadcast::channel(config.states_capacity).0,
        }
    }

    /// Route a decoded event to its feed channel.
    pub fn dispatch(&self, event: MarketEvent) {
        match event {
            MarketEvent::Heartbeat(hb) => {
                let _ = self.heartbeats_tx.send(hb);
            }
            MarketEvent::Quote(quote) => {
                let _ = self.quotes_tx.send(quote);
            }
            MarketEvent::Chart(bar) => {
                let _ = self.charts_tx.send(bar);
            }
            MarketEvent::TimeSale(ts) => {
                let _ = self.timesales_tx.send(ts);
            }
            MarketEvent::Book(book) => {
                let _ = self.books_tx.send(book);
            }
        }
    }

    /// Report an asynchronous failure.
    pub fn send_error(&self, event: ErrorEvent) {
        let _ = self.errors_tx.send(event);
    }

    /// Announce a connection-state change.
    pub fn send_state(&self, state: ConnectionState) {
        let _ = self.states_tx.send(state);
    }

    /// New receiver for heartbeats.
    #[must_use]
    pub fn heartbeats(&self) -> broadcast::Receiver<Heartbeat> {
        self.heartbeats_tx.subscribe()
    }

    /// New receiver for quote updates.
    #[must_use]
    pub fn quotes(&self) -> broadcast::Receiver<QuoteUpdate> {
        self.quotes_tx.subscribe()
    }

    /// New receiver for chart bars.
    #[must_use]
    pub fn charts(&self) -> broadcast::Receiver<ChartBar> {
        self.charts_tx.subscribe()
    }

    /// New receiver for time & sales prints.
    #[must_use]
    pub fn timesales(&self) -> broadcast::Receiver<TimeSale> {
        self.timesales_tx.subscribe()
    }

    /// New receiver for book snapshots.
    #[must_use]
    pub fn books(&self) -> broadcast::Receiver<BookSnapshot> {
        self.books_tx.subscribe()
    }

    /// New receiver for error events.
    #[must_use]
    pub fn errors(&self) -> broadcast::Receiver<ErrorEvent> {
        self.errors_tx.subscribe()
    }

    /// New receiver for connection-state changes.
    #[must_use]
    pub fn states(&self) -> broadcast::Receiver<ConnectionState> {
        self.states_tx.subscribe()
    }

    /// Number of active quote receivers.
    #[must_use]
    pub fn quote_receiver_count(&self) -> usize {
        self.quotes_tx.receiver_count()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::QuoteUpdate;

    #[tokio::test]
    async fn dispatch_routes_by_feed() {
        let hub = EventHub::default();
        let mut quotes = hub.quotes();
        let mut charts = hub.charts();

        hub.dispatch(MarketEvent::Quote(QuoteUpdate {
            symbol: "AAPL".to_string(),
            ..QuoteUpdate::default()
        }));

        assert_eq!(quotes.recv().await.unwrap().symbol, "AAPL");
        assert!(charts.try_recv().is_err());
    }

    #[tokio::test]
    async fn delivery_preserves_order() {
        let hub = EventHub::default();
        let mut quotes = hub.quotes();

        for i in 0..10 {
            hub.dispatch(MarketEvent::Quote(QuoteUpdate {
                symbol: format!("SYM{i}"),
                ..QuoteUpdate::default()
            }));
        }
        for i in 0..10 {
            assert_eq!(quotes.recv().await.unwrap().symbol, format!("SYM{i}"));
        }
    }

    #[tokio::test]
    async fn lagging_receiver_does_not_block_sender() {
        let hub = EventHub::new(HubConfig {
            quotes_capacity: 4,
            ..HubConfig::default()
        });
        let mut slow = hub.quotes();

        // Overflow the slow receiver's buffer; sends must keep succeeding.
        for _ in 0..32 {
            hub.dispatch(MarketEvent::Quote(QuoteUpdate::default()));
        }

        match slow.recv().await {
            Err(broadcast::error::RecvError::Lagged(missed)) => assert!(missed > 0),
            other => panic!("expected lag, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn send_without_receivers_is_silent() {
        let hub = EventHub::default();
        hub.dispatch(MarketEvent::Quote(QuoteUpdate::default()));
        hub.send_error(ErrorEvent {
            context: "test",
            message: "no receivers".to_string(),
            fatal: false,
        });
    }
}
