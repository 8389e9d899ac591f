//! Per-Feed Counters
//!
//! Cheap atomic counters maintained by the receive loop, one per feed plus
//! frame and decode-error totals. Snapshots are taken lock-free.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::domain::events::MarketEvent;

/// Counters for one connection, updated by the receive loop.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    frames_received: AtomicU64,
    heartbeats: AtomicU64,
    quotes: AtomicU64,
    charts: AtomicU64,
    timesales: AtomicU64,
    books: AtomicU64,
    decode_errors: AtomicU64,
}

/// Point-in-time copy of [`ConnectionStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Text frames read off the socket.
    pub frames_received: u64,
    /// Heartbeat events decoded.
    pub heartbeats: u64,
    /// Quote updates decoded.
    pub quotes: u64,
    /// Chart bars decoded.
    pub charts: u64,
    /// Time & sales prints decoded.
    pub timesales: u64,
    /// Book snapshots decoded.
    pub books: u64,
    /// Inbound messages that failed to decode.
    pub decode_errors: u64,
}

impl ConnectionStats {
    /// Record one inbound text frame.
    pub fn record_frame(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a decoded event against its feed counter.
    pub fn record_event(&self, event: &MarketEvent) {
        let counter = match event {
            MarketEvent::Heartbeat(_) => &self.heartbeats,
            MarketEvent::Quote(_) => &self.quotes,
            MarketEvent::Chart(_) => &self.charts,
            MarketEvent::TimeSale(_) => &self.timesales,
            MarketEvent::Book(_) => &self.books,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a decode failure.
    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a consistent-enough snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            heartbeats: self.heartbeats.load(Ordering::Relaxed),
            quotes: self.quotes.load(Ordering::Relaxed),
            charts: self.charts.load(Ordering::Relaxed),
            timesales: self.timesales.load(Ordering::Relaxed),
            books: self.books.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::{Heartbeat, QuoteUpdate};
    use chrono::Utc;

    #[test]
    fn events_land_on_their_own_counters() {
        let stats = ConnectionStats::default();

        stats.record_event(&MarketEvent::Heartbeat(Heartbeat {
            timestamp: Utc::now(),
        }));
        stats.record_event(&MarketEvent::Quote(QuoteUpdate::default()));
        stats.record_event(&MarketEvent::Quote(QuoteUpdate::default()));

        let snap = stats.snapshot();
        assert_eq!(snap.heartbeats, 1);
        assert_eq!(snap.quotes, 2);
        assert_eq!(snap.charts, 0);
        assert_eq!(snap.timesales, 0);
        assert_eq!(snap.books, 0);
    }

    #[test]
    fn decode_errors_are_separate() {
        let stats = ConnectionStats::default();
        stats.record_frame();
        stats.record_decode_error();

        let snap = stats.snapshot();
        assert_eq!(snap.frames_received, 1);
        assert_eq!(snap.decode_errors, 1);
        assert_eq!(snap.quotes, 0);
    }
}
