//! Decoded Market Events
//!
//! Typed events produced by the field-schema decoder. These are the values
//! delivered to subscribers; wire-format details (positional keys, envelope
//! shapes) never leak past this boundary.
//!
//! Every wall-clock field is derived from a milliseconds-since-epoch numeric
//! wire value and carried as a UTC instant. No timezone conversion happens
//! at decode time.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

// =============================================================================
// Time Derivation
// =============================================================================

/// Convert a milliseconds-since-epoch value into a UTC instant.
///
/// Returns `None` for values outside chrono's representable range.
#[must_use]
pub fn instant_from_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

// =============================================================================
// Server Heartbeat
// =============================================================================

/// Server heartbeat carried in a `notify` envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    /// Server wall-clock time of the heartbeat.
    pub timestamp: DateTime<Utc>,
}

// =============================================================================
// Level-One Quote
// =============================================================================

/// Level-one quote update from the QUOTE feed.
///
/// Updates are sparse: the server only includes fields that changed, so any
/// numeric field may be at its zero value and any time or exchange field may
/// be absent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QuoteUpdate {
    /// Ticker symbol.
    pub symbol: String,
    /// Current best bid price.
    pub bid_price: Decimal,
    /// Current best ask price.
    pub ask_price: Decimal,
    /// Price of the last trade.
    pub last_price: Decimal,
    /// Size of the best bid.
    pub bid_size: i64,
    /// Size of the best ask.
    pub ask_size: i64,
    /// Exchange id posting the best ask (single-character code).
    pub ask_id: Option<char>,
    /// Exchange id posting the best bid (single-character code).
    pub bid_id: Option<char>,
    /// Cumulative volume for the day.
    pub total_volume: i64,
    /// Size of the last trade.
    pub last_size: i64,
    /// Time of the last trade.
    pub trade_time: Option<DateTime<Utc>>,
    /// Time of the last quote.
    pub quote_time: Option<DateTime<Utc>>,
    /// Day's high price.
    pub high_price: Decimal,
    /// Day's low price.
    pub low_price: Decimal,
    /// Bid tick direction (single-character code).
    pub bid_tick: Option<char>,
    /// Previous session close price.
    pub close_price: Decimal,
    /// Option-implied volatility.
    pub volatility: Decimal,
    /// Day's open price.
    pub open_price: Decimal,
}

// =============================================================================
// Chart Bars
// =============================================================================

/// OHLCV bar from the CHART_EQUITY or CHART_FUTURES feed.
///
/// Both feeds share this shape even though their positional wire layouts
/// differ; the schema decoder normalizes them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChartBar {
    /// Ticker symbol.
    pub symbol: String,
    /// Feed sequence number.
    pub sequence: i64,
    /// Open price.
    pub open: Decimal,
    /// High price.
    pub high: Decimal,
    /// Low price.
    pub low: Decimal,
    /// Close price.
    pub close: Decimal,
    /// Bar volume.
    pub volume: i64,
    /// Start of the bar period.
    pub bar_time: Option<DateTime<Utc>>,
    /// Day index within the chart window (equity feed only).
    pub day: Option<i64>,
}

// =============================================================================
// Time & Sales
// =============================================================================

/// Individual trade print from a TIMESALE_* feed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TimeSale {
    /// Ticker symbol.
    pub symbol: String,
    /// Feed sequence number.
    pub sequence: i64,
    /// Time of the trade.
    pub trade_time: Option<DateTime<Utc>>,
    /// Trade price.
    pub last_price: Decimal,
    /// Trade size.
    pub last_size: i64,
    /// Sequence number of the last trade.
    pub last_sequence: i64,
}

// =============================================================================
// Order Book
// =============================================================================

/// Origin of a book snapshot, derived from the *_BOOK service name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookSource {
    /// LISTED_BOOK (NYSE-listed venues).
    Listed,
    /// NASDAQ_BOOK.
    Nasdaq,
    /// OPTIONS_BOOK.
    Options,
}

/// A single aggregated price level in a book snapshot.
///
/// The wire also carries a market-maker count at level key "2"; it is
/// intentionally not modeled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BookLevel {
    /// Price of the level.
    pub price: Decimal,
    /// Aggregate size at the level.
    pub size: i64,
}

/// Aggregated order-book snapshot from a *_BOOK feed.
///
/// Level order is preserved exactly as received from the wire; no sorting
/// or coalescing is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookSnapshot {
    /// Ticker symbol.
    pub symbol: String,
    /// Which *_BOOK feed produced the snapshot.
    pub source: BookSource,
    /// Bid side, in wire order.
    pub bids: Vec<BookLevel>,
    /// Ask side, in wire order.
    pub asks: Vec<BookLevel>,
    /// Wall-clock time of the enclosing data block.
    pub timestamp: Option<DateTime<Utc>>,
}

// =============================================================================
// Event Union
// =============================================================================

/// Any decoded event delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketEvent {
    /// Server heartbeat.
    Heartbeat(Heartbeat),
    /// Level-one quote update.
    Quote(QuoteUpdate),
    /// OHLCV chart bar.
    Chart(ChartBar),
    /// Time & sales print.
    TimeSale(TimeSale),
    /// Order-book snapshot.
    Book(BookSnapshot),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instant_from_millis_is_exact() {
        let ts = instant_from_millis(1_620_306_966_752).unwrap();
        assert_eq!(ts.timestamp_millis(), 1_620_306_966_752);
    }

    #[test]
    fn instant_from_millis_small_offset() {
        // 33367 ms after the epoch, to the millisecond.
        let ts = instant_from_millis(33_367).unwrap();
        let epoch = Utc.timestamp_millis_opt(0).single().unwrap();
        assert_eq!(ts - epoch, chrono::Duration::milliseconds(33_367));
    }

    #[test]
    fn instant_from_millis_out_of_range() {
        assert!(instant_from_millis(i64::MAX).is_none());
    }

    #[test]
    fn quote_update_zero_values() {
        let quote = QuoteUpdate::default();
        assert_eq!(quote.bid_price, Decimal::ZERO);
        assert_eq!(quote.total_volume, 0);
        assert!(quote.trade_time.is_none());
        assert!(quote.ask_id.is_none());
    }
}
