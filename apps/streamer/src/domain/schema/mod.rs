//! Per-Service Field Schemas
//!
//! The wire format addresses most fields by small-integer string keys
//! (`"1"`, `"2"`, ...) whose meaning depends entirely on the service that
//! produced the block. This module owns the lookup tables mapping those
//! positional keys to typed event fields, keyed by the exact service string.
//!
//! Two keys are universal across services: `key` carries the symbol and
//! `seq` the sequence number.
//!
//! Decoding is tolerant by design: unknown keys are ignored, and a missing
//! key leaves the corresponding field at its zero value. Schema selection is
//! exact-match on the service name, never inferred from field count - the
//! CHART_EQUITY and CHART_FUTURES layouts reuse the same numeric slots with
//! different meanings.

use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::domain::events::{
    BookLevel, BookSnapshot, BookSource, ChartBar, MarketEvent, QuoteUpdate, TimeSale,
    instant_from_millis,
};

// =============================================================================
// Services
// =============================================================================

/// A streaming service (feed) with its own positional field schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    /// Administrative channel (login, logout, QoS).
    Admin,
    /// Level-one equity quotes.
    Quote,
    /// Minute bars for equities.
    ChartEquity,
    /// Minute bars for futures.
    ChartFutures,
    /// Time & sales for equities.
    TimesaleEquity,
    /// Time & sales for futures.
    TimesaleFutures,
    /// Time & sales for options.
    TimesaleOptions,
    /// Aggregated book for NYSE-listed symbols.
    ListedBook,
    /// Aggregated book for NASDAQ symbols.
    NasdaqBook,
    /// Aggregated book for options.
    OptionsBook,
}

impl Service {
    /// The service name as it appears on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Quote => "QUOTE",
            Self::ChartEquity => "CHART_EQUITY",
            Self::ChartFutures => "CHART_FUTURES",
            Self::TimesaleEquity => "TIMESALE_EQUITY",
            Self::TimesaleFutures => "TIMESALE_FUTURES",
            Self::TimesaleOptions => "TIMESALE_OPTIONS",
            Self::ListedBook => "LISTED_BOOK",
            Self::NasdaqBook => "NASDAQ_BOOK",
            Self::OptionsBook => "OPTIONS_BOOK",
        }
    }

    /// Resolve a wire service name to its schema, if one is known.
    #[must_use]
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "ADMIN" => Some(Self::Admin),
            "QUOTE" => Some(Self::Quote),
            "CHART_EQUITY" => Some(Self::ChartEquity),
            "CHART_FUTURES" => Some(Self::ChartFutures),
            "TIMESALE_EQUITY" => Some(Self::TimesaleEquity),
            "TIMESALE_FUTURES" => Some(Self::TimesaleFutures),
            "TIMESALE_OPTIONS" => Some(Self::TimesaleOptions),
            "LISTED_BOOK" => Some(Self::ListedBook),
            "NASDAQ_BOOK" => Some(Self::NasdaqBook),
            "OPTIONS_BOOK" => Some(Self::OptionsBook),
            _ => None,
        }
    }

    /// The positional field indices requested on SUBS for this feed.
    ///
    /// These are a superset of the indices the decoder consumes, so every
    /// subscribed field has a place to land.
    #[must_use]
    pub const fn subscription_fields(self) -> &'static str {
        match self {
            Self::Admin => "",
            Self::Quote => "0,1,2,3,4,5,8,9,10,11,12,13,14,15,24,28",
            Self::ChartEquity => "0,1,2,3,4,5,6,7,8",
            Self::ChartFutures => "0,1,2,3,4,5,6",
            Self::TimesaleEquity | Self::TimesaleFutures | Self::TimesaleOptions => "0,1,2,3,4",
            Self::ListedBook | Self::NasdaqBook | Self::OptionsBook => "0,1,2,3",
        }
    }

    /// The book source for *_BOOK services.
    #[must_use]
    pub const fn book_source(self) -> Option<BookSource> {
        match self {
            Self::ListedBook => Some(BookSource::Listed),
            Self::NasdaqBook => Some(BookSource::Nasdaq),
            Self::OptionsBook => Some(BookSource::Options),
            _ => None,
        }
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Content Decoding
// =============================================================================

/// Decode one content entry of a data block into a typed event.
///
/// `service` selects the schema; `block_millis` is the enclosing block's
/// wall-clock timestamp, used by variants that carry no time field of their
/// own. Returns `None` for services without a content schema (ADMIN).
#[must_use]
pub fn decode_content(
    service: Service,
    block_millis: Option<i64>,
    entry: &Map<String, Value>,
) -> Option<MarketEvent> {
    match service {
        Service::Admin => None,
        Service::Quote => Some(MarketEvent::Quote(decode_quote(entry))),
        Service::ChartEquity => Some(MarketEvent::Chart(decode_chart_equity(entry))),
        Service::ChartFutures => Some(MarketEvent::Chart(decode_chart_futures(entry))),
        Service::TimesaleEquity | Service::TimesaleFutures | Service::TimesaleOptions => {
            Some(MarketEvent::TimeSale(decode_timesale(entry)))
        }
        Service::ListedBook | Service::NasdaqBook | Service::OptionsBook => {
            // book_source is Some for every *_BOOK arm above
            let source = service.book_source()?;
            Some(MarketEvent::Book(decode_book(source, block_millis, entry)))
        }
    }
}

/// QUOTE schema: 1 bid, 2 ask, 3 last, 4 bid size, 5 ask size, 6 ask
/// exchange, 7 bid exchange, 8 total volume, 9 last size, 10 trade time,
/// 11 quote time, 12 high, 13 low, 14 bid tick, 15 close, 24 volatility,
/// 28 open.
fn decode_quote(entry: &Map<String, Value>) -> QuoteUpdate {
    QuoteUpdate {
        symbol: symbol_of(entry),
        bid_price: decimal_at(entry, "1"),
        ask_price: decimal_at(entry, "2"),
        last_price: decimal_at(entry, "3"),
        bid_size: int_at(entry, "4"),
        ask_size: int_at(entry, "5"),
        ask_id: char_at(entry, "6"),
        bid_id: char_at(entry, "7"),
        total_volume: int_at(entry, "8"),
        last_size: int_at(entry, "9"),
        trade_time: instant_at(entry, "10"),
        quote_time: instant_at(entry, "11"),
        high_price: decimal_at(entry, "12"),
        low_price: decimal_at(entry, "13"),
        bid_tick: char_at(entry, "14"),
        close_price: decimal_at(entry, "15"),
        volatility: decimal_at(entry, "24"),
        open_price: decimal_at(entry, "28"),
    }
}

/// CHART_EQUITY schema: 1 open, 2 high, 3 low, 4 close, 5 volume,
/// 6 sequence, 7 bar time, 8 day index.
fn decode_chart_equity(entry: &Map<String, Value>) -> ChartBar {
    ChartBar {
        symbol: symbol_of(entry),
        sequence: opt_int_at(entry, "6").unwrap_or_else(|| sequence_of(entry)),
        open: decimal_at(entry, "1"),
        high: decimal_at(entry, "2"),
        low: decimal_at(entry, "3"),
        close: decimal_at(entry, "4"),
        volume: int_at(entry, "5"),
        bar_time: instant_at(entry, "7"),
        day: opt_int_at(entry, "8"),
    }
}

/// CHART_FUTURES schema: 1 bar time, 2 open, 3 high, 4 low, 5 close,
/// 6 volume. Same numeric slots as equity, different meanings.
fn decode_chart_futures(entry: &Map<String, Value>) -> ChartBar {
    ChartBar {
        symbol: symbol_of(entry),
        sequence: sequence_of(entry),
        open: decimal_at(entry, "2"),
        high: decimal_at(entry, "3"),
        low: decimal_at(entry, "4"),
        close: decimal_at(entry, "5"),
        volume: int_at(entry, "6"),
        bar_time: instant_at(entry, "1"),
        day: None,
    }
}

/// TIMESALE_* schema: 1 trade time, 2 last price, 3 last size,
/// 4 last sequence.
fn decode_timesale(entry: &Map<String, Value>) -> TimeSale {
    TimeSale {
        symbol: symbol_of(entry),
        sequence: sequence_of(entry),
        trade_time: instant_at(entry, "1"),
        last_price: decimal_at(entry, "2"),
        last_size: int_at(entry, "3"),
        last_sequence: int_at(entry, "4"),
    }
}

/// *_BOOK schema: 2 bid levels, 3 ask levels. Each level object carries
/// 0 price and 1 aggregate size; the market-maker count at 2 is dropped.
fn decode_book(
    source: BookSource,
    block_millis: Option<i64>,
    entry: &Map<String, Value>,
) -> BookSnapshot {
    BookSnapshot {
        symbol: symbol_of(entry),
        source,
        bids: levels_at(entry, "2"),
        asks: levels_at(entry, "3"),
        timestamp: block_millis.and_then(instant_from_millis),
    }
}

fn levels_at(entry: &Map<String, Value>, key: &str) -> Vec<BookLevel> {
    let Some(Value::Array(raw)) = entry.get(key) else {
        return Vec::new();
    };
    raw.iter()
        .filter_map(Value::as_object)
        .map(|level| BookLevel {
            price: decimal_at(level, "0"),
            size: int_at(level, "1"),
        })
        .collect()
}

// =============================================================================
// Value Coercion
// =============================================================================
//
// The wire is loose about scalar types: numbers arrive as JSON numbers or
// as decimal strings depending on the field and the server build. Every
// accessor below accepts both.

fn symbol_of(entry: &Map<String, Value>) -> String {
    entry
        .get("key")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn sequence_of(entry: &Map<String, Value>) -> i64 {
    int_at(entry, "seq")
}

fn decimal_at(entry: &Map<String, Value>, key: &str) -> Decimal {
    entry.get(key).and_then(as_decimal).unwrap_or_default()
}

fn int_at(entry: &Map<String, Value>, key: &str) -> i64 {
    opt_int_at(entry, key).unwrap_or_default()
}

fn opt_int_at(entry: &Map<String, Value>, key: &str) -> Option<i64> {
    entry.get(key).and_then(as_i64)
}

fn char_at(entry: &Map<String, Value>, key: &str) -> Option<char> {
    entry
        .get(key)
        .and_then(Value::as_str)
        .and_then(|s| s.chars().next())
}

fn instant_at(entry: &Map<String, Value>, key: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    entry.get(key).and_then(as_i64).and_then(instant_from_millis)
}

fn as_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Decimal::from(i))
            } else {
                n.as_f64().and_then(|f| Decimal::try_from(f).ok())
            }
        }
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// =============================================================================
// Tests
// =============================================================================
