//! Streaming Protocol Adapter
//!
//! WebSocket client for the vendor streaming service:
//!
//! - `login`: LOGIN credential query-string encoding
//! - `envelope`: outbound request envelopes and inbound envelope decoding
//! - `connection`: socket ownership, state machine, receive loop, send path
//! - `facade`: the public per-feed subscribe/unsubscribe/QoS operations
//! - `stats`: per-feed counters maintained by the receive loop

pub mod connection;
pub mod envelope;
pub mod facade;
pub mod login;
pub mod stats;

pub use connection::{ConnectionState, StreamerClient, StreamerError};
pub use envelope::QosLevel;
