//! Wire Envelope Codec
//!
//! Builds outbound request envelopes and decodes inbound envelopes.
//!
//! # Outbound
//!
//! Every frame sent to the server is a JSON envelope wrapping one or more
//! requests:
//!
//! ```json
//! {"requests":[{"service":"QUOTE","command":"SUBS","requestid":3,
//!               "account":"123456789","source":"TICKTAPE",
//!               "parameters":{"keys":"AAPL,MSFT","fields":"0,1,2,3"}}]}
//! ```
//!
//! Multiple requests per envelope are structurally supported; this client
//! issues one per call.
//!
//! # Inbound
//!
//! The server sends either a `notify` array (heartbeats) or a `data` array
//! of per-service blocks whose `content` entries are decoded through the
//! per-service field schemas:
//!
//! ```json
//! {"notify":[{"heartbeat":"1620306966752"}]}
//! {"data":[{"service":"QUOTE","timestamp":1620306966752,"command":"SUBS",
//!           "content":[{"key":"QQQ","2":328.75}]}]}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::application::ports::SessionParameters;
use crate::domain::events::{Heartbeat, MarketEvent, instant_from_millis};
use crate::domain::schema::{self, Service};

use super::login;

// =============================================================================
// Errors
// =============================================================================

/// Codec errors for the streaming wire format.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// The envelope carried neither a `notify` nor a `data` array.
    #[error("unexpected envelope shape: {0}")]
    UnexpectedShape(&'static str),

    /// A heartbeat notify carried a non-numeric timestamp.
    #[error("malformed heartbeat timestamp: {0:?}")]
    MalformedHeartbeat(String),
}

// =============================================================================
// Outbound Requests
// =============================================================================

/// Commands accepted by the streaming server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Command {
    /// Authenticate the socket.
    Login,
    /// Terminate the session.
    Logout,
    /// Subscribe symbols on a feed.
    Subs,
    /// Withdraw symbols from a feed.
    Unsubs,
    /// Change the update-rate tier.
    Qos,
}

/// Server-configurable update-rate tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QosLevel {
    /// 500 ms updates.
    Express,
    /// 750 ms updates.
    RealTime,
    /// 1000 ms updates (server default).
    #[default]
    Fast,
    /// 1500 ms updates.
    Moderate,
    /// 3000 ms updates.
    Slow,
    /// 5000 ms updates.
    Delayed,
}

impl QosLevel {
    /// The integer level sent on the wire.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        match self {
            Self::Express => 0,
            Self::RealTime => 1,
            Self::Fast => 2,
            Self::Moderate => 3,
            Self::Slow => 4,
            Self::Delayed => 5,
        }
    }

    /// Parse a wire level back into a tier.
    #[must_use]
    pub const fn from_i64(level: i64) -> Option<Self> {
        match level {
            0 => Some(Self::Express),
            1 => Some(Self::RealTime),
            2 => Some(Self::Fast),
            3 => Some(Self::Moderate),
            4 => Some(Self::Slow),
            5 => Some(Self::Delayed),
            _ => None,
        }
    }
}

/// One request within an outbound envelope.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// Target service name.
    pub service: &'static str,
    /// Command verb.
    pub command: Command,
    /// Client-side correlation id, strictly increasing per connection
    /// manager instance.
    pub requestid: u64,
    /// Account the request acts on behalf of.
    pub account: String,
    /// Source/application id of the client.
    pub source: String,
    /// Command-specific parameter bag.
    pub parameters: serde_json::Map<String, Value>,
}

/// Outbound envelope wrapping one or more requests.
#[derive(Debug, Clone, Serialize)]
pub struct RequestEnvelope {
    /// Ordered request sequence.
    pub requests: Vec<Request>,
}

impl RequestEnvelope {
    /// Wrap a single request.
    #[must_use]
    pub fn single(request: Request) -> Self {
        Self {
            requests: vec![request],
        }
    }

    /// Serialize the envelope to its wire form.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn to_json(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string(self)?)
    }
}

fn request(
    service: Service,
    command: Command,
    request_id: u64,
    session: &SessionParameters,
    parameters: serde_json::Map<String, Value>,
) -> Request {
    Request {
        service: service.as_str(),
        command,
        requestid: request_id,
        account: session.account_id.clone(),
        source: session.app_id.clone(),
        parameters,
    }
}

/// Build the ADMIN LOGIN request.
#[must_use]
pub fn login_request(session: &SessionParameters, request_id: u64) -> Request {
    let mut parameters = serde_json::Map::new();
    parameters.insert(
        "credential".to_string(),
        Value::String(login::credential_query(session)),
    );
    parameters.insert("token".to_string(), Value::String(session.token.clone()));
    parameters.insert(
        "version".to_string(),
        Value::String(login::PROTOCOL_VERSION.to_string()),
    );
    request(Service::Admin, Command::Login, request_id, session, parameters)
}

/// Build the ADMIN LOGOUT request.
#[must_use]
pub fn logout_request(session: &SessionParameters, request_id: u64) -> Request {
    request(
        Service::Admin,
        Command::Logout,
        request_id,
        session,
        serde_json::Map::new(),
    )
}

/// Build a SUBS request for `symbols` (comma-joined) on `service`.
///
/// The requested field list is the feed's fixed superset of the decoder's
/// schema indices.
#[must_use]
pub fn subscribe_request(
    service: Service,
    symbols: &str,
    session: &SessionParameters,
    request_id: u64,
) -> Request {
    let mut parameters = serde_json::Map::new();
    parameters.insert("keys".to_string(), Value::String(symbols.to_string()));
    parameters.insert(
        "fields".to_string(),
        Value::String(service.subscription_fields().to_string()),
    );
    request(service, Command::Subs, request_id, session, parameters)
}

/// Build an UNSUBS request for `symbols` (comma-joined) on `service`.
#[must_use]
pub fn unsubscribe_request(
    service: Service,
    symbols: &str,
    session: &SessionParameters,
    request_id: u64,
) -> Request {
    let mut parameters = serde_json::Map::new();
    parameters.insert("keys".to_string(), Value::String(symbols.to_string()));
    request(service, Command::Unsubs, request_id, session, parameters)
}

/// Build the ADMIN QOS request.
#[must_use]
pub fn qos_request(level: QosLevel, session: &SessionParameters, request_id: u64) -> Request {
    let mut parameters = serde_json::Map::new();
    parameters.insert(
        "qoslevel".to_string(),
        Value::Number(level.as_i64().into()),
    );
    request(Service::Admin, Command::Qos, request_id, session, parameters)
}

// =============================================================================
// Inbound Envelopes
// =============================================================================

#[derive(Debug, Deserialize)]
struct InboundEnvelope {
    #[serde(default)]
    notify: Option<Vec<NotifyBlock>>,
    #[serde(default)]
    data: Option<Vec<DataBlock>>,
}

#[derive(Debug, Deserialize)]
struct NotifyBlock {
    #[serde(default)]
    heartbeat: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DataBlock {
    service: String,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    #[allow(dead_code)]
    command: Option<String>,
    #[serde(default)]
    content: Vec<serde_json::Map<String, Value>>,
}

/// Decode one inbound text frame into typed events.
///
/// A `notify` envelope yields at most one heartbeat and is never combined
/// with `data`. A `data` envelope yields one event per decodable content
/// entry; blocks with no content (subscription acknowledgements) and blocks
/// for unknown services are skipped.
///
/// # Errors
///
/// Returns an error for malformed JSON, for an envelope carrying neither
/// `notify` nor `data`, and for a non-numeric heartbeat timestamp.
pub fn decode_envelope(text: &str) -> Result<Vec<MarketEvent>, CodecError> {
    let envelope: InboundEnvelope = serde_json::from_str(text)?;

    if let Some(notify) = envelope.notify {
        // Element 0 carries the sole heartbeat; heartbeat envelopes never
        // carry a data array as well.
        let Some(raw) = notify.first().and_then(|block| block.heartbeat.as_deref()) else {
            return Ok(Vec::new());
        };
        let millis: i64 = raw
            .trim()
            .parse()
            .map_err(|_| CodecError::MalformedHeartbeat(raw.to_string()))?;
        let Some(timestamp) = instant_from_millis(millis) else {
            return Err(CodecError::MalformedHeartbeat(raw.to_string()));
        };
        return Ok(vec![MarketEvent::Heartbeat(Heartbeat { timestamp })]);
    }

    let Some(blocks) = envelope.data else {
        return Err(CodecError::UnexpectedShape(
            "envelope has neither notify nor data",
        ));
    };

    let mut events = Vec::new();
    for block in blocks {
        let Some(service) = Service::from_wire(&block.service) else {
            tracing::debug!(service = %block.service, "skipping block for unknown service");
            continue;
        };
        for entry in &block.content {
            if let Some(event) = schema::decode_content(service, block.timestamp, entry) {
                events.push(event);
            }
        }
    }
    Ok(events)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    fn session() -> SessionParameters {
        SessionParameters {
            streamer_host: "streamer.example.com".to_string(),
            token: "tok".to_string(),
            token_timestamp: Utc.timestamp_millis_opt(1_620_306_000_000).single().unwrap(),
            user_group: "ACCT".to_string(),
            access_level: "ACCT".to_string(),
            app_id: "TICKTAPE".to_string(),
            acl: "AKQTT".to_string(),
            account_id: "123456789".to_string(),
            account_cd_domain_id: "A000000012345678".to_string(),
            company: "AMER".to_string(),
            segment: "ADVNCED".to_string(),
        }
    }

    #[test]
    fn login_envelope_shape() {
        let envelope = RequestEnvelope::single(login_request(&session(), 1));
        let json = envelope.to_json().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();

        let req = &value["requests"][0];
        assert_eq!(req["service"], "ADMIN");
        assert_eq!(req["command"], "LOGIN");
        assert_eq!(req["requestid"], 1);
        assert_eq!(req["account"], "123456789");
        assert_eq!(req["source"], "TICKTAPE");
        assert_eq!(req["parameters"]["version"], "1.0");
        assert_eq!(req["parameters"]["token"], "tok");
        let credential = req["parameters"]["credential"].as_str().unwrap();
        assert!(credential.starts_with("userid=123456789"));
        assert!(credential.ends_with("authorized=Y"));
    }

    #[test]
    fn subscribe_carries_keys_and_fields() {
        let req = subscribe_request(Service::Quote, "AAPL,MSFT", &session(), 7);
        let value = serde_json::to_value(&req).unwrap();

        assert_eq!(value["service"], "QUOTE");
        assert_eq!(value["command"], "SUBS");
        assert_eq!(value["parameters"]["keys"], "AAPL,MSFT");
        assert_eq!(
            value["parameters"]["fields"],
            "0,1,2,3,4,5,8,9,10,11,12,13,14,15,24,28"
        );
    }

    #[test]
    fn unsubscribe_carries_keys_only() {
        let req = unsubscribe_request(Service::NasdaqBook, "QQQ", &session(), 9);
        let value = serde_json::to_value(&req).unwrap();

        assert_eq!(value["service"], "NASDAQ_BOOK");
        assert_eq!(value["command"], "UNSUBS");
        assert_eq!(value["parameters"]["keys"], "QQQ");
        assert!(value["parameters"].get("fields").is_none());
    }

    #[test]
    fn qos_carries_integer_level() {
        let req = qos_request(QosLevel::Express, &session(), 4);
        let value = serde_json::to_value(&req).unwrap();

        assert_eq!(value["service"], "ADMIN");
        assert_eq!(value["command"], "QOS");
        assert_eq!(value["parameters"]["qoslevel"], 0);
    }

    #[test]
    fn qos_levels_round_trip() {
        for level in [
            QosLevel::Express,
            QosLevel::RealTime,
            QosLevel::Fast,
            QosLevel::Moderate,
            QosLevel::Slow,
            QosLevel::Delayed,
        ] {
            assert_eq!(QosLevel::from_i64(level.as_i64()), Some(level));
        }
        assert_eq!(QosLevel::from_i64(6), None);
    }

    #[test]
    fn heartbeat_envelope_decodes_single_event() {
        let events = decode_envelope(r#"{"notify":[{"heartbeat":"1620306966752"}]}"#).unwrap();

        assert_eq!(events.len(), 1);
        let MarketEvent::Heartbeat(hb) = &events[0] else {
            panic!("expected heartbeat");
        };
        assert_eq!(hb.timestamp.timestamp_millis(), 1_620_306_966_752);
    }

    #[test]
    fn heartbeat_with_junk_timestamp_is_an_error() {
        let err = decode_envelope(r#"{"notify":[{"heartbeat":"soon"}]}"#).unwrap_err();
        assert!(matches!(err, CodecError::MalformedHeartbeat(_)));
    }

    #[test]
    fn notify_without_heartbeat_yields_nothing() {
        let events = decode_envelope(r#"{"notify":[{}]}"#).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn data_envelope_decodes_per_service() {
        let text = r#"{"data":[
            {"service":"QUOTE","timestamp":1620306966752,"command":"SUBS",
             "content":[{"key":"QQQ","2":328.75},{"key":"SPY","1":417.5}]},
            {"service":"TIMESALE_EQUITY","timestamp":1620306966752,"command":"SUBS",
             "content":[{"key":"AAPL","seq":1,"1":1620306966001,"2":127.31,"3":100,"4":42}]}
        ]}"#;
        let events = decode_envelope(text).unwrap();

        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], MarketEvent::Quote(q) if q.symbol == "QQQ"));
        assert!(matches!(&events[1], MarketEvent::Quote(q) if q.symbol == "SPY"));
        assert!(matches!(&events[2], MarketEvent::TimeSale(t) if t.symbol == "AAPL"));
    }

    #[test]
    fn chart_futures_block_uses_futures_schema() {
        // Field 1 must land in bar_time, not open, even though the entry
        // has the same field count as an equity bar.
        let text = r#"{"data":[{"service":"CHART_FUTURES","timestamp":1620306966752,
            "command":"SUBS","content":[
            {"key":"/ES","seq":1,"1":1620306960000,"2":4180.25,"3":4181.0,"4":4179.5,"5":4180.75,"6":900}]}]}"#;
        let events = decode_envelope(text).unwrap();

        let MarketEvent::Chart(bar) = &events[0] else {
            panic!("expected chart");
        };
        assert_eq!(bar.bar_time.unwrap().timestamp_millis(), 1_620_306_960_000);
        assert_eq!(bar.open, Decimal::new(418_025, 2));
    }

    #[test]
    fn empty_content_block_is_skipped() {
        // Subscription acknowledgements arrive as data blocks with no
        // content.
        let text = r#"{"data":[{"service":"QUOTE","timestamp":1620306966752,"command":"SUBS"}]}"#;
        let events = decode_envelope(text).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn unknown_service_block_is_skipped() {
        let text = r#"{"data":[
            {"service":"LEVELONE_FOREX","timestamp":1,"command":"SUBS","content":[{"key":"EUR/USD"}]},
            {"service":"QUOTE","timestamp":1,"command":"SUBS","content":[{"key":"F"}]}
        ]}"#;
        let events = decode_envelope(text).unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn envelope_without_notify_or_data_is_an_error() {
        let err = decode_envelope(r#"{"response":[{"service":"ADMIN"}]}"#).unwrap_err();
        assert!(matches!(err, CodecError::UnexpectedShape(_)));
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            decode_envelope("{not json"),
            Err(CodecError::Json(_))
        ));
    }

    proptest! {
        // Arbitrary input must never panic the decoder; it either decodes
        // or reports an error.
        #[test]
        fn decode_never_panics(text in "[ -~]{0,64}") {
            let _ = decode_envelope(&text);
        }
    }
}
