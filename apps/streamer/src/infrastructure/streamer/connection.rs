//! Connection Lifecycle Manager
//!
//! Owns the streaming socket and drives the connection state machine:
//!
//! ```text
//! Disconnected -> Connecting -> LoggingIn -> Open -> Closing -> Closed
//!       ^                                                          |
//!       +---------------------- (re-Connect) ----------------------+
//! any non-terminal state -> Faulted on unrecoverable transport error
//! ```
//!
//! Exactly one receive loop runs per connection; the transport layer
//! reassembles fragments, so every frame handed to the codec is a complete
//! logical message. All outbound frames funnel through a single queued
//! writer task, so concurrent subscription calls never interleave partial
//! frames; a per-client send gate additionally guarantees that request ids
//! hit the wire in issue order.
//!
//! Login is fire-and-forget: the client enters Open as soon as the LOGIN
//! frame is queued and does not wait for an acknowledgment before accepting
//! subscription calls. The server does not gate data on an ack either; this
//! mirrors the vendor protocol as observed and is a known gap rather than
//! an oversight.
//!
//! There is no reconnect policy here. A dropped connection lands in
//! Faulted/Closed and stays there until the caller issues a fresh
//! `connect()`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::application::ports::{SessionParameters, SessionProvider};
use crate::infrastructure::config::StreamerSettings;
use crate::infrastructure::hub::{ErrorEvent, EventHub};

use super::envelope::{self, CodecError, Request, RequestEnvelope};
use super::stats::{ConnectionStats, StatsSnapshot};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

// =============================================================================
// Connection State
// =============================================================================

/// Lifecycle state of a streaming connection.
///
/// Owned exclusively by the connection manager; observers read it through
/// [`StreamerClient::state`] or the hub's state channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection attempt has been made.
    #[default]
    Disconnected,
    /// Transport handshake in progress.
    Connecting,
    /// Socket open, LOGIN queued but connection not yet usable.
    LoggingIn,
    /// Authenticated socket accepting subscription calls.
    Open,
    /// Graceful shutdown in progress.
    Closing,
    /// Connection ended cleanly.
    Closed,
    /// Connection torn down by an unrecoverable error.
    Faulted,
}

impl ConnectionState {
    /// Whether a fresh `connect()` is allowed from this state.
    #[must_use]
    pub const fn can_connect(self) -> bool {
        matches!(self, Self::Disconnected | Self::Closed | Self::Faulted)
    }

    /// Whether the connection has reached a terminal state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Faulted)
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Errors surfaced by the streaming client.
#[derive(Debug, thiserror::Error)]
pub enum StreamerError {
    /// The session provider had no valid session; the socket was never
    /// touched.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// `connect()` was called while a connection is being established or
    /// already open.
    #[error("connect called while connection is active")]
    AlreadyConnecting,

    /// A request was issued without an open socket.
    #[error("not connected")]
    NotConnected,

    /// Session parameters never resolved an account to act on.
    #[error("no active account")]
    NoActiveAccount,

    /// Envelope encoding failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Socket-level failure.
    #[error("transport fault: {0}")]
    Transport(String),
}

// =============================================================================
// Streamer Client
// =============================================================================

/// Streaming client: connection lifecycle plus the subscription façade
/// (see the `facade` module for the per-feed operations).
pub struct StreamerClient {
    settings: StreamerSettings,
    provider: Arc<dyn SessionProvider>,
    hub: Arc<EventHub>,
    stats: ConnectionStats,
    state: parking_lot::RwLock<ConnectionState>,
    session: parking_lot::RwLock<Option<SessionParameters>>,
    request_id: AtomicU64,
    outbound: parking_lot::RwLock<Option<mpsc::Sender<Message>>>,
    send_gate: tokio::sync::Mutex<()>,
    cancel: parking_lot::RwLock<CancellationToken>,
    reader_task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    writer_task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl StreamerClient {
    /// Create a client. No connection is attempted until [`Self::connect`].
    #[must_use]
    pub fn new(
        settings: StreamerSettings,
        provider: Arc<dyn SessionProvider>,
        hub: Arc<EventHub>,
    ) -> Self {
        Self {
            settings,
            provider,
            hub,
            stats: ConnectionStats::default(),
            state: parking_lot::RwLock::new(ConnectionState::Disconnected),
            session: parking_lot::RwLock::new(None),
            request_id: AtomicU64::new(0),
            outbound: parking_lot::RwLock::new(None),
            send_gate: tokio::sync::Mutex::new(()),
            cancel: parking_lot::RwLock::new(CancellationToken::new()),
            reader_task: tokio::sync::Mutex::new(None),
            writer_task: tokio::sync::Mutex::new(None),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Snapshot of the per-feed counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// The event hub this client publishes to.
    #[must_use]
    pub fn hub(&self) -> &Arc<EventHub> {
        &self.hub
    }

    // =========================================================================
    // Connect / Disconnect
    // =========================================================================

    /// Establish the streaming connection and authenticate the socket.
    ///
    /// Fetches session parameters from the provider, performs the transport
    /// handshake, queues the LOGIN frame and starts the receive loop. The
    /// LOGIN is not acknowledged before this returns; subscription calls
    /// are accepted immediately after.
    ///
    /// # Errors
    ///
    /// - [`StreamerError::AlreadyConnecting`] if called while a connection
    ///   is being established or open (no state change, socket untouched).
    /// - [`StreamerError::NotAuthorized`] if the provider has no valid
    ///   session (socket untouched, state returns to Disconnected).
    /// - [`StreamerError::Transport`] if the handshake fails (state moves
    ///   to Faulted).
    pub async fn connect(self: &Arc<Self>) -> Result<(), StreamerError> {
        self.begin_connecting()?;

        let session = match self.provider.session_parameters().await {
            Ok(session) => session,
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                return Err(StreamerError::NotAuthorized(e.to_string()));
            }
        };

        let url = session.socket_url();
        tracing::info!(url = %url, account = %session.account_id, "connecting to streamer");

        let (ws_stream, _response) = match tokio_tungstenite::connect_async(&url).await {
            Ok(pair) => pair,
            Err(e) => {
                self.set_state(ConnectionState::Faulted);
                self.hub.send_error(ErrorEvent {
                    context: "connect",
                    message: e.to_string(),
                    fatal: true,
                });
                return Err(StreamerError::Transport(e.to_string()));
            }
        };

        let (sink, source) = ws_stream.split();

        let cancel = CancellationToken::new();
        *self.cancel.write() = cancel.clone();
        *self.session.write() = Some(session.clone());

        let (outbound_tx, outbound_rx) = mpsc::channel(self.settings.outbound_queue);
        *self.outbound.write() = Some(outbound_tx.clone());

        let writer = tokio::spawn(Self::run_writer(Arc::clone(self), sink, outbound_rx));
        *self.writer_task.lock().await = Some(writer);

        self.set_state(ConnectionState::LoggingIn);

        let login_id = self.next_request_id();
        let login = RequestEnvelope::single(envelope::login_request(&session, login_id));
        let json = login.to_json()?;
        if outbound_tx.send(Message::Text(json.into())).await.is_err() {
            self.fault("login", "writer task unavailable");
            return Err(StreamerError::Transport("writer task unavailable".to_string()));
        }
        tracing::debug!(requestid = login_id, "login queued");

        // The receive loop starts precisely on entering Open; no data frame
        // precedes the LOGIN because the writer drains the queue in order.
        self.set_state(ConnectionState::Open);

        let reader = tokio::spawn(Self::run_reader(Arc::clone(self), source, cancel));
        *self.reader_task.lock().await = Some(reader);

        Ok(())
    }

    /// Gracefully close the connection.
    ///
    /// Sends a best-effort LOGOUT, closes the socket, and waits a bounded
    /// interval for the close handshake before force-disposing the tasks.
    /// Calling this on an already-closed (or never-connected) client is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Currently infallible; the signature leaves room for surfacing close
    /// handshake failures.
    pub async fn disconnect(&self) -> Result<(), StreamerError> {
        {
            let mut state = self.state.write();
            match *state {
                ConnectionState::Disconnected
                | ConnectionState::Closed
                | ConnectionState::Faulted => return Ok(()),
                _ => *state = ConnectionState::Closing,
            }
        }
        self.hub.send_state(ConnectionState::Closing);
        tracing::info!("disconnecting from streamer");

        // Best-effort logout before the close frame; failures here must not
        // prevent the socket from being disposed.
        let session = { self.session.read().clone() };
        if let Some(session) = session {
            let id = self.next_request_id();
            let logout = RequestEnvelope::single(envelope::logout_request(&session, id));
            if let Ok(json) = logout.to_json() {
                let _ = self.enqueue(Message::Text(json.into())).await;
            }
        }
        let _ = self.enqueue(Message::Close(None)).await;

        // Bounded wait for the reader to observe the close handshake.
        let reader = self.reader_task.lock().await.take();
        if let Some(handle) = reader
            && tokio::time::timeout(self.settings.close_timeout, handle)
                .await
                .is_err()
        {
            tracing::warn!("close handshake timed out, forcing shutdown");
        }
        self.cancel.read().cancel();
        *self.outbound.write() = None;

        if let Some(handle) = self.writer_task.lock().await.take() {
            let _ = tokio::time::timeout(self.settings.close_timeout, handle).await;
        }

        self.finish_closed("disconnect");
        *self.session.write() = None;
        Ok(())
    }

    // =========================================================================
    // Request Issue Path
    // =========================================================================

    /// Issue one request through the serialized send path.
    ///
    /// The send gate makes id allocation and enqueueing atomic, so request
    /// ids are strictly increasing in wire order across concurrent callers.
    pub(crate) async fn issue_request<F>(&self, build: F) -> Result<u64, StreamerError>
    where
        F: FnOnce(&SessionParameters, u64) -> Request,
    {
        if self.state() != ConnectionState::Open {
            return Err(StreamerError::NotConnected);
        }
        let session = { self.session.read().clone() }.ok_or(StreamerError::NoActiveAccount)?;
        if !session.has_account() {
            return Err(StreamerError::NoActiveAccount);
        }

        let _gate = self.send_gate.lock().await;
        let id = self.next_request_id();
        let json = RequestEnvelope::single(build(&session, id)).to_json()?;
        self.enqueue(Message::Text(json.into())).await?;
        Ok(id)
    }

    fn next_request_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn enqueue(&self, message: Message) -> Result<(), StreamerError> {
        let tx = { self.outbound.read().clone() };
        let Some(tx) = tx else {
            return Err(StreamerError::NotConnected);
        };
        tx.send(message)
            .await
            .map_err(|_| StreamerError::NotConnected)
    }

    // =========================================================================
    // Background Tasks
    // =========================================================================

    /// Drain the outbound queue into the socket, one frame at a time.
    async fn run_writer(client: Arc<Self>, mut sink: WsSink, mut rx: mpsc::Receiver<Message>) {
        while let Some(message) = rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if let Err(e) = sink.send(message).await {
                client.fault("send", &e.to_string());
                break;
            }
            if closing {
                break;
            }
        }
        let _ = sink.close().await;
        tracing::debug!("writer task finished");
    }

    /// The single receive loop for this connection.
    async fn run_reader(client: Arc<Self>, mut source: WsSource, cancel: CancellationToken) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                frame = source.next() => match frame {
                    Some(Ok(Message::Text(text))) => client.handle_frame(text.as_str()),
                    Some(Ok(Message::Ping(payload))) => {
                        let tx = { client.outbound.read().clone() };
                        if let Some(tx) = tx {
                            let _ = tx.try_send(Message::Pong(payload));
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        // Remote-initiated close is a clean shutdown, not a
                        // fault.
                        client.finish_closed("server close frame");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        client.fault("receive", &e.to_string());
                        break;
                    }
                    None => {
                        client.finish_closed("socket stream ended");
                        break;
                    }
                }
            }
        }
        tracing::debug!("reader task finished");
    }

    /// Decode one inbound frame and fan its events out.
    fn handle_frame(&self, text: &str) {
        self.stats.record_frame();
        match envelope::decode_envelope(text) {
            Ok(events) => {
                for event in events {
                    self.stats.record_event(&event);
                    self.hub.dispatch(event);
                }
            }
            Err(e) => {
                // A single malformed message is reported without faulting:
                // one bad feed update must not take down heartbeats or the
                // other feeds.
                self.stats.record_decode_error();
                tracing::warn!(error = %e, "failed to decode inbound envelope");
                self.hub.send_error(ErrorEvent {
                    context: "decode",
                    message: e.to_string(),
                    fatal: false,
                });
            }
        }
    }

    // =========================================================================
    // State Transitions
    // =========================================================================

    fn begin_connecting(&self) -> Result<(), StreamerError> {
        {
            let mut state = self.state.write();
            if !state.can_connect() {
                return Err(StreamerError::AlreadyConnecting);
            }
            *state = ConnectionState::Connecting;
        }
        self.hub.send_state(ConnectionState::Connecting);
        Ok(())
    }

    fn set_state(&self, next: ConnectionState) {
        {
            let mut state = self.state.write();
            tracing::debug!(from = ?*state, to = ?next, "connection state change");
            *state = next;
        }
        self.hub.send_state(next);
    }

    /// Tear the connection down after an unrecoverable transport error.
    fn fault(&self, context: &'static str, message: &str) {
        {
            let mut state = self.state.write();
            if state.is_terminal() {
                return;
            }
            *state = ConnectionState::Faulted;
        }
        tracing::error!(context, message, "connection faulted");
        self.hub.send_state(ConnectionState::Faulted);
        self.hub.send_error(ErrorEvent {
            context,
            message: message.to_string(),
            fatal: true,
        });
        self.cancel.read().cancel();
        *self.outbound.write() = None;
    }

    /// Mark the connection cleanly closed.
    fn finish_closed(&self, reason: &str) {
        {
            let mut state = self.state.write();
            if state.is_terminal() {
                return;
            }
            *state = ConnectionState::Closed;
        }
        tracing::info!(reason, "connection closed");
        *self.outbound.write() = None;
        self.hub.send_state(ConnectionState::Closed);
    }
}

impl std::fmt::Debug for StreamerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamerClient")
            .field("state", &self.state())
            .field("requests_issued", &self.request_id.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{MockSessionProvider, SessionError, StaticSessionProvider};
    use chrono::{TimeZone, Utc};

    fn params(host: &str) -> SessionParameters {
        SessionParameters {
            streamer_host: host.to_string(),
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

    fn client_with_provider(provider: Arc<dyn SessionProvider>) -> Arc<StreamerClient> {
        Arc::new(StreamerClient::new(
            StreamerSettings::default(),
            provider,
            Arc::new(EventHub::default()),
        ))
    }

    #[tokio::test]
    async fn connect_without_session_is_not_authorized() {
        let mut provider = MockSessionProvider::new();
        provider
            .expect_session_parameters()
            .returning(|| Err(SessionError("token expired".to_string())));

        let client = client_with_provider(Arc::new(provider));
        let err = client.connect().await.unwrap_err();

        assert!(matches!(err, StreamerError::NotAuthorized(_)));
        // The socket was never touched; a retry stays possible.
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn connect_handshake_failure_faults() {
        // Nothing listens on port 9; the handshake must fail fast.
        let provider = StaticSessionProvider::new(params("ws://127.0.0.1:9/ws"));
        let client = client_with_provider(Arc::new(provider));

        let err = client.connect().await.unwrap_err();
        assert!(matches!(err, StreamerError::Transport(_)));
        assert_eq!(client.state(), ConnectionState::Faulted);
    }

    #[tokio::test]
    async fn subscribe_before_connect_sends_nothing() {
        let provider = StaticSessionProvider::new(params("streamer.example.com"));
        let client = client_with_provider(Arc::new(provider));

        let err = client
            .issue_request(|session, id| envelope::logout_request(session, id))
            .await
            .unwrap_err();

        assert!(matches!(err, StreamerError::NotConnected));
        assert_eq!(client.stats().frames_received, 0);
    }

    #[tokio::test]
    async fn disconnect_before_connect_is_a_noop() {
        let provider = StaticSessionProvider::new(params("streamer.example.com"));
        let client = client_with_provider(Arc::new(provider));

        client.disconnect().await.unwrap();
        client.disconnect().await.unwrap();
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn request_ids_start_at_one_and_increase() {
        let provider = StaticSessionProvider::new(params("streamer.example.com"));
        let client = client_with_provider(Arc::new(provider));

        assert_eq!(client.next_request_id(), 1);
        assert_eq!(client.next_request_id(), 2);
        assert_eq!(client.next_request_id(), 3);
    }

    #[test]
    fn can_connect_only_from_idle_states() {
        assert!(ConnectionState::Disconnected.can_connect());
        assert!(ConnectionState::Closed.can_connect());
        assert!(ConnectionState::Faulted.can_connect());
        assert!(!ConnectionState::Connecting.can_connect());
        assert!(!ConnectionState::LoggingIn.can_connect());
        assert!(!ConnectionState::Open.can_connect());
        assert!(!ConnectionState::Closing.can_connect());
    }
}
