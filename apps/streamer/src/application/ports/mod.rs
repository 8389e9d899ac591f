//! Port Interfaces
//!
//! Contracts for the external systems the streamer depends on, following
//! the Hexagonal Architecture pattern.
//!
//! The only driven port is [`SessionProvider`]: the authenticated session
//! service that hands out streaming connection parameters. It is consumed
//! exactly once per connect attempt; the returned parameters are held for
//! the life of the connection and discarded on disconnect. Token refresh
//! and re-authentication are owned by the provider, never by this crate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

// =============================================================================
// Session Parameters
// =============================================================================

/// Connection parameters returned by the session provider.
///
/// All fields come from the vendor's user-principal payload. The `Debug`
/// implementation redacts the token for safe logging.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionParameters {
    /// Streaming socket host (e.g. `streamer.example.com`). May also be a
    /// full `ws://`/`wss://` URL, which is used verbatim.
    pub streamer_host: String,
    /// Per-session streaming token.
    pub token: String,
    /// Issue time of the token.
    pub token_timestamp: DateTime<Utc>,
    /// User group of the principal.
    pub user_group: String,
    /// Access level of the principal.
    pub access_level: String,
    /// Registered application id.
    pub app_id: String,
    /// Access control list string.
    pub acl: String,
    /// Account identifier used on every request.
    pub account_id: String,
    /// CD-domain identifier of the account.
    pub account_cd_domain_id: String,
    /// Company code of the account.
    pub company: String,
    /// Segment code of the account.
    pub segment: String,
}

impl SessionParameters {
    /// The socket URL for the streaming endpoint.
    ///
    /// A bare host becomes `wss://{host}/ws`; a value that already carries
    /// a scheme is used as-is (dev and test endpoints).
    #[must_use]
    pub fn socket_url(&self) -> String {
        if self.streamer_host.contains("://") {
            self.streamer_host.clone()
        } else {
            format!("wss://{}/ws", self.streamer_host)
        }
    }

    /// Whether the session resolved an account usable for requests.
    #[must_use]
    pub fn has_account(&self) -> bool {
        !self.account_id.is_empty()
    }
}

impl std::fmt::Debug for SessionParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionParameters")
            .field("streamer_host", &self.streamer_host)
            .field("token", &"[REDACTED]")
            .field("account_id", &self.account_id)
            .field("app_id", &self.app_id)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Session Provider Port
// =============================================================================

/// Failure to produce a valid session.
#[derive(Debug, Clone, thiserror::Error)]
#[error("no valid session: {0}")]
pub struct SessionError(pub String);

/// Source of authenticated streaming sessions.
///
/// Implementations own credential storage and token lifetimes; the streamer
/// only asks for the current parameters at connect time.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Return parameters for a fresh streaming connection.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when no authenticated session is available.
    async fn session_parameters(&self) -> Result<SessionParameters, SessionError>;
}

/// A provider that always returns the same fixed parameters.
///
/// Useful for tests and for deployments where the session payload is
/// injected through the environment.
#[derive(Debug, Clone)]
pub struct StaticSessionProvider {
    parameters: SessionParameters,
}

impl StaticSessionProvider {
    /// Wrap fixed session parameters.
    #[must_use]
    pub const fn new(parameters: SessionParameters) -> Self {
        Self { parameters }
    }
}

#[async_trait]
impl SessionProvider for StaticSessionProvider {
    async fn session_parameters(&self) -> Result<SessionParameters, SessionError> {
        Ok(self.parameters.clone())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn params() -> SessionParameters {
        SessionParameters {
            streamer_host: "streamer.example.com".to_string(),
            token: "tok-secret".to_string(),
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
    fn bare_host_becomes_wss_url() {
        assert_eq!(
            params().socket_url(),
            "wss://streamer.example.com/ws"
        );
    }

    #[test]
    fn explicit_scheme_is_used_verbatim() {
        let mut p = params();
        p.streamer_host = "ws://127.0.0.1:9001/ws".to_string();
        assert_eq!(p.socket_url(), "ws://127.0.0.1:9001/ws");
    }

    #[test]
    fn debug_redacts_token() {
        let debug = format!("{:?}", params());
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("tok-secret"));
    }

    #[test]
    fn has_account_requires_account_id() {
        let mut p = params();
        assert!(p.has_account());
        p.account_id.clear();
        assert!(!p.has_account());
    }

    #[tokio::test]
    async fn static_provider_returns_parameters() {
        let provider = StaticSessionProvider::new(params());
        let got = provider.session_parameters().await.unwrap();
        assert_eq!(got.account_id, "123456789");
    }
}
