//! Subscription Façade
//!
//! The public per-feed operation set. Every operation builds exactly one
//! request, hands it to the serialized send path, and returns once the
//! frame is queued - no server acknowledgment is awaited. Symbol lists are
//! caller-supplied comma-joined strings; no symbol validation happens here
//! (the server echoes errors asynchronously as ordinary envelopes).

use crate::domain::schema::Service;

use super::connection::{StreamerClient, StreamerError};
use super::envelope::{self, QosLevel};

impl StreamerClient {
    /// Subscribe `symbols` (comma-joined) on any feed.
    ///
    /// # Errors
    ///
    /// [`StreamerError::NotConnected`] unless the connection is Open,
    /// [`StreamerError::NoActiveAccount`] if the session resolved no
    /// account. No frame is sent in either case.
    pub async fn subscribe(&self, service: Service, symbols: &str) -> Result<u64, StreamerError> {
        tracing::debug!(service = %service, symbols, "subscribe");
        self.issue_request(|session, id| {
            envelope::subscribe_request(service, symbols, session, id)
        })
        .await
    }

    /// Withdraw `symbols` (comma-joined) from any feed.
    ///
    /// # Errors
    ///
    /// Same preconditions as [`Self::subscribe`].
    pub async fn unsubscribe(&self, service: Service, symbols: &str) -> Result<u64, StreamerError> {
        tracing::debug!(service = %service, symbols, "unsubscribe");
        self.issue_request(|session, id| {
            envelope::unsubscribe_request(service, symbols, session, id)
        })
        .await
    }

    /// Request a server-side update-rate tier for this session.
    ///
    /// # Errors
    ///
    /// Same preconditions as [`Self::subscribe`].
    pub async fn request_qos(&self, level: QosLevel) -> Result<u64, StreamerError> {
        tracing::debug!(level = level.as_i64(), "requesting QoS");
        self.issue_request(|session, id| envelope::qos_request(level, session, id))
            .await
    }

    /// Subscribe level-one quotes.
    ///
    /// # Errors
    ///
    /// See [`Self::subscribe`].
    pub async fn subscribe_quotes(&self, symbols: &str) -> Result<u64, StreamerError> {
        self.subscribe(Service::Quote, symbols).await
    }

    /// Unsubscribe level-one quotes.
    ///
    /// # Errors
    ///
    /// See [`Self::subscribe`].
    pub async fn unsubscribe_quotes(&self, symbols: &str) -> Result<u64, StreamerError> {
        self.unsubscribe(Service::Quote, symbols).await
    }

    /// Subscribe equity chart bars.
    ///
    /// # Errors
    ///
    /// See [`Self::subscribe`].
    pub async fn subscribe_chart_equity(&self, symbols: &str) -> Result<u64, StreamerError> {
        self.subscribe(Service::ChartEquity, symbols).await
    }

    /// Unsubscribe equity chart bars.
    ///
    /// # Errors
    ///
    /// See [`Self::subscribe`].
    pub async fn unsubscribe_chart_equity(&self, symbols: &str) -> Result<u64, StreamerError> {
        self.unsubscribe(Service::ChartEquity, symbols).await
    }

    /// Subscribe futures chart bars.
    ///
    /// # Errors
    ///
    /// See [`Self::subscribe`].
    pub async fn subscribe_chart_futures(&self, symbols: &str) -> Result<u64, StreamerError> {
        self.subscribe(Service::ChartFutures, symbols).await
    }

    /// Unsubscribe futures chart bars.
    ///
    /// # Errors
    ///
    /// See [`Self::subscribe`].
    pub async fn unsubscribe_chart_futures(&self, symbols: &str) -> Result<u64, StreamerError> {
        self.unsubscribe(Service::ChartFutures, symbols).await
    }

    /// Subscribe equity time & sales.
    ///
    /// # Errors
    ///
    /// See [`Self::subscribe`].
    pub async fn subscribe_timesale_equity(&self, symbols: &str) -> Result<u64, StreamerError> {
        self.subscribe(Service::TimesaleEquity, symbols).await
    }

    /// Unsubscribe equity time & sales.
    ///
    /// # Errors
    ///
    /// See [`Self::subscribe`].
    pub async fn unsubscribe_timesale_equity(&self, symbols: &str) -> Result<u64, StreamerError> {
        self.unsubscribe(Service::TimesaleEquity, symbols).await
    }

    /// Subscribe futures time & sales.
    ///
    /// # Errors
    ///
    /// See [`Self::subscribe`].
    pub async fn subscribe_timesale_futures(&self, symbols: &str) -> Result<u64, StreamerError> {
        self.subscribe(Service::TimesaleFutures, symbols).await
    }

    /// Unsubscribe futures time & sales.
    ///
    /// # Errors
    ///
    /// See [`Self::subscribe`].
    pub async fn unsubscribe_timesale_futures(&self, symbols: &str) -> Result<u64, StreamerError> {
        self.unsubscribe(Service::TimesaleFutures, symbols).await
    }

    /// Subscribe the listed (NYSE) order book.
    ///
    /// # Errors
    ///
    /// See [`Self::subscribe`].
    pub async fn subscribe_listed_book(&self, symbols: &str) -> Result<u64, StreamerError> {
        self.subscribe(Service::ListedBook, symbols).await
    }

    /// Unsubscribe the listed (NYSE) order book.
    ///
    /// # Errors
    ///
    /// See [`Self::subscribe`].
    pub async fn unsubscribe_listed_book(&self, symbols: &str) -> Result<u64, StreamerError> {
        self.unsubscribe(Service::ListedBook, symbols).await
    }

    /// Subscribe the NASDAQ order book.
    ///
    /// # Errors
    ///
    /// See [`Self::subscribe`].
    pub async fn subscribe_nasdaq_book(&self, symbols: &str) -> Result<u64, StreamerError> {
        self.subscribe(Service::NasdaqBook, symbols).await
    }

    /// Unsubscribe the NASDAQ order book.
    ///
    /// # Errors
    ///
    /// See [`Self::subscribe`].
    pub async fn unsubscribe_nasdaq_book(&self, symbols: &str) -> Result<u64, StreamerError> {
        self.unsubscribe(Service::NasdaqBook, symbols).await
    }
}
