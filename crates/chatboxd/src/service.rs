//! Request-facing façade over the hub.
//!
//! Every call takes the caller's cancellation token and runs under a
//! deadline: `request_timeout` for join/send/leave, and the poll wait plus
//! `poll_grace` for polls. Deadline expiry yields `HubError::Timeout`, which
//! is distinct from a poll that simply found no message (`NoMessages`).

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use chatbox_core::{ClientInfo, HubError, HubResult, ServiceConfig};
use chatbox_protocol::DaemonMessage;

use crate::hub::Hub;

/// Service façade used by transports.
#[derive(Clone)]
pub struct ChatService {
    hub: Hub,
    config: ServiceConfig,
    started_at: DateTime<Utc>,
}

impl ChatService {
    pub fn new(hub: Hub, config: ServiceConfig) -> Self {
        Self {
            hub,
            config,
            started_at: Utc::now(),
        }
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Registers a client. Replies `joined`.
    pub async fn join(&self, id: &str, cancel: &CancellationToken) -> HubResult<DaemonMessage> {
        let limit = self.config.request_timeout();
        self.guarded("join", limit, cancel, self.hub.registry().join(id))
            .await
            .map(|()| DaemonMessage::joined())
    }

    /// Broadcasts a message. Replies `sent` with the delivery count.
    pub async fn send(
        &self,
        from: &str,
        message: &str,
        cancel: &CancellationToken,
    ) -> HubResult<DaemonMessage> {
        let limit = self.config.request_timeout();
        self.guarded("send", limit, cancel, self.hub.broadcaster().send(from, message))
            .await
            .map(DaemonMessage::sent)
    }

    /// Unregisters a client. Replies `left`.
    pub async fn leave(&self, id: &str, cancel: &CancellationToken) -> HubResult<DaemonMessage> {
        let limit = self.config.request_timeout();
        self.guarded("leave", limit, cancel, self.hub.registry().leave(id))
            .await
            .map(|()| DaemonMessage::left())
    }

    /// Waits for the next message. Replies `message`.
    ///
    /// `wait` overrides the hub's default poll timeout.
    pub async fn poll(
        &self,
        id: &str,
        wait: Option<Duration>,
        cancel: &CancellationToken,
    ) -> HubResult<DaemonMessage> {
        let wait = wait.unwrap_or_else(|| self.hub.poller().default_wait());
        let limit = wait + self.config.poll_grace();
        self.guarded("poll", limit, cancel, self.hub.poller().next(id, Some(wait)))
            .await
            .map(DaemonMessage::message)
    }

    pub async fn client_count(&self) -> usize {
        self.hub.registry().client_count().await
    }

    pub async fn clients(&self) -> Vec<ClientInfo> {
        self.hub.registry().clients().await
    }

    /// Replies `status`.
    pub async fn status(&self) -> DaemonMessage {
        DaemonMessage::status(self.client_count().await, self.started_at)
    }

    /// Runs `op` until it completes, `limit` elapses or `cancel` fires.
    async fn guarded<T, F>(
        &self,
        name: &'static str,
        limit: Duration,
        cancel: &CancellationToken,
        op: F,
    ) -> HubResult<T>
    where
        F: Future<Output = HubResult<T>>,
    {
        let started = Instant::now();

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(HubError::Cancelled),
            outcome = timeout(limit, op) => outcome.unwrap_or(Err(HubError::Timeout(limit))),
        };

        let elapsed = started.elapsed();
        if elapsed > self.config.slow_request() {
            info!(
                request = name,
                elapsed_ms = elapsed.as_millis() as u64,
                "Request processed slowly"
            );
        }
        if let Err(e) = &result {
            debug!(request = name, code = e.code(), error = %e, "Request failed");
        }

        result
    }
}
