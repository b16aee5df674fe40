//! Blocking retrieval of the next message for one client.

use std::time::Duration;

use tracing::debug;

use chatbox_core::{ClientId, HubResult};

use super::registry::Registry;

/// Waits for messages on behalf of clients.
#[derive(Clone)]
pub struct Poller {
    registry: Registry,
    default_wait: Duration,
}

impl Poller {
    /// `default_wait` applies when a caller passes no timeout.
    pub fn new(registry: Registry, default_wait: Duration) -> Self {
        Self {
            registry,
            default_wait,
        }
    }

    pub fn default_wait(&self) -> Duration {
        self.default_wait
    }

    /// Returns the next message for `id`, waiting up to `wait`.
    ///
    /// A successful lookup counts as activity for the idle reaper even if
    /// no message arrives. The registry lock is released before waiting.
    ///
    /// # Errors
    ///
    /// - `HubError::MissingField` if `id` is empty
    /// - `HubError::ClientNotFound` if `id` is not registered
    /// - `HubError::ChannelClosed` if the mailbox is closed before or while waiting
    /// - `HubError::NoMessages` if nothing arrives within the wait
    pub async fn next(&self, id: &str, wait: Option<Duration>) -> HubResult<String> {
        let id = ClientId::parse(id)?;
        let mailbox = self.registry.lookup(&id).await?;
        mailbox.touch();

        let wait = wait.unwrap_or(self.default_wait);
        debug!(client_id = %id, wait_ms = wait.as_millis() as u64, "Polling mailbox");

        mailbox.recv(wait).await
    }
}
