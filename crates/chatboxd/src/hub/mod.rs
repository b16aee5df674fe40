//! The message hub: registry, broadcaster, poller and reaper.
//!
//! # Architecture
//!
//! ```text
//!  join / leave ──────────────┐
//!                             ▼
//!  send ──▶ Broadcaster ──▶ Registry ◀── Reaper (background task)
//!                             ▲  RwLock<HashMap<ClientId, Arc<Mailbox>>>
//!  poll ──▶ Poller ───────────┘
//!               │ lookup, then wait on the mailbox without the lock
//!               ▼
//!            Mailbox (bounded FIFO + Notify)
//! ```
//!
//! [`Hub::spawn`] builds the components around one [`Registry`] and starts
//! the reaper; [`Hub::shutdown`] stops the reaper and closes every mailbox.
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `HubResult`
//! - Poisoned mailbox locks are recovered, not propagated as panics

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use chatbox_core::HubConfig;

mod broadcast;
mod mailbox;
mod poller;
mod reaper;
mod registry;

pub use broadcast::Broadcaster;
pub use mailbox::{Delivery, Mailbox};
pub use poller::Poller;
pub use reaper::Reaper;
pub use registry::{ClientsMap, Registry, RemovalReason};

/// Handle to a running hub.
///
/// Cheap to clone; every clone drives the same registry.
#[derive(Clone)]
pub struct Hub {
    registry: Registry,
    broadcaster: Broadcaster,
    poller: Poller,
    shutdown: CancellationToken,
    reaper_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Hub {
    /// Builds the hub and spawns its reaper task.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use chatbox_core::HubConfig;
    /// use chatboxd::hub::Hub;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let hub = Hub::spawn(&HubConfig::default());
    ///     hub.registry().join("alice").await.ok();
    ///     hub.shutdown().await;
    /// }
    /// ```
    pub fn spawn(config: &HubConfig) -> Self {
        let registry = Registry::new(config.mailbox_capacity);
        let broadcaster = Broadcaster::new(registry.clone());
        let poller = Poller::new(registry.clone(), config.poll_timeout());

        let shutdown = CancellationToken::new();
        let reaper = Reaper::new(
            registry.clone(),
            config.client_ttl(),
            config.reap_interval(),
        );
        let reaper_task = reaper.spawn(shutdown.child_token());

        info!(
            mailbox_capacity = config.mailbox_capacity,
            poll_timeout_ms = config.poll_timeout_ms,
            "Hub started"
        );

        Self {
            registry,
            broadcaster,
            poller,
            shutdown,
            reaper_task: Arc::new(Mutex::new(Some(reaper_task))),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub fn poller(&self) -> &Poller {
        &self.poller
    }

    /// Returns false once shutdown has begun.
    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled()
    }

    /// Stops the reaper, waits for it to exit, then closes every mailbox so
    /// blocked pollers return `ChannelClosed`. Idempotent.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        if let Some(task) = self.reaper_task.lock().await.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Reaper task ended abnormally");
            }
        }

        let closed = self.registry.close_all().await;
        info!(closed_clients = closed, "Hub stopped");
    }
}
