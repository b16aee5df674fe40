//! Client registry - the authoritative map of client ids to mailboxes.
//!
//! All membership changes (join, leave, reap, shutdown) take the write lock;
//! counting, listing and mailbox lookups take the read lock and release it
//! before any waiting happens.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Invalid input and unknown ids surface as `HubError` values

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, RwLockReadGuard};
use tokio::time::Instant;
use tracing::{debug, info};

use chatbox_core::{ClientId, ClientInfo, HubError, HubResult};

use super::mailbox::Mailbox;

/// Type alias for the clients map
pub type ClientsMap = HashMap<ClientId, Arc<Mailbox>>;

/// Why a mailbox left the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// Client called leave.
    Explicit,

    /// A new join reused the id.
    Replaced,

    /// No poll within the TTL.
    Idle,

    /// The hub is shutting down.
    Shutdown,
}

impl std::fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Explicit => write!(f, "left"),
            Self::Replaced => write!(f, "replaced by a new join"),
            Self::Idle => write!(f, "idle beyond TTL"),
            Self::Shutdown => write!(f, "hub shutdown"),
        }
    }
}

/// Shared handle to the client map.
///
/// Cheap to clone; all clones see the same clients.
#[derive(Clone)]
pub struct Registry {
    clients: Arc<RwLock<ClientsMap>>,
    mailbox_capacity: usize,
}

impl Registry {
    /// Creates an empty registry whose mailboxes hold `mailbox_capacity` messages.
    pub fn new(mailbox_capacity: usize) -> Self {
        Self {
            clients: Arc::new(RwLock::new(HashMap::new())),
            mailbox_capacity,
        }
    }

    pub fn mailbox_capacity(&self) -> usize {
        self.mailbox_capacity
    }

    /// Registers `id` with a fresh, empty mailbox.
    ///
    /// An existing mailbox for the same id is closed and replaced; pollers
    /// blocked on it fail with `ChannelClosed`.
    ///
    /// # Errors
    ///
    /// - `HubError::MissingField` if `id` is empty
    pub async fn join(&self, id: &str) -> HubResult<()> {
        let id = ClientId::parse(id)?;
        let mailbox = Arc::new(Mailbox::new(id.clone(), self.mailbox_capacity));

        let mut clients = self.clients.write().await;
        let replaced = clients.insert(id.clone(), mailbox);
        if let Some(old) = &replaced {
            old.close();
            debug!(
                client_id = %id,
                reason = %RemovalReason::Replaced,
                "Closed previous mailbox"
            );
        }

        info!(
            client_id = %id,
            replaced = replaced.is_some(),
            total_clients = clients.len(),
            "Client joined"
        );

        Ok(())
    }

    /// Removes and closes the mailbox for `id`.
    ///
    /// # Errors
    ///
    /// - `HubError::MissingField` if `id` is empty
    /// - `HubError::ClientNotFound` if nothing is registered under `id`
    pub async fn leave(&self, id: &str) -> HubResult<()> {
        let id = ClientId::parse(id)?;

        let mut clients = self.clients.write().await;
        let mailbox = clients
            .remove(&id)
            .ok_or_else(|| HubError::ClientNotFound(id.clone()))?;
        mailbox.close();

        info!(
            client_id = %id,
            reason = %RemovalReason::Explicit,
            remaining_clients = clients.len(),
            "Client removed"
        );

        Ok(())
    }

    /// Number of registered clients.
    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Returns true if `id` currently has a mailbox.
    pub async fn contains(&self, id: &ClientId) -> bool {
        self.clients.read().await.contains_key(id)
    }

    /// Snapshot of every registered client, sorted by id.
    pub async fn clients(&self) -> Vec<ClientInfo> {
        let now = Instant::now();
        let mut infos: Vec<ClientInfo> = self
            .clients
            .read()
            .await
            .values()
            .map(|mailbox| mailbox.info(now))
            .collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    /// Looks up the mailbox for `id`, holding the read lock only for the lookup.
    pub(crate) async fn lookup(&self, id: &ClientId) -> HubResult<Arc<Mailbox>> {
        self.clients
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| HubError::ClientNotFound(id.clone()))
    }

    /// Read access for fan-out.
    pub(crate) async fn read(&self) -> RwLockReadGuard<'_, ClientsMap> {
        self.clients.read().await
    }

    /// Closes and removes every mailbox idle for longer than `ttl`.
    ///
    /// Returns the ids that were evicted.
    pub async fn evict_idle(&self, ttl: Duration) -> Vec<ClientId> {
        let mut clients = self.clients.write().await;
        let now = Instant::now();

        let expired: Vec<ClientId> = clients
            .iter()
            .filter(|(_, mailbox)| mailbox.idle_for(now) > ttl)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            if let Some(mailbox) = clients.remove(id) {
                let idle = mailbox.idle_for(now);
                mailbox.close();
                info!(
                    client_id = %id,
                    idle_secs = idle.as_secs(),
                    reason = %RemovalReason::Idle,
                    "Removing idle client"
                );
            }
        }

        expired
    }

    /// Closes and removes every mailbox. Used at shutdown.
    pub async fn close_all(&self) -> usize {
        let mut clients = self.clients.write().await;
        let count = clients.len();
        for (id, mailbox) in clients.drain() {
            mailbox.close();
            debug!(client_id = %id, reason = %RemovalReason::Shutdown, "Client removed");
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::mailbox::Delivery;

    #[tokio::test]
    async fn test_join_then_leave_restores_count() {
        let registry = Registry::new(10);
        assert_eq!(registry.client_count().await, 0);

        registry.join("alice").await.unwrap();
        assert_eq!(registry.client_count().await, 1);

        registry.leave("alice").await.unwrap();
        assert_eq!(registry.client_count().await, 0);
    }

    #[tokio::test]
    async fn test_empty_id_rejected_without_mutation() {
        let registry = Registry::new(10);
        assert_eq!(
            registry.join("").await,
            Err(HubError::MissingField { field: "id" })
        );
        assert_eq!(
            registry.leave("").await,
            Err(HubError::MissingField { field: "id" })
        );
        assert_eq!(registry.client_count().await, 0);
    }

    #[tokio::test]
    async fn test_leave_unknown_client() {
        let registry = Registry::new(10);
        registry.join("alice").await.unwrap();

        let result = registry.leave("bob").await;
        assert_eq!(result, Err(HubError::ClientNotFound(ClientId::new("bob"))));
        assert_eq!(registry.client_count().await, 1);
    }

    #[tokio::test]
    async fn test_rejoin_replaces_and_closes_old_mailbox() {
        let registry = Registry::new(10);
        registry.join("alice").await.unwrap();
        let old = registry.lookup(&ClientId::new("alice")).await.unwrap();
        old.try_deliver("bob: before rejoin");

        registry.join("alice").await.unwrap();
        assert_eq!(registry.client_count().await, 1);
        assert!(old.is_closed());

        let fresh = registry.lookup(&ClientId::new("alice")).await.unwrap();
        assert!(!Arc::ptr_eq(&old, &fresh));
        assert_eq!(fresh.pending(), 0);
    }

    #[tokio::test]
    async fn test_leave_closes_mailbox() {
        let registry = Registry::new(10);
        registry.join("alice").await.unwrap();
        let mailbox = registry.lookup(&ClientId::new("alice")).await.unwrap();

        registry.leave("alice").await.unwrap();
        assert!(mailbox.is_closed());
        assert_eq!(mailbox.try_deliver("late"), Delivery::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_idle_only_removes_expired() {
        let registry = Registry::new(10);
        registry.join("stale").await.unwrap();
        tokio::time::advance(Duration::from_secs(200)).await;
        registry.join("fresh").await.unwrap();
        tokio::time::advance(Duration::from_secs(150)).await;

        let evicted = registry.evict_idle(Duration::from_secs(300)).await;
        assert_eq!(evicted, vec![ClientId::new("stale")]);
        assert!(!registry.contains(&ClientId::new("stale")).await);
        assert!(registry.contains(&ClientId::new("fresh")).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_exactly_at_ttl_is_kept() {
        let registry = Registry::new(10);
        registry.join("edge").await.unwrap();
        tokio::time::advance(Duration::from_secs(300)).await;

        assert!(registry.evict_idle(Duration::from_secs(300)).await.is_empty());
        assert_eq!(registry.client_count().await, 1);
    }

    #[tokio::test]
    async fn test_clients_snapshot_sorted() {
        let registry = Registry::new(10);
        registry.join("carol").await.unwrap();
        registry.join("alice").await.unwrap();
        registry
            .lookup(&ClientId::new("carol"))
            .await
            .unwrap()
            .try_deliver("alice: hi");

        let clients = registry.clients().await;
        let ids: Vec<&str> = clients.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["alice", "carol"]);
        assert_eq!(clients[1].pending, 1);
    }

    #[tokio::test]
    async fn test_close_all() {
        let registry = Registry::new(10);
        registry.join("alice").await.unwrap();
        registry.join("bob").await.unwrap();
        let bob = registry.lookup(&ClientId::new("bob")).await.unwrap();

        assert_eq!(registry.close_all().await, 2);
        assert_eq!(registry.client_count().await, 0);
        assert!(bob.is_closed());
    }
}
