//! Fan-out of one client's message to every other client.

use tracing::{debug, info, warn};

use chatbox_core::{HubError, HubResult};

use super::mailbox::Delivery;
use super::registry::Registry;

/// Delivers messages to every registered client except the sender.
///
/// Delivery is best-effort and at most once per recipient: a full mailbox
/// simply misses the message, without affecting the sender or the others.
#[derive(Clone)]
pub struct Broadcaster {
    registry: Registry,
}

impl Broadcaster {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    /// Sends `"{from}: {text}"` to every client other than `from`.
    ///
    /// The sender does not need to be registered. Returns the number of
    /// mailboxes that accepted the message.
    ///
    /// # Errors
    ///
    /// - `HubError::MissingField` if `from` or `text` is empty
    /// - `HubError::NoReceivers` if no mailbox accepted the message
    pub async fn send(&self, from: &str, text: &str) -> HubResult<usize> {
        if from.is_empty() {
            return Err(HubError::MissingField { field: "from" });
        }
        if text.is_empty() {
            return Err(HubError::MissingField { field: "message" });
        }

        let line = format!("{from}: {text}");
        let mut delivered = 0;

        let clients = self.registry.read().await;
        for (id, mailbox) in clients.iter() {
            if id.as_str() == from {
                continue;
            }
            match mailbox.try_deliver(&line) {
                Delivery::Queued => delivered += 1,
                Delivery::Full => {
                    warn!(
                        client_id = %id,
                        capacity = mailbox.capacity(),
                        "Skipping client (mailbox full)"
                    );
                }
                Delivery::Closed => {
                    debug!(client_id = %id, "Skipping client (mailbox closed)");
                }
            }
        }
        drop(clients);

        if delivered == 0 {
            debug!(from = %from, "Broadcast reached no receivers");
            return Err(HubError::NoReceivers);
        }

        info!(from = %from, delivered, "Message broadcast");
        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatbox_core::ClientId;
    use std::time::Duration;

    async fn setup(ids: &[&str], capacity: usize) -> (Registry, Broadcaster) {
        let registry = Registry::new(capacity);
        for id in ids {
            registry.join(id).await.unwrap();
        }
        let broadcaster = Broadcaster::new(registry.clone());
        (registry, broadcaster)
    }

    #[tokio::test]
    async fn test_delivers_to_everyone_but_sender() {
        let (registry, broadcaster) = setup(&["alice", "bob", "carol", "dave"], 10).await;

        assert_eq!(broadcaster.send("alice", "hi").await, Ok(3));

        let alice = registry.lookup(&ClientId::new("alice")).await.unwrap();
        assert_eq!(alice.pending(), 0);
        for id in ["bob", "carol", "dave"] {
            let mailbox = registry.lookup(&ClientId::new(id)).await.unwrap();
            assert_eq!(mailbox.recv(Duration::ZERO).await.unwrap(), "alice: hi");
        }
    }

    #[tokio::test]
    async fn test_no_receivers() {
        let (_registry, broadcaster) = setup(&[], 10).await;
        assert_eq!(broadcaster.send("alice", "hi").await, Err(HubError::NoReceivers));

        let (_registry, broadcaster) = setup(&["alice"], 10).await;
        assert_eq!(broadcaster.send("alice", "hi").await, Err(HubError::NoReceivers));
    }

    #[tokio::test]
    async fn test_unregistered_sender_can_broadcast() {
        let (_registry, broadcaster) = setup(&["bob"], 10).await;
        assert_eq!(broadcaster.send("ghost", "boo").await, Ok(1));
    }

    #[tokio::test]
    async fn test_missing_fields() {
        let (_registry, broadcaster) = setup(&["alice", "bob"], 10).await;
        assert_eq!(
            broadcaster.send("", "hi").await,
            Err(HubError::MissingField { field: "from" })
        );
        assert_eq!(
            broadcaster.send("alice", "").await,
            Err(HubError::MissingField { field: "message" })
        );
    }

    #[tokio::test]
    async fn test_full_recipient_skipped_others_unaffected() {
        let (registry, broadcaster) = setup(&["alice", "bob", "carol"], 2).await;
        let bob = registry.lookup(&ClientId::new("bob")).await.unwrap();
        bob.try_deliver("x: 1");
        bob.try_deliver("x: 2");

        assert_eq!(broadcaster.send("alice", "hi").await, Ok(1));
        assert_eq!(bob.pending(), 2);
    }

    #[tokio::test]
    async fn test_only_recipient_full_is_no_receivers() {
        let (registry, broadcaster) = setup(&["alice", "bob"], 1).await;
        assert_eq!(broadcaster.send("alice", "first").await, Ok(1));
        assert_eq!(broadcaster.send("alice", "second").await, Err(HubError::NoReceivers));

        let bob = registry.lookup(&ClientId::new("bob")).await.unwrap();
        assert_eq!(bob.recv(Duration::ZERO).await.unwrap(), "alice: first");
    }
}
