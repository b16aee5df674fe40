//! Background eviction of idle clients.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::registry::Registry;

/// Periodically removes clients that have not polled within the TTL.
pub struct Reaper {
    registry: Registry,
    ttl: Duration,
    interval: Duration,
}

impl Reaper {
    pub fn new(registry: Registry, ttl: Duration, interval: Duration) -> Self {
        Self {
            registry,
            ttl,
            interval,
        }
    }

    /// Runs one sweep now. Returns how many clients were evicted.
    pub async fn sweep(&self) -> usize {
        let evicted = self.registry.evict_idle(self.ttl).await;
        if evicted.is_empty() {
            debug!("No idle clients to reap");
        } else {
            info!(count = evicted.len(), "Reaped idle clients");
        }
        evicted.len()
    }

    /// Spawns the sweep loop; it stops when `cancel` fires.
    ///
    /// The first sweep runs one interval after spawning.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(
                ttl_secs = self.ttl.as_secs(),
                interval_secs = self.interval.as_secs(),
                "Reaper started"
            );

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Reaper stopping: shutdown requested");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.sweep().await;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatbox_core::ClientId;

    const TTL: Duration = Duration::from_secs(300);
    const INTERVAL: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn test_sweep_counts_evictions() {
        let registry = Registry::new(4);
        registry.join("a").await.unwrap();
        registry.join("b").await.unwrap();
        let reaper = Reaper::new(registry.clone(), TTL, INTERVAL);

        assert_eq!(reaper.sweep().await, 0);
        tokio::time::advance(TTL + Duration::from_secs(1)).await;
        assert_eq!(reaper.sweep().await, 2);
        assert_eq!(registry.client_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_loop_reaps_on_tick() {
        let registry = Registry::new(4);
        registry.join("idle").await.unwrap();
        let cancel = CancellationToken::new();
        let task = Reaper::new(registry.clone(), TTL, INTERVAL).spawn(cancel.clone());

        // Ticks at 60s..300s see the client within TTL; the 360s tick evicts it.
        tokio::time::sleep(Duration::from_secs(301)).await;
        assert!(registry.contains(&ClientId::new("idle")).await);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(!registry.contains(&ClientId::new("idle")).await);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_loop() {
        let registry = Registry::new(4);
        let cancel = CancellationToken::new();
        let task = Reaper::new(registry, TTL, INTERVAL).spawn(cancel.clone());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("reaper should stop promptly")
            .unwrap();
    }
}
