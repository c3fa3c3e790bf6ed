//! Store health capability.
//!
//! The web boundary asks a [`HealthCheck`] before delegating any request to
//! the core. [`StoreMonitor`] answers from a flag refreshed by a background
//! task that pings the database on an interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::db::Database;

/// Something that knows whether the backing store can serve requests.
pub trait HealthCheck: Send + Sync {
    /// Whether the store is currently reachable.
    fn is_available(&self) -> bool;
}

/// Polls the database and tracks its reachability.
#[derive(Debug)]
pub struct StoreMonitor {
    available: AtomicBool,
}

impl StoreMonitor {
    /// Create a monitor in the given initial state.
    pub fn new(available: bool) -> Self {
        Self {
            available: AtomicBool::new(available),
        }
    }

    /// Record the result of a probe, logging transitions.
    pub fn record(&self, reachable: bool) {
        let was = self.available.swap(reachable, Ordering::Relaxed);
        match (was, reachable) {
            (true, false) => warn!("Database disconnected"),
            (false, true) => info!("Database reconnected"),
            _ => {}
        }
    }

    /// Ping once and record the result. A ping slower than `limit` counts as down.
    pub async fn probe(&self, db: &Database, limit: Duration) -> bool {
        let reachable = match timeout(limit, db.ping()).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                debug!(error = %e, "Database ping failed");
                false
            }
            Err(_) => {
                debug!("Database ping timed out");
                false
            }
        };
        self.record(reachable);
        reachable
    }

    /// Probe `db` every `every` until the returned task is aborted.
    pub fn spawn(self: &Arc<Self>, db: Database, every: Duration) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                monitor.probe(&db, every).await;
            }
        })
    }
}

impl HealthCheck for StoreMonitor {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_probe_tracks_database() {
        let db = Database::open_in_memory().await.unwrap();
        let monitor = StoreMonitor::new(false);

        assert!(monitor.probe(&db, Duration::from_secs(1)).await);
        assert!(monitor.is_available());

        db.close().await;
        assert!(!monitor.probe(&db, Duration::from_secs(1)).await);
        assert!(!monitor.is_available());
    }

    #[test]
    fn test_record_transitions() {
        let monitor = StoreMonitor::new(true);
        monitor.record(false);
        assert!(!monitor.is_available());
        monitor.record(false);
        assert!(!monitor.is_available());
        monitor.record(true);
        assert!(monitor.is_available());
    }

    #[tokio::test]
    async fn test_spawned_monitor_notices_outage() {
        let db = Database::open_in_memory().await.unwrap();
        let monitor = Arc::new(StoreMonitor::new(true));
        let handle = monitor.spawn(db.clone(), Duration::from_millis(10));

        db.close().await;
        for _ in 0..100 {
            if !monitor.is_available() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!monitor.is_available());
        handle.abort();
    }
}
