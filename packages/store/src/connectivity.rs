use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::table::RemoteTable;

/// Advisory online/offline indicator shared by repositories.
///
/// Reads never wait on it; it only reflects the outcome of the most recent
/// remote call or background probe.
#[derive(Clone)]
pub struct ConnectivityStatus {
    tx: Arc<watch::Sender<bool>>,
}

impl ConnectivityStatus {
    /// Starts optimistic: online until a call says otherwise.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(true);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn set(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            if online {
                info!("Remote store reachable again");
            } else {
                warn!("Remote store unreachable");
            }
        }
    }

    /// Watch for changes, e.g. to drive a status indicator.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for ConnectivityStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn a background task that periodically probes `table` and updates
/// `status`.
pub fn spawn_probe<T: RemoteTable>(
    table: Arc<T>,
    status: ConnectivityStatus,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let online = table.test_connection().await;
            status.set(online);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{CatalogEntity, EntityRecord};
    use crate::memory::MemoryTable;
    use crate::visibility::Viewer;

    #[derive(Clone)]
    struct Pot(EntityRecord);

    impl CatalogEntity for Pot {
        const KIND: &'static str = "pot";
        fn record(&self) -> &EntityRecord {
            &self.0
        }
        fn record_mut(&mut self) -> &mut EntityRecord {
            &mut self.0
        }
    }

    #[test]
    fn set_notifies_watchers_only_on_change() {
        let status = ConnectivityStatus::new();
        let rx = status.subscribe();

        status.set(true);
        assert!(!rx.has_changed().unwrap());

        status.set(false);
        assert!(rx.has_changed().unwrap());
        assert!(!status.is_online());
    }

    #[tokio::test]
    async fn probe_reports_offline_table() {
        let table = Arc::new(MemoryTable::<Pot>::new(Viewer::anonymous()));
        table.set_online(false);

        let status = ConnectivityStatus::new();
        let mut rx = status.subscribe();
        let handle = spawn_probe(Arc::clone(&table), status.clone(), Duration::from_millis(5));

        tokio::time::timeout(Duration::from_secs(2), rx.changed())
            .await
            .expect("probe should report within the timeout")
            .unwrap();
        assert!(!status.is_online());
        assert!(table.calls("test_connection") >= 1);

        handle.abort();
    }
}
