//! Zone reconciler
//!
//! Runs compile passes serially. Watch events from the store feed a
//! coalescing work queue; each pass lists both kinds once, compiles, and
//! publishes the snapshot. A failed pass leaves the current snapshot in
//! place and is retried with exponential backoff.

use crate::compiler::compile;
use crate::error::Result;
use crate::queue::{work_queue, Backoff};
use crate::store::ConfigStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};
use zonefold_dns::ServingIndex;

/// Reconciler configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Only compile objects from this namespace
    pub namespace: Option<String>,

    /// First retry delay after a failed pass
    pub backoff_base: Duration,

    /// Longest retry delay
    pub backoff_max: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            backoff_base: Duration::from_millis(5),
            backoff_max: Duration::from_secs(1000),
        }
    }
}

impl ReconcilerConfig {
    /// Restrict reconciliation to one namespace
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the retry backoff range
    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_max = max;
        self
    }
}

/// Counts from one published pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileStats {
    pub generation: u64,
    pub zones: usize,
    pub records: usize,
}

/// Reconciler notifications
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileEvent {
    /// A new snapshot is being served
    Published(ReconcileStats),
    /// A pass failed; the previous snapshot is still served
    Failed { error: String, retry_in: Duration },
}

/// Compiles configuration into the serving index
pub struct ZoneReconciler {
    store: Arc<dyn ConfigStore>,
    index: ServingIndex,
    config: ReconcilerConfig,
    event_tx: broadcast::Sender<ReconcileEvent>,
}

impl ZoneReconciler {
    pub fn new(store: Arc<dyn ConfigStore>, index: ServingIndex, config: ReconcilerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            store,
            index,
            config,
            event_tx,
        }
    }

    /// Subscribe to reconciler events
    pub fn subscribe(&self) -> broadcast::Receiver<ReconcileEvent> {
        self.event_tx.subscribe()
    }

    pub fn index(&self) -> &ServingIndex {
        &self.index
    }

    /// Run one pass: list, compile and publish
    pub async fn reconcile(&self) -> Result<ReconcileStats> {
        let mut zones = self.store.list_zones().await?;
        let mut record_sets = self.store.list_record_sets().await?;
        if let Some(namespace) = &self.config.namespace {
            zones.retain(|zone| zone.metadata.namespace() == namespace);
            record_sets.retain(|rs| rs.metadata.namespace() == namespace);
        }

        let snapshot = compile(&zones, &record_sets)?;
        let zones = snapshot.len();
        let records = snapshot.record_count();
        let generation = self.index.publish(snapshot);

        info!(generation, zones, records, "Published zone snapshot");
        Ok(ReconcileStats {
            generation,
            zones,
            records,
        })
    }

    /// Reconcile on every store change until `shutdown` flips or closes
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let (queue, mut work) = work_queue();
        let mut changes = self.store.watch();

        let forward = queue.clone();
        let forwarder = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(event) => {
                        debug!(kind = event.kind, object = %event.key, action = ?event.action, "Queueing reconcile");
                        forward.add();
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "Watch lagged; queueing full resync");
                        forward.add();
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        info!(namespace = ?self.config.namespace, "Zone reconciler started");
        queue.add();
        let mut backoff = Backoff::new(self.config.backoff_base, self.config.backoff_max);

        loop {
            tokio::select! {
                item = work.next() => {
                    if item.is_none() {
                        break;
                    }
                }
                _ = shutdown.changed() => {
                    break;
                }
            }

            match self.reconcile().await {
                Ok(stats) => {
                    backoff.reset();
                    let _ = self.event_tx.send(ReconcileEvent::Published(stats));
                }
                Err(e) => {
                    let retry_in = backoff.next_delay();
                    warn!(
                        error = %e,
                        retry_in = ?retry_in,
                        failures = backoff.failures(),
                        "Reconcile failed; keeping previous snapshot"
                    );
                    let _ = self.event_tx.send(ReconcileEvent::Failed {
                        error: e.to_string(),
                        retry_in,
                    });
                    queue.add_after(retry_in);
                }
            }
        }

        forwarder.abort();
        info!("Zone reconciler stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use hickory_proto::rr::{Name, RecordType};
    use std::str::FromStr;
    use zonefold_crd::{ObjectKey, Record, RecordSet, Soa, Zone};
    use zonefold_dns::{Resolution, ZoneResolver};

    fn zone(name: &str, namespace: &str) -> Zone {
        Zone::with_namespace(
            name,
            namespace,
            Soa::new("ns1.example.com.", "hostmaster.example.com."),
        )
    }

    fn a_record(name: &str, dns_name: &str, ip: &str) -> RecordSet {
        RecordSet::new(name, Record::new(dns_name, Duration::from_secs(60)).with_a([ip]))
    }

    fn qname(s: &str) -> Name {
        Name::from_str(s).unwrap()
    }

    #[tokio::test]
    async fn test_reconcile_publishes() {
        let store = Arc::new(MemoryStore::new());
        store.apply_zone(zone("example.com", "default")).unwrap();
        store
            .apply_record_set(a_record("www", "www.example.com.", "10.0.0.1"))
            .unwrap();

        let reconciler = ZoneReconciler::new(store, ServingIndex::new(), ReconcilerConfig::default());
        let stats = reconciler.reconcile().await.unwrap();
        assert_eq!(stats.generation, 1);
        assert_eq!(stats.zones, 1);
        assert_eq!(stats.records, 2);

        let resolver = ZoneResolver::new(reconciler.index().clone());
        assert!(matches!(
            resolver.resolve(&qname("www.example.com."), RecordType::A),
            Resolution::Answer(_)
        ));
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        store.apply_zone(zone("example.com", "default")).unwrap();
        store
            .apply_record_set(a_record("www", "www.example.com.", "10.0.0.1"))
            .unwrap();
        let reconciler = ZoneReconciler::new(store, ServingIndex::new(), ReconcilerConfig::default());

        reconciler.reconcile().await.unwrap();
        let first = reconciler.index().snapshot();
        reconciler.reconcile().await.unwrap();
        let second = reconciler.index().snapshot();
        assert_eq!(*first, *second);
    }

    #[tokio::test]
    async fn test_failed_pass_keeps_previous_snapshot() {
        let store = Arc::new(MemoryStore::new());
        store.apply_zone(zone("example.com", "default")).unwrap();
        store
            .apply_record_set(a_record("www", "www.example.com.", "10.0.0.1"))
            .unwrap();
        let reconciler =
            ZoneReconciler::new(store.clone(), ServingIndex::new(), ReconcilerConfig::default());
        reconciler.reconcile().await.unwrap();

        store
            .put_record_set(a_record("bad", "bad.example.com.", "not-an-ip"))
            .unwrap();
        assert!(reconciler.reconcile().await.is_err());
        assert_eq!(reconciler.index().generation(), 1);
        assert!(reconciler
            .index()
            .zone_index(&qname("example.com."))
            .is_some());
    }

    #[tokio::test]
    async fn test_namespace_filter() {
        let store = Arc::new(MemoryStore::new());
        store.apply_zone(zone("example.com", "dns")).unwrap();
        store.apply_zone(zone("example.org", "other")).unwrap();

        let reconciler = ZoneReconciler::new(
            store,
            ServingIndex::new(),
            ReconcilerConfig::default().with_namespace("dns"),
        );
        reconciler.reconcile().await.unwrap();
        assert_eq!(reconciler.index().zones(), vec![qname("example.com.")]);
    }

    #[tokio::test]
    async fn test_run_follows_store_changes() {
        let store = Arc::new(MemoryStore::new());
        store.apply_zone(zone("example.com", "default")).unwrap();

        let reconciler = Arc::new(ZoneReconciler::new(
            store.clone(),
            ServingIndex::new(),
            ReconcilerConfig::default(),
        ));
        let mut events = reconciler.subscribe();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = {
            let reconciler = reconciler.clone();
            tokio::spawn(async move { reconciler.run(shutdown_rx).await })
        };

        let first = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(first, ReconcileEvent::Published(stats) if stats.zones == 1));

        store.delete_zone(&ObjectKey::new("default", "example.com")).unwrap();
        let second = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(second, ReconcileEvent::Published(stats) if stats.zones == 0));
        assert!(reconciler.index().zones().is_empty());

        shutdown_tx.send(true).unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_run_retries_with_backoff() {
        let store = Arc::new(MemoryStore::new());
        store.apply_zone(zone("example.com", "default")).unwrap();
        store
            .put_record_set(a_record("bad", "bad.example.com.", "not-an-ip"))
            .unwrap();

        let reconciler = Arc::new(ZoneReconciler::new(
            store.clone(),
            ServingIndex::new(),
            ReconcilerConfig::default().with_backoff(Duration::from_millis(1), Duration::from_millis(10)),
        ));
        let mut events = reconciler.subscribe();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = {
            let reconciler = reconciler.clone();
            tokio::spawn(async move { reconciler.run(shutdown_rx).await })
        };

        let failed = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(failed, ReconcileEvent::Failed { .. }));

        // fixing the record lets a later pass succeed
        store.delete_record_set(&ObjectKey::new("default", "bad")).unwrap();
        let published = loop {
            match tokio::time::timeout(Duration::from_secs(5), events.recv())
                .await
                .unwrap()
            {
                Ok(ReconcileEvent::Published(stats)) => break stats,
                Ok(ReconcileEvent::Failed { .. }) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => panic!("reconciler stopped"),
            }
        };
        assert_eq!(published.zones, 1);

        shutdown_tx.send(true).unwrap();
        task.await.unwrap().unwrap();
    }
}
