//! Published serving snapshots
//!
//! A `Snapshot` is immutable once built. `ServingIndex` holds the current
//! one behind a reader-writer lock; readers clone the `Arc` and drop the
//! lock straight away, so a reader keeps a complete snapshot even while a
//! newer one is being published.

use crate::index::ZoneIndex;
use hickory_proto::rr::{LowerName, Name};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Every managed zone and its compiled index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    zones: Vec<Name>,
    indexes: HashMap<LowerName, Arc<ZoneIndex>>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a compiled zone. A zone already present is replaced in place.
    pub fn insert(&mut self, index: ZoneIndex) {
        let origin = index.origin().clone();
        let key = LowerName::from(&origin);
        if self.indexes.insert(key.clone(), Arc::new(index)).is_none() {
            self.zones.push(origin);
        } else {
            debug!(zone = %origin, "Replaced duplicate zone in snapshot");
        }
    }

    /// Managed zone names, in the order they were compiled
    pub fn zones(&self) -> &[Name] {
        &self.zones
    }

    pub fn zone_index(&self, zone: &Name) -> Option<Arc<ZoneIndex>> {
        self.indexes.get(&LowerName::from(zone)).cloned()
    }

    /// Longest managed zone containing `qname`, compared on whole labels
    pub fn find_zone(&self, qname: &Name) -> Option<&Name> {
        let qname = LowerName::from(qname);
        self.zones
            .iter()
            .filter(|zone| LowerName::from(*zone).zone_of(&qname))
            .max_by_key(|zone| zone.num_labels())
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Total records across all zones
    pub fn record_count(&self) -> usize {
        self.indexes.values().map(|index| index.len()).sum()
    }
}

/// Shared handle to the current snapshot; clones share the same slot
#[derive(Debug, Clone, Default)]
pub struct ServingIndex {
    current: Arc<RwLock<Arc<Snapshot>>>,
    generation: Arc<AtomicU64>,
}

impl ServingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current snapshot. The lock is held only for the `Arc` clone.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the current snapshot and return the new generation number
    pub fn publish(&self, snapshot: Snapshot) -> u64 {
        let next = Arc::new(snapshot);
        let previous = {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *current, next)
        };
        // dropped outside the lock; readers may still hold it
        drop(previous);
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Number of snapshots published so far
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn zones(&self) -> Vec<Name> {
        self.snapshot().zones().to_vec()
    }

    pub fn zone_index(&self, zone: &Name) -> Option<Arc<ZoneIndex>> {
        self.snapshot().zone_index(zone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn name(s: &str) -> Name {
        Name::from_str(s).unwrap()
    }

    fn snapshot(zones: &[&str]) -> Snapshot {
        let mut snapshot = Snapshot::new();
        for zone in zones {
            snapshot.insert(ZoneIndex::new(name(zone)));
        }
        snapshot
    }

    #[test]
    fn test_find_zone_longest_suffix() {
        let snapshot = snapshot(&["example.com.", "sub.example.com.", "example.org."]);

        assert_eq!(
            snapshot.find_zone(&name("www.sub.example.com.")),
            Some(&name("sub.example.com."))
        );
        assert_eq!(
            snapshot.find_zone(&name("WWW.Example.COM.")),
            Some(&name("example.com."))
        );
        assert_eq!(snapshot.find_zone(&name("example.org.")), Some(&name("example.org.")));
        assert_eq!(snapshot.find_zone(&name("wwwexample.com.")), None);
        assert_eq!(snapshot.find_zone(&name("www.evil.com.")), None);
    }

    #[test]
    fn test_insert_keeps_order_and_replaces() {
        let mut snapshot = snapshot(&["b.example.", "a.example."]);
        snapshot.insert(ZoneIndex::new(name("B.example.")));
        assert_eq!(snapshot.zones(), &[name("b.example."), name("a.example.")]);
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.zone_index(&name("b.example.")).is_some());
    }

    #[test]
    fn test_publish_swaps_snapshot() {
        let index = ServingIndex::new();
        assert!(index.zones().is_empty());
        assert_eq!(index.generation(), 0);

        let before = index.snapshot();
        let generation = index.publish(snapshot(&["example.com."]));
        assert_eq!(generation, 1);

        // a reader holding the old snapshot still sees it whole
        assert!(before.is_empty());
        assert_eq!(index.zones(), vec![name("example.com.")]);
        assert!(index.zone_index(&name("example.com.")).is_some());
    }

    #[tokio::test]
    async fn test_readers_see_whole_snapshots() {
        let index = ServingIndex::new();
        index.publish(snapshot(&["a.example.", "b.example."]));

        let writer = {
            let index = index.clone();
            tokio::spawn(async move {
                for i in 0..200 {
                    let zones = if i % 2 == 0 {
                        vec!["c.example.", "d.example."]
                    } else {
                        vec!["a.example.", "b.example."]
                    };
                    index.publish(snapshot(&zones));
                    tokio::task::yield_now().await;
                }
            })
        };

        let mut readers = Vec::new();
        for _ in 0..4 {
            let index = index.clone();
            readers.push(tokio::spawn(async move {
                for _ in 0..200 {
                    let snap = index.snapshot();
                    let zones: Vec<String> = snap.zones().iter().map(|z| z.to_string()).collect();
                    assert!(
                        zones == ["a.example.", "b.example."] || zones == ["c.example.", "d.example."],
                        "mixed snapshot: {:?}",
                        zones
                    );
                    for zone in snap.zones() {
                        assert!(snap.zone_index(zone).is_some());
                    }
                    tokio::task::yield_now().await;
                }
            }));
        }

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
        assert_eq!(index.generation(), 201);
    }
}
