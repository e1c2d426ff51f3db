//! Configuration store trait and the in-memory implementation
//!
//! The reconciler only ever lists objects and watches for changes; writes
//! go through [`MemoryStore`] directly. `apply_*` runs admission on every
//! create and update, `put_*` writes an object as-is.

use crate::error::{ControllerError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;
use zonefold_crd::{admit, Admission, ObjectKey, RecordSet, Zone};

/// Capacity of the watch channel; slow watchers see `Lagged` and resync
const WATCH_CAPACITY: usize = 256;

/// What happened to a watched object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchAction {
    Added,
    Modified,
    Deleted,
}

/// Change notification for one object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEvent {
    pub kind: &'static str,
    pub key: ObjectKey,
    pub action: WatchAction,
}

/// Result of a write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Updated,
    /// Identical to the stored object; no event was emitted
    Unchanged,
}

/// Read side of the declarative configuration store
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// List all Zone objects
    async fn list_zones(&self) -> Result<Vec<Zone>>;

    /// List all RecordSet objects
    async fn list_record_sets(&self) -> Result<Vec<RecordSet>>;

    /// Subscribe to change events for both kinds
    fn watch(&self) -> broadcast::Receiver<ConfigEvent>;
}

/// One kind of object, keyed by namespace/name
#[derive(Debug)]
struct Collection<T> {
    objects: RwLock<BTreeMap<ObjectKey, T>>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<T: Admission + PartialEq> Collection<T> {
    fn get(&self, key: &ObjectKey) -> Result<Option<T>> {
        Ok(self
            .objects
            .read()
            .map_err(|e| ControllerError::Store(format!("lock poisoned: {}", e)))?
            .get(key)
            .cloned())
    }

    fn list(&self) -> Result<Vec<T>> {
        Ok(self
            .objects
            .read()
            .map_err(|e| ControllerError::Store(format!("lock poisoned: {}", e)))?
            .values()
            .cloned()
            .collect())
    }

    fn keys(&self) -> Result<Vec<ObjectKey>> {
        Ok(self
            .objects
            .read()
            .map_err(|e| ControllerError::Store(format!("lock poisoned: {}", e)))?
            .keys()
            .cloned()
            .collect())
    }

    /// Store `obj`, carrying over server-assigned metadata from the old version
    fn put(&self, mut obj: T, revision: &AtomicU64) -> Result<WriteOutcome> {
        let key = obj.metadata().key();
        let mut objects = self
            .objects
            .write()
            .map_err(|e| ControllerError::Store(format!("lock poisoned: {}", e)))?;

        let outcome = match objects.get(&key) {
            Some(existing) => {
                let meta = obj.metadata_mut();
                meta.uid = existing.metadata().uid;
                meta.creation_timestamp = existing.metadata().creation_timestamp;
                meta.resource_version = existing.metadata().resource_version.clone();
                if &obj == existing {
                    return Ok(WriteOutcome::Unchanged);
                }
                WriteOutcome::Updated
            }
            None => {
                let meta = obj.metadata_mut();
                meta.uid = Some(Uuid::new_v4());
                meta.creation_timestamp = Some(chrono::Utc::now());
                WriteOutcome::Created
            }
        };

        let version = revision.fetch_add(1, Ordering::AcqRel) + 1;
        obj.metadata_mut().resource_version = Some(version.to_string());
        objects.insert(key, obj);
        Ok(outcome)
    }

    fn delete(&self, key: &ObjectKey) -> Result<bool> {
        Ok(self
            .objects
            .write()
            .map_err(|e| ControllerError::Store(format!("lock poisoned: {}", e)))?
            .remove(key)
            .is_some())
    }
}

/// In-memory configuration store
#[derive(Debug)]
pub struct MemoryStore {
    zones: Collection<Zone>,
    record_sets: Collection<RecordSet>,
    revision: AtomicU64,
    events: broadcast::Sender<ConfigEvent>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        let (events, _) = broadcast::channel(WATCH_CAPACITY);
        Self {
            zones: Collection::default(),
            record_sets: Collection::default(),
            revision: AtomicU64::new(0),
            events,
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or update a zone through admission
    pub fn apply_zone(&self, zone: Zone) -> Result<WriteOutcome> {
        let old = self.zones.get(&zone.metadata.key())?;
        let zone = admit(zone, old.as_ref())?;
        self.put_zone(zone)
    }

    /// Create or update a record set through admission
    pub fn apply_record_set(&self, record_set: RecordSet) -> Result<WriteOutcome> {
        let old = self.record_sets.get(&record_set.metadata.key())?;
        let record_set = admit(record_set, old.as_ref())?;
        self.put_record_set(record_set)
    }

    /// Write a zone without admission
    pub fn put_zone(&self, zone: Zone) -> Result<WriteOutcome> {
        let key = zone.metadata.key();
        let outcome = self.zones.put(zone, &self.revision)?;
        self.notify::<Zone>(key, outcome);
        Ok(outcome)
    }

    /// Write a record set without admission
    pub fn put_record_set(&self, record_set: RecordSet) -> Result<WriteOutcome> {
        let key = record_set.metadata.key();
        let outcome = self.record_sets.put(record_set, &self.revision)?;
        self.notify::<RecordSet>(key, outcome);
        Ok(outcome)
    }

    /// Delete a zone; returns whether it existed
    pub fn delete_zone(&self, key: &ObjectKey) -> Result<bool> {
        let existed = self.zones.delete(key)?;
        if existed {
            self.emit::<Zone>(key.clone(), WatchAction::Deleted);
        }
        Ok(existed)
    }

    /// Delete a record set; returns whether it existed
    pub fn delete_record_set(&self, key: &ObjectKey) -> Result<bool> {
        let existed = self.record_sets.delete(key)?;
        if existed {
            self.emit::<RecordSet>(key.clone(), WatchAction::Deleted);
        }
        Ok(existed)
    }

    pub fn get_zone(&self, key: &ObjectKey) -> Result<Option<Zone>> {
        self.zones.get(key)
    }

    pub fn get_record_set(&self, key: &ObjectKey) -> Result<Option<RecordSet>> {
        self.record_sets.get(key)
    }

    pub fn zone_keys(&self) -> Result<Vec<ObjectKey>> {
        self.zones.keys()
    }

    pub fn record_set_keys(&self) -> Result<Vec<ObjectKey>> {
        self.record_sets.keys()
    }

    fn notify<T: Admission>(&self, key: ObjectKey, outcome: WriteOutcome) {
        match outcome {
            WriteOutcome::Created => self.emit::<T>(key, WatchAction::Added),
            WriteOutcome::Updated => self.emit::<T>(key, WatchAction::Modified),
            WriteOutcome::Unchanged => debug!(kind = T::KIND, object = %key, "Object unchanged"),
        }
    }

    fn emit<T: Admission>(&self, key: ObjectKey, action: WatchAction) {
        info!(kind = T::KIND, object = %key, action = ?action, "Config object changed");
        // no receivers is fine
        let _ = self.events.send(ConfigEvent {
            kind: T::KIND,
            key,
            action,
        });
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn list_zones(&self) -> Result<Vec<Zone>> {
        self.zones.list()
    }

    async fn list_record_sets(&self) -> Result<Vec<RecordSet>> {
        self.record_sets.list()
    }

    fn watch(&self) -> broadcast::Receiver<ConfigEvent> {
        self.events.subscribe()
    }
}
