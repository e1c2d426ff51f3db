//! Manifest directory source
//!
//! Reads Zone and RecordSet documents from `*.yaml`, `*.yml` and `*.json`
//! files (multi-document YAML allowed) and syncs them into a
//! [`MemoryStore`]. The directory is the source of truth: objects that are
//! no longer declared are deleted from the store.

use crate::error::{ControllerError, Result};
use crate::store::{MemoryStore, WriteOutcome};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zonefold_crd::{CrdError, ObjectKey, RecordSet, Zone};

const EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// One decoded document
#[derive(Debug, Clone, PartialEq)]
pub enum Manifest {
    Zone(Zone),
    RecordSet(RecordSet),
}

impl Manifest {
    pub fn kind(&self) -> &'static str {
        match self {
            Manifest::Zone(_) => zonefold_crd::zone::KIND,
            Manifest::RecordSet(_) => zonefold_crd::recordset::KIND,
        }
    }

    pub fn key(&self) -> ObjectKey {
        match self {
            Manifest::Zone(zone) => zone.metadata.key(),
            Manifest::RecordSet(record_set) => record_set.metadata.key(),
        }
    }
}

/// Decode every document in `text`; `path` is only used in errors
pub fn parse_manifests(path: &Path, text: &str) -> Result<Vec<Manifest>> {
    let error = |message: String| ControllerError::Manifest {
        path: path.to_path_buf(),
        message,
    };

    let mut manifests = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        let value = serde_yaml::Value::deserialize(document).map_err(|e| error(e.to_string()))?;
        if value.is_null() {
            continue;
        }

        let kind = value
            .get("kind")
            .and_then(serde_yaml::Value::as_str)
            .ok_or_else(|| error("document has no kind".to_string()))?;
        let manifest = match kind {
            zonefold_crd::zone::KIND => Manifest::Zone(
                serde_yaml::from_value(value.clone()).map_err(|e| error(e.to_string()))?,
            ),
            zonefold_crd::recordset::KIND => Manifest::RecordSet(
                serde_yaml::from_value(value.clone()).map_err(|e| error(e.to_string()))?,
            ),
            other => return Err(error(format!("unknown kind '{}'", other))),
        };
        manifests.push(manifest);
    }
    Ok(manifests)
}

/// Load every manifest file in `dir`, in file name order
pub fn load_dir(dir: &Path) -> Result<Vec<(PathBuf, Manifest)>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| EXTENSIONS.contains(&ext))
        })
        .collect();
    paths.sort();

    let mut manifests = Vec::new();
    for path in paths {
        let text = std::fs::read_to_string(&path)?;
        let parsed = parse_manifests(&path, &text)?;
        debug!(path = %path.display(), documents = parsed.len(), "Loaded manifest file");
        manifests.extend(parsed.into_iter().map(|m| (path.clone(), m)));
    }
    Ok(manifests)
}

/// What a sync changed
#[derive(Debug, Default)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deleted: usize,
    /// Objects refused by admission, with the file they came from
    pub rejected: Vec<(PathBuf, CrdError)>,
}

impl SyncReport {
    pub fn changed(&self) -> bool {
        self.created + self.updated + self.deleted > 0
    }
}

/// Make the store match the manifests in `dir`.
///
/// A file that cannot be read or decoded fails the whole sync before the
/// store is touched. An object rejected by admission is reported and its
/// previously admitted version, if any, is kept.
pub fn sync_dir(store: &MemoryStore, dir: &Path) -> Result<SyncReport> {
    let manifests = load_dir(dir)?;
    let mut report = SyncReport::default();
    let mut zones = BTreeSet::new();
    let mut record_sets = BTreeSet::new();

    for (path, manifest) in manifests {
        let key = manifest.key();
        let kind = manifest.kind();
        let outcome = match manifest {
            Manifest::Zone(zone) => {
                zones.insert(key.clone());
                store.apply_zone(zone)
            }
            Manifest::RecordSet(record_set) => {
                record_sets.insert(key.clone());
                store.apply_record_set(record_set)
            }
        };

        match outcome {
            Ok(WriteOutcome::Created) => report.created += 1,
            Ok(WriteOutcome::Updated) => report.updated += 1,
            Ok(WriteOutcome::Unchanged) => report.unchanged += 1,
            Err(ControllerError::Admission(e)) => {
                warn!(kind, object = %key, path = %path.display(), error = %e, "Manifest rejected");
                report.rejected.push((path, e));
            }
            Err(e) => return Err(e),
        }
    }

    for key in store.zone_keys()? {
        if !zones.contains(&key) && store.delete_zone(&key)? {
            report.deleted += 1;
        }
    }
    for key in store.record_set_keys()? {
        if !record_sets.contains(&key) && store.delete_record_set(&key)? {
            report.deleted += 1;
        }
    }

    if report.changed() || !report.rejected.is_empty() {
        info!(
            dir = %dir.display(),
            created = report.created,
            updated = report.updated,
            deleted = report.deleted,
            rejected = report.rejected.len(),
            "Synced manifests"
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ConfigStore;
    use std::fs;

    const ZONE: &str = r#"
apiVersion: zonefold.dev/v1alpha1
kind: Zone
metadata:
  name: example.com
zone:
  soa:
    master: ns1.example.com.
    admin: hostmaster.example.com.
    serial: 1
    ttl: 1h
"#;

    const RECORDS: &str = r#"
apiVersion: zonefold.dev/v1alpha1
kind: RecordSet
metadata:
  name: www
record:
  dnsName: www.example.com.
  ttl: 5m
  a: ["10.0.0.1"]
---
apiVersion: zonefold.dev/v1alpha1
kind: RecordSet
metadata:
  name: txt
record:
  dnsName: _spf.example.com.
  ttl: 5m
  txt: ["v=spf1 -all"]
"#;

    #[test]
    fn test_parse_multi_document() {
        let manifests = parse_manifests(Path::new("records.yaml"), RECORDS).unwrap();
        assert_eq!(manifests.len(), 2);
        assert!(manifests.iter().all(|m| m.kind() == "RecordSet"));
        assert_eq!(manifests[1].key(), ObjectKey::new("default", "txt"));
    }

    #[test]
    fn test_parse_json() {
        let json = r#"{"apiVersion":"zonefold.dev/v1alpha1","kind":"Zone","metadata":{"name":"example.org"},"zone":{"soa":{"master":"ns1.example.org.","admin":"root.example.org."}}}"#;
        let manifests = parse_manifests(Path::new("zone.json"), json).unwrap();
        assert!(matches!(&manifests[0], Manifest::Zone(zone) if zone.metadata.name == "example.org"));
    }

    #[test]
    fn test_parse_rejects_unknown_kind() {
        let err = parse_manifests(Path::new("pod.yaml"), "kind: Pod\nmetadata:\n  name: x\n").unwrap_err();
        assert!(err.to_string().contains("unknown kind 'Pod'"));
        assert!(err.to_string().contains("pod.yaml"));

        assert!(parse_manifests(Path::new("x.yaml"), "metadata: {}\n").is_err());
    }

    #[test]
    fn test_load_dir_skips_other_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("10-zone.yaml"), ZONE).unwrap();
        fs::write(dir.path().join("20-records.yml"), RECORDS).unwrap();
        fs::write(dir.path().join("README.md"), "# not a manifest").unwrap();

        let manifests = load_dir(dir.path()).unwrap();
        assert_eq!(manifests.len(), 3);
        assert_eq!(manifests[0].1.kind(), "Zone");
    }

    #[tokio::test]
    async fn test_sync_creates_updates_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("zone.yaml"), ZONE).unwrap();
        fs::write(dir.path().join("records.yaml"), RECORDS).unwrap();
        let store = MemoryStore::new();

        let report = sync_dir(&store, dir.path()).unwrap();
        assert_eq!(report.created, 3);
        assert!(report.rejected.is_empty());

        let report = sync_dir(&store, dir.path()).unwrap();
        assert_eq!(report.unchanged, 3);
        assert!(!report.changed());

        fs::remove_file(dir.path().join("records.yaml")).unwrap();
        let report = sync_dir(&store, dir.path()).unwrap();
        assert_eq!(report.deleted, 2);
        assert!(store.list_record_sets().await.unwrap().is_empty());
        assert_eq!(store.list_zones().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sync_keeps_previous_version_of_rejected_object() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("zone.yaml"), ZONE).unwrap();
        fs::write(dir.path().join("records.yaml"), RECORDS).unwrap();
        let store = MemoryStore::new();
        sync_dir(&store, dir.path()).unwrap();

        fs::write(
            dir.path().join("records.yaml"),
            RECORDS.replace("a: [\"10.0.0.1\"]", "a: [\"10.0.0.1\"]\n  txt: [\"oops\"]"),
        )
        .unwrap();
        let report = sync_dir(&store, dir.path()).unwrap();
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.deleted, 0);

        let www = store
            .get_record_set(&ObjectKey::new("default", "www"))
            .unwrap()
            .unwrap();
        assert!(www.record.txt.is_empty());
    }

    #[test]
    fn test_sync_fails_on_broken_file_without_touching_store() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("zone.yaml"), ZONE).unwrap();
        let store = MemoryStore::new();
        sync_dir(&store, dir.path()).unwrap();

        fs::write(dir.path().join("broken.yaml"), "kind: [unclosed").unwrap();
        assert!(sync_dir(&store, dir.path()).is_err());
        assert_eq!(store.zone_keys().unwrap().len(), 1);
    }
}
