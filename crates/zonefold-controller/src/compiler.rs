//! Zone compiler
//!
//! Pure functions from a listing of Zone and RecordSet objects to a
//! serving snapshot. Each record set is attributed to exactly one zone:
//! the longest managed zone its `dnsName` is a strict subdomain of.
//! Any record that fails to convert aborts the whole compile.

use crate::error::CompileError;
use std::collections::HashSet;
use tracing::{debug, trace, warn};
use zonefold_crd::{fqdn, RecordSet, Zone};
use zonefold_dns::{parse_name, soa_record, to_record, Snapshot, ZoneIndex};

/// Compile every zone and its record sets into a new snapshot.
///
/// Zones keep their listing order; a zone name listed twice (e.g. from two
/// namespaces) is compiled once, from its first occurrence.
pub fn compile(zones: &[Zone], record_sets: &[RecordSet]) -> Result<Snapshot, CompileError> {
    let mut seen = HashSet::new();
    let zones: Vec<&Zone> = zones
        .iter()
        .filter(|zone| {
            let fresh = seen.insert(zone.fqdn().to_ascii_lowercase());
            if !fresh {
                warn!(zone = %zone.fqdn(), object = %zone.metadata.key(), "Duplicate zone ignored");
            }
            fresh
        })
        .collect();
    let names: Vec<String> = zones.iter().map(|zone| zone.fqdn()).collect();

    let mut owned: Vec<Vec<&RecordSet>> = vec![Vec::new(); zones.len()];
    for record_set in record_sets {
        match owning_zone(&names, &record_set.record.dns_name) {
            Some(i) => owned[i].push(record_set),
            None => debug!(
                object = %record_set.metadata.key(),
                dns_name = %record_set.record.dns_name,
                "Record set is not under any managed zone"
            ),
        }
    }

    let mut snapshot = Snapshot::new();
    for (zone, record_sets) in zones.into_iter().zip(owned) {
        snapshot.insert(compile_zone(zone, &record_sets)?);
    }
    Ok(snapshot)
}

/// Build the index for one zone from the record sets attributed to it
pub fn compile_zone(zone: &Zone, record_sets: &[&RecordSet]) -> Result<ZoneIndex, CompileError> {
    let zone_name = zone.fqdn();
    let zone_error = |source| CompileError::Zone {
        zone: zone_name.clone(),
        source,
    };

    let origin = parse_name(&zone_name).map_err(zone_error)?;
    let mut index = ZoneIndex::new(origin);
    index
        .insert(soa_record(zone).map_err(zone_error)?)
        .map_err(zone_error)?;

    for record_set in record_sets {
        let record_error = |source| CompileError::Record {
            record_set: record_set.metadata.key().to_string(),
            zone: zone_name.clone(),
            source,
        };
        for rr in record_set.expand() {
            trace!(zone = %zone_name, record = %rr, "Compiling record");
            let record = to_record(&rr).map_err(record_error)?;
            index.insert(record).map_err(record_error)?;
        }
    }

    debug!(zone = %zone_name, records = index.len(), "Compiled zone");
    Ok(index)
}

/// Index of the longest zone in `zones` that `dns_name` is a strict
/// subdomain of, comparing whole labels without regard to case
pub fn owning_zone(zones: &[String], dns_name: &str) -> Option<usize> {
    let name = fqdn(dns_name).to_ascii_lowercase();
    zones
        .iter()
        .enumerate()
        .filter(|(_, zone)| is_strict_subdomain(&name, &fqdn(zone).to_ascii_lowercase()))
        .max_by_key(|(_, zone)| zone.trim_end_matches('.').split('.').filter(|l| !l.is_empty()).count())
        .map(|(i, _)| i)
}

fn is_strict_subdomain(name: &str, zone: &str) -> bool {
    if zone == "." {
        return name != ".";
    }
    name.len() > zone.len() && name.ends_with(zone) && name[..name.len() - zone.len()].ends_with('.')
}
