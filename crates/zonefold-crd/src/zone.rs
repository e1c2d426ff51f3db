//! Zone resource
//!
//! A Zone names the apex of an authoritative zone (its object name) and
//! carries the parameters the SOA record is synthesized from.

use crate::validation::{check_domain, FieldError, FieldErrors, FieldPath};
use crate::{ObjectMeta, TypeMeta};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Kind string for Zone objects
pub const KIND: &str = "Zone";

/// Default SOA refresh interval
pub const DEFAULT_REFRESH: Duration = Duration::from_secs(24 * 3600);

/// Default SOA retry interval
pub const DEFAULT_RETRY: Duration = Duration::from_secs(2 * 3600);

/// Default SOA expire interval
pub const DEFAULT_EXPIRE: Duration = Duration::from_secs(1000 * 3600);

/// Default negative-caching TTL (SOA minimum)
pub const DEFAULT_NEGATIVE_TTL: Duration = Duration::from_secs(48 * 3600);

/// Zone resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    /// Type metadata (apiVersion, kind)
    #[serde(flatten)]
    pub type_meta: TypeMeta,

    /// Object metadata; the name is the zone apex, e.g. `example.com`
    pub metadata: ObjectMeta,

    /// Zone parameters
    pub zone: ZoneSpec,
}

impl Zone {
    /// Create a new Zone resource
    pub fn new(name: impl Into<String>, soa: Soa) -> Self {
        Self {
            type_meta: TypeMeta::zone(),
            metadata: ObjectMeta::new(name),
            zone: ZoneSpec { soa },
        }
    }

    /// Create a Zone with namespace
    pub fn with_namespace(name: impl Into<String>, namespace: impl Into<String>, soa: Soa) -> Self {
        Self {
            type_meta: TypeMeta::zone(),
            metadata: ObjectMeta::with_namespace(name, namespace),
            zone: ZoneSpec { soa },
        }
    }

    /// Zone apex in fully-qualified form (always ends in `.`)
    pub fn fqdn(&self) -> String {
        fqdn(&self.metadata.name)
    }

    /// Fill unset SOA durations with their defaults
    pub fn apply_defaults(&mut self) {
        let soa = &mut self.zone.soa;
        for (value, default) in [
            (&mut soa.refresh, DEFAULT_REFRESH),
            (&mut soa.retry, DEFAULT_RETRY),
            (&mut soa.expire, DEFAULT_EXPIRE),
            (&mut soa.negative_ttl, DEFAULT_NEGATIVE_TTL),
        ] {
            if value.is_zero() {
                *value = default;
            }
        }
    }

    /// Validate the zone, returning every offending field
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::default();

        let name = FieldPath::new("metadata").child("name");
        if self.metadata.name.is_empty() {
            errors.push(FieldError::required(&name));
        } else {
            check_domain(&name, &self.metadata.name, &mut errors);
        }

        let soa = FieldPath::new("zone").child("soa");
        check_domain(&soa.child("master"), &self.zone.soa.master, &mut errors);
        check_domain(&soa.child("admin"), &self.zone.soa.admin, &mut errors);

        errors
    }
}

/// Zone parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ZoneSpec {
    pub soa: Soa,
}

/// Start-of-authority parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Soa {
    /// Primary name server host
    pub master: String,

    /// Administrator mailbox in domain form (`hostmaster.example.com.`)
    pub admin: String,

    #[serde(default)]
    pub serial: u32,

    #[serde(with = "crate::duration", default)]
    pub refresh: Duration,

    #[serde(with = "crate::duration", default)]
    pub retry: Duration,

    #[serde(with = "crate::duration", default)]
    pub expire: Duration,

    /// SOA minimum field; caps negative caching
    #[serde(rename = "negativeTTL", with = "crate::duration", default)]
    pub negative_ttl: Duration,

    /// TTL of the SOA record itself
    #[serde(with = "crate::duration", default)]
    pub ttl: Duration,
}

impl Soa {
    pub fn new(master: impl Into<String>, admin: impl Into<String>) -> Self {
        Self {
            master: master.into(),
            admin: admin.into(),
            ..Default::default()
        }
    }

    /// Builder method to set the serial
    pub fn with_serial(mut self, serial: u32) -> Self {
        self.serial = serial;
        self
    }

    /// Builder method to set the SOA record TTL
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Builder method to set refresh, retry and expire together
    pub fn with_timers(mut self, refresh: Duration, retry: Duration, expire: Duration) -> Self {
        self.refresh = refresh;
        self.retry = retry;
        self.expire = expire;
        self
    }

    /// Builder method to set the negative-caching TTL
    pub fn with_negative_ttl(mut self, negative_ttl: Duration) -> Self {
        self.negative_ttl = negative_ttl;
        self
    }
}

/// Append the root label if missing
pub fn fqdn(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{}.", name)
    }
}
