//! RecordSet resource
//!
//! A RecordSet holds the records for one owner name. The wire form keeps
//! one optional value-set per record type; exactly one of them may be
//! populated, and the record type is derived from which one it is.

use crate::validation::{check_domain, FieldError, FieldErrors, FieldPath};
use crate::{ObjectMeta, TypeMeta};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use std::time::Duration;

/// Kind string for RecordSet objects
pub const KIND: &str = "RecordSet";

/// Largest TTL a resource record may carry (RFC 2181 section 8)
pub const MAX_TTL: u32 = i32::MAX as u32;

const MULTIPLE_TYPES: &str = "can not contain multiple types of records";

/// Record types a RecordSet can carry, in derivation priority order
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum RecordType {
    A,
    AAAA,
    TXT,
    CNAME,
    NS,
    MX,
    SRV,
    #[default]
    Unknown,
}

impl RecordType {
    /// Every concrete type, highest priority first
    pub const ALL: [RecordType; 7] = [
        RecordType::A,
        RecordType::AAAA,
        RecordType::TXT,
        RecordType::CNAME,
        RecordType::NS,
        RecordType::MX,
        RecordType::SRV,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::AAAA => "AAAA",
            RecordType::TXT => "TXT",
            RecordType::CNAME => "CNAME",
            RecordType::NS => "NS",
            RecordType::MX => "MX",
            RecordType::SRV => "SRV",
            RecordType::Unknown => "Unknown",
        }
    }

    /// Wire field holding values of this type
    fn field(&self) -> &'static str {
        match self {
            RecordType::A => "a",
            RecordType::AAAA => "aaaa",
            RecordType::TXT => "txt",
            RecordType::CNAME => "cname",
            RecordType::NS => "ns",
            RecordType::MX => "mx",
            RecordType::SRV => "srv",
            RecordType::Unknown => "type",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        RecordType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown record type: {}", s))
    }
}

/// Mail exchanger entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Mx {
    pub priority: u16,
    pub host: String,
}

impl Mx {
    pub fn new(priority: u16, host: impl Into<String>) -> Self {
        Self {
            priority,
            host: host.into(),
        }
    }
}

/// Service locator entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Srv {
    pub priority: u16,
    pub weight: u16,
    pub port: u16,
    pub host: String,
}

impl Srv {
    pub fn new(priority: u16, weight: u16, port: u16, host: impl Into<String>) -> Self {
        Self {
            priority,
            weight,
            port,
            host: host.into(),
        }
    }
}

/// RecordSet resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecordSet {
    /// Type metadata (apiVersion, kind)
    #[serde(flatten)]
    pub type_meta: TypeMeta,

    /// Object metadata
    pub metadata: ObjectMeta,

    /// Record data
    pub record: Record,
}

impl RecordSet {
    /// Create a new RecordSet resource
    pub fn new(name: impl Into<String>, record: Record) -> Self {
        Self {
            type_meta: TypeMeta::record_set(),
            metadata: ObjectMeta::new(name),
            record,
        }
    }

    /// Create a RecordSet with namespace
    pub fn with_namespace(
        name: impl Into<String>,
        namespace: impl Into<String>,
        record: Record,
    ) -> Self {
        Self {
            type_meta: TypeMeta::record_set(),
            metadata: ObjectMeta::with_namespace(name, namespace),
            record,
        }
    }

    /// Store the derived record type
    pub fn apply_defaults(&mut self) {
        self.record.record_type = Some(self.record.get_type());
    }

    /// Validate the record set, returning every offending field.
    ///
    /// Checks are driven by the stored `type` field, so defaulting must
    /// have run first.
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::default();
        let record = FieldPath::new("record");

        check_domain(&record.child("dnsName"), &self.record.dns_name, &mut errors);

        let record_type = self.record.record_type.unwrap_or_default();
        if record_type == RecordType::Unknown {
            errors.push(FieldError::invalid(
                &record.child("type"),
                record_type,
                "unknown record type",
            ));
            return errors;
        }

        match record_type {
            RecordType::A => {
                for (i, entry) in self.record.a.iter().enumerate() {
                    if entry.parse::<Ipv4Addr>().is_err() {
                        errors.push(FieldError::invalid(
                            &record.child("a").index(i),
                            entry,
                            "not a valid IPv4 address",
                        ));
                    }
                }
            }
            RecordType::AAAA => {
                for (i, entry) in self.record.aaaa.iter().enumerate() {
                    if entry.parse::<Ipv6Addr>().is_err() {
                        errors.push(FieldError::invalid(
                            &record.child("aaaa").index(i),
                            entry,
                            "not a valid IPv6 address",
                        ));
                    }
                }
            }
            _ => {}
        }

        for other in RecordType::ALL.into_iter().filter(|t| *t != record_type) {
            if let Some(values) = self.record.values_of(other) {
                errors.push(FieldError::invalid(
                    &record.child(other.field()),
                    format!("{:?}", values),
                    MULTIPLE_TYPES,
                ));
            }
        }

        errors
    }

    /// Expand into one literal resource record per value
    pub fn expand(&self) -> Vec<ResourceRecord> {
        let Some(data) = self.record.data() else {
            return Vec::new();
        };
        let ttl = u32::try_from(self.record.ttl.as_secs())
            .unwrap_or(MAX_TTL)
            .min(MAX_TTL);

        data.values()
            .into_iter()
            .map(|value| ResourceRecord {
                dns_name: self.record.dns_name.clone(),
                ttl,
                record_type: data.record_type(),
                value,
            })
            .collect()
    }
}

/// Record data as written by the operator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Owner name, e.g. `www.example.com.`
    pub dns_name: String,

    #[serde(with = "crate::duration", default)]
    pub ttl: Duration,

    /// Derived at admission; never set by hand
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub record_type: Option<RecordType>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub a: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aaaa: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub txt: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cname: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ns: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mx: Vec<Mx>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub srv: Vec<Srv>,
}

impl Record {
    pub fn new(dns_name: impl Into<String>, ttl: Duration) -> Self {
        Self {
            dns_name: dns_name.into(),
            ttl,
            ..Default::default()
        }
    }

    pub fn with_a<I, S>(mut self, addrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.a = addrs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_aaaa<I, S>(mut self, addrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aaaa = addrs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_txt<I, S>(mut self, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.txt = texts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cname(mut self, target: impl Into<String>) -> Self {
        self.cname = Some(target.into());
        self
    }

    pub fn with_ns<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ns = hosts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_mx(mut self, mx: Vec<Mx>) -> Self {
        self.mx = mx;
        self
    }

    pub fn with_srv(mut self, srv: Vec<Srv>) -> Self {
        self.srv = srv;
        self
    }

    /// Derive the record type from the first populated value-set
    pub fn get_type(&self) -> RecordType {
        RecordType::ALL
            .into_iter()
            .find(|t| self.values_of(*t).is_some())
            .unwrap_or(RecordType::Unknown)
    }

    /// Populated data for the stored type, or the derived one if unset
    pub fn data(&self) -> Option<RecordData<'_>> {
        let record_type = match self.record_type {
            Some(t) if t != RecordType::Unknown => t,
            _ => self.get_type(),
        };
        match record_type {
            RecordType::A if !self.a.is_empty() => Some(RecordData::A(&self.a)),
            RecordType::AAAA if !self.aaaa.is_empty() => Some(RecordData::Aaaa(&self.aaaa)),
            RecordType::TXT if !self.txt.is_empty() => Some(RecordData::Txt(&self.txt)),
            RecordType::CNAME => self.cname().map(RecordData::Cname),
            RecordType::NS if !self.ns.is_empty() => Some(RecordData::Ns(&self.ns)),
            RecordType::MX if !self.mx.is_empty() => Some(RecordData::Mx(&self.mx)),
            RecordType::SRV if !self.srv.is_empty() => Some(RecordData::Srv(&self.srv)),
            _ => None,
        }
    }

    fn cname(&self) -> Option<&str> {
        self.cname.as_deref().filter(|target| !target.is_empty())
    }

    /// Value strings of one value-set, `None` if that set is empty
    fn values_of(&self, record_type: RecordType) -> Option<Vec<String>> {
        let values = match record_type {
            RecordType::A => RecordData::A(&self.a),
            RecordType::AAAA => RecordData::Aaaa(&self.aaaa),
            RecordType::TXT => RecordData::Txt(&self.txt),
            RecordType::CNAME => RecordData::Cname(self.cname()?),
            RecordType::NS => RecordData::Ns(&self.ns),
            RecordType::MX => RecordData::Mx(&self.mx),
            RecordType::SRV => RecordData::Srv(&self.srv),
            RecordType::Unknown => return None,
        }
        .values();
        (!values.is_empty()).then_some(values)
    }
}

/// The single populated value-set of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordData<'a> {
    A(&'a [String]),
    Aaaa(&'a [String]),
    Txt(&'a [String]),
    Cname(&'a str),
    Ns(&'a [String]),
    Mx(&'a [Mx]),
    Srv(&'a [Srv]),
}

impl RecordData<'_> {
    pub fn record_type(&self) -> RecordType {
        match self {
            RecordData::A(_) => RecordType::A,
            RecordData::Aaaa(_) => RecordType::AAAA,
            RecordData::Txt(_) => RecordType::TXT,
            RecordData::Cname(_) => RecordType::CNAME,
            RecordData::Ns(_) => RecordType::NS,
            RecordData::Mx(_) => RecordType::MX,
            RecordData::Srv(_) => RecordType::SRV,
        }
    }

    /// Presentation-form value of each entry
    ///
    /// MX renders as `priority host`, SRV as `priority weight port host`.
    pub fn values(&self) -> Vec<String> {
        match self {
            RecordData::A(v) | RecordData::Aaaa(v) | RecordData::Txt(v) | RecordData::Ns(v) => {
                v.to_vec()
            }
            RecordData::Cname(target) => vec![target.to_string()],
            RecordData::Mx(v) => v
                .iter()
                .map(|mx| format!("{} {}", mx.priority, mx.host))
                .collect(),
            RecordData::Srv(v) => v
                .iter()
                .map(|srv| format!("{} {} {} {}", srv.priority, srv.weight, srv.port, srv.host))
                .collect(),
        }
    }
}

/// One literal resource record produced by expanding a RecordSet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    pub dns_name: String,
    /// TTL in seconds
    pub ttl: u32,
    pub record_type: RecordType,
    pub value: String,
}

impl fmt::Display for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} IN {} {}",
            self.dns_name, self.ttl, self.record_type, self.value
        )
    }
}
