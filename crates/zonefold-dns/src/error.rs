//! Error types for building zone data

use thiserror::Error;

/// Errors raised while turning resource data into protocol records
#[derive(Debug, Error)]
pub enum DnsError {
    /// A name could not be parsed as a domain name
    #[error("Invalid domain name '{name}': {source}")]
    InvalidName {
        name: String,
        #[source]
        source: hickory_proto::ProtoError,
    },

    /// A record value could not be parsed for its type
    #[error("Invalid {record_type} value '{value}' for {name}: {reason}")]
    InvalidValue {
        name: String,
        record_type: String,
        value: String,
        reason: String,
    },

    /// A record does not belong under the index origin
    #[error("Record {name} is outside zone {origin}")]
    OutOfZone { name: String, origin: String },

    /// A duration does not fit the SOA field it is written to
    #[error("SOA {field} of {secs}s is out of range")]
    SoaOutOfRange { field: &'static str, secs: u64 },
}

/// Result type for zone building
pub type Result<T> = std::result::Result<T, DnsError>;
