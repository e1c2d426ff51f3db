//! Error types for the controller

use std::path::PathBuf;
use thiserror::Error;
use zonefold_crd::CrdError;
use zonefold_dns::DnsError;

/// Error type for store, manifest and reconcile operations
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Configuration store failure
    #[error("config store error: {0}")]
    Store(String),

    /// Object rejected at admission
    #[error(transparent)]
    Admission(#[from] CrdError),

    /// Compile pass aborted; the previous snapshot stays current
    #[error("compile failed: {0}")]
    Compile(#[from] CompileError),

    /// A manifest file could not be read or decoded
    #[error("manifest {}: {message}", path.display())]
    Manifest { path: PathBuf, message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a compile pass failed
#[derive(Debug, Error)]
pub enum CompileError {
    /// The zone itself (name or SOA) could not be built
    #[error("zone {zone}: {source}")]
    Zone {
        zone: String,
        #[source]
        source: DnsError,
    },

    /// A record set could not be turned into protocol records
    #[error("record set {record_set} in zone {zone}: {source}")]
    Record {
        record_set: String,
        zone: String,
        #[source]
        source: DnsError,
    },
}

/// Result type for controller operations
pub type Result<T> = std::result::Result<T, ControllerError>;
