//! Zonefold resource types
//!
//! This crate provides the declarative objects an operator writes to
//! describe authoritative DNS data, plus the admission logic that runs
//! before those objects are accepted.
//!
//! # API Group
//!
//! All types use the `zonefold.dev/v1alpha1` API group.
//!
//! # Resources
//!
//! - `Zone` - A DNS zone and the parameters of its SOA record
//! - `RecordSet` - One owner name carrying exactly one kind of record data
//!
//! Admission (`Admission`) applies defaults and returns field-level
//! validation errors; nothing here talks to the network or to storage.

pub mod admission;
pub mod duration;
pub mod error;
pub mod metadata;
pub mod recordset;
pub mod validation;
pub mod zone;

pub use admission::*;
pub use error::*;
pub use metadata::*;
pub use recordset::*;
pub use validation::{FieldError, FieldErrors, FieldPath};
pub use zone::*;

/// API version for all Zonefold resources
pub const API_VERSION: &str = "zonefold.dev/v1alpha1";

/// API group for all Zonefold resources
pub const API_GROUP: &str = "zonefold.dev";

/// API version string
pub const VERSION: &str = "v1alpha1";
