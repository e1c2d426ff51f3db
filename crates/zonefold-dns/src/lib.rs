//! Zonefold DNS: authoritative answers from compiled zone snapshots.
//!
//! Compiled zones live in a [`ZoneIndex`] each; a [`Snapshot`] groups every
//! managed zone and is published through a [`ServingIndex`]. Queries are
//! matched to the longest managed zone by [`ZoneResolver`] and answered by
//! [`ZoneHandler`], a hickory-server `RequestHandler`. Names outside every
//! managed zone are handed to the next handler in the chain.

pub mod config;
pub mod error;
pub mod handler;
pub mod index;
pub mod records;
pub mod resolver;
pub mod server;
pub mod snapshot;

pub use config::DnsServerConfig;
pub use error::{DnsError, Result};
pub use handler::{Refused, ZoneHandler};
pub use index::{LookupResult, ZoneIndex, ZoneLookup};
pub use records::{parse_name, soa_record, to_record};
pub use resolver::{Resolution, ZoneResolver, ZoneResponse};
pub use server::DnsServer;
pub use snapshot::{ServingIndex, Snapshot};
