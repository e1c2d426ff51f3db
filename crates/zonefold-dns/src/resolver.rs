//! Query resolution against the current snapshot
//!
//! Protocol-independent: `resolve` returns the sections and flags of the
//! answer, and `ZoneHandler` turns them into a DNS message.

use crate::index::LookupResult;
use crate::snapshot::ServingIndex;
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::{Name, Record, RecordType};
use tracing::{debug, warn};

/// Outcome of resolving one query
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// No managed zone contains the name; the next handler decides
    NotManaged,
    /// A managed zone matched but could not answer; reply SERVFAIL
    ServerFailure,
    /// A response to send
    Answer(ZoneResponse),
}

/// Sections and header flags of a response
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneResponse {
    /// Zone the answer came from
    pub zone: Name,
    pub authoritative: bool,
    pub response_code: ResponseCode,
    pub answers: Vec<Record>,
    pub authority: Vec<Record>,
    pub additionals: Vec<Record>,
}

/// Matches queries to managed zones and looks them up
#[derive(Debug, Clone)]
pub struct ZoneResolver {
    index: ServingIndex,
}

impl ZoneResolver {
    pub fn new(index: ServingIndex) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &ServingIndex {
        &self.index
    }

    pub fn resolve(&self, qname: &Name, qtype: RecordType) -> Resolution {
        let snapshot = self.index.snapshot();

        let Some(zone) = snapshot.find_zone(qname) else {
            debug!(name = %qname, "No managed zone for query");
            return Resolution::NotManaged;
        };
        let Some(index) = snapshot.zone_index(zone) else {
            warn!(zone = %zone, name = %qname, "Managed zone has no compiled index");
            return Resolution::ServerFailure;
        };

        let lookup = index.lookup(qname, qtype);
        debug!(
            zone = %zone,
            name = %qname,
            rtype = %qtype,
            result = ?lookup.result,
            answers = lookup.answers.len(),
            "Zone lookup"
        );

        let (authoritative, response_code) = match lookup.result {
            LookupResult::Success | LookupResult::NoData => (true, ResponseCode::NoError),
            LookupResult::NameError => (true, ResponseCode::NXDomain),
            LookupResult::Delegation => (false, ResponseCode::NoError),
            LookupResult::ServerFailure => return Resolution::ServerFailure,
        };

        Resolution::Answer(ZoneResponse {
            zone: zone.clone(),
            authoritative,
            response_code,
            answers: lookup.answers,
            authority: lookup.authority,
            additionals: lookup.additionals,
        })
    }
}
