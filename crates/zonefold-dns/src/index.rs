//! Compiled zone data and the lookup algorithm
//!
//! A `ZoneIndex` holds every record of one zone keyed by owner name and
//! type. It is built once per reconciliation pass and never mutated after
//! it is published, so lookups take `&self` and need no locking.
//!
//! Lookup follows RFC 1034 section 4.3.2: zone cuts below the apex turn
//! into referrals, exact names answer or return no-data, CNAMEs are chased
//! inside the zone, and missing names fall back to a wildcard at the
//! closest encloser before becoming NXDOMAIN.

use crate::error::{DnsError, Result};
use hickory_proto::rr::{LowerName, Name, RData, Record, RecordType};
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

/// Longest CNAME chain followed inside one zone
pub const MAX_CNAME_CHAIN: usize = 8;

/// Classification of a zone lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupResult {
    /// Records of the requested type (or a CNAME chain) were found
    Success,
    /// The name exists but has no records of the requested type
    NoData,
    /// The name does not exist in the zone (NXDOMAIN)
    NameError,
    /// The name lies at or below a zone cut; the answer is a referral
    Delegation,
    /// The zone cannot answer for this name
    ServerFailure,
}

/// Sections produced by a lookup
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneLookup {
    pub answers: Vec<Record>,
    pub authority: Vec<Record>,
    pub additionals: Vec<Record>,
    pub result: LookupResult,
}

impl ZoneLookup {
    fn empty(result: LookupResult) -> Self {
        Self {
            answers: Vec::new(),
            authority: Vec::new(),
            additionals: Vec::new(),
            result,
        }
    }

    fn server_failure() -> Self {
        Self::empty(LookupResult::ServerFailure)
    }

    fn negative(result: LookupResult, soa: &Record) -> Self {
        Self {
            authority: vec![soa.clone()],
            ..Self::empty(result)
        }
    }
}

/// All records at one owner name
#[derive(Debug, Clone, Default, PartialEq)]
struct Node {
    rrsets: BTreeMap<RecordType, Vec<Record>>,
}

impl Node {
    fn get(&self, record_type: RecordType) -> &[Record] {
        self.rrsets
            .get(&record_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn all(&self) -> Vec<Record> {
        self.rrsets.values().flatten().cloned().collect()
    }
}

/// Records of one zone, optimized for exact, wildcard and delegation lookups
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneIndex {
    origin: Name,
    lower_origin: LowerName,
    nodes: BTreeMap<LowerName, Node>,
    /// Every owner name plus each ancestor up to the apex, so empty
    /// non-terminals are known to exist
    names: BTreeSet<LowerName>,
}

impl ZoneIndex {
    /// Create an empty index for the zone at `origin`
    pub fn new(origin: Name) -> Self {
        let lower_origin = LowerName::from(&origin);
        let mut names = BTreeSet::new();
        names.insert(lower_origin.clone());
        Self {
            origin,
            lower_origin,
            nodes: BTreeMap::new(),
            names,
        }
    }

    pub fn origin(&self) -> &Name {
        &self.origin
    }

    /// Number of records held
    pub fn len(&self) -> usize {
        self.nodes
            .values()
            .flat_map(|node| node.rrsets.values())
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The zone's SOA record, if one was inserted
    pub fn soa(&self) -> Option<&Record> {
        self.nodes
            .get(&self.lower_origin)
            .and_then(|node| node.get(RecordType::SOA).first())
    }

    /// Insert a record. Identical records are stored once; a second SOA
    /// replaces the first.
    pub fn insert(&mut self, record: Record) -> Result<()> {
        let owner = LowerName::from(record.name());
        if !self.lower_origin.zone_of(&owner) {
            return Err(DnsError::OutOfZone {
                name: record.name().to_string(),
                origin: self.origin.to_string(),
            });
        }
        let record_type = record.record_type();
        if record_type == RecordType::SOA && owner != self.lower_origin {
            return Err(DnsError::OutOfZone {
                name: record.name().to_string(),
                origin: self.origin.to_string(),
            });
        }

        let mut name = owner.clone();
        while name != self.lower_origin && self.names.insert(name.clone()) {
            name = name.base_name();
        }

        trace!(zone = %self.origin, record = %record, "Indexed record");
        let rrset = self
            .nodes
            .entry(owner)
            .or_default()
            .rrsets
            .entry(record_type)
            .or_default();
        if record_type == RecordType::SOA {
            rrset.clear();
        } else if rrset.iter().any(|existing| existing.data() == record.data()) {
            return Ok(());
        }
        rrset.push(record);
        Ok(())
    }

    /// Look up `qname`/`qtype`
    pub fn lookup(&self, qname: &Name, qtype: RecordType) -> ZoneLookup {
        let lower = LowerName::from(qname);
        if !self.lower_origin.zone_of(&lower) {
            return ZoneLookup::server_failure();
        }
        let Some(soa) = self.soa() else {
            return ZoneLookup::server_failure();
        };

        if let Some(referral) = self.delegation(qname) {
            return referral;
        }

        if self.names.contains(&lower) {
            return match self.nodes.get(&lower) {
                Some(node) => self.answer(qname, node, qtype, soa, false),
                None => ZoneLookup::negative(LookupResult::NoData, soa),
            };
        }

        match self.wildcard(qname) {
            Some(node) => self.answer(qname, node, qtype, soa, true),
            None => ZoneLookup::negative(LookupResult::NameError, soa),
        }
    }

    /// Referral for the highest zone cut between the apex (exclusive) and `qname`
    fn delegation(&self, qname: &Name) -> Option<ZoneLookup> {
        let apex_labels = usize::from(self.origin.num_labels());
        let qname_labels = usize::from(qname.num_labels());

        (apex_labels + 1..=qname_labels).find_map(|labels| {
            let cut = LowerName::from(qname.trim_to(labels));
            let ns = self.nodes.get(&cut)?.get(RecordType::NS);
            if ns.is_empty() {
                return None;
            }
            Some(ZoneLookup {
                authority: ns.to_vec(),
                additionals: self.additional_addresses(ns),
                ..ZoneLookup::empty(LookupResult::Delegation)
            })
        })
    }

    /// Wildcard node at the closest encloser of a name that does not exist
    fn wildcard(&self, qname: &Name) -> Option<&Node> {
        let mut encloser = qname.base_name();
        while !self.names.contains(&LowerName::from(&encloser)) {
            if encloser.num_labels() <= self.origin.num_labels() {
                return None;
            }
            encloser = encloser.base_name();
        }
        let wildcard = encloser.prepend_label("*").ok()?;
        self.nodes.get(&LowerName::from(&wildcard))
    }

    /// Exact (or wildcard-synthesized) node, without zone cut handling
    fn node_for(&self, name: &Name) -> Option<(&Node, bool)> {
        let lower = LowerName::from(name);
        if let Some(node) = self.nodes.get(&lower) {
            return Some((node, false));
        }
        if self.names.contains(&lower) {
            return None;
        }
        self.wildcard(name).map(|node| (node, true))
    }

    fn answer(
        &self,
        qname: &Name,
        node: &Node,
        qtype: RecordType,
        soa: &Record,
        synthesized: bool,
    ) -> ZoneLookup {
        let mut answers = if qtype == RecordType::ANY {
            owned(&node.all(), qname, synthesized)
        } else {
            owned(node.get(qtype), qname, synthesized)
        };

        if answers.is_empty() {
            let cname = node.get(RecordType::CNAME);
            if cname.is_empty() {
                return ZoneLookup::negative(LookupResult::NoData, soa);
            }
            answers = owned(cname, qname, synthesized);
            self.chase_cname(&mut answers, qtype);
        }

        let mut additionals = self.additional_addresses(&answers);
        additionals.retain(|extra| !answers.contains(extra));

        let apex_ns_query = LowerName::from(qname) == self.lower_origin
            && matches!(qtype, RecordType::NS | RecordType::ANY);
        let authority = if apex_ns_query {
            Vec::new()
        } else {
            self.nodes
                .get(&self.lower_origin)
                .map(|apex| apex.get(RecordType::NS).to_vec())
                .unwrap_or_default()
        };

        ZoneLookup {
            answers,
            authority,
            additionals,
            result: LookupResult::Success,
        }
    }

    /// Follow CNAME targets inside this zone, appending what they resolve to
    fn chase_cname(&self, answers: &mut Vec<Record>, qtype: RecordType) {
        let mut target = answers.last().and_then(cname_target);
        for _ in 0..MAX_CNAME_CHAIN {
            let Some(name) = target.take() else { break };
            if !self.origin.zone_of(&name) || self.delegation(&name).is_some() {
                break;
            }
            let Some((node, synthesized)) = self.node_for(&name) else {
                break;
            };

            let found = node.get(qtype);
            if !found.is_empty() {
                answers.extend(owned(found, &name, synthesized));
                break;
            }
            let next = node.get(RecordType::CNAME);
            if next.is_empty() {
                break;
            }
            let next = owned(next, &name, synthesized);
            if next.iter().any(|record| answers.contains(record)) {
                break;
            }
            target = next.last().and_then(cname_target);
            answers.extend(next);
        }
    }

    /// In-zone A/AAAA records for the targets of NS, MX and SRV records
    fn additional_addresses(&self, records: &[Record]) -> Vec<Record> {
        let mut extra = Vec::new();
        for target in records.iter().filter_map(target_name) {
            if !self.origin.zone_of(&target) {
                continue;
            }
            if let Some(node) = self.nodes.get(&LowerName::from(&target)) {
                for record_type in [RecordType::A, RecordType::AAAA] {
                    for record in node.get(record_type) {
                        if !extra.contains(record) {
                            extra.push(record.clone());
                        }
                    }
                }
            }
        }
        extra
    }
}

/// Clone `records`, renaming them to `owner` when synthesized from a wildcard
fn owned(records: &[Record], owner: &Name, synthesized: bool) -> Vec<Record> {
    records
        .iter()
        .cloned()
        .map(|mut record| {
            if synthesized {
                record.set_name(owner.clone());
            }
            record
        })
        .collect()
}

fn cname_target(record: &Record) -> Option<Name> {
    match record.data() {
        RData::CNAME(cname) => Some(cname.0.clone()),
        _ => None,
    }
}

fn target_name(record: &Record) -> Option<Name> {
    match record.data() {
        RData::NS(ns) => Some(ns.0.clone()),
        RData::MX(mx) => Some(mx.exchange().clone()),
        RData::SRV(srv) => Some(srv.target().clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::rr::rdata::{A, AAAA, CNAME, MX, NS, SOA, TXT};
    use std::str::FromStr;

    fn name(s: &str) -> Name {
        Name::from_str(s).unwrap()
    }

    fn a(owner: &str, ip: [u8; 4]) -> Record {
        Record::from_rdata(name(owner), 300, RData::A(A::new(ip[0], ip[1], ip[2], ip[3])))
    }

    fn soa() -> Record {
        Record::from_rdata(
            name("example.com."),
            3600,
            RData::SOA(SOA::new(
                name("ns1.example.com."),
                name("hostmaster.example.com."),
                1,
                86_400,
                7_200,
                3_600_000,
                172_800,
            )),
        )
    }

    fn zone() -> ZoneIndex {
        let mut index = ZoneIndex::new(name("example.com."));
        let records = vec![
            soa(),
            Record::from_rdata(name("example.com."), 300, RData::NS(NS(name("ns1.example.com.")))),
            a("ns1.example.com.", [10, 0, 0, 53]),
            a("www.example.com.", [1, 2, 3, 4]),
            a("www.example.com.", [1, 2, 3, 5]),
            Record::from_rdata(
                name("www.example.com."),
                300,
                RData::AAAA(AAAA("2001:db8::1".parse().unwrap())),
            ),
            Record::from_rdata(
                name("alias.example.com."),
                300,
                RData::CNAME(CNAME(name("www.example.com."))),
            ),
            Record::from_rdata(
                name("loop1.example.com."),
                300,
                RData::CNAME(CNAME(name("loop2.example.com."))),
            ),
            Record::from_rdata(
                name("loop2.example.com."),
                300,
                RData::CNAME(CNAME(name("loop1.example.com."))),
            ),
            Record::from_rdata(
                name("example.com."),
                300,
                RData::MX(MX::new(10, name("mail.example.com."))),
            ),
            a("mail.example.com.", [10, 0, 0, 25]),
            a("host.deep.example.com.", [10, 0, 0, 9]),
            Record::from_rdata(
                name("*.apps.example.com."),
                60,
                RData::TXT(TXT::new(vec!["wild".to_string()])),
            ),
            Record::from_rdata(
                name("sub.example.com."),
                300,
                RData::NS(NS(name("ns.sub.example.com."))),
            ),
            a("ns.sub.example.com.", [10, 1, 0, 53]),
        ];
        for record in records {
            index.insert(record).unwrap();
        }
        index
    }

    #[test]
    fn test_insert_rejects_out_of_zone() {
        let mut index = ZoneIndex::new(name("example.com."));
        assert!(matches!(
            index.insert(a("www.evil.com.", [1, 1, 1, 1])),
            Err(DnsError::OutOfZone { .. })
        ));
        assert!(index.insert(a("wwwexample.com.", [1, 1, 1, 1])).is_err());
        assert!(index.is_empty());
    }

    #[test]
    fn test_insert_deduplicates() {
        let mut index = ZoneIndex::new(name("example.com."));
        index.insert(a("www.example.com.", [1, 2, 3, 4])).unwrap();
        index.insert(a("www.example.com.", [1, 2, 3, 4])).unwrap();
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_exact_match() {
        let lookup = zone().lookup(&name("www.example.com."), RecordType::A);
        assert_eq!(lookup.result, LookupResult::Success);
        assert_eq!(lookup.answers.len(), 2);
        assert_eq!(lookup.authority.len(), 1);
        assert_eq!(lookup.authority[0].record_type(), RecordType::NS);
    }

    #[test]
    fn test_case_insensitive() {
        let lookup = zone().lookup(&name("WWW.Example.COM."), RecordType::AAAA);
        assert_eq!(lookup.result, LookupResult::Success);
        assert_eq!(lookup.answers.len(), 1);
    }

    #[test]
    fn test_no_data() {
        let lookup = zone().lookup(&name("www.example.com."), RecordType::TXT);
        assert_eq!(lookup.result, LookupResult::NoData);
        assert!(lookup.answers.is_empty());
        assert_eq!(lookup.authority, vec![soa()]);
    }

    #[test]
    fn test_empty_non_terminal_is_no_data() {
        let lookup = zone().lookup(&name("deep.example.com."), RecordType::A);
        assert_eq!(lookup.result, LookupResult::NoData);
    }

    #[test]
    fn test_name_error() {
        let lookup = zone().lookup(&name("missing.example.com."), RecordType::A);
        assert_eq!(lookup.result, LookupResult::NameError);
        assert_eq!(lookup.authority, vec![soa()]);
    }

    #[test]
    fn test_outside_origin_is_server_failure() {
        let lookup = zone().lookup(&name("www.example.org."), RecordType::A);
        assert_eq!(lookup.result, LookupResult::ServerFailure);
    }

    #[test]
    fn test_missing_soa_is_server_failure() {
        let mut index = ZoneIndex::new(name("example.com."));
        index.insert(a("www.example.com.", [1, 2, 3, 4])).unwrap();
        let lookup = index.lookup(&name("www.example.com."), RecordType::A);
        assert_eq!(lookup.result, LookupResult::ServerFailure);
    }

    #[test]
    fn test_soa_query_at_apex() {
        let lookup = zone().lookup(&name("example.com."), RecordType::SOA);
        assert_eq!(lookup.result, LookupResult::Success);
        assert_eq!(lookup.answers, vec![soa()]);
    }

    #[test]
    fn test_apex_ns_has_glue_and_no_authority() {
        let lookup = zone().lookup(&name("example.com."), RecordType::NS);
        assert_eq!(lookup.result, LookupResult::Success);
        assert!(lookup.authority.is_empty());
        assert_eq!(lookup.additionals, vec![a("ns1.example.com.", [10, 0, 0, 53])]);
    }

    #[test]
    fn test_mx_additional() {
        let lookup = zone().lookup(&name("example.com."), RecordType::MX);
        assert_eq!(lookup.result, LookupResult::Success);
        assert_eq!(lookup.additionals, vec![a("mail.example.com.", [10, 0, 0, 25])]);
    }

    #[test]
    fn test_cname_is_chased() {
        let lookup = zone().lookup(&name("alias.example.com."), RecordType::A);
        assert_eq!(lookup.result, LookupResult::Success);
        assert_eq!(lookup.answers.len(), 3);
        assert_eq!(lookup.answers[0].record_type(), RecordType::CNAME);
        assert_eq!(lookup.answers[1].record_type(), RecordType::A);
    }

    #[test]
    fn test_cname_query_not_chased() {
        let lookup = zone().lookup(&name("alias.example.com."), RecordType::CNAME);
        assert_eq!(lookup.answers.len(), 1);
    }

    #[test]
    fn test_cname_loop_terminates() {
        let lookup = zone().lookup(&name("loop1.example.com."), RecordType::A);
        assert_eq!(lookup.result, LookupResult::Success);
        assert_eq!(lookup.answers.len(), 2);
    }

    #[test]
    fn test_wildcard_synthesis() {
        let lookup = zone().lookup(&name("anything.apps.example.com."), RecordType::TXT);
        assert_eq!(lookup.result, LookupResult::Success);
        assert_eq!(lookup.answers.len(), 1);
        assert_eq!(lookup.answers[0].name(), &name("anything.apps.example.com."));

        let lookup = zone().lookup(&name("anything.apps.example.com."), RecordType::A);
        assert_eq!(lookup.result, LookupResult::NoData);
    }

    #[test]
    fn test_wildcard_covers_deeper_names() {
        let lookup = zone().lookup(&name("a.b.apps.example.com."), RecordType::TXT);
        assert_eq!(lookup.result, LookupResult::Success);
        assert_eq!(lookup.answers[0].name(), &name("a.b.apps.example.com."));
    }

    #[test]
    fn test_wildcard_only_at_closest_encloser() {
        // www exists, so only *.www could match below it
        let lookup = zone().lookup(&name("x.www.example.com."), RecordType::TXT);
        assert_eq!(lookup.result, LookupResult::NameError);
    }

    #[test]
    fn test_delegation() {
        for qname in ["sub.example.com.", "host.sub.example.com."] {
            let lookup = zone().lookup(&name(qname), RecordType::A);
            assert_eq!(lookup.result, LookupResult::Delegation, "{}", qname);
            assert!(lookup.answers.is_empty());
            assert_eq!(lookup.authority.len(), 1);
            assert_eq!(lookup.additionals, vec![a("ns.sub.example.com.", [10, 1, 0, 53])]);
        }
    }

    #[test]
    fn test_any_returns_all_types() {
        let lookup = zone().lookup(&name("www.example.com."), RecordType::ANY);
        assert_eq!(lookup.result, LookupResult::Success);
        assert_eq!(lookup.answers.len(), 3);
    }

    #[test]
    fn test_indexes_compare_equal() {
        assert_eq!(zone(), zone());
    }
}
