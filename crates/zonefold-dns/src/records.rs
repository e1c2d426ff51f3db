//! Conversion from resource objects to hickory protocol records

use crate::error::{DnsError, Result};
use hickory_proto::rr::rdata::{A, AAAA, CNAME, MX, NS, SOA, SRV, TXT};
use hickory_proto::rr::{Name, RData, Record};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;
use zonefold_crd::{fqdn, RecordType, ResourceRecord, Zone};

/// Parse a domain name, treating it as fully-qualified
pub fn parse_name(name: &str) -> Result<Name> {
    Name::from_ascii(fqdn(name)).map_err(|source| DnsError::InvalidName {
        name: name.to_string(),
        source,
    })
}

/// Convert one expanded resource record into a protocol record
pub fn to_record(rr: &ResourceRecord) -> Result<Record> {
    let name = parse_name(&rr.dns_name)?;
    let invalid = |reason: String| DnsError::InvalidValue {
        name: rr.dns_name.clone(),
        record_type: rr.record_type.to_string(),
        value: rr.value.clone(),
        reason,
    };

    let rdata = match rr.record_type {
        RecordType::A => {
            let ip: Ipv4Addr = rr.value.parse().map_err(|e| invalid(format!("{}", e)))?;
            RData::A(A(ip))
        }
        RecordType::AAAA => {
            let ip: Ipv6Addr = rr.value.parse().map_err(|e| invalid(format!("{}", e)))?;
            RData::AAAA(AAAA(ip))
        }
        RecordType::TXT => RData::TXT(TXT::new(txt_strings(&rr.value))),
        RecordType::CNAME => RData::CNAME(CNAME(parse_name(&rr.value)?)),
        RecordType::NS => RData::NS(NS(parse_name(&rr.value)?)),
        RecordType::MX => match rr.value.split_whitespace().collect::<Vec<_>>()[..] {
            [priority, host] => {
                let priority = priority
                    .parse::<u16>()
                    .map_err(|e| invalid(format!("priority: {}", e)))?;
                RData::MX(MX::new(priority, parse_name(host)?))
            }
            _ => return Err(invalid("expected 'priority host'".to_string())),
        },
        RecordType::SRV => match rr.value.split_whitespace().collect::<Vec<_>>()[..] {
            [priority, weight, port, host] => {
                let field = |label: &str, raw: &str| {
                    raw.parse::<u16>()
                        .map_err(|e| invalid(format!("{}: {}", label, e)))
                };
                RData::SRV(SRV::new(
                    field("priority", priority)?,
                    field("weight", weight)?,
                    field("port", port)?,
                    parse_name(host)?,
                ))
            }
            _ => return Err(invalid("expected 'priority weight port host'".to_string())),
        },
        RecordType::Unknown => return Err(invalid("unsupported record type".to_string())),
    };

    Ok(Record::from_rdata(name, rr.ttl, rdata))
}

/// Longest character-string a TXT record can carry
pub const MAX_TXT_STRING: usize = 255;

/// Split a TXT value into character-strings of at most 255 bytes,
/// never cutting a UTF-8 sequence in half
fn txt_strings(value: &str) -> Vec<String> {
    let mut strings = Vec::new();
    let mut rest = value;
    while rest.len() > MAX_TXT_STRING {
        let mut at = MAX_TXT_STRING;
        while !rest.is_char_boundary(at) {
            at -= 1;
        }
        let (head, tail) = rest.split_at(at);
        strings.push(head.to_string());
        rest = tail;
    }
    strings.push(rest.to_string());
    strings
}

/// Synthesize the SOA record for a zone from its SOA parameters
pub fn soa_record(zone: &Zone) -> Result<Record> {
    let soa = &zone.zone.soa;
    let origin = parse_name(&zone.fqdn())?;

    let rdata = SOA::new(
        parse_name(&soa.master)?,
        parse_name(&soa.admin)?,
        soa.serial,
        seconds_i32("refresh", soa.refresh)?,
        seconds_i32("retry", soa.retry)?,
        seconds_i32("expire", soa.expire)?,
        seconds_u32("negativeTTL", soa.negative_ttl)?,
    );

    Ok(Record::from_rdata(
        origin,
        seconds_u32("ttl", soa.ttl)?,
        RData::SOA(rdata),
    ))
}

fn seconds_i32(field: &'static str, value: Duration) -> Result<i32> {
    let secs = value.as_secs();
    i32::try_from(secs).map_err(|_| DnsError::SoaOutOfRange { field, secs })
}

fn seconds_u32(field: &'static str, value: Duration) -> Result<u32> {
    let secs = value.as_secs();
    u32::try_from(secs).map_err(|_| DnsError::SoaOutOfRange { field, secs })
}
