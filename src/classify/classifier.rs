use std::net::Ipv4Addr;

use crate::extraction::types::CandidateEvent;
use crate::storage::types::Direction;

/// Result of classifying one candidate event: which side is the externally
/// routable endpoint, which is ours, and who reached out to whom.
#[derive(Debug, Clone, PartialEq)]
pub struct Classified {
    pub external: Ipv4Addr,
    pub external_port: Option<u16>,
    /// Internal peer, "WAN" when the traffic was observed on the egress side,
    /// None when the source only reports the remote endpoint.
    pub local: Option<String>,
    pub local_port: Option<u16>,
    pub direction: Direction,
}

/// RFC1918 private ranges plus loopback.
pub fn is_internal(addr: Ipv4Addr) -> bool {
    addr.is_private() || addr.is_loopback()
}

/// Addresses that never qualify as an external endpoint regardless of
/// routing: link-local, multicast, broadcast, and the zero address.
pub fn is_excluded(addr: Ipv4Addr) -> bool {
    addr.is_link_local() || addr.is_multicast() || addr.is_broadcast() || addr.is_unspecified()
}

fn external_ok(addr: Ipv4Addr, egress: Option<Ipv4Addr>) -> bool {
    !is_internal(addr) && !is_excluded(addr) && Some(addr) != egress
}

/// Classify a candidate event against the resolved egress address.
///
/// Returns None for records with no usable external endpoint: internal-only
/// traffic, self-traffic against the egress address, and ambiguous
/// external/external pairs when no egress address is known.
pub fn classify(event: &CandidateEvent, egress: Option<Ipv4Addr>) -> Option<Classified> {
    // Conntrack entries carry both tuples; direction falls out of which
    // side originated.
    if event.reply_src.is_some() {
        return classify_conntrack(event, egress);
    }

    let dst = match event.dst {
        Some(d) => d,
        // Single-endpoint sources (VPN peers, some probe lines) report only
        // the remote side.
        None => {
            if !external_ok(event.src, egress) {
                return None;
            }
            return Some(Classified {
                external: event.src,
                external_port: event.src_port,
                local: None,
                local_port: None,
                direction: if event.locally_originated {
                    Direction::Outbound
                } else {
                    Direction::Inbound
                },
            });
        }
    };

    let default_direction = if event.locally_originated {
        Direction::Outbound
    } else {
        Direction::Inbound
    };

    match (is_internal(event.src), is_internal(dst)) {
        // Internal-only traffic carries no external endpoint.
        (true, true) => None,
        (true, false) => {
            if !external_ok(dst, egress) {
                return None;
            }
            Some(Classified {
                external: dst,
                external_port: event.dst_port,
                local: Some(event.src.to_string()),
                local_port: event.src_port,
                direction: default_direction,
            })
        }
        (false, true) => {
            if !external_ok(event.src, egress) {
                return None;
            }
            Some(Classified {
                external: event.src,
                external_port: event.src_port,
                local: Some(dst.to_string()),
                local_port: event.dst_port,
                direction: default_direction,
            })
        }
        // Neither side is internal. Traffic observed on the egress side is
        // kept when exactly one endpoint is our own resolved address; with no
        // egress address known the record is ambiguous and dropped.
        (false, false) => {
            let egress_addr = egress?;
            if event.src == egress_addr && external_ok(dst, egress) {
                Some(Classified {
                    external: dst,
                    external_port: event.dst_port,
                    local: Some("WAN".to_string()),
                    local_port: event.src_port,
                    direction: Direction::Outbound,
                })
            } else if dst == egress_addr && external_ok(event.src, egress) {
                Some(Classified {
                    external: event.src,
                    external_port: event.src_port,
                    local: Some("WAN".to_string()),
                    local_port: event.dst_port,
                    direction: Direction::Inbound,
                })
            } else {
                None
            }
        }
    }
}

fn classify_conntrack(event: &CandidateEvent, egress: Option<Ipv4Addr>) -> Option<Classified> {
    let dst = event.dst?;

    // Outbound: original source is internal, toward a non-egress external
    // destination.
    if is_internal(event.src) && external_ok(dst, egress) {
        return Some(Classified {
            external: dst,
            external_port: event.dst_port,
            local: Some(event.src.to_string()),
            local_port: event.src_port,
            direction: Direction::Outbound,
        });
    }

    // Inbound (NAT/port-forward pattern): the reply heads from an external
    // source back toward an internal destination.
    if let (Some(reply_src), Some(reply_dst)) = (event.reply_src, event.reply_dst) {
        if external_ok(reply_src, egress) && is_internal(reply_dst) {
            // Original tuple reads external:sport -> forwarded dport.
            return Some(Classified {
                external: reply_src,
                external_port: event.src_port,
                local: Some(reply_dst.to_string()),
                local_port: event.dst_port,
                direction: Direction::Inbound,
            });
        }
    }

    // Plain inbound without NAT rewriting.
    if external_ok(event.src, egress) && is_internal(dst) {
        return Some(Classified {
            external: event.src,
            external_port: event.src_port,
            local: Some(dst.to_string()),
            local_port: event.dst_port,
            direction: Direction::Inbound,
        });
    }

    None
}
