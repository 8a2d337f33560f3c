//! Caller address resolution
//!
//! The address written to DNS is the one the transport observed, never a
//! value the client supplied. A forwarded-for header is honoured only when
//! the connection's peer is on the operator's allow-list of trusted proxies
//! (the TLS-terminating gateway in front of the daemon).

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use crate::config::ServiceConfig;
use crate::error::{Error, Result};

/// A network in CIDR notation (`10.0.0.0/8`, `2001:db8::/32`, or a bare host)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyNet {
    addr: IpAddr,
    prefix: u8,
}

impl ProxyNet {
    /// Check whether `ip` lies inside this network
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.addr, ip.to_canonical()) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = u32::MAX.checked_shl(32 - u32::from(self.prefix)).unwrap_or(0);
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = u128::MAX.checked_shl(128 - u32::from(self.prefix)).unwrap_or(0);
                u128::from(net) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }
}

impl FromStr for ProxyNet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (addr_part, prefix_part) = match s.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (s, None),
        };

        let written: IpAddr = addr_part
            .parse()
            .map_err(|_| Error::config(format!("Invalid trusted proxy address: '{}'", s)))?;
        let addr = written.to_canonical();

        let max_prefix = if written.is_ipv4() { 32 } else { 128 };
        let prefix = match prefix_part {
            Some(p) => p
                .parse::<u8>()
                .ok()
                .filter(|p| *p <= max_prefix)
                .ok_or_else(|| {
                    Error::config(format!("Invalid trusted proxy prefix length: '{}'", s))
                })?,
            None => max_prefix,
        };

        // `::ffff:a.b.c.d/N` covers the IPv4 network a.b.c.d/(N - 96)
        let prefix = if written.is_ipv6() && addr.is_ipv4() {
            prefix.checked_sub(96).ok_or_else(|| {
                Error::config(format!(
                    "IPv4-mapped trusted proxy prefix must be at least 96: '{}'",
                    s
                ))
            })?
        } else {
            prefix
        };

        Ok(Self { addr, prefix })
    }
}

/// Connection metadata the resolver works from
#[derive(Debug, Clone)]
pub struct ConnectionMeta {
    /// Address of the directly connected peer
    pub peer: IpAddr,
    /// Raw value of the configured forwarded-for header, if present
    ///
    /// Multiple header lines are joined with `,` by the transport layer.
    pub forwarded_for: Option<String>,
}

impl ConnectionMeta {
    /// Metadata for a direct connection with no forwarding header
    pub fn direct(peer: IpAddr) -> Self {
        Self {
            peer,
            forwarded_for: None,
        }
    }
}

/// Resolves the caller's address from connection metadata
#[derive(Debug, Clone, Default)]
pub struct AddressResolver {
    trusted_proxies: Vec<ProxyNet>,
}

impl AddressResolver {
    /// Create a resolver trusting the given proxy networks
    pub fn new(trusted_proxies: Vec<ProxyNet>) -> Self {
        Self { trusted_proxies }
    }

    /// Create a resolver from the service configuration
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        let trusted_proxies = config
            .trusted_proxies
            .iter()
            .map(|cidr| cidr.parse())
            .collect::<Result<Vec<ProxyNet>>>()?;
        Ok(Self::new(trusted_proxies))
    }

    fn is_trusted(&self, ip: IpAddr) -> bool {
        self.trusted_proxies.iter().any(|net| net.contains(ip))
    }

    /// Determine the caller's address
    ///
    /// - Untrusted peer: the peer address, forwarding headers ignored.
    /// - Trusted peer: the right-most forwarded entry that is not itself a
    ///   trusted proxy (or the left-most entry when every hop is trusted).
    ///   Only hops from the right up to that entry must parse.
    ///
    /// The result is canonical: IPv4-mapped IPv6 addresses come back as IPv4.
    pub fn resolve(&self, meta: &ConnectionMeta) -> Result<IpAddr> {
        let peer = meta.peer.to_canonical();

        if !self.is_trusted(peer) {
            return Ok(peer);
        }

        let chain = meta
            .forwarded_for
            .as_deref()
            .map(str::trim)
            .filter(|chain| !chain.is_empty())
            .ok_or_else(|| {
                Error::invalid_request(format!(
                    "Trusted proxy {} did not report a client address",
                    peer
                ))
            })?;

        // Entries left of the first untrusted hop are client-supplied and
        // never parsed, so junk there cannot fail the request.
        let mut resolved = None;
        for raw in chain.rsplit(',') {
            let hop = parse_hop(raw)?;
            resolved = Some(hop);
            if !self.is_trusted(hop) {
                break;
            }
        }
        let resolved =
            resolved.ok_or_else(|| Error::invalid_request("Empty forwarded-for header"))?;

        tracing::trace!(peer = %peer, caller = %resolved, "Resolved caller through trusted proxy");
        Ok(resolved)
    }
}

// Accepts `203.0.113.7`, `2001:db8::1`, `203.0.113.7:5123` and `[2001:db8::1]:5123`.
fn parse_hop(raw: &str) -> Result<IpAddr> {
    let raw = raw.trim();
    raw.parse::<IpAddr>()
        .or_else(|_| raw.parse::<SocketAddr>().map(|sock| sock.ip()))
        .map(|ip| ip.to_canonical())
        .map_err(|_| Error::invalid_request(format!("Unparseable forwarded address: '{}'", raw)))
}
