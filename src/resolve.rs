use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};

use log::debug;
use serde::Serialize;

use crate::error::PingError;

/// A resolved destination: the name the user gave and the IPv4 address it
/// maps to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    pub host: String,
    pub addr: Ipv4Addr,
}

impl Target {
    pub fn new(host: impl Into<String>, addr: Ipv4Addr) -> Self {
        Self {
            host: host.into(),
            addr,
        }
    }
}

/// Resolves `host` to its first IPv4 address. Dotted-quad literals skip the
/// resolver.
pub fn resolve(host: &str) -> Result<Target, PingError> {
    if let Ok(addr) = host.parse::<Ipv4Addr>() {
        return Ok(Target::new(host, addr));
    }

    let failed = |reason: String| PingError::Resolution {
        host: host.to_string(),
        reason,
    };

    if host.is_empty() {
        return Err(failed("empty host name".to_string()));
    }
    if host.parse::<IpAddr>().is_ok() {
        return Err(failed("IPv6 is not supported".to_string()));
    }

    let addrs = (host, 0)
        .to_socket_addrs()
        .map_err(|e| failed(e.to_string()))?;
    let addr = addrs
        .filter_map(|sa| match sa.ip() {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(_) => None,
        })
        .next()
        .ok_or_else(|| failed("no IPv4 address found".to_string()))?;

    debug!("resolved {host} to {addr}");
    Ok(Target::new(host, addr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_ipv4_is_used_as_is() {
        let target = resolve("192.0.2.10").expect("literal");
        assert_eq!(target.addr, Ipv4Addr::new(192, 0, 2, 10));
        assert_eq!(target.host, "192.0.2.10");
    }

    #[test]
    fn ipv6_literal_is_a_resolution_error() {
        assert!(matches!(resolve("::1"), Err(PingError::Resolution { .. })));
    }

    #[test]
    fn empty_host_is_a_resolution_error() {
        assert!(matches!(resolve(""), Err(PingError::Resolution { .. })));
    }

    #[test]
    fn unresolvable_name_is_a_resolution_error() {
        assert!(matches!(
            resolve("no-such-host.invalid"),
            Err(PingError::Resolution { .. })
        ));
    }
}
