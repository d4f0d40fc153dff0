//! Node address selection by address family

use std::net::IpAddr;

use keel_common::{AddressFamily, Error, Result};

/// Pick the address string a node advertises in its kubeadm config
///
/// - IPv4: the IPv4 address as given; it must not be empty.
/// - IPv6: the IPv6 address as given; it must parse as an IP address.
/// - Dual-stack: `"{ipv4},{ipv6}"`; the IPv6 half must parse.
///
/// Addresses are passed through verbatim, never normalized.
pub fn resolve_node_address(family: AddressFamily, ipv4: &str, ipv6: &str) -> Result<String> {
    match family {
        AddressFamily::IPv4 => {
            if ipv4.is_empty() {
                return Err(Error::address_unavailable(
                    "node has no IPv4 address but the cluster is configured for ipv4",
                ));
            }
            Ok(ipv4.to_string())
        }
        AddressFamily::IPv6 => {
            require_ipv6(ipv6, family)?;
            Ok(ipv6.to_string())
        }
        AddressFamily::DualStack => {
            require_ipv6(ipv6, family)?;
            Ok(format!("{ipv4},{ipv6}"))
        }
    }
}

fn require_ipv6(ipv6: &str, family: AddressFamily) -> Result<()> {
    ipv6.parse::<IpAddr>().map(|_| ()).map_err(|_| {
        Error::address_unavailable(format!(
            "failed to get IPv6 address for node (got {ipv6:?}); is the provider configured for {family}?"
        ))
    })
}
