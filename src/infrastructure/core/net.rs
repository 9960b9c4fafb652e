//! Caller address helpers shared by the agent and the server.

use ipnet::IpNet;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use tracing::warn;

/// Header (HTTP) and metadata key (RPC) carrying the caller's declared address
pub const REAL_IP_HEADER: &str = "x-real-ip";

/// Address of the interface that routes outbound traffic.
///
/// Connecting a UDP socket sends no packets; it only asks the kernel to pick a
/// route.
pub fn outbound_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect((Ipv4Addr::new(192, 0, 2, 1), 80)).ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}

/// The address the agent advertises: the configured override, else the
/// outbound interface, else loopback.
pub fn advertised_ip(configured: Option<&str>) -> String {
    if let Some(ip) = configured {
        return ip.to_string();
    }
    match outbound_ip() {
        Some(ip) => ip.to_string(),
        None => {
            warn!("Could not determine outbound address, advertising loopback");
            Ipv4Addr::LOCALHOST.to_string()
        }
    }
}

/// Whether a declared caller address falls inside the trusted subnet.
///
/// A missing or unparsable address is never trusted.
pub fn is_trusted(subnet: &IpNet, declared: Option<&str>) -> bool {
    declared
        .and_then(|raw| raw.trim().parse::<IpAddr>().ok())
        .is_some_and(|ip| subnet.contains(&ip))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subnet_membership() {
        let subnet: IpNet = "10.0.0.0/8".parse().unwrap();
        assert!(is_trusted(&subnet, Some("10.1.2.3")));
        assert!(is_trusted(&subnet, Some(" 10.0.0.1 ")));
        assert!(!is_trusted(&subnet, Some("192.168.1.1")));
        assert!(!is_trusted(&subnet, Some("not-an-ip")));
        assert!(!is_trusted(&subnet, None));
    }

    #[test]
    fn test_configured_address_wins() {
        assert_eq!(advertised_ip(Some("10.9.8.7")), "10.9.8.7");
        assert!(advertised_ip(None).parse::<IpAddr>().is_ok());
    }
}
