//! Client identity

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ContractError;

/// Network identity of a client device.
///
/// Ports are configured per channel, so only the IP address takes part in
/// equality. Used as the pending-set key and the registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientAddress(IpAddr);

impl ClientAddress {
    pub const fn new(ip: IpAddr) -> Self {
        Self(ip)
    }

    pub const fn ip(&self) -> IpAddr {
        self.0
    }

    /// Endpoint of this client on the given channel port
    pub const fn with_port(&self, port: u16) -> SocketAddr {
        SocketAddr::new(self.0, port)
    }
}

impl From<IpAddr> for ClientAddress {
    fn from(ip: IpAddr) -> Self {
        Self(ip)
    }
}

impl From<SocketAddr> for ClientAddress {
    fn from(addr: SocketAddr) -> Self {
        Self(addr.ip())
    }
}

impl fmt::Display for ClientAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ClientAddress {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<IpAddr>()
            .map(Self)
            .map_err(|e| ContractError::InvalidAddress {
                input: s.to_string(),
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_parse_and_display() {
        let addr: ClientAddress = "192.168.1.20".parse().unwrap();
        assert_eq!(addr.to_string(), "192.168.1.20");
        assert_eq!(addr.with_port(9428).port(), 9428);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = "not-an-ip".parse::<ClientAddress>().unwrap_err();
        assert!(err.to_string().contains("not-an-ip"));
    }

    #[test]
    fn test_port_does_not_affect_identity() {
        let a = ClientAddress::from("10.0.0.5:1000".parse::<SocketAddr>().unwrap());
        let b = ClientAddress::from("10.0.0.5:2000".parse::<SocketAddr>().unwrap());
        assert_eq!(a, b);

        let mut set = HashSet::new();
        assert!(set.insert(a));
        assert!(!set.insert(b));
    }

    #[test]
    fn test_serde_is_plain_string() {
        let addr: ClientAddress = "::1".parse().unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"::1\"");
        let back: ClientAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
