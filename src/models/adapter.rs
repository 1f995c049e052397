// WOL Uplink - Adapter Model
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Network adapter and link types.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Type of network adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterType {
    /// Wired Ethernet adapter.
    Ethernet,
    /// Wireless (WiFi) adapter.
    Wifi,
    /// Virtual adapter (bridges, VLANs, etc.).
    Virtual,
    /// Loopback interface.
    Loopback,
    /// Unknown or other type.
    Other,
}

impl AdapterType {
    /// Get human-readable name for this adapter type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Ethernet => "Ethernet",
            Self::Wifi => "Wi-Fi",
            Self::Virtual => "Virtual",
            Self::Loopback => "Loopback",
            Self::Other => "Network",
        }
    }

    /// Whether this adapter can carry the uplink (physical interfaces only).
    pub fn is_uplink_candidate(&self) -> bool {
        matches!(self, Self::Ethernet | Self::Wifi | Self::Other)
    }
}

/// Information about a detected network adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterInfo {
    /// Interface name (e.g., "eth0", "wlan0", "enp3s0").
    pub name: String,
    /// Type of adapter.
    pub adapter_type: AdapterType,
    /// Whether the adapter is currently connected/up.
    pub is_connected: bool,
}

impl AdapterInfo {
    /// Create a new AdapterInfo.
    pub fn new(name: impl Into<String>, adapter_type: AdapterType) -> Self {
        Self {
            name: name.into(),
            adapter_type,
            is_connected: false,
        }
    }

    /// Get a display label for the adapter.
    pub fn display_label(&self) -> String {
        format!("{} - {}", self.name, self.adapter_type.display_name())
    }
}

/// IPv4 addressing of a connected link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkAddress {
    /// Local address on the link.
    pub local: Ipv4Addr,
    /// Subnet mask of the link.
    pub netmask: Ipv4Addr,
}

impl LinkAddress {
    pub fn new(local: Ipv4Addr, netmask: Ipv4Addr) -> Self {
        Self { local, netmask }
    }

    /// Build from a CIDR prefix length (e.g. 24).
    pub fn from_prefix(local: Ipv4Addr, prefix: u8) -> Option<Self> {
        if prefix > 32 {
            return None;
        }
        let mask = if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) };
        Some(Self::new(local, Ipv4Addr::from(mask)))
    }

    /// Directed broadcast address of the subnet.
    pub fn broadcast(&self) -> Ipv4Addr {
        let ip = u32::from(self.local);
        let mask = u32::from(self.netmask);
        Ipv4Addr::from((ip & mask) | !mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_address() {
        let link = LinkAddress::new(Ipv4Addr::new(192, 168, 1, 42), Ipv4Addr::new(255, 255, 255, 0));
        assert_eq!(link.broadcast(), Ipv4Addr::new(192, 168, 1, 255));

        let link = LinkAddress::new(Ipv4Addr::new(10, 1, 2, 3), Ipv4Addr::new(255, 255, 240, 0));
        assert_eq!(link.broadcast(), Ipv4Addr::new(10, 1, 15, 255));
    }

    #[test]
    fn test_from_prefix() {
        let link = LinkAddress::from_prefix(Ipv4Addr::new(192, 168, 0, 7), 24).unwrap();
        assert_eq!(link.netmask, Ipv4Addr::new(255, 255, 255, 0));
        let link = LinkAddress::from_prefix(Ipv4Addr::new(192, 168, 0, 7), 0).unwrap();
        assert_eq!(link.broadcast(), Ipv4Addr::BROADCAST);
        assert!(LinkAddress::from_prefix(Ipv4Addr::new(192, 168, 0, 7), 33).is_none());
    }

    #[test]
    fn test_uplink_candidates() {
        assert!(AdapterType::Wifi.is_uplink_candidate());
        assert!(!AdapterType::Loopback.is_uplink_candidate());
        assert!(!AdapterType::Virtual.is_uplink_candidate());
    }
}
