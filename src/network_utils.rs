// WOL Uplink - Connectivity Monitor
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Link detection and the connectivity gate.
//!
//! The monitor is polled once per orchestrator tick. Everything above it
//! treats "not connected" as a reason to skip the tick entirely.

use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;
use std::process::Command;
use tracing::{debug, info, warn};

use crate::models::{AdapterInfo, AdapterType, LinkAddress};

/// Source of the uplink's link state and addressing.
pub trait LinkProbe: Send {
    /// Cheap carrier check, run every tick.
    fn is_up(&mut self) -> bool;

    /// Current addressing of the uplink. Only consulted on the
    /// disconnected to connected edge.
    fn address(&mut self) -> Option<LinkAddress>;
}

/// Connectivity snapshot owned by the monitor.
///
/// `broadcast` is `Some` exactly when `connected` is true.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkState {
    pub connected: bool,
    pub broadcast: Option<Ipv4Addr>,
}

/// Tracks link state and caches the broadcast address per connection.
pub struct ConnectivityMonitor {
    probe: Box<dyn LinkProbe>,
    state: NetworkState,
}

impl ConnectivityMonitor {
    pub fn new(probe: Box<dyn LinkProbe>) -> Self {
        Self {
            probe,
            state: NetworkState::default(),
        }
    }

    /// Refresh the link state and return whether the uplink is connected.
    ///
    /// The broadcast address is computed on the disconnected to connected
    /// edge only, and dropped on the opposite edge.
    pub fn poll(&mut self) -> bool {
        if !self.probe.is_up() {
            if self.state.connected {
                warn!("[WIFI] Connection lost.");
            }
            self.state = NetworkState::default();
            return false;
        }
        if self.state.connected {
            return true;
        }

        // Carrier without an address yet (DHCP still running) counts as down.
        let Some(link) = self.probe.address() else {
            debug!("[WIFI] Link up, no IPv4 address yet.");
            return false;
        };
        // Attention: 255.255.255.255 is denied in some networks
        let broadcast = link.broadcast();
        info!("[WIFI] Broadcast address set to {}", broadcast);
        info!("[WIFI] Connection established ({}).", link.local);
        self.state = NetworkState {
            connected: true,
            broadcast: Some(broadcast),
        };
        true
    }

    pub fn state(&self) -> NetworkState {
        self.state
    }
}

/// Link probe backed by sysfs and the `ip` utility.
///
/// Per tick only the interface's `operstate` file is read; `ip` runs once per
/// connection edge.
pub struct SystemLinkProbe {
    configured: Option<String>,
    /// Interface picked by autodetection, kept until it goes down.
    detected: Option<String>,
}

impl SystemLinkProbe {
    /// Watch `interface`, or autodetect the first connected physical adapter.
    pub fn new(interface: Option<String>) -> Self {
        Self {
            configured: interface,
            detected: None,
        }
    }

    fn interface(&mut self) -> Option<&str> {
        if let Some(name) = &self.configured {
            return Some(name);
        }
        if self.detected.is_none() {
            self.detected = detect_network_adapters()
                .into_iter()
                .find(|a| a.is_connected && a.adapter_type.is_uplink_candidate())
                .map(|a| {
                    debug!("[WIFI] Using {}", a.display_label());
                    a.name
                });
        }
        self.detected.as_deref()
    }
}

fn operstate_up(name: &str) -> bool {
    fs::read_to_string(Path::new("/sys/class/net").join(name).join("operstate"))
        .map(|state| state.trim() == "up")
        .unwrap_or(false)
}

impl LinkProbe for SystemLinkProbe {
    fn is_up(&mut self) -> bool {
        let up = self.interface().is_some_and(operstate_up);
        if !up {
            // Re-detect next time; another adapter may have taken over.
            self.detected = None;
        }
        up
    }

    fn address(&mut self) -> Option<LinkAddress> {
        let name = self.interface()?.to_string();
        let output = Command::new("ip")
            .args(["-o", "-4", "addr", "show", "dev", &name])
            .output();

        match output {
            Ok(output) if output.status.success() => {
                parse_ip_addr_output(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(output) => {
                debug!("ip addr show {} exited with {}", name, output.status);
                None
            }
            Err(e) => {
                debug!("ip command failed: {}", e);
                None
            }
        }
    }
}

/// Parse the first IPv4 address out of `ip -o -4 addr show` output.
///
/// Example line: `2: eth0    inet 192.168.1.5/24 brd 192.168.1.255 scope global eth0`
fn parse_ip_addr_output(stdout: &str) -> Option<LinkAddress> {
    stdout.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        fields.find(|f| *f == "inet")?;
        let cidr = fields.next()?;
        let (addr, prefix) = cidr.split_once('/')?;
        let local: Ipv4Addr = addr.parse().ok()?;
        let prefix: u8 = prefix.parse().ok()?;
        LinkAddress::from_prefix(local, prefix)
    })
}

/// Detect all network adapters on the system.
///
/// Reads from /sys/class/net to find all network interfaces and determines
/// their type and current state.
pub fn detect_network_adapters() -> Vec<AdapterInfo> {
    let mut adapters = Vec::new();
    let net_path = Path::new("/sys/class/net");

    if let Ok(entries) = fs::read_dir(net_path) {
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if name == "lo" {
                continue;
            }

            let adapter_type = determine_adapter_type(&entry.path(), &name);
            let mut info = AdapterInfo::new(&name, adapter_type);

            if let Ok(state) = fs::read_to_string(entry.path().join("operstate")) {
                info.is_connected = state.trim() == "up";
            }

            adapters.push(info);
        }
    }

    // Sort by name for consistent ordering
    adapters.sort_by(|a, b| natural_sort_key(&a.name).cmp(&natural_sort_key(&b.name)));

    adapters
}

/// Determine the type of network adapter.
fn determine_adapter_type(path: &Path, name: &str) -> AdapterType {
    if path.join("wireless").exists() {
        return AdapterType::Wifi;
    }

    if let Ok(uevent) = fs::read_to_string(path.join("uevent")) {
        if uevent.contains("DEVTYPE=wlan") {
            return AdapterType::Wifi;
        }
    }

    if let Ok(type_str) = fs::read_to_string(path.join("type")) {
        match type_str.trim().parse::<u32>().unwrap_or(0) {
            // ARPHRD_ETHER
            1 if is_virtual_interface(name) => return AdapterType::Virtual,
            1 => return AdapterType::Ethernet,
            772 => return AdapterType::Loopback,
            _ => {}
        }
    }

    classify_by_name(name)
}

/// Fallback classification from the interface name alone.
fn classify_by_name(name: &str) -> AdapterType {
    if name.starts_with("wl") || name.starts_with("wifi") {
        AdapterType::Wifi
    } else if is_virtual_interface(name) {
        AdapterType::Virtual
    } else if name.starts_with("en") || name.starts_with("eth") {
        AdapterType::Ethernet
    } else {
        AdapterType::Other
    }
}

/// Check if interface name suggests a virtual/tunnel interface.
fn is_virtual_interface(name: &str) -> bool {
    const PREFIXES: [&str; 10] = [
        "veth", "br", "virbr", "docker", "vnet", "tun", "tap", "bond", "team", "vlan",
    ];
    PREFIXES.iter().any(|p| name.starts_with(p)) || name.contains("podman")
}

/// Generate a sort key that sorts numbers naturally.
fn natural_sort_key(s: &str) -> (String, u32) {
    let prefix: String = s.chars().take_while(|c| !c.is_ascii_digit()).collect();
    let num_str: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
    (prefix, num_str.parse().unwrap_or(0))
}
