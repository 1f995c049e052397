// WOL Uplink - Validation Utilities
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Input validation utilities for configuration and command arguments.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use super::error::{Error, Result};

/// Command names accepted by both chat channels.
static COMMAND_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9_-]{1,32}$").expect("command name pattern is valid")
});

/// A 48-bit hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}", a, b, c, d, e, g)
    }
}

impl FromStr for MacAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        validate_mac_address(s)
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Validate an IPv4 address string.
pub fn validate_ipv4(s: &str) -> Result<Ipv4Addr> {
    Ipv4Addr::from_str(s.trim()).map_err(|_| Error::InvalidIpAddress(s.to_string()))
}

/// Validate a MAC address string.
pub fn validate_mac_address(s: &str) -> Result<MacAddress> {
    // Accept formats: AA:BB:CC:DD:EE:FF or AA-BB-CC-DD-EE-FF
    let normalized = s.trim().replace('-', ":");
    let parts: Vec<&str> = normalized.split(':').collect();

    if parts.len() != 6 {
        return Err(Error::InvalidMacAddress(s.to_string()));
    }

    let mut octets = [0u8; 6];
    for (slot, part) in octets.iter_mut().zip(&parts) {
        if part.len() != 2 {
            return Err(Error::InvalidMacAddress(s.to_string()));
        }
        *slot = u8::from_str_radix(part, 16).map_err(|_| Error::InvalidMacAddress(s.to_string()))?;
    }

    Ok(MacAddress(octets))
}

/// Validate a chat command name.
pub fn validate_command_name(s: &str) -> Result<&str> {
    if COMMAND_NAME.is_match(s) {
        Ok(s)
    } else {
        Err(Error::ValidationFailed(format!(
            "Command name must match [a-z0-9_-]{{1,32}}: {}",
            s
        )))
    }
}

/// Validate that a bot token is present.
pub fn validate_token(channel: &str, token: &str) -> Result<()> {
    if token.trim().is_empty() {
        return Err(Error::ValidationFailed(format!(
            "{} is enabled but has no bot token",
            channel
        )));
    }
    Ok(())
}
