// WOL Uplink - Status Probe
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Reachability checks for configured hosts and the public address lookup.
//!
//! Every call here is bounded by its own timeout and always produces a
//! renderable answer; nothing propagates past the probe.

use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::models::config::{ProbeConfig, PublicIpConfig};
use crate::models::validation::validate_ipv4;
use crate::models::{Error, Result};

/// Sends a single echo request.
#[async_trait]
pub trait EchoProber: Send {
    /// True if `target` answered within `timeout`.
    async fn echo(&mut self, target: Ipv4Addr, timeout: Duration) -> bool;
}

/// Echo prober using the system `ping` binary.
#[derive(Debug, Default)]
pub struct PingCommandProber;

#[async_trait]
impl EchoProber for PingCommandProber {
    async fn echo(&mut self, target: Ipv4Addr, timeout: Duration) -> bool {
        let timeout_secs = timeout.as_secs().max(1);
        let child = Command::new("ping")
            .args(["-c", "1", "-W", &timeout_secs.to_string(), &target.to_string()])
            .kill_on_drop(true)
            .output();

        // ping enforces -W itself; the outer bound covers a hung process.
        match tokio::time::timeout(timeout + Duration::from_secs(1), child).await {
            Ok(Ok(output)) => output.status.success(),
            Ok(Err(e)) => {
                debug!("Ping command failed: {}", e);
                false
            }
            Err(_) => {
                debug!("Ping to {} did not exit in time", target);
                false
            }
        }
    }
}

/// Result of a reachability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    Online,
    Offline,
}

impl Reachability {
    /// Render as "<name> is ONLINE" / "<name> is OFFLINE".
    pub fn render(&self, name: &str) -> String {
        match self {
            Self::Online => format!("{} is ONLINE", name),
            Self::Offline => format!("{} is OFFLINE", name),
        }
    }
}

/// Reply text for a target whose address does not parse.
pub fn invalid_address_message(name: &str) -> String {
    format!("[ERROR] Invalid IP for {}", name)
}

/// Queries host reachability and the gateway's public address.
pub struct StatusProbe {
    prober: Box<dyn EchoProber>,
    count: u32,
    timeout: Duration,
    http: reqwest::Client,
    public_ip_url: String,
}

impl StatusProbe {
    pub fn new(prober: Box<dyn EchoProber>, probe: &ProbeConfig, public_ip: &PublicIpConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(public_ip.timeout_secs))
            .user_agent(concat!("wol-uplink/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            prober,
            count: probe.count(),
            timeout: probe.timeout(),
            http,
            public_ip_url: public_ip.url.clone(),
        })
    }

    /// Probe `address` up to `count` times, stopping at the first answer.
    ///
    /// An unparseable address fails with [`Error::InvalidIpAddress`] before
    /// any probe is sent.
    pub async fn check_reachable(&mut self, name: &str, address: &str) -> Result<Reachability> {
        let target = validate_ipv4(address)?;

        for attempt in 1..=self.count {
            if self.prober.echo(target, self.timeout).await {
                debug!("[STATUS] {} answered on attempt {}", name, attempt);
                return Ok(Reachability::Online);
            }
        }
        Ok(Reachability::Offline)
    }

    /// Fetch the public address, or "Error: <code>" on any failure.
    pub async fn fetch_public_address(&self) -> String {
        match self.http.get(&self.public_ip_url).send().await {
            Ok(resp) if resp.status().as_u16() == 200 => match resp.text().await {
                Ok(body) => body.trim().to_string(),
                Err(e) => {
                    debug!("Public address body read failed: {}", e);
                    "Error: body".to_string()
                }
            },
            Ok(resp) => format!("Error: {}", resp.status().as_u16()),
            Err(e) if e.is_timeout() => "Error: timeout".to_string(),
            Err(e) => {
                debug!("Public address request failed: {}", Error::from(e));
                "Error: unreachable".to_string()
            }
        }
    }
}
