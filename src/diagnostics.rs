// WOL Uplink - Diagnostics
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Optional periodic process diagnostics.

use std::fs;
use std::time::{Duration, Instant};
use tracing::info;

/// Memory and thread figures of this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessStats {
    pub rss_kb: u64,
    pub threads: u64,
}

impl ProcessStats {
    /// Read from /proc/self/status. `None` off Linux or on parse failure.
    pub fn read() -> Option<Self> {
        fs::read_to_string("/proc/self/status")
            .ok()
            .and_then(|s| Self::parse(&s))
    }

    fn parse(status: &str) -> Option<Self> {
        let field = |key: &str| {
            status
                .lines()
                .find_map(|line| line.strip_prefix(key))
                .and_then(|rest| rest.split_whitespace().next())
                .and_then(|v| v.parse::<u64>().ok())
        };
        Some(Self {
            rss_kb: field("VmRSS:")?,
            threads: field("Threads:")?,
        })
    }
}

/// Logs process figures whenever they change.
pub struct DiagnosticsTicker {
    interval: Duration,
    last_check: Option<Instant>,
    last: Option<ProcessStats>,
}

impl DiagnosticsTicker {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_check: None,
            last: None,
        }
    }

    pub fn tick(&mut self, now: Instant) {
        if let Some((stats, delta_kb)) = self.sample(now, ProcessStats::read) {
            info!(
                "[DIAG] RSS: {}kB ({:+}kB), threads: {}",
                stats.rss_kb, delta_kb, stats.threads
            );
        }
    }

    /// Take a sample if due; returns it with the RSS delta only when it
    /// differs from the last one. The first sample has a delta of zero.
    fn sample<F>(&mut self, now: Instant, read: F) -> Option<(ProcessStats, i64)>
    where
        F: FnOnce() -> Option<ProcessStats>,
    {
        if matches!(self.last_check, Some(at) if now.duration_since(at) < self.interval) {
            return None;
        }
        self.last_check = Some(now);

        let current = read()?;
        let delta_kb = match self.last {
            Some(previous) if previous == current => return None,
            Some(previous) => current.rss_kb as i64 - previous.rss_kb as i64,
            None => 0,
        };
        self.last = Some(current);
        Some((current, delta_kb))
    }
}
