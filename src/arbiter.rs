// WOL Uplink - Channel Arbiter
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Chooses which chat channels are serviced on a tick.
//!
//! In `exclusive` mode only one channel is live at a time. The primary gets
//! `failover` to come online; the secondary then runs for `failback` before
//! the primary is retried.

use std::time::{Duration, Instant};
use tracing::info;

use crate::models::{ArbiterConfig, ArbiterMode, ChannelId};

/// Channels to service this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub discord: bool,
    pub telegram: bool,
    /// Channel that just lost its turn and should drop its session.
    pub deactivated: Option<ChannelId>,
}

impl Selection {
    pub fn includes(&self, channel: ChannelId) -> bool {
        match channel {
            ChannelId::Discord => self.discord,
            ChannelId::Telegram => self.telegram,
        }
    }

    fn only(channel: ChannelId) -> Self {
        Self {
            discord: channel == ChannelId::Discord,
            telegram: channel == ChannelId::Telegram,
            deactivated: None,
        }
    }
}

pub struct ChannelArbiter {
    mode: ArbiterMode,
    primary: ChannelId,
    failover: Duration,
    failback: Duration,
    active: ChannelId,
    /// Start of the current turn, or the last time the primary was seen online.
    mark: Option<Instant>,
}

impl ChannelArbiter {
    pub fn new(config: &ArbiterConfig) -> Self {
        Self {
            mode: config.mode,
            primary: config.primary,
            failover: Duration::from_secs(config.failover_secs),
            failback: Duration::from_secs(config.failback_secs),
            active: config.primary,
            mark: None,
        }
    }

    /// Arbiter that services every channel.
    pub fn both() -> Self {
        Self::new(&ArbiterConfig::default())
    }

    #[allow(dead_code)]
    pub fn active(&self) -> Option<ChannelId> {
        match self.mode {
            ArbiterMode::Both => None,
            ArbiterMode::Exclusive => Some(self.active),
        }
    }

    /// Pick the channels for this tick. `online` reports whether a channel
    /// is currently usable.
    pub fn select<F>(&mut self, now: Instant, online: F) -> Selection
    where
        F: Fn(ChannelId) -> bool,
    {
        if self.mode == ArbiterMode::Both {
            return Selection {
                discord: true,
                telegram: true,
                deactivated: None,
            };
        }

        let mark = *self.mark.get_or_insert(now);
        let waited = now.saturating_duration_since(mark);

        if self.active == self.primary {
            if online(self.primary) {
                self.mark = Some(now);
            } else if waited >= self.failover {
                return self.switch(self.primary.other(), now);
            }
        } else if waited >= self.failback {
            return self.switch(self.primary, now);
        }
        Selection::only(self.active)
    }

    fn switch(&mut self, to: ChannelId, now: Instant) -> Selection {
        info!("Channel handover: {} -> {}", self.active, to);
        let from = std::mem::replace(&mut self.active, to);
        self.mark = Some(now);
        Selection {
            deactivated: Some(from),
            ..Selection::only(to)
        }
    }
}
