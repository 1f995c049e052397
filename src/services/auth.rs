// WOL Uplink - Authorization Guard
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Per-channel allow-lists for privileged commands.

use std::collections::HashSet;

use crate::models::{AppConfig, ChannelId, InvokerId};

/// Decides whether an invoker may run a privileged command.
///
/// Each channel keeps its own list in its native id type, so an id allowed
/// on one channel never grants anything on the other.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationGuard {
    discord: HashSet<u64>,
    telegram: HashSet<i64>,
}

impl AuthorizationGuard {
    pub fn new(discord: impl IntoIterator<Item = u64>, telegram: impl IntoIterator<Item = i64>) -> Self {
        Self {
            discord: discord.into_iter().collect(),
            telegram: telegram.into_iter().collect(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.discord.authorized_ids.iter().copied(),
            config.telegram.authorized_ids.iter().copied(),
        )
    }

    /// True iff `invoker` belongs to `channel` and is on that channel's list.
    pub fn is_authorized(&self, channel: ChannelId, invoker: &InvokerId) -> bool {
        match (channel, invoker) {
            (ChannelId::Discord, InvokerId::Discord(id)) => self.discord.contains(id),
            (ChannelId::Telegram, InvokerId::Telegram(id)) => self.telegram.contains(id),
            _ => false,
        }
    }

    /// Authorized long-poll users, used for restart broadcasts.
    pub fn telegram_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.telegram.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> AuthorizationGuard {
        AuthorizationGuard::new([111, 222], [333, -444])
    }

    #[test]
    fn test_members_are_authorized() {
        let guard = guard();
        assert!(guard.is_authorized(ChannelId::Discord, &InvokerId::Discord(111)));
        assert!(guard.is_authorized(ChannelId::Discord, &InvokerId::Discord(222)));
        assert!(guard.is_authorized(ChannelId::Telegram, &InvokerId::Telegram(333)));
        assert!(guard.is_authorized(ChannelId::Telegram, &InvokerId::Telegram(-444)));
    }

    #[test]
    fn test_non_members_are_denied() {
        let guard = guard();
        assert!(!guard.is_authorized(ChannelId::Discord, &InvokerId::Discord(333)));
        assert!(!guard.is_authorized(ChannelId::Telegram, &InvokerId::Telegram(111)));
        assert!(!guard.is_authorized(ChannelId::Telegram, &InvokerId::Telegram(444)));
    }

    #[test]
    fn test_no_cross_channel_authorization() {
        let guard = AuthorizationGuard::new([42], [42]);
        // Same digits, wrong channel tag.
        assert!(!guard.is_authorized(ChannelId::Telegram, &InvokerId::Discord(42)));
        assert!(!guard.is_authorized(ChannelId::Discord, &InvokerId::Telegram(42)));

        let discord_only = AuthorizationGuard::new([42], []);
        assert!(!discord_only.is_authorized(ChannelId::Telegram, &InvokerId::Telegram(42)));
    }

    #[test]
    fn test_empty_lists_deny_everyone() {
        let guard = AuthorizationGuard::default();
        assert!(!guard.is_authorized(ChannelId::Discord, &InvokerId::Discord(0)));
        assert!(!guard.is_authorized(ChannelId::Telegram, &InvokerId::Telegram(0)));
    }
}
