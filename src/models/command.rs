// WOL Uplink - Command Model
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Channel-neutral command requests and replies.
//!
//! Both chat channels reduce their inbound events to a [`CommandRequest`]
//! before anything else looks at them. Identity is resolved at the channel
//! boundary, so the dispatcher only ever sees a channel-native [`InvokerId`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Command names handled by the uplink itself. Probe targets add more.
pub const BUILTIN_COMMANDS: [&str; 4] = ["ping", "wake", "wanip", "whoami"];

/// The chat channel an event arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelId {
    /// Interaction-style channel with a gateway session and slash commands.
    Discord,
    /// Long-poll channel without a persistent session.
    Telegram,
}

impl ChannelId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discord => "discord",
            Self::Telegram => "telegram",
        }
    }

    /// How unregistered command names are answered on this channel.
    pub fn unknown_command_policy(&self) -> UnknownCommandPolicy {
        match self {
            // The interaction channel only delivers registered names, anything
            // else is stale registration and is dropped.
            Self::Discord => UnknownCommandPolicy::Silent,
            Self::Telegram => UnknownCommandPolicy::Reply,
        }
    }

    /// The other channel.
    pub fn other(&self) -> Self {
        match self {
            Self::Discord => Self::Telegram,
            Self::Telegram => Self::Discord,
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with a command name the table does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownCommandPolicy {
    /// Produce no reply.
    Silent,
    /// Reply with a fixed "unknown command" message.
    Reply,
}

/// A channel-native user identifier.
///
/// The variants are deliberately distinct types: a Discord snowflake and a
/// Telegram user id never compare equal, even when the digits match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvokerId {
    Discord(u64),
    Telegram(i64),
}

impl InvokerId {
    pub fn channel(&self) -> ChannelId {
        match self {
            Self::Discord(_) => ChannelId::Discord,
            Self::Telegram(_) => ChannelId::Telegram,
        }
    }
}

impl fmt::Display for InvokerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discord(id) => write!(f, "{}", id),
            Self::Telegram(id) => write!(f, "{}", id),
        }
    }
}

/// One inbound command, consumed by a single dispatch call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub channel: ChannelId,
    pub command_name: String,
    pub invoker: InvokerId,
}

impl CommandRequest {
    pub fn new(command_name: impl Into<String>, invoker: InvokerId) -> Self {
        Self {
            channel: invoker.channel(),
            command_name: command_name.into(),
            invoker,
        }
    }
}

/// Reply text plus its visibility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub content: String,
    /// Only the invoker should see this reply, where the channel supports it.
    pub private: bool,
}

impl Reply {
    pub fn public(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            private: false,
        }
    }

    pub fn private(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            private: true,
        }
    }
}
