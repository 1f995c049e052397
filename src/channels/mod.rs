// WOL Uplink - Chat Channels
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Chat channel sessions.
//!
//! - Discord: Interaction channel with a gateway session, rate-limited login
//!   and one-shot slash command registration
//! - Telegram: Stateless long-poll channel with an update offset
//!
//! Sessions hold their transport and constants; the mutable per-tick state
//! lives in the orchestrator and is passed in by reference.

pub mod discord;
pub mod telegram;

pub use discord::{DiscordGateway, InteractionSession};
pub use telegram::{LongPollSession, TelegramApi};

/// Lifecycle of a session-based channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Offline,
    Authenticating,
    Online,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Authenticating => "authenticating",
            Self::Online => "online",
        }
    }
}
