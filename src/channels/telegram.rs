// WOL Uplink - Telegram Long-Poll Channel
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Long-poll channel over the Telegram Bot API.
//!
//! No session to keep: each due tick fetches the updates after the current
//! offset, handles them in ascending id order and moves the offset past the
//! highest id seen. An update is consumed before its reply is sent, so a
//! failed reply is never retried.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::dispatch::CommandDispatcher;
use crate::models::config::TelegramConfig;
use crate::models::{CommandRequest, Error, InvokerId, Result};
use crate::network_utils::NetworkState;

const API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

impl Update {
    /// Reduce to a command request plus the chat to answer in.
    pub fn to_request(&self) -> Option<(CommandRequest, i64)> {
        let message = self.message.as_ref()?;
        let name = parse_command(message.text.as_deref()?)?;
        // Channel posts carry no sender; fall back to the chat id.
        let invoker = message.from.as_ref().map_or(message.chat.id, |u| u.id);
        Some((CommandRequest::new(name, InvokerId::Telegram(invoker)), message.chat.id))
    }
}

/// Extract the command name from message text.
///
/// `/wake@uplink_bot now` becomes `wake`; text without a slash is taken as is.
pub fn parse_command(text: &str) -> Option<String> {
    let first = text.split_whitespace().next()?;
    let name = first.strip_prefix('/').unwrap_or(first);
    let name = name.split('@').next().unwrap_or(name);
    (!name.is_empty()).then(|| name.to_string())
}

/// Transport of the long-poll channel.
#[async_trait]
pub trait LongPollTransport: Send {
    /// Updates with id >= `offset`. An offset of -1 returns only the newest.
    async fn fetch_updates(&mut self, offset: i64) -> Result<Vec<Update>>;

    async fn send_message(&mut self, chat_id: i64, text: &str) -> Result<()>;
}

/// Telegram Bot API client.
pub struct TelegramApi {
    http: reqwest::Client,
    token: String,
}

impl TelegramApi {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            token: config.token.clone(),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, query: &[(&str, String)]) -> Result<T> {
        let resp = self
            .http
            .get(format!("{}/bot{}/{}", API_BASE, self.token, method))
            .query(query)
            .send()
            .await
            .map_err(|e| e.without_url())?;

        let status = resp.status();
        let payload: ApiResponse<T> = resp.json().await.map_err(|e| e.without_url())?;
        if !payload.ok {
            let reason = payload.description.unwrap_or_else(|| status.to_string());
            return Err(Error::ApiRejected(format!("{}: {}", method, reason)));
        }
        payload
            .result
            .ok_or_else(|| Error::Protocol(format!("{} returned no result", method)))
    }
}

#[async_trait]
impl LongPollTransport for TelegramApi {
    async fn fetch_updates(&mut self, offset: i64) -> Result<Vec<Update>> {
        let query = [
            ("offset", offset.to_string()),
            ("timeout", "0".to_string()),
            ("allowed_updates", "[\"message\"]".to_string()),
        ];
        self.call("getUpdates", &query).await
    }

    async fn send_message(&mut self, chat_id: i64, text: &str) -> Result<()> {
        let query = [("chat_id", chat_id.to_string()), ("text", text.to_string())];
        self.call::<serde_json::Value>("sendMessage", &query).await?;
        Ok(())
    }
}

/// Cross-tick state of the long-poll channel.
#[derive(Debug, Clone, Default)]
pub struct PollState {
    /// Next update id to ask for.
    pub offset: i64,
    pub last_poll: Option<Instant>,
    /// The last fetch succeeded.
    pub healthy: bool,
    /// Discard the server-side backlog on the next poll instead of
    /// dispatching it. Set on every disconnected to connected edge.
    pub drain_pending: bool,
}

/// Drives a [`LongPollTransport`] from the orchestrator tick.
pub struct LongPollSession {
    transport: Box<dyn LongPollTransport>,
    interval: Duration,
}

impl LongPollSession {
    pub fn new(transport: Box<dyn LongPollTransport>, config: &TelegramConfig) -> Self {
        Self {
            transport,
            interval: config.poll_interval(),
        }
    }

    fn poll_due(&self, state: &PollState, now: Instant) -> bool {
        match state.last_poll {
            None => true,
            Some(at) => now.saturating_duration_since(at) >= self.interval,
        }
    }

    pub async fn tick(
        &mut self,
        state: &mut PollState,
        now: Instant,
        dispatcher: &mut CommandDispatcher,
        network: &NetworkState,
    ) {
        if !self.poll_due(state, now) {
            return;
        }
        state.last_poll = Some(now);

        // Offset -1 asks for the newest update only and confirms everything
        // older, so the backlog is dropped in one call.
        let offset = if state.drain_pending { -1 } else { state.offset };
        let mut updates = match self.transport.fetch_updates(offset).await {
            Ok(updates) => updates,
            Err(e) => {
                if state.healthy {
                    warn!("[TELEGRAM] Polling failed: {}", e);
                } else {
                    debug!("[TELEGRAM] Polling failed: {}", e);
                }
                state.healthy = false;
                return;
            }
        };
        if !state.healthy {
            info!("[TELEGRAM] Polling online.");
        }
        state.healthy = true;

        updates.sort_by_key(|u| u.update_id);
        if state.drain_pending {
            state.drain_pending = false;
            if let Some(last) = updates.last() {
                state.offset = state.offset.max(last.update_id + 1);
                info!("[TELEGRAM] Discarded messages received while offline (up to {}).", last.update_id);
            }
            return;
        }
        for update in updates {
            // Already consumed.
            if update.update_id < state.offset {
                continue;
            }
            state.offset = update.update_id + 1;

            let Some((request, chat_id)) = update.to_request() else {
                continue;
            };
            info!("[TELEGRAM] Message {} received.", update.update_id);
            if let Some(reply) = dispatcher.dispatch(&request, network).await {
                if let Err(e) = self.transport.send_message(chat_id, &reply.content).await {
                    warn!("[TELEGRAM] Reply to '{}' failed: {}", request.command_name, e);
                }
            }
        }
    }

    /// Send `text` to each chat, ignoring failures.
    pub async fn broadcast(&mut self, chat_ids: impl IntoIterator<Item = i64>, text: &str) {
        for chat_id in chat_ids {
            if let Err(e) = self.transport.send_message(chat_id, text).await {
                debug!("[TELEGRAM] Broadcast to {} failed: {}", chat_id, e);
            }
        }
    }
}
