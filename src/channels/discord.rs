// WOL Uplink - Discord Interaction Channel
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Interaction channel: gateway session, command registration and replies.
//!
//! The session state machine is `Offline -> Authenticating -> Online`, with
//! any gateway error dropping back to `Offline`. Login attempts are spaced by
//! a fixed interval because the gateway handshake is stateful and retrying
//! too fast can keep it from ever completing.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::SessionPhase;
use crate::dispatch::{CommandDispatcher, CommandTable};
use crate::models::config::DiscordConfig;
use crate::models::{CommandRequest, Error, InvokerId, Reply, Result};
use crate::network_utils::NetworkState;

const API_BASE: &str = "https://discord.com/api/v10";

/// How long one tick waits for a gateway frame.
const RECV_WINDOW: Duration = Duration::from_millis(50);

/// Bound on the HTTP lookup plus WebSocket connect of a login.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// "Use Application Commands" permission bit.
const DEFAULT_MEMBER_PERMISSIONS: &str = "2147483648";

/// Interaction type of a slash command.
const APPLICATION_COMMAND: u64 = 2;

/// Interaction callback type: CHANNEL_MESSAGE_WITH_SOURCE.
const CHANNEL_MESSAGE_WITH_SOURCE: u8 = 4;

/// Message flag: only the invoker sees the reply.
const EPHEMERAL: u64 = 1 << 6;

// Gateway opcodes
const OP_DISPATCH: u8 = 0;
const OP_HEARTBEAT: u8 = 1;
const OP_IDENTIFY: u8 = 2;
const OP_RECONNECT: u8 = 7;
const OP_INVALID_SESSION: u8 = 9;
const OP_HELLO: u8 = 10;
const OP_HEARTBEAT_ACK: u8 = 11;

/// Where the invoker's identity sits in an interaction payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokerContext {
    /// Invoked inside a guild: `member.user.id`.
    Member { user_id: u64 },
    /// Invoked in a direct message: `user.id`.
    User { user_id: u64 },
}

impl InvokerContext {
    /// Resolve from a raw payload, preferring the member context.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        if let Some(member) = payload.get("member") {
            let user_id = snowflake(member.get("user")?.get("id")?)?;
            return Some(Self::Member { user_id });
        }
        let user_id = snowflake(payload.get("user")?.get("id")?)?;
        Some(Self::User { user_id })
    }

    pub fn invoker(&self) -> InvokerId {
        match self {
            Self::Member { user_id } | Self::User { user_id } => InvokerId::Discord(*user_id),
        }
    }
}

/// Snowflakes arrive as strings; accept plain numbers too.
fn snowflake(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

/// A slash command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interaction {
    pub id: String,
    pub token: String,
    pub command_name: String,
    pub context: InvokerContext,
}

impl Interaction {
    /// Parse an INTERACTION_CREATE payload. Non-command interactions yield `None`.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        if payload.get("type").and_then(Value::as_u64) != Some(APPLICATION_COMMAND) {
            return None;
        }
        Some(Self {
            id: payload.get("id")?.as_str()?.to_string(),
            token: payload.get("token")?.as_str()?.to_string(),
            command_name: payload.get("data")?.get("name")?.as_str()?.to_string(),
            context: InvokerContext::from_payload(payload)?,
        })
    }

    pub fn to_request(&self) -> CommandRequest {
        CommandRequest::new(self.command_name.clone(), self.context.invoker())
    }
}

/// Client side of the interaction channel.
#[async_trait]
pub trait InteractionGateway: Send {
    /// Start the handshake. Completion is observed through [`is_online`].
    ///
    /// [`is_online`]: InteractionGateway::is_online
    async fn login(&mut self, intents: u64) -> Result<()>;

    /// True once the handshake has completed and the session is live.
    fn is_online(&self) -> bool;

    /// Pump the session for one tick, returning at most one interaction.
    async fn update(&mut self, now: Instant) -> Result<Option<Interaction>>;

    /// Replace the global slash commands with `table` in one call,
    /// returning how many were registered.
    async fn register_commands(&mut self, table: &CommandTable) -> Result<usize>;

    /// Answer an interaction.
    async fn respond(&mut self, interaction: &Interaction, reply: &Reply) -> Result<()>;

    /// Close the session, if any.
    async fn disconnect(&mut self);
}

/// Cross-tick state of the interaction session.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub phase: SessionPhase,
    pub last_attempt_at: Option<Instant>,
    /// Set after the first registration pass; never cleared during a run.
    pub commands_registered: bool,
    /// Events are not accepted before this instant.
    pub quiet_until: Option<Instant>,
}

impl SessionState {
    pub fn is_online(&self) -> bool {
        self.phase == SessionPhase::Online
    }
}

/// Drives an [`InteractionGateway`] from the orchestrator tick.
pub struct InteractionSession {
    gateway: Box<dyn InteractionGateway>,
    login_interval: Duration,
    intents: u64,
    reply_delay: Duration,
}

impl InteractionSession {
    pub fn new(gateway: Box<dyn InteractionGateway>, config: &DiscordConfig) -> Self {
        Self {
            gateway,
            login_interval: config.login_interval(),
            intents: config.intents,
            reply_delay: config.reply_delay(),
        }
    }

    pub async fn tick(
        &mut self,
        state: &mut SessionState,
        now: Instant,
        dispatcher: &mut CommandDispatcher,
        network: &NetworkState,
    ) {
        if self.gateway.is_online() {
            if state.phase != SessionPhase::Online {
                info!("[DISCORD] Session online.");
                state.phase = SessionPhase::Online;
            }
            if !state.commands_registered {
                self.register_commands(dispatcher.table()).await;
                state.commands_registered = true;
            }
        } else {
            if state.phase == SessionPhase::Online {
                warn!("[DISCORD] Session dropped.");
                state.phase = SessionPhase::Offline;
            }
            if self.login_due(state, now) {
                self.attempt_login(state, now).await;
            }
        }

        if state.phase == SessionPhase::Offline {
            return;
        }
        if let Some(until) = state.quiet_until {
            if now < until {
                return;
            }
            state.quiet_until = None;
        }

        match self.gateway.update(now).await {
            Ok(Some(interaction)) => {
                self.handle(state, now, interaction, dispatcher, network).await;
            }
            Ok(None) => {}
            Err(e) if e.is_session_lost() => {
                warn!("[DISCORD] Gateway error: {}", e);
                self.gateway.disconnect().await;
                state.phase = SessionPhase::Offline;
            }
            Err(e) => warn!("[DISCORD] Update failed: {}", e),
        }
    }

    /// Close the session without forgetting registration or backoff.
    pub async fn reset(&mut self, state: &mut SessionState) {
        debug!("[DISCORD] Resetting {} session", state.phase.as_str());
        self.gateway.disconnect().await;
        state.phase = SessionPhase::Offline;
        state.quiet_until = None;
    }

    fn login_due(&self, state: &SessionState, now: Instant) -> bool {
        match state.last_attempt_at {
            None => true,
            Some(at) => now.saturating_duration_since(at) > self.login_interval,
        }
    }

    async fn attempt_login(&mut self, state: &mut SessionState, now: Instant) {
        info!("[STATUS] Connecting to Discord.");
        if state.phase == SessionPhase::Authenticating {
            debug!("[DISCORD] Previous handshake did not complete, starting over");
            self.gateway.disconnect().await;
        }
        state.last_attempt_at = Some(now);
        state.phase = SessionPhase::Authenticating;

        if let Err(e) = self.gateway.login(self.intents).await {
            warn!("[DISCORD] Login failed: {}", e);
            state.phase = SessionPhase::Offline;
        }
    }

    /// One pass only; a failure is logged and not retried this run.
    async fn register_commands(&mut self, table: &CommandTable) {
        info!("[DISCORD] Registering {} commands...", table.len());
        match self.gateway.register_commands(table).await {
            Ok(count) => info!("[DISCORD] Registered {} commands.", count),
            Err(e) => warn!("[DISCORD] Command registration failed: {}", e),
        }
    }

    async fn handle(
        &mut self,
        state: &mut SessionState,
        now: Instant,
        interaction: Interaction,
        dispatcher: &mut CommandDispatcher,
        network: &NetworkState,
    ) {
        info!("[DISCORD] Interaction received.");
        let request = interaction.to_request();
        if let Some(reply) = dispatcher.dispatch(&request, network).await {
            if let Err(e) = self.gateway.respond(&interaction, &reply).await {
                warn!("[DISCORD] Reply to '{}' failed: {}", interaction.command_name, e);
            }
        }
        state.quiet_until = now.checked_add(self.reply_delay);
    }
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Envelope of every gateway frame.
#[derive(Debug, Deserialize)]
struct GatewayPayload {
    op: u8,
    #[serde(default)]
    d: Value,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GatewayBot {
    url: String,
}

#[derive(Debug, Deserialize)]
struct RegisteredCommand {
    id: String,
    name: String,
}

/// Discord gateway (WebSocket) plus REST client.
pub struct DiscordGateway {
    http: reqwest::Client,
    token: String,
    application_id: u64,
    socket: Option<Socket>,
    intents: u64,
    heartbeat_interval: Option<Duration>,
    next_heartbeat: Option<Instant>,
    sequence: Option<u64>,
    ready: bool,
}

impl DiscordGateway {
    pub fn new(config: &DiscordConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!(
                "DiscordBot (https://github.com/christosdaggas/wol-uplink, ",
                env!("CARGO_PKG_VERSION"),
                ")"
            ))
            .build()?;

        Ok(Self {
            http,
            token: config.token.clone(),
            application_id: config.application_id,
            socket: None,
            intents: config.intents,
            heartbeat_interval: None,
            next_heartbeat: None,
            sequence: None,
            ready: false,
        })
    }

    fn auth_header(&self) -> String {
        bot_auth(&self.token)
    }

    async fn send_json(&mut self, payload: Value) -> Result<()> {
        let socket = self
            .socket
            .as_mut()
            .ok_or_else(|| Error::ChannelDropped("no gateway socket".to_string()))?;
        socket.send(Message::Text(payload.to_string().into())).await?;
        Ok(())
    }

    async fn send_heartbeat(&mut self, now: Instant) -> Result<()> {
        self.send_json(json!({ "op": OP_HEARTBEAT, "d": self.sequence })).await?;
        if let Some(interval) = self.heartbeat_interval {
            self.next_heartbeat = Some(now + interval);
        }
        debug!("[DISCORD] Heartbeat sent");
        Ok(())
    }

    async fn identify(&mut self) -> Result<()> {
        let identify = json!({
            "op": OP_IDENTIFY,
            "d": {
                "token": self.token,
                "intents": self.intents,
                "properties": {
                    "os": std::env::consts::OS,
                    "browser": "wol-uplink",
                    "device": "wol-uplink",
                },
            },
        });
        self.send_json(identify).await
    }

    fn clear_session(&mut self) {
        self.socket = None;
        self.heartbeat_interval = None;
        self.next_heartbeat = None;
        self.sequence = None;
        self.ready = false;
    }

    async fn handle_frame(&mut self, text: &str, now: Instant) -> Result<Option<Interaction>> {
        let payload: GatewayPayload = serde_json::from_str(text)?;
        if let Some(seq) = payload.s {
            self.sequence = Some(seq);
        }

        match payload.op {
            OP_HELLO => {
                let interval_ms = payload
                    .d
                    .get("heartbeat_interval")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| Error::Protocol("hello without heartbeat_interval".to_string()))?;
                let interval = Duration::from_millis(interval_ms);
                self.heartbeat_interval = Some(interval);
                self.next_heartbeat = Some(now + interval);
                self.identify().await?;
                debug!("[DISCORD] Identify sent");
                Ok(None)
            }
            OP_HEARTBEAT => {
                self.send_heartbeat(now).await?;
                Ok(None)
            }
            OP_HEARTBEAT_ACK => Ok(None),
            OP_RECONNECT => {
                self.clear_session();
                Err(Error::ChannelDropped("gateway requested reconnect".to_string()))
            }
            OP_INVALID_SESSION => {
                self.clear_session();
                Err(Error::ChannelDropped("invalid session".to_string()))
            }
            OP_DISPATCH => match payload.t.as_deref() {
                Some("READY") => {
                    self.ready = true;
                    Ok(None)
                }
                Some("INTERACTION_CREATE") => Ok(Interaction::from_payload(&payload.d)),
                _ => Ok(None),
            },
            other => {
                debug!("[DISCORD] Ignoring opcode {}", other);
                Ok(None)
            }
        }
    }
}

fn bot_auth(token: &str) -> String {
    format!("Bot {}", token)
}

async fn gateway_url(http: &reqwest::Client, auth: &str) -> Result<String> {
    let resp = http
        .get(format!("{}/gateway/bot", API_BASE))
        .header("Authorization", auth)
        .send()
        .await?;
    if !resp.status().is_success() {
        return Err(Error::http_status("gateway/bot", resp.status().as_u16()));
    }
    Ok(resp.json::<GatewayBot>().await?.url)
}

#[async_trait]
impl InteractionGateway for DiscordGateway {
    async fn login(&mut self, intents: u64) -> Result<()> {
        self.disconnect().await;
        self.intents = intents;

        let (http, auth) = (self.http.clone(), self.auth_header());
        let connect = async move {
            let url = gateway_url(&http, &auth).await?;
            let (socket, _) = connect_async(format!("{}/?v=10&encoding=json", url)).await?;
            Ok::<_, Error>(socket)
        };
        let socket = tokio::time::timeout(CONNECT_TIMEOUT, connect).await??;
        self.socket = Some(socket);
        debug!("[DISCORD] Gateway connected, waiting for hello");
        Ok(())
    }

    fn is_online(&self) -> bool {
        self.ready && self.socket.is_some()
    }

    async fn update(&mut self, now: Instant) -> Result<Option<Interaction>> {
        if self.socket.is_none() {
            return Ok(None);
        }

        if matches!(self.next_heartbeat, Some(due) if now >= due) {
            self.send_heartbeat(now).await?;
        }

        let received = match self.socket.as_mut() {
            Some(socket) => tokio::time::timeout(RECV_WINDOW, socket.next()).await,
            None => return Ok(None),
        };

        match received {
            Err(_) => Ok(None),
            Ok(None) => {
                self.clear_session();
                Err(Error::ChannelDropped("gateway socket closed".to_string()))
            }
            Ok(Some(Err(e))) => {
                self.clear_session();
                Err(e.into())
            }
            Ok(Some(Ok(Message::Text(text)))) => self.handle_frame(&text, now).await,
            Ok(Some(Ok(Message::Close(frame)))) => {
                self.clear_session();
                Err(Error::ChannelDropped(format!("gateway closed: {:?}", frame)))
            }
            Ok(Some(Ok(_))) => Ok(None),
        }
    }

    async fn register_commands(&mut self, table: &CommandTable) -> Result<usize> {
        let body: Vec<Value> = table
            .iter()
            .map(|command| {
                json!({
                    "name": command.name,
                    "type": 1,
                    "description": command.description,
                    "default_member_permissions": DEFAULT_MEMBER_PERMISSIONS,
                })
            })
            .collect();
        let resp = self
            .http
            .put(format!("{}/applications/{}/commands", API_BASE, self.application_id))
            .header("Authorization", self.auth_header())
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Error::http_status("applications/commands", resp.status().as_u16()));
        }
        let registered: Vec<RegisteredCommand> = resp.json().await?;
        for command in &registered {
            debug!("[DISCORD] Registered {} command to id {}", command.name, command.id);
        }
        Ok(registered.len())
    }

    async fn respond(&mut self, interaction: &Interaction, reply: &Reply) -> Result<()> {
        let mut data = json!({ "content": reply.content });
        if reply.private {
            data["flags"] = json!(EPHEMERAL);
        }
        let resp = self
            .http
            .post(format!(
                "{}/interactions/{}/{}/callback",
                API_BASE, interaction.id, interaction.token
            ))
            .json(&json!({ "type": CHANNEL_MESSAGE_WITH_SOURCE, "data": data }))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Error::http_status("interactions/callback", resp.status().as_u16()));
        }
        Ok(())
    }

    async fn disconnect(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            let _ = socket.close(None).await;
        }
        self.clear_session();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::dispatch::tests::{connected, test_dispatcher};
    use crate::dispatch::{REPLY_DENIED, REPLY_WAKE_OK};
    use crate::models::config::tests::sample_config;
    use crate::services::status::tests::CountingProber;
    use crate::services::wake::tests::RecordingSender;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Shared record of what a fake gateway was asked to do.
    #[derive(Default)]
    pub(crate) struct GatewayLog {
        pub logins: usize,
        pub registrations: Vec<String>,
        pub registration_passes: usize,
        pub replies: Vec<Reply>,
        pub disconnects: usize,
    }

    /// Gateway whose online flag and inbound events are scripted by the test.
    #[derive(Clone, Default)]
    pub(crate) struct FakeGateway {
        pub log: Arc<Mutex<GatewayLog>>,
        pub online: Arc<Mutex<bool>>,
        pub go_online_on_login: bool,
        pub fail_registration: bool,
        pub inbound: Arc<Mutex<VecDeque<Interaction>>>,
        pub fail_next_update: Arc<Mutex<bool>>,
    }

    impl FakeGateway {
        pub fn set_online(&self, online: bool) {
            *self.online.lock().unwrap() = online;
        }

        pub fn push(&self, interaction: Interaction) {
            self.inbound.lock().unwrap().push_back(interaction);
        }
    }

    #[async_trait]
    impl InteractionGateway for FakeGateway {
        async fn login(&mut self, _intents: u64) -> Result<()> {
            self.log.lock().unwrap().logins += 1;
            if self.go_online_on_login {
                self.set_online(true);
            }
            Ok(())
        }

        fn is_online(&self) -> bool {
            *self.online.lock().unwrap()
        }

        async fn update(&mut self, _now: Instant) -> Result<Option<Interaction>> {
            if std::mem::take(&mut *self.fail_next_update.lock().unwrap()) {
                self.set_online(false);
                return Err(Error::ChannelDropped("scripted".to_string()));
            }
            Ok(self.inbound.lock().unwrap().pop_front())
        }

        async fn register_commands(&mut self, table: &CommandTable) -> Result<usize> {
            let mut log = self.log.lock().unwrap();
            log.registration_passes += 1;
            if self.fail_registration {
                return Err(Error::http_status("applications/commands", 429));
            }
            log.registrations.extend(table.iter().map(|c| c.name.clone()));
            Ok(table.len())
        }

        async fn respond(&mut self, _interaction: &Interaction, reply: &Reply) -> Result<()> {
            self.log.lock().unwrap().replies.push(reply.clone());
            Ok(())
        }

        async fn disconnect(&mut self) {
            self.log.lock().unwrap().disconnects += 1;
            self.set_online(false);
        }
    }

    pub(crate) fn slash(name: &str, user_id: u64) -> Interaction {
        Interaction {
            id: "1".to_string(),
            token: "tok".to_string(),
            command_name: name.to_string(),
            context: InvokerContext::User { user_id },
        }
    }

    fn session(gateway: &FakeGateway) -> InteractionSession {
        InteractionSession::new(Box::new(gateway.clone()), &sample_config().discord)
    }

    #[test]
    fn test_member_context_preferred() {
        let payload = json!({
            "member": { "user": { "id": "111" } },
            "user": { "id": "222" },
        });
        assert_eq!(
            InvokerContext::from_payload(&payload),
            Some(InvokerContext::Member { user_id: 111 })
        );

        let dm = json!({ "user": { "id": "222" } });
        let context = InvokerContext::from_payload(&dm).unwrap();
        assert_eq!(context, InvokerContext::User { user_id: 222 });
        assert_eq!(context.invoker(), InvokerId::Discord(222));
    }

    #[test]
    fn test_interaction_from_payload() {
        let payload = json!({
            "id": "99",
            "token": "abc",
            "type": 2,
            "data": { "name": "wake" },
            "member": { "user": { "id": "111" } },
        });
        let interaction = Interaction::from_payload(&payload).unwrap();
        assert_eq!(interaction.command_name, "wake");
        assert_eq!(interaction.to_request().invoker, InvokerId::Discord(111));

        // Component interactions are not commands.
        let component = json!({ "id": "1", "token": "t", "type": 3, "data": {}, "user": { "id": "1" } });
        assert!(Interaction::from_payload(&component).is_none());
    }

    #[tokio::test]
    async fn test_login_rate_limited() {
        let gateway = FakeGateway::default();
        let mut session = session(&gateway);
        let mut state = SessionState::default();
        let mut dispatcher = test_dispatcher(RecordingSender::default(), CountingProber::default());
        let t0 = Instant::now();

        // Tight loop: one tick every 100ms for 65s, handshake never completes.
        for step in 0..650u64 {
            let now = t0 + Duration::from_millis(step * 100);
            session.tick(&mut state, now, &mut dispatcher, &connected()).await;
        }

        // Attempts at 0s, >30s and >60s.
        assert_eq!(gateway.log.lock().unwrap().logins, 3);
        assert_eq!(state.phase, SessionPhase::Authenticating);
    }

    #[tokio::test]
    async fn test_commands_registered_once_per_run() {
        let gateway = FakeGateway {
            go_online_on_login: true,
            ..Default::default()
        };
        let mut session = session(&gateway);
        let mut state = SessionState::default();
        let mut dispatcher = test_dispatcher(RecordingSender::default(), CountingProber::default());
        let t0 = Instant::now();

        session.tick(&mut state, t0, &mut dispatcher, &connected()).await;
        session.tick(&mut state, t0 + Duration::from_secs(1), &mut dispatcher, &connected()).await;
        assert!(state.is_online());
        assert!(state.commands_registered);

        // Drop and come back twice.
        for cycle in 1..=2u64 {
            gateway.set_online(false);
            let base = t0 + Duration::from_secs(cycle * 100);
            session.tick(&mut state, base, &mut dispatcher, &connected()).await;
            session.tick(&mut state, base + Duration::from_secs(1), &mut dispatcher, &connected()).await;
            assert!(state.is_online());
        }

        let log = gateway.log.lock().unwrap();
        assert_eq!(log.logins, 3);
        assert_eq!(log.registration_passes, 1);
        assert_eq!(log.registrations, ["ping", "wake", "wanip", "whoami", "pcstatus", "psstatus"]);
    }

    #[tokio::test]
    async fn test_failed_registration_not_retried() {
        let gateway = FakeGateway {
            go_online_on_login: true,
            fail_registration: true,
            ..Default::default()
        };
        let mut session = session(&gateway);
        let mut state = SessionState::default();
        let mut dispatcher = test_dispatcher(RecordingSender::default(), CountingProber::default());
        let t0 = Instant::now();

        session.tick(&mut state, t0, &mut dispatcher, &connected()).await;
        session.tick(&mut state, t0 + Duration::from_secs(1), &mut dispatcher, &connected()).await;
        assert!(state.is_online());
        assert!(state.commands_registered);

        for step in 2..20u64 {
            session.tick(&mut state, t0 + Duration::from_secs(step), &mut dispatcher, &connected()).await;
        }
        // Online -> Offline -> Online.
        gateway.set_online(false);
        let base = t0 + Duration::from_secs(100);
        session.tick(&mut state, base, &mut dispatcher, &connected()).await;
        session.tick(&mut state, base + Duration::from_secs(1), &mut dispatcher, &connected()).await;
        assert!(state.is_online());

        let log = gateway.log.lock().unwrap();
        assert_eq!(log.logins, 2);
        assert_eq!(log.registration_passes, 1);
        assert!(log.registrations.is_empty());
    }

    #[tokio::test]
    async fn test_authorized_wake_over_interaction() {
        let sender = RecordingSender::default();
        let gateway = FakeGateway {
            go_online_on_login: true,
            ..Default::default()
        };
        let mut session = session(&gateway);
        let mut state = SessionState::default();
        let mut dispatcher = test_dispatcher(sender.clone(), CountingProber::default());
        let t0 = Instant::now();

        session.tick(&mut state, t0, &mut dispatcher, &connected()).await;
        gateway.push(slash("wake", 111));
        session.tick(&mut state, t0 + Duration::from_secs(1), &mut dispatcher, &connected()).await;

        assert_eq!(sender.count(), 1);
        assert_eq!(gateway.log.lock().unwrap().replies, [Reply::public(REPLY_WAKE_OK)]);
    }

    #[tokio::test]
    async fn test_unauthorized_wake_is_denied_privately() {
        let sender = RecordingSender::default();
        let gateway = FakeGateway {
            go_online_on_login: true,
            ..Default::default()
        };
        let mut session = session(&gateway);
        let mut state = SessionState::default();
        let mut dispatcher = test_dispatcher(sender.clone(), CountingProber::default());
        let t0 = Instant::now();

        gateway.push(slash("wake", 999));
        session.tick(&mut state, t0, &mut dispatcher, &connected()).await;

        assert_eq!(sender.count(), 0);
        let log = gateway.log.lock().unwrap();
        assert_eq!(log.replies, [Reply::private(REPLY_DENIED)]);
    }

    #[tokio::test]
    async fn test_unregistered_command_gets_no_reply() {
        let gateway = FakeGateway {
            go_online_on_login: true,
            ..Default::default()
        };
        let mut session = session(&gateway);
        let mut state = SessionState::default();
        let mut dispatcher = test_dispatcher(RecordingSender::default(), CountingProber::default());

        gateway.push(slash("stale", 111));
        session.tick(&mut state, Instant::now(), &mut dispatcher, &connected()).await;
        assert!(gateway.log.lock().unwrap().replies.is_empty());
    }

    #[tokio::test]
    async fn test_quiet_delay_after_reply() {
        let gateway = FakeGateway {
            go_online_on_login: true,
            ..Default::default()
        };
        let mut session = session(&gateway);
        let mut state = SessionState::default();
        let mut dispatcher = test_dispatcher(RecordingSender::default(), CountingProber::default());
        let t0 = Instant::now();

        gateway.push(slash("ping", 1));
        gateway.push(slash("ping", 2));
        session.tick(&mut state, t0, &mut dispatcher, &connected()).await;
        session.tick(&mut state, t0 + Duration::from_millis(100), &mut dispatcher, &connected()).await;
        assert_eq!(gateway.log.lock().unwrap().replies.len(), 1);

        session.tick(&mut state, t0 + Duration::from_millis(600), &mut dispatcher, &connected()).await;
        assert_eq!(gateway.log.lock().unwrap().replies.len(), 2);
    }

    #[tokio::test]
    async fn test_gateway_error_goes_offline_and_respects_backoff() {
        let gateway = FakeGateway {
            go_online_on_login: true,
            ..Default::default()
        };
        let mut session = session(&gateway);
        let mut state = SessionState::default();
        let mut dispatcher = test_dispatcher(RecordingSender::default(), CountingProber::default());
        let t0 = Instant::now();

        session.tick(&mut state, t0, &mut dispatcher, &connected()).await;
        session.tick(&mut state, t0 + Duration::from_millis(10), &mut dispatcher, &connected()).await;
        assert!(state.is_online());

        *gateway.fail_next_update.lock().unwrap() = true;
        session.tick(&mut state, t0 + Duration::from_secs(1), &mut dispatcher, &connected()).await;
        assert_eq!(state.phase, SessionPhase::Offline);

        // Still inside the login window: no new attempt.
        session.tick(&mut state, t0 + Duration::from_secs(5), &mut dispatcher, &connected()).await;
        assert_eq!(gateway.log.lock().unwrap().logins, 1);

        session.tick(&mut state, t0 + Duration::from_secs(31), &mut dispatcher, &connected()).await;
        assert_eq!(gateway.log.lock().unwrap().logins, 2);
        assert_eq!(state.phase, SessionPhase::Authenticating);
        session.tick(&mut state, t0 + Duration::from_secs(32), &mut dispatcher, &connected()).await;
        assert!(state.is_online());
    }
}
