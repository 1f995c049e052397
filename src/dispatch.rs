// WOL Uplink - Command Dispatch
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Command table and the channel-independent dispatcher.
//!
//! The table is built once at startup from the built-in commands plus one
//! status command per configured probe target, and never changes afterwards.
//! Both channels dispatch through the same table, which is also what the
//! interaction channel registers.

use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::diagnostics::ProcessStats;
use crate::models::validation::validate_command_name;
use crate::models::{
    CommandRequest, Error, InvokerId, ProbeTarget, Reply, Result, UnknownCommandPolicy,
};
use crate::network_utils::NetworkState;
use crate::services::status::invalid_address_message;
use crate::services::{AuthorizationGuard, RemoteWakeInvoker, StatusProbe};

pub const REPLY_PING: &str = "Uplink online.";
pub const REPLY_WAKE_OK: &str = "Command acknowledged. Initiating remote wake sequence.";
pub const REPLY_WAKE_FAILED: &str = "Wake sequence failed: packet could not be sent.";
pub const REPLY_DENIED: &str = "Access denied.";
pub const REPLY_UNKNOWN: &str = "Unknown command.";

/// What a command does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handler {
    Ping,
    Wake,
    WanIp,
    WhoAmI,
    Status { name: String, address: String },
}

/// One entry of the command table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: String,
    pub description: String,
    /// Requires the invoker to be on the channel's allow-list.
    pub privileged: bool,
    pub handler: Handler,
}

impl CommandSpec {
    fn new(name: &str, description: &str, privileged: bool, handler: Handler) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            privileged,
            handler,
        }
    }
}

/// Immutable mapping from command name to handler, in registration order.
#[derive(Debug, Clone)]
pub struct CommandTable {
    entries: Vec<CommandSpec>,
    index: HashMap<String, usize>,
}

impl CommandTable {
    /// Build the table from the built-ins and the probe targets.
    pub fn build(targets: &[ProbeTarget]) -> Result<Self> {
        let mut specs = vec![
            CommandSpec::new("ping", "Ping the bot for a response.", false, Handler::Ping),
            CommandSpec::new(
                "wake",
                "Send a wake signal to the main terminal. Authorized users only.",
                true,
                Handler::Wake,
            ),
            CommandSpec::new("wanip", "Get the current WAN IP of the uplink.", false, Handler::WanIp),
            CommandSpec::new("whoami", "Show your user id.", false, Handler::WhoAmI),
        ];

        for target in targets {
            validate_command_name(&target.command)?;
            specs.push(CommandSpec {
                name: target.command.clone(),
                description: target.description(),
                privileged: false,
                handler: Handler::Status {
                    name: target.name.clone(),
                    address: target.address.clone(),
                },
            });
        }

        let mut index = HashMap::with_capacity(specs.len());
        for (i, spec) in specs.iter().enumerate() {
            if index.insert(spec.name.clone(), i).is_some() {
                return Err(Error::DuplicateCommand(spec.name.clone()));
            }
        }

        Ok(Self { entries: specs, index })
    }

    /// Exact-match lookup.
    pub fn get(&self, name: &str) -> Option<&CommandSpec> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandSpec> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Runs commands on behalf of either channel.
pub struct CommandDispatcher {
    table: CommandTable,
    guard: AuthorizationGuard,
    waker: RemoteWakeInvoker,
    probe: StatusProbe,
    diagnostics: bool,
    started_at: Instant,
}

impl CommandDispatcher {
    pub fn new(
        table: CommandTable,
        guard: AuthorizationGuard,
        waker: RemoteWakeInvoker,
        probe: StatusProbe,
    ) -> Self {
        Self {
            table,
            guard,
            waker,
            probe,
            diagnostics: false,
            started_at: Instant::now(),
        }
    }

    /// Include uptime and memory figures in the ping reply.
    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics = enabled;
        self
    }

    pub fn table(&self) -> &CommandTable {
        &self.table
    }

    pub fn guard(&self) -> &AuthorizationGuard {
        &self.guard
    }

    /// Run one command and produce its reply.
    ///
    /// Returns `None` only for unknown commands on a channel whose policy is
    /// to stay silent. Privileged handlers consult the guard before any side
    /// effect.
    pub async fn dispatch(&mut self, request: &CommandRequest, network: &NetworkState) -> Option<Reply> {
        let Some(spec) = self.table.get(&request.command_name) else {
            debug!("[{}] Unknown command '{}'", request.channel, request.command_name);
            return match request.channel.unknown_command_policy() {
                UnknownCommandPolicy::Silent => None,
                UnknownCommandPolicy::Reply => Some(Reply::public(REPLY_UNKNOWN)),
            };
        };

        if spec.privileged && !self.guard.is_authorized(request.channel, &request.invoker) {
            warn!(
                "[{}] Denied '{}' for {}",
                request.channel, spec.name, request.invoker
            );
            return Some(Reply::private(REPLY_DENIED));
        }

        let handler = spec.handler.clone();
        info!("[{}] Running '{}' for {}", request.channel, spec.name, request.invoker);

        let reply = match handler {
            Handler::Ping => Reply::public(self.ping_text()),
            Handler::Wake => self.wake(network),
            Handler::WanIp => {
                let address = self.probe.fetch_public_address().await;
                Reply::public(format!("Current WAN IP: {}", address))
            }
            Handler::WhoAmI => Reply::private(whoami_text(&request.invoker)),
            Handler::Status { name, address } => {
                match self.probe.check_reachable(&name, &address).await {
                    Ok(reachability) => Reply::public(reachability.render(&name)),
                    Err(e) => {
                        warn!("[STATUS] {}: {}", name, e);
                        Reply::public(invalid_address_message(&name))
                    }
                }
            }
        };
        Some(reply)
    }

    fn wake(&mut self, network: &NetworkState) -> Reply {
        let Some(broadcast) = network.broadcast else {
            warn!("[WOL] No broadcast address, link is down.");
            return Reply::public(REPLY_WAKE_FAILED);
        };
        if self.waker.invoke(broadcast) {
            Reply::public(REPLY_WAKE_OK)
        } else {
            Reply::public(REPLY_WAKE_FAILED)
        }
    }

    fn ping_text(&self) -> String {
        if !self.diagnostics {
            return REPLY_PING.to_string();
        }
        let uptime = self.started_at.elapsed().as_millis();
        match ProcessStats::read() {
            Some(stats) => format!("Uplink online. Uptime: {}ms, RSS: {}kB", uptime, stats.rss_kb),
            None => format!("Uplink online. Uptime: {}ms", uptime),
        }
    }
}

fn whoami_text(invoker: &InvokerId) -> String {
    format!("Your {} user id is {}", invoker.channel(), invoker)
}
