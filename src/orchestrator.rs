// WOL Uplink - Orchestrator
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! The cooperative main loop body.
//!
//! One [`Orchestrator::tick`] runs every component once, in order: restart
//! check, diagnostics, connectivity gate, channel arbitration, then the
//! channel sessions. Nothing runs concurrently; a slow step delays the rest.

use chrono::Local;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::arbiter::ChannelArbiter;
use crate::channels::discord::SessionState;
use crate::channels::telegram::PollState;
use crate::channels::{DiscordGateway, InteractionSession, LongPollSession, TelegramApi};
use crate::diagnostics::DiagnosticsTicker;
use crate::dispatch::{CommandDispatcher, CommandTable};
use crate::models::{AppConfig, ArbiterMode, ChannelId, Result};
use crate::network_utils::{ConnectivityMonitor, NetworkState, SystemLinkProbe};
use crate::scheduler::RestartScheduler;
use crate::services::notify::notify_best_effort;
use crate::services::{
    AuthorizationGuard, NoopNotifier, Notifier, PingCommandProber, RemoteWakeInvoker, StatusProbe,
    UdpMagicPacketSender, WebhookNotifier,
};

/// Outcome of one loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Continue,
    /// Link is down; nothing else ran.
    Offline,
    /// Restart is due and has been announced.
    Restart,
}

/// Everything that survives from one tick to the next.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorState {
    pub network: NetworkState,
    pub discord: SessionState,
    pub telegram: PollState,
}

pub struct Orchestrator {
    monitor: ConnectivityMonitor,
    dispatcher: CommandDispatcher,
    discord: Option<InteractionSession>,
    telegram: Option<LongPollSession>,
    arbiter: ChannelArbiter,
    scheduler: RestartScheduler,
    notifier: Box<dyn Notifier>,
    notify_channels: bool,
    diagnostics: Option<DiagnosticsTicker>,
    state: OrchestratorState,
}

impl Orchestrator {
    /// Orchestrator without channels; add them with `with_discord` and
    /// `with_telegram`.
    pub fn new(
        config: &AppConfig,
        monitor: ConnectivityMonitor,
        dispatcher: CommandDispatcher,
        started_at: Instant,
    ) -> Self {
        let exclusive_ok = config.channel_enabled(ChannelId::Discord)
            && config.channel_enabled(ChannelId::Telegram);
        let arbiter = match config.arbiter.mode {
            ArbiterMode::Exclusive if !exclusive_ok => {
                warn!("Exclusive mode needs both channels enabled, servicing all");
                ChannelArbiter::both()
            }
            _ => ChannelArbiter::new(&config.arbiter),
        };

        let diagnostics = config
            .diagnostics
            .enabled
            .then(|| DiagnosticsTicker::new(Duration::from_secs(config.diagnostics.interval_secs)));

        Self {
            monitor,
            dispatcher,
            discord: None,
            telegram: None,
            arbiter,
            scheduler: RestartScheduler::new(started_at, config.restart.interval()),
            notifier: Box::new(NoopNotifier),
            notify_channels: config.restart.notify_channels,
            diagnostics,
            state: OrchestratorState::default(),
        }
    }

    /// Wire up the real back ends described by `config`.
    pub fn from_config(config: &AppConfig, started_at: Instant) -> Result<Self> {
        let table = CommandTable::build(&config.targets)?;
        let waker = RemoteWakeInvoker::new(
            Box::new(UdpMagicPacketSender),
            config.wake.mac,
            config.wake.port,
        );
        let probe = StatusProbe::new(Box::new(PingCommandProber), &config.probe, &config.public_ip)?;
        let dispatcher = CommandDispatcher::new(table, AuthorizationGuard::from_config(config), waker, probe)
            .with_diagnostics(config.diagnostics.enabled);
        let monitor = ConnectivityMonitor::new(Box::new(SystemLinkProbe::new(
            config.network.interface.clone(),
        )));

        let mut orchestrator = Self::new(config, monitor, dispatcher, started_at);
        if config.discord.enabled {
            let gateway = DiscordGateway::new(&config.discord)?;
            orchestrator = orchestrator.with_discord(InteractionSession::new(Box::new(gateway), &config.discord));
        }
        if config.telegram.enabled {
            let api = TelegramApi::new(&config.telegram)?;
            orchestrator = orchestrator.with_telegram(LongPollSession::new(Box::new(api), &config.telegram));
        }
        if let Some(url) = &config.restart.webhook_url {
            orchestrator = orchestrator.with_notifier(Box::new(WebhookNotifier::new(url.clone())?));
        }
        Ok(orchestrator)
    }

    pub fn with_discord(mut self, session: InteractionSession) -> Self {
        self.discord = Some(session);
        self
    }

    pub fn with_telegram(mut self, session: LongPollSession) -> Self {
        self.telegram = Some(session);
        self
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[allow(dead_code)]
    pub fn state(&self) -> &OrchestratorState {
        &self.state
    }

    pub async fn tick(&mut self, now: Instant) -> Tick {
        if self.scheduler.due(now) {
            self.announce_restart().await;
            return Tick::Restart;
        }

        if let Some(diagnostics) = &mut self.diagnostics {
            diagnostics.tick(now);
        }

        let was_connected = self.state.network.connected;
        let connected = self.monitor.poll();
        self.state.network = self.monitor.state();
        if !connected {
            return Tick::Offline;
        }
        if !was_connected {
            // Commands sent while the uplink was unreachable are dropped.
            self.state.telegram.drain_pending = true;
        }

        let state = &self.state;
        let selection = self.arbiter.select(now, |channel| match channel {
            ChannelId::Discord => state.discord.is_online(),
            ChannelId::Telegram => state.telegram.healthy,
        });

        if selection.deactivated == Some(ChannelId::Discord) {
            if let Some(session) = &mut self.discord {
                session.reset(&mut self.state.discord).await;
            }
        }

        if selection.includes(ChannelId::Discord) {
            if let Some(session) = &mut self.discord {
                session
                    .tick(&mut self.state.discord, now, &mut self.dispatcher, &self.state.network)
                    .await;
            }
        }
        if selection.includes(ChannelId::Telegram) {
            if let Some(session) = &mut self.telegram {
                session
                    .tick(&mut self.state.telegram, now, &mut self.dispatcher, &self.state.network)
                    .await;
            }
        }
        Tick::Continue
    }

    async fn announce_restart(&mut self) {
        let message = format!(
            "Uplink restarting on schedule at {}",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        info!("[RESTART] {}", message);
        notify_best_effort(self.notifier.as_mut(), &message).await;

        if !self.notify_channels {
            return;
        }
        if let Some(session) = &mut self.telegram {
            let ids: Vec<i64> = self.dispatcher.guard().telegram_ids().collect();
            session.broadcast(ids, &message).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::discord::tests::{slash, FakeGateway};
    use crate::channels::telegram::tests::{text_update, FakeTransport};
    use crate::dispatch::tests::test_dispatcher;
    use crate::dispatch::REPLY_PING;
    use crate::models::config::tests::sample_config;
    use crate::models::{ArbiterConfig, LinkAddress};
    use crate::network_utils::LinkProbe;
    use crate::services::status::tests::CountingProber;
    use crate::services::wake::tests::RecordingSender;
    use async_trait::async_trait;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    /// Link that is up or down as the test says.
    #[derive(Clone, Default)]
    struct SwitchLink(Arc<AtomicBool>);

    impl LinkProbe for SwitchLink {
        fn is_up(&mut self) -> bool {
            self.0.load(Ordering::SeqCst)
        }

        fn address(&mut self) -> Option<LinkAddress> {
            self.is_up().then(|| {
                LinkAddress::new(Ipv4Addr::new(192, 168, 1, 5), Ipv4Addr::new(255, 255, 255, 0))
            })
        }
    }

    #[derive(Clone, Default)]
    struct RecordingNotifier(Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&mut self, message: &str) -> Result<()> {
            self.0.lock().unwrap().push(message.to_string());
            Ok(())
        }
    }

    struct Harness {
        link: SwitchLink,
        sender: RecordingSender,
        gateway: FakeGateway,
        transport: FakeTransport,
        orchestrator: Orchestrator,
    }

    fn harness(config: AppConfig, t0: Instant) -> Harness {
        let link = SwitchLink::default();
        link.0.store(true, Ordering::SeqCst);
        let sender = RecordingSender::default();
        let gateway = FakeGateway {
            go_online_on_login: true,
            ..Default::default()
        };
        let transport = FakeTransport::default();

        let monitor = ConnectivityMonitor::new(Box::new(link.clone()));
        let dispatcher = test_dispatcher(sender.clone(), CountingProber::default());
        let orchestrator = Orchestrator::new(&config, monitor, dispatcher, t0)
            .with_discord(InteractionSession::new(Box::new(gateway.clone()), &config.discord))
            .with_telegram(LongPollSession::new(Box::new(transport.clone()), &config.telegram));

        Harness {
            link,
            sender,
            gateway,
            transport,
            orchestrator,
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[tokio::test]
    async fn test_offline_skips_channels() {
        let t0 = Instant::now();
        let mut h = harness(sample_config(), t0);
        h.link.0.store(false, Ordering::SeqCst);

        for i in 0..50 {
            assert_eq!(h.orchestrator.tick(t0 + ms(i * 100)).await, Tick::Offline);
        }
        assert_eq!(h.gateway.log.lock().unwrap().logins, 0);
        assert!(h.transport.offsets.lock().unwrap().is_empty());
        assert_eq!(h.orchestrator.state().network.broadcast, None);
    }

    #[tokio::test]
    async fn test_wake_over_interaction_channel() {
        let t0 = Instant::now();
        let mut h = harness(sample_config(), t0);
        h.gateway.push(slash("wake", 111));

        for i in 0..10 {
            assert_eq!(h.orchestrator.tick(t0 + ms(i * 20)).await, Tick::Continue);
        }

        assert_eq!(h.sender.count(), 1);
        assert_eq!(
            h.orchestrator.state().network.broadcast,
            Some(Ipv4Addr::new(192, 168, 1, 255))
        );
        assert!(h.orchestrator.state().discord.is_online());
        assert!(h.orchestrator.state().discord.commands_registered);
    }

    #[tokio::test]
    async fn test_both_channels_serviced() {
        let t0 = Instant::now();
        let mut h = harness(sample_config(), t0);

        // First poll after startup only clears the backlog.
        h.orchestrator.tick(t0).await;
        h.transport.push_batch(vec![text_update(4, 333, "/ping")]);
        h.orchestrator.tick(t0 + Duration::from_secs(2)).await;

        assert_eq!(h.gateway.log.lock().unwrap().logins, 1);
        assert_eq!(*h.transport.offsets.lock().unwrap(), [-1, 0]);
        assert_eq!(h.transport.sent.lock().unwrap()[0], (333, REPLY_PING.to_string()));
        assert_eq!(h.orchestrator.state().telegram.offset, 5);
    }

    #[tokio::test]
    async fn test_wake_sent_while_offline_is_dropped() {
        let t0 = Instant::now();
        let mut h = harness(sample_config(), t0);
        h.orchestrator.tick(t0).await;

        h.link.0.store(false, Ordering::SeqCst);
        for i in 1..=10 {
            assert_eq!(h.orchestrator.tick(t0 + Duration::from_secs(i)).await, Tick::Offline);
        }
        h.transport.push_batch(vec![text_update(20, 333, "/wake")]);
        h.link.0.store(true, Ordering::SeqCst);
        h.orchestrator.tick(t0 + Duration::from_secs(11)).await;

        assert_eq!(h.sender.count(), 0);
        assert!(h.transport.sent.lock().unwrap().is_empty());
        assert_eq!(h.orchestrator.state().telegram.offset, 21);

        // Commands after the reconnect run normally.
        h.transport.push_batch(vec![text_update(21, 333, "/wake")]);
        h.orchestrator.tick(t0 + Duration::from_secs(13)).await;
        assert_eq!(h.sender.count(), 1);
        assert_eq!(*h.transport.offsets.lock().unwrap(), [-1, -1, 21]);
    }

    #[tokio::test]
    async fn test_scheduled_restart_notifies() {
        let t0 = Instant::now();
        let notifier = RecordingNotifier::default();
        let mut h = harness(sample_config(), t0);
        h.orchestrator = h.orchestrator.with_notifier(Box::new(notifier.clone()));

        assert_eq!(h.orchestrator.tick(t0).await, Tick::Continue);
        let day = Duration::from_secs(24 * 3600);
        assert_eq!(h.orchestrator.tick(t0 + day).await, Tick::Restart);

        let posted = notifier.0.lock().unwrap();
        assert_eq!(posted.len(), 1);
        assert!(posted[0].starts_with("Uplink restarting on schedule at "));
        let sent = h.transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 333);
    }

    #[tokio::test]
    async fn test_exclusive_failover_resets_interaction_session() {
        let t0 = Instant::now();
        let mut config = sample_config();
        config.arbiter = ArbiterConfig {
            mode: ArbiterMode::Exclusive,
            primary: ChannelId::Discord,
            failover_secs: 120,
            failback_secs: 600,
        };
        let mut h = harness(config, t0);
        // Logins never complete.
        h.gateway.go_online_on_login = false;
        h.orchestrator = h.orchestrator.with_discord(InteractionSession::new(
            Box::new(h.gateway.clone()),
            &sample_config().discord,
        ));

        h.orchestrator.tick(t0).await;
        assert!(h.transport.offsets.lock().unwrap().is_empty());

        h.orchestrator.tick(t0 + Duration::from_secs(120)).await;
        assert_eq!(h.transport.offsets.lock().unwrap().len(), 1);
        assert!(h.gateway.log.lock().unwrap().disconnects >= 1);
        assert!(!h.orchestrator.state().discord.is_online());
    }
}
