// WOL Uplink - Services
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Side-effecting services behind the command dispatcher.
//!
//! - Auth: Per-channel allow-lists
//! - Wake: Wake-on-LAN magic packets
//! - Status: Echo probes and the public address lookup
//! - Notify: Best-effort webhook notifications

pub mod auth;
pub mod notify;
pub mod status;
pub mod wake;

pub use auth::AuthorizationGuard;
pub use notify::{NoopNotifier, Notifier, WebhookNotifier};
pub use status::{PingCommandProber, StatusProbe};
pub use wake::{RemoteWakeInvoker, UdpMagicPacketSender};
