// WOL Uplink - Models
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! # Uplink Models
//!
//! Plain data shared by every part of the uplink:
//!
//! - **Config**: The TOML configuration, loaded once at startup
//! - **Command**: Channel-neutral requests, replies and invoker identities
//! - **Adapter**: Network adapters and link addressing
//! - **Validation**: Parsers for MAC addresses, IPs and command names
//! - **Error**: Shared error types

pub mod adapter;
pub mod command;
pub mod config;
pub mod error;
pub mod validation;

// Re-export main types for convenience
pub use adapter::{AdapterInfo, AdapterType, LinkAddress};
pub use command::{ChannelId, CommandRequest, InvokerId, Reply, UnknownCommandPolicy, BUILTIN_COMMANDS};
pub use config::{AppConfig, ArbiterConfig, ArbiterMode, ProbeTarget};
pub use error::{Error, Result};
pub use validation::MacAddress;

/// Configuration directory name (under XDG_CONFIG_HOME).
pub const CONFIG_DIR_NAME: &str = "wol-uplink";
