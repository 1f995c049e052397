// WOL Uplink - Application Configuration
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Application configuration model.
//!
//! Loaded once at startup from TOML and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::command::{ChannelId, BUILTIN_COMMANDS};
use super::error::{Error, Result};
use super::validation::{validate_command_name, validate_token, MacAddress};
use super::CONFIG_DIR_NAME;

/// Environment variable overriding the Discord bot token.
pub const ENV_DISCORD_TOKEN: &str = "WOL_UPLINK_DISCORD_TOKEN";

/// Environment variable overriding the Telegram bot token.
pub const ENV_TELEGRAM_TOKEN: &str = "WOL_UPLINK_TELEGRAM_TOKEN";

/// Upper bound for `restart.interval_hours` (one year).
pub const MAX_RESTART_HOURS: u64 = 24 * 366;

/// Upper bound for `discord.reply_delay_ms`.
pub const MAX_REPLY_DELAY_MS: u64 = 60_000;

/// Link monitoring settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Interface carrying the uplink. Autodetected when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,

    /// Sleep between connectivity checks while the link is down.
    #[serde(default = "default_offline_delay")]
    pub poll_delay_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            interface: None,
            poll_delay_secs: default_offline_delay(),
        }
    }
}

/// Interaction channel (Discord) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Bot token.
    #[serde(default)]
    pub token: String,

    /// Application id used for command registration.
    #[serde(default)]
    pub application_id: u64,

    /// Users allowed to run privileged commands.
    #[serde(default)]
    pub authorized_ids: Vec<u64>,

    /// Minimum time between two login attempts.
    #[serde(default = "default_login_interval")]
    pub login_interval_secs: u64,

    /// Gateway intents sent with Identify.
    #[serde(default = "default_intents")]
    pub intents: u64,

    /// Quiescent delay after each reply.
    #[serde(default = "default_reply_delay")]
    pub reply_delay_ms: u64,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            token: String::new(),
            application_id: 0,
            authorized_ids: Vec::new(),
            login_interval_secs: default_login_interval(),
            intents: default_intents(),
            reply_delay_ms: default_reply_delay(),
        }
    }
}

impl DiscordConfig {
    pub fn login_interval(&self) -> Duration {
        Duration::from_secs(self.login_interval_secs)
    }

    pub fn reply_delay(&self) -> Duration {
        Duration::from_millis(self.reply_delay_ms)
    }
}

/// Long-poll channel (Telegram) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Bot token.
    #[serde(default)]
    pub token: String,

    /// Users allowed to run privileged commands.
    #[serde(default)]
    pub authorized_ids: Vec<i64>,

    /// Minimum time between two polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            token: String::new(),
            authorized_ids: Vec::new(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl TelegramConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Wake-on-LAN target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WakeConfig {
    /// Hardware address of the machine to wake.
    pub mac: MacAddress,

    /// UDP port for the magic packet.
    #[serde(default = "default_wol_port")]
    pub port: u16,
}

/// A host whose reachability can be queried through a status command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeTarget {
    /// Command name, e.g. "pcstatus".
    pub command: String,
    /// Label used in replies, e.g. "PC".
    pub name: String,
    /// IPv4 address. Parsed per request so a typo is reported, not fatal.
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ProbeTarget {
    pub fn description(&self) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| format!("Check if {} is online or offline.", self.name))
    }
}

/// Echo probe settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Echo requests per check (1-3).
    #[serde(default = "default_probe_count")]
    pub count: u32,

    /// Timeout for each echo request.
    #[serde(default = "default_probe_timeout")]
    pub timeout_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            count: default_probe_count(),
            timeout_ms: default_probe_timeout(),
        }
    }
}

impl ProbeConfig {
    pub fn count(&self) -> u32 {
        self.count.clamp(1, 3)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Public address lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicIpConfig {
    #[serde(default = "default_public_ip_url")]
    pub url: String,

    #[serde(default = "default_public_ip_timeout")]
    pub timeout_secs: u64,
}

impl Default for PublicIpConfig {
    fn default() -> Self {
        Self {
            url: default_public_ip_url(),
            timeout_secs: default_public_ip_timeout(),
        }
    }
}

/// Scheduled restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartConfig {
    /// Hours between restarts. Zero disables the schedule.
    #[serde(default = "default_restart_hours")]
    pub interval_hours: u64,

    /// Webhook notified before restarting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,

    /// Also message every authorized long-poll user.
    #[serde(default = "default_true")]
    pub notify_channels: bool,
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            interval_hours: default_restart_hours(),
            webhook_url: None,
            notify_channels: true,
        }
    }
}

impl RestartConfig {
    pub fn interval(&self) -> Option<Duration> {
        self.interval_hours
            .checked_mul(3600)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

/// How the two channels share the uplink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArbiterMode {
    /// Both channels are serviced every tick.
    #[default]
    Both,
    /// Only one channel is live at a time.
    Exclusive,
}

/// Channel arbitration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbiterConfig {
    #[serde(default)]
    pub mode: ArbiterMode,

    #[serde(default = "default_primary")]
    pub primary: ChannelId,

    /// Give up on the primary after this long without it coming online.
    #[serde(default = "default_failover")]
    pub failover_secs: u64,

    /// Retry the primary after this long on the secondary.
    #[serde(default = "default_failback")]
    pub failback_secs: u64,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            mode: ArbiterMode::default(),
            primary: default_primary(),
            failover_secs: default_failover(),
            failback_secs: default_failback(),
        }
    }
}

/// Periodic process diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_diagnostics_interval")]
    pub interval_secs: u64,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_diagnostics_interval(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub discord: DiscordConfig,

    #[serde(default)]
    pub telegram: TelegramConfig,

    pub wake: WakeConfig,

    /// Hosts exposed through status commands.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<ProbeTarget>,

    #[serde(default)]
    pub probe: ProbeConfig,

    #[serde(default)]
    pub public_ip: PublicIpConfig,

    #[serde(default)]
    pub restart: RestartConfig,

    #[serde(default)]
    pub arbiter: ArbiterConfig,

    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_offline_delay() -> u64 {
    10
}

fn default_login_interval() -> u64 {
    30
}

fn default_intents() -> u64 {
    // DIRECT_MESSAGES
    4096
}

fn default_reply_delay() -> u64 {
    500
}

fn default_poll_interval() -> u64 {
    2000
}

fn default_wol_port() -> u16 {
    9
}

fn default_probe_count() -> u32 {
    3
}

fn default_probe_timeout() -> u64 {
    1000
}

fn default_public_ip_url() -> String {
    "http://api.ipify.org".to_string()
}

fn default_public_ip_timeout() -> u64 {
    5
}

fn default_restart_hours() -> u64 {
    24
}

fn default_primary() -> ChannelId {
    ChannelId::Discord
}

fn default_failover() -> u64 {
    120
}

fn default_failback() -> u64 {
    600
}

fn default_diagnostics_interval() -> u64 {
    2
}

impl AppConfig {
    /// Default configuration file location.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_DIR_NAME)
            .join("config.toml")
    }

    /// Load configuration from TOML file, apply environment overrides and validate.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigReadFailed(format!("{}: {}", path.display(), e)))?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string without validating it.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Replace tokens with values from the environment, when present.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup(ENV_DISCORD_TOKEN).filter(|t| !t.is_empty()) {
            self.discord.token = token;
        }
        if let Some(token) = lookup(ENV_TELEGRAM_TOKEN).filter(|t| !t.is_empty()) {
            self.telegram.token = token;
        }
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.discord.enabled {
            validate_token("Discord", &self.discord.token)?;
            if self.discord.application_id == 0 {
                return Err(Error::ValidationFailed(
                    "Discord is enabled but has no application_id".to_string(),
                ));
            }
        }
        if self.telegram.enabled {
            validate_token("Telegram", &self.telegram.token)?;
        }
        if self.discord.reply_delay_ms > MAX_REPLY_DELAY_MS {
            return Err(Error::ValidationFailed(format!(
                "discord.reply_delay_ms must be at most {}",
                MAX_REPLY_DELAY_MS
            )));
        }
        if self.restart.interval_hours > MAX_RESTART_HOURS {
            return Err(Error::ValidationFailed(format!(
                "restart.interval_hours must be at most {}",
                MAX_RESTART_HOURS
            )));
        }
        if !self.discord.enabled && !self.telegram.enabled {
            return Err(Error::ValidationFailed(
                "At least one chat channel must be enabled".to_string(),
            ));
        }

        let mut names: HashSet<&str> = BUILTIN_COMMANDS.iter().copied().collect();
        for target in &self.targets {
            validate_command_name(&target.command)?;
            if !names.insert(target.command.as_str()) {
                return Err(Error::DuplicateCommand(target.command.clone()));
            }
        }

        Ok(())
    }

    /// Whether a channel takes part in this run at all.
    pub fn channel_enabled(&self, channel: ChannelId) -> bool {
        match channel {
            ChannelId::Discord => self.discord.enabled,
            ChannelId::Telegram => self.telegram.enabled,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const SAMPLE: &str = r#"
        [discord]
        token = "discord-token"
        application_id = 1234
        authorized_ids = [111, 222]

        [telegram]
        token = "telegram-token"
        authorized_ids = [333]

        [wake]
        mac = "AA:BB:CC:DD:EE:FF"

        [[targets]]
        command = "pcstatus"
        name = "PC"
        address = "192.168.1.20"

        [[targets]]
        command = "psstatus"
        name = "PS"
        address = "192.168.1.30"
    "#;

    pub(crate) fn sample_config() -> AppConfig {
        let config = AppConfig::from_toml_str(SAMPLE).unwrap();
        config.validate().unwrap();
        config
    }

    #[test]
    fn test_defaults_fill_in() {
        let config = sample_config();
        assert_eq!(config.discord.login_interval_secs, 30);
        assert_eq!(config.discord.intents, 4096);
        assert_eq!(config.wake.port, 9);
        assert_eq!(config.probe.count(), 3);
        assert_eq!(config.restart.interval(), Some(Duration::from_secs(24 * 3600)));
        assert_eq!(config.arbiter.mode, ArbiterMode::Both);
        assert!(!config.diagnostics.enabled);
    }

    #[test]
    fn test_probe_count_clamped() {
        let mut config = sample_config();
        config.probe.count = 10;
        assert_eq!(config.probe.count(), 3);
        config.probe.count = 0;
        assert_eq!(config.probe.count(), 1);
    }

    #[test]
    fn test_restart_disabled_with_zero() {
        let mut config = sample_config();
        config.restart.interval_hours = 0;
        assert_eq!(config.restart.interval(), None);
    }

    #[test]
    fn test_out_of_range_durations_rejected() {
        let mut config = sample_config();
        config.restart.interval_hours = u64::MAX;
        assert_eq!(config.restart.interval(), None);
        assert!(matches!(config.validate(), Err(Error::ValidationFailed(_))));

        config.restart.interval_hours = MAX_RESTART_HOURS;
        assert!(config.validate().is_ok());

        config.discord.reply_delay_ms = u64::MAX;
        assert!(matches!(config.validate(), Err(Error::ValidationFailed(_))));
    }

    #[test]
    fn test_duplicate_command_rejected() {
        let mut config = sample_config();
        config.targets[1].command = "pcstatus".to_string();
        assert!(matches!(config.validate(), Err(Error::DuplicateCommand(_))));

        config.targets[1].command = "wake".to_string();
        assert!(matches!(config.validate(), Err(Error::DuplicateCommand(_))));
    }

    #[test]
    fn test_missing_token_rejected() {
        let mut config = sample_config();
        config.telegram.token.clear();
        assert!(config.validate().is_err());
        config.telegram.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_mac_rejected_at_parse() {
        let broken = SAMPLE.replace("AA:BB:CC:DD:EE:FF", "not-a-mac");
        assert!(AppConfig::from_toml_str(&broken).is_err());
    }

    #[test]
    fn test_env_overrides_tokens() {
        let mut config = sample_config();
        config.apply_env_overrides(|key| match key {
            ENV_TELEGRAM_TOKEN => Some("from-env".to_string()),
            _ => None,
        });
        assert_eq!(config.telegram.token, "from-env");
        assert_eq!(config.discord.token, "discord-token");
    }

    #[test]
    fn test_target_description_fallback() {
        let config = sample_config();
        assert_eq!(config.targets[0].description(), "Check if PC is online or offline.");
    }
}
