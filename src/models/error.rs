// WOL Uplink - Error Types
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Shared error types for the uplink.

use thiserror::Error;

/// Result type alias for uplink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for uplink operations.
#[derive(Debug, Error)]
pub enum Error {
    // ========================================
    // Configuration Errors
    // ========================================
    #[error("Failed to read configuration: {0}")]
    ConfigReadFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParseFailed(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Invalid IP address: {0}")]
    InvalidIpAddress(String),

    #[error("Invalid MAC address: {0}")]
    InvalidMacAddress(String),

    #[error("Duplicate command name: {0}")]
    DuplicateCommand(String),

    // ========================================
    // Network Errors
    // ========================================
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status} from {endpoint}")]
    HttpStatus { endpoint: String, status: u16 },

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    // ========================================
    // Channel Errors
    // ========================================
    #[error("Gateway protocol error: {0}")]
    Protocol(String),

    #[error("Channel dropped: {0}")]
    ChannelDropped(String),

    #[error("Channel API rejected request: {0}")]
    ApiRejected(String),

    // ========================================
    // System Errors
    // ========================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a new HTTP status error.
    pub fn http_status(endpoint: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            endpoint: endpoint.into(),
            status,
        }
    }

    /// Check if this error means the channel session is gone and must log in again.
    pub fn is_session_lost(&self) -> bool {
        matches!(
            self,
            Self::ChannelDropped(_) | Self::WebSocket(_) | Self::Protocol(_)
        )
    }
}

// Convert from toml parse errors
impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::ConfigParseFailed(err.to_string())
    }
}

// Convert from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Protocol(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        Error::Timeout(err.to_string())
    }
}
