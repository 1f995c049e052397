// WOL Uplink - Notifications
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Best-effort outbound notifications.

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::{Error, Result};

/// Delivers a one-off operator notification.
#[async_trait]
pub trait Notifier: Send {
    async fn notify(&mut self, message: &str) -> Result<()>;
}

/// Posts `{"content": ...}` to a chat webhook URL.
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self { http, url: url.into() })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&mut self, message: &str) -> Result<()> {
        let resp = self
            .http
            .post(&self.url)
            .json(&json!({ "content": message }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Error::http_status("webhook", resp.status().as_u16()));
        }
        debug!("Webhook notified");
        Ok(())
    }
}

/// Notifier used when no webhook is configured.
#[derive(Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&mut self, _message: &str) -> Result<()> {
        Ok(())
    }
}

/// Run a notifier and swallow its failure.
pub async fn notify_best_effort(notifier: &mut dyn Notifier, message: &str) {
    if let Err(e) = notifier.notify(message).await {
        warn!("Notification failed (ignored): {}", e);
    }
}
