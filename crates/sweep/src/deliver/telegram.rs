//! Telegram Bot API delivery.
//!
//! Uploads clips with `sendVideo` and stills with `sendPhoto` as multipart
//! forms, silently (no notification), each request bounded by a timeout.

use super::{DeliveryChannel, DeliveryError, MediaKind};
use crate::config::TelegramConfig;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Subset of the Bot API response envelope we look at.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Delivery channel posting to one Telegram chat.
#[derive(Debug, Clone)]
pub struct TelegramChannel {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
    timeout: Duration,
}

impl TelegramChannel {
    pub fn new(config: &TelegramConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Bot API method and multipart field name for a payload kind.
    pub fn method_for(kind: MediaKind) -> (&'static str, &'static str) {
        match kind {
            MediaKind::Video => ("sendVideo", "video"),
            MediaKind::Photo => ("sendPhoto", "photo"),
        }
    }

    /// Full endpoint URL for `method`.
    pub fn endpoint(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }
}

impl DeliveryChannel for TelegramChannel {
    async fn deliver(&self, kind: MediaKind, path: &Path, caption: &str) -> Result<(), DeliveryError> {
        let (method, field) = Self::method_for(kind);
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| field.to_string());

        let form = Form::new()
            .text("chat_id", self.chat_id.clone())
            .text("caption", caption.to_string())
            .text("disable_notification", "true")
            .part(field, Part::bytes(bytes).file_name(file_name));

        let response = self
            .client
            .post(self.endpoint(method))
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        let body: ApiResponse = response.json().await?;
        if !body.ok {
            return Err(DeliveryError::Rejected(
                body.description
                    .unwrap_or_else(|| format!("{} returned {}", method, status)),
            ));
        }
        Ok(())
    }
}
