//! A client for posting alerts to Discord webhooks.

use crate::config::DiscordConfig;
use crate::notification::{ChannelClient, DeliveryError};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, instrument};

/// Posts one embed per webhook URL.
pub struct DiscordClient {
    http: reqwest::Client,
    username: String,
    avatar_url: Option<String>,
    title: String,
    footer: String,
    color: u32,
}

impl DiscordClient {
    /// Creates a new `DiscordClient`.
    pub fn new(config: &DiscordConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            username: config.username.clone(),
            avatar_url: config.avatar_url.clone(),
            title: config.title.clone(),
            footer: config.footer.clone(),
            color: config.color,
        })
    }

    /// Builds the webhook body for `message`.
    pub fn payload(&self, message: &str) -> Value {
        let mut payload = json!({
            "username": self.username,
            "embeds": [{
                "title": self.title,
                "description": message,
                "color": self.color,
                "footer": { "text": self.footer },
            }],
        });
        if let Some(avatar_url) = &self.avatar_url {
            payload["avatar_url"] = json!(avatar_url);
        }
        payload
    }
}

#[async_trait]
impl ChannelClient for DiscordClient {
    #[instrument(skip_all)]
    async fn send(&self, webhook_url: &str, message: &str) -> Result<(), DeliveryError> {
        let response = self
            .http
            .post(webhook_url)
            .json(&self.payload(message))
            .send()
            .await
            .map_err(DeliveryError::transport)?;

        let status = response.status();
        match status {
            // Discord answers 204 unless `?wait=true` is set.
            StatusCode::OK | StatusCode::NO_CONTENT => {
                debug!(%status, "Discord accepted notification");
                Ok(())
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(DeliveryError::Rejected {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}
