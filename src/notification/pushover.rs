//! A client for sending push notifications through Pushover.

use crate::config::PushoverConfig;
use crate::notification::{ChannelClient, DeliveryError};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

/// Posts one message per user key to the Pushover messages endpoint.
pub struct PushoverClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    title: String,
}

impl PushoverClient {
    /// Creates a new `PushoverClient`.
    pub fn new(
        config: &PushoverConfig,
        api_key: String,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            api_key,
            title: config.title.clone(),
        })
    }
}

#[async_trait]
impl ChannelClient for PushoverClient {
    #[instrument(skip_all)]
    async fn send(&self, user_key: &str, message: &str) -> Result<(), DeliveryError> {
        let form = [
            ("token", self.api_key.as_str()),
            ("user", user_key),
            ("message", message),
            ("title", self.title.as_str()),
        ];
        let response = self
            .http
            .post(&self.api_url)
            .form(&form)
            .send()
            .await
            .map_err(DeliveryError::transport)?;

        let status = response.status();
        if status.is_success() {
            debug!(%status, "Pushover accepted notification");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}
