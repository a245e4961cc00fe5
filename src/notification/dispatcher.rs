//! Fan-out of a single message to every configured recipient.

use crate::config::Config;
use crate::notification::{
    discord::DiscordClient, pushover::PushoverClient, ChannelClient, DeliveryError,
    NotificationTarget,
};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// A target paired with the client that delivers to it.
#[derive(Clone)]
pub struct Recipient {
    pub target: NotificationTarget,
    client: Arc<dyn ChannelClient>,
}

impl Recipient {
    pub fn new(target: NotificationTarget, client: Arc<dyn ChannelClient>) -> Self {
        Self { target, client }
    }
}

/// The outcome of one delivery attempt.
#[derive(Debug)]
pub struct DeliveryReport {
    pub target: NotificationTarget,
    pub outcome: Result<(), DeliveryError>,
}

impl DeliveryReport {
    pub fn is_delivered(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Sends messages to every recipient, isolating failures per recipient.
pub struct Dispatcher {
    recipients: Vec<Recipient>,
    max_concurrent_sends: usize,
}

impl Dispatcher {
    /// Creates a new `Dispatcher`.
    ///
    /// # Arguments
    /// * `recipients` - Every destination a message is sent to.
    /// * `max_concurrent_sends` - The maximum number of sends in flight at once.
    pub fn new(recipients: Vec<Recipient>, max_concurrent_sends: usize) -> Self {
        Self {
            recipients,
            max_concurrent_sends: max_concurrent_sends.max(1),
        }
    }

    /// Builds the Pushover and Discord recipients described by `config`.
    ///
    /// Pushover user keys are ignored when no API key is configured.
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let timeout = Duration::from_secs(config.notification.timeout_seconds);
        let mut recipients = Vec::new();

        let api_key = config
            .pushover
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty());
        match api_key {
            Some(api_key) if !config.pushover.user_keys.is_empty() => {
                let client: Arc<dyn ChannelClient> = Arc::new(PushoverClient::new(
                    &config.pushover,
                    api_key.to_string(),
                    timeout,
                )?);
                recipients.extend(config.pushover.user_keys.iter().map(|user_key| {
                    Recipient::new(
                        NotificationTarget::Pushover {
                            user_key: user_key.clone(),
                        },
                        client.clone(),
                    )
                }));
            }
            None if !config.pushover.user_keys.is_empty() => {
                warn!(
                    user_keys = config.pushover.user_keys.len(),
                    "Pushover user keys are configured but no API key was provided. Pushover notifications will be disabled."
                );
            }
            _ => {}
        }

        if !config.discord.webhook_urls.is_empty() {
            let client: Arc<dyn ChannelClient> =
                Arc::new(DiscordClient::new(&config.discord, timeout)?);
            recipients.extend(config.discord.webhook_urls.iter().map(|url| {
                Recipient::new(
                    NotificationTarget::Discord {
                        webhook_url: url.clone(),
                    },
                    client.clone(),
                )
            }));
        }

        Ok(Self::new(
            recipients,
            config.notification.max_concurrent_sends,
        ))
    }

    /// Returns true if at least one recipient exists on any channel.
    pub fn is_configured(&self) -> bool {
        !self.recipients.is_empty()
    }

    pub fn targets(&self) -> impl Iterator<Item = &NotificationTarget> {
        self.recipients.iter().map(|r| &r.target)
    }

    /// Sends `message` to every recipient and waits for all attempts.
    ///
    /// Failures are logged per recipient and returned in the report list; this
    /// method itself never fails. Reports are in completion order.
    #[instrument(skip_all, fields(recipients = self.recipients.len()))]
    pub async fn dispatch(&self, message: &str) -> Vec<DeliveryReport> {
        if self.recipients.is_empty() {
            debug!("No notification recipients configured, skipping dispatch");
            return Vec::new();
        }

        let sends: Vec<_> = self
            .recipients
            .iter()
            .map(|recipient| async move {
                let target = &recipient.target;
                let channel = target.channel().as_str();
                let outcome = recipient.client.send(target.address(), message).await;
                match &outcome {
                    Ok(()) => {
                        info!(recipient = %target, "Notification sent");
                        metrics::counter!("notifications_sent_total", "channel" => channel)
                            .increment(1);
                    }
                    Err(e) => {
                        error!(recipient = %target, error = %e, "Failed to send notification");
                        metrics::counter!("notifications_failed_total", "channel" => channel)
                            .increment(1);
                    }
                }
                DeliveryReport {
                    target: target.clone(),
                    outcome,
                }
            })
            .collect();
        let reports: Vec<DeliveryReport> = stream::iter(sends)
            .buffer_unordered(self.max_concurrent_sends)
            .collect()
            .await;

        let delivered = reports.iter().filter(|r| r.is_delivered()).count();
        debug!(delivered, failed = reports.len() - delivered, "Dispatch finished");
        reports
    }
}
