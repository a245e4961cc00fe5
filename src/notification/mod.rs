//! Delivery of alert messages to Pushover users and Discord webhooks.
//!
//! Every configured recipient is paired with the client for its channel. The
//! [`dispatcher::Dispatcher`] sends one message to all of them concurrently
//! and reports the outcome per recipient; a failing recipient never affects
//! the others.

pub mod discord;
pub mod dispatcher;
pub mod pushover;

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub use dispatcher::{DeliveryReport, Dispatcher, Recipient};

/// Failure delivering a message to a single recipient.
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// The request never produced a response (timeout, DNS, connection refused).
    ///
    /// The wrapped error carries no URL; webhook URLs embed their token.
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),
    /// The remote service answered with a non-success status.
    #[error("rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

impl DeliveryError {
    /// Wraps a client error after dropping the request URL from it.
    pub fn transport(e: reqwest::Error) -> Self {
        DeliveryError::Transport(e.without_url())
    }
}

/// The messaging channels a recipient can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Pushover,
    Discord,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Pushover => "pushover",
            Channel::Discord => "discord",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single destination for alert messages.
#[derive(Clone, PartialEq, Eq)]
pub enum NotificationTarget {
    Pushover { user_key: String },
    Discord { webhook_url: String },
}

impl NotificationTarget {
    pub fn channel(&self) -> Channel {
        match self {
            NotificationTarget::Pushover { .. } => Channel::Pushover,
            NotificationTarget::Discord { .. } => Channel::Discord,
        }
    }

    /// The channel-specific address: a user key or a webhook URL.
    pub fn address(&self) -> &str {
        match self {
            NotificationTarget::Pushover { user_key } => user_key,
            NotificationTarget::Discord { webhook_url } => webhook_url,
        }
    }
}

// User keys and webhook URLs are credentials; only enough to tell recipients
// apart is shown.
impl fmt::Display for NotificationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationTarget::Pushover { user_key } => {
                let prefix: String = user_key.chars().take(4).collect();
                write!(f, "pushover({}…)", prefix)
            }
            NotificationTarget::Discord { webhook_url } => {
                let host = reqwest::Url::parse(webhook_url)
                    .ok()
                    .and_then(|url| url.host_str().map(str::to_string))
                    .unwrap_or_else(|| "invalid-url".to_string());
                let id = webhook_url
                    .trim_end_matches('/')
                    .rsplit('/')
                    .nth(1)
                    .unwrap_or_default();
                write!(f, "discord({}/…{})", host, id)
            }
        }
    }
}

impl fmt::Debug for NotificationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A client able to deliver a message to one address on its channel.
#[async_trait]
pub trait ChannelClient: Send + Sync {
    /// Sends `message` to `address` (a Pushover user key or a Discord webhook URL).
    async fn send(&self, address: &str, message: &str) -> Result<(), DeliveryError>;
}
