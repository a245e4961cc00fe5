//! Client for the live traffic-map feed.
//!
//! This module polls the georss endpoint for a bounding region and converts
//! the `alerts` array into [`Alert`] records.

use crate::config::SourceConfig;
use crate::core::{Alert, AlertSource, Bounds, Coordinates};
use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Longest response body kept in a [`SourceError::Status`].
const MAX_ERROR_BODY: usize = 500;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("network error: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("HTTP {status}: failed to fetch alerts: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode alert feed: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Parses a raw georss JSON document into alerts
///
/// Records are decoded one by one. A record that cannot be decoded, or that
/// has no id, is skipped with a warning and never affects its siblings.
///
/// # Returns
/// * `Ok(Vec<Alert>)` with every alert that could be read
/// * `Err` if the document itself is not a JSON object with an `alerts` list
pub fn parse_feed(text: &str) -> Result<Vec<Alert>, serde_json::Error> {
    let feed: Feed = serde_json::from_str(text)?;
    Ok(feed.into_alerts())
}

// Temporary structs for parsing the georss JSON structure
#[derive(Deserialize)]
struct Feed {
    #[serde(default, deserialize_with = "nullable_list")]
    alerts: Vec<Value>,
}

#[derive(Deserialize)]
struct RawAlert {
    uuid: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    street: Option<String>,
    city: Option<String>,
    location: Option<RawLocation>,
}

// Coordinates of an unexpected type only cost the alert its location.
#[derive(Deserialize)]
struct RawLocation {
    x: Option<Value>,
    y: Option<Value>,
}

impl RawLocation {
    fn coordinates(&self) -> Option<Coordinates> {
        let lat = self.y.as_ref()?.as_f64()?;
        let lon = self.x.as_ref()?.as_f64()?;
        Some(Coordinates::new(lat, lon))
    }
}

fn nullable_list<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Feed {
    fn into_alerts(self) -> Vec<Alert> {
        let total = self.alerts.len();
        let alerts: Vec<Alert> = self
            .alerts
            .into_iter()
            .filter_map(|record| {
                let raw: RawAlert = match serde_json::from_value(record) {
                    Ok(raw) => raw,
                    Err(e) => {
                        warn!(error = %e, "Skipping malformed alert record");
                        return None;
                    }
                };
                let Some(id) = raw.uuid.filter(|id| !id.is_empty()) else {
                    warn!("Skipping alert record without an id");
                    return None;
                };
                Some(Alert {
                    id,
                    kind: raw.kind.unwrap_or_default(),
                    coordinates: raw.location.as_ref().and_then(RawLocation::coordinates),
                    city: raw.city,
                    street: raw.street,
                })
            })
            .collect();
        if alerts.len() < total {
            debug!(skipped = total - alerts.len(), total, "Some alert records were skipped");
        }
        alerts
    }
}

/// Polls the live-map georss endpoint.
pub struct WazeClient {
    http: reqwest::Client,
    url: String,
    env: String,
}

impl WazeClient {
    /// Creates a new client
    ///
    /// # Arguments
    /// * `config` - The feed URL, region environment and request timeout
    pub fn new(config: &SourceConfig) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(header::REFERER, HeaderValue::from_static("https://www.waze.com/live-map"));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
        headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));

        let http = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            http,
            url: config.url.clone(),
            env: config.env.clone(),
        })
    }
}

#[async_trait]
impl AlertSource for WazeClient {
    #[instrument(skip_all, fields(%bounds))]
    async fn fetch_alerts(&self, bounds: &Bounds) -> Result<Vec<Alert>, SourceError> {
        info!("Checking for alerts...");
        let response = self
            .http
            .get(&self.url)
            .query(&[
                ("top", bounds.top.to_string()),
                ("bottom", bounds.bottom.to_string()),
                ("left", bounds.left.to_string()),
                ("right", bounds.right.to_string()),
                ("env", self.env.clone()),
                ("types", "alerts,traffic,users".to_string()),
            ])
            .send()
            .await
            .map_err(SourceError::Transport)?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut end = MAX_ERROR_BODY;
                while !body.is_char_boundary(end) {
                    end -= 1;
                }
                body.truncate(end);
            }
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await.map_err(SourceError::Transport)?;
        let alerts = parse_feed(&text).map_err(SourceError::Decode)?;
        debug!(count = alerts.len(), "Fetched alerts");
        Ok(alerts)
    }
}
