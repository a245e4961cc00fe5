//! Reverse geocoding through an OpenStreetMap Nominatim endpoint.

use crate::config::GeocoderConfig;
use crate::core::{Coordinates, Geocoder};
use crate::formatting::UNKNOWN_STREET;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, instrument};

#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("geocoding request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("geocoding failed with HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("geocoding service returned an error: {0}")]
    Service(String),
}

#[derive(Deserialize, Default)]
struct ReverseResponse {
    error: Option<String>,
    #[serde(default)]
    address: Address,
}

#[derive(Deserialize, Default)]
struct Address {
    road: Option<String>,
    street: Option<String>,
    highway: Option<String>,
}

/// Resolves coordinates with the Nominatim `/reverse` API.
pub struct NominatimGeocoder {
    http: reqwest::Client,
    url: String,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocoderConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            http,
            url: config.url.clone(),
        })
    }

    /// Looks up the most specific street name at `coords`.
    ///
    /// # Returns
    /// * `Ok(Some(name))` if the address has a road, street or highway
    /// * `Ok(None)` if the location has no named street
    /// * `Err` on network failures, non-200 statuses or service errors
    pub async fn lookup(&self, coords: Coordinates) -> Result<Option<String>, GeocodeError> {
        let response = self
            .http
            .get(&self.url)
            .query(&[
                ("lat", coords.lat.to_string()),
                ("lon", coords.lon.to_string()),
                ("format", "json".to_string()),
                ("addressdetails", "1".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(GeocodeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let data: ReverseResponse = response.json().await?;
        if let Some(message) = data.error {
            return Err(GeocodeError::Service(message));
        }
        let Address {
            road,
            street,
            highway,
        } = data.address;
        Ok(road.or(street).or(highway))
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    #[instrument(skip(self))]
    async fn street_name(&self, coords: Coordinates) -> String {
        match self.lookup(coords).await {
            Ok(Some(name)) => name,
            Ok(None) => UNKNOWN_STREET.to_string(),
            Err(e) => {
                error!(error = %e, "Geocoding error");
                UNKNOWN_STREET.to_string()
            }
        }
    }
}
