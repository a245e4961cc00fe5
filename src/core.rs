//! Core domain types and service traits for PatrolWatch
//!
//! This module defines the alert records flowing through a poll cycle and the
//! trait contracts for the external collaborators (alert source, geocoder)
//! that the orchestrator depends on.

use crate::network::SourceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The alert category the monitor reports on by default.
pub const POLICE_ALERT_KIND: &str = "POLICE";

/// A single event reported by the traffic-data source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Alert {
    /// Unique identifier assigned by the source
    pub id: String,
    /// Alert category, e.g. "POLICE", "ACCIDENT", "JAM"
    pub kind: String,
    /// Where the alert was reported, if the source included it
    pub coordinates: Option<Coordinates>,
    /// City name as reported by the source
    pub city: Option<String>,
    /// Raw street hint as reported by the source
    pub street: Option<String>,
}

impl Alert {
    /// Creates a new alert with only an id and a category.
    pub fn new(id: &str, kind: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: kind.to_string(),
            ..Default::default()
        }
    }

    /// Returns true if the alert belongs to `kind`.
    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind.eq_ignore_ascii_case(kind)
    }
}

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.lat, self.lon)
    }
}

/// The rectangular region polled for alerts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Bounds {
    /// Northern latitude
    pub top: f64,
    /// Southern latitude
    pub bottom: f64,
    /// Western longitude
    pub left: f64,
    /// Eastern longitude
    pub right: f64,
}

impl Bounds {
    /// The center point of the region.
    pub fn center(&self) -> Coordinates {
        Coordinates::new((self.top + self.bottom) / 2.0, (self.left + self.right) / 2.0)
    }

    /// Returns true if `top` lies north of `bottom` and `left` west of `right`.
    pub fn is_valid(&self) -> bool {
        self.top > self.bottom && self.left < self.right
    }
}

// Los Angeles County.
impl Default for Bounds {
    fn default() -> Self {
        Self {
            top: 34.8233,
            bottom: 32.5123,
            left: -119.2073,
            right: -117.6461,
        }
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "top={} bottom={} left={} right={}",
            self.top, self.bottom, self.left, self.right
        )
    }
}

// =============================================================================
// Service Traits
// =============================================================================

/// Yields raw alert records for a bounding region
#[async_trait]
pub trait AlertSource: Send + Sync {
    /// Fetches every alert currently reported inside `bounds`
    ///
    /// # Returns
    /// * `Ok(Vec<Alert>)` with alerts of all categories
    /// * `Err` on network failures, non-success statuses or undecodable payloads
    async fn fetch_alerts(&self, bounds: &Bounds) -> Result<Vec<Alert>, SourceError>;
}

/// Resolves coordinates to a human-readable street name
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Returns the street name at `coords`.
    ///
    /// Implementations never fail: when resolution is impossible they return
    /// a fallback string such as "Unknown Street".
    async fn street_name(&self, coords: Coordinates) -> String;
}
