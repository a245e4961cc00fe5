// src/formatting.rs

use crate::core::Alert;

pub const UNKNOWN_STREET: &str = "Unknown Street";
pub const UNKNOWN_LOCATION: &str = "Unknown location";
pub const UNKNOWN_CITY: &str = "Unknown city";

/// Renders the notification text for an alert.
///
/// `street_name` is the geocoded name when the alert carried coordinates;
/// without it the source's own street hint is used.
pub fn format_alert_message(alert: &Alert, street_name: Option<&str>) -> String {
    let place = match street_name {
        Some(name) => name,
        None => alert
            .street
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(UNKNOWN_LOCATION),
    };
    let city = alert
        .city
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .unwrap_or(UNKNOWN_CITY);

    format!("Police alert on {} in {}", place, city)
}
