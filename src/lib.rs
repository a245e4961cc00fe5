//! PatrolWatch - a police alert monitor for live traffic maps
//!
//! This library polls a traffic-data feed for a region, remembers which
//! alerts were already reported, and fans new ones out to Pushover users and
//! Discord webhooks.

pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod deduplication;
pub mod formatting;
pub mod geocoding;
pub mod network;
pub mod notification;

// Re-export core types for convenience
pub use core::*;
