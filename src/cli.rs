//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. These arguments are parsed at startup and then merged with
//! the configuration from the TOML file and environment variables, taking
//! precedence over both.

use clap::{Parser, Subcommand};
use figment::{
    value::{Dict, Map, Tag, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Polls a live traffic map for police alerts and notifies subscribers.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Top (northern) latitude bound.
    #[arg(short, long, value_name = "LAT", global = true, allow_negative_numbers = true)]
    pub top: Option<f64>,

    /// Bottom (southern) latitude bound.
    #[arg(short, long, value_name = "LAT", global = true, allow_negative_numbers = true)]
    pub bottom: Option<f64>,

    /// Left (western) longitude bound.
    #[arg(short, long, value_name = "LON", global = true, allow_negative_numbers = true)]
    pub left: Option<f64>,

    /// Right (eastern) longitude bound.
    #[arg(short, long, value_name = "LON", global = true, allow_negative_numbers = true)]
    pub right: Option<f64>,

    /// Seconds between the end of one poll and the start of the next.
    #[arg(short, long, value_name = "SECONDS", global = true)]
    pub interval: Option<u64>,

    /// Log notifications instead of sending them.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Path of the seen-alert cache file.
    #[arg(long, value_name = "FILE", global = true)]
    pub cache_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Poll continuously until interrupted (the default).
    Monitor,
    /// Run a single poll cycle and exit.
    CheckOnce,
    /// Print the monitored region and exit.
    ShowBounds,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Monitor)
    }
}

/// Inserts `value` at `section.key`, creating the section if needed.
fn insert_nested(dict: &mut Dict, section: &str, key: &str, value: Value) {
    let entry = dict
        .entry(section.to_string())
        .or_insert_with(|| Value::Dict(Tag::Default, Dict::new()));
    if let Value::Dict(_, inner) = entry {
        inner.insert(key.to_string(), value);
    }
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        let bounds = [
            ("top", self.top),
            ("bottom", self.bottom),
            ("left", self.left),
            ("right", self.right),
        ];
        for (key, value) in bounds {
            if let Some(value) = value {
                insert_nested(&mut dict, "bounds", key, Value::from(value));
            }
        }

        if let Some(interval) = self.interval {
            dict.insert("interval_seconds".into(), Value::from(interval));
        }

        if let Some(path) = &self.cache_file {
            insert_nested(
                &mut dict,
                "cache",
                "path",
                Value::from(path.to_string_lossy().into_owned()),
            );
        }

        // Only an explicit flag overrides; absence leaves the configured value.
        if self.dry_run {
            dict.insert("dry_run".into(), Value::from(true));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
