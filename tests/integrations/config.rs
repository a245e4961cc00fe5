use figment::{
    providers::{Format, Serialized, Toml},
    Figment,
};
use patrolwatch::config::{Config, ConfigError};
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

// Defaults plus the file only, so variables in the caller's shell cannot leak in.
fn load(file: &NamedTempFile) -> Result<Config, ConfigError> {
    Config::from_figment(
        Figment::from(Serialized::defaults(Config::default())).merge(Toml::file(file.path())),
    )
}

#[test]
fn test_full_file_overrides_defaults() {
    let file = write_config(
        r#"
        log_level = "debug"
        interval_seconds = 60

        [bounds]
        top = 40.9
        bottom = 40.5
        left = -74.3
        right = -73.7

        [cache]
        path = "/var/lib/patrolwatch/cache.json"
        duration_hours = 12

        [pushover]
        api_key = "app-token"
        user_keys = "u1, u2"

        [discord]
        webhook_urls = ["https://discord.com/api/webhooks/1/a"]
        username = "Night Watch"
        "#,
    );

    let config = load(&file).unwrap();

    assert_eq!(config.log_level, "debug");
    assert_eq!(config.interval_seconds, 60);
    assert_eq!(config.bounds.top, 40.9);
    assert_eq!(config.bounds.right, -73.7);
    assert_eq!(
        config.cache.path,
        PathBuf::from("/var/lib/patrolwatch/cache.json")
    );
    assert_eq!(config.cache.duration_hours, 12);
    assert_eq!(config.pushover.api_key.as_deref(), Some("app-token"));
    assert_eq!(config.pushover.user_keys, vec!["u1", "u2"]);
    assert_eq!(config.discord.webhook_urls.len(), 1);
    assert_eq!(config.discord.username, "Night Watch");
    // Untouched sections keep their defaults.
    assert_eq!(config.source.alert_kind, "POLICE");
    assert_eq!(config.discord.color, 0xFF0000);
}

#[test]
fn test_partial_file_keeps_remaining_defaults() {
    let file = write_config("interval_seconds = 30\n");

    let config = load(&file).unwrap();

    assert_eq!(config.interval_seconds, 30);
    assert_eq!(config.cache.duration_hours, 24);
    assert_eq!(config.bounds.top, 34.8233);
    assert!(config.pushover.user_keys.is_empty());
}

#[test]
fn test_inverted_bounds_are_rejected() {
    let file = write_config(
        r#"
        [bounds]
        top = 32.0
        bottom = 34.0
        "#,
    );

    let err = load(&file).unwrap_err();

    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn test_wrong_type_is_a_load_error() {
    let file = write_config(
        r#"
        [cache]
        duration_hours = "a day"
        "#,
    );

    let err = load(&file).unwrap_err();

    assert!(matches!(err, ConfigError::Load(_)));
}

#[test]
fn test_zero_interval_is_rejected() {
    let file = write_config("interval_seconds = 0\n");

    let err = load(&file).unwrap_err();

    assert!(err.to_string().contains("interval_seconds"));
}
