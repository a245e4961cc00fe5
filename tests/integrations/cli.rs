use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;
use wiremock::{
    matchers::{body_string_contains, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

fn patrolwatch() -> Command {
    let mut cmd = Command::cargo_bin("patrolwatch").unwrap();
    for var in [
        "BOUNDS_TOP",
        "BOUNDS_BOTTOM",
        "BOUNDS_LEFT",
        "BOUNDS_RIGHT",
        "CACHE_DURATION_HOURS",
        "PUSHOVER_API_KEY",
        "PUSHOVER_USER_KEYS",
        "DISCORD_WEBHOOK_URLS",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_show_bounds_prints_default_region() {
    patrolwatch()
        .arg("show-bounds")
        .assert()
        .success()
        .stdout(predicate::str::contains("Current monitoring bounds:"))
        .stdout(predicate::str::contains("Top: 34.8233"))
        .stdout(predicate::str::contains("Right: -117.6461"));
}

#[test]
fn test_show_bounds_honours_environment_and_flags() {
    patrolwatch()
        .env("BOUNDS_TOP", "40.9")
        .env("BOUNDS_BOTTOM", "40.5")
        .args(["show-bounds", "--left", "-74.3", "--right", "-73.7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Top: 40.9"))
        .stdout(predicate::str::contains("Bottom: 40.5"))
        .stdout(predicate::str::contains("Left: -74.3"))
        .stdout(predicate::str::contains("Right: -73.7"));
}

#[test]
fn test_flags_take_precedence_over_environment() {
    patrolwatch()
        .env("BOUNDS_TOP", "40.9")
        .args(["show-bounds", "--top", "35.5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Top: 35.5"));
}

#[test]
fn test_malformed_cache_duration_fails_startup() {
    patrolwatch()
        .env("CACHE_DURATION_HOURS", "a day")
        .arg("show-bounds")
        .assert()
        .failure();
}

#[test]
fn test_inverted_bounds_fail_startup() {
    patrolwatch()
        .args(["show-bounds", "--top", "30", "--bottom", "35"])
        .assert()
        .failure();
}

fn check_once(server_uri: &str, cache_file: &Path) -> assert_cmd::assert::Assert {
    patrolwatch()
        .env("PATROLWATCH_SOURCE__URL", format!("{server_uri}/georss"))
        .env("PATROLWATCH_GEOCODER__URL", format!("{server_uri}/reverse"))
        .env("DISCORD_WEBHOOK_URLS", format!("{server_uri}/hooks/1"))
        .arg("check-once")
        .arg("--cache-file")
        .arg(cache_file)
        .assert()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_check_once_notifies_and_remembers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/georss"))
        .and(query_param("types", "alerts,traffic,users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "alerts": [
                {
                    "uuid": "A1",
                    "type": "POLICE",
                    "city": "LA",
                    "street": "I-10 W",
                    "location": { "x": -118.2, "y": 34.0 }
                },
                { "uuid": "J1", "type": "JAM", "city": "LA" }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/reverse"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "address": { "road": "Wilshire Boulevard" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/hooks/1"))
        .and(body_string_contains("Police alert on Wilshire Boulevard in LA"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let cache_file = dir.path().join("alert_cache.json");
    let uri = server.uri();

    let (uri_first, cache_first) = (uri.clone(), cache_file.clone());
    tokio::task::spawn_blocking(move || {
        check_once(&uri_first, &cache_first).success();
    })
    .await
    .unwrap();

    let saved = std::fs::read_to_string(&cache_file).unwrap();
    assert!(saved.contains("\"A1\""));
    assert!(!saved.contains("\"J1\""));

    // A second run with the same cache file must not notify again.
    tokio::task::spawn_blocking(move || {
        check_once(&uri, &cache_file).success();
    })
    .await
    .unwrap();

    server.verify().await;
}
