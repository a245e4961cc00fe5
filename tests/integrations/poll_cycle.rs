//! Integration tests for the fetch-filter-dedup-notify cycle.

#[path = "../helpers/mod.rs"]
mod helpers;

use helpers::{dispatcher_with, police_alert, test_config, FakeGeocoder, FakeSource, RecordingClient};
use patrolwatch::{app::App, core::Alert};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;
use tokio::time::timeout;

fn build_app(
    dir: &TempDir,
    source: Arc<FakeSource>,
    client: Arc<RecordingClient>,
    dry_run: bool,
) -> App {
    let mut config = test_config(dir.path());
    config.dry_run = dry_run;
    App::builder(config)
        .source_override(source)
        .geocoder_override(FakeGeocoder::new("Wilshire Blvd"))
        .dispatcher_override(dispatcher_with(client, &["u1"]))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_new_alert_is_notified_once() {
    let dir = TempDir::new().unwrap();
    let source = FakeSource::new(vec![police_alert("A1", "LA")]);
    let client = Arc::new(RecordingClient::default());
    let mut app = build_app(&dir, source.clone(), client.clone(), false);

    assert!(!app.cache().is_seen("A1"));
    let first = app.run_cycle().await;
    assert_eq!(first.new, 1);
    assert_eq!(first.delivered, 1);
    assert!(app.cache().is_seen("A1"));

    let messages = client.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("Wilshire Blvd"));
    assert!(messages[0].contains("LA"));

    // The same alert on the next poll is a duplicate.
    let second = app.run_cycle().await;
    assert_eq!(second.new, 0);
    assert_eq!(second.duplicates, 1);
    assert_eq!(client.messages().len(), 1);
}

#[tokio::test]
async fn test_other_categories_are_ignored() {
    let dir = TempDir::new().unwrap();
    let source = FakeSource::new(vec![
        Alert::new("J1", "JAM"),
        Alert::new("X1", "ACCIDENT"),
        police_alert("A1", "LA"),
    ]);
    let client = Arc::new(RecordingClient::default());
    let mut app = build_app(&dir, source, client.clone(), false);

    let report = app.run_cycle().await;

    assert_eq!(report.fetched, 3);
    assert_eq!(report.matched, 1);
    assert_eq!(client.messages().len(), 1);
    assert!(!app.cache().is_seen("J1"));
}

#[tokio::test]
async fn test_alert_without_coordinates_uses_source_street() {
    let dir = TempDir::new().unwrap();
    let mut alert = police_alert("A2", "Pasadena");
    alert.coordinates = None;
    let source = FakeSource::new(vec![alert]);
    let client = Arc::new(RecordingClient::default());
    let mut app = build_app(&dir, source, client.clone(), false);

    app.run_cycle().await;

    assert_eq!(client.messages(), vec!["Police alert on I-10 W in Pasadena"]);
}

#[tokio::test]
async fn test_seen_alerts_survive_restart() {
    let dir = TempDir::new().unwrap();
    let source = FakeSource::new(vec![police_alert("A1", "LA")]);
    let client = Arc::new(RecordingClient::default());

    let mut app = build_app(&dir, source.clone(), client.clone(), false);
    app.run_cycle().await;
    drop(app);

    let mut restarted = build_app(&dir, source, client.clone(), false);
    assert!(restarted.cache().is_seen("A1"));
    let report = restarted.run_cycle().await;

    assert_eq!(report.duplicates, 1);
    assert_eq!(client.messages().len(), 1);
}

#[tokio::test]
async fn test_delivery_failure_does_not_abort_cycle() {
    let dir = TempDir::new().unwrap();
    let source = FakeSource::new(vec![police_alert("A1", "LA"), police_alert("A2", "LA")]);
    let client = Arc::new(RecordingClient {
        failing: vec!["u2".to_string()],
        ..Default::default()
    });
    let mut config = test_config(dir.path());
    config.dry_run = false;
    let mut app = App::builder(config)
        .source_override(source)
        .geocoder_override(FakeGeocoder::new("Main St"))
        .dispatcher_override(dispatcher_with(client.clone(), &["u1", "u2", "u3"]))
        .build()
        .unwrap();

    let report = app.run_cycle().await;

    assert_eq!(report.new, 2);
    assert_eq!(report.delivered, 4);
    assert_eq!(report.failed_deliveries, 2);
    assert!(app.cache().is_seen("A1"));
    assert!(app.cache().is_seen("A2"));
}

#[tokio::test]
async fn test_source_failure_is_contained() {
    let dir = TempDir::new().unwrap();
    let source = FakeSource::new(vec![police_alert("A1", "LA")]);
    source.set_failing(true);
    let client = Arc::new(RecordingClient::default());
    let mut app = build_app(&dir, source.clone(), client.clone(), false);

    let report = app.run_cycle().await;
    assert!(report.fetch_failed);
    assert!(client.messages().is_empty());

    source.set_failing(false);
    let report = app.run_cycle().await;
    assert!(!report.fetch_failed);
    assert_eq!(report.new, 1);
}

#[tokio::test]
async fn test_dry_run_sends_nothing_and_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let source = FakeSource::new(vec![police_alert("A1", "LA")]);
    let client = Arc::new(RecordingClient::default());
    let mut app = build_app(&dir, source, client.clone(), true);

    let report = app.run_cycle().await;

    assert_eq!(report.new, 1);
    assert!(client.messages().is_empty());
    assert!(app.cache().is_seen("A1"));
    assert!(!dir.path().join("alert_cache.json").exists());
}

#[tokio::test]
async fn test_run_stops_on_shutdown_and_persists() {
    let dir = TempDir::new().unwrap();
    let source = FakeSource::new(vec![police_alert("A1", "LA")]);
    let client = Arc::new(RecordingClient::default());
    let app = build_app(&dir, source.clone(), client.clone(), false);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(app.run(shutdown_rx));

    // Wait for the first cycle to finish.
    timeout(Duration::from_secs(5), async {
        while client.messages().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("first cycle did not notify");

    shutdown_tx.send(true).unwrap();
    timeout(Duration::from_secs(5), handle)
        .await
        .expect("monitor did not stop")
        .unwrap()
        .unwrap();

    assert_eq!(client.messages().len(), 1);
    assert!(dir.path().join("alert_cache.json").exists());
}

#[tokio::test(start_paused = true)]
async fn test_next_cycle_waits_for_interval() {
    let dir = TempDir::new().unwrap();
    let source = FakeSource::new(vec![]);
    let client = Arc::new(RecordingClient::default());
    let app = build_app(&dir, source.clone(), client, false);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(app.run(shutdown_rx));

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(source.poll_count(), 1);

    // The interval is one second.
    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(source.poll_count(), 2);

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();
}
