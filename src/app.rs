//! The main application logic, decoupled from the entry point.
//!
//! One poll cycle fetches alerts for the configured region, keeps those of the
//! configured category, skips ids already in the seen-alert cache, and notifies
//! every recipient about the rest. Cycles never overlap: the next one starts a
//! fixed interval after the previous one finished.

use crate::{
    config::Config,
    core::{Alert, AlertSource, Geocoder},
    deduplication::SeenAlertSet,
    formatting::format_alert_message,
    geocoding::NominatimGeocoder,
    network::WazeClient,
    notification::Dispatcher,
};
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

/// Counters describing one poll cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Alerts of any category returned by the source.
    pub fetched: usize,
    /// Alerts of the monitored category.
    pub matched: usize,
    /// Matching alerts not seen before.
    pub new: usize,
    /// Matching alerts skipped because they were already reported.
    pub duplicates: usize,
    /// Successful per-recipient deliveries.
    pub delivered: usize,
    /// Failed per-recipient deliveries.
    pub failed_deliveries: usize,
    /// Cache entries removed by the expiry purge.
    pub purged: usize,
    /// The source could not be polled this cycle.
    pub fetch_failed: bool,
}

/// A handle to the monitor and everything it owns.
pub struct App {
    config: Config,
    source: Arc<dyn AlertSource>,
    geocoder: Arc<dyn Geocoder>,
    dispatcher: Dispatcher,
    cache: SeenAlertSet,
}

impl App {
    /// Creates a new `AppBuilder` to construct an `App`.
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    pub fn cache(&self) -> &SeenAlertSet {
        &self.cache
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Runs poll cycles until the shutdown signal fires.
    ///
    /// A cycle in progress always completes. Only the sleep between cycles is
    /// interrupted. The cache is persisted before returning.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) -> Result<()> {
        info!(
            interval_seconds = self.config.interval_seconds,
            bounds = %self.config.bounds,
            "Starting alert monitor"
        );
        if self.config.dry_run {
            info!("DRY RUN MODE: Notifications will not be sent");
        }

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let report = self.run_cycle().await;
            info!(?report, "Poll cycle finished");

            debug!(seconds = self.config.interval_seconds, "Sleeping until next poll");
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    info!("Monitor received shutdown signal.");
                    break;
                }
                _ = tokio::time::sleep(self.config.interval()) => {}
            }
        }

        self.persist_cache();
        info!("Monitor stopped.");
        Ok(())
    }

    /// Runs a single fetch-filter-dedup-notify cycle.
    ///
    /// Every failure inside the cycle is logged and counted; none escapes.
    #[instrument(skip_all)]
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport {
            purged: self.cache.purge(Utc::now()),
            ..Default::default()
        };

        let alerts = match self.source.fetch_alerts(&self.config.bounds).await {
            Ok(alerts) => alerts,
            Err(e) => {
                error!(error = %e, "Failed to fetch alerts");
                report.fetch_failed = true;
                self.persist_cache();
                return report;
            }
        };
        report.fetched = alerts.len();
        metrics::counter!("alerts_fetched_total").increment(alerts.len() as u64);

        let kind = self.config.source.alert_kind.clone();
        let matching: Vec<Alert> = alerts.into_iter().filter(|a| a.is_kind(&kind)).collect();
        report.matched = matching.len();
        info!(total = report.fetched, matched = report.matched, %kind, "Found alerts");

        for alert in matching {
            if self.cache.is_seen(&alert.id) {
                debug!(id = %alert.id, "Alert already reported, skipping");
                metrics::counter!("alerts_duplicate_total").increment(1);
                report.duplicates += 1;
                continue;
            }
            report.new += 1;
            metrics::counter!("alerts_new_total").increment(1);

            let street_name = match alert.coordinates {
                Some(coords) => Some(self.geocoder.street_name(coords).await),
                None => None,
            };
            let message = format_alert_message(&alert, street_name.as_deref());
            info!(
                id = %alert.id,
                street = alert.street.as_deref().unwrap_or_default(),
                location = %alert.coordinates.map(|c| c.to_string()).unwrap_or_else(|| "N/A".to_string()),
                "{}", message
            );

            if self.config.dry_run {
                info!(%message, "Dry run, notification not sent");
            } else {
                let deliveries = self.dispatcher.dispatch(&message).await;
                let delivered = deliveries.iter().filter(|d| d.is_delivered()).count();
                report.delivered += delivered;
                report.failed_deliveries += deliveries.len() - delivered;
            }

            // Marked even when some deliveries failed, so recipients that did
            // receive it are not notified again next cycle.
            self.cache.mark_seen(&alert.id);
        }

        self.persist_cache();
        report
    }

    fn persist_cache(&mut self) {
        if self.config.dry_run || !self.cache.is_dirty() {
            return;
        }
        self.cache.persist();
    }
}

/// Builder for the main application.
///
/// This pattern allows for a clean separation of concerns between constructing
/// the application's components and running the application. It also provides
/// a convenient way to override components for testing purposes.
pub struct AppBuilder {
    config: Config,
    source_override: Option<Arc<dyn AlertSource>>,
    geocoder_override: Option<Arc<dyn Geocoder>>,
    dispatcher_override: Option<Dispatcher>,
}

impl AppBuilder {
    /// Creates a new `AppBuilder` with the given configuration.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            source_override: None,
            geocoder_override: None,
            dispatcher_override: None,
        }
    }

    /// Overrides the alert source for testing.
    pub fn source_override(mut self, source: Arc<dyn AlertSource>) -> Self {
        self.source_override = Some(source);
        self
    }

    /// Overrides the geocoder for testing.
    pub fn geocoder_override(mut self, geocoder: Arc<dyn Geocoder>) -> Self {
        self.geocoder_override = Some(geocoder);
        self
    }

    /// Overrides the notification dispatcher for testing.
    pub fn dispatcher_override(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher_override = Some(dispatcher);
        self
    }

    /// Builds all application components and loads the seen-alert cache.
    #[instrument(skip_all)]
    pub fn build(self) -> Result<App> {
        let config = self.config;

        let source = match self.source_override {
            Some(source) => source,
            None => Arc::new(WazeClient::new(&config.source)?) as Arc<dyn AlertSource>,
        };
        let geocoder = match self.geocoder_override {
            Some(geocoder) => geocoder,
            None => Arc::new(NominatimGeocoder::new(&config.geocoder)?) as Arc<dyn Geocoder>,
        };
        let dispatcher = match self.dispatcher_override {
            Some(dispatcher) => dispatcher,
            None => Dispatcher::from_config(&config)?,
        };
        if !dispatcher.is_configured() {
            warn!("No notification recipients configured. Alerts will only be logged.");
        } else {
            let targets: Vec<String> = dispatcher.targets().map(|t| t.to_string()).collect();
            info!(?targets, "Notification recipients configured");
        }

        let cache = SeenAlertSet::load(config.cache.path.clone(), config.cache.retention());
        let stats = cache.stats();
        info!(
            count = stats.count,
            retention_hours = config.cache.duration_hours,
            "Seen-alert cache ready"
        );

        Ok(App {
            config,
            source,
            geocoder,
            dispatcher,
            cache,
        })
    }
}
