//! The orchestrator. Sequences one evaluation pass and owns the only
//! branching control flow in the system: the live-vs-cache fallback.
//!
//! Everything below this module returns errors; this is where
//! asset-level failures resolve into the fallback decision. Alerts are
//! only ever evaluated (and delivered) for live data — a cached run
//! must never re-notify on stale values.

use chrono::Utc;
use rust_decimal::Decimal;
use std::fmt;
use tracing::{info, warn};

use crate::alerts::{Bands, PortfolioBands, ThresholdEvaluator};
use crate::extract;
use crate::feed::QuoteSource;
use crate::notify::Notifier;
use crate::portfolio;
use crate::pricing;
use crate::storage::SnapshotStore;
use crate::types::{
    AssetClass, AssetSnapshot, HistoryEntry, MonitorError, NormalizedPrice, PortfolioPosition,
    Snapshot, SnapshotSource,
};

// ---------------------------------------------------------------------------
// Run settings
// ---------------------------------------------------------------------------

/// Plain values the orchestrator needs for one pass, built once from
/// configuration at process start. No component below the orchestrator
/// sees configuration or external connections.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Sell-side fee as a fraction (0.01 for 1%).
    pub fee_rate: Decimal,
    pub positions: Vec<(AssetClass, PortfolioPosition)>,
    pub bands: Vec<(AssetClass, Bands)>,
    pub portfolio_bands: PortfolioBands,
}

// ---------------------------------------------------------------------------
// Run report
// ---------------------------------------------------------------------------

/// Summary of a completed pass, for logging.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub source: SnapshotSource,
    pub assets: usize,
    pub alerts_fired: usize,
    pub notifications_sent: usize,
    pub history_appended: bool,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "source={} assets={} alerts={} notified={} history={}",
            self.source,
            self.assets,
            self.alerts_fired,
            self.notifications_sent,
            self.history_appended,
        )
    }
}

/// Everything a successful pass produces.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub snapshot: Snapshot,
    pub report: RunReport,
}

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

/// Run one complete evaluation pass.
///
/// The live path requires every asset to succeed; a single failure
/// (fetch, extraction, or normalization) fails the whole path and falls
/// back to the cached snapshot. With no cached snapshot either, the run
/// fails with `NoDataAvailable` and the caller writes no output.
pub async fn run_once(
    feed: &dyn QuoteSource,
    store: &SnapshotStore,
    notifier: Option<&dyn Notifier>,
    settings: &RunSettings,
) -> Result<RunOutcome, MonitorError> {
    match live_assets(feed).await {
        Ok((assets, prices)) => {
            Ok(live_run(store, notifier, settings, assets, prices).await)
        }
        Err(e) => {
            warn!(error = %e, "Live price path failed, attempting cache fallback");
            cached_run(store).await
        }
    }
}

/// Fetch and resolve all assets. Both fetches are issued concurrently;
/// both must succeed before normalization proceeds.
async fn live_assets(
    feed: &dyn QuoteSource,
) -> Result<(Vec<AssetSnapshot>, Vec<NormalizedPrice>), MonitorError> {
    let (gold_raw, silver_raw) = tokio::join!(
        feed.fetch_raw(AssetClass::Gold),
        feed.fetch_raw(AssetClass::Silver)
    );
    let raw_bodies = [
        (AssetClass::Gold, gold_raw?),
        (AssetClass::Silver, silver_raw?),
    ];

    let mut assets = Vec::with_capacity(raw_bodies.len());
    let mut prices = Vec::with_capacity(raw_bodies.len());

    for (asset, raw) in &raw_bodies {
        let quote = extract::extract(raw, *asset)?;
        let normalized = pricing::normalize(&quote)?;
        info!(
            asset = %asset,
            display_price = %normalized.display_price,
            change = ?quote.daily_change_percent,
            "Price normalized"
        );
        assets.push(AssetSnapshot::from_parts(&quote, &normalized));
        prices.push(normalized);
    }

    Ok((assets, prices))
}

/// The live branch: value, evaluate, notify, persist.
async fn live_run(
    store: &SnapshotStore,
    notifier: Option<&dyn Notifier>,
    settings: &RunSettings,
    assets: Vec<AssetSnapshot>,
    prices: Vec<NormalizedPrice>,
) -> RunOutcome {
    let summary = portfolio::summarize(&settings.positions, &prices, settings.fee_rate);

    let evaluator =
        ThresholdEvaluator::new(settings.bands.clone(), settings.portfolio_bands.clone());
    let alerts = evaluator.evaluate(&prices, summary.as_ref());

    let mut notifications_sent = 0;
    if let Some(notifier) = notifier {
        for alert in &alerts {
            match notifier.send(&alert.message).await {
                Ok(()) => notifications_sent += 1,
                Err(e) => warn!(
                    channel = notifier.name(),
                    kind = %alert.kind,
                    error = %e,
                    "Alert delivery failed"
                ),
            }
        }
    }

    let snapshot = Snapshot {
        taken_at: Utc::now(),
        source: SnapshotSource::Live,
        assets,
        portfolio: summary,
        alerts,
    };

    // Persistence is best-effort: the snapshot stands even if the cache
    // is unreachable.
    if let Err(e) = store.save(&snapshot).await {
        warn!(error = %e, "Failed to save latest snapshot");
    }

    let entry = HistoryEntry::from_snapshot(&snapshot);
    let history_appended = match store.append_history(&entry).await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Failed to append history entry");
            false
        }
    };

    let report = RunReport {
        source: SnapshotSource::Live,
        assets: snapshot.assets.len(),
        alerts_fired: snapshot.alerts.len(),
        notifications_sent,
        history_appended,
    };

    RunOutcome { snapshot, report }
}

/// The fallback branch: serve the stored snapshot re-stamped as cached.
/// No alert evaluation, no notification, no history append.
async fn cached_run(store: &SnapshotStore) -> Result<RunOutcome, MonitorError> {
    let previous = match store.load_latest().await {
        Ok(found) => found,
        Err(e) => {
            warn!(error = %e, "Cache fallback read failed");
            None
        }
    };

    let Some(previous) = previous else {
        return Err(MonitorError::NoDataAvailable);
    };

    info!(taken_at = %previous.taken_at, "Serving cached snapshot");
    let snapshot = previous.into_cached();

    let report = RunReport {
        source: SnapshotSource::Cached,
        assets: snapshot.assets.len(),
        alerts_fired: 0,
        notifications_sent: 0,
        history_appended: false,
    };

    Ok(RunOutcome { snapshot, report })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileCache, KvBackend};
    use anyhow::Result as AnyResult;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Deterministic quote source: canned payload or forced error per
    /// asset.
    struct StubFeed {
        gold: Result<Value, String>,
        silver: Result<Value, String>,
    }

    impl StubFeed {
        fn healthy() -> Self {
            Self {
                gold: Ok(json!({
                    "data": {"latestIndexPrice": {"index": 50000000, "value": 0.015}}
                })),
                silver: Ok(json!({
                    "data": {"latestIndexPrice": {"index": 210000, "value": -0.002}}
                })),
            }
        }

        fn silver_down() -> Self {
            Self {
                silver: Err("connection refused".to_string()),
                ..Self::healthy()
            }
        }

        fn all_down() -> Self {
            Self {
                gold: Err("connection refused".to_string()),
                silver: Err("connection refused".to_string()),
            }
        }
    }

    #[async_trait]
    impl QuoteSource for StubFeed {
        async fn fetch_raw(&self, asset: AssetClass) -> Result<Value, MonitorError> {
            let slot = match asset {
                AssetClass::Gold => &self.gold,
                AssetClass::Silver => &self.silver,
            };
            slot.clone().map_err(|message| MonitorError::FetchFailure {
                asset,
                message,
            })
        }

        fn name(&self) -> &str {
            "stub-feed"
        }
    }

    /// Records every delivered message.
    struct RecordingNotifier {
        sent: Mutex<Vec<String>>,
        fail: bool,
    }

    impl RecordingNotifier {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, message: &str) -> AnyResult<()> {
            if self.fail {
                anyhow::bail!("channel down");
            }
            self.sent.lock().unwrap().push(message.to_string());
            Ok(())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn temp_store() -> (SnapshotStore, PathBuf) {
        let mut path = std::env::temp_dir();
        path.push(format!("metalwatch_test_engine_{}.json", uuid::Uuid::new_v4()));
        (SnapshotStore::new(Box::new(FileCache::new(&path)), 10), path)
    }

    fn settings() -> RunSettings {
        RunSettings {
            fee_rate: dec!(0.01),
            positions: vec![(
                AssetClass::Gold,
                PortfolioPosition {
                    quantity: dec!(10),
                    average_buy_price: dec!(1400000),
                },
            )],
            bands: vec![
                (AssetClass::Gold, Bands::resolve(dec!(1500000), None)),
                (AssetClass::Silver, Bands::resolve(dec!(20000), None)),
            ],
            portfolio_bands: PortfolioBands::default(),
        }
    }

    fn cleanup(path: &PathBuf) {
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_live_run_fires_and_persists() {
        let (store, path) = temp_store();
        let feed = StubFeed::healthy();
        let notifier = RecordingNotifier::new();

        let outcome = run_once(&feed, &store, Some(&notifier), &settings())
            .await
            .unwrap();

        assert_eq!(outcome.snapshot.source, SnapshotSource::Live);
        assert_eq!(outcome.snapshot.assets.len(), 2);
        // Gold normalized: (50,000,000 / 10) * 0.75 = 3,750,000, far
        // above the 1,500,000 high band; silver 21,000 is above its
        // band too.
        assert_eq!(outcome.snapshot.alerts.len(), 2);
        assert_eq!(outcome.report.notifications_sent, 2);
        assert!(outcome.report.history_appended);
        assert_eq!(notifier.sent.lock().unwrap().len(), 2);

        // The latest slot now serves fallbacks.
        let stored = store.load_latest().await.unwrap().unwrap();
        assert_eq!(stored.source, SnapshotSource::Live);
        assert_eq!(
            stored.price_of(AssetClass::Gold),
            Some(dec!(3750000))
        );

        cleanup(&path);
    }

    #[tokio::test]
    async fn test_portfolio_valued_on_live_run() {
        let (store, path) = temp_store();
        let outcome = run_once(
            &StubFeed::healthy(),
            &store,
            None,
            &settings(),
        )
        .await
        .unwrap();

        let summary = outcome.snapshot.portfolio.unwrap();
        // 10 × 3,750,000 = 37,500,000 current value.
        assert_eq!(summary.total_value, dec!(37500000));
        assert_eq!(summary.total_invested, dec!(14000000));

        cleanup(&path);
    }

    #[tokio::test]
    async fn test_no_positions_means_no_portfolio_block() {
        let (store, path) = temp_store();
        let mut cfg = settings();
        cfg.positions.clear();

        let outcome = run_once(&StubFeed::healthy(), &store, None, &cfg)
            .await
            .unwrap();
        assert!(outcome.snapshot.portfolio.is_none());

        cleanup(&path);
    }

    #[tokio::test]
    async fn test_one_asset_down_falls_back_to_cache() {
        let (store, path) = temp_store();

        // Seed the cache with a prior live run.
        run_once(&StubFeed::healthy(), &store, None, &settings())
            .await
            .unwrap();

        let notifier = RecordingNotifier::new();
        let outcome = run_once(&StubFeed::silver_down(), &store, Some(&notifier), &settings())
            .await
            .unwrap();

        assert_eq!(outcome.snapshot.source, SnapshotSource::Cached);
        // Cached prices are display-only: no alerts, no notifications,
        // no history append.
        assert!(outcome.snapshot.alerts.is_empty());
        assert_eq!(outcome.report.notifications_sent, 0);
        assert!(!outcome.report.history_appended);
        assert!(notifier.sent.lock().unwrap().is_empty());
        assert_eq!(
            outcome.snapshot.price_of(AssetClass::Gold),
            Some(dec!(3750000))
        );

        cleanup(&path);
    }

    #[tokio::test]
    async fn test_all_down_empty_cache_is_no_data() {
        let (store, path) = temp_store();
        let err = run_once(&StubFeed::all_down(), &store, None, &settings())
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::NoDataAvailable));
        cleanup(&path);
    }

    #[tokio::test]
    async fn test_bad_payload_falls_back_like_fetch_failure() {
        let (store, path) = temp_store();
        run_once(&StubFeed::healthy(), &store, None, &settings())
            .await
            .unwrap();

        let feed = StubFeed {
            gold: Ok(json!({"status": "maintenance"})),
            ..StubFeed::healthy()
        };
        let outcome = run_once(&feed, &store, None, &settings()).await.unwrap();
        assert_eq!(outcome.snapshot.source, SnapshotSource::Cached);

        cleanup(&path);
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_fail_run() {
        let (store, path) = temp_store();
        let notifier = RecordingNotifier::failing();

        let outcome = run_once(&StubFeed::healthy(), &store, Some(&notifier), &settings())
            .await
            .unwrap();

        assert_eq!(outcome.snapshot.source, SnapshotSource::Live);
        assert_eq!(outcome.report.alerts_fired, 2);
        assert_eq!(outcome.report.notifications_sent, 0);

        cleanup(&path);
    }

    #[tokio::test]
    async fn test_persistence_failure_does_not_fail_run() {
        struct BrokenBackend;

        #[async_trait]
        impl KvBackend for BrokenBackend {
            async fn get(&self, _key: &str) -> AnyResult<Option<String>> {
                anyhow::bail!("cache unreachable")
            }
            async fn set(&self, _key: &str, _value: String) -> AnyResult<()> {
                anyhow::bail!("cache unreachable")
            }
            async fn push_front(&self, _list_key: &str, _value: String) -> AnyResult<()> {
                anyhow::bail!("cache unreachable")
            }
            async fn trim(&self, _list_key: &str, _start: usize, _stop: usize) -> AnyResult<()> {
                anyhow::bail!("cache unreachable")
            }
        }

        let store = SnapshotStore::new(Box::new(BrokenBackend), 10);
        let outcome = run_once(&StubFeed::healthy(), &store, None, &settings())
            .await
            .unwrap();

        assert_eq!(outcome.snapshot.source, SnapshotSource::Live);
        assert!(!outcome.report.history_appended);
    }

    #[test]
    fn test_run_report_display() {
        let report = RunReport {
            source: SnapshotSource::Live,
            assets: 2,
            alerts_fired: 1,
            notifications_sent: 1,
            history_appended: true,
        };
        let text = format!("{report}");
        assert!(text.contains("source=live"));
        assert!(text.contains("alerts=1"));
    }
}
