//! METALWATCH — Precious-Metal Market Snapshot Agent
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires the feed, store, and notification channel, runs exactly one
//! fetch→extract→normalize→value→evaluate→persist pass, and writes the
//! output artifact.

use anyhow::Result;
use std::time::Duration;
use tracing::{info, warn};

use metalwatch::alerts::{Bands, PortfolioBands};
use metalwatch::config::AppConfig;
use metalwatch::engine::pipeline::{self, RunSettings};
use metalwatch::feed::HttpQuoteSource;
use metalwatch::notify::{Notifier, TelegramNotifier};
use metalwatch::output;
use metalwatch::storage::{FileCache, SnapshotStore};
use metalwatch::types::{AssetClass, PortfolioPosition};

const BANNER: &str = r#"
 __  __ ___ _____ _   _    _ __      __ _  _____ ___ _  _
|  \/  | __|_   _/_\ | |  | |\ \    / //_\|_   _/ __| || |
| |\/| | _|  | |/ _ \| |__| | \ \/\/ // _ \ | || (__| __ |
|_|  |_|___| |_/_/ \_\____|_|  \_/\_//_/ \_\|_| \___|_||_|

  Precious-Metal Market Snapshot Agent
  v0.1.0 — one pass per invocation
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML
    let cfg = AppConfig::load("config.toml")?;

    // Initialise structured logging
    init_logging();

    println!("{BANNER}");
    info!(
        monitor = %cfg.monitor.name,
        output_file = %cfg.monitor.output_file,
        feed = %cfg.feed.base_url,
        "METALWATCH starting run"
    );

    // -- Wire components -------------------------------------------------

    let timeout = Duration::from_secs(cfg.feed.timeout_secs);

    let feed = HttpQuoteSource::new(
        cfg.feed.base_url.clone(),
        cfg.assets.gold.plan.clone(),
        cfg.assets.silver.plan.clone(),
        timeout,
    )?;

    let store = SnapshotStore::new(
        Box::new(FileCache::new(&cfg.cache.path)),
        cfg.cache.history_capacity,
    );

    let notifier = TelegramNotifier::from_env_names(
        cfg.alerts.telegram_bot_token_env.as_deref(),
        cfg.alerts.telegram_chat_id_env.as_deref(),
        timeout,
    )?;

    let settings = run_settings(&cfg);

    // -- Run one pass ----------------------------------------------------

    let outcome = pipeline::run_once(
        &feed,
        &store,
        notifier.as_ref().map(|n| n as &dyn Notifier),
        &settings,
    )
    .await?;

    output::write_snapshot(&cfg.monitor.output_file, &outcome.snapshot)?;

    info!(report = %outcome.report, "Run complete");
    if outcome.report.alerts_fired > 0 && notifier.is_none() {
        warn!(
            alerts = outcome.report.alerts_fired,
            "Alerts fired but no notification channel is configured"
        );
    }

    Ok(())
}

/// Build the orchestrator's plain value object from configuration.
fn run_settings(cfg: &AppConfig) -> RunSettings {
    let positions = AssetClass::ALL
        .iter()
        .filter_map(|asset| {
            cfg.portfolio.position_for(*asset).map(|p| {
                (
                    *asset,
                    PortfolioPosition {
                        quantity: p.quantity,
                        average_buy_price: p.average_buy_price,
                    },
                )
            })
        })
        .collect();

    let bands = AssetClass::ALL
        .iter()
        .map(|asset| {
            let asset_cfg = cfg.assets.for_asset(*asset);
            (
                *asset,
                Bands::resolve(asset_cfg.high_band, asset_cfg.low_band),
            )
        })
        .collect();

    RunSettings {
        fee_rate: cfg.portfolio.fee_rate(),
        positions,
        bands,
        portfolio_bands: PortfolioBands {
            profit_target_pct: cfg.portfolio.profit_target_pct,
            loss_limit_pct: cfg.portfolio.loss_limit_pct,
        },
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("metalwatch=info"));

    let json_logging = std::env::var("METALWATCH_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
