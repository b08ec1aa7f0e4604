//! Price feed client.
//!
//! Fetches the raw pricing payload per asset. The endpoint serves
//! browser traffic, so requests carry a browser-like User-Agent and an
//! explicit JSON Accept header. Non-2xx statuses, malformed bodies, and
//! timeouts are all the same `FetchFailure` to the orchestrator.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::types::{AssetClass, MonitorError};

/// The pricing endpoint rejects default client agents.
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Abstraction over the per-asset quote feed.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Fetch the raw, untyped response body for one asset.
    async fn fetch_raw(&self, asset: AssetClass) -> Result<Value, MonitorError>;

    /// Feed name for logging and identification.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// Live HTTP feed: `GET {base_url}/{plan}` per asset.
pub struct HttpQuoteSource {
    http: Client,
    base_url: String,
    gold_plan: String,
    silver_plan: String,
}

impl HttpQuoteSource {
    pub fn new(
        base_url: String,
        gold_plan: String,
        silver_plan: String,
        timeout: Duration,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .timeout(timeout)
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(headers)
            .build()
            .context("Failed to build price feed HTTP client")?;

        Ok(Self {
            http,
            base_url,
            gold_plan,
            silver_plan,
        })
    }

    fn plan_for(&self, asset: AssetClass) -> &str {
        match asset {
            AssetClass::Gold => &self.gold_plan,
            AssetClass::Silver => &self.silver_plan,
        }
    }

    fn url_for(&self, asset: AssetClass) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.plan_for(asset)
        )
    }

    fn failure(asset: AssetClass, message: impl Into<String>) -> MonitorError {
        MonitorError::FetchFailure {
            asset,
            message: message.into(),
        }
    }
}

#[async_trait]
impl QuoteSource for HttpQuoteSource {
    async fn fetch_raw(&self, asset: AssetClass) -> Result<Value, MonitorError> {
        let url = self.url_for(asset);
        debug!(asset = %asset, url = %url, "Fetching quote");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Self::failure(asset, e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Self::failure(asset, format!("HTTP {status} from {url}")));
        }

        resp.json::<Value>()
            .await
            .map_err(|e| Self::failure(asset, format!("malformed JSON body: {e}")))
    }

    fn name(&self) -> &str {
        "http-feed"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn feed() -> HttpQuoteSource {
        HttpQuoteSource::new(
            "https://inv.example.ir/pub/Plans".to_string(),
            "Gold".to_string(),
            "Silver".to_string(),
            Duration::from_secs(10),
        )
        .unwrap()
    }

    #[test]
    fn test_url_per_asset() {
        let feed = feed();
        assert_eq!(
            feed.url_for(AssetClass::Gold),
            "https://inv.example.ir/pub/Plans/Gold"
        );
        assert_eq!(
            feed.url_for(AssetClass::Silver),
            "https://inv.example.ir/pub/Plans/Silver"
        );
    }

    #[test]
    fn test_url_tolerates_trailing_slash() {
        let feed = HttpQuoteSource::new(
            "https://inv.example.ir/pub/Plans/".to_string(),
            "Gold".to_string(),
            "Silver".to_string(),
            Duration::from_secs(10),
        )
        .unwrap();
        assert_eq!(
            feed.url_for(AssetClass::Gold),
            "https://inv.example.ir/pub/Plans/Gold"
        );
    }

    #[test]
    fn test_feed_name() {
        assert_eq!(feed().name(), "http-feed");
    }
}
