//! HTTP metrics store.
//!
//! The warehouse exposes named, parameterized queries over POST; the store
//! never builds SQL. Row shapes are deserialized straight into the shared
//! types via their serde aliases.

use async_trait::async_trait;
use common::{
    AsinDailyRow, BidChangeEntry, CampaignBudgetStatus, CampaignKeywordRow, Error,
    KeywordSnapshot, Result,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

use crate::MetricsStore;

/// Metrics store over the warehouse query API.
#[derive(Debug, Clone)]
pub struct HttpMetricsStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMetricsStore {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Run a named query and deserialize its row set.
    async fn query<T: DeserializeOwned>(&self, name: &str, params: Value) -> Result<Vec<T>> {
        let resp = self
            .client
            .post(self.url("/v1/query"))
            .json(&json!({ "query": name, "params": params }))
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Warehouse(format!(
                "query {name} failed with status {status}: {body}"
            )));
        }

        #[derive(serde::Deserialize)]
        struct Rows<T> {
            rows: Vec<T>,
        }

        let body: Rows<T> = resp.json().await.map_err(|e| Error::Http(e.to_string()))?;
        debug!(query = name, rows = body.rows.len(), "Warehouse query complete");
        Ok(body.rows)
    }
}

#[async_trait]
impl MetricsStore for HttpMetricsStore {
    async fn keywords_for_optimization(
        &self,
        min_clicks: u64,
        lookback_days: u32,
    ) -> Result<Vec<KeywordSnapshot>> {
        self.query(
            "keywords_for_optimization",
            json!({ "min_clicks": min_clicks, "lookback_days": lookback_days }),
        )
        .await
    }

    async fn asin_daily_sales(&self, window_days: u32) -> Result<Vec<AsinDailyRow>> {
        self.query("asin_daily_sales", json!({ "window_days": window_days }))
            .await
    }

    async fn campaign_budget_status(&self) -> Result<Vec<CampaignBudgetStatus>> {
        self.query("campaign_budget_status", json!({})).await
    }

    async fn campaign_keywords_above_floor(
        &self,
        campaign_id: &str,
        min_bid: f64,
    ) -> Result<Vec<CampaignKeywordRow>> {
        self.query(
            "campaign_keywords_above_floor",
            json!({ "campaign_id": campaign_id, "min_bid": min_bid }),
        )
        .await
    }

    async fn log_bid_change(&self, entry: &BidChangeEntry) -> Result<()> {
        let resp = self
            .client
            .post(self.url("/v1/bid-changes"))
            .json(entry)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status().as_u16();
        if status != 200 && status != 201 {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Warehouse(format!(
                "audit write failed with status {status}: {body}"
            )));
        }
        Ok(())
    }
}
