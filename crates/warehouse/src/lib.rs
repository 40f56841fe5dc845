//! Metrics warehouse access.
//!
//! All reads the decision engine needs, plus the bid-change audit log,
//! behind one trait so jobs can run against a fake store in tests.

pub mod http;

use async_trait::async_trait;
use common::{
    AsinDailyRow, BidChangeEntry, CampaignBudgetStatus, CampaignKeywordRow, KeywordSnapshot,
    Result,
};

pub use http::HttpMetricsStore;

/// Read models for the decision engine plus the audit write path.
#[async_trait]
pub trait MetricsStore: Send + Sync {
    /// Keywords with enough click volume to be worth re-bidding.
    async fn keywords_for_optimization(
        &self,
        min_clicks: u64,
        lookback_days: u32,
    ) -> Result<Vec<KeywordSnapshot>>;

    /// Per-day per-ASIN sales rows covering at least `window_days`.
    async fn asin_daily_sales(&self, window_days: u32) -> Result<Vec<AsinDailyRow>>;

    /// Today's spend against daily budget, per enabled campaign.
    async fn campaign_budget_status(&self) -> Result<Vec<CampaignBudgetStatus>>;

    /// Enabled keywords of one campaign whose bid is above the floor, i.e.
    /// the ones an emergency reduction can still cut.
    async fn campaign_keywords_above_floor(
        &self,
        campaign_id: &str,
        min_bid: f64,
    ) -> Result<Vec<CampaignKeywordRow>>;

    /// Append one row to the bid-change audit log.
    async fn log_bid_change(&self, entry: &BidChangeEntry) -> Result<()>;
}
