//! Core data types shared across the bot.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Keyword match type on the ads platform.
///
/// `Other` absorbs values the platform may add later; the bid formula maps it
/// to the most conservative configured multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MatchType {
    Exact,
    Phrase,
    Broad,
    Auto,
    #[serde(other)]
    Other,
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchType::Exact => "EXACT",
            MatchType::Phrase => "PHRASE",
            MatchType::Broad => "BROAD",
            MatchType::Auto => "AUTO",
            MatchType::Other => "OTHER",
        };
        f.write_str(s)
    }
}

/// Discrete keyword quality bucket, A (winner) through E (kill).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PerformanceTier {
    A,
    B,
    C,
    D,
    E,
}

impl fmt::Display for PerformanceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PerformanceTier::A => "A",
            PerformanceTier::B => "B",
            PerformanceTier::C => "C",
            PerformanceTier::D => "D",
            PerformanceTier::E => "E",
        };
        f.write_str(s)
    }
}

/// AOV band driving the bid ceiling, ordered L < M < H < X.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AovTier {
    L,
    M,
    H,
    X,
}

/// How trustworthy an AOV figure is. Derived purely from order count and
/// active days in the window — never set ad hoc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AovConfidence {
    High,
    Medium,
    Low,
    Default,
}

/// Which lookback window an AOV record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AovSource {
    Recent,
    Extended,
    Default,
}

/// Average-order-value figure for one ASIN, with its confidence band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AovRecord {
    pub asin: String,
    pub aov: f64,
    pub orders: u64,
    pub active_days: u32,
    pub confidence: AovConfidence,
    pub source: AovSource,
}

/// One per-day sales aggregate row from the metrics store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsinDailyRow {
    #[serde(alias = "advertisedAsin")]
    pub asin: String,
    #[serde(alias = "segments_date")]
    pub date: NaiveDate,
    pub orders: u64,
    pub sales: f64,
}

/// Performance signal for one keyword over the lookback window.
///
/// Produced once per optimization run from the metrics store; never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordSnapshot {
    pub keyword_id: String,
    pub campaign_id: String,
    pub ad_group_id: String,
    pub keyword_text: String,
    pub match_type: MatchType,
    #[serde(alias = "current_bid")]
    pub current_bid: f64,
    pub clicks: u64,
    pub conversions: u64,
    #[serde(default)]
    pub acos: f64,
    #[serde(default)]
    pub cvr: f64,
    #[serde(alias = "advertisedAsin")]
    pub asin: Option<String>,
}

/// Output of the bid formula for one keyword.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidDecision {
    pub keyword_id: String,
    pub current_bid: f64,
    pub proposed_bid: f64,
    pub should_update: bool,
    pub tier: PerformanceTier,
    pub reason: String,
    /// Multiplier components that produced the bid, for the audit log.
    pub components: BTreeMap<String, f64>,
}

/// Today's spend against the daily budget for one campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignBudgetStatus {
    #[serde(alias = "campaignId")]
    pub campaign_id: String,
    #[serde(alias = "campaign_name")]
    pub campaign_name: String,
    #[serde(alias = "budget")]
    pub budget_daily: f64,
    #[serde(alias = "spend_today")]
    pub spend_today: f64,
}

impl CampaignBudgetStatus {
    /// Fraction of the daily budget spent so far. `None` flags an invalid
    /// (non-positive) budget; callers treat it as nothing-to-do, not zero risk.
    pub fn spend_pct(&self) -> Option<f64> {
        if self.budget_daily > 0.0 {
            Some(self.spend_today / self.budget_daily)
        } else {
            None
        }
    }
}

/// Pacing state of a campaign at evaluation time. Purely a function of
/// spend percentage — no sticky memory across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacingState {
    Healthy,
    Warning,
    Critical,
    Exhausted,
}

/// Which pacing check fired for a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacingTrigger {
    CheckpointWarning,
    CheckpointCritical,
    Exhausted,
}

impl fmt::Display for PacingTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PacingTrigger::CheckpointWarning => "checkpoint_warning",
            PacingTrigger::CheckpointCritical => "checkpoint_critical",
            PacingTrigger::Exhausted => "exhausted",
        };
        f.write_str(s)
    }
}

/// Record of one emergency bid reduction applied to a campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyAction {
    pub campaign_id: String,
    pub campaign_name: String,
    pub trigger: PacingTrigger,
    pub reduction_pct: f64,
    pub keywords_updated: usize,
    pub keywords_failed: usize,
}

/// One enabled keyword of a campaign, as returned for emergency cuts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignKeywordRow {
    pub keyword_id: String,
    #[serde(alias = "bid", alias = "current_bid")]
    pub current_bid: f64,
}

/// A staged bid update for the ads platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidUpdate {
    pub keyword_id: String,
    pub bid: f64,
}

/// Per-item success/failure counts from a batch update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub success: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Audit-log row for one bid change (applied or dry-run).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidChangeEntry {
    pub change_id: String,
    pub keyword_id: String,
    pub old_bid: f64,
    pub new_bid: f64,
    pub bid_change: f64,
    pub reason: String,
    pub changed_by: String,
    pub components: BTreeMap<String, f64>,
    pub changed_at: String,
    pub dry_run: bool,
}

/// Request to create a new keyword (harvesting surface).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewKeyword {
    pub campaign_id: String,
    pub ad_group_id: String,
    pub keyword_text: String,
    pub match_type: MatchType,
    pub bid: f64,
}

/// Request to create a negative keyword.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNegativeKeyword {
    pub campaign_id: String,
    pub ad_group_id: String,
    pub keyword_text: String,
    pub match_type: MatchType,
}
