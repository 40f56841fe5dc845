//! Optimization run planning.
//!
//! Pure: takes snapshots plus the run's AOV resolver and produces the full
//! set of decisions with aggregate totals. Running it twice over the same
//! inputs yields the same plan, which is what makes dry runs trustworthy.

use common::{BidDecision, KeywordSnapshot};
use tracing::debug;

use crate::aov::AovResolver;
use crate::bid::BidCalculator;

/// Everything an optimization run decided, before any of it is pushed.
#[derive(Debug, Clone)]
pub struct OptimizationPlan {
    pub decisions: Vec<BidDecision>,
    pub totals: RunTotals,
}

impl OptimizationPlan {
    /// Decisions that actually need a platform write.
    pub fn updates(&self) -> impl Iterator<Item = &BidDecision> {
        self.decisions.iter().filter(|d| d.should_update)
    }
}

/// Aggregate counters for the run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunTotals {
    pub evaluated: usize,
    pub to_update: usize,
    pub unchanged: usize,
    /// Sum of positive bid deltas across staged updates.
    pub total_increase: f64,
    /// Sum of negative bid deltas (absolute value).
    pub total_decrease: f64,
}

/// Evaluate every snapshot at the given local hour.
pub fn build_plan(
    snapshots: &[KeywordSnapshot],
    resolver: &AovResolver,
    calc: &BidCalculator,
    local_hour: u32,
) -> OptimizationPlan {
    let mut decisions = Vec::with_capacity(snapshots.len());
    let mut totals = RunTotals {
        evaluated: snapshots.len(),
        ..RunTotals::default()
    };

    for snap in snapshots {
        let aov = resolver.resolve_opt(snap.asin.as_deref());
        let decision = calc.propose(snap, &aov, local_hour);
        if decision.should_update {
            totals.to_update += 1;
            let delta = decision.proposed_bid - decision.current_bid;
            if delta > 0.0 {
                totals.total_increase += delta;
            } else {
                totals.total_decrease += -delta;
            }
        } else {
            totals.unchanged += 1;
        }
        decisions.push(decision);
    }

    debug!(
        evaluated = totals.evaluated,
        to_update = totals.to_update,
        unchanged = totals.unchanged,
        "Built optimization plan"
    );

    OptimizationPlan { decisions, totals }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use common::config::{AovConfig, BidRulesConfig, TierThresholds};
    use common::{AsinDailyRow, MatchType};

    fn snapshot(id: &str, current_bid: f64, conversions: u64, clicks: u64) -> KeywordSnapshot {
        KeywordSnapshot {
            keyword_id: id.into(),
            campaign_id: "c1".into(),
            ad_group_id: "g1".into(),
            keyword_text: format!("kw {id}"),
            match_type: MatchType::Exact,
            current_bid,
            clicks,
            conversions,
            acos: if conversions > 0 { 0.20 } else { 0.0 },
            cvr: conversions as f64 / clicks.max(1) as f64,
            asin: Some("B001".into()),
        }
    }

    fn resolver() -> AovResolver {
        let today = NaiveDate::from_ymd_opt(2026, 8, 20).expect("valid date");
        let rows: Vec<AsinDailyRow> = (5..13)
            .map(|d| AsinDailyRow {
                asin: "B001".into(),
                date: NaiveDate::from_ymd_opt(2026, 8, d).expect("valid date"),
                orders: 2,
                sales: 90.0,
            })
            .collect();
        AovResolver::from_daily_rows(&rows, &AovConfig::default(), 35.0, today)
    }

    fn calc() -> BidCalculator {
        BidCalculator::new(BidRulesConfig::default(), TierThresholds::default())
    }

    #[test]
    fn test_totals_split_updates_and_holds() {
        let snaps = vec![
            // Winner far below formula: staged increase.
            snapshot("k1", 0.80, 10, 50),
            // Loser with a high bid: staged decrease.
            snapshot("k2", 1.50, 0, 40),
        ];
        let plan = build_plan(&snaps, &resolver(), &calc(), 12);
        assert_eq!(plan.totals.evaluated, 2);
        assert_eq!(plan.totals.to_update, 2);
        assert_eq!(plan.totals.unchanged, 0);
        assert!(plan.totals.total_increase > 0.0);
        assert!(plan.totals.total_decrease > 0.0);
        assert_eq!(plan.updates().count(), 2);
    }

    #[test]
    fn test_plan_is_deterministic() {
        // A dry run and the real run see the same plan.
        let snaps = vec![
            snapshot("k1", 0.80, 10, 50),
            snapshot("k2", 1.50, 0, 40),
            snapshot("k3", 0.90, 0, 5),
        ];
        let r = resolver();
        let c = calc();
        let a = build_plan(&snaps, &r, &c, 19);
        let b = build_plan(&snaps, &r, &c, 19);
        assert_eq!(a.decisions, b.decisions);
        assert_eq!(a.totals, b.totals);
    }

    #[test]
    fn test_empty_input() {
        let plan = build_plan(&[], &resolver(), &calc(), 12);
        assert!(plan.decisions.is_empty());
        assert_eq!(plan.totals, RunTotals::default());
    }
}
