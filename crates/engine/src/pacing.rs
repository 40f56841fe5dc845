//! Budget pacing assessment.
//!
//! Pure evaluation of spend-vs-budget at a given local hour; the job layer
//! is responsible for fetching spend, applying the reductions, and logging.
//! The checkpoint checks only fire at the configured afternoon hour; the
//! exhaustion check fires at any hour and independently of the checkpoint,
//! so a campaign can trip both in one run.

use std::collections::HashSet;

use common::config::PacingConfig;
use common::{CampaignBudgetStatus, PacingState, PacingTrigger};
use tracing::warn;

use crate::bid::round_bid;

/// Assesses campaign spend against pacing thresholds.
#[derive(Debug, Clone)]
pub struct PacingMonitor {
    cfg: PacingConfig,
}

impl PacingMonitor {
    pub fn new(cfg: PacingConfig) -> Self {
        Self { cfg }
    }

    /// Classify a campaign's current pacing, independent of the hour.
    pub fn state(&self, status: &CampaignBudgetStatus) -> PacingState {
        let Some(pct) = status.spend_pct() else {
            return PacingState::Healthy;
        };
        if pct >= self.cfg.exhaustion_threshold {
            PacingState::Exhausted
        } else if pct > self.cfg.critical_threshold {
            PacingState::Critical
        } else if pct > self.cfg.warning_threshold {
            PacingState::Warning
        } else {
            PacingState::Healthy
        }
    }

    /// Triggers that fire for this campaign at this local hour, paired with
    /// the bid reduction fraction each one demands.
    ///
    /// At the checkpoint hour, critical supersedes warning; exhaustion is
    /// appended on top of whichever checkpoint trigger fired, if any.
    pub fn assess(
        &self,
        status: &CampaignBudgetStatus,
        local_hour: u32,
    ) -> Vec<(PacingTrigger, f64)> {
        let Some(pct) = status.spend_pct() else {
            warn!(
                campaign_id = %status.campaign_id,
                budget = status.budget_daily,
                "Campaign has a non-positive daily budget, skipping pacing checks"
            );
            return Vec::new();
        };

        let mut triggers = Vec::new();

        if local_hour == self.cfg.checkpoint_hour {
            if pct > self.cfg.critical_threshold {
                triggers.push((
                    PacingTrigger::CheckpointCritical,
                    self.cfg.critical_reduction,
                ));
            } else if pct > self.cfg.warning_threshold {
                triggers.push((PacingTrigger::CheckpointWarning, self.cfg.warning_reduction));
            }
        }

        if pct >= self.cfg.exhaustion_threshold {
            triggers.push((PacingTrigger::Exhausted, self.cfg.exhaustion_reduction));
        }

        triggers
    }
}

/// Apply an emergency reduction to a bid, respecting the absolute floor.
pub fn reduced_bid(bid: f64, reduction: f64, min_bid: f64) -> f64 {
    round_bid((bid * (1.0 - reduction)).max(min_bid))
}

/// Dedupes emergency actions within one run so a campaign is never cut
/// twice for the same trigger.
#[derive(Debug, Default)]
pub struct TriggerLedger {
    seen: HashSet<(String, PacingTrigger)>,
}

impl TriggerLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true the first time a (campaign, trigger) pair is recorded.
    pub fn record(&mut self, campaign_id: &str, trigger: PacingTrigger) -> bool {
        self.seen.insert((campaign_id.to_string(), trigger))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(budget: f64, spend: f64) -> CampaignBudgetStatus {
        CampaignBudgetStatus {
            campaign_id: "c1".into(),
            campaign_name: "Test Campaign".into(),
            budget_daily: budget,
            spend_today: spend,
        }
    }

    fn monitor() -> PacingMonitor {
        PacingMonitor::new(PacingConfig::default())
    }

    #[test]
    fn test_critical_at_checkpoint() {
        // 80% spent at the 15:00 checkpoint.
        let triggers = monitor().assess(&status(100.0, 80.0), 15);
        assert_eq!(
            triggers,
            vec![(PacingTrigger::CheckpointCritical, 0.25)]
        );
    }

    #[test]
    fn test_warning_at_checkpoint() {
        let triggers = monitor().assess(&status(100.0, 70.0), 15);
        assert_eq!(triggers, vec![(PacingTrigger::CheckpointWarning, 0.15)]);
    }

    #[test]
    fn test_checkpoint_silent_at_other_hours() {
        // Same 80% spend, but not the checkpoint hour and below exhaustion.
        assert!(monitor().assess(&status(100.0, 80.0), 12).is_empty());
    }

    #[test]
    fn test_exhaustion_fires_any_hour() {
        let triggers = monitor().assess(&status(100.0, 98.0), 9);
        assert_eq!(triggers, vec![(PacingTrigger::Exhausted, 0.50)]);
    }

    #[test]
    fn test_exhaustion_stacks_with_checkpoint() {
        // 98% spent at the checkpoint hour: both fire.
        let triggers = monitor().assess(&status(100.0, 98.0), 15);
        assert_eq!(
            triggers,
            vec![
                (PacingTrigger::CheckpointCritical, 0.25),
                (PacingTrigger::Exhausted, 0.50),
            ]
        );
    }

    #[test]
    fn test_invalid_budget_skipped() {
        assert!(monitor().assess(&status(0.0, 50.0), 15).is_empty());
        assert!(monitor().assess(&status(-10.0, 50.0), 15).is_empty());
    }

    #[test]
    fn test_state_classification() {
        let m = monitor();
        assert_eq!(m.state(&status(100.0, 40.0)), PacingState::Healthy);
        assert_eq!(m.state(&status(100.0, 70.0)), PacingState::Warning);
        assert_eq!(m.state(&status(100.0, 80.0)), PacingState::Critical);
        assert_eq!(m.state(&status(100.0, 97.0)), PacingState::Exhausted);
        assert_eq!(m.state(&status(0.0, 50.0)), PacingState::Healthy);
    }

    #[test]
    fn test_reduced_bid_respects_floor() {
        assert!((reduced_bid(1.00, 0.25, 0.20) - 0.75).abs() < 1e-9);
        // 0.24 × 0.5 = 0.12 would breach the floor.
        assert!((reduced_bid(0.24, 0.50, 0.20) - 0.20).abs() < 1e-9);
    }

    #[test]
    fn test_ledger_dedupes_per_trigger() {
        let mut ledger = TriggerLedger::new();
        assert!(ledger.record("c1", PacingTrigger::Exhausted));
        assert!(!ledger.record("c1", PacingTrigger::Exhausted));
        // Different trigger for the same campaign is a new action.
        assert!(ledger.record("c1", PacingTrigger::CheckpointCritical));
        assert!(ledger.record("c2", PacingTrigger::Exhausted));
    }
}
