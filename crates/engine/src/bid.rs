//! Bid formula engine.
//!
//! Combines the AOV-derived ceiling with performance, match-type, and
//! time-of-day multipliers into one recommended bid. All multiplier tables
//! live in `BidRulesConfig`; swapping them never touches the algorithm.

use std::collections::BTreeMap;

use common::config::{BidRulesConfig, TierThresholds};
use common::{AovConfidence, AovRecord, AovTier, BidDecision, KeywordSnapshot, MatchType, PerformanceTier};
use tracing::trace;

use crate::aov::aov_tier;
use crate::tier::TierClassifier;

/// Round to currency precision, half-up.
pub fn round_bid(x: f64) -> f64 {
    (x * 100.0 + 0.5).floor() / 100.0
}

/// Neutral band for the time multiplier; outside it the reason code is
/// attributed to time-of-day rather than the performance tier.
const TIME_NEUTRAL_LO: f64 = 0.9;
const TIME_NEUTRAL_HI: f64 = 1.1;

/// Winners are scaled up, never throttled by an unlucky multiplier mix.
const WINNER_SCALE: f64 = 1.10;

/// Computes recommended bids for keywords.
#[derive(Debug, Clone)]
pub struct BidCalculator {
    rules: BidRulesConfig,
    classifier: TierClassifier,
}

impl BidCalculator {
    pub fn new(rules: BidRulesConfig, thresholds: TierThresholds) -> Self {
        Self {
            rules,
            classifier: TierClassifier::new(thresholds),
        }
    }

    pub fn rules(&self) -> &BidRulesConfig {
        &self.rules
    }

    /// Propose a bid for one keyword at the given local hour.
    ///
    /// The performance tier is classified internally from the snapshot.
    pub fn propose(&self, snap: &KeywordSnapshot, aov: &AovRecord, hour: u32) -> BidDecision {
        let tier = self
            .classifier
            .classify(snap.conversions, snap.clicks, snap.acos, snap.cvr);

        let mut ceiling = self.base_ceiling(aov_tier(aov.aov, &self.rules.aov_breakpoints));
        let mut components = BTreeMap::new();
        if aov.confidence == AovConfidence::Default {
            ceiling *= self.rules.default_confidence_penalty;
            components.insert(
                "confidence_penalty".into(),
                self.rules.default_confidence_penalty,
            );
        }

        let perf_mult = self.performance_multiplier(tier);
        let match_mult = self.match_multiplier(snap.match_type);
        let time_mult = self.time_multiplier(hour);

        let mut bid = ceiling * perf_mult * match_mult * time_mult;

        // Protective floor: a winner is never bid down below its current bid.
        if tier == PerformanceTier::A && bid < snap.current_bid {
            bid = snap.current_bid * WINNER_SCALE;
        }

        bid = bid.clamp(self.rules.min_bid, self.rules.max_bid);
        bid = round_bid(bid);

        let should_update = (bid - snap.current_bid).abs() >= self.rules.hysteresis;
        let reason = self.reason(should_update, tier, time_mult, hour);

        components.insert("base".into(), ceiling);
        components.insert("perf_mult".into(), perf_mult);
        components.insert("match_mult".into(), match_mult);
        components.insert("time_mult".into(), time_mult);

        trace!(
            keyword_id = %snap.keyword_id,
            %tier,
            bid,
            current = snap.current_bid,
            should_update,
            %reason,
            "Bid proposed"
        );

        BidDecision {
            keyword_id: snap.keyword_id.clone(),
            current_bid: snap.current_bid,
            proposed_bid: bid,
            should_update,
            tier,
            reason,
            components,
        }
    }

    /// Initial bid for a newly harvested keyword: 85% of its break-even bid.
    pub fn harvest_bid(&self, aov: f64, cvr: f64) -> f64 {
        let break_even = aov * self.rules.target_acos * cvr;
        round_bid((break_even * 0.85).clamp(self.rules.min_bid, self.rules.max_bid))
    }

    fn base_ceiling(&self, tier: AovTier) -> f64 {
        let c = &self.rules.ceilings;
        match tier {
            AovTier::L => c.l,
            AovTier::M => c.m,
            AovTier::H => c.h,
            AovTier::X => c.x,
        }
    }

    fn performance_multiplier(&self, tier: PerformanceTier) -> f64 {
        let p = &self.rules.performance;
        match tier {
            PerformanceTier::A => p.a,
            PerformanceTier::B => p.b,
            PerformanceTier::C => p.c,
            PerformanceTier::D => p.d,
            PerformanceTier::E => p.e,
        }
    }

    fn match_multiplier(&self, match_type: MatchType) -> f64 {
        let m = &self.rules.match_types;
        match match_type {
            MatchType::Exact => m.exact,
            MatchType::Phrase => m.phrase,
            MatchType::Broad => m.broad,
            MatchType::Auto => m.auto,
            // Unknown values never get a silent 1.0.
            MatchType::Other => m.most_conservative(),
        }
    }

    fn time_multiplier(&self, hour: u32) -> f64 {
        for band in &self.rules.time_bands {
            if hour >= band.start_hour && hour < band.end_hour {
                return band.multiplier;
            }
        }
        self.rules.time_default
    }

    fn reason(&self, should_update: bool, tier: PerformanceTier, time_mult: f64, hour: u32) -> String {
        if !should_update {
            return "hold".into();
        }
        if time_mult > TIME_NEUTRAL_HI {
            return format!("time_boost_h{hour}");
        }
        if time_mult < TIME_NEUTRAL_LO {
            return format!("time_cut_h{hour}");
        }
        format!("tier_{tier}_opt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calc() -> BidCalculator {
        BidCalculator::new(BidRulesConfig::default(), TierThresholds::default())
    }

    fn snapshot(
        match_type: MatchType,
        current_bid: f64,
        conversions: u64,
        clicks: u64,
        acos: f64,
        cvr: f64,
    ) -> KeywordSnapshot {
        KeywordSnapshot {
            keyword_id: "12345".into(),
            campaign_id: "c1".into(),
            ad_group_id: "g1".into(),
            keyword_text: "test keyword".into(),
            match_type,
            current_bid,
            clicks,
            conversions,
            acos,
            cvr,
            asin: Some("B001".into()),
        }
    }

    fn aov_record(aov: f64, confidence: AovConfidence) -> AovRecord {
        AovRecord {
            asin: "B001".into(),
            aov,
            orders: 12,
            active_days: 9,
            confidence,
            source: common::AovSource::Recent,
        }
    }

    #[test]
    fn test_formula_regression() {
        // aov=45 → tier M ceiling 1.40; tier A ×1.00; EXACT ×1.00; hour 19 ×1.20.
        let snap = snapshot(MatchType::Exact, 1.20, 3, 50, 0.20, 0.20);
        let decision = calc().propose(&snap, &aov_record(45.0, AovConfidence::High), 19);
        assert!((decision.proposed_bid - 1.68).abs() < 1e-9);
        assert!(decision.should_update);
        assert_eq!(decision.tier, PerformanceTier::A);
        assert_eq!(decision.reason, "time_boost_h19");
    }

    #[test]
    fn test_hysteresis_blocks_small_changes() {
        // Same formula result (1.68), current bid within 5¢ of it.
        let snap = snapshot(MatchType::Exact, 1.65, 3, 50, 0.20, 0.20);
        let decision = calc().propose(&snap, &aov_record(45.0, AovConfidence::High), 19);
        assert!(!decision.should_update);
        assert_eq!(decision.reason, "hold");
    }

    #[test]
    fn test_protective_floor_for_winners() {
        // Overnight multiplier (0.70) would drag the formula below the
        // current bid; winners get current × 1.10 instead.
        let snap = snapshot(MatchType::Broad, 1.50, 3, 50, 0.20, 0.20);
        let decision = calc().propose(&snap, &aov_record(45.0, AovConfidence::High), 3);
        assert!(decision.proposed_bid >= snap.current_bid);
        assert!((decision.proposed_bid - 1.65).abs() < 1e-9);
    }

    #[test]
    fn test_loser_is_cut_hard() {
        let snap = snapshot(MatchType::Exact, 1.50, 0, 40, 0.0, 0.0);
        let decision = calc().propose(&snap, &aov_record(45.0, AovConfidence::High), 12);
        assert_eq!(decision.tier, PerformanceTier::E);
        // 1.40 × 0.15 × 1.00 × 0.80 = 0.168, clamped up to the 0.20 floor.
        assert!((decision.proposed_bid - 0.20).abs() < 1e-9);
        assert!(decision.should_update);
    }

    #[test]
    fn test_unknown_match_type_is_conservative() {
        let snap_other = snapshot(MatchType::Other, 1.00, 1, 30, 0.35, 0.12);
        let snap_exact = snapshot(MatchType::Exact, 1.00, 1, 30, 0.35, 0.12);
        let rec = aov_record(45.0, AovConfidence::High);
        let d_other = calc().propose(&snap_other, &rec, 12);
        let d_exact = calc().propose(&snap_exact, &rec, 12);
        // Never a silent 1.0 — strictly below the exact-match bid.
        assert!(d_other.proposed_bid < d_exact.proposed_bid);
        assert_eq!(
            d_other.components["match_mult"],
            BidRulesConfig::default().match_types.most_conservative()
        );
    }

    #[test]
    fn test_default_confidence_penalizes_ceiling() {
        let snap = snapshot(MatchType::Exact, 0.50, 1, 30, 0.35, 0.12);
        let with_default = calc().propose(&snap, &aov_record(45.0, AovConfidence::Default), 12);
        let with_high = calc().propose(&snap, &aov_record(45.0, AovConfidence::High), 12);
        assert!(with_default.proposed_bid < with_high.proposed_bid);
        assert!(with_default.components.contains_key("confidence_penalty"));
    }

    #[test]
    fn test_ceilings_monotonic_in_tier() {
        let rules = BidRulesConfig::default();
        let c = calc();
        let mut last = 0.0;
        for aov in [10.0, 35.0, 50.0, 100.0] {
            let tier = aov_tier(aov, &rules.aov_breakpoints);
            let ceiling = c.base_ceiling(tier);
            assert!(ceiling >= last, "ceiling must not decrease with AOV tier");
            last = ceiling;
        }
    }

    #[test]
    fn test_rounding_half_up() {
        // Exactly-representable half cents round up, not to even.
        assert!((round_bid(0.375) - 0.38).abs() < 1e-9);
        assert!((round_bid(2.625) - 2.63).abs() < 1e-9);
        assert!((round_bid(1.674) - 1.67).abs() < 1e-9);
        assert!((round_bid(1.676) - 1.68).abs() < 1e-9);
    }

    #[test]
    fn test_harvest_bid() {
        // 45 × 0.30 × 0.12 × 0.85 = 1.377 → 1.38.
        let bid = calc().harvest_bid(45.0, 0.12);
        assert!((bid - 1.38).abs() < 1e-9);
        // Tiny CVR clamps to the floor.
        assert!((calc().harvest_bid(45.0, 0.001) - 0.20).abs() < 1e-9);
    }
}
