//! Performance tier classification.
//!
//! An ordered decision list, not a scoring function: the guards overlap and
//! the first match wins, so the order below is load-bearing.

use common::config::TierThresholds;
use common::PerformanceTier;

/// Buckets a keyword's click/conversion/spend signal into a quality tier.
#[derive(Debug, Clone)]
pub struct TierClassifier {
    thresholds: TierThresholds,
}

impl TierClassifier {
    pub fn new(thresholds: TierThresholds) -> Self {
        Self { thresholds }
    }

    /// Tier A: winners (high CVR, low ACOS).
    /// Tier B: solid (profitable).
    /// Tier E: kill (many clicks, no sales).
    /// Tier D: bleeding (clicks, no sales).
    /// Tier C: testing / insufficient data.
    pub fn classify(&self, conversions: u64, clicks: u64, acos: f64, cvr: f64) -> PerformanceTier {
        let t = &self.thresholds;
        if conversions >= t.winner_min_conversions
            && cvr >= t.winner_min_cvr
            && acos <= t.winner_max_acos
        {
            PerformanceTier::A
        } else if conversions >= t.solid_min_conversions
            && cvr >= t.solid_cvr_floor
            && cvr < t.solid_cvr_ceiling
            && acos <= t.solid_max_acos
        {
            PerformanceTier::B
        } else if clicks >= t.kill_min_clicks && conversions == 0 {
            PerformanceTier::E
        } else if clicks >= t.bleed_min_clicks && conversions == 0 {
            PerformanceTier::D
        } else {
            PerformanceTier::C
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> TierClassifier {
        TierClassifier::new(TierThresholds::default())
    }

    #[test]
    fn test_winner() {
        assert_eq!(
            classifier().classify(3, 50, 0.20, 0.20),
            PerformanceTier::A
        );
    }

    #[test]
    fn test_solid() {
        assert_eq!(
            classifier().classify(1, 30, 0.35, 0.12),
            PerformanceTier::B
        );
    }

    #[test]
    fn test_kill_before_bleeding() {
        // 35 clicks satisfies both the kill and bleeding floors; the kill
        // guard is evaluated first.
        assert_eq!(classifier().classify(0, 35, 0.0, 0.0), PerformanceTier::E);
    }

    #[test]
    fn test_bleeding() {
        assert_eq!(classifier().classify(0, 25, 0.0, 0.0), PerformanceTier::D);
    }

    #[test]
    fn test_default_testing() {
        assert_eq!(classifier().classify(0, 5, 0.0, 0.0), PerformanceTier::C);
        assert_eq!(classifier().classify(0, 15, 0.0, 0.0), PerformanceTier::C);
    }

    #[test]
    fn test_converting_keyword_never_killed() {
        // One conversion with terrible ACOS still avoids the zero-sale tiers.
        let tier = classifier().classify(1, 60, 0.90, 0.02);
        assert_eq!(tier, PerformanceTier::C);
    }
}
