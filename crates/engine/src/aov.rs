//! Per-ASIN average-order-value resolution with time-window fallback.
//!
//! Built once per optimization run from per-day sales rows; read-only
//! afterwards. Lookup order: recent window → extended window (confidence
//! downgraded one notch, the signal is staler) → fixed default record.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use common::config::AovConfig;
use common::{AovConfidence, AovRecord, AovSource, AovTier, AsinDailyRow};
use tracing::debug;

/// Classify an AOV figure into a bid-ceiling tier.
///
/// Pure step function over ascending breakpoints; higher AOV never yields
/// a lower tier.
pub fn aov_tier(aov: f64, breakpoints: &[f64; 3]) -> AovTier {
    if aov < breakpoints[0] {
        AovTier::L
    } else if aov < breakpoints[1] {
        AovTier::M
    } else if aov < breakpoints[2] {
        AovTier::H
    } else {
        AovTier::X
    }
}

/// Read-only AOV lookup for one optimization run.
pub struct AovResolver {
    recent: HashMap<String, AovRecord>,
    extended: HashMap<String, AovRecord>,
    default_aov: f64,
}

impl AovResolver {
    /// Build both lookup windows from per-day sales rows.
    ///
    /// Rows inside the trailing attribution-lag buffer are excluded — their
    /// metrics are not final yet. Records failing the minimum-order count or
    /// the AOV sanity floor are dropped entirely, not downgraded.
    pub fn from_daily_rows(
        rows: &[AsinDailyRow],
        cfg: &AovConfig,
        default_aov: f64,
        today: NaiveDate,
    ) -> Self {
        let recent = build_window(rows, cfg, today, cfg.recent_window_days, AovSource::Recent);
        let extended = build_window(
            rows,
            cfg,
            today,
            cfg.extended_window_days,
            AovSource::Extended,
        );
        debug!(
            recent = recent.len(),
            extended = extended.len(),
            "Built AOV windows"
        );
        Self {
            recent,
            extended,
            default_aov,
        }
    }

    /// Number of ASINs in (recent, extended) windows.
    pub fn window_sizes(&self) -> (usize, usize) {
        (self.recent.len(), self.extended.len())
    }

    /// Resolve an ASIN to an AOV record, never failing.
    pub fn resolve(&self, asin: &str) -> AovRecord {
        if let Some(rec) = self.recent.get(asin) {
            return rec.clone();
        }
        if let Some(rec) = self.extended.get(asin) {
            let mut rec = rec.clone();
            // Staler window: high confidence is downgraded, never upgraded.
            if rec.confidence == AovConfidence::High {
                rec.confidence = AovConfidence::Medium;
            }
            return rec;
        }
        debug!(asin, "Using default AOV");
        AovRecord {
            asin: asin.to_string(),
            aov: self.default_aov,
            orders: 0,
            active_days: 0,
            confidence: AovConfidence::Default,
            source: AovSource::Default,
        }
    }

    /// Resolve when the snapshot may not carry an ASIN at all.
    pub fn resolve_opt(&self, asin: Option<&str>) -> AovRecord {
        self.resolve(asin.unwrap_or(""))
    }
}

fn build_window(
    rows: &[AsinDailyRow],
    cfg: &AovConfig,
    today: NaiveDate,
    window_days: u32,
    source: AovSource,
) -> HashMap<String, AovRecord> {
    // Window is (start, end]: the lag buffer covers the most-recent days
    // including today.
    let end = today - chrono::Duration::days(i64::from(cfg.attribution_lag_days));
    let start = end - chrono::Duration::days(i64::from(window_days));

    struct Acc {
        orders: u64,
        sales: f64,
        days: HashSet<NaiveDate>,
    }
    let mut by_asin: HashMap<&str, Acc> = HashMap::new();

    for row in rows {
        if row.date <= start || row.date > end || row.sales <= 0.0 {
            continue;
        }
        let acc = by_asin.entry(row.asin.as_str()).or_insert(Acc {
            orders: 0,
            sales: 0.0,
            days: HashSet::new(),
        });
        acc.orders += row.orders;
        acc.sales += row.sales;
        acc.days.insert(row.date);
    }

    let mut out = HashMap::new();
    for (asin, acc) in by_asin {
        if acc.orders < cfg.min_orders {
            continue;
        }
        let aov = acc.sales / acc.orders as f64;
        if aov < cfg.min_aov {
            continue;
        }
        let active_days = acc.days.len() as u32;
        let confidence = if acc.orders >= cfg.high_min_orders && active_days >= cfg.high_min_active_days
        {
            AovConfidence::High
        } else if acc.orders >= cfg.medium_min_orders {
            AovConfidence::Medium
        } else {
            AovConfidence::Low
        };
        out.insert(
            asin.to_string(),
            AovRecord {
                asin: asin.to_string(),
                aov,
                orders: acc.orders,
                active_days,
                confidence,
                source,
            },
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, d).expect("valid date")
    }

    fn row(asin: &str, d: u32, orders: u64, sales: f64) -> AsinDailyRow {
        AsinDailyRow {
            asin: asin.into(),
            date: day(d),
            orders,
            sales,
        }
    }

    fn cfg() -> AovConfig {
        AovConfig::default()
    }

    #[test]
    fn test_tier_breakpoints() {
        let bp = [30.0, 46.0, 70.0];
        assert_eq!(aov_tier(25.0, &bp), AovTier::L);
        assert_eq!(aov_tier(40.0, &bp), AovTier::M);
        assert_eq!(aov_tier(60.0, &bp), AovTier::H);
        assert_eq!(aov_tier(80.0, &bp), AovTier::X);
    }

    #[test]
    fn test_tier_monotonic() {
        let bp = [30.0, 46.0, 70.0];
        let mut last = AovTier::L;
        for i in 0..2000 {
            let tier = aov_tier(i as f64 * 0.1, &bp);
            assert!(tier >= last, "tier must never decrease as aov grows");
            last = tier;
        }
    }

    #[test]
    fn test_recent_window_preferred() {
        let rows = vec![
            // Ten orders across eight active days — high confidence, recent.
            row("B001", 10, 2, 80.0),
            row("B001", 11, 1, 40.0),
            row("B001", 12, 1, 40.0),
            row("B001", 13, 1, 40.0),
            row("B001", 14, 1, 40.0),
            row("B001", 15, 1, 40.0),
            row("B001", 16, 2, 80.0),
            row("B001", 17, 1, 40.0),
        ];
        let resolver = AovResolver::from_daily_rows(&rows, &cfg(), 35.0, day(20));
        let rec = resolver.resolve("B001");
        assert_eq!(rec.source, AovSource::Recent);
        assert_eq!(rec.confidence, AovConfidence::High);
        assert!((rec.aov - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_extended_fallback_downgrades_high() {
        // Activity only 20+ days ago: outside the 14d window, inside 30d.
        let rows = vec![
            row("B002", 1, 2, 100.0),
            row("B002", 2, 2, 100.0),
            row("B002", 3, 2, 100.0),
            row("B002", 4, 2, 100.0),
            row("B002", 5, 2, 100.0),
            row("B002", 6, 1, 50.0),
            row("B002", 7, 1, 50.0),
        ];
        let resolver = AovResolver::from_daily_rows(&rows, &cfg(), 35.0, day(28));
        let rec = resolver.resolve("B002");
        assert_eq!(rec.source, AovSource::Extended);
        // Would be high on raw counts; staler window caps it at medium.
        assert_eq!(rec.confidence, AovConfidence::Medium);
    }

    #[test]
    fn test_attribution_lag_excluded() {
        // All activity inside the trailing 3-day buffer: not final, ignored.
        let rows = vec![row("B003", 19, 5, 250.0), row("B003", 20, 5, 250.0)];
        let resolver = AovResolver::from_daily_rows(&rows, &cfg(), 35.0, day(20));
        let rec = resolver.resolve("B003");
        assert_eq!(rec.source, AovSource::Default);
        assert_eq!(rec.confidence, AovConfidence::Default);
    }

    #[test]
    fn test_min_orders_and_aov_floor_drop_records() {
        let rows = vec![
            // Only one order: below min_orders.
            row("B004", 10, 1, 50.0),
            // AOV of $4: below the sanity floor.
            row("B005", 10, 3, 12.0),
        ];
        let resolver = AovResolver::from_daily_rows(&rows, &cfg(), 35.0, day(20));
        assert_eq!(resolver.resolve("B004").source, AovSource::Default);
        assert_eq!(resolver.resolve("B005").source, AovSource::Default);
    }

    #[test]
    fn test_default_record_for_unknown_asin() {
        let resolver = AovResolver::from_daily_rows(&[], &cfg(), 35.0, day(20));
        let rec = resolver.resolve_opt(None);
        assert_eq!(rec.confidence, AovConfidence::Default);
        assert!((rec.aov - 35.0).abs() < 1e-9);
        assert_eq!(rec.orders, 0);
    }
}
