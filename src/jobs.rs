//! One-shot jobs the CLI dispatches to.
//!
//! Each job is a single batch run: read state, decide, push, summarize.
//! An external scheduler serializes runs, so nothing here loops.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Timelike, Utc};
use serde_json::json;
use tracing::{error, info, warn};

use ads_client::{AdsClient, ReportClient};
use common::config::BotConfig;
use common::{BidChangeEntry, BidUpdate, EmergencyAction, Result};
use engine::{
    build_plan, reduced_bid, AovResolver, BidCalculator, BidProbe, MinWinSearch, Observation,
    PacingMonitor, TriggerLedger,
};
use warehouse::MetricsStore;

use crate::journal::{now_iso, write_event, SharedJournal};

/// Everything a job needs, built once in main.
pub struct JobContext {
    pub cfg: BotConfig,
    pub store: Arc<dyn MetricsStore>,
    pub ads: AdsClient,
    pub reports: ReportClient,
    pub journal: SharedJournal,
}

/// Account-local hour from UTC and the configured offset.
pub fn local_hour(utc_offset_hours: i32) -> u32 {
    let utc_hour = Utc::now().hour() as i32;
    (utc_hour + utc_offset_hours).rem_euclid(24) as u32
}

fn change_id(keyword_id: &str) -> String {
    format!("{}-{}", Utc::now().timestamp_millis(), keyword_id)
}

// ── Optimize ──────────────────────────────────────────────────────────

/// Full bid optimization run over all keywords with enough click volume.
pub async fn run_optimize(ctx: &JobContext) -> Result<()> {
    let cfg = &ctx.cfg;
    let hour = local_hour(cfg.utc_offset_hours);
    info!(hour, dry_run = cfg.dry_run, "Starting optimization run");

    let snapshots = ctx
        .store
        .keywords_for_optimization(cfg.optimize.min_clicks, cfg.optimize.lookback_days)
        .await?;
    if snapshots.is_empty() {
        warn!("No keywords met the optimization criteria, nothing to do");
        write_event(
            &ctx.journal,
            json!({ "ts": now_iso(), "kind": "optimize_empty", "hour": hour }),
        )
        .await;
        return Ok(());
    }

    // Daily rows must cover the extended window plus the attribution lag.
    let sales_window = cfg.aov.extended_window_days + cfg.aov.attribution_lag_days;
    let daily_rows = ctx.store.asin_daily_sales(sales_window).await?;
    let resolver = AovResolver::from_daily_rows(
        &daily_rows,
        &cfg.aov,
        cfg.bids.default_aov,
        Utc::now().date_naive(),
    );
    let (recent, extended) = resolver.window_sizes();
    info!(
        keywords = snapshots.len(),
        aov_recent = recent,
        aov_extended = extended,
        "Inputs loaded"
    );

    let calc = BidCalculator::new(cfg.bids.clone(), cfg.tiers.clone());
    let plan = build_plan(&snapshots, &resolver, &calc, hour);

    for decision in &plan.decisions {
        write_event(
            &ctx.journal,
            json!({
                "ts": now_iso(),
                "kind": "bid_decision",
                "keyword_id": decision.keyword_id,
                "current_bid": decision.current_bid,
                "proposed_bid": decision.proposed_bid,
                "should_update": decision.should_update,
                "tier": decision.tier.to_string(),
                "reason": decision.reason,
                "components": decision.components,
            }),
        )
        .await;
    }

    let updates: Vec<BidUpdate> = plan
        .updates()
        .map(|d| BidUpdate {
            keyword_id: d.keyword_id.clone(),
            bid: d.proposed_bid,
        })
        .collect();

    let outcome = ctx.ads.batch_update_bids(&updates).await?;

    // Audit trail goes to the warehouse whether or not this was a dry run.
    for decision in plan.updates() {
        let entry = BidChangeEntry {
            change_id: change_id(&decision.keyword_id),
            keyword_id: decision.keyword_id.clone(),
            old_bid: decision.current_bid,
            new_bid: decision.proposed_bid,
            bid_change: decision.proposed_bid - decision.current_bid,
            reason: decision.reason.clone(),
            changed_by: "optimize".into(),
            components: decision.components.clone(),
            changed_at: now_iso(),
            dry_run: cfg.dry_run,
        };
        if let Err(e) = ctx.store.log_bid_change(&entry).await {
            warn!(keyword_id = %entry.keyword_id, error = %e, "Audit write failed");
        }
    }

    info!(
        evaluated = plan.totals.evaluated,
        to_update = plan.totals.to_update,
        unchanged = plan.totals.unchanged,
        pushed = outcome.success,
        failed = outcome.failed,
        total_increase = format!("{:.2}", plan.totals.total_increase),
        total_decrease = format!("{:.2}", plan.totals.total_decrease),
        "Optimization run complete"
    );
    write_event(
        &ctx.journal,
        json!({
            "ts": now_iso(),
            "kind": "optimize_summary",
            "hour": hour,
            "dry_run": cfg.dry_run,
            "evaluated": plan.totals.evaluated,
            "to_update": plan.totals.to_update,
            "unchanged": plan.totals.unchanged,
            "pushed": outcome.success,
            "failed": outcome.failed,
            "total_increase": plan.totals.total_increase,
            "total_decrease": plan.totals.total_decrease,
        }),
    )
    .await;

    if outcome.failed > 0 {
        error!(
            failed = outcome.failed,
            errors = ?outcome.errors,
            "Some bid updates were rejected"
        );
        return Err(common::Error::Other(format!(
            "{} of {} bid updates failed",
            outcome.failed,
            updates.len()
        )));
    }
    Ok(())
}

// ── Budget monitor ────────────────────────────────────────────────────

/// Check campaign spend pacing and apply emergency bid reductions.
pub async fn run_budget_monitor(ctx: &JobContext) -> Result<()> {
    let cfg = &ctx.cfg;
    let hour = local_hour(cfg.utc_offset_hours);
    info!(hour, dry_run = cfg.dry_run, "Starting budget monitor run");

    let statuses = ctx.store.campaign_budget_status().await?;
    if statuses.is_empty() {
        warn!("No campaign budget rows, nothing to do");
        return Ok(());
    }

    let monitor = PacingMonitor::new(cfg.pacing.clone());
    let mut ledger = TriggerLedger::new();
    let mut actions: Vec<EmergencyAction> = Vec::new();
    let mut any_failed = false;

    for status in &statuses {
        for (trigger, reduction) in monitor.assess(status, hour) {
            if !ledger.record(&status.campaign_id, trigger) {
                continue;
            }

            let rows = ctx
                .store
                .campaign_keywords_above_floor(&status.campaign_id, cfg.bids.min_bid)
                .await?;
            if rows.is_empty() {
                info!(
                    campaign_id = %status.campaign_id,
                    %trigger,
                    "Trigger fired but no keywords are above the bid floor"
                );
                continue;
            }

            let updates: Vec<BidUpdate> = rows
                .iter()
                .map(|row| BidUpdate {
                    keyword_id: row.keyword_id.clone(),
                    bid: reduced_bid(row.current_bid, reduction, cfg.bids.min_bid),
                })
                .collect();

            let outcome = ctx.ads.batch_update_bids(&updates).await?;
            any_failed |= outcome.failed > 0;

            for (row, update) in rows.iter().zip(&updates) {
                let entry = BidChangeEntry {
                    change_id: change_id(&row.keyword_id),
                    keyword_id: row.keyword_id.clone(),
                    old_bid: row.current_bid,
                    new_bid: update.bid,
                    bid_change: update.bid - row.current_bid,
                    reason: format!("pacing_{trigger}"),
                    changed_by: "budget-monitor".into(),
                    components: Default::default(),
                    changed_at: now_iso(),
                    dry_run: cfg.dry_run,
                };
                if let Err(e) = ctx.store.log_bid_change(&entry).await {
                    warn!(keyword_id = %entry.keyword_id, error = %e, "Audit write failed");
                }
            }

            let action = EmergencyAction {
                campaign_id: status.campaign_id.clone(),
                campaign_name: status.campaign_name.clone(),
                trigger,
                reduction_pct: reduction,
                keywords_updated: outcome.success,
                keywords_failed: outcome.failed,
            };
            warn!(
                campaign = %action.campaign_name,
                %trigger,
                reduction = format!("{:.0}%", reduction * 100.0),
                updated = action.keywords_updated,
                failed = action.keywords_failed,
                "Emergency bid reduction applied"
            );
            write_event(
                &ctx.journal,
                json!({
                    "ts": now_iso(),
                    "kind": "emergency_action",
                    "hour": hour,
                    "dry_run": cfg.dry_run,
                    "campaign_id": action.campaign_id,
                    "campaign_name": action.campaign_name,
                    "trigger": trigger.to_string(),
                    "spend_pct": status.spend_pct(),
                    "reduction_pct": action.reduction_pct,
                    "keywords_updated": action.keywords_updated,
                    "keywords_failed": action.keywords_failed,
                }),
            )
            .await;
            actions.push(action);
        }
    }

    info!(
        campaigns = statuses.len(),
        actions = actions.len(),
        "Budget monitor run complete"
    );
    write_event(
        &ctx.journal,
        json!({
            "ts": now_iso(),
            "kind": "budget_monitor_summary",
            "hour": hour,
            "campaigns": statuses.len(),
            "actions": actions.len(),
        }),
    )
    .await;

    if any_failed {
        return Err(common::Error::Other(
            "some emergency bid reductions failed to apply".into(),
        ));
    }
    Ok(())
}

// ── Min winning bid ───────────────────────────────────────────────────

/// Probes a live keyword: pushes the bid, waits, then reads impressions
/// back from a fresh targeting report.
struct LiveProbe<'a> {
    ads: &'a AdsClient,
    reports: &'a ReportClient,
    keyword_id: &'a str,
    lookback_days: u32,
    journal: &'a SharedJournal,
}

#[async_trait::async_trait]
impl BidProbe for LiveProbe<'_> {
    async fn apply_bid(&mut self, bid: f64) -> Result<()> {
        info!(keyword_id = %self.keyword_id, bid, "Applying probe bid");
        write_event(
            self.journal,
            json!({
                "ts": now_iso(),
                "kind": "probe_bid",
                "keyword_id": self.keyword_id,
                "bid": bid,
            }),
        )
        .await;
        self.ads.update_bid(self.keyword_id, bid).await
    }

    async fn measure(&mut self) -> Result<Observation> {
        let end = Utc::now().date_naive();
        let start = end - ChronoDuration::days(i64::from(self.lookback_days));
        let totals = self
            .reports
            .keyword_totals(
                &ads_client::ReportRequest {
                    start_date: start,
                    end_date: end,
                },
                self.keyword_id,
            )
            .await?;
        write_event(
            self.journal,
            json!({
                "ts": now_iso(),
                "kind": "probe_measurement",
                "keyword_id": self.keyword_id,
                "impressions": totals.impressions,
                "clicks": totals.clicks,
            }),
        )
        .await;
        Ok(Observation {
            impressions: totals.impressions,
            clicks: totals.clicks,
        })
    }
}

/// Bisect for the cheapest bid that still wins impressions.
pub async fn run_min_winning_bid(ctx: &JobContext, keyword_id: &str) -> Result<()> {
    let cfg = &ctx.cfg;
    info!(keyword_id, dry_run = cfg.dry_run, "Starting min-winning-bid search");
    if cfg.dry_run {
        warn!("Dry run: probe bids will not reach the platform, measurements reflect the live bid");
    }

    let search = MinWinSearch::from_config(&cfg.search, &cfg.bids);
    let mut probe = LiveProbe {
        ads: &ctx.ads,
        reports: &ctx.reports,
        keyword_id,
        lookback_days: cfg.search.lookback_days,
        journal: &ctx.journal,
    };

    let outcome = search.run(&mut probe).await?;

    info!(
        keyword_id,
        min_winning_bid = outcome.min_winning_bid,
        probes = outcome.probes.len(),
        iterations = outcome.iterations,
        "Search complete"
    );
    write_event(
        &ctx.journal,
        json!({
            "ts": now_iso(),
            "kind": "search_summary",
            "keyword_id": keyword_id,
            "min_winning_bid": outcome.min_winning_bid,
            "iterations": outcome.iterations,
            "probes": outcome.probes.iter().map(|p| json!({
                "bid": p.bid,
                "impressions": p.impressions,
                "won": p.won,
            })).collect::<Vec<_>>(),
        }),
    )
    .await;
    Ok(())
}

// ── Check auth ────────────────────────────────────────────────────────

/// Force a token fetch and report whether the credential chain works.
pub async fn run_check_auth(tokens: &ads_client::TokenManager, journal: &SharedJournal) -> Result<()> {
    match tokens.access_token().await {
        Ok(token) => {
            info!(token_len = token.len(), "Auth check succeeded");
            write_event(
                journal,
                json!({ "ts": now_iso(), "kind": "auth_check", "status": "ok" }),
            )
            .await;
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Auth check failed");
            write_event(
                journal,
                json!({
                    "ts": now_iso(),
                    "kind": "auth_check",
                    "status": "error",
                    "error": e.to_string(),
                }),
            )
            .await;
            Err(e)
        }
    }
}
