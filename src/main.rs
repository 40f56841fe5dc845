//! PPC bid bot: one-shot batch jobs over the ads platform.
//!
//! Single-binary Tokio application that:
//! 1. Pulls keyword performance and sales data from the warehouse
//! 2. Computes bids (AOV ceiling × performance × match type × time of day)
//! 3. Pushes updates through the rate-limited ads client
//! 4. Monitors budget pacing and applies emergency reductions
//! 5. Can bisect a live keyword for its minimum winning bid

mod config;
mod jobs;
mod journal;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{error, info};

use ads_client::{
    AdsClient, HttpAuthApi, HttpSecretStore, RateLimiter, ReportClient, TokenManager,
};
use warehouse::HttpMetricsStore;

use crate::jobs::JobContext;
use crate::journal::{now_iso, resolve_journal_dir, write_event, RunJournal, SharedJournal};

const REFRESH_TOKEN_SECRET: &str = "ads-refresh-token";

/// PPC bid management bot
#[derive(Parser)]
#[command(name = "ppc-bot", about = "PPC bid management bot")]
struct Cli {
    /// Compute and log all decisions without pushing anything.
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a full bid optimization pass.
    Optimize,
    /// Check campaign spend pacing and apply emergency reductions.
    BudgetMonitor,
    /// Bisect a live keyword for its minimum winning bid.
    MinWinningBid {
        /// Keyword to probe.
        #[arg(long)]
        keyword_id: String,
    },
    /// Test the credential chain (secret store + token refresh) and exit.
    CheckAuth,
}

#[tokio::main]
async fn main() {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ppc_bot=info,ads_client=info,warehouse=info,engine=info".into()
            }),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    info!("PPC bot starting up...");

    // Load configuration.
    let mut cfg = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    // The flag can only make a run safer, never go live against config.
    if cli.dry_run {
        cfg.dry_run = true;
    }

    info!("Mode: {}", if cfg.dry_run { "DRY RUN" } else { "LIVE" });
    info!(
        "Bids: [{:.2}, {:.2}], hysteresis={:.2}, target_acos={:.2}",
        cfg.bids.min_bid, cfg.bids.max_bid, cfg.bids.hysteresis, cfg.bids.target_acos,
    );
    info!(
        "Pacing: checkpoint@{}h, warn>{:.0}%, crit>{:.0}%, exhausted>={:.0}%",
        cfg.pacing.checkpoint_hour,
        cfg.pacing.warning_threshold * 100.0,
        cfg.pacing.critical_threshold * 100.0,
        cfg.pacing.exhaustion_threshold * 100.0,
    );

    let journal_dir = resolve_journal_dir();
    let journal = match RunJournal::open(journal_dir) {
        Ok(j) => j,
        Err(e) => {
            error!("Failed to initialize run journal: {}", e);
            std::process::exit(1);
        }
    };
    let journal_path = journal.dir().to_path_buf();
    let journal: SharedJournal = Arc::new(Mutex::new(journal));
    info!("Journal path: {}", journal_path.display());
    write_event(
        &journal,
        json!({
            "ts": now_iso(),
            "kind": "bot_start",
            "bot": "ppc-bot",
            "mode": if cfg.dry_run { "dry_run" } else { "live" },
            "utc_offset_hours": cfg.utc_offset_hours,
        }),
    )
    .await;

    // ── Wire up clients ──────────────────────────────────────────────
    let http = reqwest::Client::builder()
        .pool_max_idle_per_host(4)
        .tcp_keepalive(std::time::Duration::from_secs(30))
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .expect("failed to build reqwest client");

    let secrets = Arc::new(HttpSecretStore::new(
        http.clone(),
        cfg.secret_store_url.clone(),
        cfg.secret_store_token.clone(),
    ));
    let auth = Arc::new(HttpAuthApi::new(
        http.clone(),
        cfg.tokens.token_url.clone(),
        cfg.ads_client_id.clone(),
        cfg.ads_client_secret.clone(),
    ));
    let tokens = Arc::new(TokenManager::new(
        auth,
        secrets,
        REFRESH_TOKEN_SECRET.to_string(),
        cfg.tokens.refresh_buffer_secs,
    ));

    let limiter = RateLimiter::with_limits(cfg.ads.reads_per_sec, cfg.ads.writes_per_sec);
    let ads = AdsClient::new(
        http.clone(),
        tokens.clone(),
        limiter,
        cfg.ads.base_url.clone(),
        cfg.ads_client_id.clone(),
        cfg.profile_id.clone(),
        cfg.ads.batch_size,
        cfg.ads.retry_attempts,
        cfg.dry_run,
    );
    let reports = ReportClient::new(
        ads.clone(),
        http.clone(),
        cfg.search.report_poll_secs,
        cfg.search.report_timeout_secs,
    );
    let store = Arc::new(HttpMetricsStore::new(http, cfg.warehouse_url.clone()));

    let ctx = JobContext {
        cfg,
        store,
        ads,
        reports,
        journal: journal.clone(),
    };

    // ── Dispatch ─────────────────────────────────────────────────────
    let (job, result) = match &cli.command {
        Command::Optimize => ("optimize", jobs::run_optimize(&ctx).await),
        Command::BudgetMonitor => ("budget-monitor", jobs::run_budget_monitor(&ctx).await),
        Command::MinWinningBid { keyword_id } => (
            "min-winning-bid",
            jobs::run_min_winning_bid(&ctx, keyword_id).await,
        ),
        Command::CheckAuth => ("check-auth", jobs::run_check_auth(&tokens, &journal).await),
    };

    match result {
        Ok(()) => {
            write_event(
                &journal,
                json!({ "ts": now_iso(), "kind": "bot_exit", "job": job, "status": "ok" }),
            )
            .await;
            info!(job, "Done");
        }
        Err(e) => {
            error!(job, error = %e, "Job failed");
            write_event(
                &journal,
                json!({
                    "ts": now_iso(),
                    "kind": "bot_exit",
                    "job": job,
                    "status": "error",
                    "error": e.to_string(),
                }),
            )
            .await;
            std::process::exit(1);
        }
    }
}
