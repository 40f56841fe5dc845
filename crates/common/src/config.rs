//! Bot configuration types.
//!
//! Multiplier tables and thresholds are configuration data, not behavior:
//! the decision engine reads them but never hardcodes them.

use serde::{Deserialize, Serialize};

/// Top-level bot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Metrics-store (warehouse) base URL.
    #[serde(default)]
    pub warehouse_url: String,

    /// Secret-store base URL.
    #[serde(default)]
    pub secret_store_url: String,

    /// Bearer token for the secret store (usually from env).
    #[serde(default)]
    pub secret_store_token: String,

    /// OAuth client id for the ads API (env only).
    #[serde(default)]
    pub ads_client_id: String,

    /// OAuth client secret for the ads API (env only).
    #[serde(default)]
    pub ads_client_secret: String,

    /// Ads profile (account scope) the bot operates on.
    #[serde(default)]
    pub profile_id: String,

    /// Suppress all mutating calls to the ads platform (decisions still run).
    #[serde(default = "default_true")]
    pub dry_run: bool,

    /// UTC offset in hours for time-of-day logic (account local time).
    #[serde(default = "default_utc_offset")]
    pub utc_offset_hours: i32,

    /// Bid formula tables and limits.
    #[serde(default)]
    pub bids: BidRulesConfig,

    /// Performance tier thresholds.
    #[serde(default)]
    pub tiers: TierThresholds,

    /// AOV resolver windows and floors.
    #[serde(default)]
    pub aov: AovConfig,

    /// Budget pacing thresholds and reductions.
    #[serde(default)]
    pub pacing: PacingConfig,

    /// Minimum-winning-bid search parameters.
    #[serde(default)]
    pub search: SearchConfig,

    /// Optimization job parameters.
    #[serde(default)]
    pub optimize: OptimizeConfig,

    /// Ads platform endpoints and limits.
    #[serde(default)]
    pub ads: AdsApiConfig,

    /// Token lifecycle parameters.
    #[serde(default)]
    pub tokens: TokenConfig,
}

/// Bid formula tables and hard limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidRulesConfig {
    /// Absolute bid floor (currency units).
    #[serde(default = "default_min_bid")]
    pub min_bid: f64,

    /// Absolute bid ceiling.
    #[serde(default = "default_max_bid")]
    pub max_bid: f64,

    /// Minimum bid delta before an update is staged.
    #[serde(default = "default_hysteresis")]
    pub hysteresis: f64,

    /// AOV assumed when no record exists for an ASIN.
    #[serde(default = "default_aov")]
    pub default_aov: f64,

    /// Ceiling penalty applied when AOV confidence is `default`.
    #[serde(default = "default_confidence_penalty")]
    pub default_confidence_penalty: f64,

    /// Target ACOS used for harvest bid seeding.
    #[serde(default = "default_target_acos")]
    pub target_acos: f64,

    /// Ascending AOV cut points partitioning into tiers L/M/H/X.
    #[serde(default = "default_aov_breakpoints")]
    pub aov_breakpoints: [f64; 3],

    /// Base bid ceiling per AOV tier; must be non-decreasing L..X.
    #[serde(default)]
    pub ceilings: CeilingTable,

    /// Performance tier multipliers.
    #[serde(default)]
    pub performance: PerformanceTable,

    /// Match type multipliers.
    #[serde(default)]
    pub match_types: MatchTable,

    /// Time-of-day bands; hours not covered use `time_default`.
    #[serde(default = "default_time_bands")]
    pub time_bands: Vec<TimeBand>,

    /// Multiplier for hours outside every configured band.
    #[serde(default = "default_time_default")]
    pub time_default: f64,
}

/// Base ceilings per AOV tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CeilingTable {
    #[serde(default = "default_ceiling_l")]
    pub l: f64,
    #[serde(default = "default_ceiling_m")]
    pub m: f64,
    #[serde(default = "default_ceiling_h")]
    pub h: f64,
    #[serde(default = "default_ceiling_x")]
    pub x: f64,
}

/// Performance multipliers per tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceTable {
    #[serde(default = "default_perf_a")]
    pub a: f64,
    #[serde(default = "default_perf_b")]
    pub b: f64,
    #[serde(default = "default_perf_c")]
    pub c: f64,
    #[serde(default = "default_perf_d")]
    pub d: f64,
    #[serde(default = "default_perf_e")]
    pub e: f64,
}

/// Match type multipliers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchTable {
    #[serde(default = "default_match_exact")]
    pub exact: f64,
    #[serde(default = "default_match_phrase")]
    pub phrase: f64,
    #[serde(default = "default_match_broad")]
    pub broad: f64,
    #[serde(default = "default_match_auto")]
    pub auto: f64,
}

impl MatchTable {
    /// The most conservative multiplier in the table. Unknown match types
    /// fall back to this, never to a silent 1.0.
    pub fn most_conservative(&self) -> f64 {
        self.exact.min(self.phrase).min(self.broad).min(self.auto)
    }
}

/// One time-of-day multiplier band over `[start_hour, end_hour)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeBand {
    pub start_hour: u32,
    pub end_hour: u32,
    pub multiplier: f64,
}

/// Performance tier classification thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierThresholds {
    #[serde(default = "default_winner_min_conversions")]
    pub winner_min_conversions: u64,
    #[serde(default = "default_winner_min_cvr")]
    pub winner_min_cvr: f64,
    #[serde(default = "default_winner_max_acos")]
    pub winner_max_acos: f64,

    #[serde(default = "default_solid_min_conversions")]
    pub solid_min_conversions: u64,
    #[serde(default = "default_solid_cvr_floor")]
    pub solid_cvr_floor: f64,
    #[serde(default = "default_winner_min_cvr")]
    pub solid_cvr_ceiling: f64,
    #[serde(default = "default_solid_max_acos")]
    pub solid_max_acos: f64,

    #[serde(default = "default_kill_min_clicks")]
    pub kill_min_clicks: u64,
    #[serde(default = "default_bleed_min_clicks")]
    pub bleed_min_clicks: u64,
}

/// AOV resolver windows and sanity floors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AovConfig {
    #[serde(default = "default_recent_window")]
    pub recent_window_days: u32,
    #[serde(default = "default_extended_window")]
    pub extended_window_days: u32,
    /// Trailing days whose attribution data is not yet final.
    #[serde(default = "default_attribution_lag")]
    pub attribution_lag_days: u32,
    /// Records with fewer orders than this are dropped, not downgraded.
    #[serde(default = "default_min_orders")]
    pub min_orders: u64,
    /// Records below this AOV are dropped as noise.
    #[serde(default = "default_min_aov")]
    pub min_aov: f64,
    #[serde(default = "default_high_min_orders")]
    pub high_min_orders: u64,
    #[serde(default = "default_high_min_active_days")]
    pub high_min_active_days: u32,
    #[serde(default = "default_medium_min_orders")]
    pub medium_min_orders: u64,
}

/// Budget pacing thresholds (fractions of daily budget) and reductions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Local hour at which the checkpoint checks run.
    #[serde(default = "default_checkpoint_hour")]
    pub checkpoint_hour: u32,
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: f64,
    #[serde(default = "default_critical_threshold")]
    pub critical_threshold: f64,
    #[serde(default = "default_exhaustion_threshold")]
    pub exhaustion_threshold: f64,
    #[serde(default = "default_warning_reduction")]
    pub warning_reduction: f64,
    #[serde(default = "default_critical_reduction")]
    pub critical_reduction: f64,
    #[serde(default = "default_exhaustion_reduction")]
    pub exhaustion_reduction: f64,
}

/// Minimum-winning-bid search parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_min_bid")]
    pub min_bid: f64,
    #[serde(default = "default_search_max_bid")]
    pub max_bid: f64,
    /// Minutes to wait after each bid change before measuring.
    #[serde(default = "default_observe_minutes")]
    pub observe_minutes: u64,
    #[serde(default = "default_max_iters")]
    pub max_iters: u32,
    /// Impressions required for a probe to count as a win.
    #[serde(default = "default_min_impressions")]
    pub min_impressions: u64,
    /// Report window in days (kept small for speed).
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    #[serde(default = "default_report_timeout")]
    pub report_timeout_secs: u64,
    #[serde(default = "default_report_poll")]
    pub report_poll_secs: u64,
}

/// Optimization job parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeConfig {
    #[serde(default = "default_opt_min_clicks")]
    pub min_clicks: u64,
    #[serde(default = "default_opt_lookback")]
    pub lookback_days: u32,
}

/// Ads platform endpoints and request limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdsApiConfig {
    #[serde(default = "default_ads_base_url")]
    pub base_url: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_reads_per_sec")]
    pub reads_per_sec: u32,
    #[serde(default = "default_writes_per_sec")]
    pub writes_per_sec: u32,
}

/// Token lifecycle parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    #[serde(default = "default_token_url")]
    pub token_url: String,
    /// Refresh this many seconds before expiry.
    #[serde(default = "default_refresh_buffer")]
    pub refresh_buffer_secs: i64,
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_true() -> bool {
    true
}
fn default_utc_offset() -> i32 {
    -5
}

fn default_min_bid() -> f64 {
    0.20
}
fn default_max_bid() -> f64 {
    3.00
}
fn default_hysteresis() -> f64 {
    0.05
}
fn default_aov() -> f64 {
    35.0
}
fn default_confidence_penalty() -> f64 {
    0.85
}
fn default_target_acos() -> f64 {
    0.30
}
fn default_aov_breakpoints() -> [f64; 3] {
    [30.0, 46.0, 70.0]
}

fn default_ceiling_l() -> f64 {
    1.05
}
fn default_ceiling_m() -> f64 {
    1.40
}
fn default_ceiling_h() -> f64 {
    1.95
}
fn default_ceiling_x() -> f64 {
    2.50
}

fn default_perf_a() -> f64 {
    1.00
}
fn default_perf_b() -> f64 {
    0.85
}
fn default_perf_c() -> f64 {
    0.65
}
fn default_perf_d() -> f64 {
    0.40
}
fn default_perf_e() -> f64 {
    0.15
}

fn default_match_exact() -> f64 {
    1.00
}
fn default_match_phrase() -> f64 {
    0.75
}
fn default_match_broad() -> f64 {
    0.50
}
fn default_match_auto() -> f64 {
    0.50
}

fn default_time_bands() -> Vec<TimeBand> {
    vec![
        // Overnight.
        TimeBand {
            start_hour: 0,
            end_hour: 6,
            multiplier: 0.70,
        },
        // Morning commute.
        TimeBand {
            start_hour: 7,
            end_hour: 10,
            multiplier: 0.95,
        },
        // Prime time.
        TimeBand {
            start_hour: 18,
            end_hour: 22,
            multiplier: 1.20,
        },
    ]
}
fn default_time_default() -> f64 {
    0.80
}

fn default_winner_min_conversions() -> u64 {
    2
}
fn default_winner_min_cvr() -> f64 {
    0.18
}
fn default_winner_max_acos() -> f64 {
    0.25
}
fn default_solid_min_conversions() -> u64 {
    1
}
fn default_solid_cvr_floor() -> f64 {
    0.10
}
fn default_solid_max_acos() -> f64 {
    0.40
}
fn default_kill_min_clicks() -> u64 {
    30
}
fn default_bleed_min_clicks() -> u64 {
    20
}

fn default_recent_window() -> u32 {
    14
}
fn default_extended_window() -> u32 {
    30
}
fn default_attribution_lag() -> u32 {
    3
}
fn default_min_orders() -> u64 {
    2
}
fn default_min_aov() -> f64 {
    10.0
}
fn default_high_min_orders() -> u64 {
    10
}
fn default_high_min_active_days() -> u32 {
    7
}
fn default_medium_min_orders() -> u64 {
    5
}

fn default_checkpoint_hour() -> u32 {
    15
}
fn default_warning_threshold() -> f64 {
    0.65
}
fn default_critical_threshold() -> f64 {
    0.75
}
fn default_exhaustion_threshold() -> f64 {
    0.95
}
fn default_warning_reduction() -> f64 {
    0.15
}
fn default_critical_reduction() -> f64 {
    0.25
}
fn default_exhaustion_reduction() -> f64 {
    0.50
}

fn default_search_min_bid() -> f64 {
    0.35
}
fn default_search_max_bid() -> f64 {
    5.00
}
fn default_observe_minutes() -> u64 {
    20
}
fn default_max_iters() -> u32 {
    8
}
fn default_min_impressions() -> u64 {
    1
}
fn default_lookback_days() -> u32 {
    1
}
fn default_report_timeout() -> u64 {
    900
}
fn default_report_poll() -> u64 {
    5
}

fn default_opt_min_clicks() -> u64 {
    5
}
fn default_opt_lookback() -> u32 {
    14
}

fn default_ads_base_url() -> String {
    "https://advertising-api.amazon.com".into()
}
fn default_batch_size() -> usize {
    100
}
fn default_retry_attempts() -> u32 {
    3
}
fn default_reads_per_sec() -> u32 {
    10
}
fn default_writes_per_sec() -> u32 {
    2
}

fn default_token_url() -> String {
    "https://api.amazon.com/auth/o2/token".into()
}
fn default_refresh_buffer() -> i64 {
    300
}

impl Default for BidRulesConfig {
    fn default() -> Self {
        Self {
            min_bid: default_min_bid(),
            max_bid: default_max_bid(),
            hysteresis: default_hysteresis(),
            default_aov: default_aov(),
            default_confidence_penalty: default_confidence_penalty(),
            target_acos: default_target_acos(),
            aov_breakpoints: default_aov_breakpoints(),
            ceilings: CeilingTable::default(),
            performance: PerformanceTable::default(),
            match_types: MatchTable::default(),
            time_bands: default_time_bands(),
            time_default: default_time_default(),
        }
    }
}

impl Default for CeilingTable {
    fn default() -> Self {
        Self {
            l: default_ceiling_l(),
            m: default_ceiling_m(),
            h: default_ceiling_h(),
            x: default_ceiling_x(),
        }
    }
}

impl Default for PerformanceTable {
    fn default() -> Self {
        Self {
            a: default_perf_a(),
            b: default_perf_b(),
            c: default_perf_c(),
            d: default_perf_d(),
            e: default_perf_e(),
        }
    }
}

impl Default for MatchTable {
    fn default() -> Self {
        Self {
            exact: default_match_exact(),
            phrase: default_match_phrase(),
            broad: default_match_broad(),
            auto: default_match_auto(),
        }
    }
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            winner_min_conversions: default_winner_min_conversions(),
            winner_min_cvr: default_winner_min_cvr(),
            winner_max_acos: default_winner_max_acos(),
            solid_min_conversions: default_solid_min_conversions(),
            solid_cvr_floor: default_solid_cvr_floor(),
            solid_cvr_ceiling: default_winner_min_cvr(),
            solid_max_acos: default_solid_max_acos(),
            kill_min_clicks: default_kill_min_clicks(),
            bleed_min_clicks: default_bleed_min_clicks(),
        }
    }
}

impl Default for AovConfig {
    fn default() -> Self {
        Self {
            recent_window_days: default_recent_window(),
            extended_window_days: default_extended_window(),
            attribution_lag_days: default_attribution_lag(),
            min_orders: default_min_orders(),
            min_aov: default_min_aov(),
            high_min_orders: default_high_min_orders(),
            high_min_active_days: default_high_min_active_days(),
            medium_min_orders: default_medium_min_orders(),
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            checkpoint_hour: default_checkpoint_hour(),
            warning_threshold: default_warning_threshold(),
            critical_threshold: default_critical_threshold(),
            exhaustion_threshold: default_exhaustion_threshold(),
            warning_reduction: default_warning_reduction(),
            critical_reduction: default_critical_reduction(),
            exhaustion_reduction: default_exhaustion_reduction(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_bid: default_search_min_bid(),
            max_bid: default_search_max_bid(),
            observe_minutes: default_observe_minutes(),
            max_iters: default_max_iters(),
            min_impressions: default_min_impressions(),
            lookback_days: default_lookback_days(),
            report_timeout_secs: default_report_timeout(),
            report_poll_secs: default_report_poll(),
        }
    }
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        Self {
            min_clicks: default_opt_min_clicks(),
            lookback_days: default_opt_lookback(),
        }
    }
}

impl Default for AdsApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_ads_base_url(),
            batch_size: default_batch_size(),
            retry_attempts: default_retry_attempts(),
            reads_per_sec: default_reads_per_sec(),
            writes_per_sec: default_writes_per_sec(),
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            token_url: default_token_url(),
            refresh_buffer_secs: default_refresh_buffer(),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            warehouse_url: String::new(),
            secret_store_url: String::new(),
            secret_store_token: String::new(),
            ads_client_id: String::new(),
            ads_client_secret: String::new(),
            profile_id: String::new(),
            dry_run: true,
            utc_offset_hours: default_utc_offset(),
            bids: BidRulesConfig::default(),
            tiers: TierThresholds::default(),
            aov: AovConfig::default(),
            pacing: PacingConfig::default(),
            search: SearchConfig::default(),
            optimize: OptimizeConfig::default(),
            ads: AdsApiConfig::default(),
            tokens: TokenConfig::default(),
        }
    }
}
