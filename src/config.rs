//! Configuration loader — merges env vars, .env file, and config.toml.

use common::config::BotConfig;
use common::Error;
use std::path::Path;

fn parse_positive_f64(raw: &str, env_name: &str) -> Result<f64, Error> {
    let parsed = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| Error::Config(format!("{env_name} must be a number > 0")))?;
    if parsed <= 0.0 {
        return Err(Error::Config(format!("{env_name} must be a number > 0")));
    }
    Ok(parsed)
}

fn parse_positive_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    let parsed = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer > 0")))?;
    if parsed == 0 {
        return Err(Error::Config(format!("{env_name} must be an integer > 0")));
    }
    Ok(parsed)
}

fn parse_bool(raw: &str) -> bool {
    let lowered = raw.trim().to_ascii_lowercase();
    lowered != "0" && lowered != "false" && lowered != "no" && lowered != "off"
}

fn validate_config(config: &BotConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    if config.bids.min_bid <= 0.0 {
        issues.push("bids.min_bid must be > 0".into());
    }
    if config.bids.max_bid <= config.bids.min_bid {
        issues.push("bids.max_bid must be > bids.min_bid".into());
    }
    if config.bids.hysteresis < 0.0 {
        issues.push("bids.hysteresis must be >= 0".into());
    }
    if config.bids.target_acos <= 0.0 || config.bids.target_acos >= 1.0 {
        issues.push("bids.target_acos must be in (0,1)".into());
    }
    let bp = &config.bids.aov_breakpoints;
    if !(bp[0] < bp[1] && bp[1] < bp[2]) {
        issues.push("bids.aov_breakpoints must be strictly ascending".into());
    }
    let c = &config.bids.ceilings;
    if !(c.l <= c.m && c.m <= c.h && c.h <= c.x) {
        issues.push("bids.ceilings must be non-decreasing L..X".into());
    }
    for band in &config.bids.time_bands {
        if band.start_hour >= band.end_hour || band.end_hour > 24 {
            issues.push(format!(
                "bids.time_bands: invalid band {}..{}",
                band.start_hour, band.end_hour
            ));
        }
        if band.multiplier <= 0.0 {
            issues.push("bids.time_bands: multiplier must be > 0".into());
        }
    }

    let t = &config.tiers;
    if t.solid_cvr_floor >= t.solid_cvr_ceiling {
        issues.push("tiers.solid_cvr_floor must be < tiers.solid_cvr_ceiling".into());
    }
    if t.bleed_min_clicks >= t.kill_min_clicks {
        issues.push("tiers.bleed_min_clicks must be < tiers.kill_min_clicks".into());
    }

    let a = &config.aov;
    if a.recent_window_days >= a.extended_window_days {
        issues.push("aov.recent_window_days must be < aov.extended_window_days".into());
    }

    let p = &config.pacing;
    if p.checkpoint_hour > 23 {
        issues.push("pacing.checkpoint_hour must be in 0..=23".into());
    }
    if !(p.warning_threshold < p.critical_threshold
        && p.critical_threshold < p.exhaustion_threshold)
    {
        issues.push("pacing thresholds must satisfy warning < critical < exhaustion".into());
    }
    for (name, r) in [
        ("warning_reduction", p.warning_reduction),
        ("critical_reduction", p.critical_reduction),
        ("exhaustion_reduction", p.exhaustion_reduction),
    ] {
        // A full 100% cut (floor every bid) is a legal reduction.
        if r <= 0.0 || r > 1.0 {
            issues.push(format!("pacing.{name} must be in (0,1]"));
        }
    }

    let s = &config.search;
    if s.max_bid <= s.min_bid {
        issues.push("search.max_bid must be > search.min_bid".into());
    }
    if s.max_iters == 0 {
        issues.push("search.max_iters must be > 0".into());
    }
    if s.report_poll_secs == 0 {
        issues.push("search.report_poll_secs must be > 0".into());
    }

    if config.ads.batch_size == 0 {
        issues.push("ads.batch_size must be > 0".into());
    }
    if config.tokens.refresh_buffer_secs <= 0 {
        issues.push("tokens.refresh_buffer_secs must be > 0".into());
    }
    if config.utc_offset_hours < -12 || config.utc_offset_hours > 14 {
        issues.push("utc_offset_hours must be in -12..=14".into());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

/// Load bot configuration from environment and optional config file.
pub fn load_config() -> Result<BotConfig, Error> {
    // 1. Load .env file from project root or parent directories.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Start with defaults.
    let mut config = BotConfig::default();

    // 3. Try loading config.toml if it exists.
    let config_path = Path::new("config.toml");
    if config_path.exists() {
        let contents = std::fs::read_to_string(config_path)
            .map_err(|e| Error::Config(format!("Failed to read config.toml: {}", e)))?;
        config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config.toml: {}", e)))?;
    }

    // 4. Override with environment variables (highest priority).
    if let Ok(url) = std::env::var("WAREHOUSE_URL") {
        config.warehouse_url = url;
    }
    if let Ok(url) = std::env::var("SECRET_STORE_URL") {
        config.secret_store_url = url;
    }
    if let Ok(token) = std::env::var("SECRET_STORE_TOKEN") {
        config.secret_store_token = token;
    }
    if let Ok(id) = std::env::var("ADS_CLIENT_ID") {
        config.ads_client_id = id;
    }
    if let Ok(secret) = std::env::var("ADS_CLIENT_SECRET") {
        config.ads_client_secret = secret;
    }
    if let Ok(profile) = std::env::var("ADS_PROFILE_ID") {
        config.profile_id = profile;
    }
    if let Ok(raw) = std::env::var("DRY_RUN") {
        config.dry_run = parse_bool(&raw);
    }
    if let Ok(raw) = std::env::var("MIN_BID") {
        config.bids.min_bid = parse_positive_f64(&raw, "MIN_BID")?;
    }
    if let Ok(raw) = std::env::var("MAX_BID") {
        config.bids.max_bid = parse_positive_f64(&raw, "MAX_BID")?;
    }
    if let Ok(raw) = std::env::var("TARGET_ACOS") {
        config.bids.target_acos = parse_positive_f64(&raw, "TARGET_ACOS")?;
    }
    if let Ok(raw) = std::env::var("SEARCH_OBSERVE_MINUTES") {
        config.search.observe_minutes = parse_positive_u64(&raw, "SEARCH_OBSERVE_MINUTES")?;
    }
    if let Ok(raw) = std::env::var("SEARCH_MAX_ITERS") {
        config.search.max_iters = parse_positive_u64(&raw, "SEARCH_MAX_ITERS")? as u32;
    }
    if let Ok(raw) = std::env::var("UTC_OFFSET_HOURS") {
        config.utc_offset_hours = raw
            .trim()
            .parse::<i32>()
            .map_err(|_| Error::Config("UTC_OFFSET_HOURS must be an integer".into()))?;
    }

    // 5. Validate required fields.
    if config.warehouse_url.is_empty() {
        return Err(Error::Config(
            "WAREHOUSE_URL is required (set in .env or environment)".into(),
        ));
    }
    if config.secret_store_url.is_empty() {
        return Err(Error::Config(
            "SECRET_STORE_URL is required (set in .env or environment)".into(),
        ));
    }
    if config.ads_client_id.is_empty() || config.ads_client_secret.is_empty() {
        return Err(Error::Config(
            "ADS_CLIENT_ID and ADS_CLIENT_SECRET are required (set in .env or environment)".into(),
        ));
    }
    if config.profile_id.is_empty() {
        return Err(Error::Config(
            "ADS_PROFILE_ID is required (set in .env or environment)".into(),
        ));
    }

    validate_config(&config)?;

    Ok(config)
}
