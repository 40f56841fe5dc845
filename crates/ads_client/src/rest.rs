//! REST client for ads platform mutations.
//!
//! All mutations are rate-limited, retried on transient failures, and
//! short-circuited in dry-run mode. A 401 triggers exactly one reactive
//! token refresh before the request is retried; a second 401 is a real
//! auth failure and propagates.

use std::sync::Arc;
use std::time::Duration;

use common::{BatchOutcome, BidUpdate, Error, NewKeyword, NewNegativeKeyword, Result};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::rate_limit::RateLimiter;
use crate::token::TokenManager;

const BACKOFF_BASE: Duration = Duration::from_secs(2);
const BACKOFF_CAP: Duration = Duration::from_secs(10);

/// Exponential backoff for transient failures: 2s, 4s, 8s, capped at 10s.
fn backoff_delay(attempt: u32) -> Duration {
    let delay = BACKOFF_BASE * 2u32.saturating_pow(attempt);
    delay.min(BACKOFF_CAP)
}

/// Async REST client for the ads platform.
#[derive(Clone)]
pub struct AdsClient {
    client: reqwest::Client,
    tokens: Arc<TokenManager>,
    limiter: RateLimiter,
    base_url: String,
    client_id: String,
    profile_id: String,
    batch_size: usize,
    retry_attempts: u32,
    dry_run: bool,
}

impl AdsClient {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: reqwest::Client,
        tokens: Arc<TokenManager>,
        limiter: RateLimiter,
        base_url: String,
        client_id: String,
        profile_id: String,
        batch_size: usize,
        retry_attempts: u32,
        dry_run: bool,
    ) -> Self {
        Self {
            client,
            tokens,
            limiter,
            base_url,
            client_id,
            profile_id,
            batch_size,
            retry_attempts,
            dry_run,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ── Write endpoints ───────────────────────────────────────────────

    /// Update a single keyword's bid.
    pub async fn update_bid(&self, keyword_id: &str, bid: f64) -> Result<()> {
        let outcome = self
            .batch_update_bids(&[BidUpdate {
                keyword_id: keyword_id.to_string(),
                bid,
            }])
            .await?;
        if outcome.failed > 0 {
            return Err(rejection_error(keyword_id, &outcome));
        }
        Ok(())
    }

    /// Update bids in chunks, returning aggregate per-item counts.
    ///
    /// A failed chunk counts all of its items as failed and the batch keeps
    /// going; partial progress is better than none for bid safety cuts.
    pub async fn batch_update_bids(&self, updates: &[BidUpdate]) -> Result<BatchOutcome> {
        if updates.is_empty() {
            return Ok(BatchOutcome::default());
        }
        if self.dry_run {
            info!(count = updates.len(), "[dry-run] Would update keyword bids");
            return Ok(BatchOutcome {
                success: updates.len(),
                failed: 0,
                errors: Vec::new(),
            });
        }

        let mut total = BatchOutcome::default();
        for chunk in updates.chunks(self.batch_size.max(1)) {
            let payload = json!({ "keywords": keyword_update_items(chunk) });
            match self.send_write("/sp/keywords", &payload).await {
                Ok(body) => {
                    let outcome = outcome_from_response(&body, chunk.len());
                    debug!(
                        success = outcome.success,
                        failed = outcome.failed,
                        "Bid chunk applied"
                    );
                    total.success += outcome.success;
                    total.failed += outcome.failed;
                    total.errors.extend(outcome.errors);
                }
                Err(e) => {
                    warn!(error = %e, count = chunk.len(), "Bid chunk failed");
                    total.failed += chunk.len();
                    total.errors.push(e.to_string());
                }
            }
        }
        Ok(total)
    }

    /// Create a keyword (harvesting a converting search term).
    pub async fn create_keyword(&self, kw: &NewKeyword) -> Result<()> {
        if self.dry_run {
            info!(text = %kw.keyword_text, bid = kw.bid, "[dry-run] Would create keyword");
            return Ok(());
        }
        let payload = json!({
            "keywords": [{
                "campaignId": kw.campaign_id,
                "adGroupId": kw.ad_group_id,
                "keywordText": kw.keyword_text,
                "matchType": kw.match_type.to_string(),
                "bid": kw.bid,
                "state": "ENABLED",
            }]
        });
        self.send_write("/sp/keywords", &payload).await?;
        info!(text = %kw.keyword_text, "Keyword created");
        Ok(())
    }

    /// Create a negative keyword (blocking a wasteful search term).
    pub async fn create_negative_keyword(&self, kw: &NewNegativeKeyword) -> Result<()> {
        if self.dry_run {
            info!(text = %kw.keyword_text, "[dry-run] Would create negative keyword");
            return Ok(());
        }
        let payload = json!({
            "negativeKeywords": [{
                "campaignId": kw.campaign_id,
                "adGroupId": kw.ad_group_id,
                "keywordText": kw.keyword_text,
                "matchType": kw.match_type.to_string(),
                "state": "ENABLED",
            }]
        });
        self.send_write("/sp/negativeKeywords", &payload).await?;
        info!(text = %kw.keyword_text, "Negative keyword created");
        Ok(())
    }

    // ── Transport ─────────────────────────────────────────────────────

    /// POST a mutation with retry, rate limiting, and one-shot 401 recovery.
    pub(crate) async fn send_write(&self, path: &str, body: &Value) -> Result<Value> {
        self.send_with_retry(path, body, true).await
    }

    /// GET through the same auth and retry machinery.
    pub(crate) async fn send_read(&self, path: &str) -> Result<Value> {
        self.send_with_retry(path, &Value::Null, false).await
    }

    async fn send_with_retry(&self, path: &str, body: &Value, write: bool) -> Result<Value> {
        let mut refreshed_once = false;
        let mut attempt = 0;

        loop {
            if write {
                self.limiter.wait_write().await;
            } else {
                self.limiter.wait_read().await;
            }

            let token = self.tokens.access_token().await?;
            let result = self.send_once(path, body, write, &token).await;

            match result {
                Ok(value) => return Ok(value),
                Err(Error::Auth(_)) if !refreshed_once => {
                    // One reactive refresh: the token may have been revoked
                    // under us. A second 401 is real.
                    warn!(path, "Got 401, refreshing token and retrying once");
                    self.tokens.refresh_if_stale(&token).await?;
                    refreshed_once = true;
                }
                Err(
                    e @ (Error::RateLimited { .. }
                    | Error::Http(_)
                    | Error::AdsApi { status: 500..=599, .. }),
                ) if attempt + 1 < self.retry_attempts =>
                {
                    let delay = backoff_delay(attempt);
                    warn!(path, attempt, error = %e, "Transient failure, backing off");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(&self, path: &str, body: &Value, write: bool, token: &str) -> Result<Value> {
        let req = if write {
            self.client.post(self.url(path)).json(body)
        } else {
            self.client.get(self.url(path))
        };

        let resp = req
            .bearer_auth(token)
            .header("Amazon-Advertising-API-ClientId", &self.client_id)
            .header("Amazon-Advertising-API-Scope", &self.profile_id)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status().as_u16();
        if status == 401 {
            return Err(Error::Auth("access token rejected".into()));
        }
        if status == 429 {
            return Err(Error::RateLimited { retry_after_ms: 1000 });
        }
        if !(200..300).contains(&status) {
            let message = resp.text().await.unwrap_or_default();
            return Err(Error::AdsApi { status, message });
        }

        resp.json().await.map_err(|e| Error::Http(e.to_string()))
    }
}

fn keyword_update_items(updates: &[BidUpdate]) -> Vec<Value> {
    updates
        .iter()
        .map(|u| {
            json!({
                "keywordId": u.keyword_id,
                "bid": u.bid,
                "state": "ENABLED",
            })
        })
        .collect()
}

/// A 2xx batch response can still reject individual items; surface that
/// as a plain rejection, not an HTTP-status error.
fn rejection_error(keyword_id: &str, outcome: &BatchOutcome) -> Error {
    Error::Other(format!(
        "bid update rejected for keyword {keyword_id}: {}",
        outcome.errors.join("; ")
    ))
}

/// Parse per-item results out of a batch response. Absent result arrays
/// mean the platform accepted everything.
fn outcome_from_response(body: &Value, attempted: usize) -> BatchOutcome {
    let success = body
        .pointer("/keywords/success")
        .and_then(Value::as_array)
        .map(Vec::len);
    let errors: Vec<String> = body
        .pointer("/keywords/error")
        .and_then(Value::as_array)
        .map(|errs| {
            errs.iter()
                .map(|e| {
                    e.pointer("/errors/0/errorValue/message")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown error")
                        .to_string()
                })
                .collect()
        })
        .unwrap_or_default();

    let failed = errors.len();
    BatchOutcome {
        success: success.unwrap_or(attempted.saturating_sub(failed)),
        failed,
        errors,
    }
}
