//! Async reporting workflow: request a report, poll until it completes,
//! download the result, and aggregate keyword metrics out of it.
//!
//! The platform generates reports out-of-band; completion usually takes a
//! couple of minutes. The poll loop is bounded by a hard timeout so a stuck
//! report fails the job instead of hanging it.

use std::time::Duration;

use chrono::NaiveDate;
use common::{Error, Result};
use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::rest::AdsClient;

/// Date window for a targeting report.
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Aggregated metrics for one keyword over the report window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeywordTotals {
    pub impressions: u64,
    pub clicks: u64,
}

enum PollState {
    Ready(String),
    Pending,
    Failed(String),
}

/// Drives report generation through the ads client's transport.
#[derive(Clone)]
pub struct ReportClient {
    ads: AdsClient,
    download_client: reqwest::Client,
    poll_interval: Duration,
    timeout: Duration,
}

impl ReportClient {
    pub fn new(
        ads: AdsClient,
        download_client: reqwest::Client,
        poll_secs: u64,
        timeout_secs: u64,
    ) -> Self {
        Self {
            ads,
            download_client,
            poll_interval: Duration::from_secs(poll_secs),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Run the full request/poll/download cycle and total one keyword's
    /// impressions and clicks.
    pub async fn keyword_totals(
        &self,
        req: &ReportRequest,
        keyword_id: &str,
    ) -> Result<KeywordTotals> {
        let report_id = self.request_report(req).await?;
        info!(report_id, "Report requested, polling for completion");
        let url = self.await_completion(&report_id).await?;
        let rows = self.download(&url).await?;
        debug!(rows = rows.len(), "Report downloaded");
        Ok(totals_for_keyword(&rows, keyword_id))
    }

    async fn request_report(&self, req: &ReportRequest) -> Result<String> {
        let body = json!({
            "name": format!("targeting-{}-{}", req.start_date, req.end_date),
            "startDate": req.start_date.to_string(),
            "endDate": req.end_date.to_string(),
            "configuration": {
                "adProduct": "SPONSORED_PRODUCTS",
                "reportTypeId": "spTargeting",
                "timeUnit": "SUMMARY",
                "format": "JSON",
                "groupBy": ["targeting"],
                "columns": ["keywordId", "campaignId", "adGroupId", "impressions", "clicks"],
            }
        });

        let resp = self.ads.send_write("/reporting/reports", &body).await?;
        resp.get("reportId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::Report("report creation returned no reportId".into()))
    }

    async fn await_completion(&self, report_id: &str) -> Result<String> {
        let deadline = Instant::now() + self.timeout;
        loop {
            let resp = self
                .ads
                .send_read(&format!("/reporting/reports/{report_id}"))
                .await?;

            match classify_poll(&resp) {
                PollState::Ready(url) => return Ok(url),
                PollState::Failed(msg) => {
                    return Err(Error::Report(format!("report {report_id} failed: {msg}")))
                }
                PollState::Pending => {
                    if Instant::now() >= deadline {
                        return Err(Error::Report(format!(
                            "report {report_id} did not complete within {}s",
                            self.timeout.as_secs()
                        )));
                    }
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    /// Presigned URL: no API auth headers, a plain GET.
    async fn download(&self, url: &str) -> Result<Vec<Value>> {
        let resp = self
            .download_client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status().as_u16();
        if status != 200 {
            return Err(Error::Report(format!(
                "report download failed with status {status}"
            )));
        }

        let text = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
        parse_report_rows(&text)
    }
}

fn classify_poll(resp: &Value) -> PollState {
    let status = resp
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or_default();
    match status {
        "SUCCESS" | "COMPLETED" | "DONE" => match resp.get("url").and_then(Value::as_str) {
            Some(url) => PollState::Ready(url.to_string()),
            None => PollState::Failed("completed without a download url".into()),
        },
        "FAILURE" | "FAILED" | "ERROR" => PollState::Failed(
            resp.get("failureReason")
                .and_then(Value::as_str)
                .unwrap_or("no reason given")
                .to_string(),
        ),
        // Unknown or absent status: still generating.
        _ => PollState::Pending,
    }
}

/// Reports arrive either as one JSON array or as JSON-lines.
fn parse_report_rows(text: &str) -> Result<Vec<Value>> {
    if let Ok(Value::Array(rows)) = serde_json::from_str::<Value>(text) {
        return Ok(rows);
    }
    let mut rows = Vec::new();
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        rows.push(serde_json::from_str(line)?);
    }
    Ok(rows)
}

fn totals_for_keyword(rows: &[Value], keyword_id: &str) -> KeywordTotals {
    let mut totals = KeywordTotals::default();
    for row in rows {
        let id_matches = row
            .get("keywordId")
            .map(|v| match v {
                Value::String(s) => s == keyword_id,
                Value::Number(n) => n.to_string() == keyword_id,
                _ => false,
            })
            .unwrap_or(false);
        if !id_matches {
            continue;
        }
        totals.impressions += row.get("impressions").and_then(Value::as_u64).unwrap_or(0);
        totals.clicks += row.get("clicks").and_then(Value::as_u64).unwrap_or(0);
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_array() {
        let rows = parse_report_rows(r#"[{"keywordId":"k1","impressions":10}]"#).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_parse_json_lines() {
        let text = "{\"keywordId\":\"k1\",\"impressions\":10}\n{\"keywordId\":\"k2\",\"impressions\":3}\n";
        let rows = parse_report_rows(text).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_totals_filter_by_keyword() {
        let rows = parse_report_rows(concat!(
            r#"[{"keywordId":"k1","impressions":10,"clicks":2},"#,
            r#"{"keywordId":"k2","impressions":99,"clicks":9},"#,
            r#"{"keywordId":"k1","impressions":5,"clicks":1}]"#
        ))
        .unwrap();
        let totals = totals_for_keyword(&rows, "k1");
        assert_eq!(
            totals,
            KeywordTotals {
                impressions: 15,
                clicks: 3
            }
        );
    }

    #[test]
    fn test_totals_numeric_keyword_ids() {
        let rows = parse_report_rows(r#"[{"keywordId":12345,"impressions":7,"clicks":1}]"#).unwrap();
        let totals = totals_for_keyword(&rows, "12345");
        assert_eq!(totals.impressions, 7);
    }

    #[test]
    fn test_poll_classification() {
        assert!(matches!(
            classify_poll(&serde_json::json!({"status":"SUCCESS","url":"https://x"})),
            PollState::Ready(_)
        ));
        assert!(matches!(
            classify_poll(&serde_json::json!({"status":"SUCCESS"})),
            PollState::Failed(_)
        ));
        assert!(matches!(
            classify_poll(&serde_json::json!({"status":"FAILURE"})),
            PollState::Failed(_)
        ));
        assert!(matches!(
            classify_poll(&serde_json::json!({"status":"PENDING"})),
            PollState::Pending
        ));
        assert!(matches!(classify_poll(&serde_json::json!({})), PollState::Pending));
    }
}
