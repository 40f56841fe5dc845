//! Unified error type for the bid bot.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Auth error: {0}")]
    Auth(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Secret store error: {0}")]
    Secret(String),

    #[error("Ads API error (status={status}): {message}")]
    AdsApi { status: u16, message: String },

    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Metrics store error: {0}")]
    Warehouse(String),

    #[error("Report error: {0}")]
    Report(String),

    #[error("Search bounds invalid: {0}")]
    SearchBounds(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
