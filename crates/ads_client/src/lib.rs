//! Client for the ads platform: OAuth token lifecycle, rate-limited REST
//! mutations, and the async reporting workflow.

pub mod rate_limit;
pub mod reports;
pub mod rest;
pub mod secrets;
pub mod token;

pub use rate_limit::RateLimiter;
pub use reports::{KeywordTotals, ReportClient, ReportRequest};
pub use rest::AdsClient;
pub use secrets::{HttpSecretStore, SecretStore};
pub use token::{AuthApi, HttpAuthApi, TokenManager, TokenResponse};
