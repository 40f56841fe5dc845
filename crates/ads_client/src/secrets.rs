//! Secret store access for the OAuth refresh token.
//!
//! The refresh token rotates: whenever the auth server issues a new one it
//! must be persisted as a new version before anything else uses it, or a
//! crash strands the account on a dead credential.

use async_trait::async_trait;
use common::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Versioned secret storage.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the latest version of a secret.
    async fn get_latest(&self, name: &str) -> Result<String>;

    /// Persist a new version of a secret. Durable on return.
    async fn add_version(&self, name: &str, value: &str) -> Result<()>;
}

/// Secret store over a simple versioned HTTP API.
#[derive(Debug, Clone)]
pub struct HttpSecretStore {
    client: reqwest::Client,
    base_url: String,
    bearer_token: String,
}

#[derive(Deserialize)]
struct SecretVersion {
    value: String,
}

#[derive(Serialize)]
struct NewVersion<'a> {
    value: &'a str,
}

impl HttpSecretStore {
    pub fn new(client: reqwest::Client, base_url: String, bearer_token: String) -> Self {
        Self {
            client,
            base_url,
            bearer_token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl SecretStore for HttpSecretStore {
    async fn get_latest(&self, name: &str) -> Result<String> {
        let path = format!("/v1/secrets/{name}/versions/latest");
        let resp = self
            .client
            .get(self.url(&path))
            .bearer_auth(&self.bearer_token)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Secret(format!(
                "fetching {name} failed with status {status}: {body}"
            )));
        }

        let version: SecretVersion = resp.json().await.map_err(|e| Error::Http(e.to_string()))?;
        debug!(secret = name, "Fetched latest secret version");
        Ok(version.value)
    }

    async fn add_version(&self, name: &str, value: &str) -> Result<()> {
        let path = format!("/v1/secrets/{name}/versions");
        let resp = self
            .client
            .post(self.url(&path))
            .bearer_auth(&self.bearer_token)
            .json(&NewVersion { value })
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status().as_u16();
        if status != 200 && status != 201 {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Secret(format!(
                "persisting {name} failed with status {status}: {body}"
            )));
        }

        debug!(secret = name, "Persisted new secret version");
        Ok(())
    }
}
