//! OAuth token lifecycle.
//!
//! Access tokens are short-lived and refreshed proactively, a buffer ahead
//! of expiry, so requests never go out with a token about to die mid-flight.
//! The refresh token itself can rotate on any refresh; the new one is
//! persisted to the secret store before the in-memory swap, so a crash
//! between the two leaves a usable credential on disk.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::{Error, Result};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::secrets::SecretStore;

/// Response from the OAuth token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Present only when the auth server rotates the refresh token.
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

/// The token-endpoint surface, kept narrow so tests can fake the auth server.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse>;
}

/// Real OAuth endpoint: form-encoded refresh_token grant.
#[derive(Debug, Clone)]
pub struct HttpAuthApi {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl HttpAuthApi {
    pub fn new(
        client: reqwest::Client,
        token_url: String,
        client_id: String,
        client_secret: String,
    ) -> Self {
        Self {
            client,
            token_url,
            client_id,
            client_secret,
        }
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let resp = self
            .client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Auth(format!(
                "token refresh failed with status {status}: {body}"
            )));
        }

        resp.json().await.map_err(|e| Error::Http(e.to_string()))
    }
}

#[derive(Debug, Clone)]
struct TokenState {
    access_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

impl TokenState {
    fn empty() -> Self {
        Self {
            access_token: String::new(),
            refresh_token: String::new(),
            expires_at: DateTime::UNIX_EPOCH,
        }
    }

    /// Inclusive at the buffer boundary: a token exactly `buffer` from
    /// expiry is already stale.
    fn needs_refresh(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        now >= self.expires_at - buffer
    }
}

/// Serializes all token access behind one mutex. Constructed once at
/// startup and shared; there is deliberately no global instance.
pub struct TokenManager {
    auth: Arc<dyn AuthApi>,
    store: Arc<dyn SecretStore>,
    secret_name: String,
    buffer: Duration,
    state: Mutex<TokenState>,
}

impl TokenManager {
    pub fn new(
        auth: Arc<dyn AuthApi>,
        store: Arc<dyn SecretStore>,
        secret_name: String,
        refresh_buffer_secs: i64,
    ) -> Self {
        Self {
            auth,
            store,
            secret_name,
            buffer: Duration::seconds(refresh_buffer_secs),
            state: Mutex::new(TokenState::empty()),
        }
    }

    /// Current access token, refreshed first if it is inside the expiry
    /// buffer (or was never fetched).
    pub async fn access_token(&self) -> Result<String> {
        let mut state = self.state.lock().await;
        if state.needs_refresh(Utc::now(), self.buffer) {
            self.refresh_locked(&mut state).await?;
        }
        Ok(state.access_token.clone())
    }

    /// Reactive path after a 401: refresh only if the rejected token is
    /// still the current one. When several requests fail on the same stale
    /// token, the first one in refreshes and the rest reuse its result.
    pub async fn refresh_if_stale(&self, observed: &str) -> Result<String> {
        let mut state = self.state.lock().await;
        if state.access_token != observed {
            debug!("Token already rotated by another request, reusing");
            return Ok(state.access_token.clone());
        }
        self.refresh_locked(&mut state).await?;
        Ok(state.access_token.clone())
    }

    async fn refresh_locked(&self, state: &mut TokenState) -> Result<()> {
        if state.refresh_token.is_empty() {
            state.refresh_token = self.store.get_latest(&self.secret_name).await?;
        }

        let resp = self.auth.refresh(&state.refresh_token).await?;

        // Rotation: persist before swapping, and fail loud. A rotation we
        // could not persist must not be adopted in memory.
        if let Some(new_refresh) = resp.refresh_token {
            if new_refresh != state.refresh_token {
                if let Err(e) = self.store.add_version(&self.secret_name, &new_refresh).await {
                    warn!(error = %e, "Failed to persist rotated refresh token");
                    return Err(e);
                }
                info!("Refresh token rotated and persisted");
                state.refresh_token = new_refresh;
            }
        }

        state.access_token = resp.access_token;
        state.expires_at = Utc::now() + Duration::seconds(resp.expires_in);
        debug!(expires_at = %state.expires_at, "Access token refreshed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex as StdMutex;

    struct FakeStore {
        latest: StdMutex<String>,
        versions: StdMutex<Vec<String>>,
        fail_writes: bool,
    }

    impl FakeStore {
        fn new(initial: &str) -> Self {
            Self {
                latest: StdMutex::new(initial.to_string()),
                versions: StdMutex::new(Vec::new()),
                fail_writes: false,
            }
        }
    }

    #[async_trait]
    impl SecretStore for FakeStore {
        async fn get_latest(&self, _name: &str) -> Result<String> {
            Ok(self.latest.lock().unwrap().clone())
        }

        async fn add_version(&self, _name: &str, value: &str) -> Result<()> {
            if self.fail_writes {
                return Err(Error::Secret("store unavailable".into()));
            }
            *self.latest.lock().unwrap() = value.to_string();
            self.versions.lock().unwrap().push(value.to_string());
            Ok(())
        }
    }

    struct FakeAuth {
        calls: AtomicU32,
        rotate_to: Option<String>,
        expires_in: i64,
    }

    impl FakeAuth {
        fn new(expires_in: i64, rotate_to: Option<&str>) -> Self {
            Self {
                calls: AtomicU32::new(0),
                rotate_to: rotate_to.map(str::to_string),
                expires_in,
            }
        }
    }

    #[async_trait]
    impl AuthApi for FakeAuth {
        async fn refresh(&self, _refresh_token: &str) -> Result<TokenResponse> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(TokenResponse {
                access_token: format!("access-{n}"),
                refresh_token: self.rotate_to.clone(),
                expires_in: self.expires_in,
            })
        }
    }

    fn manager(auth: Arc<FakeAuth>, store: Arc<FakeStore>) -> TokenManager {
        TokenManager::new(auth, store, "ads-refresh-token".into(), 300)
    }

    #[tokio::test]
    async fn test_fresh_token_not_refreshed_again() {
        let auth = Arc::new(FakeAuth::new(3600, None));
        let store = Arc::new(FakeStore::new("rt-1"));
        let mgr = manager(auth.clone(), store);

        let t1 = mgr.access_token().await.unwrap();
        let t2 = mgr.access_token().await.unwrap();
        assert_eq!(t1, t2);
        assert_eq!(auth.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_token_inside_buffer_is_refreshed() {
        // expires_in below the 300s buffer: stale immediately.
        let auth = Arc::new(FakeAuth::new(200, None));
        let store = Arc::new(FakeStore::new("rt-1"));
        let mgr = manager(auth.clone(), store);

        mgr.access_token().await.unwrap();
        mgr.access_token().await.unwrap();
        assert_eq!(auth.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_buffer_boundary_inclusive() {
        let now = Utc::now();
        let buffer = Duration::seconds(300);
        let mut state = TokenState {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_at: now + buffer,
        };
        // Exactly at the boundary: stale.
        assert!(state.needs_refresh(now, buffer));
        // One second past the boundary: still fresh.
        state.expires_at = now + buffer + Duration::seconds(1);
        assert!(!state.needs_refresh(now, buffer));
    }

    #[tokio::test]
    async fn test_rotation_persists_exactly_one_version() {
        let auth = Arc::new(FakeAuth::new(3600, Some("rt-2")));
        let store = Arc::new(FakeStore::new("rt-1"));
        let mgr = manager(auth, store.clone());

        mgr.access_token().await.unwrap();
        assert_eq!(*store.versions.lock().unwrap(), vec!["rt-2".to_string()]);
    }

    #[tokio::test]
    async fn test_rotation_persist_failure_propagates() {
        let auth = Arc::new(FakeAuth::new(3600, Some("rt-2")));
        let mut store = FakeStore::new("rt-1");
        store.fail_writes = true;
        let mgr = manager(auth, Arc::new(store));

        let err = mgr.access_token().await.unwrap_err();
        assert!(matches!(err, Error::Secret(_)));
    }

    #[tokio::test]
    async fn test_refresh_if_stale_single_refresh_for_concurrent_401s() {
        let auth = Arc::new(FakeAuth::new(3600, None));
        let store = Arc::new(FakeStore::new("rt-1"));
        let mgr = manager(auth.clone(), store);

        let stale = mgr.access_token().await.unwrap();
        // Two requests observe the same 401'd token; only one refresh runs.
        let t1 = mgr.refresh_if_stale(&stale).await.unwrap();
        let t2 = mgr.refresh_if_stale(&stale).await.unwrap();
        assert_eq!(t1, t2);
        assert_ne!(t1, stale);
        assert_eq!(auth.calls.load(Ordering::SeqCst), 2);
    }
}
