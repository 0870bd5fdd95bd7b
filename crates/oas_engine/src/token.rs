//! Client-credentials token acquisition with an explicit, per-run cache.
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use oas_core::AuthError;
use pipeline_logging::{pipeline_debug, pipeline_info, pipeline_warn};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

/// Lifetime assumed when the issuer omits `expires_in`.
pub const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    pub value: String,
    pub expires_at: Instant,
}

impl Token {
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Tokens keyed by credential identity. One cache lives for one batch run.
///
/// The lock is held across a refresh, so concurrent callers wait for the
/// refresh in flight instead of issuing their own.
#[derive(Debug, Default)]
pub struct TokenCache {
    entries: Mutex<HashMap<String, Token>>,
    refreshes: AtomicUsize,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of token requests issued through this cache.
    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::Relaxed)
    }
}

/// Cache key for a credential at an endpoint. The secret never takes part.
pub fn credential_fingerprint(credentials: &Credentials, token_endpoint: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token_endpoint.as_bytes());
    hasher.update([0u8]);
    hasher.update(credentials.client_id.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}

#[derive(Debug, Clone)]
pub struct TokenProvider {
    client: reqwest::Client,
    timeout: Duration,
}

impl TokenProvider {
    pub fn new(timeout: Duration) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|err| AuthError::RequestFailed(err.to_string()))?;
        Ok(Self { client, timeout })
    }

    /// Return the cached token for `credentials` unless it is expired or
    /// `force_refresh` is set; otherwise request and cache a new one.
    pub async fn get_token(
        &self,
        cache: &TokenCache,
        credentials: &Credentials,
        token_endpoint: &str,
        force_refresh: bool,
    ) -> Result<Token, AuthError> {
        let key = credential_fingerprint(credentials, token_endpoint);
        let mut entries = cache.entries.lock().await;

        if !force_refresh {
            if let Some(token) = entries.get(&key).filter(|token| !token.is_expired()) {
                pipeline_debug!("Reusing cached token for credential {}", key);
                return Ok(token.clone());
            }
        }

        let token = self.request_token(credentials, token_endpoint).await?;
        cache.refreshes.fetch_add(1, Ordering::Relaxed);
        entries.insert(key, token.clone());
        Ok(token)
    }

    async fn request_token(
        &self,
        credentials: &Credentials,
        token_endpoint: &str,
    ) -> Result<Token, AuthError> {
        pipeline_info!("Requesting bearer token from {}", token_endpoint);
        let payload = json!({
            "grant_type": "client_credentials",
            "client_id": credentials.client_id,
            "client_secret": credentials.client_secret,
        });

        let response = self
            .client
            .post(token_endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(payload.to_string())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| AuthError::RequestFailed(err.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| AuthError::RequestFailed(err.to_string()))?;

        if !status.is_success() {
            let detail = String::from_utf8_lossy(&body);
            let detail: String = detail.chars().take(200).collect();
            pipeline_warn!("Token request rejected with {}", status);
            return Err(AuthError::RequestFailed(format!("{status}: {detail}")));
        }

        let (value, expires_in) = parse_token_response(&body)?;
        pipeline_info!("Token issued, expires in {}s", expires_in);
        Ok(Token {
            value,
            expires_at: expiry_after(Instant::now(), expires_in)?,
        })
    }
}

fn expiry_after(now: Instant, expires_in: u64) -> Result<Instant, AuthError> {
    now.checked_add(Duration::from_secs(expires_in))
        .ok_or_else(|| AuthError::MalformedResponse(format!("expires_in {expires_in} out of range")))
}

fn parse_token_response(body: &[u8]) -> Result<(String, u64), AuthError> {
    let parsed: Value = serde_json::from_slice(body)
        .map_err(|err| AuthError::MalformedResponse(format!("response is not JSON: {err}")))?;

    let access_token = parsed
        .get("access_token")
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AuthError::MalformedResponse("no access_token in response".into()))?;

    // Some issuers send expires_in as a string.
    let expires_in = parsed
        .get("expires_in")
        .and_then(|v| v.as_u64().or_else(|| v.as_str()?.trim().parse().ok()))
        .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);

    Ok((access_token.to_string(), expires_in))
}
