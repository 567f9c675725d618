//! OKX Authentication and REST Client
//!
//! Provides authentication, the signed HTTP transport, and the response
//! envelope for the OKX v5 REST API.
//!
//! # Authentication
//!
//! OKX uses HMAC-SHA256 signing with Base64 encoding:
//! - Sign string: timestamp + method + requestPath + body
//! - Headers: OK-ACCESS-KEY, OK-ACCESS-SIGN, OK-ACCESS-TIMESTAMP, OK-ACCESS-PASSPHRASE
//!
//! The request path is signed exactly as it appears in the request line,
//! query string included; any drift invalidates the signature.

use anyhow::{bail, Context, Result};
use base64::Engine;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use std::time::Duration;
use tracing::warn;

use crate::utils::retry::{self, RetryConfig};

/// OKX REST API base URL. The demo environment shares the host and is
/// selected per request via the `x-simulated-trading` header.
pub const OKX_REST_URL: &str = "https://www.okx.com";

/// Transport timeout per attempt
pub const OKX_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// Authentication
// =============================================================================

/// OKX API credentials
#[derive(Clone)]
pub struct OkxAuth {
    pub api_key: String,
    pub api_secret: String,
    pub passphrase: String,
    /// Demo-trading account. Does not change the host; requests carry
    /// `x-simulated-trading: 1`.
    pub simulated: bool,
}

impl OkxAuth {
    pub fn new(api_key: String, api_secret: String, passphrase: String) -> Self {
        Self {
            api_key,
            api_secret,
            passphrase,
            simulated: false,
        }
    }

    /// Credentials for a demo-trading account
    pub fn simulated(api_key: String, api_secret: String, passphrase: String) -> Self {
        Self {
            api_key,
            api_secret,
            passphrase,
            simulated: true,
        }
    }

    /// Reads `OKX_API_KEY`, `OKX_API_SECRET`, `OKX_PASSPHRASE`, and
    /// `OKX_TESTNET` from the environment.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OKX_API_KEY").context("OKX_API_KEY not set")?;
        let api_secret = std::env::var("OKX_API_SECRET").context("OKX_API_SECRET not set")?;
        let passphrase = std::env::var("OKX_PASSPHRASE").context("OKX_PASSPHRASE not set")?;
        let simulated = std::env::var("OKX_TESTNET")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Ok(Self {
            api_key,
            api_secret,
            passphrase,
            simulated,
        })
    }

    /// True when any credential is missing.
    pub fn is_incomplete(&self) -> bool {
        self.api_key.is_empty() || self.api_secret.is_empty() || self.passphrase.is_empty()
    }

    /// ISO 8601 UTC timestamp with millisecond precision, e.g.
    /// `2020-12-08T09:08:57.715Z`.
    pub fn timestamp() -> String {
        chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
    }

    /// Signs a request using HMAC-SHA256.
    ///
    /// Sign string format: timestamp + method + requestPath + body
    pub fn sign(&self, timestamp: &str, method: &str, request_path: &str, body: &str) -> String {
        let sign_str = format!("{timestamp}{method}{request_path}{body}");

        let mut mac = Hmac::<Sha256>::new_from_slice(self.api_secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(sign_str.as_bytes());

        base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
    }
}

// =============================================================================
// REST Client
// =============================================================================

/// Signed HTTP transport for the OKX REST API.
///
/// Serializes bodies to canonical JSON, signs every attempt with a fresh
/// timestamp, retries transient network faults with linear back-off, and
/// unwraps the `{code, msg, data}` envelope.
#[derive(Clone)]
pub struct OkxRestClient {
    client: Client,
    auth: OkxAuth,
    base_url: String,
    retry: RetryConfig,
}

impl OkxRestClient {
    pub fn new(auth: OkxAuth) -> Self {
        Self::with_config(
            auth,
            OKX_REST_URL.to_string(),
            OKX_REQUEST_TIMEOUT,
            RetryConfig::default(),
        )
    }

    /// Full control over base URL, timeout, and retry policy. Tests inject a
    /// stub server here.
    pub fn with_config(
        auth: OkxAuth,
        base_url: String,
        timeout: Duration,
        retry: RetryConfig,
    ) -> Self {
        let client = Client::builder()
            .pool_max_idle_per_host(10)
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            auth,
            base_url,
            retry,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET request; `path_and_query` carries the query string verbatim.
    /// Returns the envelope's `data` field.
    pub async fn get(&self, path_and_query: &str) -> Result<Value> {
        self.request(Method::GET, path_and_query, None).await
    }

    /// POST request with a JSON body. Returns the envelope's `data` field.
    pub async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<Value> {
        let body_str = serde_json::to_string(body).context("Failed to serialize request body")?;
        self.request(Method::POST, path, Some(body_str)).await
    }

    async fn request(&self, method: Method, path: &str, body: Option<String>) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let body_str = body.as_deref().unwrap_or("");
        let mut last_transient: Option<reqwest::Error> = None;

        for attempt in 1..=self.retry.max_attempts {
            // Each attempt gets a fresh timestamp and signature.
            let timestamp = OkxAuth::timestamp();
            let signature = self
                .auth
                .sign(&timestamp, method.as_str(), path, body_str);

            let mut request = self
                .client
                .request(method.clone(), &url)
                .header("Content-Type", "application/json")
                .header("OK-ACCESS-KEY", &self.auth.api_key)
                .header("OK-ACCESS-SIGN", signature)
                .header("OK-ACCESS-TIMESTAMP", &timestamp)
                .header("OK-ACCESS-PASSPHRASE", &self.auth.passphrase);
            if self.auth.simulated {
                request = request.header("x-simulated-trading", "1");
            }
            if let Some(ref b) = body {
                request = request.body(b.clone());
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(error) => {
                    if !is_transient_error(&error) {
                        return Err(anyhow::Error::new(error).context("HTTP request failed"));
                    }
                    if attempt < self.retry.max_attempts {
                        let delay = self.retry.delay_for(attempt);
                        warn!(
                            %url,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %error,
                            "transient transport error, retrying"
                        );
                        last_transient = Some(error);
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    last_transient = Some(error);
                    break;
                }
            };

            let status = response.status();
            let text = response
                .text()
                .await
                .context("Failed to read response body")?;

            if status != StatusCode::OK {
                if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(&text) {
                    if !envelope.code.is_empty() {
                        bail!("OKX API error [{}]: {}", envelope.code, envelope.msg);
                    }
                }
                bail!("HTTP error {}: {}", status.as_u16(), text);
            }

            let envelope: OkxResponse<Value> =
                serde_json::from_str(&text).context("Failed to parse OKX response")?;
            if envelope.code != "0" {
                bail!("OKX API error [{}]: {}", envelope.code, envelope.msg);
            }
            return Ok(envelope.data.unwrap_or(Value::Null));
        }

        let detail = last_transient
            .map(|error| error.to_string())
            .unwrap_or_else(|| "no attempts were made".to_string());
        bail!(
            "request failed after {} retries: {}",
            self.retry.max_attempts,
            detail
        )
    }
}

/// Transient-fault check spanning the whole error source chain.
fn is_transient_error(error: &reqwest::Error) -> bool {
    if error.is_timeout() {
        return true;
    }
    let mut text = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    retry::is_transient(&text)
}

// =============================================================================
// Response Types
// =============================================================================

/// OKX API response wrapper
#[derive(Debug, Deserialize)]
pub struct OkxResponse<T> {
    pub code: String,
    #[serde(default)]
    pub msg: String,
    pub data: Option<T>,
}

impl<T> OkxResponse<T> {
    pub fn is_ok(&self) -> bool {
        self.code == "0"
    }
}

/// Error body shape for non-200 responses
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    code: String,
    #[serde(default)]
    msg: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_is_iso8601_with_milliseconds() {
        let ts = OkxAuth::timestamp();
        // YYYY-MM-DDTHH:MM:SS.sssZ
        assert_eq!(ts.len(), 24, "unexpected length: {ts}");
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[10..11], "T");
        assert_eq!(&ts[19..20], ".");
        assert!(ts.ends_with('Z'));
        assert!(ts[20..23].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn signature_matches_known_vector() {
        let auth = OkxAuth::new(
            "key".to_string(),
            "SECRETKEY".to_string(),
            "phrase".to_string(),
        );
        let signature = auth.sign(
            "2020-12-08T09:08:57.715Z",
            "GET",
            "/api/v5/account/balance?ccy=USDT",
            "",
        );
        assert_eq!(signature, "6uziiD6K+Hch9GaIQZvT7Gu2nbTIzjkYXExkVzh2ZQc=");

        let signature = auth.sign(
            "2020-12-08T09:08:57.715Z",
            "POST",
            "/api/v5/trade/order",
            r#"{"instId":"BTC-USDT-SWAP","tdMode":"cross","side":"buy","ordType":"market","sz":"1"}"#,
        );
        assert_eq!(signature, "xVd0uIqNTIgeVC8a6qiF5puzXFZRHIpLnHr50N6o2As=");
    }

    #[test]
    fn signature_is_deterministic_and_input_sensitive() {
        let auth = OkxAuth::new("k".to_string(), "secret".to_string(), "p".to_string());
        let ts = "2024-01-02T03:04:05.678Z";
        let a = auth.sign(ts, "GET", "/api/v5/account/positions", "");
        let b = auth.sign(ts, "GET", "/api/v5/account/positions", "");
        assert_eq!(a, b);

        let other_path = auth.sign(ts, "GET", "/api/v5/account/positions?instType=SWAP", "");
        assert_ne!(a, other_path);
        let other_method = auth.sign(ts, "POST", "/api/v5/account/positions", "");
        assert_ne!(a, other_method);
    }

    #[test]
    fn envelope_success_detection() {
        let ok: OkxResponse<Value> =
            serde_json::from_str(r#"{"code":"0","msg":"","data":[]}"#).unwrap();
        assert!(ok.is_ok());

        let err: OkxResponse<Value> =
            serde_json::from_str(r#"{"code":"51000","msg":"param error","data":[]}"#).unwrap();
        assert!(!err.is_ok());
        assert_eq!(err.msg, "param error");
    }
}
