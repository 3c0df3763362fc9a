//! Code-for-token exchange through the trusted intermediary.
//!
//! The intermediary owns the confidential half of the exchange. This client
//! only posts `{"code": "..."}` to it and interprets the JSON answer. The
//! [`TokenExchanger`] trait is the seam the controller depends on, so tests
//! and alternative transports can stand in for the HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::error::{AuthFlowError, Result};

/// Upper bound on a single exchange or health request.
const REQUEST_TIMEOUT_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ExchangeRequest<'a> {
    code: &'a str,
}

/// A successful exchange result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
    /// The issued access token.
    pub access_token: String,

    /// Every other field the intermediary returned.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

impl TokenResponse {
    /// Interpret a raw response body.
    ///
    /// # Errors
    ///
    /// [`AuthFlowError::InvalidResponseBody`] when the body is not JSON,
    /// [`AuthFlowError::MissingAccessToken`] when it is JSON but has no
    /// non-empty string `access_token`.
    pub fn from_body(body: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(body).map_err(|e| AuthFlowError::InvalidResponseBody {
                reason: e.to_string(),
            })?;

        let Value::Object(mut fields) = value else {
            return Err(AuthFlowError::MissingAccessToken);
        };

        match fields.remove("access_token") {
            Some(Value::String(token)) if !token.is_empty() => Ok(Self {
                access_token: token,
                extra: fields,
            }),
            _ => Err(AuthFlowError::MissingAccessToken),
        }
    }
}

// ---------------------------------------------------------------------------
// Exchanger seam
// ---------------------------------------------------------------------------

/// Turns an authorization code into a token.
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    /// Exchange `code` for a token.
    async fn exchange(&self, code: &str) -> Result<TokenResponse>;
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

/// HTTP client for the intermediary's `/exchange-token` and `/health`.
pub struct TokenExchangeClient {
    exchange_url: Url,
    health_url: Url,
    client: reqwest::Client,
}

impl TokenExchangeClient {
    /// Create a client posting to `exchange_endpoint`.
    ///
    /// The health URL is `health` resolved against the exchange endpoint,
    /// so `http://host:3001/exchange-token` checks `http://host:3001/health`.
    ///
    /// # Errors
    ///
    /// [`AuthFlowError::UrlParse`] for a malformed endpoint and
    /// [`AuthFlowError::NetworkError`] if the HTTP client cannot be built.
    pub fn new(exchange_endpoint: &str) -> Result<Self> {
        let exchange_url = Url::parse(exchange_endpoint)?;
        let health_url = exchange_url.join("health")?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            exchange_url,
            health_url,
            client,
        })
    }

    pub fn exchange_url(&self) -> &Url {
        &self.exchange_url
    }

    pub fn health_url(&self) -> &Url {
        &self.health_url
    }

    /// Check the intermediary's liveness endpoint.
    ///
    /// Returns `Ok(true)` only for a success status whose JSON body has
    /// `"status": "OK"`.
    ///
    /// # Errors
    ///
    /// [`AuthFlowError::NetworkError`] if the request cannot be sent.
    pub async fn health(&self) -> Result<bool> {
        let response = self.client.get(self.health_url.clone()).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "health check returned non-success status");
            return Ok(false);
        }

        Ok(serde_json::from_str::<HealthResponse>(&body)
            .map(|health| health.status == "OK")
            .unwrap_or(false))
    }
}

#[async_trait]
impl TokenExchanger for TokenExchangeClient {
    async fn exchange(&self, code: &str) -> Result<TokenResponse> {
        tracing::debug!(
            endpoint = %self.exchange_url,
            code_len = code.len(),
            "exchanging authorization code"
        );

        let response = self
            .client
            .post(self.exchange_url.clone())
            .json(&ExchangeRequest { code })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(AuthFlowError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let token = TokenResponse::from_body(&body)?;
        tracing::debug!("token exchange successful");
        Ok(token)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
