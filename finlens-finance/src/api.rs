//! HTTP client for the consent/transactions backend.
//!
//! The backend fronts the account-aggregator service. Consent calls need the
//! bearer token from `login`; transaction fetches do not.

use std::time::Duration;

use async_trait::async_trait;
use finlens_core::Transaction;
use finlens_ingest::Normalizer;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::consent_flow::ConsentRequest;
use crate::error::{ApiError, ApiResult};

/// What the backend returns for a new consent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsentCreated {
    pub id: String,
    /// Authorization page the user must visit
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Consent operations of the backend
#[async_trait]
pub trait ConsentApi: Send + Sync {
    async fn create_consent(
        &self,
        token: Option<&str>,
        request: &ConsentRequest,
    ) -> ApiResult<ConsentCreated>;

    /// Current status payload for a consent: `status`, `vua`, `accountsLinked`, ...
    async fn consent_status(&self, token: Option<&str>, id: &str) -> ApiResult<Map<String, Value>>;
}

/// Anything that can produce one consent's normalized transactions
#[async_trait]
pub trait TransactionSource: Send + Sync {
    async fn fetch_transactions(&self, consent_id: &str) -> ApiResult<Vec<Transaction>>;
}

#[derive(Clone)]
pub struct BackendClient {
    http: Client,
    base_url: String,
    normalizer: Normalizer,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            normalizer: Normalizer::default(),
        }
    }

    /// Client whose requests give up after `timeout`
    pub fn with_timeout(base_url: &str, timeout: Duration) -> ApiResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ApiError::Http {
                operation: "client setup",
                source,
            })?;
        Ok(Self {
            http,
            ..Self::new(base_url)
        })
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Obtain a bearer token. The backend answers `{token}`, `{accessToken}`, or a
    /// bare JSON string.
    pub async fn login(&self) -> ApiResult<String> {
        const OP: &str = "login";
        let resp = self
            .http
            .post(format!("{}/auth/login", self.base_url))
            .send()
            .await
            .map_err(|source| ApiError::Http { operation: OP, source })?;
        let body: Value = read_json(resp, OP).await?;
        token_from(&body).ok_or_else(|| ApiError::InvalidResponse {
            operation: OP,
            message: "no token in response".to_string(),
        })
    }

    /// Fetch and normalize one consent's transactions
    pub async fn transactions(&self, consent_id: &str) -> ApiResult<Vec<Transaction>> {
        const OP: &str = "transaction fetch";
        debug!(consent_id, "fetching transactions");
        let resp = self
            .http
            .get(format!("{}/transactions/{}", self.base_url, consent_id))
            .send()
            .await
            .map_err(|source| ApiError::Http { operation: OP, source })?;
        let payload: Value = read_json(resp, OP).await?;
        Ok(self.normalizer.normalize_payload(&payload))
    }
}

#[async_trait]
impl ConsentApi for BackendClient {
    async fn create_consent(
        &self,
        token: Option<&str>,
        request: &ConsentRequest,
    ) -> ApiResult<ConsentCreated> {
        const OP: &str = "consent creation";
        let token = require_token(token)?;
        let resp = self
            .http
            .post(format!("{}/consent", self.base_url))
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .json(request)
            .send()
            .await
            .map_err(|source| ApiError::Http { operation: OP, source })?;
        read_json(resp, OP).await
    }

    async fn consent_status(&self, token: Option<&str>, id: &str) -> ApiResult<Map<String, Value>> {
        const OP: &str = "consent status";
        let token = require_token(token)?;
        let resp = self
            .http
            .get(format!("{}/consent/{}/status", self.base_url, id))
            .query(&[("expanded", "false")])
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .send()
            .await
            .map_err(|source| ApiError::Http { operation: OP, source })?;
        match read_json::<Value>(resp, OP).await? {
            Value::Object(map) => Ok(map),
            other => Err(ApiError::InvalidResponse {
                operation: OP,
                message: format!("expected an object, got {other}"),
            }),
        }
    }
}

#[async_trait]
impl TransactionSource for BackendClient {
    async fn fetch_transactions(&self, consent_id: &str) -> ApiResult<Vec<Transaction>> {
        self.transactions(consent_id).await
    }
}

/// Fail fast when there is no usable token
pub fn require_token(token: Option<&str>) -> ApiResult<&str> {
    match token.map(str::trim) {
        Some(t) if !t.is_empty() => Ok(t),
        _ => Err(ApiError::AuthenticationRequired),
    }
}

fn token_from(body: &Value) -> Option<String> {
    let token = match body {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => ["token", "accessToken"]
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_str)),
        _ => None,
    }?;
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

async fn read_json<T: DeserializeOwned>(resp: Response, operation: &'static str) -> ApiResult<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ApiError::Status {
            operation,
            status,
            body,
        });
    }
    let text = resp
        .text()
        .await
        .map_err(|source| ApiError::Http { operation, source })?;
    serde_json::from_str(&text).map_err(|e| ApiError::InvalidResponse {
        operation,
        message: e.to_string(),
    })
}
