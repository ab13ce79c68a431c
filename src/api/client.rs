//! JSON client for the trade-promotion insight API.
//!
//! Uses reqwest with Bearer token auth. Paths are joined onto the configured
//! base URL; the token is supplied by the caller on every request.

use std::time::Duration;

use serde::Serialize;
use url::Url;

use crate::error::{ConfigError, FetchError};
use crate::types::ApiConfig;

pub struct InsightsClient {
    client: reqwest::Client,
    base_url: Url,
}

impl InsightsClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ConfigError> {
        let base_url = parse_base_url(&config.base_url)?;

        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs.filter(|s| *s > 0) {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `GET <base>/<path>?<query>`
    pub async fn get_json<Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
        token: Option<&str>,
    ) -> Result<serde_json::Value, FetchError> {
        let url = self.endpoint_url(path)?;
        let request = self.client.get(url).query(query);
        self.send(request, token).await
    }

    /// `POST <base>/<path>` with a JSON body
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        token: Option<&str>,
    ) -> Result<serde_json::Value, FetchError> {
        let url = self.endpoint_url(path)?;
        let request = self.client.post(url).json(body);
        self.send(request, token).await
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        token: Option<&str>,
    ) -> Result<serde_json::Value, FetchError> {
        let request = match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let resp = request.send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(FetchError::Server {
                status,
                message: server_message(&text),
            });
        }

        let text = resp.text().await?;
        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| FetchError::Decode(e.to_string()))
    }

    pub(crate) fn endpoint_url(&self, path: &str) -> Result<Url, FetchError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| FetchError::Network(format!("Invalid endpoint path '{}': {}", path, e)))
    }
}

/// Parse the base URL, ensuring a trailing slash so relative joins append
/// rather than replace the last segment.
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let with_slash = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{}/", raw)
    };

    Url::parse(&with_slash).map_err(|e| ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Extract `{"message": "..."}` from an error body, if present.
pub(crate) fn server_message(body: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    json.get("message")
        .and_then(|m| m.as_str())
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}
