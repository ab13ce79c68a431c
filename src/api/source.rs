//! The fetch seam between a polling controller and the network.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use super::client::InsightsClient;
use crate::error::FetchError;

/// A remote resource the controller polls.
///
/// The credential is passed in on every call; implementations must not read
/// it from ambient state.
#[async_trait]
pub trait DataSource<P>: Send + Sync {
    async fn fetch(&self, params: &P, token: Option<&str>)
        -> Result<serde_json::Value, FetchError>;
}

/// Supplies the bearer token at request time.
pub trait CredentialSource: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// A fixed token, or none at all.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(pub Option<String>);

impl CredentialSource for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        self.0.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Params go in the query string. Used for health/status resources.
    Get,
    /// Params go in a JSON body. Used for prediction resources.
    Post,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub method: Method,
    pub path: &'static str,
}

/// `DataSource` backed by one insight endpoint.
pub struct HttpSource {
    client: Arc<InsightsClient>,
    endpoint: Endpoint,
}

impl HttpSource {
    pub fn new(client: Arc<InsightsClient>, endpoint: Endpoint) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl<P> DataSource<P> for HttpSource
where
    P: Serialize + Send + Sync,
{
    async fn fetch(
        &self,
        params: &P,
        token: Option<&str>,
    ) -> Result<serde_json::Value, FetchError> {
        match self.endpoint.method {
            Method::Get => self.client.get_json(self.endpoint.path, params, token).await,
            Method::Post => self.client.post_json(self.endpoint.path, params, token).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::serve_once;
    use crate::types::ApiConfig;
    use serde_json::json;

    fn client(base_url: String) -> Arc<InsightsClient> {
        Arc::new(
            InsightsClient::new(&ApiConfig {
                base_url,
                token: None,
                request_timeout_secs: Some(5),
            })
            .unwrap(),
        )
    }

    #[derive(Serialize)]
    struct Params {
        scope: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        model: Option<&'static str>,
    }

    #[tokio::test]
    async fn test_post_sends_json_body_and_bearer_token() {
        let (base_url, request) = serve_once(200, r#"{"detectedAnomalies":0,"anomalies":[]}"#).await;
        let source = HttpSource::new(
            client(base_url),
            Endpoint {
                method: Method::Post,
                path: "ml/anomalies/detect",
            },
        );

        let params = Params {
            scope: "sales",
            model: None,
        };
        let value = source.fetch(&params, Some("t-1")).await.unwrap();
        assert_eq!(value, json!({ "detectedAnomalies": 0, "anomalies": [] }));

        let request = request.await.unwrap().unwrap();
        let lower = request.to_ascii_lowercase();
        assert!(request.starts_with("POST /api/ml/anomalies/detect "));
        assert!(lower.contains("authorization: bearer t-1"));
        assert!(request.ends_with(r#"{"scope":"sales"}"#));
    }

    #[tokio::test]
    async fn test_get_sends_params_as_query_without_token() {
        let (base_url, request) = serve_once(200, r#"{"status":"healthy"}"#).await;
        let source = HttpSource::new(
            client(base_url),
            Endpoint {
                method: Method::Get,
                path: "ml/health",
            },
        );

        let params = Params {
            scope: "all",
            model: Some("forecast"),
        };
        source.fetch(&params, None).await.unwrap();

        let request = request.await.unwrap().unwrap();
        assert!(request.starts_with("GET /api/ml/health?scope=all&model=forecast "));
        assert!(!request.to_ascii_lowercase().contains("authorization:"));
    }

    #[tokio::test]
    async fn test_server_error_message_is_extracted() {
        let (base_url, _request) = serve_once(503, r#"{"message":"Service unavailable"}"#).await;
        let source = HttpSource::new(
            client(base_url),
            Endpoint {
                method: Method::Post,
                path: "ml/forecast",
            },
        );

        let err = source
            .fetch(
                &Params {
                    scope: "sales",
                    model: None,
                },
                Some("t-1"),
            )
            .await
            .unwrap_err();
        match err {
            FetchError::Server { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message.as_deref(), Some("Service unavailable"));
            }
            other => panic!("expected server error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_host_is_a_network_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}/api", listener.local_addr().unwrap());
        drop(listener);

        let source = HttpSource::new(
            client(base_url),
            Endpoint {
                method: Method::Get,
                path: "ml/health",
            },
        );
        let err = source
            .fetch(
                &Params {
                    scope: "all",
                    model: None,
                },
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Network(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_static_token() {
        assert_eq!(
            StaticToken(Some("abc".to_string())).bearer_token().as_deref(),
            Some("abc")
        );
        assert_eq!(StaticToken::default().bearer_token(), None);
    }
}
