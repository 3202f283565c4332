//! API client for the Autopilot agent

use anyhow::{Context, Result};
use autopilot_lib::{
    orchestrator::{Investigation, QueryResponse, StatusReport},
    Forecast, HealthResponse,
};
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use url::Url;

/// Non-success response from the agent
#[derive(Debug, Error)]
#[error("API error ({status}): {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

/// Error body returned by the agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub text: String,
}

/// API client for the agent's HTTP surface
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Resolve `path` against the base URL with an optional comma-joined list parameter
    fn url(&self, path: &str, list: Option<(&str, &[String])>) -> Result<Url> {
        let mut url = self.base_url.join(path).context("Invalid path")?;
        if let Some((key, values)) = list {
            if !values.is_empty() {
                url.query_pairs_mut().append_pair(key, &values.join(","));
            }
        }
        Ok(url)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(ApiError { status, message }.into());
        }

        response.json().await.context("Failed to parse response")
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        Self::decode(response).await
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, url: Url, body: &B) -> Result<T> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        Self::decode(response).await
    }

    /// Component health; the agent answers 503 when unhealthy, which is still a report
    pub async fn health(&self) -> Result<HealthResponse> {
        let response = self
            .client
            .get(self.url("healthz", None)?)
            .send()
            .await
            .context("Failed to send request")?;

        if response.status() == StatusCode::SERVICE_UNAVAILABLE {
            return response.json().await.context("Failed to parse response");
        }
        Self::decode(response).await
    }

    pub async fn status(&self) -> Result<StatusReport> {
        self.get(self.url("api/v1/status", None)?).await
    }

    pub async fn metrics(&self, entities: &[String]) -> Result<BTreeMap<String, f64>> {
        self.get(self.url("api/v1/metrics", Some(("entities", entities)))?)
            .await
    }

    pub async fn predictions(&self, metrics: &[String]) -> Result<BTreeMap<String, Forecast>> {
        self.get(self.url("api/v1/predictions", Some(("metrics", metrics)))?)
            .await
    }

    pub async fn investigate(&self, entities: &[String]) -> Result<Investigation> {
        self.get(self.url("api/v1/investigate", Some(("entities", entities)))?)
            .await
    }

    pub async fn query(&self, text: &str) -> Result<QueryResponse> {
        let request = QueryRequest {
            text: text.to_string(),
        };
        self.post(self.url("api/v1/query", None)?, &request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_metrics_sends_entity_list() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/metrics")
            .match_query(Matcher::UrlEncoded(
                "entities".into(),
                "cpu,memory".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"cpu_usage": 42.5, "memory_usage": 61.0}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let metrics = client
            .metrics(&["cpu".to_string(), "memory".to_string()])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(metrics["cpu_usage"], 42.5);
        assert_eq!(metrics.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_list_sends_no_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/investigate")
            .match_query(Matcher::Missing)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"entities": [], "recent_anomalies": [], "recent_actions": [],
                    "root_cause_hypothesis": "No recent anomalies detected."}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let investigation = client.investigate(&[]).await.unwrap();

        mock.assert_async().await;
        assert!(investigation.recent_anomalies.is_empty());
    }

    #[tokio::test]
    async fn test_error_body_becomes_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1/query")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error": "query text must not be empty"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client.query(" ").await.unwrap_err();

        let api_error = err.downcast_ref::<ApiError>().unwrap();
        assert_eq!(api_error.status, StatusCode::BAD_REQUEST);
        assert_eq!(api_error.message, "query text must not be empty");
    }

    #[tokio::test]
    async fn test_unhealthy_health_is_still_decoded() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/healthz")
            .with_status(503)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"status": "unhealthy", "components": {"telemetry": {
                    "status": "unhealthy", "message": "timeout",
                    "consecutive_failures": 5, "last_check": "2024-01-01T00:00:00Z"}}}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let health = client.health().await.unwrap();

        assert_eq!(
            health.status,
            autopilot_lib::ComponentStatus::Unhealthy
        );
        assert_eq!(health.components["telemetry"].consecutive_failures, 5);
    }

    #[test]
    fn test_rejects_invalid_url() {
        assert!(ApiClient::new("not a url").is_err());
    }
}
