use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use url::Url;

use crate::api::types::*;
use crate::config::Config;
use crate::error::{KgError, Result};

/// HTTP client for the remote extraction/search service
///
/// Every call is bounded by the configured timeout. 2xx bodies (including the
/// service's `202 Accepted` job-status replies) are decoded; anything else is
/// surfaced as [`KgError::Http`] with the response text.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a client rooted at `base_url` (e.g. `http://127.0.0.1:8000`)
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| KgError::Config(format!("invalid base url {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(KgError::Config(format!("base url cannot be a base: {}", base_url)));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KgError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.api.base_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Submit an extraction job for a finished upload.
    pub async fn submit_extraction(&self, upload_id: &str) -> Result<ExtractResponse> {
        let url = self.endpoint(&["api", "extract"])?;
        log::info!("Submitting extraction for upload {}", upload_id);
        let request = ExtractRequest {
            upload_id: upload_id.to_string(),
        };
        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(KgError::from)?;
        decode(read_body(response).await?)
    }

    /// Fetch the graph, or the job status while extraction is still running.
    pub async fn poll_graph(&self, graph_id: &str) -> Result<PollResponse> {
        let url = self.endpoint(&["api", "graph", graph_id])?;
        let value: Value = self.get_json(url).await?;
        PollResponse::from_value(value)
    }

    pub async fn node_details(&self, graph_id: &str, node_id: &str) -> Result<NodeDetails> {
        let url = self.endpoint(&["api", "node", graph_id, node_id])?;
        self.get_json(url).await
    }

    pub async fn search(&self, graph_id: &str, query: &str) -> Result<SearchResponse> {
        let mut url = self.endpoint(&["api", "search", graph_id])?;
        url.query_pairs_mut().append_pair("q", query);
        self.get_json(url).await
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        let url = self.endpoint(&["api", "health"])?;
        self.get_json(url).await
    }

    /// Append percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| KgError::Config(format!("base url cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        log::debug!("GET {}", url);
        let response = self.client.get(url).send().await.map_err(KgError::from)?;
        decode(read_body(response).await?)
    }
}

/// Read the body, turning non-2xx statuses into `KgError::Http`.
async fn read_body(response: reqwest::Response) -> Result<String> {
    let status = response.status();
    let body = response.text().await.map_err(KgError::from)?;

    if !status.is_success() {
        log::warn!("Remote service returned {}: {}", status, body);
        return Err(KgError::Http {
            status: status.as_u16(),
            body,
        });
    }

    Ok(body)
}

fn decode<T: DeserializeOwned>(body: String) -> Result<T> {
    serde_json::from_str(&body)
        .map_err(|e| KgError::Parse(format!("Failed to parse JSON response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::stub::StubService;
    use crate::graph::EntityType;
    use serde_json::json;

    fn client_for(stub: &StubService) -> ApiClient {
        ApiClient::new(&stub.base_url, Duration::from_millis(500)).unwrap()
    }

    #[test]
    fn test_endpoint_escapes_segments() {
        let client = ApiClient::new("http://localhost:8000/", Duration::from_secs(1)).unwrap();
        let url = client.endpoint(&["api", "node", "g 1", "a/b"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/node/g%201/a%2Fb");
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let client = ApiClient::new("http://localhost:8000/proxy", Duration::from_secs(1)).unwrap();
        let url = client.endpoint(&["api", "health"]).unwrap();
        assert_eq!(url.path(), "/proxy/api/health");
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(matches!(
            ApiClient::new("not a url", Duration::from_secs(1)),
            Err(KgError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_submit_extraction() {
        let stub = StubService::spawn().await;
        let response = client_for(&stub).submit_extraction("up-1").await.unwrap();
        assert_eq!(response.graph_id, "g-stub");
        assert_eq!(response.status, ExtractStatus::Queued);
        assert_eq!(stub.state.last_upload_id().as_deref(), Some("up-1"));
    }

    #[tokio::test]
    async fn test_poll_accepted_status_then_graph() {
        let stub = StubService::spawn().await;
        stub.state.script_polls(vec![
            (202, json!({"status": "processing", "message": "working"})),
            (200, serde_json::to_value(crate::graph::demo::demo_graph()).unwrap()),
        ]);
        let client = client_for(&stub);

        let first = client.poll_graph("g-stub").await.unwrap();
        assert!(matches!(first, PollResponse::Status(_)));
        let second = client.poll_graph("g-stub").await.unwrap();
        match second {
            PollResponse::Graph(g) => assert_eq!(g.nodes.len(), 12),
            other => panic!("expected graph, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_http_error_carries_status() {
        let stub = StubService::spawn().await;
        stub.state
            .script_polls(vec![(404, json!({"detail": "graph_id not found"}))]);
        let err = client_for(&stub).poll_graph("missing").await.unwrap_err();
        match err {
            KgError::Http { status, body } => {
                assert_eq!(status, 404);
                assert!(body.contains("graph_id not found"));
            }
            other => panic!("expected http error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_maps_to_timeout() {
        let stub = StubService::spawn().await;
        stub.state.set_poll_delay_ms(2_000);
        let client = ApiClient::new(&stub.base_url, Duration::from_millis(100)).unwrap();
        let err = client.poll_graph("g-stub").await.unwrap_err();
        assert!(matches!(err, KgError::Timeout), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_unreachable_is_network_error() {
        // Bind then drop to get a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = ApiClient::new(&format!("http://{}", addr), Duration::from_millis(500)).unwrap();
        let err = client.health().await.unwrap_err();
        assert_eq!(err.kind(), "network");
    }

    #[tokio::test]
    async fn test_node_details_and_search() {
        let stub = StubService::spawn().await;
        let client = client_for(&stub);

        let details = client.node_details("g-stub", "n5").await.unwrap();
        assert_eq!(details.node.name, "Light-Dependent Reactions");
        assert_eq!(details.inbound.len(), 2);

        let results = client.search("g-stub", "chloro").await.unwrap();
        assert_eq!(results.query, "chloro");
        assert_eq!(results.results.len(), 2);
        assert!(results.results.iter().all(|r| matches!(
            r.entity_type,
            EntityType::Molecule | EntityType::Structure
        )));
    }

    #[tokio::test]
    async fn test_health() {
        let stub = StubService::spawn().await;
        let health = client_for(&stub).health().await.unwrap();
        assert_eq!(health.status, "ok");
        assert!(health.api_reachable);
    }
}
