//! Session controller: drives the store from user actions and remote replies.
//!
//! Owns the API client, the shared [`Store`], and at most one extraction
//! [`Poller`]. Dropping the session stops the poller.

use std::sync::{Arc, Mutex};

use crate::api::{ApiClient, JobPhase, PollResponse, SearchResult};
use crate::config::Config;
use crate::error::{KgError, Result};
use crate::graph::demo::{demo_graph, local_search, node_details_from_graph};
use crate::poller::{Poller, PollerOptions};
use crate::store::{AppEvent, ExtractionStatus, GraphMode, Store};

pub struct Session {
    config: Config,
    client: ApiClient,
    store: Arc<Store>,
    poller: Mutex<Option<Poller<PollResponse>>>,
}

impl Session {
    pub fn new(config: Config) -> Result<Self> {
        let client = ApiClient::from_config(&config)?;
        Ok(Self::with_client(config, client, Arc::new(Store::new())))
    }

    pub fn with_client(config: Config, client: ApiClient, store: Arc<Store>) -> Self {
        Self {
            config,
            client,
            store,
            poller: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn is_polling(&self) -> bool {
        self.poller
            .lock()
            .unwrap()
            .as_ref()
            .map_or(false, |p| p.is_running())
    }

    /// Submit the current upload for extraction and start polling for the graph.
    ///
    /// Returns the graph id assigned by the service.
    pub async fn build_graph(&self) -> Result<String> {
        let upload_id = self
            .store
            .read(|s| s.upload_id.clone())
            .ok_or_else(|| KgError::InvalidInput("Upload at least one file first.".to_string()))?;

        self.store.dispatch(AppEvent::SetExtractStatus {
            status: ExtractionStatus::Queued,
            message: Some("Starting extraction...".to_string()),
        });

        let response = match self.client.submit_extraction(&upload_id).await {
            Ok(r) => r,
            Err(e) => {
                log::error!("extraction request for upload {} failed: {}", upload_id, e);
                self.store.dispatch(AppEvent::SetExtractStatus {
                    status: ExtractionStatus::Error,
                    message: Some(e.to_string()),
                });
                return Err(e);
            }
        };

        let graph_id = response.graph_id.clone();
        self.store.dispatch(AppEvent::SetGraphId(Some(graph_id.clone())));
        log::info!(
            "extraction job {} accepted ({})",
            graph_id,
            response.status.as_str()
        );

        let poller = self.extraction_poller(graph_id.clone());
        self.store.dispatch(AppEvent::StartPolling);
        poller.start();
        // Replacing drops (and so stops) any previous job's poller
        *self.poller.lock().unwrap() = Some(poller);

        Ok(graph_id)
    }

    fn extraction_poller(&self, graph_id: String) -> Poller<PollResponse> {
        let client = self.client.clone();
        let data_store = self.store.clone();
        let error_store = self.store.clone();

        Poller::new(
            PollerOptions::new(self.config.poll_interval(), move || {
                let client = client.clone();
                let graph_id = graph_id.clone();
                async move { client.poll_graph(&graph_id).await }
            })
            .on_data(move |response: &PollResponse| apply_poll_response(&data_store, response))
            .should_stop(PollResponse::is_terminal)
            .on_error(move |message: &str| {
                error_store.dispatch(AppEvent::SetExtractStatus {
                    status: ExtractionStatus::Error,
                    message: Some(message.to_string()),
                });
                error_store.dispatch(AppEvent::StopPolling);
            }),
        )
    }

    /// Stop tracking the running job. Late replies are discarded.
    pub fn cancel_extraction(&self) {
        self.stop_polling();
        self.store.dispatch(AppEvent::SetExtractStatus {
            status: ExtractionStatus::Idle,
            message: Some("Extraction cancelled.".to_string()),
        });
    }

    fn stop_polling(&self) {
        if let Some(poller) = self.poller.lock().unwrap().take() {
            poller.stop();
        }
        self.store.dispatch(AppEvent::StopPolling);
    }

    /// Show the bundled biology graph without contacting the service.
    pub fn load_demo(&self) {
        self.stop_polling();
        let graph = demo_graph();
        let graph_id = graph.graph_id.clone();
        self.store.dispatch(AppEvent::SetGraphPayload {
            graph: Arc::new(graph),
            mode: GraphMode::Demo,
        });
        self.store.dispatch(AppEvent::SetGraphId(Some(graph_id)));
        self.store.dispatch(AppEvent::SetExtractStatus {
            status: ExtractionStatus::Complete,
            message: Some("Loaded local demo graph.".to_string()),
        });
        log::info!("demo graph loaded");
    }

    /// Select a node and load its details.
    ///
    /// Returns a warning when the details could not be fetched; the selection
    /// itself still stands. Only the most recent selection's reply is applied.
    pub async fn select_node(&self, node_id: &str) -> Option<String> {
        let (token, still_selected, mode, graph_id, graph) = self.store.dispatch_with(
            AppEvent::SelectNode(node_id.to_string()),
            |s| {
                (
                    s.details_token,
                    s.selected_node_id.is_some(),
                    s.graph_mode,
                    s.graph_id.clone(),
                    s.graph.clone(),
                )
            },
        );

        if !still_selected {
            return None;
        }
        let graph = graph?;

        let result = match mode {
            GraphMode::Demo => node_details_from_graph(&graph, node_id)
                .ok_or_else(|| KgError::NodeNotFound(node_id.to_string())),
            GraphMode::Api => {
                let graph_id = graph_id?;
                self.client.node_details(&graph_id, node_id).await
            }
        };

        match result {
            Ok(details) => {
                self.store
                    .dispatch(AppEvent::NodeDetailsLoaded { token, details });
                None
            }
            Err(e) => {
                if self.store.read(|s| s.details_token) != token {
                    return None;
                }
                log::warn!("failed loading details for node {}: {}", node_id, e);
                Some(e.to_string())
            }
        }
    }

    pub fn select_edge(&self, edge_id: &str) {
        self.store.dispatch(AppEvent::SelectEdge(edge_id.to_string()));
    }

    pub fn clear_selection(&self) {
        self.store.dispatch(AppEvent::ClearSelection);
    }

    /// Node search. Queries shorter than the configured minimum return nothing
    /// without contacting the service; failures also yield no results.
    pub async fn search(&self, query: &str) -> Vec<SearchResult> {
        let query = query.trim();
        if query.chars().count() < self.config.search.min_query_len {
            return Vec::new();
        }
        let limit = self.config.search.max_results;

        let (mode, graph_id, graph) =
            self.store
                .read(|s| (s.graph_mode, s.graph_id.clone(), s.graph.clone()));

        match mode {
            GraphMode::Demo => match graph {
                Some(g) => local_search(&g, query, limit),
                None => local_search(&demo_graph(), query, limit),
            },
            GraphMode::Api => {
                let Some(graph_id) = graph_id else {
                    return Vec::new();
                };
                match self.client.search(&graph_id, query).await {
                    Ok(response) => {
                        let mut results = response.results;
                        results.truncate(limit);
                        results
                    }
                    Err(e) => {
                        log::warn!("search for {:?} failed: {}", query, e);
                        Vec::new()
                    }
                }
            }
        }
    }

    /// Whether the remote service answers its health check.
    pub async fn check_health(&self) -> bool {
        match self.client.health().await {
            Ok(health) => health.api_reachable,
            Err(e) => {
                log::warn!("health check failed ({}): {}", e.kind(), e);
                false
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Ok(mut poller) = self.poller.lock() {
            if let Some(poller) = poller.take() {
                poller.stop();
            }
        }
    }
}

/// Fold one poll reply into the store.
fn apply_poll_response(store: &Store, response: &PollResponse) {
    match response {
        PollResponse::Graph(graph) => {
            log::info!(
                "graph {} ready: {} nodes, {} edges",
                graph.graph_id,
                graph.nodes.len(),
                graph.edges.len()
            );
            store.dispatch(AppEvent::SetGraphPayload {
                graph: Arc::new(graph.clone()),
                mode: GraphMode::Api,
            });
            store.dispatch(AppEvent::SetExtractStatus {
                status: ExtractionStatus::Complete,
                message: Some("Knowledge graph ready.".to_string()),
            });
            store.dispatch(AppEvent::StopPolling);
        }
        PollResponse::Status(envelope) => match envelope.phase() {
            JobPhase::InProgress(status) => {
                store.dispatch(AppEvent::SetExtractStatus {
                    status: status.into(),
                    message: Some(
                        envelope
                            .message
                            .clone()
                            .unwrap_or_else(|| "Extraction in progress".to_string()),
                    ),
                });
            }
            JobPhase::Failed => {
                let message = envelope
                    .message
                    .clone()
                    .unwrap_or_else(|| format!("Extraction ended with status {:?}", envelope.status));
                log::error!("{}", KgError::Extraction(message.clone()));
                store.dispatch(AppEvent::SetExtractStatus {
                    status: ExtractionStatus::Error,
                    message: Some(message),
                });
                store.dispatch(AppEvent::StopPolling);
            }
        },
    }
}
