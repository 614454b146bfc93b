use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{KgError, Result};
use crate::graph::{Edge, EntityType, Graph, Node};

/// Extraction job status as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractStatus {
    Queued,
    Processing,
    Complete,
    Error,
}

impl ExtractStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractStatus::Queued => "queued",
            ExtractStatus::Processing => "processing",
            ExtractStatus::Complete => "complete",
            ExtractStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractRequest {
    pub upload_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractResponse {
    pub graph_id: String,
    pub status: ExtractStatus,
    #[serde(default)]
    pub message: Option<String>,
}

/// Non-graph poll body. `status` stays a raw string: anything the client does
/// not recognise as in-progress is a terminal error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEnvelope {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub graph_id: Option<String>,
}

/// Where a polled job stands according to a status envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    InProgress(ExtractStatus),
    Failed,
}

impl StatusEnvelope {
    pub fn phase(&self) -> JobPhase {
        match self.status.as_str() {
            "queued" => JobPhase::InProgress(ExtractStatus::Queued),
            "processing" => JobPhase::InProgress(ExtractStatus::Processing),
            _ => JobPhase::Failed,
        }
    }
}

/// Body of a graph poll: either the finished graph or a job status.
#[derive(Debug, Clone, PartialEq)]
pub enum PollResponse {
    Graph(Graph),
    Status(StatusEnvelope),
}

impl PollResponse {
    /// A body is a graph iff it has array-valued `nodes` and `edges`.
    /// A body shaped like a graph that fails to decode as one is a parse error,
    /// not a status envelope.
    pub fn from_value(value: Value) -> Result<Self> {
        let is_graph = value.get("nodes").map_or(false, Value::is_array)
            && value.get("edges").map_or(false, Value::is_array);

        if is_graph {
            let graph = serde_json::from_value(value)
                .map_err(|e| KgError::Parse(format!("malformed graph payload: {}", e)))?;
            return Ok(PollResponse::Graph(graph));
        }

        if !value.is_object() {
            return Err(KgError::Parse(format!(
                "expected graph or status object, got {}",
                value
            )));
        }

        let envelope = serde_json::from_value(value)
            .map_err(|e| KgError::Parse(format!("malformed status payload: {}", e)))?;
        Ok(PollResponse::Status(envelope))
    }

    /// Polling ends on a graph or on any status that is not in progress.
    pub fn is_terminal(&self) -> bool {
        match self {
            PollResponse::Graph(_) => true,
            PollResponse::Status(envelope) => envelope.phase() == JobPhase::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDetails {
    pub node: Node,
    #[serde(default)]
    pub inbound: Vec<Edge>,
    #[serde(default)]
    pub outbound: Vec<Edge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub name: String,
    pub entity_type: EntityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub graph_id: String,
    pub query: String,
    #[serde(default)]
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(rename = "apiReachable", alias = "api_reachable", default)]
    pub api_reachable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadFileStatus {
    Accepted,
    Rejected,
}

/// File bookkeeping from an upload result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<UploadFileStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
