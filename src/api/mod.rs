//! Client side of the remote extraction/search service.

mod client;
pub mod types;

pub use client::ApiClient;
pub use types::{
    ExtractResponse, ExtractStatus, HealthResponse, JobPhase, NodeDetails, PollResponse,
    SearchResponse, SearchResult, StatusEnvelope, UploadFileStatus, UploadedFile,
};
