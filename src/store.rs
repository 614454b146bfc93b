//! Application state: one value, changed only by reducer events.
//!
//! [`reduce`] is a pure `(state, event) -> state` function. [`Store`] owns one
//! state behind a mutex so every mutation is serialised; tests can create as
//! many independent stores as they like.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use crate::api::{ExtractStatus, NodeDetails, UploadedFile};
use crate::graph::{
    compute_neighborhood, compute_study_path, filter_graph, EntityType, FilterSelection, Graph,
    Neighborhood, RelationshipType, StudyPath,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppPhase {
    #[default]
    Empty,
    Uploaded,
    Extracting,
    Ready,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadStatus {
    #[default]
    Idle,
    Uploading,
    Success,
    Error,
}

/// Local view of the extraction job; `Idle` when no job is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractionStatus {
    #[default]
    Idle,
    Queued,
    Processing,
    Complete,
    Error,
}

impl From<ExtractStatus> for ExtractionStatus {
    fn from(status: ExtractStatus) -> Self {
        match status {
            ExtractStatus::Queued => ExtractionStatus::Queued,
            ExtractStatus::Processing => ExtractionStatus::Processing,
            ExtractStatus::Complete => ExtractionStatus::Complete,
            ExtractStatus::Error => ExtractionStatus::Error,
        }
    }
}

/// Where the current graph came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GraphMode {
    #[default]
    Api,
    Demo,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub phase: AppPhase,
    pub files: Vec<UploadedFile>,
    pub upload_id: Option<String>,
    pub upload_status: UploadStatus,
    pub graph_id: Option<String>,
    pub extract_status: ExtractionStatus,
    pub extract_message: Option<String>,
    pub polling_enabled: bool,
    pub graph: Option<Arc<Graph>>,
    pub graph_mode: GraphMode,
    pub graph_error: Option<String>,
    pub selected_node_id: Option<String>,
    pub selected_edge_id: Option<String>,
    pub filters: FilterSelection,
    /// Whether study-path ids join the highlight sets.
    pub highlight_path: bool,
    pub node_details: Option<NodeDetails>,
    /// Issued on every node selection; only the matching details response lands.
    pub details_token: u64,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            phase: AppPhase::Empty,
            files: Vec::new(),
            upload_id: None,
            upload_status: UploadStatus::Idle,
            graph_id: None,
            extract_status: ExtractionStatus::Idle,
            extract_message: None,
            polling_enabled: false,
            graph: None,
            graph_mode: GraphMode::Api,
            graph_error: None,
            selected_node_id: None,
            selected_edge_id: None,
            filters: FilterSelection::default(),
            highlight_path: true,
            node_details: None,
            details_token: 0,
        }
    }
}

/// Ids the renderer should emphasise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Highlights {
    pub node_ids: BTreeSet<String>,
    pub edge_ids: BTreeSet<String>,
}

impl AppState {
    fn phase_from_files(&self) -> AppPhase {
        if self.files.is_empty() {
            AppPhase::Empty
        } else {
            AppPhase::Uploaded
        }
    }

    pub fn filtered_graph(&self) -> Option<Graph> {
        self.graph.as_deref().map(|g| filter_graph(g, &self.filters))
    }

    pub fn neighborhood(&self) -> Neighborhood {
        match self.filtered_graph() {
            Some(g) => compute_neighborhood(self.selected_node_id.as_deref(), &g),
            None => Neighborhood::default(),
        }
    }

    pub fn study_path(&self) -> StudyPath {
        match self.filtered_graph() {
            Some(g) => compute_study_path(&g, self.selected_node_id.as_deref()),
            None => StudyPath::default(),
        }
    }

    /// Neighborhood, plus the study path when `highlight_path` is on.
    pub fn highlights(&self) -> Highlights {
        let Some(graph) = self.filtered_graph() else {
            return Highlights::default();
        };
        let selected = self.selected_node_id.as_deref();
        let hood = compute_neighborhood(selected, &graph);
        let mut highlights = Highlights {
            node_ids: hood.node_ids,
            edge_ids: hood.edge_ids,
        };
        if self.highlight_path {
            let path = compute_study_path(&graph, selected);
            highlights.node_ids.extend(path.ordered_node_ids);
            highlights.edge_ids.extend(path.edge_ids);
        }
        highlights
    }

    /// True once a graph with at least one visible node is loaded.
    pub fn graph_ready(&self) -> bool {
        self.filtered_graph().map_or(false, |g| !g.is_empty())
    }

    /// Clear a selection that no longer exists in the filtered graph.
    fn enforce_selection(mut self) -> Self {
        let Some(filtered) = self.filtered_graph() else {
            return self;
        };
        if let Some(node_id) = &self.selected_node_id {
            if !filtered.contains_node(node_id) {
                log::debug!("selected node {} filtered out, clearing selection", node_id);
                self.selected_node_id = None;
                self.selected_edge_id = None;
                self.node_details = None;
            }
        }
        if let Some(edge_id) = &self.selected_edge_id {
            if filtered.edge(edge_id).is_none() {
                self.selected_edge_id = None;
            }
        }
        self
    }
}

#[derive(Debug, Clone)]
pub enum AppEvent {
    SetFiles(Vec<UploadedFile>),
    AddFiles(Vec<UploadedFile>),
    RemoveFile(String),
    ClearFiles,
    SetUploadStatus(UploadStatus),
    SetUploadId(Option<String>),
    SetGraphId(Option<String>),
    SetExtractStatus {
        status: ExtractionStatus,
        message: Option<String>,
    },
    StartPolling,
    StopPolling,
    SetGraphPayload {
        graph: Arc<Graph>,
        mode: GraphMode,
    },
    ClearGraph,
    SetGraphError(Option<String>),
    SelectNode(String),
    SelectEdge(String),
    ClearSelection,
    NodeDetailsLoaded {
        token: u64,
        details: NodeDetails,
    },
    SetEntityTypeFilters(BTreeSet<EntityType>),
    SetRelationshipTypeFilters(BTreeSet<RelationshipType>),
    SetHighlightPath(bool),
    Reset,
}

impl AppEvent {
    pub fn label(&self) -> &'static str {
        match self {
            AppEvent::SetFiles(_) => "set_files",
            AppEvent::AddFiles(_) => "add_files",
            AppEvent::RemoveFile(_) => "remove_file",
            AppEvent::ClearFiles => "clear_files",
            AppEvent::SetUploadStatus(_) => "set_upload_status",
            AppEvent::SetUploadId(_) => "set_upload_id",
            AppEvent::SetGraphId(_) => "set_graph_id",
            AppEvent::SetExtractStatus { .. } => "set_extract_status",
            AppEvent::StartPolling => "start_polling",
            AppEvent::StopPolling => "stop_polling",
            AppEvent::SetGraphPayload { .. } => "set_graph_payload",
            AppEvent::ClearGraph => "clear_graph",
            AppEvent::SetGraphError(_) => "set_graph_error",
            AppEvent::SelectNode(_) => "select_node",
            AppEvent::SelectEdge(_) => "select_edge",
            AppEvent::ClearSelection => "clear_selection",
            AppEvent::NodeDetailsLoaded { .. } => "node_details_loaded",
            AppEvent::SetEntityTypeFilters(_) => "set_entity_type_filters",
            AppEvent::SetRelationshipTypeFilters(_) => "set_relationship_type_filters",
            AppEvent::SetHighlightPath(_) => "set_highlight_path",
            AppEvent::Reset => "reset",
        }
    }
}

/// Pure state transition.
pub fn reduce(mut state: AppState, event: AppEvent) -> AppState {
    match event {
        AppEvent::SetFiles(files) => {
            state.files = files;
            state.phase = state.phase_from_files();
        }
        AppEvent::AddFiles(files) => {
            for file in files {
                if !state.files.iter().any(|f| f.id == file.id) {
                    state.files.push(file);
                }
            }
            state.phase = state.phase_from_files();
        }
        AppEvent::RemoveFile(file_id) => {
            state.files.retain(|f| f.id != file_id);
            state.phase = state.phase_from_files();
        }
        AppEvent::ClearFiles => {
            state.files.clear();
            state.upload_id = None;
            state.upload_status = UploadStatus::Idle;
            state.phase = AppPhase::Empty;
        }
        AppEvent::SetUploadStatus(status) => state.upload_status = status,
        AppEvent::SetUploadId(upload_id) => state.upload_id = upload_id,
        AppEvent::SetGraphId(graph_id) => state.graph_id = graph_id,
        AppEvent::SetExtractStatus { status, message } => {
            state.extract_status = status;
            state.extract_message = message;
            state.phase = match status {
                ExtractionStatus::Error => AppPhase::Error,
                ExtractionStatus::Complete => AppPhase::Ready,
                ExtractionStatus::Queued | ExtractionStatus::Processing => AppPhase::Extracting,
                ExtractionStatus::Idle => state.phase_from_files(),
            };
        }
        AppEvent::StartPolling => state.polling_enabled = true,
        AppEvent::StopPolling => state.polling_enabled = false,
        AppEvent::SetGraphPayload { graph, mode } => {
            state.graph = Some(graph);
            state.graph_mode = mode;
            state.graph_error = None;
            // Details belong to the previous graph; a reply still in flight is stale too
            state.node_details = None;
            state.details_token += 1;
            state.phase = AppPhase::Ready;
            state.extract_status = ExtractionStatus::Complete;
            return state.enforce_selection();
        }
        AppEvent::ClearGraph => {
            state.graph = None;
            state.graph_id = None;
            state.selected_node_id = None;
            state.selected_edge_id = None;
            state.node_details = None;
            state.extract_status = ExtractionStatus::Idle;
            state.extract_message = None;
            state.phase = state.phase_from_files();
        }
        AppEvent::SetGraphError(message) => {
            state.phase = if message.is_some() {
                AppPhase::Error
            } else {
                state.phase_from_files()
            };
            state.graph_error = message;
        }
        AppEvent::SelectNode(node_id) => {
            state.selected_node_id = Some(node_id);
            state.selected_edge_id = None;
            state.node_details = None;
            state.details_token += 1;
            return state.enforce_selection();
        }
        AppEvent::SelectEdge(edge_id) => {
            state.selected_node_id = None;
            state.selected_edge_id = Some(edge_id);
            state.node_details = None;
            return state.enforce_selection();
        }
        AppEvent::ClearSelection => {
            state.selected_node_id = None;
            state.selected_edge_id = None;
            state.node_details = None;
        }
        AppEvent::NodeDetailsLoaded { token, details } => {
            let current = token == state.details_token
                && state.selected_node_id.as_deref() == Some(details.node.id.as_str());
            if current {
                state.node_details = Some(details);
            } else {
                log::debug!(
                    "dropping stale node details for {} (token {}, current {})",
                    details.node.id,
                    token,
                    state.details_token
                );
            }
        }
        AppEvent::SetEntityTypeFilters(types) => {
            state.filters.entity_types = types;
            return state.enforce_selection();
        }
        AppEvent::SetRelationshipTypeFilters(types) => {
            state.filters.relationship_types = types;
            return state.enforce_selection();
        }
        AppEvent::SetHighlightPath(on) => state.highlight_path = on,
        AppEvent::Reset => return AppState::default(),
    }
    state
}

/// Mutex-guarded owner of one [`AppState`].
#[derive(Debug, Default)]
pub struct Store {
    state: Mutex<AppState>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: AppState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn dispatch(&self, event: AppEvent) {
        self.dispatch_with(event, |_| ());
    }

    /// Apply `event` and read the resulting state under the same lock.
    pub fn dispatch_with<R>(&self, event: AppEvent, read: impl FnOnce(&AppState) -> R) -> R {
        log::debug!("store event: {}", event.label());
        let mut guard = self.state.lock().unwrap();
        let current = std::mem::take(&mut *guard);
        *guard = reduce(current, event);
        read(&guard)
    }

    pub fn read<R>(&self, f: impl FnOnce(&AppState) -> R) -> R {
        f(&self.state.lock().unwrap())
    }

    pub fn snapshot(&self) -> AppState {
        self.state.lock().unwrap().clone()
    }
}
