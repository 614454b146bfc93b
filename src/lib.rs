pub mod api;
pub mod config;
pub mod error;
pub mod graph;
pub mod poller;
pub mod session;
pub mod store;

pub use config::Config;
pub use error::{KgError, Result};
pub use graph::{
    compute_neighborhood, compute_study_path, filter_graph, Edge, EntityType, FilterSelection,
    Graph, Neighborhood, Node, RelationshipType, StudyPath,
};
pub use poller::{PollStatus, Poller, PollerOptions};
pub use session::Session;
pub use store::{AppEvent, AppState, Store};
