//! Knowledge graph model and pure graph transforms.
//!
//! A [`Graph`] is an immutable snapshot received from the extraction service
//! (or the built-in demo fixture). Every transform in this module takes a
//! borrowed graph and returns fresh values; nothing here mutates its input.

mod adjacency;
pub mod demo;
mod filter;
mod study_path;

pub use adjacency::{build_adjacency, compute_neighborhood, Adjacency, Neighborhood};
pub use filter::{filter_graph, FilterSelection};
pub use study_path::{compute_study_path, StudyPath, CYCLE_WARNING};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::KgError;

/// Closed set of entity tags assigned by the extraction service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityType {
    Concept,
    Process,
    Structure,
    Molecule,
    Outcome,
}

impl EntityType {
    pub const ALL: [EntityType; 5] = [
        EntityType::Concept,
        EntityType::Process,
        EntityType::Structure,
        EntityType::Molecule,
        EntityType::Outcome,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Concept => "Concept",
            EntityType::Process => "Process",
            EntityType::Structure => "Structure",
            EntityType::Molecule => "Molecule",
            EntityType::Outcome => "Outcome",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = KgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| KgError::InvalidInput(format!("unknown entity type: {}", s)))
    }
}

/// Closed set of relationship tags. Direction is source -> target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    /// Source must be understood before target.
    PrerequisiteOf,
    PartOf,
    Enables,
    Causes,
    RelatedTo,
}

impl RelationshipType {
    pub const ALL: [RelationshipType; 5] = [
        RelationshipType::PrerequisiteOf,
        RelationshipType::PartOf,
        RelationshipType::Enables,
        RelationshipType::Causes,
        RelationshipType::RelatedTo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::PrerequisiteOf => "prerequisite_of",
            RelationshipType::PartOf => "part_of",
            RelationshipType::Enables => "enables",
            RelationshipType::Causes => "causes",
            RelationshipType::RelatedTo => "related_to",
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipType {
    type Err = KgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RelationshipType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| KgError::InvalidInput(format!("unknown relationship type: {}", s)))
    }
}

/// Provenance for a node or edge: where in the uploaded material it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceReference {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

/// A concept/entity vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub entity_type: EntityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// 0.0-1.0 when the extractor reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceReference>,
}

/// A directed, typed relationship between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub relationship_type: RelationshipType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceReference>,
}

/// Aggregate counts per tag, keyed by the tag's wire label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    #[serde(default)]
    pub entity_type_count: BTreeMap<String, usize>,
    #[serde(default)]
    pub relationship_type_count: BTreeMap<String, usize>,
}

/// Immutable graph snapshot as delivered by the extraction service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub graph_id: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<GraphStats>,
}

impl Graph {
    pub fn empty(graph_id: impl Into<String>) -> Self {
        Self {
            graph_id: graph_id.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
            stats: None,
        }
    }

    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == node_id)
    }

    pub fn contains_node(&self, node_id: &str) -> bool {
        self.node(node_id).is_some()
    }

    pub fn edge(&self, edge_id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == edge_id)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Count nodes and edges per tag for the current snapshot.
    pub fn compute_stats(&self) -> GraphStats {
        let mut stats = GraphStats {
            node_count: self.nodes.len(),
            edge_count: self.edges.len(),
            ..GraphStats::default()
        };
        for node in &self.nodes {
            *stats
                .entity_type_count
                .entry(node.entity_type.as_str().to_string())
                .or_insert(0) += 1;
        }
        for edge in &self.edges {
            *stats
                .relationship_type_count
                .entry(edge.relationship_type.as_str().to_string())
                .or_insert(0) += 1;
        }
        stats
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn node(id: &str, entity_type: EntityType) -> Node {
        Node {
            id: id.to_string(),
            name: id.to_uppercase(),
            entity_type,
            description: None,
            confidence: None,
            sources: Vec::new(),
        }
    }

    pub fn edge(id: &str, source: &str, target: &str, relationship_type: RelationshipType) -> Edge {
        Edge {
            id: id.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            relationship_type,
            description: None,
            confidence: None,
            sources: Vec::new(),
        }
    }

    pub fn graph(nodes: Vec<Node>, edges: Vec<Edge>) -> Graph {
        Graph {
            graph_id: "g-test".to_string(),
            nodes,
            edges,
            stats: None,
        }
    }
}
