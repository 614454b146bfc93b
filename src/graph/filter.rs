//! Type-based graph filtering.

use std::collections::{BTreeSet, HashSet};

use super::{EntityType, Graph, RelationshipType};

/// Allow-lists of tags to show. An empty set means "no restriction".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSelection {
    pub entity_types: BTreeSet<EntityType>,
    pub relationship_types: BTreeSet<RelationshipType>,
}

impl FilterSelection {
    pub fn new(
        entity_types: impl IntoIterator<Item = EntityType>,
        relationship_types: impl IntoIterator<Item = RelationshipType>,
    ) -> Self {
        Self {
            entity_types: entity_types.into_iter().collect(),
            relationship_types: relationship_types.into_iter().collect(),
        }
    }

    pub fn allows_entity(&self, entity_type: EntityType) -> bool {
        self.entity_types.is_empty() || self.entity_types.contains(&entity_type)
    }

    pub fn allows_relationship(&self, relationship_type: RelationshipType) -> bool {
        self.relationship_types.is_empty() || self.relationship_types.contains(&relationship_type)
    }

    /// True when neither set restricts anything.
    pub fn is_unrestricted(&self) -> bool {
        self.entity_types.is_empty() && self.relationship_types.is_empty()
    }
}

/// Keep nodes whose entity type is allowed, and edges whose relationship type
/// is allowed and whose endpoints both survived the node filter.
///
/// Relative order of nodes and edges is preserved. Filtering everything away
/// yields an empty graph carrying the same id, never an error.
pub fn filter_graph(graph: &Graph, filters: &FilterSelection) -> Graph {
    let nodes: Vec<_> = graph
        .nodes
        .iter()
        .filter(|node| filters.allows_entity(node.entity_type))
        .cloned()
        .collect();

    let node_ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();

    let edges: Vec<_> = graph
        .edges
        .iter()
        .filter(|edge| {
            filters.allows_relationship(edge.relationship_type)
                && node_ids.contains(edge.source.as_str())
                && node_ids.contains(edge.target.as_str())
        })
        .cloned()
        .collect();

    log::debug!(
        "filter_graph {}: nodes {} -> {}, edges {} -> {}",
        graph.graph_id,
        graph.nodes.len(),
        nodes.len(),
        graph.edges.len(),
        edges.len()
    );

    Graph {
        graph_id: graph.graph_id.clone(),
        nodes,
        edges,
        stats: graph.stats.clone(),
    }
}
