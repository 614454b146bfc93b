//! Built-in biology graph for offline exploration.

use std::collections::HashSet;

use super::{EntityType, Graph, RelationshipType};
use crate::api::{NodeDetails, SearchResult};

const DEMO_GRAPH_JSON: &str = include_str!("demo_graph.json");

/// The bundled photosynthesis graph.
pub fn demo_graph() -> Graph {
    serde_json::from_str(DEMO_GRAPH_JSON).expect("bundled demo graph is valid JSON")
}

/// Node plus inbound (targeting it) and outbound (sourced at it) edges.
pub fn demo_node_details(node_id: &str) -> Option<NodeDetails> {
    node_details_from_graph(&demo_graph(), node_id)
}

pub fn node_details_from_graph(graph: &Graph, node_id: &str) -> Option<NodeDetails> {
    let node = graph.node(node_id)?.clone();
    let inbound = graph.edges.iter().filter(|e| e.target == node_id).cloned().collect();
    let outbound = graph.edges.iter().filter(|e| e.source == node_id).cloned().collect();
    Some(NodeDetails {
        node,
        inbound,
        outbound,
    })
}

/// Entity types present in the graph, in first-seen order.
pub fn unique_entity_types(graph: &Graph) -> Vec<EntityType> {
    let mut seen = HashSet::new();
    graph
        .nodes
        .iter()
        .map(|n| n.entity_type)
        .filter(|t| seen.insert(*t))
        .collect()
}

/// Relationship types present in the graph, in first-seen order.
pub fn unique_relationship_types(graph: &Graph) -> Vec<RelationshipType> {
    let mut seen = HashSet::new();
    graph
        .edges
        .iter()
        .map(|e| e.relationship_type)
        .filter(|t| seen.insert(*t))
        .collect()
}

/// Case-insensitive substring match on node names, graph order, at most `limit` hits.
pub fn local_search(graph: &Graph, query: &str, limit: usize) -> Vec<SearchResult> {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return Vec::new();
    }
    graph
        .nodes
        .iter()
        .filter(|n| n.name.to_lowercase().contains(&q))
        .take(limit)
        .map(|n| SearchResult {
            id: n.id.clone(),
            name: n.name.clone(),
            entity_type: n.entity_type,
            description: n.description.clone(),
            score: None,
        })
        .collect()
}
