//! Undirected adjacency lookup and one-hop neighborhoods.

use std::collections::{BTreeSet, HashMap, HashSet};

use super::Graph;

/// Node id -> neighbor ids and incident edge ids.
///
/// Built from scratch for each query; edges count for both endpoints.
#[derive(Debug, Clone, Default)]
pub struct Adjacency {
    pub neighbors_by_node: HashMap<String, HashSet<String>>,
    pub edge_ids_by_node: HashMap<String, HashSet<String>>,
}

impl Adjacency {
    pub fn contains(&self, node_id: &str) -> bool {
        self.neighbors_by_node.contains_key(node_id)
    }

    pub fn neighbors(&self, node_id: &str) -> impl Iterator<Item = &String> {
        self.neighbors_by_node.get(node_id).into_iter().flatten()
    }

    pub fn incident_edges(&self, node_id: &str) -> impl Iterator<Item = &String> {
        self.edge_ids_by_node.get(node_id).into_iter().flatten()
    }
}

/// Highlight sets for a selected node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Neighborhood {
    pub node_ids: BTreeSet<String>,
    pub edge_ids: BTreeSet<String>,
}

impl Neighborhood {
    pub fn is_empty(&self) -> bool {
        self.node_ids.is_empty() && self.edge_ids.is_empty()
    }
}

/// Index every node id (declared or appearing as an edge endpoint).
pub fn build_adjacency(graph: &Graph) -> Adjacency {
    let mut adjacency = Adjacency::default();

    for node in &graph.nodes {
        adjacency.neighbors_by_node.entry(node.id.clone()).or_default();
        adjacency.edge_ids_by_node.entry(node.id.clone()).or_default();
    }

    for edge in &graph.edges {
        adjacency
            .neighbors_by_node
            .entry(edge.source.clone())
            .or_default()
            .insert(edge.target.clone());
        adjacency
            .neighbors_by_node
            .entry(edge.target.clone())
            .or_default()
            .insert(edge.source.clone());
        adjacency
            .edge_ids_by_node
            .entry(edge.source.clone())
            .or_default()
            .insert(edge.id.clone());
        adjacency
            .edge_ids_by_node
            .entry(edge.target.clone())
            .or_default()
            .insert(edge.id.clone());
    }

    adjacency
}

/// Selected node plus its direct neighbors, and the edges touching it.
///
/// No selection, or a selection the graph does not know about, yields empty sets.
pub fn compute_neighborhood(selected_node_id: Option<&str>, graph: &Graph) -> Neighborhood {
    let Some(selected) = selected_node_id else {
        return Neighborhood::default();
    };

    let adjacency = build_adjacency(graph);
    if !adjacency.contains(selected) {
        return Neighborhood::default();
    }

    let mut node_ids = BTreeSet::from([selected.to_string()]);
    node_ids.extend(adjacency.neighbors(selected).cloned());
    let edge_ids = adjacency.incident_edges(selected).cloned().collect();

    Neighborhood { node_ids, edge_ids }
}
