//! Study path: prerequisites of a concept in dependency order.
//!
//! Depth-first over incoming `prerequisite_of` edges with white/grey/black
//! coloring. A grey hit is a cycle: it is flagged and the edge is not followed,
//! so every reachable node still appears exactly once in the output.

use std::collections::{BTreeSet, HashMap, HashSet};

use super::{Edge, Graph, Node, RelationshipType};

pub const CYCLE_WARNING: &str = "Cycle detected in prerequisite chain. Showing best-effort path.";

/// Dependency-ordered prerequisites ending with the selected node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudyPath {
    pub ordered_node_ids: Vec<String>,
    /// Nodes for `ordered_node_ids`; ids missing from the graph are dropped.
    pub ordered_nodes: Vec<Node>,
    pub edge_ids: BTreeSet<String>,
    pub has_cycle: bool,
    pub warning: Option<String>,
}

struct Resolver<'g> {
    incoming: HashMap<&'g str, Vec<&'g Edge>>,
    visiting: HashSet<&'g str>,
    visited: HashSet<&'g str>,
    order: Vec<String>,
    edge_ids: BTreeSet<String>,
    has_cycle: bool,
}

impl<'g> Resolver<'g> {
    fn new(graph: &'g Graph) -> Self {
        let mut incoming: HashMap<&str, Vec<&Edge>> = HashMap::new();
        for edge in graph
            .edges
            .iter()
            .filter(|e| e.relationship_type == RelationshipType::PrerequisiteOf)
        {
            incoming.entry(edge.target.as_str()).or_default().push(edge);
        }

        Self {
            incoming,
            visiting: HashSet::new(),
            visited: HashSet::new(),
            order: Vec::new(),
            edge_ids: BTreeSet::new(),
            has_cycle: false,
        }
    }

    /// Post-order walk from `start` over an explicit stack of
    /// `(node, next incoming edge)` frames.
    fn visit(&mut self, start: &'g str) {
        let mut stack: Vec<(&'g str, usize)> = Vec::new();
        self.enter(start, &mut stack);

        while let Some(frame) = stack.last_mut() {
            let (node_id, next) = *frame;
            let edge = self
                .incoming
                .get(node_id)
                .and_then(|edges| edges.get(next))
                .copied();
            match edge {
                Some(edge) => {
                    frame.1 += 1;
                    self.edge_ids.insert(edge.id.clone());
                    self.enter(edge.source.as_str(), &mut stack);
                }
                None => {
                    stack.pop();
                    self.visiting.remove(node_id);
                    self.visited.insert(node_id);
                    self.order.push(node_id.to_string());
                }
            }
        }
    }

    /// Grey hit flags a cycle, black hit is skipped, white opens a frame.
    fn enter(&mut self, node_id: &'g str, stack: &mut Vec<(&'g str, usize)>) {
        if self.visiting.contains(node_id) {
            self.has_cycle = true;
            return;
        }
        if self.visited.contains(node_id) {
            return;
        }
        self.visiting.insert(node_id);
        stack.push((node_id, 0));
    }
}

/// Compute the study path for `selected_node_id` over `graph`.
///
/// Always starts from empty visit state: the graph may have been re-filtered
/// since the previous selection.
pub fn compute_study_path(graph: &Graph, selected_node_id: Option<&str>) -> StudyPath {
    let Some(selected) = selected_node_id else {
        return StudyPath::default();
    };

    let mut resolver = Resolver::new(graph);
    resolver.visit(selected);

    let nodes_by_id: HashMap<&str, &Node> =
        graph.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    let ordered_nodes = resolver
        .order
        .iter()
        .filter_map(|id| nodes_by_id.get(id.as_str()).map(|n| (*n).clone()))
        .collect();

    if resolver.has_cycle {
        log::warn!(
            "study path for {} in {}: prerequisite cycle, returning partial order",
            selected,
            graph.graph_id
        );
    }

    StudyPath {
        ordered_node_ids: resolver.order,
        ordered_nodes,
        edge_ids: resolver.edge_ids,
        has_cycle: resolver.has_cycle,
        warning: resolver.has_cycle.then(|| CYCLE_WARNING.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::demo::demo_graph;
    use crate::graph::fixtures::*;
    use crate::graph::{filter_graph, EntityType, FilterSelection};

    const P: RelationshipType = RelationshipType::PrerequisiteOf;

    #[test]
    fn test_two_node_chain() {
        let g = graph(
            vec![node("A", EntityType::Concept), node("B", EntityType::Process)],
            vec![edge("e1", "A", "B", P)],
        );
        let path = compute_study_path(&g, Some("B"));
        assert_eq!(path.ordered_node_ids, vec!["A", "B"]);
        assert_eq!(path.edge_ids, BTreeSet::from(["e1".to_string()]));
        assert!(!path.has_cycle);
        assert!(path.warning.is_none());
        assert_eq!(path.ordered_nodes.len(), 2);
    }

    #[test]
    fn test_no_prerequisites_is_singleton() {
        let g = graph(
            vec![node("A", EntityType::Concept), node("B", EntityType::Process)],
            vec![edge("e1", "A", "B", P)],
        );
        let path = compute_study_path(&g, Some("A"));
        assert_eq!(path.ordered_node_ids, vec!["A"]);
        assert!(path.edge_ids.is_empty());
        assert!(path.warning.is_none());
    }

    #[test]
    fn test_no_selection_is_empty() {
        let path = compute_study_path(&demo_graph(), None);
        assert_eq!(path, StudyPath::default());
    }

    #[test]
    fn test_only_prerequisite_edges_are_followed() {
        let g = graph(
            vec![
                node("A", EntityType::Concept),
                node("B", EntityType::Concept),
                node("C", EntityType::Concept),
            ],
            vec![
                edge("e1", "A", "C", RelationshipType::Enables),
                edge("e2", "B", "C", P),
            ],
        );
        let path = compute_study_path(&g, Some("C"));
        assert_eq!(path.ordered_node_ids, vec!["B", "C"]);
    }

    #[test]
    fn test_outgoing_prerequisites_are_ignored() {
        let g = graph(
            vec![node("A", EntityType::Concept), node("B", EntityType::Concept)],
            vec![edge("e1", "A", "B", P)],
        );
        // A is a prerequisite of B, not the other way around
        let path = compute_study_path(&g, Some("A"));
        assert_eq!(path.ordered_node_ids, vec!["A"]);
    }

    #[test]
    fn test_diamond_visits_shared_prerequisite_once() {
        // R -> L, R -> M, L -> T, M -> T
        let g = graph(
            vec![
                node("R", EntityType::Concept),
                node("L", EntityType::Concept),
                node("M", EntityType::Concept),
                node("T", EntityType::Concept),
            ],
            vec![
                edge("e1", "R", "L", P),
                edge("e2", "R", "M", P),
                edge("e3", "L", "T", P),
                edge("e4", "M", "T", P),
            ],
        );
        let path = compute_study_path(&g, Some("T"));
        assert_eq!(path.ordered_node_ids, vec!["R", "L", "M", "T"]);
        assert_eq!(path.edge_ids.len(), 4);
        assert!(!path.has_cycle);
    }

    #[test]
    fn test_three_cycle_from_every_start() {
        let g = graph(
            vec![
                node("A", EntityType::Concept),
                node("B", EntityType::Concept),
                node("C", EntityType::Concept),
            ],
            vec![edge("e1", "A", "B", P), edge("e2", "B", "C", P), edge("e3", "C", "A", P)],
        );
        for start in ["A", "B", "C"] {
            let path = compute_study_path(&g, Some(start));
            assert!(path.has_cycle, "cycle not detected from {}", start);
            assert_eq!(path.warning.as_deref(), Some(CYCLE_WARNING));
            assert_eq!(path.ordered_node_ids.len(), 3);
            let unique: HashSet<_> = path.ordered_node_ids.iter().collect();
            assert_eq!(unique.len(), 3);
            assert_eq!(path.ordered_node_ids.last().map(String::as_str), Some(start));
        }
    }

    #[test]
    fn test_self_loop_is_a_cycle() {
        let g = graph(vec![node("A", EntityType::Concept)], vec![edge("e1", "A", "A", P)]);
        let path = compute_study_path(&g, Some("A"));
        assert!(path.has_cycle);
        assert_eq!(path.ordered_node_ids, vec!["A"]);
    }

    #[test]
    fn test_unknown_ids_dropped_from_nodes_only() {
        let g = graph(vec![node("B", EntityType::Concept)], vec![edge("e1", "ghost", "B", P)]);
        let path = compute_study_path(&g, Some("B"));
        assert_eq!(path.ordered_node_ids, vec!["ghost", "B"]);
        assert_eq!(path.ordered_nodes.len(), 1);
        assert_eq!(path.ordered_nodes[0].id, "B");
    }

    #[test]
    fn test_demo_photosynthesis_path() {
        let path = compute_study_path(&demo_graph(), Some("n12"));
        assert_eq!(path.ordered_node_ids, vec!["n1", "n2", "n5", "n8", "n12"]);
        assert!(!path.has_cycle);
        assert!(path.edge_ids.contains("e14"));
    }

    #[test]
    fn test_path_follows_filtered_graph() {
        // Dropping Concept nodes removes light energy (n1) from the chain
        let filtered = filter_graph(
            &demo_graph(),
            &FilterSelection::new(
                [EntityType::Process, EntityType::Molecule, EntityType::Outcome],
                [],
            ),
        );
        let path = compute_study_path(&filtered, Some("n8"));
        assert_eq!(path.ordered_node_ids, vec!["n2", "n5", "n8"]);
    }

    #[test]
    fn test_long_prerequisite_chain_does_not_exhaust_stack() {
        const N: usize = 50_000;
        let nodes = (0..N)
            .map(|i| node(&format!("c{}", i), EntityType::Concept))
            .collect();
        let edges = (1..N)
            .map(|i| edge(&format!("e{}", i), &format!("c{}", i - 1), &format!("c{}", i), P))
            .collect();
        let g = graph(nodes, edges);

        let last = format!("c{}", N - 1);
        let path = compute_study_path(&g, Some(&last));
        assert_eq!(path.ordered_node_ids.len(), N);
        assert_eq!(path.ordered_node_ids.first().map(String::as_str), Some("c0"));
        assert_eq!(path.ordered_node_ids.last(), Some(&last));
        assert_eq!(path.edge_ids.len(), N - 1);
        assert!(!path.has_cycle);
    }
}
