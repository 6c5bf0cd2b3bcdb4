//! Component labeling under turn restrictions
//!
//! Two explorers share the turn rules below:
//! - `BfsComponentExplorer`: weak components over the stored adjacency
//! - `TarjanScc`: strongly connected components over forward edges
//!
//! Both thread the previous node through the traversal, so a node reached via
//! a forbidden turn is not reached at all.

pub mod bfs;
pub mod tarjan;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::graph::AdjacencyGraph;
use crate::restriction::RestrictionMap;
use crate::types::NodeId;

pub use bfs::BfsComponentExplorer;
pub use tarjan::TarjanScc;

/// Which component pass labels the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ComponentAlgorithm {
    #[default]
    Tarjan,
    Bfs,
}

impl std::fmt::Display for ComponentAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComponentAlgorithm::Tarjan => write!(f, "tarjan"),
            ComponentAlgorithm::Bfs => write!(f, "bfs"),
        }
    }
}

/// Result of a component pass: a dense label per node plus per-label sizes
pub trait ComponentLabels {
    fn number_of_components(&self) -> u32;

    /// Label of `node`, in `0..number_of_components()`
    fn component_id(&self, node: NodeId) -> u32;

    /// Node count of every component, indexed by label
    fn component_sizes(&self) -> &[u32];

    /// Size of the component containing `node`
    fn component_size(&self, node: NodeId) -> u32 {
        self.component_sizes()[self.component_id(node) as usize]
    }
}

/// Run the selected algorithm over `graph`
pub fn compute_components<'a, G: AdjacencyGraph>(
    algorithm: ComponentAlgorithm,
    graph: &'a G,
    restrictions: &'a RestrictionMap,
    barriers: &'a FxHashSet<NodeId>,
    large_component_threshold: u32,
) -> Box<dyn ComponentLabels + 'a> {
    match algorithm {
        ComponentAlgorithm::Bfs => {
            let mut explorer = BfsComponentExplorer::new(graph, restrictions, barriers);
            explorer.run();
            Box::new(explorer)
        }
        ComponentAlgorithm::Tarjan => {
            let mut scc = TarjanScc::new(graph, restrictions, barriers)
                .with_large_component_threshold(large_component_threshold);
            scc.run();
            Box::new(scc)
        }
    }
}

/// Whether the restriction map permits `u -> v -> w`, given the only-turn
/// target already looked up for the approach `(u, v)`
#[inline]
pub(crate) fn restriction_allows(
    restrictions: &RestrictionMap,
    only_target: Option<NodeId>,
    u: NodeId,
    v: NodeId,
    w: NodeId,
) -> bool {
    if let Some(only) = only_target {
        if only != w {
            return false;
        }
    }
    !restrictions.check_if_turn_is_restricted(u, v, w)
}

/// U-turns are only allowed at dead ends
#[inline]
pub(crate) fn uturn_allowed<G: AdjacencyGraph>(graph: &G, u: NodeId, v: NodeId, w: NodeId) -> bool {
    u != w || graph.out_degree(v) <= 1
}

/// Summary of a component labeling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentReport {
    pub algorithm: ComponentAlgorithm,
    pub nodes: u32,
    pub components: u32,
    pub size_one: u32,
    pub largest: u32,
    /// Components strictly smaller than the tiny threshold
    pub tiny_components: u32,
    pub tiny_threshold: u32,
}

impl ComponentReport {
    pub fn new(
        algorithm: ComponentAlgorithm,
        labels: &dyn ComponentLabels,
        tiny_threshold: u32,
    ) -> Self {
        Self::from_sizes(algorithm, labels.component_sizes(), tiny_threshold)
    }

    /// Report that leaves out `removed` nodes, such as the ones degree-two
    /// compression isolated. Components that only held removed nodes vanish.
    pub fn without_nodes(
        algorithm: ComponentAlgorithm,
        labels: &dyn ComponentLabels,
        removed: &[NodeId],
        tiny_threshold: u32,
    ) -> Self {
        let mut sizes = labels.component_sizes().to_vec();
        for &node in removed {
            let size = &mut sizes[labels.component_id(node) as usize];
            *size = size.saturating_sub(1);
        }
        sizes.retain(|&size| size > 0);
        Self::from_sizes(algorithm, &sizes, tiny_threshold)
    }

    fn from_sizes(algorithm: ComponentAlgorithm, sizes: &[u32], tiny_threshold: u32) -> Self {
        Self {
            algorithm,
            nodes: sizes.iter().sum(),
            components: sizes.len() as u32,
            size_one: sizes.iter().filter(|&&s| s == 1).count() as u32,
            largest: sizes.iter().copied().max().unwrap_or(0),
            tiny_components: sizes.iter().filter(|&&s| s < tiny_threshold).count() as u32,
            tiny_threshold,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_graphs {
    use crate::graph::{EdgeFlags, InputEdge, NodeBasedEdgeData, StaticGraph};
    use crate::types::TravelMode;

    pub type TestGraph = StaticGraph<NodeBasedEdgeData>;

    fn data(forward: bool, backward: bool) -> NodeBasedEdgeData {
        NodeBasedEdgeData {
            distance: 1,
            name_id: 0,
            travel_mode: TravelMode::DEFAULT,
            flags: EdgeFlags::empty()
                .with(EdgeFlags::FORWARD, forward)
                .with(EdgeFlags::BACKWARD, backward),
        }
    }

    /// Only the listed arcs, each forward
    pub fn directed(nodes: u32, arcs: &[(u32, u32)]) -> TestGraph {
        let edges = arcs
            .iter()
            .map(|&(s, t)| InputEdge::new(s, t, data(true, false)))
            .collect();
        TestGraph::new(nodes, edges)
    }

    /// Every road stored in both adjacency runs, open both ways
    pub fn bidirectional(nodes: u32, roads: &[(u32, u32)]) -> TestGraph {
        let edges = roads
            .iter()
            .flat_map(|&(s, t)| {
                [
                    InputEdge::new(s, t, data(true, true)),
                    InputEdge::new(t, s, data(true, true)),
                ]
            })
            .collect();
        TestGraph::new(nodes, edges)
    }

    pub const CYCLE: [(u32, u32); 4] = [(0, 1), (1, 2), (2, 3), (3, 0)];
}

#[cfg(test)]
mod tests {
    use super::test_graphs::*;
    use super::*;
    use crate::restriction::TurnRestriction;

    #[test]
    fn test_report_counts() {
        let graph = directed(6, &[(0, 1), (1, 0), (2, 3), (3, 4), (4, 2)]);
        let restrictions = RestrictionMap::new();
        let barriers = FxHashSet::default();
        let labels = compute_components(
            ComponentAlgorithm::Tarjan,
            &graph,
            &restrictions,
            &barriers,
            1000,
        );
        let report = ComponentReport::new(ComponentAlgorithm::Tarjan, labels.as_ref(), 3);
        assert_eq!(report.nodes, 6);
        assert_eq!(report.components, 3);
        assert_eq!(report.size_one, 1);
        assert_eq!(report.largest, 3);
        assert_eq!(report.tiny_components, 2);

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"algorithm\":\"tarjan\""));
    }

    #[test]
    fn test_both_algorithms_agree_on_unrestricted_cycle() {
        let graph = directed(4, &CYCLE);
        let restrictions = RestrictionMap::new();
        let barriers = FxHashSet::default();
        for algorithm in [ComponentAlgorithm::Bfs, ComponentAlgorithm::Tarjan] {
            let labels = compute_components(algorithm, &graph, &restrictions, &barriers, 1000);
            assert_eq!(labels.number_of_components(), 1, "{algorithm}");
            for node in 0..4 {
                assert_eq!(labels.component_size(node), 4, "{algorithm}");
            }
        }
    }

    #[test]
    fn test_restriction_allows() {
        let map = RestrictionMap::from_restrictions(&[
            TurnRestriction::no_turn(0, 1, 2),
            TurnRestriction::only_turn(5, 1, 3),
        ]);
        assert!(!restriction_allows(&map, None, 0, 1, 2));
        assert!(restriction_allows(&map, None, 0, 1, 3));
        let only = map.check_for_emanating_is_only_turn(5, 1);
        assert!(restriction_allows(&map, only, 5, 1, 3));
        assert!(!restriction_allows(&map, only, 5, 1, 2));
    }

    #[test]
    fn test_uturn_only_at_dead_end() {
        let graph = bidirectional(3, &[(0, 1), (1, 2)]);
        assert!(!uturn_allowed(&graph, 0, 1, 0));
        assert!(uturn_allowed(&graph, 1, 2, 1));
        assert!(uturn_allowed(&graph, 0, 1, 2));
    }
}
