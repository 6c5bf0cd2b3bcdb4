//! Breadth-first component labeling that respects turn restrictions

use std::collections::VecDeque;

use rustc_hash::FxHashSet;
use tracing::debug;

use super::{restriction_allows, uturn_allowed, ComponentLabels};
use crate::graph::AdjacencyGraph;
use crate::restriction::RestrictionMap;
use crate::types::NodeId;

const UNASSIGNED: u32 = u32::MAX;

/// Labels each node with the component it is reached in
///
/// The queue carries `(node, parent)` pairs because turn legality depends on
/// the approach. Barrier nodes are labeled but never expanded. Nodes are
/// labeled when enqueued, so a component's size is its number of distinct
/// nodes.
pub struct BfsComponentExplorer<'a, G> {
    graph: &'a G,
    restrictions: &'a RestrictionMap,
    barriers: &'a FxHashSet<NodeId>,
    component_ids: Vec<u32>,
    component_sizes: Vec<u32>,
}

impl<'a, G: AdjacencyGraph> BfsComponentExplorer<'a, G> {
    pub fn new(graph: &'a G, restrictions: &'a RestrictionMap, barriers: &'a FxHashSet<NodeId>) -> Self {
        Self {
            graph,
            restrictions,
            barriers,
            component_ids: Vec::new(),
            component_sizes: Vec::new(),
        }
    }

    /// Label every node. Calling it again recomputes from scratch.
    pub fn run(&mut self) {
        let n = self.graph.number_of_nodes();
        self.component_ids = vec![UNASSIGNED; n as usize];
        self.component_sizes.clear();

        let mut queue = VecDeque::new();
        for start in 0..n {
            if self.component_ids[start as usize] != UNASSIGNED {
                continue;
            }
            let component = self.component_sizes.len() as u32;
            self.component_ids[start as usize] = component;
            let size = self.explore(start, component, &mut queue);
            self.component_sizes.push(size);
        }

        debug!(
            nodes = n,
            components = self.component_sizes.len(),
            "BFS component labeling done"
        );
    }

    fn explore(&mut self, start: NodeId, component: u32, queue: &mut VecDeque<(NodeId, NodeId)>) -> u32 {
        let mut size = 1;
        queue.clear();
        queue.push_back((start, start));

        while let Some((v, u)) = queue.pop_front() {
            if self.barriers.contains(&v) {
                continue;
            }
            let only_target = self.restrictions.check_for_emanating_is_only_turn(u, v);

            for e in self.graph.adjacent_edge_range(v) {
                let w = self.graph.target(e);
                if !uturn_allowed(self.graph, u, v, w)
                    || !restriction_allows(self.restrictions, only_target, u, v, w)
                {
                    continue;
                }
                if self.component_ids[w as usize] == UNASSIGNED {
                    self.component_ids[w as usize] = component;
                    size += 1;
                    queue.push_back((w, v));
                }
            }
        }
        size
    }
}

impl<G: AdjacencyGraph> ComponentLabels for BfsComponentExplorer<'_, G> {
    fn number_of_components(&self) -> u32 {
        self.component_sizes.len() as u32
    }

    fn component_id(&self, node: NodeId) -> u32 {
        self.component_ids[node as usize]
    }

    fn component_sizes(&self) -> &[u32] {
        &self.component_sizes
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_graphs::*;
    use super::*;
    use crate::restriction::TurnRestriction;

    fn explore(graph: &TestGraph, restrictions: &[TurnRestriction], barriers: &[NodeId]) -> Vec<u32> {
        let map = RestrictionMap::from_restrictions(restrictions);
        let barriers: FxHashSet<NodeId> = barriers.iter().copied().collect();
        let mut explorer = BfsComponentExplorer::new(graph, &map, &barriers);
        explorer.run();

        let sizes = explorer.component_sizes();
        assert_eq!(sizes.iter().sum::<u32>(), graph.number_of_nodes());
        (0..graph.number_of_nodes())
            .map(|n| explorer.component_id(n))
            .collect()
    }

    #[test]
    fn test_unrestricted_cycle_is_one_component() {
        let graph = directed(4, &CYCLE);
        let ids = explore(&graph, &[], &[]);
        assert_eq!(ids, vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_forbidden_turn_splits_directed_cycle() {
        // 0 -> 1 -> 2 is forbidden, so node 2 is not reachable from 0
        let graph = directed(4, &CYCLE);
        let ids = explore(&graph, &[TurnRestriction::no_turn(0, 1, 2)], &[]);
        assert_eq!(ids, vec![0, 0, 1, 1]);
    }

    #[test]
    fn test_forbidden_turn_on_two_way_cycle_is_bypassed() {
        let graph = bidirectional(4, &CYCLE);
        let ids = explore(&graph, &[TurnRestriction::no_turn(0, 1, 2)], &[]);
        assert_eq!(ids, vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_only_turn_limits_continuation() {
        // Star around node 1: arriving from 0 you must go to 3
        let graph = directed(5, &[(0, 1), (1, 2), (1, 3), (1, 4)]);
        let ids = explore(&graph, &[TurnRestriction::only_turn(0, 1, 3)], &[]);
        assert_eq!(ids[0], ids[1]);
        assert_eq!(ids[0], ids[3]);
        assert_ne!(ids[0], ids[2]);
        assert_ne!(ids[0], ids[4]);
    }

    #[test]
    fn test_barrier_is_labeled_but_not_expanded() {
        let graph = bidirectional(3, &[(0, 1), (1, 2)]);
        let ids = explore(&graph, &[], &[1]);
        assert_eq!(ids[0], ids[1]);
        assert_ne!(ids[1], ids[2]);
    }

    #[test]
    fn test_component_ids_follow_discovery_order() {
        let graph = bidirectional(6, &[(4, 5), (2, 3)]);
        let ids = explore(&graph, &[], &[]);
        assert_eq!(ids, vec![0, 1, 2, 2, 3, 3]);
    }

    #[test]
    fn test_size_counts_distinct_nodes() {
        // Diamond: node 3 is reachable through both 1 and 2
        let graph = directed(4, &[(0, 1), (0, 2), (1, 3), (2, 3)]);
        let map = RestrictionMap::new();
        let barriers = FxHashSet::default();
        let mut explorer = BfsComponentExplorer::new(&graph, &map, &barriers);
        explorer.run();
        assert_eq!(explorer.number_of_components(), 1);
        assert_eq!(explorer.component_size(3), 4);
    }
}
