//! Degree-two node elimination
//!
//! A node `v` with exactly the two stored edges `v -> u` and `v -> w` sits in
//! the middle of a road. When both halves carry the same attributes the two
//! segments `u - v - w` are merged into `u - w` and `v` is left isolated.
//! Barriers and restriction via-nodes are never removed.

use std::time::Instant;

use rustc_hash::FxHashSet;
use tracing::{debug, info};

use crate::graph::NodeBasedDynamicGraph;
use crate::restriction::RestrictionMap;
use crate::types::{EdgeWeight, NodeId};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompressionStats {
    pub removed_nodes: u32,
    /// Nodes left isolated, ascending
    pub removed: Vec<NodeId>,
    pub edges_before: u32,
    pub edges_after: u32,
}

#[derive(Debug, Clone)]
pub struct GraphCompressor {
    traffic_signal_penalty: EdgeWeight,
}

impl GraphCompressor {
    pub fn new(traffic_signal_penalty: EdgeWeight) -> Self {
        Self {
            traffic_signal_penalty,
        }
    }

    /// Merge every eligible degree-two node
    ///
    /// Restrictions that mention a removed node are rewritten before the
    /// graph is rewired, so none of them is lost.
    pub fn compress(
        &self,
        graph: &mut NodeBasedDynamicGraph,
        restrictions: &mut RestrictionMap,
        barriers: &FxHashSet<NodeId>,
        traffic_lights: &FxHashSet<NodeId>,
    ) -> CompressionStats {
        let start = Instant::now();
        let mut stats = CompressionStats {
            edges_before: graph.number_of_edges(),
            ..Default::default()
        };

        for v in 0..graph.number_of_nodes() {
            if graph.out_degree(v) != 2 || barriers.contains(&v) || restrictions.is_via_node(v) {
                continue;
            }

            let begin = graph.begin_edges(v);
            let reverse_order = !graph.edge_data(begin).flags.forward();
            let forward_e2 = begin + reverse_order as u32;
            let reverse_e2 = begin + 1 - reverse_order as u32;

            let w = graph.target(forward_e2);
            let u = graph.target(reverse_e2);
            if u == w || u == v || w == v {
                continue;
            }

            let (Some(forward_e1), Some(reverse_e1)) = (graph.find_edge(u, v), graph.find_edge(w, v)) else {
                continue;
            };
            if graph.find_edge_in_either_direction(u, w).is_some() {
                continue;
            }

            let fwd1 = *graph.edge_data(forward_e1);
            let fwd2 = *graph.edge_data(forward_e2);
            let rev1 = *graph.edge_data(reverse_e1);
            let rev2 = *graph.edge_data(reverse_e2);
            if !fwd1.is_compatible_to(&fwd2) || !rev1.is_compatible_to(&rev2) {
                continue;
            }

            restrictions.fixup_starting_turn_restriction(u, v, w);
            restrictions.fixup_arriving_turn_restriction(u, v, w);
            restrictions.fixup_starting_turn_restriction(w, v, u);
            restrictions.fixup_arriving_turn_restriction(w, v, u);

            let penalty = if traffic_lights.contains(&v) {
                self.traffic_signal_penalty
            } else {
                0
            };
            graph.edge_data_mut(forward_e1).distance = fwd1.distance.saturating_add(fwd2.distance).saturating_add(penalty);
            graph.edge_data_mut(reverse_e1).distance = rev1.distance.saturating_add(rev2.distance).saturating_add(penalty);

            graph.set_target(forward_e1, w);
            graph.set_target(reverse_e1, u);

            // Higher slot first so the swap-with-last never moves the other one
            graph.delete_edge(v, forward_e2.max(reverse_e2));
            graph.delete_edge(v, forward_e2.min(reverse_e2));

            stats.removed_nodes += 1;
            stats.removed.push(v);
        }

        stats.edges_after = graph.number_of_edges();
        info!(
            removed_nodes = stats.removed_nodes,
            edges_before = stats.edges_before,
            edges_after = stats.edges_after,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Compressed degree-two nodes"
        );
        debug!(restrictions = restrictions.len(), "Restrictions after compression");
        stats
    }
}
