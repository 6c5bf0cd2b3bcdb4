//! Immutable CSR graph walked at query time
//!
//! Node `i` owns the edges `[node_array[i].first_edge, node_array[i + 1].first_edge)`.
//! The node array carries one sentinel entry past the last node so degree and
//! range lookups never branch.

use std::ops::Range;

use rayon::prelude::*;

use super::edge_data::QueryEdgeData;
use super::{AdjacencyGraph, EdgeDataExt, InputEdge};
use crate::types::{EdgeId, NodeId};

/// One entry of the CSR offset array. Layout: `first_edge: u32`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeArrayEntry {
    pub first_edge: EdgeId,
}

/// One entry of the CSR edge array. Layout: `target: u32` followed by the payload.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EdgeArrayEntry<E> {
    pub target: NodeId,
    pub data: E,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticGraph<E> {
    node_array: Vec<NodeArrayEntry>,
    edge_array: Vec<EdgeArrayEntry<E>>,
}

/// The graph persisted in `.hsgr` snapshots
pub type QueryGraph = StaticGraph<QueryEdgeData>;

impl<E: EdgeDataExt + Send> StaticGraph<E> {
    /// Build from an edge list ordered by `(source, target)`
    ///
    /// An unordered list is stable-sorted first, so ties keep their input
    /// order. Panics if an edge references a node outside `0..nodes`.
    pub fn new(nodes: u32, mut edges: Vec<InputEdge<E>>) -> Self {
        if !edges.windows(2).all(|pair| pair[0].key() <= pair[1].key()) {
            edges.par_sort_by_key(InputEdge::key);
        }

        let mut node_array = Vec::with_capacity(nodes as usize + 1);
        let mut edge = 0usize;
        for node in 0..nodes {
            node_array.push(NodeArrayEntry {
                first_edge: edge as EdgeId,
            });
            while edge < edges.len() && edges[edge].source == node {
                edge += 1;
            }
        }
        node_array.push(NodeArrayEntry {
            first_edge: edge as EdgeId,
        });
        assert_eq!(
            edge,
            edges.len(),
            "edge source out of range for a graph of {nodes} nodes"
        );

        let edge_array = edges
            .into_iter()
            .map(|e| {
                assert!(e.target < nodes, "edge target {} out of range", e.target);
                EdgeArrayEntry {
                    target: e.target,
                    data: e.data,
                }
            })
            .collect();

        Self {
            node_array,
            edge_array,
        }
    }
}

impl<E: EdgeDataExt> StaticGraph<E> {
    /// Assemble from raw arrays, e.g. read back from disk
    ///
    /// Panics when the arrays do not form a valid CSR layout; loaders must
    /// validate untrusted input before calling this.
    pub fn from_parts(node_array: Vec<NodeArrayEntry>, edge_array: Vec<EdgeArrayEntry<E>>) -> Self {
        assert!(
            csr_violation(&node_array, edge_array.len()).is_none(),
            "malformed CSR offsets"
        );
        Self {
            node_array,
            edge_array,
        }
    }

    pub fn node_array(&self) -> &[NodeArrayEntry] {
        &self.node_array
    }

    pub fn edge_array(&self) -> &[EdgeArrayEntry<E>] {
        &self.edge_array
    }

    pub fn number_of_nodes(&self) -> u32 {
        (self.node_array.len() - 1) as u32
    }

    pub fn number_of_edges(&self) -> u32 {
        self.edge_array.len() as u32
    }

    #[inline]
    pub fn begin_edges(&self, node: NodeId) -> EdgeId {
        self.node_array[node as usize].first_edge
    }

    #[inline]
    pub fn end_edges(&self, node: NodeId) -> EdgeId {
        self.node_array[node as usize + 1].first_edge
    }

    #[inline]
    pub fn adjacent_edge_range(&self, node: NodeId) -> Range<EdgeId> {
        self.begin_edges(node)..self.end_edges(node)
    }

    #[inline]
    pub fn out_degree(&self, node: NodeId) -> u32 {
        self.end_edges(node) - self.begin_edges(node)
    }

    pub fn directed_out_degree(&self, node: NodeId) -> u32 {
        AdjacencyGraph::directed_out_degree(self, node)
    }

    #[inline]
    pub fn target(&self, edge: EdgeId) -> NodeId {
        self.edge_array[edge as usize].target
    }

    #[inline]
    pub fn edge_data(&self, edge: EdgeId) -> &E {
        &self.edge_array[edge as usize].data
    }

    /// Lowest-weight edge `from -> to`
    pub fn find_edge(&self, from: NodeId, to: NodeId) -> Option<EdgeId> {
        self.adjacent_edge_range(from)
            .filter(|&e| self.target(e) == to)
            .min_by_key(|&e| self.edge_data(e).weight())
    }

    fn first_edge_to(&self, from: NodeId, to: NodeId) -> Option<EdgeId> {
        self.adjacent_edge_range(from).find(|&e| self.target(e) == to)
    }

    /// Edge `from -> to`, falling back to `to -> from`
    ///
    /// Returns the first stored match, not the lowest-weight one, when
    /// parallel edges exist. Shortcut unpacking relies on that order.
    pub fn find_edge_in_either_direction(&self, from: NodeId, to: NodeId) -> Option<EdgeId> {
        self.first_edge_to(from, to)
            .or_else(|| self.first_edge_to(to, from))
    }

    /// Lowest-weight edge `from -> to`, or `to -> from` with the flag set
    pub fn find_edge_indicate_if_reverse(&self, from: NodeId, to: NodeId) -> Option<(EdgeId, bool)> {
        self.find_edge(from, to)
            .map(|e| (e, false))
            .or_else(|| self.find_edge(to, from).map(|e| (e, true)))
    }

    /// Edges in `(source, target)` order, for re-materialization
    pub fn input_edges(&self) -> Vec<InputEdge<E>> {
        (0..self.number_of_nodes())
            .flat_map(|node| {
                self.adjacent_edge_range(node)
                    .map(move |e| InputEdge::new(node, self.target(e), *self.edge_data(e)))
            })
            .collect()
    }
}

/// First CSR violation found in an offset array, if any
pub(crate) fn csr_violation(node_array: &[NodeArrayEntry], edge_count: usize) -> Option<String> {
    let (first, last) = match (node_array.first(), node_array.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Some("node array is empty".to_string()),
    };
    if first.first_edge != 0 {
        return Some(format!("first offset is {}, expected 0", first.first_edge));
    }
    if let Some(i) = node_array
        .windows(2)
        .position(|w| w[0].first_edge > w[1].first_edge)
    {
        return Some(format!("offsets decrease at node {i}"));
    }
    if last.first_edge as usize != edge_count {
        return Some(format!(
            "last offset {} does not match edge count {}",
            last.first_edge, edge_count
        ));
    }
    None
}

impl<E: EdgeDataExt> AdjacencyGraph for StaticGraph<E> {
    type EdgeData = E;

    fn number_of_nodes(&self) -> u32 {
        StaticGraph::number_of_nodes(self)
    }

    fn number_of_edges(&self) -> u32 {
        StaticGraph::number_of_edges(self)
    }

    fn adjacent_edge_range(&self, node: NodeId) -> Range<EdgeId> {
        StaticGraph::adjacent_edge_range(self, node)
    }

    fn target(&self, edge: EdgeId) -> NodeId {
        StaticGraph::target(self, edge)
    }

    fn edge_data(&self, edge: EdgeId) -> &E {
        StaticGraph::edge_data(self, edge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::dynamic_graph::DynamicGraph;
    use crate::graph::edge_data::EdgeFlags;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn data(distance: i32, forward: bool) -> QueryEdgeData {
        QueryEdgeData {
            distance,
            id: distance as u32,
            flags: EdgeFlags::empty()
                .with(EdgeFlags::FORWARD, forward)
                .with(EdgeFlags::BACKWARD, !forward),
        }
    }

    fn edge(s: u32, t: u32, distance: i32) -> InputEdge<QueryEdgeData> {
        InputEdge::new(s, t, data(distance, true))
    }

    #[test]
    fn test_csr_layout() {
        let graph = QueryGraph::new(
            4,
            vec![edge(2, 3, 1), edge(0, 1, 1), edge(0, 2, 1), edge(3, 0, 1)],
        );
        let offsets: Vec<_> = graph.node_array().iter().map(|n| n.first_edge).collect();
        assert_eq!(offsets, vec![0, 2, 2, 3, 4]);
        assert_eq!(graph.target(0), 1);
        assert_eq!(graph.target(1), 2);
        assert_eq!(graph.number_of_nodes(), 4);
        assert_eq!(graph.number_of_edges(), 4);
        assert_eq!(graph.out_degree(0), 2);
        assert_eq!(graph.out_degree(1), 0);
        assert_eq!(graph.adjacent_edge_range(2), 2..3);
        assert!(csr_violation(graph.node_array(), 4).is_none());
    }

    #[test]
    fn test_sorted_input_keeps_parallel_edge_order() {
        let graph = QueryGraph::new(2, vec![edge(0, 1, 9), edge(0, 1, 3), edge(1, 0, 5)]);
        assert_eq!(graph.edge_data(0).distance, 9);
        assert_eq!(graph.edge_data(1).distance, 3);
        assert_eq!(graph.find_edge(0, 1), Some(1));
    }

    #[test]
    fn test_empty_graph_has_sentinel() {
        let graph = QueryGraph::new(0, Vec::new());
        assert_eq!(graph.node_array().len(), 1);
        assert_eq!(graph.number_of_nodes(), 0);
    }

    #[test]
    fn test_find_edge_prefers_lowest_weight() {
        let graph = QueryGraph::new(2, vec![edge(0, 1, 9), edge(0, 1, 3), edge(0, 1, 5)]);
        let e = graph.find_edge(0, 1).unwrap();
        assert_eq!(graph.edge_data(e).distance, 3);
        assert!(graph.find_edge(1, 0).is_none());
    }

    #[test]
    fn test_find_edge_in_either_direction_returns_first_match() {
        let graph = QueryGraph::new(2, vec![edge(1, 0, 9), edge(1, 0, 3)]);
        // Stable sort keeps insertion order of parallel edges
        let e = graph.find_edge_in_either_direction(0, 1).unwrap();
        assert_eq!(graph.edge_data(e).distance, 9);

        let (e, reversed) = graph.find_edge_indicate_if_reverse(0, 1).unwrap();
        assert!(reversed);
        assert_eq!(graph.edge_data(e).distance, 3);
    }

    #[test]
    fn test_directed_out_degree() {
        let graph = QueryGraph::new(
            3,
            vec![
                InputEdge::new(0, 1, data(1, true)),
                InputEdge::new(0, 2, data(1, false)),
            ],
        );
        assert_eq!(graph.out_degree(0), 2);
        assert_eq!(graph.directed_out_degree(0), 1);
    }

    #[test]
    fn test_csr_violation_detection() {
        let offsets = |v: &[u32]| -> Vec<NodeArrayEntry> {
            v.iter().map(|&first_edge| NodeArrayEntry { first_edge }).collect()
        };
        assert!(csr_violation(&[], 0).is_some());
        assert!(csr_violation(&offsets(&[1, 2]), 2).is_some());
        assert!(csr_violation(&offsets(&[0, 3, 2]), 2).is_some());
        assert!(csr_violation(&offsets(&[0, 1, 2]), 3).is_some());
        assert!(csr_violation(&offsets(&[0, 1, 2]), 2).is_none());
    }

    #[test]
    #[should_panic(expected = "malformed CSR offsets")]
    fn test_from_parts_rejects_bad_offsets() {
        let nodes = vec![NodeArrayEntry { first_edge: 0 }, NodeArrayEntry { first_edge: 2 }];
        QueryGraph::from_parts(nodes, Vec::new());
    }

    #[test]
    fn test_random_graph_degrees_sum_to_edge_count() {
        let mut rng = StdRng::seed_from_u64(42);
        let nodes = 200u32;
        let edges: Vec<_> = (0..2_000)
            .map(|_| {
                edge(
                    rng.random_range(0..nodes),
                    rng.random_range(0..nodes),
                    rng.random_range(1..100),
                )
            })
            .collect();
        let graph = QueryGraph::new(nodes, edges);

        let degree_sum: u32 = (0..nodes).map(|n| graph.out_degree(n)).sum();
        assert_eq!(degree_sum, graph.number_of_edges());
        for w in graph.node_array().windows(2) {
            assert!(w[0].first_edge <= w[1].first_edge);
        }
    }

    #[test]
    fn test_dynamic_to_static_rematerialization() {
        let mut rng = StdRng::seed_from_u64(7);
        let nodes = 50u32;
        let mut dynamic = DynamicGraph::<QueryEdgeData>::with_nodes(nodes);
        for _ in 0..400 {
            let s = rng.random_range(0..nodes);
            let t = rng.random_range(0..nodes);
            if dynamic.find_edge(s, t).is_none() {
                dynamic.insert_edge(s, t, data(rng.random_range(1..1000), true));
            }
        }
        // Punch a few holes so the arena contains dummies
        for s in 0..10 {
            if let Some(e) = dynamic.adjacent_edge_range(s).next() {
                dynamic.delete_edge(s, e);
            }
        }

        let graph = QueryGraph::new(nodes, dynamic.input_edges());
        assert_eq!(graph.number_of_edges(), dynamic.number_of_edges());
        for s in 0..nodes {
            for e in dynamic.adjacent_edge_range(s) {
                let t = dynamic.target(e);
                let found = graph.find_edge(s, t).expect("edge survives re-materialization");
                assert_eq!(graph.edge_data(found), dynamic.edge_data(e));
            }
        }

        let again = QueryGraph::new(nodes, graph.input_edges());
        assert_eq!(again, graph);
    }
}
