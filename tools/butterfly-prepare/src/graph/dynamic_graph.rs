//! Mutable adjacency graph for preprocessing
//!
//! All edges live in one arena (`edge_list`). Every node owns a contiguous run
//! `[first_edge, first_edge + edges)` inside the arena. Free slots are "dummy"
//! edges whose target is `SPECIAL_NODEID`. When a run cannot grow in place it
//! is relocated to the end of the arena with ~10% headroom and its old slots
//! become dummies.
//!
//! Edge ids handed out by this graph are arena positions. Inserting an edge
//! into a node may relocate that node's run, so callers must not hold edge ids
//! of a node across `insert_edge` calls on the same node.

use std::ops::Range;

use rayon::prelude::*;
use tracing::debug;

use super::edge_data::{EdgeFlags, NodeBasedEdgeData};
use super::{AdjacencyGraph, EdgeDataExt, ImportEdge, InputEdge};
use crate::types::{EdgeId, NodeId, SPECIAL_NODEID};

#[derive(Debug, Clone, Copy)]
struct Node {
    first_edge: EdgeId,
    edges: u32,
}

#[derive(Debug, Clone, Copy)]
struct Edge<E> {
    target: NodeId,
    data: E,
}

impl<E: Default> Edge<E> {
    fn dummy() -> Self {
        Self {
            target: SPECIAL_NODEID,
            data: E::default(),
        }
    }
}

/// Growable adjacency graph with O(1) amortized insertion and O(1) deletion
#[derive(Debug, Clone)]
pub struct DynamicGraph<E> {
    number_of_edges: u32,
    node_list: Vec<Node>,
    edge_list: Vec<Edge<E>>,
}

/// Preprocessing graph over road segments
pub type NodeBasedDynamicGraph = DynamicGraph<NodeBasedEdgeData>;

impl<E: Copy + Default> DynamicGraph<E> {
    /// Graph with `nodes` isolated nodes
    pub fn with_nodes(nodes: u32) -> Self {
        Self {
            number_of_edges: 0,
            node_list: vec![
                Node {
                    first_edge: 0,
                    edges: 0
                };
                nodes as usize
            ],
            edge_list: Vec::new(),
        }
    }

    /// Bulk construction from an edge list sorted by source
    ///
    /// Single pass over nodes and edges. Panics if an edge references a node
    /// outside `0..nodes` or if the list is not grouped by source.
    pub fn new(nodes: u32, edges: &[InputEdge<E>]) -> Self {
        debug_assert!(
            edges.windows(2).all(|w| w[0].source <= w[1].source),
            "edge list must be sorted by source"
        );

        let mut node_list = Vec::with_capacity(nodes as usize);
        let mut edge = 0usize;
        for node in 0..nodes {
            let first = edge;
            while edge < edges.len() && edges[edge].source == node {
                edge += 1;
            }
            node_list.push(Node {
                first_edge: first as EdgeId,
                edges: (edge - first) as u32,
            });
        }
        assert_eq!(
            edge,
            edges.len(),
            "edge source out of range for a graph of {nodes} nodes"
        );

        let edge_list = edges
            .iter()
            .map(|e| {
                assert!(e.target < nodes, "edge target {} out of range", e.target);
                Edge {
                    target: e.target,
                    data: e.data,
                }
            })
            .collect();

        Self {
            number_of_edges: edges.len() as u32,
            node_list,
            edge_list,
        }
    }

    pub fn number_of_nodes(&self) -> u32 {
        self.node_list.len() as u32
    }

    /// Number of live (non-dummy) edges
    pub fn number_of_edges(&self) -> u32 {
        self.number_of_edges
    }

    /// Arena size including dummy slots
    pub fn edge_capacity(&self) -> usize {
        self.edge_list.len()
    }

    pub fn out_degree(&self, node: NodeId) -> u32 {
        self.node_list[node as usize].edges
    }

    pub fn begin_edges(&self, node: NodeId) -> EdgeId {
        self.node_list[node as usize].first_edge
    }

    pub fn end_edges(&self, node: NodeId) -> EdgeId {
        let n = self.node_list[node as usize];
        n.first_edge + n.edges
    }

    pub fn adjacent_edge_range(&self, node: NodeId) -> Range<EdgeId> {
        self.begin_edges(node)..self.end_edges(node)
    }

    pub fn target(&self, edge: EdgeId) -> NodeId {
        let target = self.edge_list[edge as usize].target;
        debug_assert_ne!(target, SPECIAL_NODEID, "edge {edge} is a dummy slot");
        target
    }

    pub fn set_target(&mut self, edge: EdgeId, target: NodeId) {
        assert!(target < self.number_of_nodes(), "target {target} out of range");
        self.edge_list[edge as usize].target = target;
    }

    pub fn edge_data(&self, edge: EdgeId) -> &E {
        &self.edge_list[edge as usize].data
    }

    pub fn edge_data_mut(&mut self, edge: EdgeId) -> &mut E {
        &mut self.edge_list[edge as usize].data
    }

    fn is_dummy(&self, edge: usize) -> bool {
        self.edge_list[edge].target == SPECIAL_NODEID
    }

    fn make_dummy(&mut self, edge: usize) {
        self.edge_list[edge] = Edge::dummy();
    }

    /// Append an isolated node and return its id
    pub fn insert_node(&mut self) -> NodeId {
        let id = self.number_of_nodes();
        self.node_list.push(Node {
            first_edge: self.edge_list.len() as EdgeId,
            edges: 0,
        });
        id
    }

    /// Insert a directed edge and return the slot it was stored in
    ///
    /// Invalidates edge ids previously obtained for `from`.
    pub fn insert_edge(&mut self, from: NodeId, to: NodeId, data: E) -> EdgeId {
        assert!(to < self.number_of_nodes(), "target {to} out of range");
        let mut node = self.node_list[from as usize];
        let slot = (node.first_edge + node.edges) as usize;

        if slot >= self.edge_list.len() || !self.is_dummy(slot) {
            if node.first_edge != 0 && self.is_dummy(node.first_edge as usize - 1) {
                // Grow to the left: move the last edge into the free slot in front
                node.first_edge -= 1;
                let moved = (node.first_edge + node.edges) as usize;
                self.edge_list[node.first_edge as usize] = self.edge_list[moved];
            } else {
                // Relocate the run to the end of the arena
                let new_first = self.edge_list.len();
                let new_size = (node.edges as f64 * 1.1) as usize + 2;
                let required = new_first + new_size;
                if required > self.edge_list.capacity() {
                    let extra = (required as f64 * 1.1) as usize - self.edge_list.len();
                    self.edge_list.reserve(extra);
                }
                self.edge_list.resize(required, Edge::dummy());
                for i in 0..node.edges as usize {
                    let old = node.first_edge as usize + i;
                    self.edge_list[new_first + i] = self.edge_list[old];
                    self.make_dummy(old);
                }
                node.first_edge = new_first as EdgeId;
            }
        }

        let slot = node.first_edge + node.edges;
        self.edge_list[slot as usize] = Edge { target: to, data };
        node.edges += 1;
        self.node_list[from as usize] = node;
        self.number_of_edges += 1;
        slot
    }

    /// Remove `edge` from the run of `source`
    ///
    /// The last edge of the run moves into the freed slot, so order is not
    /// preserved and the id of that last edge changes.
    pub fn delete_edge(&mut self, source: NodeId, edge: EdgeId) {
        let range = self.adjacent_edge_range(source);
        assert!(
            range.contains(&edge),
            "edge {edge} does not belong to node {source}"
        );
        let node = &mut self.node_list[source as usize];
        node.edges -= 1;
        let last = (node.first_edge + node.edges) as usize;
        self.number_of_edges -= 1;
        self.edge_list[edge as usize] = self.edge_list[last];
        self.make_dummy(last);
    }

    /// Remove every edge `source -> target`, returning how many were removed
    pub fn delete_edges_to(&mut self, source: NodeId, target: NodeId) -> u32 {
        let begin = self.begin_edges(source) as usize;
        let mut end = self.end_edges(source) as usize;
        let mut i = begin;
        while i < end {
            if self.edge_list[i].target == target {
                end -= 1;
                self.edge_list[i] = self.edge_list[end];
                self.make_dummy(end);
            } else {
                i += 1;
            }
        }
        let deleted = self.end_edges(source) - end as u32;
        self.node_list[source as usize].edges -= deleted;
        self.number_of_edges -= deleted;
        deleted
    }

    /// First edge `from -> to`
    pub fn find_edge(&self, from: NodeId, to: NodeId) -> Option<EdgeId> {
        self.adjacent_edge_range(from)
            .find(|&e| self.edge_list[e as usize].target == to)
    }

    /// `from -> to`, falling back to `to -> from`
    pub fn find_edge_in_either_direction(&self, from: NodeId, to: NodeId) -> Option<EdgeId> {
        self.find_edge(from, to).or_else(|| self.find_edge(to, from))
    }

    /// Like `find_edge_in_either_direction`, also reporting whether the match
    /// was found on the reverse side
    pub fn find_edge_indicate_if_reverse(&self, from: NodeId, to: NodeId) -> Option<(EdgeId, bool)> {
        self.find_edge(from, to)
            .map(|e| (e, false))
            .or_else(|| self.find_edge(to, from).map(|e| (e, true)))
    }

    /// Live edges grouped by source, in arena order within each node
    pub fn input_edges(&self) -> Vec<InputEdge<E>> {
        let mut edges = Vec::with_capacity(self.number_of_edges as usize);
        for node in 0..self.number_of_nodes() {
            for e in self.adjacent_edge_range(node) {
                let edge = &self.edge_list[e as usize];
                edges.push(InputEdge::new(node, edge.target, edge.data));
            }
        }
        edges
    }

    /// Drop every edge for which `keep` returns false
    ///
    /// Returns the number of removed edges.
    pub fn retain_edges(&mut self, mut keep: impl FnMut(NodeId, NodeId, &E) -> bool) -> u32 {
        let mut removed = 0;
        for node in 0..self.number_of_nodes() {
            let mut e = self.begin_edges(node);
            while e < self.end_edges(node) {
                let edge = self.edge_list[e as usize];
                if keep(node, edge.target, &edge.data) {
                    e += 1;
                } else {
                    self.delete_edge(node, e);
                    removed += 1;
                }
            }
        }
        removed
    }
}

impl<E: EdgeDataExt + Default> AdjacencyGraph for DynamicGraph<E> {
    type EdgeData = E;

    fn number_of_nodes(&self) -> u32 {
        DynamicGraph::number_of_nodes(self)
    }

    fn number_of_edges(&self) -> u32 {
        DynamicGraph::number_of_edges(self)
    }

    fn adjacent_edge_range(&self, node: NodeId) -> Range<EdgeId> {
        DynamicGraph::adjacent_edge_range(self, node)
    }

    fn target(&self, edge: EdgeId) -> NodeId {
        DynamicGraph::target(self, edge)
    }

    fn edge_data(&self, edge: EdgeId) -> &E {
        DynamicGraph::edge_data(self, edge)
    }

    fn out_degree(&self, node: NodeId) -> u32 {
        DynamicGraph::out_degree(self, node)
    }
}

impl<E: EdgeDataExt + Default> DynamicGraph<E> {
    /// Number of out-edges of `node` flagged forward
    pub fn directed_out_degree(&self, node: NodeId) -> u32 {
        AdjacencyGraph::directed_out_degree(self, node)
    }
}

/// Build the preprocessing graph from imported road segments
///
/// Every segment is stored in both adjacency runs, the reverse copy with its
/// direction flags exchanged, unless the segment is one half of a split way,
/// which is oriented along its open direction and stored once.
/// Self-loops and segments closed in both directions are dropped and weights
/// are clamped to at least 1.
pub fn build_node_based_graph(nodes: u32, import_edges: &[ImportEdge]) -> NodeBasedDynamicGraph {
    let mut edges: Vec<InputEdge<NodeBasedEdgeData>> = Vec::with_capacity(import_edges.len() * 2);
    let mut skipped = 0usize;

    for &import in import_edges {
        if !import.forward && !import.backward {
            skipped += 1;
            continue;
        }
        if import.source == import.target {
            skipped += 1;
            continue;
        }
        // A split half is stored once, in the run of the node it leaves
        let import = if import.is_split && !import.forward {
            import.reversed()
        } else {
            import
        };

        let flags = EdgeFlags::empty()
            .with(EdgeFlags::FORWARD, import.forward)
            .with(EdgeFlags::BACKWARD, import.backward)
            .with(EdgeFlags::ROUNDABOUT, import.roundabout)
            .with(EdgeFlags::ACCESS_RESTRICTED, import.access_restricted)
            .with(EdgeFlags::IGNORE_IN_GRID, import.ignore_in_grid);
        let data = NodeBasedEdgeData {
            distance: import.weight.max(1),
            name_id: import.name_id,
            travel_mode: import.travel_mode,
            flags,
        };

        edges.push(InputEdge::new(import.source, import.target, data));
        if !import.is_split {
            let reverse = NodeBasedEdgeData {
                flags: flags.reversed(),
                ..data
            };
            edges.push(InputEdge::new(import.target, import.source, reverse));
        }
    }

    edges.par_sort_by_key(InputEdge::key);
    debug!(
        nodes,
        directed_edges = edges.len(),
        skipped,
        "Built node-based edge list"
    );

    DynamicGraph::new(nodes, &edges)
}
