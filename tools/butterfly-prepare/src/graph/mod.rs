//! Graph containers used by the preprocessing pipeline
//!
//! - `DynamicGraph`: mutable adjacency arena, used while the graph is being
//!   compressed and filtered
//! - `StaticGraph`: immutable CSR layout, the shape written to disk and walked
//!   by the query engine
//!
//! Both expose the same read-only surface through `AdjacencyGraph` so the
//! component passes run unchanged on either.

pub mod dynamic_graph;
pub mod edge_data;
pub mod static_graph;

use std::ops::Range;

use crate::types::{EdgeId, EdgeWeight, NameId, NodeId, TravelMode};

pub use dynamic_graph::{build_node_based_graph, DynamicGraph, NodeBasedDynamicGraph};
pub use edge_data::{EdgeDataExt, EdgeFlags, NodeBasedEdgeData, QueryEdgeData};
pub use static_graph::{EdgeArrayEntry, NodeArrayEntry, QueryGraph, StaticGraph};

/// Road segment as it comes out of the extract, after renumbering to
/// internal node ids and duplicate merging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportEdge {
    pub source: NodeId,
    pub target: NodeId,
    /// Geometric length in meters
    pub length: i32,
    pub weight: EdgeWeight,
    pub forward: bool,
    pub backward: bool,
    pub name_id: NameId,
    pub roundabout: bool,
    pub ignore_in_grid: bool,
    pub access_restricted: bool,
    pub travel_mode: TravelMode,
    /// One half of a way split for a mode change; only stored in its own direction
    pub is_split: bool,
}

impl ImportEdge {
    /// Open in both directions, default mode, no name
    pub fn bidirectional(source: NodeId, target: NodeId, weight: EdgeWeight) -> Self {
        Self {
            source,
            target,
            length: weight,
            weight,
            forward: true,
            backward: true,
            name_id: 0,
            roundabout: false,
            ignore_in_grid: false,
            access_restricted: false,
            travel_mode: TravelMode::DEFAULT,
            is_split: false,
        }
    }

    pub fn oneway(source: NodeId, target: NodeId, weight: EdgeWeight) -> Self {
        Self {
            backward: false,
            ..Self::bidirectional(source, target, weight)
        }
    }

    /// Exchange endpoints and direction flags
    pub fn reversed(self) -> Self {
        Self {
            source: self.target,
            target: self.source,
            forward: self.backward,
            backward: self.forward,
            ..self
        }
    }
}

/// Directed edge used to bulk-build a graph. Ordered by `(source, target)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEdge<E> {
    pub source: NodeId,
    pub target: NodeId,
    pub data: E,
}

impl<E> InputEdge<E> {
    pub fn new(source: NodeId, target: NodeId, data: E) -> Self {
        Self {
            source,
            target,
            data,
        }
    }

    #[inline]
    pub fn key(&self) -> (NodeId, NodeId) {
        (self.source, self.target)
    }
}

/// Read-only adjacency view shared by the dynamic and the static graph
pub trait AdjacencyGraph {
    type EdgeData: EdgeDataExt;

    fn number_of_nodes(&self) -> u32;

    fn number_of_edges(&self) -> u32;

    /// Half-open range of edge ids leaving `node`
    fn adjacent_edge_range(&self, node: NodeId) -> Range<EdgeId>;

    fn target(&self, edge: EdgeId) -> NodeId;

    fn edge_data(&self, edge: EdgeId) -> &Self::EdgeData;

    #[inline]
    fn out_degree(&self, node: NodeId) -> u32 {
        let range = self.adjacent_edge_range(node);
        range.end - range.start
    }

    /// Number of out-edges flagged forward
    fn directed_out_degree(&self, node: NodeId) -> u32 {
        self.adjacent_edge_range(node)
            .filter(|&e| self.edge_data(e).is_forward())
            .count() as u32
    }

    /// Iterate `(edge, target)` pairs of `node`
    fn neighbors(&self, node: NodeId) -> impl Iterator<Item = (EdgeId, NodeId)> + '_ {
        self.adjacent_edge_range(node).map(move |e| (e, self.target(e)))
    }
}
