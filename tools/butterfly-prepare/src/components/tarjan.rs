//! Iterative Tarjan SCC over the turn-restricted node-based graph
//!
//! Recursion is simulated with an explicit frame stack so graphs with millions
//! of nodes do not overflow the call stack. A frame is `(node, parent, phase)`:
//! the `Before` phase discovers the node and schedules its children, the
//! `After` phase runs once every child has been finished and propagates the
//! low-link to the parent.
//!
//! Only forward-flagged edges are followed. Tree edges obey every turn rule;
//! back edges to nodes still on the Tarjan stack only obey the explicit
//! restrictions, so dead-end streets stay attached to the network.

use std::time::Instant;

use rustc_hash::FxHashSet;
use tracing::{debug, info};

use super::{restriction_allows, uturn_allowed, ComponentLabels};
use crate::graph::{AdjacencyGraph, EdgeDataExt};
use crate::restriction::RestrictionMap;
use crate::types::NodeId;

const UNVISITED: u32 = u32::MAX;

/// Components above this size are logged
pub const DEFAULT_LARGE_COMPONENT_THRESHOLD: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Before,
    After,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    node: NodeId,
    parent: NodeId,
    phase: Phase,
}

#[derive(Debug, Clone, Copy)]
struct TarjanNode {
    index: u32,
    low_link: u32,
    on_stack: bool,
}

impl Default for TarjanNode {
    fn default() -> Self {
        Self {
            index: UNVISITED,
            low_link: UNVISITED,
            on_stack: false,
        }
    }
}

pub struct TarjanScc<'a, G> {
    graph: &'a G,
    restrictions: &'a RestrictionMap,
    barriers: &'a FxHashSet<NodeId>,
    large_component_threshold: u32,
    component_ids: Vec<u32>,
    component_sizes: Vec<u32>,
    size_one_components: u32,
}

impl<'a, G: AdjacencyGraph> TarjanScc<'a, G> {
    pub fn new(graph: &'a G, restrictions: &'a RestrictionMap, barriers: &'a FxHashSet<NodeId>) -> Self {
        Self {
            graph,
            restrictions,
            barriers,
            large_component_threshold: DEFAULT_LARGE_COMPONENT_THRESHOLD,
            component_ids: Vec::new(),
            component_sizes: Vec::new(),
            size_one_components: 0,
        }
    }

    pub fn with_large_component_threshold(mut self, threshold: u32) -> Self {
        self.large_component_threshold = threshold;
        self
    }

    /// Number of components consisting of a single node
    pub fn size_one_components(&self) -> u32 {
        self.size_one_components
    }

    /// Whether the traversal may take the tree edge `u -> v -> w`
    fn tree_edge_allowed(&self, u: NodeId, v: NodeId, w: NodeId, only_target: Option<NodeId>) -> bool {
        if self.barriers.contains(&v) && u != w {
            return false;
        }
        uturn_allowed(self.graph, u, v, w) && restriction_allows(self.restrictions, only_target, u, v, w)
    }

    /// Label every node. Calling it again recomputes from scratch.
    ///
    /// Panics if the Tarjan stack underflows, which can only happen through a
    /// defect in the traversal itself.
    pub fn run(&mut self) {
        let start_time = Instant::now();
        let n = self.graph.number_of_nodes() as usize;

        let mut nodes = vec![TarjanNode::default(); n];
        let mut tarjan_stack: Vec<NodeId> = Vec::new();
        let mut frames: Vec<Frame> = Vec::new();
        let mut index = 0u32;

        self.component_ids = vec![UNVISITED; n];
        self.component_sizes.clear();
        self.size_one_components = 0;

        for start in 0..n as NodeId {
            if nodes[start as usize].index != UNVISITED {
                continue;
            }
            frames.push(Frame {
                node: start,
                parent: start,
                phase: Phase::Before,
            });

            while let Some(frame) = frames.pop() {
                let v = frame.node;
                let u = frame.parent;

                match frame.phase {
                    Phase::Before => {
                        if nodes[v as usize].index != UNVISITED {
                            // Reached through another branch first
                            if nodes[v as usize].on_stack {
                                let reached = nodes[v as usize].index;
                                let parent = &mut nodes[u as usize];
                                parent.low_link = parent.low_link.min(reached);
                            }
                            continue;
                        }

                        nodes[v as usize] = TarjanNode {
                            index,
                            low_link: index,
                            on_stack: true,
                        };
                        index += 1;
                        tarjan_stack.push(v);
                        frames.push(Frame {
                            phase: Phase::After,
                            ..frame
                        });

                        let only_target = self.restrictions.check_for_emanating_is_only_turn(u, v);
                        for e in self.graph.adjacent_edge_range(v) {
                            if !self.graph.edge_data(e).is_forward() {
                                continue;
                            }
                            let w = self.graph.target(e);
                            let target = nodes[w as usize];
                            if target.index == UNVISITED {
                                if self.tree_edge_allowed(u, v, w, only_target) {
                                    frames.push(Frame {
                                        node: w,
                                        parent: v,
                                        phase: Phase::Before,
                                    });
                                }
                            } else if target.on_stack
                                && restriction_allows(self.restrictions, only_target, u, v, w)
                            {
                                let node = &mut nodes[v as usize];
                                node.low_link = node.low_link.min(target.index);
                            }
                        }
                    }
                    Phase::After => {
                        let low = nodes[v as usize].low_link;
                        if u != v {
                            let parent = &mut nodes[u as usize];
                            parent.low_link = parent.low_link.min(low);
                        }

                        if low == nodes[v as usize].index {
                            let component = self.component_sizes.len() as u32;
                            let mut size = 0u32;
                            loop {
                                let w = tarjan_stack
                                    .pop()
                                    .unwrap_or_else(|| panic!("Tarjan stack underflow at node {v}"));
                                nodes[w as usize].on_stack = false;
                                self.component_ids[w as usize] = component;
                                size += 1;
                                if w == v {
                                    break;
                                }
                            }

                            if size > self.large_component_threshold {
                                info!(component, size, "Found large component");
                            }
                            if size == 1 {
                                self.size_one_components += 1;
                            }
                            self.component_sizes.push(size);
                        }
                    }
                }
            }
        }

        assert!(tarjan_stack.is_empty(), "Tarjan stack not empty after run");
        debug!(
            nodes = n,
            components = self.component_sizes.len(),
            size_one = self.size_one_components,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Tarjan SCC done"
        );
    }
}

impl<G: AdjacencyGraph> ComponentLabels for TarjanScc<'_, G> {
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
