//! `.osrm` node-based graph file
//!
//! Format (file byte order, see `formats::endian`):
//!
//!   fingerprint: 48 bytes
//!   node_count:  u32
//!   nodes:       node_count × 14 bytes
//!     lat: i32, lon: i32, node_id: u32, barrier: u8, traffic_lights: u8
//!   edge_count:  u32
//!   edges:       edge_count × 27 bytes
//!     source: u32, target: u32, length: i32, direction: i16, weight: i32,
//!     name_id: u32, roundabout: u8, ignore_in_grid: u8,
//!     access_restricted: u8, travel_mode: u8, is_split: u8
//!
//! `node_id` and edge endpoints are external ids. `direction` is 0 (open both
//! ways), 1 (forward only) or 2 (backward only).

use std::path::Path;
use std::time::Instant;

use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info};

use super::endian::ByteOrder;
use super::record::{FixedRecord, RecordReader, RecordWriter};
use super::{GraphReader, GraphWriter};
use crate::error::{Error, Result};
use crate::graph::ImportEdge;
use crate::restriction::TurnRestriction;
use crate::types::{Coordinate, NodeId, TravelMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRecord {
    pub lat: i32,
    pub lon: i32,
    pub node_id: u32,
    pub barrier: bool,
    pub traffic_lights: bool,
}

impl FixedRecord for NodeRecord {
    const SIZE: usize = 14;

    fn encode(&self, out: &mut RecordWriter<'_>) {
        out.put_i32(self.lat);
        out.put_i32(self.lon);
        out.put_u32(self.node_id);
        out.put_bool(self.barrier);
        out.put_bool(self.traffic_lights);
    }

    fn decode(input: &mut RecordReader<'_>) -> Self {
        Self {
            lat: input.i32(),
            lon: input.i32(),
            node_id: input.u32(),
            barrier: input.bool(),
            traffic_lights: input.bool(),
        }
    }
}

pub const DIRECTION_OPEN: i16 = 0;
pub const DIRECTION_FORWARD: i16 = 1;
pub const DIRECTION_BACKWARD: i16 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeRecord {
    pub source: u32,
    pub target: u32,
    pub length: i32,
    pub direction: i16,
    pub weight: i32,
    pub name_id: u32,
    pub roundabout: bool,
    pub ignore_in_grid: bool,
    pub access_restricted: bool,
    pub travel_mode: TravelMode,
    pub is_split: bool,
}

impl EdgeRecord {
    /// Open road between two external ids
    pub fn open(source: u32, target: u32, weight: i32) -> Self {
        Self {
            source,
            target,
            length: weight,
            direction: DIRECTION_OPEN,
            weight,
            name_id: 0,
            roundabout: false,
            ignore_in_grid: false,
            access_restricted: false,
            travel_mode: TravelMode::DEFAULT,
            is_split: false,
        }
    }

    pub fn with_direction(self, direction: i16) -> Self {
        Self { direction, ..self }
    }
}

impl FixedRecord for EdgeRecord {
    const SIZE: usize = 27;

    fn encode(&self, out: &mut RecordWriter<'_>) {
        out.put_u32(self.source);
        out.put_u32(self.target);
        out.put_i32(self.length);
        out.put_i16(self.direction);
        out.put_i32(self.weight);
        out.put_u32(self.name_id);
        out.put_bool(self.roundabout);
        out.put_bool(self.ignore_in_grid);
        out.put_bool(self.access_restricted);
        out.put_u8(self.travel_mode.0);
        out.put_bool(self.is_split);
    }

    fn decode(input: &mut RecordReader<'_>) -> Self {
        Self {
            source: input.u32(),
            target: input.u32(),
            length: input.i32(),
            direction: input.i16(),
            weight: input.i32(),
            name_id: input.u32(),
            roundabout: input.bool(),
            ignore_in_grid: input.bool(),
            access_restricted: input.bool(),
            travel_mode: TravelMode(input.u8()),
            is_split: input.bool(),
        }
    }
}

/// Counters collected while loading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadSummary {
    pub nodes: u32,
    pub edges_read: u32,
    pub unresolved_edges: u32,
    pub merged_duplicate_edges: u32,
    pub restrictions_read: u32,
    pub dropped_restrictions: u32,
}

/// Node-based graph in internal ids, ready for `build_node_based_graph`
#[derive(Debug, Clone, Default)]
pub struct LoadedGraph {
    /// Indexed by internal node id
    pub coordinates: Vec<Coordinate>,
    /// External id of every internal node
    pub external_ids: Vec<u32>,
    pub edges: Vec<ImportEdge>,
    pub barrier_nodes: FxHashSet<NodeId>,
    pub traffic_lights: FxHashSet<NodeId>,
    pub restrictions: Vec<TurnRestriction>,
    pub summary: LoadSummary,
}

impl LoadedGraph {
    pub fn number_of_nodes(&self) -> u32 {
        self.coordinates.len() as u32
    }
}

pub struct NodeBasedGraphFile;

impl NodeBasedGraphFile {
    /// Write a `.osrm` file in native byte order
    pub fn write(path: &Path, nodes: &[NodeRecord], edges: &[EdgeRecord]) -> Result<()> {
        Self::write_with_order(path, nodes, edges, ByteOrder::Native)
    }

    /// Write a `.osrm` file for a machine of the given byte order
    pub fn write_with_order(
        path: &Path,
        nodes: &[NodeRecord],
        edges: &[EdgeRecord],
        order: ByteOrder,
    ) -> Result<()> {
        let mut writer = GraphWriter::create(path, order)?;
        writer.write_counted(nodes)?;
        writer.write_counted(edges)?;
        writer.finish()
    }

    /// Read raw node and edge records
    pub fn read(path: &Path) -> Result<(Vec<NodeRecord>, Vec<EdgeRecord>)> {
        let mut reader = GraphReader::open(path)?;

        let node_count = reader.read_u32("node count")?;
        if node_count == 0 {
            return Err(Error::NoNodes(path.to_path_buf()));
        }
        let nodes = reader.read_records::<NodeRecord>(node_count, "node records")?;

        let edge_count = reader.read_u32("edge count")?;
        let edges = reader.read_records::<EdgeRecord>(edge_count, "edge records")?;

        if reader.remaining() != 0 {
            debug!(
                path = %reader.path().display(),
                trailing_bytes = reader.remaining(),
                "Ignoring trailing bytes"
            );
        }
        Ok((nodes, edges))
    }

    /// Read a `.osrm` file and renumber it into internal ids
    ///
    /// `restrictions` are in external ids and are renumbered through the same
    /// node table. Edges or restrictions mentioning unknown nodes are skipped
    /// and counted in the summary.
    pub fn load(path: &Path, restrictions: &[TurnRestriction]) -> Result<LoadedGraph> {
        let start = Instant::now();
        let (nodes, edges) = Self::read(path)?;

        let mut graph = LoadedGraph {
            coordinates: Vec::with_capacity(nodes.len()),
            external_ids: Vec::with_capacity(nodes.len()),
            ..Default::default()
        };
        let mut ext_to_int: FxHashMap<u32, NodeId> = FxHashMap::default();
        ext_to_int.reserve(nodes.len());

        for (internal, node) in nodes.iter().enumerate() {
            let internal = internal as NodeId;
            ext_to_int.insert(node.node_id, internal);
            graph.coordinates.push(Coordinate::new(node.lat, node.lon));
            graph.external_ids.push(node.node_id);
            if node.barrier {
                graph.barrier_nodes.insert(internal);
            }
            if node.traffic_lights {
                graph.traffic_lights.insert(internal);
            }
        }

        let mut import = Vec::with_capacity(edges.len());
        let mut unresolved = 0u32;
        for record in &edges {
            let (forward, backward) = match record.direction {
                DIRECTION_OPEN => (true, true),
                DIRECTION_FORWARD => (true, false),
                DIRECTION_BACKWARD => (false, true),
                other => {
                    return Err(Error::corrupt(
                        path,
                        format!(
                            "bogus direction {other} on edge {} -> {}",
                            record.source, record.target
                        ),
                    ))
                }
            };

            let (Some(&source), Some(&target)) =
                (ext_to_int.get(&record.source), ext_to_int.get(&record.target))
            else {
                unresolved += 1;
                continue;
            };

            let edge = ImportEdge {
                source,
                target,
                length: record.length,
                weight: record.weight.max(1),
                forward,
                backward,
                name_id: record.name_id,
                roundabout: record.roundabout,
                ignore_in_grid: record.ignore_in_grid,
                access_restricted: record.access_restricted,
                travel_mode: record.travel_mode,
                is_split: record.is_split,
            };
            import.push(if source > target { edge.reversed() } else { edge });
        }

        import.par_sort_by_key(|e| (e.source, e.target));
        let before_merge = import.len();
        graph.edges = merge_parallel_edges(import);

        graph.restrictions = Vec::with_capacity(restrictions.len());
        for r in restrictions {
            let mapped = (
                ext_to_int.get(&r.via),
                ext_to_int.get(&r.from),
                ext_to_int.get(&r.to),
            );
            match mapped {
                (Some(&via), Some(&from), Some(&to)) => graph.restrictions.push(TurnRestriction {
                    via,
                    from,
                    to,
                    is_only: r.is_only,
                }),
                _ => {
                    debug!(via = r.via, from = r.from, to = r.to, "Dropping restriction on unknown node");
                    graph.summary.dropped_restrictions += 1;
                }
            }
        }

        graph.summary.nodes = nodes.len() as u32;
        graph.summary.edges_read = edges.len() as u32;
        graph.summary.unresolved_edges = unresolved;
        graph.summary.merged_duplicate_edges = (before_merge - graph.edges.len()) as u32;
        graph.summary.restrictions_read = restrictions.len() as u32;

        info!(
            path = %path.display(),
            nodes = graph.summary.nodes,
            edges = graph.edges.len(),
            unresolved_edges = unresolved,
            merged_duplicates = graph.summary.merged_duplicate_edges,
            barriers = graph.barrier_nodes.len(),
            traffic_lights = graph.traffic_lights.len(),
            restrictions = graph.restrictions.len(),
            dropped_restrictions = graph.summary.dropped_restrictions,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded node-based graph"
        );
        Ok(graph)
    }
}

/// Resolve parallel segments in a list sorted by `(source, target)`
///
/// - same directions: keep one, with the smaller weight
/// - a two-way segment next to a one-way one: when the two-way segment is
///   not heavier it absorbs the one-way segment, otherwise it is closed in
///   the one-way segment's direction and both are kept
/// - opposite one-ways: both kept
fn merge_parallel_edges(sorted: Vec<ImportEdge>) -> Vec<ImportEdge> {
    let mut merged: Vec<ImportEdge> = Vec::with_capacity(sorted.len());

    for edge in sorted {
        let Some(prev) = merged.last_mut() else {
            merged.push(edge);
            continue;
        };
        if (prev.source, prev.target) != (edge.source, edge.target) {
            merged.push(edge);
            continue;
        }

        let prev_bidirectional = prev.forward && prev.backward;
        let edge_bidirectional = edge.forward && edge.backward;

        if prev.forward == edge.forward && prev.backward == edge.backward {
            let weight = prev.weight.min(edge.weight);
            *prev = ImportEdge { weight, ..edge };
        } else if prev_bidirectional && !edge_bidirectional {
            if prev.weight > edge.weight {
                prev.forward = !edge.forward;
                prev.backward = !edge.backward;
                merged.push(edge);
            }
        } else if edge_bidirectional && !prev_bidirectional {
            if prev.weight <= edge.weight {
                let closed = ImportEdge {
                    forward: !prev.forward,
                    backward: !prev.backward,
                    ..edge
                };
                merged.push(closed);
            } else {
                *prev = edge;
            }
        } else {
            merged.push(edge);
        }
    }

    merged
}
