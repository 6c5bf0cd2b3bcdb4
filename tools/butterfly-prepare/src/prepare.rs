//! Preprocessing pipeline: `.osrm` (+ restrictions) → `.hsgr`
//!
//! Stages:
//! 1. Load and renumber the node-based graph and its turn restrictions
//! 2. Build the dynamic node-based graph
//! 3. Optionally eliminate degree-two nodes
//! 4. Label components and flag (or prune) edges in tiny components
//! 5. Materialize the static query graph and write the snapshot

use std::path::Path;
use std::time::Instant;

use serde::Serialize;
use tracing::info;

use crate::components::{compute_components, ComponentReport};
use crate::compress::{CompressionStats, GraphCompressor};
use crate::config::PrepareConfig;
use crate::error::Result;
use crate::formats::{LoadSummary, LoadedGraph, NodeBasedGraphFile, QueryGraphFile, RestrictionsFile};
use crate::graph::{
    build_node_based_graph, EdgeFlags, InputEdge, NodeBasedDynamicGraph, QueryEdgeData, QueryGraph,
};
use crate::restriction::RestrictionMap;

/// Wall-clock time spent in each stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StageTimings {
    pub load_ms: u64,
    pub build_ms: u64,
    pub compress_ms: u64,
    pub components_ms: u64,
    pub write_ms: u64,
    pub total_ms: u64,
}

/// Outcome of a `run`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrepareSummary {
    pub nodes: u32,
    pub input_edges: u32,
    pub merged_duplicate_edges: u32,
    pub restrictions: u32,
    pub dropped_restrictions: u32,
    pub compressed_nodes: u32,
    pub components: ComponentReport,
    pub tiny_edges: u32,
    pub pruned_edges: u32,
    pub query_edges: u32,
    pub network_km: f64,
    pub checksum: u32,
    pub timings: StageTimings,
}

/// Read the graph and, when given, its restriction file
pub fn load_input(graph_path: &Path, restrictions_path: Option<&Path>) -> Result<LoadedGraph> {
    let external = match restrictions_path {
        Some(path) => RestrictionsFile::read(path)?,
        None => Vec::new(),
    };
    NodeBasedGraphFile::load(graph_path, &external)
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Approximate length of all road segments in kilometers
///
/// Every segment is stored in both adjacency runs, so only `source < target`
/// copies are counted.
fn network_length_km(graph: &NodeBasedDynamicGraph, loaded: &LoadedGraph) -> f64 {
    let mut meters = 0.0;
    for edge in graph.input_edges() {
        if edge.source < edge.target {
            let a = &loaded.coordinates[edge.source as usize];
            let b = &loaded.coordinates[edge.target as usize];
            meters += a.approximate_distance(b);
        }
    }
    meters / 1000.0
}

/// Set `IN_TINY_COMPONENT` on every edge whose smaller endpoint component is
/// below `threshold`. Returns the number of flagged edges.
fn mark_tiny_components(graph: &mut NodeBasedDynamicGraph, sizes: &[u32], threshold: u32) -> u32 {
    let mut flagged = 0;
    for u in 0..graph.number_of_nodes() {
        for e in graph.adjacent_edge_range(u) {
            let v = graph.target(e);
            let size = sizes[u as usize].min(sizes[v as usize]);
            let tiny = size < threshold;
            graph.edge_data_mut(e).flags.set(EdgeFlags::IN_TINY_COMPONENT, tiny);
            flagged += tiny as u32;
        }
    }
    flagged
}

/// Run the full pipeline and write the query graph to `output`
pub fn run(
    config: &PrepareConfig,
    graph_path: &Path,
    restrictions_path: Option<&Path>,
    output: &Path,
) -> Result<PrepareSummary> {
    config.validate()?;
    let total = Instant::now();
    let mut timings = StageTimings::default();

    let start = Instant::now();
    let loaded = load_input(graph_path, restrictions_path)?;
    timings.load_ms = elapsed_ms(start);

    let start = Instant::now();
    let nodes = loaded.number_of_nodes();
    let mut graph = build_node_based_graph(nodes, &loaded.edges);
    let mut restrictions = RestrictionMap::from_restrictions(&loaded.restrictions);
    timings.build_ms = elapsed_ms(start);
    info!(
        nodes,
        edges = graph.number_of_edges(),
        restrictions = restrictions.len(),
        elapsed_ms = timings.build_ms,
        "Built node-based graph"
    );

    let start = Instant::now();
    let compression = if config.compress_degree_two {
        GraphCompressor::new(config.traffic_signal_penalty).compress(
            &mut graph,
            &mut restrictions,
            &loaded.barrier_nodes,
            &loaded.traffic_lights,
        )
    } else {
        CompressionStats::default()
    };
    timings.compress_ms = elapsed_ms(start);

    let start = Instant::now();
    let (report, sizes) = {
        let labels = compute_components(
            config.component_algorithm,
            &graph,
            &restrictions,
            &loaded.barrier_nodes,
            config.large_component_threshold,
        );
        let report = ComponentReport::without_nodes(
            config.component_algorithm,
            labels.as_ref(),
            &compression.removed,
            config.tiny_component_threshold,
        );
        let sizes: Vec<u32> = (0..nodes).map(|node| labels.component_size(node)).collect();
        (report, sizes)
    };
    let tiny_edges = mark_tiny_components(&mut graph, &sizes, config.tiny_component_threshold);
    let pruned_edges = if config.prune_tiny_components {
        graph.retain_edges(|_, _, data| !data.flags.in_tiny_component())
    } else {
        0
    };
    timings.components_ms = elapsed_ms(start);
    info!(
        algorithm = %config.component_algorithm,
        components = report.components,
        largest = report.largest,
        tiny_components = report.tiny_components,
        tiny_edges,
        pruned_edges,
        elapsed_ms = timings.components_ms,
        "Labeled components"
    );

    let network_km = network_length_km(&graph, &loaded);
    info!(network_km = format_args!("{network_km:.1}"), "Network length");

    let start = Instant::now();
    let query_edges: Vec<InputEdge<QueryEdgeData>> = graph
        .input_edges()
        .into_iter()
        .map(|edge| InputEdge::new(edge.source, edge.target, QueryEdgeData::from(edge.data)))
        .collect();
    let query_graph = QueryGraph::new(nodes, query_edges);
    let checksum = QueryGraphFile::write(output, &query_graph)?;
    timings.write_ms = elapsed_ms(start);
    timings.total_ms = elapsed_ms(total);

    let LoadSummary {
        edges_read,
        merged_duplicate_edges,
        dropped_restrictions,
        ..
    } = loaded.summary;

    info!(
        nodes,
        edges = query_graph.number_of_edges(),
        checksum = format_args!("0x{checksum:08x}"),
        elapsed_ms = timings.total_ms,
        "Preprocessing finished"
    );

    Ok(PrepareSummary {
        nodes,
        input_edges: edges_read,
        merged_duplicate_edges,
        restrictions: loaded.restrictions.len() as u32,
        dropped_restrictions,
        compressed_nodes: compression.removed_nodes,
        components: report,
        tiny_edges,
        pruned_edges,
        query_edges: query_graph.number_of_edges(),
        network_km,
        checksum,
        timings,
    })
}

/// Label components without writing anything
///
/// Runs on the uncompressed graph so labels refer to every input node.
pub fn component_report(
    config: &PrepareConfig,
    graph_path: &Path,
    restrictions_path: Option<&Path>,
) -> Result<ComponentReport> {
    config.validate()?;
    let loaded = load_input(graph_path, restrictions_path)?;
    let graph = build_node_based_graph(loaded.number_of_nodes(), &loaded.edges);
    let restrictions = RestrictionMap::from_restrictions(&loaded.restrictions);

    let start = Instant::now();
    let labels = compute_components(
        config.component_algorithm,
        &graph,
        &restrictions,
        &loaded.barrier_nodes,
        config.large_component_threshold,
    );
    let report = ComponentReport::new(config.component_algorithm, labels.as_ref(), config.tiny_component_threshold);
    info!(
        algorithm = %config.component_algorithm,
        components = report.components,
        elapsed_ms = elapsed_ms(start),
        "Labeled components"
    );
    Ok(report)
}
