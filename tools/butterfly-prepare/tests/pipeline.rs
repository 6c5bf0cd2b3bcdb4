//! End-to-end preprocessing of a synthetic extract

use std::path::{Path, PathBuf};

use butterfly_prepare::formats::endian::ByteOrder;
use butterfly_prepare::formats::{EdgeRecord, NodeBasedGraphFile, NodeRecord, QueryGraphFile, RestrictionsFile};
use butterfly_prepare::prepare::{component_report, run};
use butterfly_prepare::{ComponentAlgorithm, PrepareConfig, TurnRestriction};
use tempfile::TempDir;

const GRID: u32 = 6;

fn grid_id(row: u32, col: u32) -> u32 {
    1000 + row * GRID + col
}

/// A 6x6 grid of two-way streets plus a three-node island path
fn extract() -> (Vec<NodeRecord>, Vec<EdgeRecord>) {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    for row in 0..GRID {
        for col in 0..GRID {
            nodes.push(NodeRecord {
                lat: 50_000_000 + row as i32 * 1_000,
                lon: 4_000_000 + col as i32 * 1_000,
                node_id: grid_id(row, col),
                barrier: false,
                traffic_lights: row == 2 && col == 2,
            });
            if col + 1 < GRID {
                edges.push(EdgeRecord::open(grid_id(row, col), grid_id(row, col + 1), 12));
            }
            if row + 1 < GRID {
                edges.push(EdgeRecord::open(grid_id(row, col), grid_id(row + 1, col), 15));
            }
        }
    }
    for (i, id) in [9001, 9002, 9003].into_iter().enumerate() {
        nodes.push(NodeRecord {
            lat: 51_000_000 + i as i32 * 500,
            lon: 5_000_000,
            node_id: id,
            barrier: false,
            traffic_lights: false,
        });
    }
    edges.push(EdgeRecord::open(9001, 9002, 7));
    edges.push(EdgeRecord::open(9002, 9003, 8));
    (nodes, edges)
}

fn write_inputs(dir: &Path, order: ByteOrder) -> (PathBuf, PathBuf) {
    let (nodes, edges) = extract();
    let graph = dir.join("grid.osrm");
    NodeBasedGraphFile::write_with_order(&graph, &nodes, &edges, order).unwrap();

    let restrictions = dir.join("grid.osrm.restrictions");
    RestrictionsFile::write(
        &restrictions,
        &[
            TurnRestriction::no_turn(grid_id(1, 1), grid_id(1, 2), grid_id(2, 2)),
            TurnRestriction::only_turn(grid_id(3, 3), grid_id(3, 4), grid_id(3, 5)),
        ],
    )
    .unwrap();
    (graph, restrictions)
}

#[test]
fn test_full_pipeline() {
    let dir = TempDir::new().unwrap();
    let (graph, restrictions) = write_inputs(dir.path(), ByteOrder::Native);
    let output = dir.path().join("grid.hsgr");

    let summary = run(&PrepareConfig::default(), &graph, Some(&restrictions), &output).unwrap();

    assert_eq!(summary.nodes, 39);
    assert_eq!(summary.input_edges, 62);
    assert_eq!(summary.restrictions, 2);
    assert_eq!(summary.dropped_restrictions, 0);
    // Four grid corners and the middle of the island path
    assert_eq!(summary.compressed_nodes, 5);
    // Compressed nodes are not reported as components of their own
    assert_eq!(summary.components.nodes, 34);
    assert_eq!(summary.components.components, 2);
    assert_eq!(summary.components.size_one, 0);
    assert_eq!(summary.components.largest, 32);
    assert_eq!(summary.tiny_edges, 2);
    assert_eq!(summary.query_edges, 114);

    let (query_graph, checksum) = QueryGraphFile::read(&output).unwrap();
    assert_eq!(checksum, summary.checksum);
    assert_eq!(query_graph.number_of_nodes(), 39);
    assert_eq!(query_graph.number_of_edges(), 114);
    let tiny = query_graph
        .edge_array()
        .iter()
        .filter(|e| e.data.flags.in_tiny_component())
        .count();
    assert_eq!(tiny, 2);
}

#[test]
fn test_foreign_byte_order_input_gives_identical_snapshot() {
    let native_dir = TempDir::new().unwrap();
    let (graph, restrictions) = write_inputs(native_dir.path(), ByteOrder::Native);
    let native = run(
        &PrepareConfig::default(),
        &graph,
        Some(&restrictions),
        &native_dir.path().join("grid.hsgr"),
    )
    .unwrap();

    let swapped_dir = TempDir::new().unwrap();
    let (graph, restrictions) = write_inputs(swapped_dir.path(), ByteOrder::Swapped);
    let swapped = run(
        &PrepareConfig::default(),
        &graph,
        Some(&restrictions),
        &swapped_dir.path().join("grid.hsgr"),
    )
    .unwrap();

    assert_eq!(native.checksum, swapped.checksum);
    assert_eq!(native.query_edges, swapped.query_edges);
}

#[test]
fn test_algorithms_agree_on_two_way_network() {
    let dir = TempDir::new().unwrap();
    let (graph, restrictions) = write_inputs(dir.path(), ByteOrder::Native);

    for algorithm in [ComponentAlgorithm::Tarjan, ComponentAlgorithm::Bfs] {
        let config = PrepareConfig {
            component_algorithm: algorithm,
            ..Default::default()
        };
        let report = component_report(&config, &graph, Some(&restrictions)).unwrap();
        assert_eq!(report.components, 2, "{algorithm}");
        assert_eq!(report.largest, 36, "{algorithm}");
        assert_eq!(report.tiny_components, 1, "{algorithm}");
    }
}
