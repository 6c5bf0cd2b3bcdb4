//! `.hsgr` query graph snapshot
//!
//! Format (file byte order):
//!
//!   fingerprint:     48 bytes
//!   checksum:        u32  // CRC-32C of the encoded edge array
//!   node_array_len:  u32  // number of nodes + 1
//!   edge_count:      u32
//!   node_array:      node_array_len × 4 bytes
//!     first_edge: u32
//!   edge_array:      edge_count × 16 bytes
//!     target: u32, distance: i32, id: u32, flags: u32
//!
//! Both arrays are the memory image of `StaticGraph<QueryEdgeData>` and are
//! read back with one bulk read each.

use std::path::Path;
use std::time::Instant;

use tracing::info;

use super::crc;
use super::endian::ByteOrder;
use super::record::{decode_all, FixedRecord, RecordReader, RecordWriter};
use super::{GraphReader, GraphWriter};
use crate::error::{Error, Result};
use crate::graph::static_graph::csr_violation;
use crate::graph::{EdgeArrayEntry, EdgeFlags, NodeArrayEntry, QueryEdgeData, QueryGraph};

type QueryEdgeEntry = EdgeArrayEntry<QueryEdgeData>;

impl FixedRecord for NodeArrayEntry {
    const SIZE: usize = 4;

    fn encode(&self, out: &mut RecordWriter<'_>) {
        out.put_u32(self.first_edge);
    }

    fn decode(input: &mut RecordReader<'_>) -> Self {
        Self {
            first_edge: input.u32(),
        }
    }
}

impl FixedRecord for QueryEdgeEntry {
    const SIZE: usize = 16;

    fn encode(&self, out: &mut RecordWriter<'_>) {
        out.put_u32(self.target);
        out.put_i32(self.data.distance);
        out.put_u32(self.data.id);
        out.put_u32(self.data.flags.bits());
    }

    fn decode(input: &mut RecordReader<'_>) -> Self {
        Self {
            target: input.u32(),
            data: QueryEdgeData {
                distance: input.i32(),
                id: input.u32(),
                flags: EdgeFlags::from_bits(input.u32()),
            },
        }
    }
}

pub struct QueryGraphFile;

impl QueryGraphFile {
    /// Write `graph` in native byte order and return the stored checksum
    pub fn write(path: &Path, graph: &QueryGraph) -> Result<u32> {
        Self::write_with_order(path, graph, ByteOrder::Native)
    }

    pub fn write_with_order(path: &Path, graph: &QueryGraph, order: ByteOrder) -> Result<u32> {
        let start = Instant::now();
        let mut writer = GraphWriter::create(path, order)?;

        let nodes = writer.encode(graph.node_array());
        let edges = writer.encode(graph.edge_array());
        let checksum = crc::checksum(&edges);

        writer.write_u32(checksum)?;
        writer.write_u32(graph.node_array().len() as u32)?;
        writer.write_u32(graph.number_of_edges())?;
        writer.write_block(&nodes)?;
        writer.write_block(&edges)?;
        writer.finish()?;

        info!(
            path = %path.display(),
            nodes = graph.number_of_nodes(),
            edges = graph.number_of_edges(),
            checksum = format_args!("0x{checksum:08x}"),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Wrote query graph"
        );
        Ok(checksum)
    }

    /// Read and validate a snapshot, returning the graph and its checksum
    pub fn read(path: &Path) -> Result<(QueryGraph, u32)> {
        let start = Instant::now();
        let mut reader = GraphReader::open(path)?;

        let stored = reader.read_u32("checksum")?;
        let node_array_len = reader.read_u32("node count")?;
        let edge_count = reader.read_u32("edge count")?;
        if node_array_len == 0 {
            return Err(Error::corrupt(path, "node array is empty"));
        }

        let node_array = reader.read_records::<NodeArrayEntry>(node_array_len, "node array")?;
        let edge_block = reader.read_block(edge_count as usize * QueryEdgeEntry::SIZE, "edge array")?;
        if reader.remaining() != 0 {
            return Err(Error::corrupt(
                path,
                format!("{} trailing bytes after the edge array", reader.remaining()),
            ));
        }

        let computed = crc::checksum(&edge_block);
        if computed != stored {
            return Err(Error::ChecksumMismatch {
                path: path.to_path_buf(),
                stored,
                computed,
            });
        }

        if let Some(reason) = csr_violation(&node_array, edge_count as usize) {
            return Err(Error::corrupt(path, reason));
        }

        let edge_array: Vec<QueryEdgeEntry> = decode_all(&edge_block, reader.byte_order());
        let nodes = node_array_len - 1;
        if let Some(bad) = edge_array.iter().position(|e| e.target >= nodes) {
            return Err(Error::corrupt(
                path,
                format!("edge {bad} targets node {} of {nodes}", edge_array[bad].target),
            ));
        }

        let graph = QueryGraph::from_parts(node_array, edge_array);
        info!(
            path = %path.display(),
            nodes = graph.number_of_nodes(),
            edges = graph.number_of_edges(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded query graph"
        );
        Ok((graph, stored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::InputEdge;
    use std::io::{Seek, SeekFrom, Write};
    use tempfile::NamedTempFile;

    fn sample_graph() -> QueryGraph {
        let flags = EdgeFlags::from_bits(EdgeFlags::FORWARD | EdgeFlags::ROUNDABOUT);
        let edges = vec![
            InputEdge::new(0, 1, QueryEdgeData { distance: 10, id: 7, flags }),
            InputEdge::new(1, 2, QueryEdgeData { distance: 20, id: 8, flags }),
            InputEdge::new(2, 0, QueryEdgeData { distance: 30, id: 9, flags }),
            InputEdge::new(2, 1, QueryEdgeData { distance: 5, id: 9, flags }),
        ];
        QueryGraph::new(4, edges)
    }

    #[test]
    fn test_write_read() {
        let temp = NamedTempFile::new().unwrap();
        let graph = sample_graph();
        let written = QueryGraphFile::write(temp.path(), &graph).unwrap();

        let len = std::fs::metadata(temp.path()).unwrap().len();
        assert_eq!(len, 48 + 12 + 5 * 4 + 4 * 16);

        let (loaded, checksum) = QueryGraphFile::read(temp.path()).unwrap();
        assert_eq!(checksum, written);
        assert_eq!(loaded.node_array(), graph.node_array());
        assert_eq!(loaded.edge_array(), graph.edge_array());
    }

    #[test]
    fn test_foreign_byte_order_snapshot() {
        let temp = NamedTempFile::new().unwrap();
        let graph = sample_graph();
        QueryGraphFile::write_with_order(temp.path(), &graph, ByteOrder::Swapped).unwrap();
        let (loaded, _) = QueryGraphFile::read(temp.path()).unwrap();
        assert_eq!(loaded, graph);
    }

    #[test]
    fn test_corrupted_edge_fails_checksum() {
        let mut temp = NamedTempFile::new().unwrap();
        QueryGraphFile::write(temp.path(), &sample_graph()).unwrap();

        // Flip a byte inside the edge array
        let len = std::fs::metadata(temp.path()).unwrap().len();
        temp.seek(SeekFrom::Start(len - 5)).unwrap();
        temp.write_all(&[0xFF]).unwrap();
        temp.flush().unwrap();

        let err = QueryGraphFile::read(temp.path()).unwrap_err();
        assert!(matches!(err, Error::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_corrupted_offsets_are_rejected() {
        let mut temp = NamedTempFile::new().unwrap();
        QueryGraphFile::write(temp.path(), &sample_graph()).unwrap();

        // Second node offset becomes larger than the edge count
        temp.seek(SeekFrom::Start(48 + 12 + 4)).unwrap();
        temp.write_all(&99u32.to_ne_bytes()).unwrap();
        temp.flush().unwrap();

        let err = QueryGraphFile::read(temp.path()).unwrap_err();
        assert!(matches!(err, Error::Corrupt { .. }), "{err}");
    }

    #[test]
    fn test_trailing_bytes_are_rejected() {
        let temp = NamedTempFile::new().unwrap();
        QueryGraphFile::write(temp.path(), &sample_graph()).unwrap();
        let mut file = std::fs::OpenOptions::new().append(true).open(temp.path()).unwrap();
        file.write_all(&[0u8; 3]).unwrap();
        file.flush().unwrap();

        let err = QueryGraphFile::read(temp.path()).unwrap_err();
        assert!(matches!(err, Error::Corrupt { .. }), "{err}");
        assert!(err.to_string().contains("3 trailing bytes"), "{err}");
    }

    #[test]
    fn test_truncated_snapshot() {
        let temp = NamedTempFile::new().unwrap();
        QueryGraphFile::write(temp.path(), &sample_graph()).unwrap();
        let len = std::fs::metadata(temp.path()).unwrap().len();
        let file = std::fs::OpenOptions::new().write(true).open(temp.path()).unwrap();
        file.set_len(len - 1).unwrap();

        let err = QueryGraphFile::read(temp.path()).unwrap_err();
        assert!(matches!(err, Error::Truncated { what: "edge array", .. }));
    }
}
