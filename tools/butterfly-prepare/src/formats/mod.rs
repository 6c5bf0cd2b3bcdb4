//! Binary file formats
//!
//! - `.osrm`: node-based graph (nodes + road segments) produced by extraction
//! - `.osrm.restrictions`: turn restrictions in external node ids
//! - `.hsgr`: query graph snapshot (CSR arrays + checksum)
//!
//! Every file starts with a `Fingerprint`. Scalars are in the byte order of the
//! producing machine; see `endian`.

pub mod crc;
pub mod endian;
pub mod fingerprint;
pub mod node_based;
pub mod query_graph;
pub mod record;
pub mod restrictions;

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Error, Result};
use endian::ByteOrder;
use fingerprint::Fingerprint;
use record::{decode_all, encode_all, FixedRecord, RecordReader};

pub use node_based::{EdgeRecord, LoadSummary, LoadedGraph, NodeBasedGraphFile, NodeRecord};
pub use query_graph::QueryGraphFile;
pub use restrictions::RestrictionsFile;

const IO_BUFFER: usize = 1 << 20;

/// Sequential reader over a fingerprinted graph file
pub(crate) struct GraphReader {
    path: PathBuf,
    inner: BufReader<File>,
    remaining: u64,
    order: ByteOrder,
}

impl GraphReader {
    /// Open `path`, reject empty files and consume the fingerprint
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(Error::io(path, "file"))?;
        let len = file.metadata().map_err(Error::io(path, "file"))?.len();
        if len == 0 {
            return Err(Error::EmptyFile(path.to_path_buf()));
        }

        let mut inner = BufReader::with_capacity(IO_BUFFER, file);
        let mut raw = vec![0u8; Fingerprint::SIZE];
        inner
            .read_exact(&mut raw)
            .map_err(Error::io(path, "fingerprint"))?;

        let magic = [raw[0], raw[1], raw[2], raw[3]];
        let order = Fingerprint::detect_byte_order(magic).ok_or_else(|| Error::BadMagic {
            path: path.to_path_buf(),
            found: u32::from_ne_bytes(magic),
        })?;
        if order == ByteOrder::Swapped {
            info!(path = %path.display(), "File uses foreign byte order, converting on read");
        }

        let fingerprint = Fingerprint::decode(&mut RecordReader::new(&raw, order));
        fingerprint.warn_on_mismatch(path);

        Ok(Self {
            path: path.to_path_buf(),
            inner,
            remaining: len - Fingerprint::SIZE as u64,
            order,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// Bytes left after the current position
    pub(crate) fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Read exactly `len` raw bytes
    ///
    /// Checks the length against the file size first, so a corrupt count
    /// cannot trigger a huge allocation.
    pub(crate) fn read_block(&mut self, len: usize, what: &'static str) -> Result<Vec<u8>> {
        if len as u64 > self.remaining {
            return Err(Error::Truncated {
                path: self.path.clone(),
                what,
            });
        }
        let mut buf = vec![0u8; len];
        self.inner
            .read_exact(&mut buf)
            .map_err(Error::io(&self.path, what))?;
        self.remaining -= len as u64;
        Ok(buf)
    }

    pub(crate) fn read_u32(&mut self, what: &'static str) -> Result<u32> {
        let raw = self.read_block(4, what)?;
        Ok(self
            .order
            .apply(u32::from_ne_bytes([raw[0], raw[1], raw[2], raw[3]])))
    }

    /// Read `count` records of type `T` in one bulk read
    pub(crate) fn read_records<T: FixedRecord>(&mut self, count: u32, what: &'static str) -> Result<Vec<T>> {
        let block = self.read_block(count as usize * T::SIZE, what)?;
        Ok(decode_all(&block, self.order))
    }
}

/// Sequential writer for a fingerprinted graph file
pub(crate) struct GraphWriter {
    path: PathBuf,
    inner: BufWriter<File>,
    order: ByteOrder,
}

impl GraphWriter {
    /// Create `path` and write the fingerprint of this build
    pub(crate) fn create(path: &Path, order: ByteOrder) -> Result<Self> {
        let file = File::create(path).map_err(Error::io(path, "file"))?;
        let mut writer = Self {
            path: path.to_path_buf(),
            inner: BufWriter::with_capacity(IO_BUFFER, file),
            order,
        };
        let fingerprint = writer.encode(&[Fingerprint::current()]);
        writer.write_block(&fingerprint)?;
        Ok(writer)
    }

    pub(crate) fn encode<T: FixedRecord>(&self, records: &[T]) -> Vec<u8> {
        encode_all(records, self.order)
    }

    pub(crate) fn write_block(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner
            .write_all(bytes)
            .map_err(Error::io(&self.path, "file"))
    }

    pub(crate) fn write_u32(&mut self, value: u32) -> Result<()> {
        let bytes = self.order.apply(value).to_ne_bytes();
        self.write_block(&bytes)
    }

    /// Write a record count followed by the records
    pub(crate) fn write_counted<T: FixedRecord>(&mut self, records: &[T]) -> Result<()> {
        let count = u32::try_from(records.len())
            .map_err(|_| Error::corrupt(&self.path, "record count exceeds u32"))?;
        self.write_u32(count)?;
        let block = self.encode(records);
        self.write_block(&block)
    }

    pub(crate) fn finish(mut self) -> Result<()> {
        self.inner.flush().map_err(Error::io(&self.path, "file"))
    }
}
