//! Build fingerprint written at the head of every graph file
//!
//! Layout (48 bytes, file byte order):
//!   magic:      u32 = 0x42465052  // "BFPR"
//!   version:    u16
//!   reserved:   u16 = 0
//!   layout_sha: [32]u8  // SHA-256 of the record layout description
//!   build_sha:  [8]u8   // truncated SHA-256 of the producing crate version
//!
//! The magic doubles as byte-order mark. Any other mismatch only produces a
//! warning: the file may still be readable, but was built by a different
//! pipeline.

use std::path::Path;
use std::sync::OnceLock;

use sha2::{Digest, Sha256};
use tracing::warn;

use super::endian::ByteOrder;
use super::record::{FixedRecord, RecordReader, RecordWriter};

pub const MAGIC: u32 = 0x4246_5052; // "BFPR"
pub const VERSION: u16 = 1;

/// Field order and widths of every record type, hashed into `layout_sha`
const LAYOUT_DESCRIPTION: &str = "\
node:i32 lat,i32 lon,u32 node_id,u8 barrier,u8 traffic_lights;\
edge:u32 source,u32 target,i32 length,i16 direction,i32 weight,u32 name_id,\
u8 roundabout,u8 ignore_in_grid,u8 access_restricted,u8 travel_mode,u8 is_split;\
restriction:u32 via,u32 from,u32 to,u8 is_only;\
query_node:u32 first_edge;\
query_edge:u32 target,i32 distance,u32 id,u32 flags";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    pub magic: u32,
    pub version: u16,
    pub reserved: u16,
    pub layout_sha: [u8; 32],
    pub build_sha: [u8; 8],
}

static CURRENT: OnceLock<Fingerprint> = OnceLock::new();

impl Fingerprint {
    /// Fingerprint of this build
    pub fn current() -> Fingerprint {
        *CURRENT.get_or_init(|| {
            let layout = Sha256::digest(LAYOUT_DESCRIPTION.as_bytes());
            let mut layout_sha = [0u8; 32];
            layout_sha.copy_from_slice(&layout);

            let build = Sha256::digest(
                concat!(env!("CARGO_PKG_NAME"), "@", env!("CARGO_PKG_VERSION")).as_bytes(),
            );
            let mut build_sha = [0u8; 8];
            build_sha.copy_from_slice(&build[..8]);

            Fingerprint {
                magic: MAGIC,
                version: VERSION,
                reserved: 0,
                layout_sha,
                build_sha,
            }
        })
    }

    /// Byte order announced by the first four bytes of a file
    pub fn detect_byte_order(magic_bytes: [u8; 4]) -> Option<ByteOrder> {
        let raw = u32::from_ne_bytes(magic_bytes);
        if raw == MAGIC {
            Some(ByteOrder::Native)
        } else if raw == MAGIC.swap_bytes() {
            Some(ByteOrder::Swapped)
        } else {
            None
        }
    }

    /// Same format version and record layout
    pub fn is_compatible_with(&self, other: &Fingerprint) -> bool {
        self.version == other.version && self.layout_sha == other.layout_sha
    }

    /// Warn when `self`, read from `path`, differs from this build
    pub fn warn_on_mismatch(&self, path: &Path) {
        let current = Fingerprint::current();
        if !self.is_compatible_with(&current) {
            warn!(
                path = %path.display(),
                file_version = self.version,
                expected_version = current.version,
                file_layout = %hex::encode(&self.layout_sha[..8]),
                expected_layout = %hex::encode(&current.layout_sha[..8]),
                "File fingerprint does not match this build, data may be misread"
            );
        } else if self.build_sha != current.build_sha {
            warn!(
                path = %path.display(),
                file_build = %hex::encode(self.build_sha),
                expected_build = %hex::encode(current.build_sha),
                "File was produced by a different release"
            );
        }
    }
}

impl FixedRecord for Fingerprint {
    const SIZE: usize = 48;

    fn encode(&self, out: &mut RecordWriter<'_>) {
        out.put_u32(self.magic);
        out.put_u16(self.version);
        out.put_u16(self.reserved);
        out.put_bytes(&self.layout_sha);
        out.put_bytes(&self.build_sha);
    }

    fn decode(input: &mut RecordReader<'_>) -> Self {
        Self {
            magic: input.u32(),
            version: input.u16(),
            reserved: input.u16(),
            layout_sha: input.bytes(),
            build_sha: input.bytes(),
        }
    }
}
