//! `.osrm.restrictions` turn restriction file
//!
//! Format (file byte order):
//!   fingerprint: 48 bytes
//!   count:       u32
//!   records:     count × 13 bytes
//!     via: u32, from: u32, to: u32, is_only: u8
//!
//! Node ids are external ids, matching `NodeRecord::node_id`.

use std::path::Path;

use tracing::info;

use super::endian::ByteOrder;
use super::record::{FixedRecord, RecordReader, RecordWriter};
use super::{GraphReader, GraphWriter};
use crate::error::Result;
use crate::restriction::TurnRestriction;

impl FixedRecord for TurnRestriction {
    const SIZE: usize = 13;

    fn encode(&self, out: &mut RecordWriter<'_>) {
        out.put_u32(self.via);
        out.put_u32(self.from);
        out.put_u32(self.to);
        out.put_bool(self.is_only);
    }

    fn decode(input: &mut RecordReader<'_>) -> Self {
        Self {
            via: input.u32(),
            from: input.u32(),
            to: input.u32(),
            is_only: input.bool(),
        }
    }
}

pub struct RestrictionsFile;

impl RestrictionsFile {
    pub fn write(path: &Path, restrictions: &[TurnRestriction]) -> Result<()> {
        let mut writer = GraphWriter::create(path, ByteOrder::Native)?;
        writer.write_counted(restrictions)?;
        writer.finish()
    }

    pub fn read(path: &Path) -> Result<Vec<TurnRestriction>> {
        let mut reader = GraphReader::open(path)?;
        let count = reader.read_u32("restriction count")?;
        let restrictions = reader.read_records::<TurnRestriction>(count, "restriction records")?;
        let only = restrictions.iter().filter(|r| r.is_only).count();
        info!(
            path = %path.display(),
            restrictions = restrictions.len(),
            only_turns = only,
            "Read turn restrictions"
        );
        Ok(restrictions)
    }
}
