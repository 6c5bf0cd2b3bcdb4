//! CRC-32C over encoded edge blocks

use crc::{Crc, CRC_32_ISCSI};

static CRC32C: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

/// Castagnoli CRC of an encoded block, as stored in `.hsgr` headers
pub fn checksum(block: &[u8]) -> u32 {
    CRC32C.checksum(block)
}
