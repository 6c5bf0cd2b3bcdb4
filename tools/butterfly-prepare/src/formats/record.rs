//! Fixed-size record encoding
//!
//! Every on-disk record has a constant size and a fixed field order with no
//! padding. Scalars are stored with `to_ne_bytes`, converted through the
//! file's `ByteOrder`.

use super::endian::ByteOrder;

pub trait FixedRecord: Sized {
    /// Encoded size in bytes
    const SIZE: usize;

    fn encode(&self, out: &mut RecordWriter<'_>);

    fn decode(input: &mut RecordReader<'_>) -> Self;
}

/// Appends scalars to a byte buffer in a given byte order
pub struct RecordWriter<'a> {
    buf: &'a mut Vec<u8>,
    order: ByteOrder,
}

impl<'a> RecordWriter<'a> {
    pub fn new(buf: &'a mut Vec<u8>, order: ByteOrder) -> Self {
        Self { buf, order }
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn put_bool(&mut self, v: bool) {
        self.buf.push(v as u8);
    }

    pub fn put_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&self.order.apply(v).to_ne_bytes());
    }

    pub fn put_i16(&mut self, v: i16) {
        self.buf.extend_from_slice(&self.order.apply(v).to_ne_bytes());
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&self.order.apply(v).to_ne_bytes());
    }

    pub fn put_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&self.order.apply(v).to_ne_bytes());
    }

    pub fn put_bytes(&mut self, v: &[u8]) {
        self.buf.extend_from_slice(v);
    }
}

/// Reads scalars from a buffer holding whole records
///
/// Callers size the buffer as `count * SIZE`, so reads past the end are
/// programming errors and panic.
pub struct RecordReader<'a> {
    buf: &'a [u8],
    pos: usize,
    order: ByteOrder,
}

impl<'a> RecordReader<'a> {
    pub fn new(buf: &'a [u8], order: ByteOrder) -> Self {
        Self { buf, pos: 0, order }
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    pub fn u8(&mut self) -> u8 {
        self.take::<1>()[0]
    }

    pub fn bool(&mut self) -> bool {
        self.u8() != 0
    }

    pub fn u16(&mut self) -> u16 {
        self.order.apply(u16::from_ne_bytes(self.take()))
    }

    pub fn i16(&mut self) -> i16 {
        self.order.apply(i16::from_ne_bytes(self.take()))
    }

    pub fn u32(&mut self) -> u32 {
        self.order.apply(u32::from_ne_bytes(self.take()))
    }

    pub fn i32(&mut self) -> i32 {
        self.order.apply(i32::from_ne_bytes(self.take()))
    }

    pub fn bytes<const N: usize>(&mut self) -> [u8; N] {
        self.take()
    }
}

/// Encode a slice of records into one contiguous block
pub fn encode_all<T: FixedRecord>(records: &[T], order: ByteOrder) -> Vec<u8> {
    let mut buf = Vec::with_capacity(records.len() * T::SIZE);
    let mut writer = RecordWriter::new(&mut buf, order);
    for record in records {
        record.encode(&mut writer);
    }
    debug_assert_eq!(buf.len(), records.len() * T::SIZE);
    buf
}

/// Decode a block holding a whole number of records
pub fn decode_all<T: FixedRecord>(block: &[u8], order: ByteOrder) -> Vec<T> {
    assert_eq!(block.len() % T::SIZE, 0, "block is not a whole number of records");
    let mut reader = RecordReader::new(block, order);
    (0..block.len() / T::SIZE).map(|_| T::decode(&mut reader)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Sample {
        a: u32,
        b: i16,
        c: bool,
    }

    impl FixedRecord for Sample {
        const SIZE: usize = 7;

        fn encode(&self, out: &mut RecordWriter<'_>) {
            out.put_u32(self.a);
            out.put_i16(self.b);
            out.put_bool(self.c);
        }

        fn decode(input: &mut RecordReader<'_>) -> Self {
            Self {
                a: input.u32(),
                b: input.i16(),
                c: input.bool(),
            }
        }
    }

    #[test]
    fn test_field_layout() {
        let block = encode_all(&[Sample { a: 1, b: -1, c: true }], ByteOrder::Native);
        assert_eq!(block.len(), Sample::SIZE);
        assert_eq!(&block[0..4], &1u32.to_ne_bytes());
        assert_eq!(&block[4..6], &(-1i16).to_ne_bytes());
        assert_eq!(block[6], 1);
    }

    #[test]
    fn test_swapped_block_decodes_with_swapped_order() {
        let records = vec![Sample { a: 0xDEAD_BEEF, b: 300, c: false }];
        let block = encode_all(&records, ByteOrder::Swapped);
        assert_eq!(&block[0..4], &0xDEAD_BEEFu32.swap_bytes().to_ne_bytes());
        let decoded: Vec<Sample> = decode_all(&block, ByteOrder::Swapped);
        assert_eq!(decoded, records);
    }
}
