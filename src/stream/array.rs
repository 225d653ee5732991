use super::{buf_len, ByteOrder, RandomAccessReader};
use crate::error::{BoundsError, MetadataResult};

/// Random access over an in-memory buffer of known length.
#[derive(Debug, Clone)]
pub struct ByteArrayReader<'a> {
    buffer: &'a [u8],
    byte_order: ByteOrder,
}

impl<'a> ByteArrayReader<'a> {
    /// Wraps a buffer, reading in Motorola order until told otherwise.
    pub fn new(buffer: &'a [u8]) -> Self {
        ByteArrayReader {
            buffer,
            byte_order: ByteOrder::default(),
        }
    }

    pub fn with_byte_order(buffer: &'a [u8], byte_order: ByteOrder) -> Self {
        ByteArrayReader { buffer, byte_order }
    }

    pub fn into_inner(self) -> &'a [u8] {
        self.buffer
    }

    fn check(&self, index: i64, count: i64) -> Result<(), BoundsError> {
        let end = BoundsError::check_request(index, count)?;
        if end < buf_len(self.buffer) {
            Ok(())
        } else {
            Err(BoundsError::new(index, count, self.buffer.len() as u64))
        }
    }
}

impl RandomAccessReader for ByteArrayReader<'_> {
    #[inline(always)]
    fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    fn set_byte_order(&mut self, byte_order: ByteOrder) {
        self.byte_order = byte_order;
    }

    fn is_valid_index(&mut self, index: i64, count: i64) -> MetadataResult<bool> {
        Ok(self.check(index, count).is_ok())
    }

    fn length(&mut self) -> MetadataResult<u64> {
        Ok(self.buffer.len() as u64)
    }

    fn known_length(&self) -> u64 {
        self.buffer.len() as u64
    }

    fn validate_index(&mut self, index: i64, count: i64) -> MetadataResult<()> {
        Ok(self.check(index, count)?)
    }

    fn read_bytes_into(&mut self, index: i64, buf: &mut [u8]) -> MetadataResult<()> {
        self.check(index, buf_len(buf))?;
        // Both ends were validated against the buffer length above.
        let start = index as usize;
        buf.copy_from_slice(&self.buffer[start..start + buf.len()]);
        Ok(())
    }
}
