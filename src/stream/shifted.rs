use super::{buf_len, ByteOrder, RandomAccessReader};
use crate::error::{BoundsError, MetadataError, MetadataResult};

/// A view of another reader that starts `shift` bytes into it.
///
/// Maker-notes and embedded TIFF blocks address their values relative to their own start; this
/// lets such data be read with local offsets. The byte order is the underlying reader's, so a
/// switch through the view is visible to the owner and vice versa.
#[derive(Debug)]
pub struct ShiftedReader<'r, R: ?Sized> {
    inner: &'r mut R,
    shift: i64,
}

impl<'r, R: RandomAccessReader + ?Sized> ShiftedReader<'r, R> {
    pub fn new(inner: &'r mut R, shift: i64) -> Self {
        ShiftedReader { inner, shift }
    }

    pub fn shift(&self) -> i64 {
        self.shift
    }

    fn unshift(&self, err: MetadataError) -> MetadataError {
        match err {
            MetadataError::Bounds(err) => MetadataError::Bounds(err.unshift(self.shift)),
            other => other,
        }
    }
}

impl<R: RandomAccessReader + ?Sized> RandomAccessReader for ShiftedReader<'_, R> {
    fn byte_order(&self) -> ByteOrder {
        self.inner.byte_order()
    }

    fn set_byte_order(&mut self, byte_order: ByteOrder) {
        self.inner.set_byte_order(byte_order);
    }

    fn is_valid_index(&mut self, index: i64, count: i64) -> MetadataResult<bool> {
        if BoundsError::check_request(index, count).is_err() {
            return Ok(false);
        }
        self.inner.is_valid_index(index + self.shift, count)
    }

    fn length(&mut self) -> MetadataResult<u64> {
        let length = self.inner.length()?;
        Ok(length.saturating_sub(u64::try_from(self.shift).unwrap_or(0)))
    }

    fn known_length(&self) -> u64 {
        self.inner
            .known_length()
            .saturating_sub(u64::try_from(self.shift).unwrap_or(0))
    }

    /// Maps a local index back through every view to the index of the outermost source.
    fn to_unshifted_offset(&self, local: i64) -> i64 {
        self.inner.to_unshifted_offset(local + self.shift)
    }

    fn validate_index(&mut self, index: i64, count: i64) -> MetadataResult<()> {
        BoundsError::check_request(index, count)?;
        self.inner
            .validate_index(index + self.shift, count)
            .map_err(|e| self.unshift(e))
    }

    fn read_bytes_into(&mut self, index: i64, buf: &mut [u8]) -> MetadataResult<()> {
        BoundsError::check_request(index, buf_len(buf))?;
        let shift = self.shift;
        self.inner
            .read_bytes_into(index + shift, buf)
            .map_err(|e| self.unshift(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::ByteArrayReader;

    #[test]
    fn reads_relative_to_the_shift() {
        let data = [0xAA, 0xBB, 0x00, 0x01, 0x02, 0x03];
        let mut reader = ByteArrayReader::new(&data);
        let mut shifted = reader.with_shifted_base_offset(2);

        assert_eq!(shifted.get_u16(0).unwrap(), 0x0001);
        assert_eq!(shifted.length().unwrap(), 4);
        assert_eq!(shifted.to_unshifted_offset(3), 5);
        assert_eq!(shifted.known_length(), 4);
        assert!(!shifted.is_valid_index(-1, 1).unwrap());

        shifted.set_byte_order(ByteOrder::LittleEndian);
        assert_eq!(shifted.get_u16(2).unwrap(), 0x0302);
        assert_eq!(reader.byte_order(), ByteOrder::LittleEndian);
    }

    #[test]
    fn nested_views_unshift_to_the_outermost_source() {
        let data = [0u8; 32];
        let mut reader = ByteArrayReader::new(&data);
        assert_eq!(reader.to_unshifted_offset(7), 7);

        let mut outer = reader.with_shifted_base_offset(10);
        let inner = outer.with_shifted_base_offset(4);
        assert_eq!(inner.to_unshifted_offset(2), 16);
        assert_eq!(inner.known_length(), 18);
    }

    #[test]
    fn errors_use_local_indices() {
        let data = [0u8; 12];
        let mut reader = ByteArrayReader::new(&data);
        let mut shifted = reader.with_shifted_base_offset(10);

        match shifted.get_u32(0) {
            Err(MetadataError::Bounds(err)) => assert_eq!(
                err,
                BoundsError::OutOfRange {
                    index: 0,
                    count: 4,
                    max_index: 1
                }
            ),
            other => panic!("expected a bounds error, got {:?}", other),
        }
    }
}
