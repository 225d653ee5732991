use std::io::{self, Read, Seek, SeekFrom};

use super::{buf_len, ByteOrder, RandomAccessReader};
use crate::error::{BoundsError, MetadataResult};

/// Random access over a stream that can seek natively, such as a `File`.
///
/// Reads seek and read the stream directly, nothing is cached. The length is taken from the
/// stream when the reader is created.
#[derive(Debug)]
pub struct SeekingStreamReader<R> {
    stream: R,
    length: u64,
    byte_order: ByteOrder,
}

impl<R: Read + Seek> SeekingStreamReader<R> {
    pub fn new(mut stream: R) -> io::Result<Self> {
        let position = stream.stream_position()?;
        let length = stream.seek(SeekFrom::End(0))?;
        stream.seek(SeekFrom::Start(position))?;

        Ok(SeekingStreamReader {
            stream,
            length,
            byte_order: ByteOrder::default(),
        })
    }

    pub fn into_inner(self) -> R {
        self.stream
    }

    fn check(&self, index: i64, count: i64) -> Result<(), BoundsError> {
        let end = BoundsError::check_request(index, count)?;
        match u64::try_from(end) {
            Ok(end) if end >= self.length => Err(BoundsError::new(index, count, self.length)),
            _ => Ok(()),
        }
    }
}

impl<R: Read + Seek> RandomAccessReader for SeekingStreamReader<R> {
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
        Ok(self.length)
    }

    fn known_length(&self) -> u64 {
        self.length
    }

    fn validate_index(&mut self, index: i64, count: i64) -> MetadataResult<()> {
        Ok(self.check(index, count)?)
    }

    fn read_bytes_into(&mut self, index: i64, buf: &mut [u8]) -> MetadataResult<()> {
        self.check(index, buf_len(buf))?;
        if buf.is_empty() {
            return Ok(());
        }
        self.stream.seek(SeekFrom::Start(index as u64))?;
        self.stream.read_exact(buf)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::error::MetadataError;

    #[test]
    fn reads_at_arbitrary_offsets() {
        let data: Vec<u8> = (0u8..32).collect();
        let mut reader = SeekingStreamReader::new(Cursor::new(data)).unwrap();

        assert_eq!(reader.length().unwrap(), 32);
        assert_eq!(reader.get_u16(30).unwrap(), 0x1E1F);
        assert_eq!(reader.get_u8(0).unwrap(), 0);
        reader.set_byte_order(ByteOrder::LittleEndian);
        assert_eq!(reader.get_u32(4).unwrap(), 0x0706_0504);
    }

    #[test]
    fn length_ignores_the_initial_position() {
        let mut cursor = Cursor::new(vec![0u8; 20]);
        cursor.set_position(12);
        let reader = SeekingStreamReader::new(cursor).unwrap();
        assert_eq!(reader.length, 20);
        assert_eq!(reader.into_inner().position(), 12);
    }

    #[test]
    fn rejects_reads_past_the_end() {
        let mut reader = SeekingStreamReader::new(Cursor::new(vec![0u8; 10])).unwrap();
        match reader.get_bytes(5, 10) {
            Err(MetadataError::Bounds(err)) => assert_eq!(
                err,
                BoundsError::OutOfRange {
                    index: 5,
                    count: 10,
                    max_index: 9
                }
            ),
            other => panic!("expected a bounds error, got {:?}", other),
        }
    }
}
