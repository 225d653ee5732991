use std::io::{self, Read};

use super::{
    assemble_u24, decode_fixed16_16, sign_extend_24, ByteOrder, Charset, RandomAccessReader,
    StringValue,
};
use crate::error::{MetadataError, MetadataResult};

macro_rules! read_fn {
    ($name:ident, $type:ty) => {
        /// Reads the next
        #[doc = concat!("`", stringify!($type), "`")]
        /// in the reader's current byte order.
        #[inline]
        fn $name(&mut self) -> MetadataResult<$type> {
            let mut n = [0u8; std::mem::size_of::<$type>()];
            self.read_into(&mut n)?;
            Ok(match self.byte_order() {
                ByteOrder::LittleEndian => <$type>::from_le_bytes(n),
                ByteOrder::BigEndian => <$type>::from_be_bytes(n),
            })
        }
    };
}

/// Forward-only reads from a cursor.
///
/// Reading or skipping past the end fails with [`MetadataError::EndOfData`]; `try_skip` is the
/// non-failing variant that stops at the end.
pub trait SequentialReader {
    fn byte_order(&self) -> ByteOrder;

    fn set_byte_order(&mut self, byte_order: ByteOrder);

    /// Bytes consumed since the start of the source.
    fn position(&self) -> u64;

    /// Fills `buf` with the next bytes and advances past them.
    fn read_into(&mut self, buf: &mut [u8]) -> MetadataResult<()>;

    /// Advances `n` bytes without reading them.
    fn skip(&mut self, n: u64) -> MetadataResult<()>;

    /// Advances up to `n` bytes. Returns whether all `n` were available.
    fn try_skip(&mut self, n: u64) -> MetadataResult<bool>;

    fn read_bytes(&mut self, count: usize) -> MetadataResult<Vec<u8>> {
        let mut buf = vec![0; count];
        self.read_into(&mut buf)?;
        Ok(buf)
    }

    read_fn!(read_u8, u8);
    read_fn!(read_i8, i8);
    read_fn!(read_u16, u16);
    read_fn!(read_i16, i16);
    read_fn!(read_u32, u32);
    read_fn!(read_i32, i32);
    read_fn!(read_u64, u64);
    read_fn!(read_i64, i64);
    read_fn!(read_f32, f32);
    read_fn!(read_f64, f64);

    fn read_u24(&mut self) -> MetadataResult<u32> {
        let mut n = [0u8; 3];
        self.read_into(&mut n)?;
        Ok(assemble_u24(n, self.byte_order()))
    }

    fn read_i24(&mut self) -> MetadataResult<i32> {
        Ok(sign_extend_24(self.read_u24()?))
    }

    fn read_f16(&mut self) -> MetadataResult<f32> {
        Ok(half::f16::from_bits(self.read_u16()?).to_f32())
    }

    fn read_fixed16_16(&mut self) -> MetadataResult<f32> {
        Ok(decode_fixed16_16(self.read_i32()?))
    }

    /// Decodes exactly `count` bytes, zero bytes included.
    fn read_string(&mut self, count: usize, charset: Charset) -> MetadataResult<String> {
        Ok(charset.decode(&self.read_bytes(count)?))
    }

    /// Reads up to and including the first zero byte, at most `max_len` bytes in total. The
    /// terminator is consumed but not returned.
    fn read_null_terminated_bytes(&mut self, max_len: usize) -> MetadataResult<Vec<u8>> {
        let mut bytes = Vec::new();
        while bytes.len() < max_len {
            match self.read_u8()? {
                0 => break,
                b => bytes.push(b),
            }
        }
        Ok(bytes)
    }

    fn read_null_terminated_string(
        &mut self,
        max_len: usize,
        charset: Charset,
    ) -> MetadataResult<String> {
        Ok(charset.decode(&self.read_null_terminated_bytes(max_len)?))
    }

    fn read_null_terminated_string_value(
        &mut self,
        max_len: usize,
        charset: Charset,
    ) -> MetadataResult<StringValue> {
        Ok(StringValue::new(
            self.read_null_terminated_bytes(max_len)?,
            charset,
        ))
    }
}

///
/// ## Byte slice cursor
///

/// Sequential reads over an in-memory buffer.
#[derive(Debug, Clone)]
pub struct SequentialByteReader<'a> {
    buffer: &'a [u8],
    index: usize,
    byte_order: ByteOrder,
}

impl<'a> SequentialByteReader<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        SequentialByteReader {
            buffer,
            index: 0,
            byte_order: ByteOrder::default(),
        }
    }

    /// Starts reading at `index` instead of at the beginning.
    pub fn with_start(buffer: &'a [u8], index: usize) -> Self {
        SequentialByteReader {
            index: index.min(buffer.len()),
            ..SequentialByteReader::new(buffer)
        }
    }

    /// Bytes left before the end of the buffer.
    pub fn available(&self) -> usize {
        self.buffer.len() - self.index
    }
}

impl SequentialReader for SequentialByteReader<'_> {
    fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    fn set_byte_order(&mut self, byte_order: ByteOrder) {
        self.byte_order = byte_order;
    }

    fn position(&self) -> u64 {
        self.index as u64
    }

    fn read_into(&mut self, buf: &mut [u8]) -> MetadataResult<()> {
        if buf.len() > self.available() {
            return Err(MetadataError::EndOfData {
                requested: buf.len() as u64,
                available: self.available() as u64,
            });
        }
        buf.copy_from_slice(&self.buffer[self.index..self.index + buf.len()]);
        self.index += buf.len();
        Ok(())
    }

    fn skip(&mut self, n: u64) -> MetadataResult<()> {
        let available = self.available() as u64;
        if n > available {
            return Err(MetadataError::EndOfData {
                requested: n,
                available,
            });
        }
        self.index += n as usize;
        Ok(())
    }

    fn try_skip(&mut self, n: u64) -> MetadataResult<bool> {
        let available = self.available() as u64;
        if n > available {
            self.index = self.buffer.len();
            return Ok(false);
        }
        self.index += n as usize;
        Ok(true)
    }
}

///
/// ## Stream cursor
///

/// Sequential reads over a forward-only stream. Nothing is buffered beyond what each call needs.
#[derive(Debug)]
pub struct SequentialStreamReader<R> {
    stream: R,
    position: u64,
    byte_order: ByteOrder,
}

impl<R: Read> SequentialStreamReader<R> {
    pub fn new(stream: R) -> Self {
        SequentialStreamReader {
            stream,
            position: 0,
            byte_order: ByteOrder::default(),
        }
    }

    pub fn into_inner(self) -> R {
        self.stream
    }

    /// Discards up to `n` bytes, returning how many were available.
    fn discard(&mut self, n: u64) -> io::Result<u64> {
        let skipped = io::copy(&mut self.stream.by_ref().take(n), &mut io::sink())?;
        self.position += skipped;
        Ok(skipped)
    }
}

impl<R: Read> SequentialReader for SequentialStreamReader<R> {
    fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    fn set_byte_order(&mut self, byte_order: ByteOrder) {
        self.byte_order = byte_order;
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn read_into(&mut self, buf: &mut [u8]) -> MetadataResult<()> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.stream.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.position += filled as u64;

        if filled < buf.len() {
            return Err(MetadataError::EndOfData {
                requested: buf.len() as u64,
                available: filled as u64,
            });
        }
        Ok(())
    }

    fn skip(&mut self, n: u64) -> MetadataResult<()> {
        let skipped = self.discard(n)?;
        if skipped < n {
            return Err(MetadataError::EndOfData {
                requested: n,
                available: skipped,
            });
        }
        Ok(())
    }

    fn try_skip(&mut self, n: u64) -> MetadataResult<bool> {
        Ok(self.discard(n)? == n)
    }
}

///
/// ## Random access cursor
///

/// Sequential reads on top of any [`RandomAccessReader`], sharing its byte order.
#[derive(Debug)]
pub struct RandomAccessCursor<'r, R: ?Sized> {
    reader: &'r mut R,
    position: i64,
}

impl<'r, R: RandomAccessReader + ?Sized> RandomAccessCursor<'r, R> {
    pub fn new(reader: &'r mut R, start: i64) -> Self {
        RandomAccessCursor {
            reader,
            position: start.max(0),
        }
    }

    /// Bytes left before the end of the source. Drains a capturing stream.
    pub fn available(&mut self) -> MetadataResult<u64> {
        let length = self.reader.length()?;
        Ok(length.saturating_sub(self.position as u64))
    }

    /// Bytes left that the source already holds, without pulling more of it.
    fn known_available(&self) -> u64 {
        self.reader
            .known_length()
            .saturating_sub(self.position as u64)
    }

    fn end_of_data(&self, requested: u64) -> MetadataError {
        MetadataError::EndOfData {
            requested,
            available: self.known_available(),
        }
    }

    fn fits(&mut self, n: u64) -> MetadataResult<bool> {
        match i64::try_from(n) {
            Ok(n) => self.reader.is_valid_index(self.position, n),
            Err(_) => Ok(false),
        }
    }
}

impl<R: RandomAccessReader + ?Sized> SequentialReader for RandomAccessCursor<'_, R> {
    fn byte_order(&self) -> ByteOrder {
        self.reader.byte_order()
    }

    fn set_byte_order(&mut self, byte_order: ByteOrder) {
        self.reader.set_byte_order(byte_order);
    }

    fn position(&self) -> u64 {
        self.position as u64
    }

    fn read_into(&mut self, buf: &mut [u8]) -> MetadataResult<()> {
        let requested = buf.len() as u64;
        if !self.fits(requested)? {
            return Err(self.end_of_data(requested));
        }
        self.reader.read_bytes_into(self.position, buf)?;
        self.position += requested as i64;
        Ok(())
    }

    fn skip(&mut self, n: u64) -> MetadataResult<()> {
        if !self.fits(n)? {
            return Err(self.end_of_data(n));
        }
        self.position += n as i64;
        Ok(())
    }

    fn try_skip(&mut self, n: u64) -> MetadataResult<bool> {
        if self.fits(n)? {
            self.position += n as i64;
            return Ok(true);
        }
        self.position += self.known_available() as i64;
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::stream::{ByteArrayReader, CapturingStreamReader};

    const DATA: [u8; 12] = [
        0x00, 0x01, 0x7F, 0xFF, 0x41, 0x42, 0x00, 0x43, 0x3F, 0x80, 0x00, 0x00,
    ];

    fn exercise(reader: &mut dyn SequentialReader) {
        assert_eq!(reader.read_u16().unwrap(), 0x0001);
        reader.set_byte_order(ByteOrder::LittleEndian);
        assert_eq!(reader.read_u16().unwrap(), 0xFF7F);
        assert_eq!(reader.position(), 4);
        assert_eq!(
            reader.read_null_terminated_string(8, Charset::Ascii).unwrap(),
            "AB"
        );
        assert_eq!(reader.position(), 7);
        reader.skip(1).unwrap();
        reader.set_byte_order(ByteOrder::BigEndian);
        assert_eq!(reader.read_f32().unwrap(), 1.0);
        assert!(matches!(
            reader.read_u8(),
            Err(MetadataError::EndOfData {
                requested: 1,
                available: 0
            })
        ));
    }

    #[test]
    fn byte_reader_reads_forward() {
        exercise(&mut SequentialByteReader::new(&DATA));
    }

    #[test]
    fn stream_reader_reads_forward() {
        exercise(&mut SequentialStreamReader::new(Cursor::new(DATA.to_vec())));
    }

    #[test]
    fn cursor_reads_forward() {
        let mut array = ByteArrayReader::new(&DATA);
        exercise(&mut RandomAccessCursor::new(&mut array, 0));

        let mut stream = CapturingStreamReader::new(Cursor::new(DATA.to_vec()));
        exercise(&mut RandomAccessCursor::new(&mut stream, 0));
    }

    #[test]
    fn skip_fails_past_the_end_but_try_skip_clamps() {
        let mut reader = SequentialByteReader::new(&DATA);
        assert!(matches!(
            reader.skip(13),
            Err(MetadataError::EndOfData {
                requested: 13,
                available: 12
            })
        ));
        assert_eq!(reader.position(), 0);
        assert!(reader.try_skip(10).unwrap());
        assert!(!reader.try_skip(10).unwrap());
        assert_eq!(reader.position(), 12);

        let mut stream = SequentialStreamReader::new(Cursor::new(DATA.to_vec()));
        assert!(!stream.try_skip(20).unwrap());
        assert_eq!(stream.position(), 12);

        let mut array = ByteArrayReader::new(&DATA);
        let mut cursor = RandomAccessCursor::new(&mut array, 4);
        assert!(!cursor.try_skip(20).unwrap());
        assert_eq!(cursor.position(), 12);
        assert!(cursor.skip(1).is_err());
    }

    #[test]
    fn partial_reads_report_what_was_left() {
        let mut stream = SequentialStreamReader::new(Cursor::new(vec![1, 2, 3]));
        match stream.read_u32() {
            Err(MetadataError::EndOfData {
                requested,
                available,
            }) => assert_eq!((requested, available), (4, 3)),
            other => panic!("expected end of data, got {:?}", other),
        }
    }

    #[test]
    fn wide_values_and_strings() {
        let data = [0xFF, 0xFF, 0xFE, 0x3C, 0x00, b'h', b'i', 0x00, b'!'];
        let mut reader = SequentialByteReader::new(&data);
        assert_eq!(reader.read_i24().unwrap(), -2);
        assert_eq!(reader.read_f16().unwrap(), 1.0);
        assert_eq!(reader.read_string(4, Charset::Ascii).unwrap(), "hi\0!");

        let mut reader = SequentialByteReader::with_start(&data, 5);
        assert_eq!(reader.available(), 4);
        assert_eq!(reader.read_null_terminated_bytes(2).unwrap(), b"hi".to_vec());
        // The terminator was not reached within the limit, so it is still pending.
        assert_eq!(reader.read_u8().unwrap(), 0);
    }

    #[test]
    fn oversized_skip_does_not_drain_a_capturing_stream() {
        let data = vec![0u8; 64];
        let mut stream = CapturingStreamReader::with_chunk_length(&data[..], 4).unwrap();
        {
            let mut cursor = RandomAccessCursor::new(&mut stream, 0);
            assert_eq!(cursor.read_u16().unwrap(), 0);
            match cursor.skip(1 << 40) {
                Err(MetadataError::EndOfData {
                    requested,
                    available,
                }) => assert_eq!((requested, available), (1 << 40, 2)),
                other => panic!("expected end of data, got {:?}", other),
            }
        }
        assert!(!stream.is_finished());
        assert_eq!(stream.bytes_captured(), 4);
    }
}
