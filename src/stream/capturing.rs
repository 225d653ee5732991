use std::io::{self, Read};

use super::{buf_len, ByteOrder, RandomAccessReader};
use crate::error::{BoundsError, MetadataResult, UsageError, MAX_INDEX};

/// Chunk size used by [`CapturingStreamReader::new`].
pub const DEFAULT_CHUNK_LENGTH: usize = 2 * 1024;

/// Random access over a forward-only stream.
///
/// Bytes are pulled from the stream in fixed-size chunks the first time an index at or past them
/// is requested, and kept for the lifetime of the reader. Every stream byte is therefore read at
/// most once, and reads of cached ranges never touch the stream again. The total length is only
/// known once the stream reports end of data; asking for [`RandomAccessReader::length`] before
/// that drains the stream.
#[derive(Debug)]
pub struct CapturingStreamReader<R> {
    stream: R,
    chunk_length: usize,
    chunks: Vec<Vec<u8>>,
    /// Set exactly once, when the stream signals end of data.
    stream_length: Option<u64>,
    byte_order: ByteOrder,
}

impl<R: Read> CapturingStreamReader<R> {
    pub fn new(stream: R) -> Self {
        CapturingStreamReader {
            stream,
            chunk_length: DEFAULT_CHUNK_LENGTH,
            chunks: Vec::new(),
            stream_length: None,
            byte_order: ByteOrder::default(),
        }
    }

    pub fn with_chunk_length(stream: R, chunk_length: usize) -> MetadataResult<Self> {
        if chunk_length == 0 {
            return Err(UsageError::ZeroChunkLength.into());
        }
        Ok(CapturingStreamReader {
            chunk_length,
            ..CapturingStreamReader::new(stream)
        })
    }

    pub fn chunk_length(&self) -> usize {
        self.chunk_length
    }

    /// Whether the underlying stream has been read to its end.
    pub fn is_finished(&self) -> bool {
        self.stream_length.is_some()
    }

    /// Number of bytes pulled from the stream so far.
    pub fn bytes_captured(&self) -> u64 {
        self.chunks.iter().map(|c| c.len() as u64).sum()
    }

    pub fn into_inner(self) -> R {
        self.stream
    }

    /// Pulls chunks until the one holding `end_index` is cached or the stream ends.
    fn fill_through(&mut self, end_index: u64) -> io::Result<()> {
        let chunk_length = self.chunk_length as u64;
        let chunk_index = end_index / chunk_length;

        while chunk_index >= self.chunks.len() as u64 && !self.is_finished() {
            let mut chunk = vec![0; self.chunk_length];
            let mut filled = 0;
            while filled < self.chunk_length {
                match self.stream.read(&mut chunk[filled..]) {
                    Ok(0) => {
                        let length = self.chunks.len() as u64 * chunk_length + filled as u64;
                        tracing::trace!(length, "stream finished");
                        self.stream_length = Some(length);
                        break;
                    }
                    Ok(n) => filled += n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                }
            }
            chunk.truncate(filled);
            self.chunks.push(chunk);
        }

        Ok(())
    }
}

impl<R: Read> RandomAccessReader for CapturingStreamReader<R> {
    #[inline(always)]
    fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    fn set_byte_order(&mut self, byte_order: ByteOrder) {
        self.byte_order = byte_order;
    }

    fn is_valid_index(&mut self, index: i64, count: i64) -> MetadataResult<bool> {
        let end = match BoundsError::check_request(index, count) {
            Ok(end) => end,
            Err(_) => return Ok(false),
        };
        // An empty read at index 0 needs no data at all.
        let end = match u64::try_from(end) {
            Ok(end) => end,
            Err(_) => return Ok(true),
        };

        self.fill_through(end)?;
        Ok(match self.stream_length {
            Some(length) => end < length,
            None => true,
        })
    }

    fn length(&mut self) -> MetadataResult<u64> {
        self.is_valid_index(MAX_INDEX, 1)?;
        Ok(self.stream_length.unwrap_or_else(|| self.bytes_captured()))
    }

    fn known_length(&self) -> u64 {
        self.bytes_captured()
    }

    fn read_bytes_into(&mut self, index: i64, buf: &mut [u8]) -> MetadataResult<()> {
        self.validate_index(index, buf_len(buf))?;

        // Validation guarantees that every byte in range is cached.
        let mut position = index as usize;
        let mut written = 0;
        while written < buf.len() {
            let chunk = &self.chunks[position / self.chunk_length];
            let from = position % self.chunk_length;
            let n = (chunk.len() - from).min(buf.len() - written);
            buf[written..written + n].copy_from_slice(&chunk[from..from + n]);
            written += n;
            position += n;
        }

        Ok(())
    }
}
