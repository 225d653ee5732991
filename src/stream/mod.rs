//! All byte access needed for metadata decoding
//!
//! Two families of readers are provided. A [`RandomAccessReader`] reads at absolute indices and
//! never moves, a [`SequentialReader`] reads forward from a cursor. Both honour a byte order that
//! is owned by the reader instance and may be switched at any point; a switch only affects reads
//! issued afterwards.
//!
//! Readers are mutable, single-owner objects. The byte order and the capturing reader's chunk
//! cache make it unsound to share one reader between concurrent decodes, which the `&mut self`
//! receivers enforce.

use std::fmt;

use crate::error::{BoundsError, MetadataResult};

mod array;
mod capturing;
mod seeking;
mod sequential;
mod shifted;

pub use self::array::ByteArrayReader;
pub use self::capturing::{CapturingStreamReader, DEFAULT_CHUNK_LENGTH};
pub use self::seeking::SeekingStreamReader;
pub use self::sequential::{
    RandomAccessCursor, SequentialByteReader, SequentialReader, SequentialStreamReader,
};
pub use self::shifted::ShiftedReader;

/// Byte order of multi-byte values.
///
/// Big endian is also known as Motorola order (`MM` in a TIFF header), little endian as Intel
/// order (`II`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ByteOrder {
    /// little endian byte order
    LittleEndian,
    /// big endian byte order
    #[default]
    BigEndian,
}

impl ByteOrder {
    /// Whether this is Motorola (big endian) order.
    pub fn is_motorola(self) -> bool {
        self == ByteOrder::BigEndian
    }

    pub fn opposite(self) -> ByteOrder {
        match self {
            ByteOrder::LittleEndian => ByteOrder::BigEndian,
            ByteOrder::BigEndian => ByteOrder::LittleEndian,
        }
    }
}

/// Text encoding applied when bytes are turned into a `String`.
///
/// The default is ASCII. No platform or locale setting is ever consulted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Charset {
    /// 7-bit ASCII, any other byte becomes U+FFFD.
    #[default]
    Ascii,
    /// ISO-8859-1, every byte maps to the code point of the same value.
    Latin1,
    /// UTF-8, invalid sequences become U+FFFD.
    Utf8,
}

impl Charset {
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Charset::Ascii => bytes
                .iter()
                .map(|&b| {
                    if b.is_ascii() {
                        char::from(b)
                    } else {
                        char::REPLACEMENT_CHARACTER
                    }
                })
                .collect(),
            Charset::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
            Charset::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

/// Raw string bytes together with the charset they are meant to be decoded with.
///
/// Keeping the bytes lets a consumer that knows better decode them again with another charset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StringValue {
    bytes: Vec<u8>,
    charset: Charset,
}

impl StringValue {
    pub fn new(bytes: Vec<u8>, charset: Charset) -> Self {
        StringValue { bytes, charset }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    /// Decode with a charset other than the one the value was read with.
    pub fn decode_with(&self, charset: Charset) -> String {
        charset.decode(&self.bytes)
    }
}

impl fmt::Display for StringValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.charset.decode(&self.bytes))
    }
}

/// Converts a signed s15.16 fixed-point value.
pub(crate) fn decode_fixed16_16(raw: i32) -> f32 {
    (f64::from(raw) / 65536.0) as f32
}

/// Sign-extends a 24-bit two's complement value.
pub(crate) fn sign_extend_24(raw: u32) -> i32 {
    ((raw << 8) as i32) >> 8
}

/// Assembles three bytes in the given order.
pub(crate) fn assemble_u24(bytes: [u8; 3], byte_order: ByteOrder) -> u32 {
    let [a, b, c] = bytes;
    match byte_order {
        ByteOrder::BigEndian => u32::from_be_bytes([0, a, b, c]),
        ByteOrder::LittleEndian => u32::from_le_bytes([a, b, c, 0]),
    }
}

/// Truncates at the first zero byte, the terminator itself is dropped.
pub(crate) fn until_nul(mut bytes: Vec<u8>) -> Vec<u8> {
    if let Some(first) = bytes.iter().position(|&b| b == 0) {
        bytes.truncate(first);
    }
    bytes
}

pub(crate) fn buf_len(buf: &[u8]) -> i64 {
    i64::try_from(buf.len()).unwrap_or(i64::MAX)
}

macro_rules! get_fn {
    ($name:ident, $type:ty) => {
        /// Reads a
        #[doc = concat!("`", stringify!($type), "`")]
        /// at `index` in the reader's current byte order.
        #[inline]
        fn $name(&mut self, index: i64) -> MetadataResult<$type> {
            let mut n = [0u8; std::mem::size_of::<$type>()];
            self.read_bytes_into(index, &mut n)?;
            Ok(match self.byte_order() {
                ByteOrder::LittleEndian => <$type>::from_le_bytes(n),
                ByteOrder::BigEndian => <$type>::from_be_bytes(n),
            })
        }
    };
}

/// Bounds-checked reads at absolute indices of a byte source.
///
/// Indices and counts are signed so that every malformed request can be reported precisely,
/// see [`BoundsError`]. A request is rejected if it is negative, if its last byte lies beyond
/// the signed 32-bit range, or if it extends past the end of the source.
pub trait RandomAccessReader {
    /// Byte order used for multi-byte values.
    fn byte_order(&self) -> ByteOrder;

    /// Switches the byte order for all subsequent reads.
    fn set_byte_order(&mut self, byte_order: ByteOrder);

    /// Whether `count` bytes starting at `index` can be read. Sources that are discovered lazily
    /// may pull data to answer this.
    fn is_valid_index(&mut self, index: i64, count: i64) -> MetadataResult<bool>;

    /// Total length of the source in bytes. For a forward-only stream this drains the stream.
    fn length(&mut self) -> MetadataResult<u64>;

    /// Number of bytes known to exist without touching the source again. Equals
    /// [`Self::length`] once a lazily discovered source has been read to its end.
    fn known_length(&self) -> u64;

    /// Fills `buf` with the bytes starting at `index`.
    fn read_bytes_into(&mut self, index: i64, buf: &mut [u8]) -> MetadataResult<()>;

    /// Fails with a [`BoundsError`] describing why the request cannot be served.
    fn validate_index(&mut self, index: i64, count: i64) -> MetadataResult<()> {
        BoundsError::check_request(index, count)?;
        if self.is_valid_index(index, count)? {
            return Ok(());
        }
        let length = self.length()?;
        Err(BoundsError::new(index, count, length).into())
    }

    fn get_byte(&mut self, index: i64) -> MetadataResult<u8> {
        let mut n = [0u8; 1];
        self.read_bytes_into(index, &mut n)?;
        Ok(n[0])
    }

    fn get_bytes(&mut self, index: i64, count: i64) -> MetadataResult<Vec<u8>> {
        self.validate_index(index, count)?;
        let len = usize::try_from(count).map_err(|_| BoundsError::Overflow { index, count })?;
        let mut buf = vec![0; len];
        self.read_bytes_into(index, &mut buf)?;
        Ok(buf)
    }

    get_fn!(get_u8, u8);
    get_fn!(get_i8, i8);
    get_fn!(get_u16, u16);
    get_fn!(get_i16, i16);
    get_fn!(get_u32, u32);
    get_fn!(get_i32, i32);
    get_fn!(get_u64, u64);
    get_fn!(get_i64, i64);
    get_fn!(get_f32, f32);
    get_fn!(get_f64, f64);

    /// Reads an unsigned 24-bit integer.
    fn get_u24(&mut self, index: i64) -> MetadataResult<u32> {
        let mut n = [0u8; 3];
        self.read_bytes_into(index, &mut n)?;
        Ok(assemble_u24(n, self.byte_order()))
    }

    /// Reads a signed 24-bit integer.
    fn get_i24(&mut self, index: i64) -> MetadataResult<i32> {
        Ok(sign_extend_24(self.get_u24(index)?))
    }

    /// Reads an IEEE 754 half precision float, widened to `f32`.
    fn get_f16(&mut self, index: i64) -> MetadataResult<f32> {
        Ok(half::f16::from_bits(self.get_u16(index)?).to_f32())
    }

    /// Reads a signed s15.16 fixed-point number.
    fn get_fixed16_16(&mut self, index: i64) -> MetadataResult<f32> {
        Ok(decode_fixed16_16(self.get_i32(index)?))
    }

    /// Reads `max_len` bytes and keeps those before the first zero byte.
    fn get_null_terminated_bytes(&mut self, index: i64, max_len: i64) -> MetadataResult<Vec<u8>> {
        Ok(until_nul(self.get_bytes(index, max_len)?))
    }

    /// Like [`Self::get_null_terminated_bytes`] but decoded with `charset`.
    fn get_null_terminated_string(
        &mut self,
        index: i64,
        max_len: i64,
        charset: Charset,
    ) -> MetadataResult<String> {
        Ok(charset.decode(&self.get_null_terminated_bytes(index, max_len)?))
    }

    fn get_null_terminated_string_value(
        &mut self,
        index: i64,
        max_len: i64,
        charset: Charset,
    ) -> MetadataResult<StringValue> {
        Ok(StringValue::new(
            self.get_null_terminated_bytes(index, max_len)?,
            charset,
        ))
    }

    /// Decodes exactly `count` bytes, zero bytes included.
    fn get_string(&mut self, index: i64, count: i64, charset: Charset) -> MetadataResult<String> {
        Ok(charset.decode(&self.get_bytes(index, count)?))
    }

    /// Maps an index of this reader to the matching index of the outermost source.
    fn to_unshifted_offset(&self, index: i64) -> i64 {
        index
    }

    /// A view of this reader whose index 0 is `shift` here.
    fn with_shifted_base_offset(&mut self, shift: i64) -> ShiftedReader<'_, Self>
    where
        Self: Sized,
    {
        ShiftedReader::new(self, shift)
    }
}
