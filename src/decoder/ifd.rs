//! Decoding of single directory entries.

use super::handler::TiffHandler;
use crate::directory::Rational;
use crate::error::MetadataResult;
use crate::stream::{Charset, RandomAccessCursor, RandomAccessReader, SequentialReader};
use crate::tags::Type;

/// Size of one directory entry: tag, format code, component count and value field.
pub const ENTRY_LEN: i64 = 12;

/// The fixed 12 bytes of a directory entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Entry {
    pub tag: u16,
    pub format_code: u16,
    pub count: u32,
    /// Where the entry itself starts.
    pub offset: i64,
}

impl Entry {
    pub fn read(reader: &mut dyn RandomAccessReader, offset: i64) -> MetadataResult<Entry> {
        Ok(Entry {
            tag: reader.get_u16(offset)?,
            format_code: reader.get_u16(offset + 2)?,
            count: reader.get_u32(offset + 4)?,
            offset,
        })
    }

    /// The standard type of the entry, `None` for codes outside 1..=13.
    pub fn type_(&self) -> Option<Type> {
        Type::from_u16(self.format_code)
    }

    /// Offset of the 4-byte field holding either the value or a pointer to it.
    pub fn value_field(&self) -> i64 {
        self.offset + 8
    }
}

fn read_rational<S: SequentialReader + ?Sized>(s: &mut S) -> MetadataResult<Rational> {
    Ok(Rational::new(s.read_u32()?.into(), s.read_u32()?.into()))
}

fn read_srational<S: SequentialReader + ?Sized>(s: &mut S) -> MetadataResult<Rational> {
    Ok(Rational::new(s.read_i32()?.into(), s.read_i32()?.into()))
}

fn read_array<S, T>(
    s: &mut S,
    count: u32,
    mut read: impl FnMut(&mut S) -> MetadataResult<T>,
) -> MetadataResult<Vec<T>>
where
    S: SequentialReader + ?Sized,
{
    // The value range was validated by the caller, so the allocation is backed by real data.
    let mut values = Vec::with_capacity(count as usize);
    for _ in 0..count {
        values.push(read(s)?);
    }
    Ok(values)
}

macro_rules! scalar_or_array {
    ($handler:ident, $reader:ident, $offset:ident, $tag:ident, $count:ident, $scalar:ident, $array:ident, $read:expr) => {{
        let mut cursor = RandomAccessCursor::new($reader, $offset);
        if $count == 1 {
            $handler.$scalar($tag, $read(&mut cursor)?)
        } else {
            $handler.$array($tag, read_array(&mut cursor, $count, $read)?)
        }
    }};
}

/// Reads the `count` components of `type_` at `value_offset` and hands them to the matching
/// setter. A count of one uses the scalar setter, every other count (zero included) the array
/// setter.
pub(crate) fn dispatch_value<H: TiffHandler + ?Sized>(
    handler: &mut H,
    reader: &mut dyn RandomAccessReader,
    type_: Type,
    tag: u16,
    value_offset: i64,
    count: u32,
    charset: Charset,
) -> MetadataResult<()> {
    match type_ {
        Type::UNDEFINED => {
            let bytes = reader.get_bytes(value_offset, count.into())?;
            handler.set_byte_array(tag, bytes);
        }
        Type::ASCII => {
            let string = reader.get_null_terminated_string_value(value_offset, count.into(), charset)?;
            handler.set_string(tag, string);
        }
        Type::BYTE => scalar_or_array!(
            handler, reader, value_offset, tag, count, set_int8u, set_int8u_array, SequentialReader::read_u8
        ),
        Type::SBYTE => scalar_or_array!(
            handler, reader, value_offset, tag, count, set_int8s, set_int8s_array, SequentialReader::read_i8
        ),
        Type::SHORT => scalar_or_array!(
            handler, reader, value_offset, tag, count, set_int16u, set_int16u_array, SequentialReader::read_u16
        ),
        Type::SSHORT => scalar_or_array!(
            handler, reader, value_offset, tag, count, set_int16s, set_int16s_array, SequentialReader::read_i16
        ),
        Type::LONG | Type::IFD => scalar_or_array!(
            handler, reader, value_offset, tag, count, set_int32u, set_int32u_array, SequentialReader::read_u32
        ),
        Type::SLONG => scalar_or_array!(
            handler, reader, value_offset, tag, count, set_int32s, set_int32s_array, SequentialReader::read_i32
        ),
        Type::RATIONAL => scalar_or_array!(
            handler, reader, value_offset, tag, count, set_rational, set_rational_array, read_rational
        ),
        Type::SRATIONAL => scalar_or_array!(
            handler, reader, value_offset, tag, count, set_rational, set_rational_array, read_srational
        ),
        Type::FLOAT => scalar_or_array!(
            handler, reader, value_offset, tag, count, set_float, set_float_array, SequentialReader::read_f32
        ),
        Type::DOUBLE => scalar_or_array!(
            handler, reader, value_offset, tag, count, set_double, set_double_array, SequentialReader::read_f64
        ),
    }
    Ok(())
}
