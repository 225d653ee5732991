use crate::directory::Rational;
use crate::error::MetadataResult;
use crate::stream::{RandomAccessReader, StringValue};

use super::cycles::VisitedOffsets;

/// Receives the structure and the values of a TIFF directory tree as the walker decodes it.
///
/// One implementation exists per consuming format (plain TIFF/Exif, a RAW variant, a
/// maker-note). The walker drives all reading; the handler decides whether the file is
/// acceptable, which tags point at nested directories and whether a directory chain continues.
///
/// Every directory the walker enters, whether the root, a follower or one reached through a
/// pointer tag, is closed by exactly one call to [`TiffHandler::ending_ifd`].
pub trait TiffHandler {
    /// Receives the 2-byte marker that follows the byte order. Returning an error aborts the
    /// walk; this is how a handler restricts itself to the markers of its format family.
    fn set_marker(&mut self, marker: u16) -> MetadataResult<()>;

    /// Whether `tag` holds the offset of a nested directory. A `true` answer means the
    /// directory is entered right away, so the handler should prepare to receive its values.
    fn is_tag_ifd_pointer(&mut self, tag: u16) -> bool;

    /// Asked after a directory was closed and a next-directory pointer exists. A `true` answer
    /// means the follower is entered.
    fn has_follower_ifd(&mut self) -> bool;

    /// The current directory has no more entries.
    fn ending_ifd(&mut self);

    /// The walk finished.
    fn completed(
        &mut self,
        reader: &mut dyn RandomAccessReader,
        header_offset: i64,
    ) -> MetadataResult<()> {
        let _ = (reader, header_offset);
        Ok(())
    }

    /// First refusal on an entry whose value is `byte_count` bytes at `value_offset`.
    ///
    /// Returning `true` skips the default pointer and value handling. A handler may walk the
    /// value itself here, e.g. a maker-note through a shifted view of `reader`, by handing
    /// `visited` to [`super::TiffWalker::process_ifd`] with a depth of at least 1.
    #[allow(clippy::too_many_arguments)]
    fn custom_process_tag(
        &mut self,
        value_offset: i64,
        visited: &mut VisitedOffsets,
        header_offset: i64,
        reader: &mut dyn RandomAccessReader,
        tag: u16,
        byte_count: i64,
    ) -> MetadataResult<bool> {
        let _ = (value_offset, visited, header_offset, reader, tag, byte_count);
        Ok(false)
    }

    /// Byte count of an entry whose format code is not a standard TIFF type, if the handler
    /// knows it. `None` reports the entry as invalid.
    fn try_custom_process_format(&mut self, tag: u16, format_code: u16, count: u32) -> Option<i64> {
        let _ = (tag, format_code, count);
        None
    }

    /// A recoverable oddity.
    fn warn(&mut self, message: &str);

    /// A recoverable fault; the walker skips the offending entry or directory.
    fn error(&mut self, message: &str);

    fn set_byte_array(&mut self, tag: u16, bytes: Vec<u8>);
    fn set_string(&mut self, tag: u16, string: StringValue);
    fn set_rational(&mut self, tag: u16, rational: Rational);
    fn set_rational_array(&mut self, tag: u16, array: Vec<Rational>);
    fn set_float(&mut self, tag: u16, float: f32);
    fn set_float_array(&mut self, tag: u16, array: Vec<f32>);
    fn set_double(&mut self, tag: u16, double: f64);
    fn set_double_array(&mut self, tag: u16, array: Vec<f64>);
    fn set_int8s(&mut self, tag: u16, int8s: i8);
    fn set_int8s_array(&mut self, tag: u16, array: Vec<i8>);
    fn set_int8u(&mut self, tag: u16, int8u: u8);
    fn set_int8u_array(&mut self, tag: u16, array: Vec<u8>);
    fn set_int16s(&mut self, tag: u16, int16s: i16);
    fn set_int16s_array(&mut self, tag: u16, array: Vec<i16>);
    fn set_int16u(&mut self, tag: u16, int16u: u16);
    fn set_int16u_array(&mut self, tag: u16, array: Vec<u16>);
    fn set_int32s(&mut self, tag: u16, int32s: i32);
    fn set_int32s_array(&mut self, tag: u16, array: Vec<i32>);
    fn set_int32u(&mut self, tag: u16, int32u: u32);
    fn set_int32u_array(&mut self, tag: u16, array: Vec<u32>);
}
