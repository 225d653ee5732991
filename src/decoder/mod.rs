//! The TIFF directory walker.
//!
//! [`TiffWalker`] reads the fixed header, then walks the directory tree and reports every entry
//! to a [`TiffHandler`]. Chains of directories are followed in a loop, directories reached
//! through pointer tags are entered by recursion, one frame per nesting level up to
//! [`Limits::max_nesting_depth`]. A shared [`VisitedOffsets`] keeps any directory from being
//! processed twice.

use tracing::{debug, trace};

use crate::error::{FormatError, MetadataError, MetadataResult};
use crate::stream::{ByteOrder, Charset, RandomAccessReader};

pub mod cycles;
pub mod handler;
pub mod ifd;

use self::cycles::VisitedOffsets;
use self::handler::TiffHandler;
use self::ifd::{dispatch_value, Entry, ENTRY_LEN};

/// Walking limits
#[derive(Clone, Debug)]
pub struct Limits {
    /// The number of entries with an unknown format code after which the rest of a directory
    /// is abandoned, the default is 5.
    pub max_invalid_format_codes: usize,
    /// The maximum size of a single tag value in bytes, the default is 64MiB. Larger values
    /// are reported and skipped.
    pub max_value_bytes: u64,
    /// The number of pointer tags that may be followed from the root chain down to a
    /// directory, the default is 16. Deeper pointers are reported and not entered.
    pub max_nesting_depth: usize,
    /// The purpose of this is to prevent all the fields of the struct from
    /// being public, as this would make adding new fields a major version
    /// bump.
    _non_exhaustive: (),
}

impl Limits {
    /// A configuration that does not impose any limits.
    ///
    /// Values are still bounded by the 32-bit component count of an entry and by the data
    /// actually present in the source. Nesting is only bounded by the stack, so untrusted input
    /// should not be walked with a handler that accepts pointers at any depth.
    pub fn unlimited() -> Limits {
        Limits {
            max_invalid_format_codes: usize::MAX,
            max_value_bytes: u64::MAX,
            max_nesting_depth: usize::MAX,
            _non_exhaustive: (),
        }
    }
}

impl Default for Limits {
    fn default() -> Limits {
        Limits {
            max_invalid_format_codes: 5,
            max_value_bytes: 64 * 1024 * 1024,
            max_nesting_depth: 16,
            _non_exhaustive: (),
        }
    }
}

/// Walks the directory tree of a TIFF structure.
///
/// The walker itself is stateless between calls; all per-walk state lives in the reader (its
/// byte order) and in the [`VisitedOffsets`] created by [`TiffWalker::process`].
#[derive(Clone, Debug, Default)]
pub struct TiffWalker {
    limits: Limits,
    charset: Charset,
}

impl TiffWalker {
    pub fn new() -> TiffWalker {
        TiffWalker::default()
    }

    pub fn with_limits(mut self, limits: Limits) -> TiffWalker {
        self.limits = limits;
        self
    }

    /// Charset used for `ASCII` values, the default is [`Charset::Ascii`].
    pub fn with_charset(mut self, charset: Charset) -> TiffWalker {
        self.charset = charset;
        self
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    /// Walks the TIFF structure whose 8-byte header starts at `header_offset`.
    ///
    /// A header that cannot be read or understood fails the whole walk, as does a marker the
    /// handler rejects. Everything past the header is best-effort: faults are reported to the
    /// handler and the walk moves on.
    pub fn process<H: TiffHandler + ?Sized>(
        &self,
        reader: &mut dyn RandomAccessReader,
        handler: &mut H,
        header_offset: i64,
    ) -> MetadataResult<()> {
        let order_marker = reader.get_bytes(header_offset, 2)?;
        let byte_order = match &order_marker[..] {
            b"II" => ByteOrder::LittleEndian,
            b"MM" => ByteOrder::BigEndian,
            _ => {
                let marker = u16::from_be_bytes([order_marker[0], order_marker[1]]);
                return Err(FormatError::InvalidByteOrder(marker).into());
            }
        };
        reader.set_byte_order(byte_order);

        let marker = reader.get_u16(header_offset + 2)?;
        handler.set_marker(marker)?;

        let mut first_ifd = header_offset + i64::from(reader.get_u32(header_offset + 4)?);
        if !reader.is_valid_index(first_ifd, 2)? {
            handler.warn(
                "First IFD offset is beyond the end of the TIFF data segment -- trying default offset",
            );
            first_ifd = header_offset + 8;
        }
        debug!(?byte_order, marker, first_ifd, "walking TIFF structure");

        let mut visited = VisitedOffsets::new();
        self.process_ifd(reader, handler, &mut visited, first_ifd, header_offset, 0)?;

        handler.completed(reader, header_offset)
    }

    /// Walks the chain of directories starting at `ifd_offset`.
    ///
    /// Every directory of the chain is closed with [`TiffHandler::ending_ifd`], including the
    /// first one if it turns out to be visited already. A follower is only entered when it
    /// exists, has not been visited and the handler asks for it.
    ///
    /// `depth` is the number of pointer tags followed to reach this chain, 0 for the root chain.
    /// A handler walking a maker-note from [`TiffHandler::custom_process_tag`] passes 1 or more.
    /// Offsets are recorded in `visited` as indices of the outermost source, so a walk through
    /// a [`crate::stream::ShiftedReader`] shares its cycle guard with the enclosing walk.
    pub fn process_ifd<H: TiffHandler + ?Sized>(
        &self,
        reader: &mut dyn RandomAccessReader,
        handler: &mut H,
        visited: &mut VisitedOffsets,
        ifd_offset: i64,
        header_offset: i64,
        depth: usize,
    ) -> MetadataResult<()> {
        let mut offset = ifd_offset;
        loop {
            let next = if visited.insert(reader.to_unshifted_offset(offset)) {
                let byte_order = reader.byte_order();
                let result =
                    self.process_directory(reader, handler, visited, offset, header_offset, depth);
                reader.set_byte_order(byte_order);

                match result {
                    Ok(next) => next,
                    Err(err @ MetadataError::Bounds(_))
                    | Err(err @ MetadataError::EndOfData { .. }) => {
                        handler.error(&err.to_string());
                        None
                    }
                    Err(err) => {
                        handler.ending_ifd();
                        return Err(err);
                    }
                }
            } else {
                debug!(offset, "directory already visited");
                None
            };

            handler.ending_ifd();

            match next {
                Some(next)
                    if !visited.contains(reader.to_unshifted_offset(next))
                        && handler.has_follower_ifd() =>
                {
                    trace!(next, "following next directory");
                    offset = next;
                }
                _ => return Ok(()),
            }
        }
    }

    /// Reports the entries of one directory. Returns the offset of the next directory in the
    /// chain, if the directory names one that lies inside the source.
    fn process_directory<H: TiffHandler + ?Sized>(
        &self,
        reader: &mut dyn RandomAccessReader,
        handler: &mut H,
        visited: &mut VisitedOffsets,
        ifd_offset: i64,
        header_offset: i64,
        depth: usize,
    ) -> MetadataResult<Option<i64>> {
        if !reader.is_valid_index(ifd_offset, 2)? {
            handler.error("Ignored IFD marked to start outside data segment");
            return Ok(None);
        }

        let mut entry_count = reader.get_u16(ifd_offset)?;
        // A count with a zero low byte and a non-zero high byte is far more likely to be a small
        // count in the other byte order than a directory with thousands of entries.
        if entry_count > 0xFF && entry_count & 0xFF == 0 {
            let swapped = reader.byte_order().opposite();
            debug!(ifd_offset, entry_count, ?swapped, "swapping byte order for directory");
            reader.set_byte_order(swapped);
            entry_count = reader.get_u16(ifd_offset)?;
        }

        let ifd_len = 2 + ENTRY_LEN * i64::from(entry_count) + 4;
        if !reader.is_valid_index(ifd_offset, ifd_len)? {
            handler.error("Illegally sized IFD");
            return Ok(None);
        }
        trace!(ifd_offset, entry_count, "processing directory");

        let mut invalid_format_codes = 0;
        for i in 0..i64::from(entry_count) {
            let entry = Entry::read(reader, ifd_offset + 2 + ENTRY_LEN * i)?;

            let type_ = entry.type_();
            let byte_count = match type_ {
                Some(type_) => type_.value_bytes(entry.count),
                None => match handler.try_custom_process_format(
                    entry.tag,
                    entry.format_code,
                    entry.count,
                ) {
                    Some(byte_count) => byte_count,
                    None => {
                        handler.error(&format!(
                            "Invalid TIFF tag format code {} for tag 0x{:04X}",
                            entry.format_code, entry.tag
                        ));
                        invalid_format_codes += 1;
                        if invalid_format_codes > self.limits.max_invalid_format_codes {
                            handler.error("Stopping processing as too many errors seen in TIFF IFD");
                            return Ok(None);
                        }
                        continue;
                    }
                },
            };

            if byte_count < 0
                || u64::try_from(byte_count).map_or(true, |n| n > self.limits.max_value_bytes)
            {
                handler.error(&format!(
                    "Illegal number of bytes for TIFF tag data: {}",
                    byte_count
                ));
                continue;
            }

            let value_offset = if byte_count > 4 {
                header_offset + i64::from(reader.get_u32(entry.value_field())?)
            } else {
                entry.value_field()
            };
            if !reader.is_valid_index(value_offset, byte_count)? {
                handler.error("Illegal TIFF tag pointer offset");
                continue;
            }

            if handler.custom_process_tag(
                value_offset,
                visited,
                header_offset,
                reader,
                entry.tag,
                byte_count,
            )? {
                continue;
            }

            if self.process_pointer(
                reader,
                handler,
                visited,
                &entry,
                value_offset,
                byte_count,
                header_offset,
                depth,
            )? {
                continue;
            }

            match type_ {
                Some(type_) => dispatch_value(
                    handler,
                    reader,
                    type_,
                    entry.tag,
                    value_offset,
                    entry.count,
                    self.charset,
                )?,
                None => handler.error(&format!(
                    "Invalid TIFF tag format code {} for tag 0x{:04X}",
                    entry.format_code, entry.tag
                )),
            }
        }

        let next_field = ifd_offset + 2 + ENTRY_LEN * i64::from(entry_count);
        let next = reader.get_u32(next_field)?;
        if next == 0 {
            return Ok(None);
        }
        let next = header_offset + i64::from(next);
        if !reader.is_valid_index(next, 2)? {
            debug!(next, "next directory offset outside the source");
            return Ok(None);
        }
        Ok(Some(next))
    }

    /// Enters the directories an entry points at if the handler considers its tag a pointer.
    /// Returns whether the entry was consumed that way. A pointer beyond the nesting limit is
    /// reported and its directory closed right away.
    #[allow(clippy::too_many_arguments)]
    fn process_pointer<H: TiffHandler + ?Sized>(
        &self,
        reader: &mut dyn RandomAccessReader,
        handler: &mut H,
        visited: &mut VisitedOffsets,
        entry: &Entry,
        value_offset: i64,
        byte_count: i64,
        header_offset: i64,
        depth: usize,
    ) -> MetadataResult<bool> {
        if byte_count != 4 * i64::from(entry.count) {
            return Ok(false);
        }

        let mut entered = false;
        for i in 0..i64::from(entry.count) {
            if !handler.is_tag_ifd_pointer(entry.tag) {
                break;
            }
            entered = true;
            if depth >= self.limits.max_nesting_depth {
                handler.error(&format!(
                    "Ignored IFD nested deeper than {} levels",
                    self.limits.max_nesting_depth
                ));
                handler.ending_ifd();
                break;
            }
            let target = header_offset + i64::from(reader.get_u32(value_offset + 4 * i)?);
            trace!(tag = entry.tag, target, depth, "entering nested directory");
            self.process_ifd(reader, handler, visited, target, header_offset, depth + 1)?;
        }
        Ok(entered)
    }
}
