//! Reading of TIFF and Exif metadata
//!
//! TIFF (Tagged Image File Format) stores its metadata in a tree of Image File Directories.
//! The same structure carries Exif data in JPEG, PNG and WebP files and most camera RAW
//! formats. This crate provides bounds-checked readers over byte slices and streams, and a
//! walker that reports every directory entry to a [`TiffHandler`].
//!
//! [`read_metadata`] and its siblings collect the whole tree with the default handler,
//! [`DirectoryCollector`]. Implement [`TiffHandler`] to decode a format's own variant of the
//! tree, e.g. a maker-note or a RAW flavour with a different marker.
//!
//! # Related Links
//! * <https://web.archive.org/web/20210108073850/https://www.adobe.io/open/standards/TIFF.html> - The TIFF specification
//! * <https://web.archive.org/web/20131111073619/http://www.exif.org/Exif2-1.PDF> - The Exif 2.1 specification

use std::io::{Read, Seek};

pub mod collector;
pub mod decoder;
mod directory;
mod error;
pub mod stream;
pub mod tags;

pub use self::collector::{DirectoryCollector, Metadata};
pub use self::decoder::handler::TiffHandler;
pub use self::decoder::{Limits, TiffWalker};
pub use self::directory::{Directory, DirectoryKind, Rational, Value};
pub use self::error::{
    BoundsError, FormatError, MetadataError, MetadataResult, UsageError,
};
pub use self::stream::{ByteOrder, Charset, RandomAccessReader, SequentialReader, StringValue};

/// Collects the metadata of a TIFF structure held in memory, starting at its first byte.
pub fn read_metadata(data: &[u8]) -> MetadataResult<Metadata> {
    read_metadata_at(&mut stream::ByteArrayReader::new(data), 0)
}

/// Like [`read_metadata`] for a stream that can only be read forward. Only as much of the
/// stream is consumed as the directories require.
pub fn read_metadata_from_stream<R: Read>(stream: R) -> MetadataResult<Metadata> {
    read_metadata_at(&mut stream::CapturingStreamReader::new(stream), 0)
}

/// Like [`read_metadata`] for a stream that can seek, such as a `File`.
pub fn read_metadata_from_seekable<R: Read + Seek>(stream: R) -> MetadataResult<Metadata> {
    read_metadata_at(&mut stream::SeekingStreamReader::new(stream)?, 0)
}

/// Collects the metadata of the TIFF structure whose header starts at `header_offset`.
///
/// Offsets inside the structure are relative to the header, which is how Exif data embedded
/// in another container is addressed.
pub fn read_metadata_at(
    reader: &mut dyn RandomAccessReader,
    header_offset: i64,
) -> MetadataResult<Metadata> {
    let mut collector = DirectoryCollector::new();
    TiffWalker::new().process(reader, &mut collector, header_offset)?;
    Ok(collector.into_metadata())
}
