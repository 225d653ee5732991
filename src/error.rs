use std::io;

use quick_error::quick_error;

/// Largest index a reader will ever address, the ceiling of a signed 32-bit offset.
pub(crate) const MAX_INDEX: i64 = i32::MAX as i64;

quick_error! {
    /// A read that falls outside the bytes a reader can provide.
    ///
    /// Every variant carries the offending request so messages identify the exact read.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum BoundsError {
        /// The requested index was negative.
        NegativeIndex { index: i64 } {
            display("Attempt to read from buffer using a negative index ({})", index)
        }
        /// The requested byte count was negative.
        NegativeCount { count: i64 } {
            display("Number of requested bytes cannot be negative ({})", count)
        }
        /// `index + count - 1` does not fit a signed 32-bit offset.
        Overflow { index: i64, count: i64 } {
            display(
                "Number of requested bytes summed with starting index exceed maximum range of signed 32 bit integers (requested index: {}, requested count: {})",
                index, count
            )
        }
        /// The read extends past the end of the source.
        OutOfRange { index: i64, count: i64, max_index: i64 } {
            display(
                "Attempt to read from beyond end of underlying data source (requested index: {}, requested count: {}, max index: {})",
                index, count, max_index
            )
        }
    }
}

impl BoundsError {
    /// Validates the shape of a request independently of any source length.
    ///
    /// Returns the index of the last requested byte. For an empty request this is `index - 1`.
    pub(crate) fn check_request(index: i64, count: i64) -> Result<i64, BoundsError> {
        if index < 0 {
            return Err(BoundsError::NegativeIndex { index });
        }
        if count < 0 {
            return Err(BoundsError::NegativeCount { count });
        }
        // Both operands are non-negative so this cannot wrap for any realistic request, but a
        // caller may hand us values near `i64::MAX`.
        match index.checked_add(count).map(|end| end - 1) {
            Some(end) if end <= MAX_INDEX => Ok(end),
            _ => Err(BoundsError::Overflow { index, count }),
        }
    }

    /// Builds the error for a request that was well-formed but exceeded a source of `length`
    /// bytes. Requests that are not well-formed keep their more specific kind.
    pub(crate) fn new(index: i64, count: i64, length: u64) -> BoundsError {
        match BoundsError::check_request(index, count) {
            Err(err) => err,
            Ok(_) => BoundsError::OutOfRange {
                index,
                count,
                max_index: i64::try_from(length).map_or(i64::MAX, |len| len - 1),
            },
        }
    }

    /// The same error as seen from a view whose index 0 is `shift` in the underlying source.
    pub(crate) fn unshift(self, shift: i64) -> BoundsError {
        match self {
            BoundsError::OutOfRange {
                index,
                count,
                max_index,
            } => BoundsError::OutOfRange {
                index: index - shift,
                count,
                max_index: max_index - shift,
            },
            BoundsError::NegativeIndex { index } => BoundsError::NegativeIndex {
                index: index - shift,
            },
            BoundsError::Overflow { index, count } => BoundsError::Overflow {
                index: index - shift,
                count,
            },
            other => other,
        }
    }
}

quick_error! {
    /// The fixed TIFF header could not be understood. This aborts a walk.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum FormatError {
        /// The first two bytes were neither `II` nor `MM`.
        InvalidByteOrder(marker: u16) {
            display("Unclear distinction between Motorola/Intel byte ordering: 0x{:04X}", marker)
        }
        /// The handler does not recognise the marker following the byte order.
        UnexpectedMarker(marker: u16) {
            display("Unexpected TIFF marker: 0x{:04X}", marker)
        }
        /// A handler-specific structural problem.
        Format(msg: String) {
            display("{}", msg)
        }
    }
}

quick_error! {
    /// The library was used in a way it does not support.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum UsageError {
        ZeroChunkLength {
            display("Chunk length must be greater than zero")
        }
    }
}

quick_error! {
    /// Metadata error kinds.
    #[derive(Debug)]
    pub enum MetadataError {
        /// A random-access read was outside the source.
        Bounds(err: BoundsError) {
            from()
            display("{}", err)
            source(err)
        }
        /// A sequential read or skip wanted more bytes than remained.
        EndOfData { requested: u64, available: u64 } {
            display("End of data reached: requested {} bytes, {} available", requested, available)
        }
        /// The header is not a TIFF header this walk can process.
        Format(err: FormatError) {
            from()
            display("Format error: {}", err)
            source(err)
        }
        /// An I/O error from the underlying stream.
        Io(err: io::Error) {
            from()
            display("{}", err)
            source(err)
        }
        /// The caller misused the API.
        Usage(err: UsageError) {
            from()
            display("Usage error: {}", err)
            source(err)
        }
    }
}

/// Result of a metadata read.
pub type MetadataResult<T> = Result<T, MetadataError>;
