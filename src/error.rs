/// Custom Result type for binspan operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the binspan library, encompassing all possible error cases
/// that can occur while building, querying, or (de)serializing the binned structures.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub enum Error {
    /// A position or range argument fell outside the coordinate space
    RangeError(#[from] RangeError),
    /// A requested size exceeds what the structure supports, or no room is left
    CapacityError(#[from] CapacityError),
    /// An on-disk file is malformed, truncated, or of an unknown flavor
    FormatError(#[from] FormatError),
    /// Two operands of a bitwise operation do not have the same shape
    SizeMismatchError(#[from] SizeMismatchError),
    /// Standard I/O errors from the Rust standard library
    IoError(#[from] std::io::Error),
    /// UTF-8 errors raised while decoding source names from an index file
    Utf8Error(#[from] std::str::Utf8Error),
}

/// Errors raised when a position or range does not fit the coordinate space
#[derive(thiserror::Error, Debug)]
pub enum RangeError {
    /// A single position is outside `[0, size)`
    ///
    /// # Fields
    /// * `pos` - The requested position
    /// * `size` - The size of the coordinate space
    #[error("Position {pos} is out of range [0, {size})")]
    PositionOutOfRange { pos: usize, size: usize },

    /// A half-open range extends past the end of the coordinate space
    ///
    /// # Fields
    /// * `start` - Requested range start
    /// * `end` - Requested range end (exclusive)
    /// * `size` - The size of the coordinate space
    #[error("Range [{start}, {end}) is out of range [0, {size})")]
    RangeOutOfBounds { start: usize, end: usize, size: usize },

    /// An interval whose start does not precede its end
    #[error("Invalid interval: start ({start}) must be less than end ({end})")]
    InvalidInterval { start: usize, end: usize },

    /// An interval outside the bounds an index was created for
    ///
    /// # Fields
    /// * `start`, `end` - The interval being added
    /// * `min`, `max` - The bounds of the index
    #[error("Interval [{start}, {end}) is outside the index bounds [{min}, {max}]")]
    OutsideIndexBounds {
        start: u32,
        end: u32,
        min: u32,
        max: u32,
    },
}

/// Errors raised when a structure cannot hold what is asked of it
#[derive(thiserror::Error, Debug)]
pub enum CapacityError {
    /// The requested coordinate space is larger than the supported maximum
    #[error("Requested size ({size}) exceeds the maximum supported size ({max})")]
    SizeExceedsMaximum { size: u64, max: u64 },

    /// A block size or granularity of zero was requested
    #[error("Block size must be greater than zero")]
    ZeroBlockSize,

    /// Random placement ran out of gaps large enough for an interval
    ///
    /// # Fields
    /// * `length` - The length that could not be placed
    /// * `placed` - How many lengths were placed before the failure
    /// * `total` - How many lengths were requested
    #[error("No region can fit an interval of length {length} (placed {placed} of {total})")]
    NoRoomForLength {
        length: usize,
        placed: usize,
        total: usize,
    },
}

/// Errors raised while decoding one of the on-disk formats
#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    /// The magic number in the header does not match the expected value
    ///
    /// # Arguments
    /// * `u32` - The invalid magic number that was found
    #[error("Invalid magic number: {0:#010x}")]
    InvalidMagicNumber(u32),

    /// The format version in the header is not supported
    ///
    /// # Arguments
    /// * `u32` - The unsupported version number that was found
    #[error("Unsupported format version: {0}")]
    UnsupportedVersion(u32),

    /// The index file declares a payload width other than four bytes
    #[error("Unsupported payload width: {0} bytes")]
    UnsupportedValueSize(u32),

    /// The element type code is not one this library understands
    #[error("Unknown element type code: {0:?}")]
    UnknownElementType(char),

    /// The element type stored in the file differs from the one requested
    #[error("Element type mismatch: expected {expected:?}, found {found:?}")]
    ElementTypeMismatch { expected: char, found: char },

    /// The compression codec named in the header is not supported
    #[error("Unsupported compression codec: {0:?}")]
    UnsupportedCodec(String),

    /// A decompressed block does not hold the expected number of values
    ///
    /// # Fields
    /// * `index` - The block index
    /// * `expected` - The number of values the header promises
    /// * `got` - The number of values actually decoded
    #[error("Block {index} decoded to {got} values, expected {expected}")]
    BlockSizeMismatch {
        index: usize,
        expected: usize,
        got: usize,
    },

    /// A stored block failed to decompress
    ///
    /// # Fields
    /// * `index` - The block index
    /// * `source` - The decoder error
    #[error("Block {index} could not be decompressed: {source}")]
    CorruptBlock {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    /// A read ended before the expected number of bytes could be fetched
    ///
    /// # Fields
    /// * `offset` - The byte offset of the read
    /// * `len` - The number of bytes requested
    #[error("Unexpected end of data reading {len} bytes at byte pos {offset}")]
    Truncated { offset: u64, len: usize },

    /// A serialized block tag is not one of the known kinds
    #[error("Invalid block tag {tag} at block {index}")]
    InvalidBlockTag { tag: u8, index: usize },

    /// Padding bits past the end of a serialized bitset block are set
    #[error("Non-zero padding bits in block {0}")]
    NonZeroPadding(usize),

    /// A header field is internally inconsistent
    #[error("Inconsistent header: {0}")]
    InconsistentHeader(&'static str),
}

/// Errors raised when combining two structures of different shapes
#[derive(thiserror::Error, Debug)]
pub enum SizeMismatchError {
    /// The two operands cover coordinate spaces of different sizes
    #[error("Operand sizes differ: {left} != {right}")]
    Size { left: usize, right: usize },

    /// The two binned operands use different block granularities
    #[error("Operand granularities differ: {left} != {right}")]
    Granularity { left: usize, right: usize },
}

/// Maps an `UnexpectedEof` from a positioned read into a truncation error
pub(crate) fn truncated(err: std::io::Error, offset: u64, len: usize) -> Error {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        FormatError::Truncated { offset, len }.into()
    } else {
        err.into()
    }
}
