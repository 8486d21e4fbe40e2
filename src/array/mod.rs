//! # Binned sparse arrays
//!
//! A binned array stores one numeric value per coordinate over a large
//! space (typically a chromosome) where most of the space holds a default
//! value. The space is split into fixed-size blocks; only blocks that were
//! written are allocated in memory and stored on disk.
//!
//! ## Components
//!
//! * [`BinnedArray`] - in-memory array with lazily allocated blocks
//! * [`FileBinnedArray`] - random access to a stored array, decompressing
//!   blocks on demand and retaining them per [`CacheMode`]
//! * [`BinnedArrayWriter`] - sequential writer that never holds more than
//!   one block in memory
//!
//! ## File layout
//!
//! ```text
//! ┌──────────────────────┐
//! │ ArrayHeader          │  magic, version, sizes, type code, codec, default
//! ├──────────────────────┤
//! │ NBINS x (OFFSET LEN) │  LEN == 0 marks a block that was never written
//! ├──────────────────────┤
//! │ compressed block 0   │  each block holds exactly BIN_SIZE values
//! │ compressed block 3   │
//! │ ...                  │
//! └──────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use std::io::Cursor;
//! use binspan::array::{BinnedArray, CacheMode, Codec, FileBinnedArray};
//! use binspan::SeekSource;
//!
//! let mut array = BinnedArray::new(10_000, 1_000, 0.0f64).unwrap();
//! array.set_range(2_500, 2_600, 1.0).unwrap();
//!
//! let mut buffer = Vec::new();
//! array.write_to(&mut buffer, Codec::Zstd).unwrap();
//!
//! let source = SeekSource::new(Cursor::new(buffer));
//! let mut stored = FileBinnedArray::<f64, _>::from_source(source, CacheMode::Lite).unwrap();
//! assert_eq!(stored.get(2_550).unwrap(), 1.0);
//! assert_eq!(stored.get(9_999).unwrap(), 0.0);
//! ```

mod binned;
mod codec;
mod element;
mod header;
mod reader;
mod writer;

pub use binned::BinnedArray;
pub use codec::{Codec, DEFAULT_COMPRESSION_LEVEL};
pub use element::{Element, KNOWN_TYPECODES};
pub use header::{ArrayHeader, ARRAY_MAGIC, ARRAY_VERSION};
pub use reader::{CacheMode, FileBinnedArray};
pub use writer::{BinnedArrayWriter, BinnedArrayWriterBuilder};

pub use crate::index::binning::MAX_SPACE;

/// Default number of slots per block (512 Ki)
pub const DEFAULT_BIN_SIZE: usize = 512 * 1024;

/// Default number of blocks an LRU-cached reader retains
pub const DEFAULT_CACHE_BLOCKS: usize = 32;
