//! # Interval index
//!
//! Maps half-open `[start, end)` intervals to 32-bit payloads using
//! hierarchical binning (see [`binning`]), so overlap queries only inspect
//! the handful of bins that can hold a hit.
//!
//! ## Components
//!
//! * [`Index`] - in-memory index for one source (chromosome, contig, ...)
//! * [`Indexes`] - named collection of indexes, serializable to a single file
//! * [`IndexFile`] - on-disk reader loading each source's bin table and each
//!   bin's entries on first use
//! * [`MultiIndex`] - several index files queried as one
//!
//! ## File format
//!
//! All integers are big-endian `u32`.
//!
//! ```text
//! MAGIC VERSION NUM_SOURCES
//! NUM_SOURCES x (KEY_LEN KEY TABLE_OFFSET)          sorted by key
//! at each TABLE_OFFSET:
//!     MIN MAX
//!     bin_count x (BYTE_OFFSET COUNT)
//!     packed (START END PAYLOAD) entries, bin by bin
//! ```
//!
//! Version 0 is written. Version 1 files, which follow each `TABLE_OFFSET`
//! with a payload width, are read as long as that width is four bytes.
//!
//! ## Example
//!
//! ```rust
//! use binspan::index::{Entry, Index};
//!
//! let mut index = Index::new(0, 1 << 20).unwrap();
//! index.add(100, 200, 7).unwrap();
//! index.add(150, 300, 8).unwrap();
//! index.add(500_000, 500_010, 9).unwrap();
//!
//! let hits = index.find(180, 190);
//! assert_eq!(hits, vec![Entry::new(100, 200, 7), Entry::new(150, 300, 8)]);
//! ```

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

pub mod binning;
mod reader;

pub use reader::{FileIndex, IndexFile, MultiIndex};

use crate::error::{RangeError, Result};
use crate::utils::offset_u32;
use binning::{bin_count, bin_for_range, candidate_bins, offsets_for_max_size, MAX_SPACE};

/// Magic number opening every interval index file
#[allow(clippy::unreadable_literal)]
pub const INDEX_MAGIC: u32 = 0x2CFF800A;

/// Format version written by [`Indexes::write`]
pub const INDEX_VERSION: u32 = 0;

/// Size of one serialized entry in bytes
pub const SIZE_ENTRY: usize = 12;

/// Size of the fixed file header in bytes
pub const SIZE_FILE_HEADER: usize = 12;

/// One indexed interval and its payload
///
/// Entries order by `(start, end, payload)`, which is also the order in
/// which query results are returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Entry {
    pub start: u32,
    pub end: u32,
    pub payload: u32,
}
impl Entry {
    #[must_use]
    pub fn new(start: u32, end: u32, payload: u32) -> Self {
        Self {
            start,
            end,
            payload,
        }
    }

    /// True when the entry shares at least one position with `[start, end)`
    #[must_use]
    pub fn overlaps(&self, start: u32, end: u32) -> bool {
        self.start < end && self.end > start
    }

    pub(crate) fn from_bytes(buffer: &[u8]) -> Self {
        Self {
            start: BigEndian::read_u32(&buffer[0..4]),
            end: BigEndian::read_u32(&buffer[4..8]),
            payload: BigEndian::read_u32(&buffer[8..12]),
        }
    }

    fn write_bytes<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<BigEndian>(self.start)?;
        writer.write_u32::<BigEndian>(self.end)?;
        writer.write_u32::<BigEndian>(self.payload)?;
        Ok(())
    }
}

/// In-memory interval index over the coordinate space `[min, max]`
///
/// Every entry is stored in exactly one bin, the smallest one containing it,
/// and each bin is kept sorted as entries are added.
#[derive(Debug, Clone)]
pub struct Index {
    min: u32,
    max: u32,
    offsets: Vec<u32>,
    bins: Vec<Vec<Entry>>,
    len: usize,
}
impl Index {
    /// Creates an empty index accepting intervals within `[min, max]`
    pub fn new(min: u32, max: u32) -> Result<Self> {
        if min > max {
            return Err(RangeError::InvalidInterval {
                start: min as usize,
                end: max as usize,
            }
            .into());
        }
        let offsets = offsets_for_max_size(max);
        let bins = vec![Vec::new(); bin_count(&offsets, max)];
        Ok(Self {
            min,
            max,
            offsets,
            bins,
            len: 0,
        })
    }

    #[must_use]
    pub fn min(&self) -> u32 {
        self.min
    }

    #[must_use]
    pub fn max(&self) -> u32 {
        self.max
    }

    /// Number of bin slots (all tiers)
    #[must_use]
    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }

    /// Number of indexed entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Adds `[start, end)` with its payload
    ///
    /// # Errors
    ///
    /// * `RangeError::InvalidInterval` - If `start >= end`
    /// * `RangeError::OutsideIndexBounds` - If the interval leaves `[min, max]`
    pub fn add(&mut self, start: u32, end: u32, payload: u32) -> Result<()> {
        if start >= end {
            return Err(RangeError::InvalidInterval {
                start: start as usize,
                end: end as usize,
            }
            .into());
        }
        let outside = || RangeError::OutsideIndexBounds {
            start,
            end,
            min: self.min,
            max: self.max,
        };
        if start < self.min || end > self.max {
            return Err(outside().into());
        }
        let bin = bin_for_range(&self.offsets, start, end).ok_or_else(outside)?;
        let entry = Entry::new(start, end, payload);
        let bin = &mut self.bins[bin as usize];
        let pos = bin.partition_point(|e| *e <= entry);
        bin.insert(pos, entry);
        self.len += 1;
        Ok(())
    }

    /// All entries overlapping `[start, end)`, sorted by `(start, end, payload)`
    ///
    /// The query is clamped to the index bounds; a query that is empty after
    /// clamping returns nothing.
    #[must_use]
    pub fn find(&self, start: u32, end: u32) -> Vec<Entry> {
        let mut hits: Vec<Entry> =
            candidate_bins(&self.offsets, self.min, self.max, start, end)
                .flat_map(|bin| self.bins[bin].iter())
                .filter(|e| e.overlaps(start, end))
                .copied()
                .collect();
        hits.sort_unstable();
        hits
    }

    /// Iterates over every entry, bin by bin
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.bins.iter().flatten()
    }

    /// Bytes this index occupies in a file: bounds, bin table and entries
    fn bytes_required(&self) -> u64 {
        8 + 8 * self.bins.len() as u64 + (SIZE_ENTRY * self.len) as u64
    }

    /// Writes the bounds, bin table and entries, assuming the table starts at `base`
    fn write_bytes<W: Write>(&self, writer: &mut W, base: u64) -> Result<()> {
        writer.write_u32::<BigEndian>(self.min)?;
        writer.write_u32::<BigEndian>(self.max)?;
        let mut offset = base + 8 + 8 * self.bins.len() as u64;
        for bin in &self.bins {
            writer.write_u32::<BigEndian>(offset_u32(offset)?)?;
            writer.write_u32::<BigEndian>(bin.len() as u32)?;
            offset += (SIZE_ENTRY * bin.len()) as u64;
        }
        for entry in self.iter() {
            entry.write_bytes(writer)?;
        }
        Ok(())
    }
}

/// A set of indexes, one per named source
#[derive(Debug, Clone, Default)]
pub struct Indexes {
    indexes: BTreeMap<String, Index>,
}
impl Indexes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an interval to the index of `name`
    ///
    /// A missing index is created over `[0, MAX_SPACE]`; use
    /// [`Indexes::insert`] beforehand for other bounds.
    pub fn add(&mut self, name: &str, start: u32, end: u32, payload: u32) -> Result<()> {
        if let Some(index) = self.indexes.get_mut(name) {
            return index.add(start, end, payload);
        }
        let mut index = Index::new(0, MAX_SPACE)?;
        index.add(start, end, payload)?;
        self.indexes.insert(name.to_owned(), index);
        Ok(())
    }

    /// Installs (or replaces) the index of `name`
    pub fn insert(&mut self, name: impl Into<String>, index: Index) -> Option<Index> {
        self.indexes.insert(name.into(), index)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Index> {
        self.indexes.get(name)
    }

    /// Entries of `name` overlapping `[start, end)`; unknown names have none
    #[must_use]
    pub fn find(&self, name: &str, start: u32, end: u32) -> Vec<Entry> {
        self.indexes
            .get(name)
            .map(|index| index.find(start, end))
            .unwrap_or_default()
    }

    /// Source names in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.indexes.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Serializes every index in a single forward pass
    ///
    /// All table offsets are computed up front, so the writer does not need
    /// to support seeking.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        let header_len: u64 = SIZE_FILE_HEADER as u64
            + self
                .indexes
                .keys()
                .map(|key| 8 + key.len() as u64)
                .sum::<u64>();

        writer.write_u32::<BigEndian>(INDEX_MAGIC)?;
        writer.write_u32::<BigEndian>(INDEX_VERSION)?;
        writer.write_u32::<BigEndian>(self.indexes.len() as u32)?;

        let mut base = header_len;
        let mut bases = Vec::with_capacity(self.indexes.len());
        for (key, index) in &self.indexes {
            writer.write_u32::<BigEndian>(key.len() as u32)?;
            writer.write_all(key.as_bytes())?;
            writer.write_u32::<BigEndian>(offset_u32(base)?)?;
            bases.push(base);
            base += index.bytes_required();
        }
        for (index, base) in self.indexes.values().zip(bases) {
            index.write_bytes(writer, base)?;
        }
        writer.flush()?;
        log::debug!(
            "Wrote interval index with {} sources ({} bytes)",
            self.indexes.len(),
            base
        );
        Ok(())
    }

    /// Writes the index file to `path`
    pub fn to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write(&mut writer)
    }
}
