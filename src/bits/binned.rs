//! Lazily allocated, block-partitioned bit vector
//!
//! A `BinnedBitset` covers coordinate spaces far larger than what could be
//! allocated eagerly (a whole chromosome, up to 2^32 positions) by splitting
//! the space into blocks of `granularity` bits. A block only owns storage
//! after a write touches part of it; blocks that are entirely clear or
//! entirely set are kept as tags.
//!
//! ```text
//!  block:    0         1         2         3
//!          ┌─────────┬─────────┬─────────┬──────┐
//!          │  Empty  │ Partial │  Full   │Empty │  <- last block is shorter
//!          └─────────┴────┬────┴─────────┴──────┘
//!                         └── Box<Bitset> of `granularity` bits
//! ```

use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use super::bitset::{Bitset, WORD_BITS};
use crate::error::{
    truncated, CapacityError, FormatError, RangeError, Result, SizeMismatchError,
};

/// Largest coordinate space a binned bitset may cover (2^32 positions)
pub const MAX_BITSET_SIZE: u64 = 1 << 32;

/// Default number of bits per block
pub const DEFAULT_GRANULARITY: usize = 64 * 1024;

/// Magic number for serialized binned bitsets: "BINB" in ASCII
const MAGIC: u32 = 0x4249_4E42;

/// Current serialization version
const FORMAT: u32 = 1;

/// Size of the serialized header in bytes
pub const SIZE_HEADER: usize = 24;

const TAG_EMPTY: u8 = 0;
const TAG_FULL: u8 = 1;
const TAG_PARTIAL: u8 = 2;

/// Storage state of one block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum Block {
    /// No bit set, nothing allocated
    #[default]
    Empty,
    /// Every bit set, nothing allocated
    Full,
    /// Mixed content backed by an owned bitset
    Partial(Box<Bitset>),
}

/// Bit vector over a large coordinate space with lazily materialized blocks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinnedBitset {
    /// Number of valid positions
    size: usize,

    /// Number of bits per block
    granularity: usize,

    /// One slot per block, `ceil(size / granularity)` of them
    blocks: Vec<Block>,
}
impl BinnedBitset {
    /// Creates an all-clear bitset with the default block granularity
    pub fn new(size: usize) -> Result<Self> {
        Self::with_granularity(size, DEFAULT_GRANULARITY)
    }

    /// Creates an all-clear bitset with a custom number of bits per block
    ///
    /// # Errors
    ///
    /// * `CapacityError::SizeExceedsMaximum` - If `size` is above [`MAX_BITSET_SIZE`]
    /// * `CapacityError::ZeroBlockSize` - If `granularity` is zero
    pub fn with_granularity(size: usize, granularity: usize) -> Result<Self> {
        if size as u64 > MAX_BITSET_SIZE {
            return Err(CapacityError::SizeExceedsMaximum {
                size: size as u64,
                max: MAX_BITSET_SIZE,
            }
            .into());
        }
        if granularity == 0 {
            return Err(CapacityError::ZeroBlockSize.into());
        }
        let n_blocks = size.div_ceil(granularity);
        Ok(Self {
            size,
            granularity,
            blocks: vec![Block::Empty; n_blocks],
        })
    }

    /// Builds a bitset with every `[start, end)` interval set
    pub fn from_intervals<I>(size: usize, intervals: I) -> Result<Self>
    where
        I: IntoIterator<Item = (usize, usize)>,
    {
        let mut bits = Self::new(size)?;
        for (start, end) in intervals {
            if end < start {
                return Err(RangeError::InvalidInterval { start, end }.into());
            }
            bits.set_range(start, end - start)?;
        }
        Ok(bits)
    }

    /// Number of valid positions
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of bits per block
    #[must_use]
    pub fn granularity(&self) -> usize {
        self.granularity
    }

    /// Number of block slots
    #[must_use]
    pub fn n_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Number of blocks currently backed by allocated storage
    #[must_use]
    pub fn n_allocated(&self) -> usize {
        self.blocks
            .iter()
            .filter(|b| matches!(b, Block::Partial(_)))
            .count()
    }

    /// Number of valid bits in block `index` (the last block may be short)
    fn block_len(&self, index: usize) -> usize {
        (self.size - index * self.granularity).min(self.granularity)
    }

    fn check_pos(&self, pos: usize) -> Result<()> {
        if pos >= self.size {
            return Err(RangeError::PositionOutOfRange {
                pos,
                size: self.size,
            }
            .into());
        }
        Ok(())
    }

    fn check_range(&self, start: usize, len: usize) -> Result<usize> {
        match start.checked_add(len) {
            Some(end) if end <= self.size => Ok(end),
            _ => Err(RangeError::RangeOutOfBounds {
                start,
                end: start.saturating_add(len),
                size: self.size,
            }
            .into()),
        }
    }

    /// Splits `[start, end)` into `(block, lo, hi)` pieces local to each block
    fn pieces(
        granularity: usize,
        start: usize,
        end: usize,
    ) -> impl Iterator<Item = (usize, usize, usize)> {
        let mut pos = start;
        std::iter::from_fn(move || {
            if pos >= end {
                return None;
            }
            let block = pos / granularity;
            let base = block * granularity;
            let lo = pos - base;
            let hi = (end - base).min(granularity);
            pos = base + hi;
            Some((block, lo, hi))
        })
    }

    /// Returns whether the bit at `pos` is set, without allocating
    pub fn get(&self, pos: usize) -> Result<bool> {
        self.check_pos(pos)?;
        Ok(match &self.blocks[pos / self.granularity] {
            Block::Empty => false,
            Block::Full => true,
            Block::Partial(bits) => bits.get_unchecked(pos % self.granularity),
        })
    }

    /// Sets the bit at `pos`, materializing its block if needed
    pub fn set(&mut self, pos: usize) -> Result<()> {
        self.check_pos(pos)?;
        self.fill(pos, pos + 1, true);
        Ok(())
    }

    /// Clears the bit at `pos`
    pub fn clear(&mut self, pos: usize) -> Result<()> {
        self.check_pos(pos)?;
        self.fill(pos, pos + 1, false);
        Ok(())
    }

    /// Sets every bit in `[start, start + len)`
    pub fn set_range(&mut self, start: usize, len: usize) -> Result<()> {
        let end = self.check_range(start, len)?;
        self.fill(start, end, true);
        Ok(())
    }

    /// Clears every bit in `[start, start + len)`
    pub fn clear_range(&mut self, start: usize, len: usize) -> Result<()> {
        let end = self.check_range(start, len)?;
        self.fill(start, end, false);
        Ok(())
    }

    fn fill(&mut self, start: usize, end: usize, value: bool) {
        for (index, lo, hi) in Self::pieces(self.granularity, start, end) {
            let len = self.block_len(index);
            let slot = &mut self.blocks[index];

            // Whole-block writes collapse to a tag and free any storage
            if lo == 0 && hi == len {
                *slot = if value { Block::Full } else { Block::Empty };
                continue;
            }
            match slot {
                Block::Full if value => {}
                Block::Empty if !value => {}
                Block::Partial(bits) => bits.fill(lo, hi, value),
                Block::Empty | Block::Full => {
                    let mut bits = if value {
                        Bitset::new(len)
                    } else {
                        Bitset::full(len)
                    };
                    bits.fill(lo, hi, value);
                    *slot = Block::Partial(Box::new(bits));
                }
            }
        }
    }

    /// Counts the set bits in `[start, start + len)`
    pub fn count_range(&self, start: usize, len: usize) -> Result<usize> {
        let end = self.check_range(start, len)?;
        Ok(Self::pieces(self.granularity, start, end)
            .map(|(index, lo, hi)| match &self.blocks[index] {
                Block::Empty => 0,
                Block::Full => hi - lo,
                Block::Partial(bits) => bits.count_unchecked(lo, hi),
            })
            .sum())
    }

    /// Total number of set bits
    #[must_use]
    pub fn count(&self) -> usize {
        self.blocks
            .iter()
            .enumerate()
            .map(|(index, block)| match block {
                Block::Empty => 0,
                Block::Full => self.block_len(index),
                Block::Partial(bits) => bits.count(),
            })
            .sum()
    }

    /// Index of the first set bit at or after `from`, or `size` if none
    ///
    /// Empty blocks are skipped without being inspected.
    #[must_use]
    pub fn next_set(&self, from: usize) -> usize {
        self.scan(from, true)
    }

    /// Index of the first clear bit at or after `from`, or `size` if none
    ///
    /// Full blocks are skipped without being inspected.
    #[must_use]
    pub fn next_clear(&self, from: usize) -> usize {
        self.scan(from, false)
    }

    fn scan(&self, from: usize, want: bool) -> usize {
        if from >= self.size {
            return self.size;
        }
        let mut index = from / self.granularity;
        let mut offset = from % self.granularity;
        while index < self.blocks.len() {
            let base = index * self.granularity;
            match (&self.blocks[index], want) {
                (Block::Full, true) | (Block::Empty, false) => return base + offset,
                (Block::Full, false) | (Block::Empty, true) => {}
                (Block::Partial(bits), _) => {
                    let found = if want {
                        bits.next_set(offset)
                    } else {
                        bits.next_clear(offset)
                    };
                    if found < bits.size() {
                        return base + found;
                    }
                }
            }
            index += 1;
            offset = 0;
        }
        self.size
    }

    fn check_same_shape(&self, other: &Self) -> Result<()> {
        if self.size != other.size {
            return Err(SizeMismatchError::Size {
                left: self.size,
                right: other.size,
            }
            .into());
        }
        if self.granularity != other.granularity {
            return Err(SizeMismatchError::Granularity {
                left: self.granularity,
                right: other.granularity,
            }
            .into());
        }
        Ok(())
    }

    /// In-place bitwise AND with a bitset of the same size and granularity
    pub fn iand(&mut self, other: &Self) -> Result<()> {
        self.check_same_shape(other)?;
        for (mine, theirs) in self.blocks.iter_mut().zip(&other.blocks) {
            let current = std::mem::take(mine);
            *mine = match (current, theirs) {
                (Block::Empty, _) | (_, Block::Empty) => Block::Empty,
                (current, Block::Full) => current,
                (Block::Full, Block::Partial(bits)) => Block::Partial(bits.clone()),
                (Block::Partial(mut bits), Block::Partial(other_bits)) => {
                    bits.iand(other_bits)?;
                    if bits.is_clear() {
                        Block::Empty
                    } else {
                        Block::Partial(bits)
                    }
                }
            };
        }
        Ok(())
    }

    /// In-place bitwise OR with a bitset of the same size and granularity
    pub fn ior(&mut self, other: &Self) -> Result<()> {
        self.check_same_shape(other)?;
        for (mine, theirs) in self.blocks.iter_mut().zip(&other.blocks) {
            let current = std::mem::take(mine);
            *mine = match (current, theirs) {
                (Block::Full, _) | (_, Block::Full) => Block::Full,
                (current, Block::Empty) => current,
                (Block::Empty, Block::Partial(bits)) => Block::Partial(bits.clone()),
                (Block::Partial(mut bits), Block::Partial(other_bits)) => {
                    bits.ior(other_bits)?;
                    if bits.is_full() {
                        Block::Full
                    } else {
                        Block::Partial(bits)
                    }
                }
            };
        }
        Ok(())
    }

    /// Flips every bit; empty and full blocks swap tags without allocating
    pub fn invert(&mut self) {
        for block in &mut self.blocks {
            match block {
                Block::Empty => *block = Block::Full,
                Block::Full => *block = Block::Empty,
                Block::Partial(bits) => bits.invert(),
            }
        }
    }

    /// Serializes the bitset to a writer
    ///
    /// The layout is a 24-byte header (magic, version, size as u64,
    /// granularity, block count) followed by one tag byte per block; partial
    /// blocks are followed by their words as big-endian u64.
    pub fn write_bytes<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<BigEndian>(MAGIC)?;
        writer.write_u32::<BigEndian>(FORMAT)?;
        writer.write_u64::<BigEndian>(self.size as u64)?;
        writer.write_u32::<BigEndian>(self.granularity as u32)?;
        writer.write_u32::<BigEndian>(self.blocks.len() as u32)?;
        for block in &self.blocks {
            match block {
                Block::Empty => writer.write_u8(TAG_EMPTY)?,
                Block::Full => writer.write_u8(TAG_FULL)?,
                Block::Partial(bits) => {
                    writer.write_u8(TAG_PARTIAL)?;
                    bits.words()
                        .iter()
                        .try_for_each(|&w| writer.write_u64::<BigEndian>(w))?;
                }
            }
        }
        Ok(())
    }

    /// Reads a bitset previously written with [`BinnedBitset::write_bytes`]
    ///
    /// # Errors
    ///
    /// * `FormatError::InvalidMagicNumber` / `UnsupportedVersion` - If the header is foreign
    /// * `FormatError::InconsistentHeader` - If the block count does not match size and granularity
    /// * `FormatError::NonZeroPadding` - If a partial block has bits set past its end
    /// * `FormatError::Truncated` - If the stream ends early
    pub fn from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        let mut header = [0u8; SIZE_HEADER];
        reader
            .read_exact(&mut header)
            .map_err(|e| truncated(e, 0, SIZE_HEADER))?;
        let mut cursor = &header[..];
        let magic = cursor.read_u32::<BigEndian>()?;
        if magic != MAGIC {
            return Err(FormatError::InvalidMagicNumber(magic).into());
        }
        let format = cursor.read_u32::<BigEndian>()?;
        if format != FORMAT {
            return Err(FormatError::UnsupportedVersion(format).into());
        }
        let size = cursor.read_u64::<BigEndian>()?;
        let granularity = cursor.read_u32::<BigEndian>()? as usize;
        let n_blocks = cursor.read_u32::<BigEndian>()? as usize;

        let size = usize::try_from(size)
            .map_err(|_| FormatError::InconsistentHeader("size exceeds address space"))?;
        if granularity == 0 || size.div_ceil(granularity) != n_blocks {
            return Err(FormatError::InconsistentHeader("block count").into());
        }
        let mut bits = Self::with_granularity(size, granularity)?;

        let mut pos = SIZE_HEADER as u64;
        for index in 0..n_blocks {
            let tag = reader.read_u8().map_err(|e| truncated(e, pos, 1))?;
            pos += 1;
            bits.blocks[index] = match tag {
                TAG_EMPTY => Block::Empty,
                TAG_FULL => Block::Full,
                TAG_PARTIAL => {
                    let len = bits.block_len(index);
                    let n_words = len.div_ceil(WORD_BITS);
                    let mut words = vec![0u64; n_words];
                    reader
                        .read_u64_into::<BigEndian>(&mut words)
                        .map_err(|e| truncated(e, pos, n_words * 8))?;
                    pos += (n_words * 8) as u64;
                    let block =
                        Bitset::from_words(len, words).ok_or(FormatError::NonZeroPadding(index))?;
                    Block::Partial(Box::new(block))
                }
                tag => return Err(FormatError::InvalidBlockTag { tag, index }.into()),
            };
        }
        Ok(bits)
    }
}
