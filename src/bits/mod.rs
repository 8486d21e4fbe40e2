//! # Bit vectors
//!
//! Two bit vector flavors share the same query surface:
//!
//! * [`Bitset`] - a flat, word-backed bit vector, allocated up front
//! * [`BinnedBitset`] - a block-partitioned bit vector over spaces up to 2^32
//!   positions, allocating a block only once a write touches it
//!
//! Algorithms that only read bits (run extraction, coverage, random
//! placement) are generic over [`BitQuery`] so they accept either flavor.
//!
//! ## Example
//!
//! ```rust
//! use binspan::bits::BinnedBitset;
//!
//! let mut bits = BinnedBitset::new(100).unwrap();
//! bits.set_range(10, 20).unwrap();
//!
//! assert_eq!(bits.count_range(0, 100).unwrap(), 20);
//! assert_eq!(bits.next_set(0), 10);
//! assert_eq!(bits.next_clear(10), 30);
//! assert_eq!(bits.next_set(30), 100);
//! ```

use auto_impl::auto_impl;

use crate::error::Result;

mod binned;
mod bitset;

pub use binned::{BinnedBitset, DEFAULT_GRANULARITY, MAX_BITSET_SIZE};
pub use bitset::{Bitset, WORD_BITS};

/// Read-only queries shared by every bit vector in this crate
#[auto_impl(&, &mut, Box)]
pub trait BitQuery {
    /// Number of valid positions
    fn size(&self) -> usize;

    /// Returns whether the bit at `pos` is set
    fn get(&self, pos: usize) -> Result<bool>;

    /// Index of the first set bit at or after `from`, or `size()` if none
    fn next_set(&self, from: usize) -> usize;

    /// Index of the first clear bit at or after `from`, or `size()` if none
    fn next_clear(&self, from: usize) -> usize;

    /// Counts the set bits in `[start, start + len)`
    fn count_range(&self, start: usize, len: usize) -> Result<usize>;
}

impl BitQuery for Bitset {
    fn size(&self) -> usize {
        Bitset::size(self)
    }
    fn get(&self, pos: usize) -> Result<bool> {
        Bitset::get(self, pos)
    }
    fn next_set(&self, from: usize) -> usize {
        Bitset::next_set(self, from)
    }
    fn next_clear(&self, from: usize) -> usize {
        Bitset::next_clear(self, from)
    }
    fn count_range(&self, start: usize, len: usize) -> Result<usize> {
        Bitset::count_range(self, start, len)
    }
}

impl BitQuery for BinnedBitset {
    fn size(&self) -> usize {
        BinnedBitset::size(self)
    }
    fn get(&self, pos: usize) -> Result<bool> {
        BinnedBitset::get(self, pos)
    }
    fn next_set(&self, from: usize) -> usize {
        BinnedBitset::next_set(self, from)
    }
    fn next_clear(&self, from: usize) -> usize {
        BinnedBitset::next_clear(self, from)
    }
    fn count_range(&self, start: usize, len: usize) -> Result<usize> {
        BinnedBitset::count_range(self, start, len)
    }
}
