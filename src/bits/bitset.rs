//! Word-level bit vector
//!
//! `Bitset` is the storage block used by [`super::BinnedBitset`] but is a
//! complete bit vector on its own. All scanning and counting work on whole
//! 64-bit words; only the boundary words of a range are masked.

use crate::error::{RangeError, Result, SizeMismatchError};

/// Number of bits held by one storage word
pub const WORD_BITS: usize = u64::BITS as usize;

/// Mask with bits `[lo, hi)` of a word set, `hi <= 64`
#[inline]
fn span_mask(lo: usize, hi: usize) -> u64 {
    debug_assert!(lo <= hi && hi <= WORD_BITS);
    if hi - lo == WORD_BITS {
        u64::MAX
    } else {
        ((1u64 << (hi - lo)) - 1) << lo
    }
}

/// Fixed-size bit vector backed by 64-bit words
///
/// Positions are zero based and ranges are half open. The bits of the last
/// word that lie beyond `size` are always zero, which lets `count` and
/// `next_set` work on raw words without masking the tail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitset {
    /// Number of valid bits
    size: usize,

    /// Backing words, `ceil(size / 64)` of them
    words: Vec<u64>,
}
impl Bitset {
    /// Creates a bitset of `size` bits, all clear
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            size,
            words: vec![0; size.div_ceil(WORD_BITS)],
        }
    }

    /// Creates a bitset of `size` bits, all set
    #[must_use]
    pub fn full(size: usize) -> Self {
        let mut bits = Self {
            size,
            words: vec![u64::MAX; size.div_ceil(WORD_BITS)],
        };
        bits.mask_tail();
        bits
    }

    /// Rebuilds a bitset from raw words, rejecting set padding bits
    pub(crate) fn from_words(size: usize, words: Vec<u64>) -> Option<Self> {
        if words.len() != size.div_ceil(WORD_BITS) {
            return None;
        }
        let bits = Self { size, words };
        let tail = bits.size % WORD_BITS;
        if tail != 0 {
            if let Some(last) = bits.words.last() {
                if last & !span_mask(0, tail) != 0 {
                    return None;
                }
            }
        }
        Some(bits)
    }

    /// Number of valid bits
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Granularity of the backing storage in bits
    #[must_use]
    pub fn granularity(&self) -> usize {
        WORD_BITS
    }

    pub(crate) fn words(&self) -> &[u64] {
        &self.words
    }

    fn mask_tail(&mut self) {
        let tail = self.size % WORD_BITS;
        if tail != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= span_mask(0, tail);
            }
        }
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

    /// Returns whether the bit at `pos` is set
    pub fn get(&self, pos: usize) -> Result<bool> {
        self.check_pos(pos)?;
        Ok(self.get_unchecked(pos))
    }

    #[inline]
    pub(crate) fn get_unchecked(&self, pos: usize) -> bool {
        (self.words[pos / WORD_BITS] >> (pos % WORD_BITS)) & 1 == 1
    }

    /// Sets the bit at `pos`
    pub fn set(&mut self, pos: usize) -> Result<()> {
        self.check_pos(pos)?;
        self.words[pos / WORD_BITS] |= 1 << (pos % WORD_BITS);
        Ok(())
    }

    /// Clears the bit at `pos`
    pub fn clear(&mut self, pos: usize) -> Result<()> {
        self.check_pos(pos)?;
        self.words[pos / WORD_BITS] &= !(1 << (pos % WORD_BITS));
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

    /// Word-aligned fill of `[start, end)`; bounds already checked
    pub(crate) fn fill(&mut self, start: usize, end: usize, value: bool) {
        if start >= end {
            return;
        }
        let first = start / WORD_BITS;
        let last = (end - 1) / WORD_BITS;
        let apply = |word: &mut u64, mask: u64| {
            if value {
                *word |= mask;
            } else {
                *word &= !mask;
            }
        };
        if first == last {
            apply(
                &mut self.words[first],
                span_mask(start % WORD_BITS, (end - 1) % WORD_BITS + 1),
            );
            return;
        }
        apply(
            &mut self.words[first],
            span_mask(start % WORD_BITS, WORD_BITS),
        );
        let fill_word = if value { u64::MAX } else { 0 };
        self.words[first + 1..last].fill(fill_word);
        apply(&mut self.words[last], span_mask(0, (end - 1) % WORD_BITS + 1));
    }

    /// Counts the set bits in `[start, start + len)`
    pub fn count_range(&self, start: usize, len: usize) -> Result<usize> {
        let end = self.check_range(start, len)?;
        Ok(self.count_unchecked(start, end))
    }

    pub(crate) fn count_unchecked(&self, start: usize, end: usize) -> usize {
        if start >= end {
            return 0;
        }
        let first = start / WORD_BITS;
        let last = (end - 1) / WORD_BITS;
        if first == last {
            let mask = span_mask(start % WORD_BITS, (end - 1) % WORD_BITS + 1);
            return (self.words[first] & mask).count_ones() as usize;
        }
        let head = self.words[first] & span_mask(start % WORD_BITS, WORD_BITS);
        let tail = self.words[last] & span_mask(0, (end - 1) % WORD_BITS + 1);
        let interior: usize = self.words[first + 1..last]
            .iter()
            .map(|w| w.count_ones() as usize)
            .sum();
        head.count_ones() as usize + interior + tail.count_ones() as usize
    }

    /// Total number of set bits
    #[must_use]
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Index of the first set bit at or after `from`, or `size` if none
    #[must_use]
    pub fn next_set(&self, from: usize) -> usize {
        self.scan(from, false)
    }

    /// Index of the first clear bit at or after `from`, or `size` if none
    #[must_use]
    pub fn next_clear(&self, from: usize) -> usize {
        self.scan(from, true)
    }

    /// Scans for the next set bit, complementing each word when looking for clear bits
    fn scan(&self, from: usize, flip: bool) -> usize {
        if from >= self.size {
            return self.size;
        }
        let load = |idx: usize| {
            if flip {
                !self.words[idx]
            } else {
                self.words[idx]
            }
        };
        let mut idx = from / WORD_BITS;
        let mut word = load(idx) & (u64::MAX << (from % WORD_BITS));
        loop {
            if word != 0 {
                let pos = idx * WORD_BITS + word.trailing_zeros() as usize;
                return pos.min(self.size);
            }
            idx += 1;
            if idx == self.words.len() {
                return self.size;
            }
            word = load(idx);
        }
    }

    fn check_same_size(&self, other: &Self) -> Result<()> {
        if self.size != other.size {
            return Err(SizeMismatchError::Size {
                left: self.size,
                right: other.size,
            }
            .into());
        }
        Ok(())
    }

    /// In-place bitwise AND with a bitset of the same size
    pub fn iand(&mut self, other: &Self) -> Result<()> {
        self.check_same_size(other)?;
        self.words
            .iter_mut()
            .zip(&other.words)
            .for_each(|(a, b)| *a &= b);
        Ok(())
    }

    /// In-place bitwise OR with a bitset of the same size
    pub fn ior(&mut self, other: &Self) -> Result<()> {
        self.check_same_size(other)?;
        self.words
            .iter_mut()
            .zip(&other.words)
            .for_each(|(a, b)| *a |= b);
        Ok(())
    }

    /// Flips every valid bit
    pub fn invert(&mut self) {
        self.words.iter_mut().for_each(|w| *w = !*w);
        self.mask_tail();
    }

    /// True when no bit is set
    #[must_use]
    pub fn is_clear(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// True when every valid bit is set
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.count() == self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(bits: &Bitset) -> Vec<bool> {
        (0..bits.size()).map(|i| bits.get_unchecked(i)).collect()
    }

    #[test]
    fn test_set_and_clear() -> Result<()> {
        let mut bits = Bitset::new(100);
        let mut expected = vec![false; 100];
        for pos in [11, 14, 70, 16] {
            bits.set(pos)?;
            expected[pos] = true;
        }
        for pos in [14, 80, 16] {
            bits.clear(pos)?;
            expected[pos] = false;
        }
        assert_eq!(pattern(&bits), expected);
        Ok(())
    }

    #[test]
    fn test_out_of_range() {
        let mut bits = Bitset::new(100);
        assert!(bits.set(100).is_err());
        assert!(bits.get(110).is_err());
        assert!(bits.set_range(90, 11).is_err());
        assert!(bits.count_range(usize::MAX, 2).is_err());
    }

    #[test]
    fn test_range_fill_across_words() -> Result<()> {
        let mut bits = Bitset::new(300);
        bits.set_range(3, 250)?;
        assert_eq!(bits.count(), 250);
        assert_eq!(bits.next_set(0), 3);
        assert_eq!(bits.next_clear(3), 253);
        bits.clear_range(64, 128)?;
        assert_eq!(bits.count(), 250 - 128);
        assert_eq!(bits.next_clear(3), 64);
        assert_eq!(bits.next_set(64), 192);
        Ok(())
    }

    #[test]
    fn test_count_range() -> Result<()> {
        let mut bits = Bitset::new(100);
        for (b, e) in [(11, 14), (20, 75), (90, 100)] {
            bits.set_range(b, e - b)?;
        }
        assert_eq!(bits.count_range(0, 0)?, 0);
        assert_eq!(bits.count_range(0, 20)?, 3);
        assert_eq!(bits.count_range(25, 25)?, 25);
        assert_eq!(bits.count_range(80, 20)?, 10);
        assert_eq!(bits.count_range(0, 100)?, 68);
        Ok(())
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_count_above_u32() -> Result<()> {
        let size = 1usize << 32;
        let mut bits = Bitset::full(size);
        assert_eq!(bits.count(), size);
        assert_eq!(bits.count_range(0, size)?, size);
        bits.clear(size - 1)?;
        assert_eq!(bits.count_range(1, size - 1)?, size - 2);
        Ok(())
    }

    #[test]
    fn test_scanning() -> Result<()> {
        let mut bits = Bitset::new(100);
        for (b, e) in [(11, 14), (20, 75), (90, 100)] {
            bits.set_range(b, e - b)?;
        }
        assert_eq!(bits.next_set(0), 11);
        assert_eq!(bits.next_set(13), 13);
        assert_eq!(bits.next_set(15), 20);
        assert_eq!(bits.next_clear(0), 0);
        assert_eq!(bits.next_clear(11), 14);
        assert_eq!(bits.next_clear(20), 75);
        assert_eq!(bits.next_clear(92), 100);
        assert_eq!(bits.next_set(100), 100);
        Ok(())
    }

    #[test]
    fn test_full_keeps_padding_clear() {
        let mut bits = Bitset::full(70);
        assert_eq!(bits.count(), 70);
        assert_eq!(bits.next_clear(0), 70);
        bits.invert();
        assert!(bits.is_clear());
        bits.invert();
        assert!(bits.is_full());
    }

    #[test]
    fn test_boolean_ops() -> Result<()> {
        let mut a = Bitset::new(100);
        let mut b = Bitset::new(100);
        a.set_range(20, 40)?;
        b.set_range(50, 25)?;
        let mut and = a.clone();
        and.iand(&b)?;
        let mut or = a.clone();
        or.ior(&b)?;
        for i in 0..100 {
            assert_eq!(and.get(i)?, (50..60).contains(&i));
            assert_eq!(or.get(i)?, (20..75).contains(&i));
        }
        assert!(a.iand(&Bitset::new(99)).is_err());
        Ok(())
    }

    #[test]
    fn test_from_words_rejects_padding() {
        assert!(Bitset::from_words(65, vec![u64::MAX, 1]).is_some());
        assert!(Bitset::from_words(65, vec![u64::MAX, 2]).is_none());
        assert!(Bitset::from_words(65, vec![0]).is_none());
    }
}
