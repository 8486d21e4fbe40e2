//! # Interval set operations
//!
//! Lists of half-open intervals are turned into a [`BinnedBitset`], combined
//! with word-level boolean operations and read back as maximal runs. Every
//! result therefore comes out sorted, non-overlapping and with adjacent
//! intervals merged.
//!
//! ```rust
//! use binspan::intervals::{intersect, subtract, Interval};
//!
//! let a = [Interval::new(0, 100), Interval::new(200, 300)];
//! let b = [Interval::new(50, 250)];
//!
//! assert_eq!(
//!     intersect(1_000, &a, &b).unwrap(),
//!     vec![Interval::new(50, 100), Interval::new(200, 250)]
//! );
//! assert_eq!(
//!     subtract(1_000, &a, &b).unwrap(),
//!     vec![Interval::new(0, 50), Interval::new(250, 300)]
//! );
//! ```
//!
//! Beyond the set algebra this module offers random placement of lengths
//! into the uncovered part of a mask ([`throw_random`]), clustering of
//! nearby intervals ([`ClusterTree`]), per-chromosome bitset construction
//! ([`bitsets_from_intervals`]) and BED-3 output ([`write_bed3`]).
//! [`Intersecter`] answers overlap queries over intervals that carry a
//! value without going through a bitset.

use crate::bits::{BinnedBitset, BitQuery};
use crate::error::{RangeError, Result};

mod bed;
mod builders;
mod cluster;
mod intersecter;
mod random;

pub use bed::{write_bed3, write_bitsets_bed3};
pub use builders::{bitsets_from_intervals, Padding};
pub use cluster::{Cluster, ClusterTree};
pub use intersecter::Intersecter;
pub use random::{throw_random, throw_random_bits, throw_random_regions};

/// Half-open interval `[start, end)`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Interval {
    pub start: usize,
    pub end: usize,
}
impl Interval {
    #[must_use]
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of positions covered, zero for reversed or empty intervals
    #[must_use]
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}
impl From<(usize, usize)> for Interval {
    fn from((start, end): (usize, usize)) -> Self {
        Self { start, end }
    }
}
impl From<Interval> for (usize, usize) {
    fn from(interval: Interval) -> Self {
        (interval.start, interval.end)
    }
}

/// Iterator over the maximal runs of set (or clear) bits within a window
///
/// Created by [`set_runs_in_range`] and [`clear_runs_in_range`]. Runs that
/// cross the window edges are clipped to it.
#[derive(Debug, Clone)]
pub struct Runs<'a, B: BitQuery> {
    bits: &'a B,
    pos: usize,
    end: usize,
    set: bool,
}
impl<B: BitQuery> Iterator for Runs<'_, B> {
    type Item = Interval;

    fn next(&mut self) -> Option<Interval> {
        if self.pos >= self.end {
            return None;
        }
        let start = if self.set {
            self.bits.next_set(self.pos)
        } else {
            self.bits.next_clear(self.pos)
        };
        if start >= self.end {
            self.pos = self.end;
            return None;
        }
        let stop = if self.set {
            self.bits.next_clear(start)
        } else {
            self.bits.next_set(start)
        }
        .min(self.end);
        self.pos = stop;
        Some(Interval::new(start, stop))
    }
}

fn runs<B: BitQuery>(bits: &B, start: usize, end: usize, set: bool) -> Result<Runs<'_, B>> {
    if start > end {
        return Err(RangeError::InvalidInterval { start, end }.into());
    }
    if end > bits.size() {
        return Err(RangeError::RangeOutOfBounds {
            start,
            end,
            size: bits.size(),
        }
        .into());
    }
    Ok(Runs {
        bits,
        pos: start,
        end,
        set,
    })
}

/// Maximal runs of set bits inside `[start, end)`
pub fn set_runs_in_range<B: BitQuery>(bits: &B, start: usize, end: usize) -> Result<Runs<'_, B>> {
    runs(bits, start, end, true)
}

/// Maximal runs of clear bits inside `[start, end)`
pub fn clear_runs_in_range<B: BitQuery>(
    bits: &B,
    start: usize,
    end: usize,
) -> Result<Runs<'_, B>> {
    runs(bits, start, end, false)
}

/// Builds a bitset of `size` positions with every interval set
///
/// # Errors
///
/// * `RangeError::InvalidInterval` - If an interval ends before it starts
/// * `RangeError::RangeOutOfBounds` - If an interval extends past `size`
pub fn bits_from_intervals<I>(size: usize, intervals: I) -> Result<BinnedBitset>
where
    I: IntoIterator<Item = Interval>,
{
    BinnedBitset::from_intervals(size, intervals.into_iter().map(<(usize, usize)>::from))
}

/// Every maximal run of set bits, in order
pub fn intervals_from_bits<B: BitQuery>(bits: &B) -> Vec<Interval> {
    Runs {
        bits,
        pos: 0,
        end: bits.size(),
        set: true,
    }
    .collect()
}

/// Sorts and merges overlapping or adjacent intervals
pub fn union(size: usize, a: &[Interval]) -> Result<Vec<Interval>> {
    let bits = bits_from_intervals(size, a.iter().copied())?;
    Ok(intervals_from_bits(&bits))
}

/// Positions covered by both lists
pub fn intersect(size: usize, a: &[Interval], b: &[Interval]) -> Result<Vec<Interval>> {
    let mut left = bits_from_intervals(size, a.iter().copied())?;
    let right = bits_from_intervals(size, b.iter().copied())?;
    left.iand(&right)?;
    Ok(intervals_from_bits(&left))
}

/// Positions covered by `a` but not by `b`
pub fn subtract(size: usize, a: &[Interval], b: &[Interval]) -> Result<Vec<Interval>> {
    let mut left = bits_from_intervals(size, a.iter().copied())?;
    let mut right = bits_from_intervals(size, b.iter().copied())?;
    right.invert();
    left.iand(&right)?;
    Ok(intervals_from_bits(&left))
}

/// Positions of `[0, size)` not covered by `a`
pub fn complement(size: usize, a: &[Interval]) -> Result<Vec<Interval>> {
    let mut bits = bits_from_intervals(size, a.iter().copied())?;
    bits.invert();
    Ok(intervals_from_bits(&bits))
}

/// Gaps between the intervals of `a`, limited to the span from its lowest
/// start to its highest end
///
/// This is the intron list of a set of exons. An empty list has no gaps.
pub fn complement_within(a: &[Interval]) -> Result<Vec<Interval>> {
    let (Some(lo), Some(hi)) = (
        a.iter().map(|iv| iv.start).min(),
        a.iter().map(|iv| iv.end).max(),
    ) else {
        return Ok(Vec::new());
    };
    let bits = bits_from_intervals(hi, a.iter().copied())?;
    Ok(clear_runs_in_range(&bits, lo.min(hi), hi)?.collect())
}

/// Number of set positions in `[start, end)`
pub fn coverage<B: BitQuery>(bits: &B, start: usize, end: usize) -> Result<usize> {
    if start > end {
        return Err(RangeError::InvalidInterval { start, end }.into());
    }
    bits.count_range(start, end - start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::Bitset;
    use crate::error::Error;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn ivs(pairs: &[(usize, usize)]) -> Vec<Interval> {
        pairs.iter().copied().map(Interval::from).collect()
    }

    #[test]
    fn test_round_trip_merges_runs() -> Result<()> {
        let input = ivs(&[(30, 40), (0, 10), (10, 20), (35, 50), (60, 60)]);
        let bits = bits_from_intervals(100, input.iter().copied())?;
        assert_eq!(intervals_from_bits(&bits), ivs(&[(0, 20), (30, 50)]));
        assert_eq!(union(100, &input)?, ivs(&[(0, 20), (30, 50)]));
        Ok(())
    }

    #[test]
    fn test_bad_intervals() {
        assert!(matches!(
            union(100, &ivs(&[(20, 10)])),
            Err(Error::RangeError(RangeError::InvalidInterval { start: 20, end: 10 }))
        ));
        assert!(union(100, &ivs(&[(90, 101)])).is_err());
    }

    #[test]
    fn test_set_algebra() -> Result<()> {
        let a = ivs(&[(0, 100), (200, 300), (400, 500)]);
        let b = ivs(&[(50, 250), (450, 460)]);
        assert_eq!(
            intersect(1_000, &a, &b)?,
            ivs(&[(50, 100), (200, 250), (450, 460)])
        );
        assert_eq!(
            subtract(1_000, &a, &b)?,
            ivs(&[(0, 50), (250, 300), (400, 450), (460, 500)])
        );
        assert_eq!(
            complement(1_000, &a)?,
            ivs(&[(100, 200), (300, 400), (500, 1_000)])
        );
        assert!(complement(10, &[])? == ivs(&[(0, 10)]));
        Ok(())
    }

    #[test]
    fn test_complement_within() -> Result<()> {
        let exons = ivs(&[(500, 600), (100, 200), (250, 300)]);
        assert_eq!(complement_within(&exons)?, ivs(&[(200, 250), (300, 500)]));
        assert!(complement_within(&[])?.is_empty());
        assert!(complement_within(&ivs(&[(10, 20), (15, 30)]))?.is_empty());
        Ok(())
    }

    #[test]
    fn test_runs_in_range_clip() -> Result<()> {
        let mut bits = Bitset::new(100);
        bits.set_range(10, 20)?;
        bits.set_range(50, 10)?;
        let set: Vec<_> = set_runs_in_range(&bits, 15, 55)?.collect();
        assert_eq!(set, ivs(&[(15, 30), (50, 55)]));
        let clear: Vec<_> = clear_runs_in_range(&bits, 0, 100)?.collect();
        assert_eq!(clear, ivs(&[(0, 10), (30, 50), (60, 100)]));
        assert_eq!(set_runs_in_range(&bits, 40, 40)?.count(), 0);
        assert!(set_runs_in_range(&bits, 40, 101).is_err());
        assert_eq!(coverage(&bits, 0, 100)?, 30);
        assert_eq!(coverage(&bits, 25, 55)?, 10);
        assert!(coverage(&bits, 55, 25).is_err());
        Ok(())
    }

    #[test]
    fn test_operations_match_flat_model() -> Result<()> {
        let size = 5_000;
        let mut rng = SmallRng::seed_from_u64(3);
        let random_list = |rng: &mut SmallRng| -> Vec<Interval> {
            (0..40)
                .map(|_| {
                    let start = rng.random_range(0..size);
                    let end = rng.random_range(start..=size.min(start + 300));
                    Interval::new(start, end)
                })
                .collect()
        };
        let a = random_list(&mut rng);
        let b = random_list(&mut rng);

        let mut flat_a = vec![false; size];
        let mut flat_b = vec![false; size];
        for (list, flat) in [(&a, &mut flat_a), (&b, &mut flat_b)] {
            for iv in list {
                flat[iv.start..iv.end].fill(true);
            }
        }
        let expand = |list: Vec<Interval>| {
            let mut flat = vec![false; size];
            for iv in list {
                flat[iv.start..iv.end].fill(true);
            }
            flat
        };

        let both: Vec<bool> = flat_a.iter().zip(&flat_b).map(|(x, y)| *x && *y).collect();
        let only: Vec<bool> = flat_a.iter().zip(&flat_b).map(|(x, y)| *x && !*y).collect();
        let none: Vec<bool> = flat_a.iter().map(|x| !*x).collect();
        assert_eq!(expand(intersect(size, &a, &b)?), both);
        assert_eq!(expand(subtract(size, &a, &b)?), only);
        assert_eq!(expand(complement(size, &a)?), none);
        assert_eq!(expand(union(size, &a)?), flat_a);

        // runs are disjoint, sorted and never adjacent
        let merged = union(size, &a)?;
        assert!(merged.windows(2).all(|w| w[0].end < w[1].start));
        assert!(merged.iter().all(|iv| !iv.is_empty()));
        Ok(())
    }
}
