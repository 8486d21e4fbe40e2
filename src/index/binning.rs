//! Hierarchical (UCSC-style) binning arithmetic
//!
//! The coordinate space is covered by several tiers of bins. The finest tier
//! uses bins of `2^FIRST_SHIFT` positions; every coarser tier is
//! `2^NEXT_SHIFT` times wider. Tiers are laid out in one flat bin array, the
//! finest tier first in offset order (its offset is the largest), the
//! single root bin at offset zero.
//!
//! ```text
//!  tier   bin width   offset
//!   0      128 Ki      585
//!   1        1 Mi       73
//!   2        8 Mi        9
//!   3       64 Mi        1
//!   4      512 Mi        0
//! ```

/// log2 of the finest bin width
pub const FIRST_SHIFT: u32 = 17;

/// log2 of the width ratio between consecutive tiers
pub const NEXT_SHIFT: u32 = 3;

/// Tier offsets covering spaces up to [`MAX_SPACE`]
pub const DEFAULT_OFFSETS: [u32; 5] = [512 + 64 + 8 + 1, 64 + 8 + 1, 8 + 1, 1, 0];

/// Largest coordinate space covered by [`DEFAULT_OFFSETS`] (512 Mi)
pub const MAX_SPACE: u32 = 512 * 1024 * 1024;

/// Returns the tier offsets needed to bin a space of `max` positions
///
/// Spaces up to [`MAX_SPACE`] get the five default tiers; larger spaces get
/// extra coarse tiers until the root bin covers `max`.
#[must_use]
pub fn offsets_for_max_size(max: u32) -> Vec<u32> {
    let mut n_tiers = DEFAULT_OFFSETS.len() as u32;
    while (1u64 << (FIRST_SHIFT + NEXT_SHIFT * (n_tiers - 1))) < u64::from(max) {
        n_tiers += 1;
    }

    // offset of tier t is the number of bins in all coarser tiers
    let mut offsets = vec![0u32; n_tiers as usize];
    for tier in (0..n_tiers as usize - 1).rev() {
        let coarser_bins = 1u32 << (NEXT_SHIFT * (n_tiers - 2 - tier as u32));
        offsets[tier] = offsets[tier + 1] + coarser_bins;
    }
    offsets
}

/// Number of bin slots an index over `[_, max)` needs
#[must_use]
pub fn bin_count(offsets: &[u32], max: u32) -> usize {
    offsets[0] as usize + (max.saturating_sub(1) >> FIRST_SHIFT) as usize + 1
}

/// Smallest bin that fully contains `[start, end)`
///
/// Zero-length intervals are binned as the single position `start`. Returns
/// `None` when the interval does not fit under the root bin.
#[must_use]
pub fn bin_for_range(offsets: &[u32], start: u32, end: u32) -> Option<u32> {
    let last = end.saturating_sub(1).max(start);
    let mut start_bin = start >> FIRST_SHIFT;
    let mut end_bin = last >> FIRST_SHIFT;
    for &offset in offsets {
        if start_bin == end_bin {
            return Some(offset + start_bin);
        }
        start_bin >>= NEXT_SHIFT;
        end_bin >>= NEXT_SHIFT;
    }
    None
}

/// Every bin that may hold an interval overlapping `[start, end)`
///
/// The query is clamped to `[min, max)` first; an empty clamped query
/// yields no bins. Bins are produced finest tier first.
pub(crate) fn candidate_bins(
    offsets: &[u32],
    min: u32,
    max: u32,
    start: u32,
    end: u32,
) -> impl Iterator<Item = usize> + '_ {
    let start = start.max(min);
    let end = end.min(max);
    let (first, last) = if start < end {
        (start >> FIRST_SHIFT, (end - 1) >> FIRST_SHIFT)
    } else {
        (1, 0)
    };
    offsets.iter().enumerate().flat_map(move |(tier, &offset)| {
        let shift = NEXT_SHIFT * tier as u32;
        let (lo, hi) = if first <= last {
            (first >> shift, last >> shift)
        } else {
            (1, 0)
        };
        (offset + lo) as usize..(offset + hi + 1) as usize
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_offsets() {
        assert_eq!(offsets_for_max_size(MAX_SPACE - 1), DEFAULT_OFFSETS);
        assert_eq!(offsets_for_max_size(MAX_SPACE), DEFAULT_OFFSETS);
        assert_eq!(offsets_for_max_size(1), DEFAULT_OFFSETS);
    }

    #[test]
    fn test_large_space_offsets() {
        assert_eq!(
            offsets_for_max_size(MAX_SPACE + 1),
            vec![4096 + 512 + 64 + 8 + 1, 585, 73, 9, 1, 0]
        );
        assert_eq!(offsets_for_max_size(u32::MAX).len(), 6);
    }

    #[test]
    fn test_bin_for_range() {
        let offsets = DEFAULT_OFFSETS;
        assert_eq!(bin_for_range(&offsets, 0, 1), Some(585));
        assert_eq!(bin_for_range(&offsets, 0, 1 << 17), Some(585));
        assert_eq!(bin_for_range(&offsets, 1 << 17, 1 << 18), Some(586));
        assert_eq!(bin_for_range(&offsets, 0, (1 << 17) + 1), Some(73));
        assert_eq!(bin_for_range(&offsets, 0, 1 << 29), Some(0));
        assert_eq!(bin_for_range(&offsets, 0, (1 << 29) + 1), None);
        assert_eq!(bin_for_range(&offsets, 5, 5), Some(585));
    }

    #[test]
    fn test_bin_count() {
        assert_eq!(bin_count(&DEFAULT_OFFSETS, MAX_SPACE), 585 + 4096);
        assert_eq!(bin_count(&DEFAULT_OFFSETS, 1), 586);
        assert_eq!(bin_count(&DEFAULT_OFFSETS, 1 << 20), 585 + 8);
    }

    #[test]
    fn test_candidate_bins() {
        let bins: Vec<_> = candidate_bins(&DEFAULT_OFFSETS, 0, MAX_SPACE, 0, 1 << 18).collect();
        assert_eq!(bins, vec![585, 586, 73, 9, 1, 0]);

        let clamped: Vec<_> = candidate_bins(&DEFAULT_OFFSETS, 0, 100, 50, 1 << 20).collect();
        assert_eq!(clamped, vec![585, 73, 9, 1, 0]);

        assert_eq!(candidate_bins(&DEFAULT_OFFSETS, 0, 100, 100, 200).count(), 0);
        assert_eq!(candidate_bins(&DEFAULT_OFFSETS, 0, 100, 10, 10).count(), 0);
    }

    #[test]
    fn test_binned_interval_is_found_by_candidates() {
        let offsets = offsets_for_max_size(u32::MAX);
        let ranges = [(0, 1), (3 << 17, 5 << 17), (1 << 30, (1 << 30) + 9), (7, u32::MAX)];
        for (start, end) in ranges {
            let bin = bin_for_range(&offsets, start, end).map(|b| b as usize);
            assert!(bin.is_some());
            let found =
                candidate_bins(&offsets, 0, u32::MAX, start, start + 1).any(|b| Some(b) == bin);
            assert!(found, "bin of [{start}, {end}) not scanned");
        }
    }
}
