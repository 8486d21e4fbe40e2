//! Random placement of intervals into free space
//!
//! Free space is kept as a list of gaps sorted longest first. For a given
//! length every admissible start position across all gaps is equally
//! likely: a running count of candidate starts per gap is built once per
//! distinct length and a uniform draw is located in it by binary search.
//! Without overlap, the chosen gap is removed and whatever is left on either
//! side of the placement goes back into the list if it can still hold the
//! shortest requested length.

use rand::Rng;

use super::Interval;
use crate::bits::{BinnedBitset, BitQuery};
use crate::error::{CapacityError, RangeError, Result};

/// A free region; ordering puts longer gaps first once sorted in reverse
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Gap {
    len: usize,
    start: usize,
    /// Index of the region the gap was carved from
    region: usize,
}

/// Inserts `gap` keeping `gaps` in descending order
fn insert_sorted(gaps: &mut Vec<Gap>, gap: Gap) {
    let at = gaps.partition_point(|g| *g > gap);
    gaps.insert(at, gap);
}

fn place<R: Rng>(
    lengths: &[usize],
    mut gaps: Vec<Gap>,
    allow_overlap: bool,
    rng: &mut R,
) -> Result<Vec<(Interval, usize)>> {
    let Some(min_length) = lengths.iter().copied().filter(|&l| l > 0).min() else {
        return Ok(Vec::new());
    };
    let total = lengths.iter().filter(|&&l| l > 0).count();

    gaps.retain(|g| g.len >= min_length);
    gaps.sort_unstable_by(|a, b| b.cmp(a));

    let mut placed = Vec::with_capacity(total);
    let mut prefix: Vec<usize> = Vec::with_capacity(gaps.len());
    let mut candidates = 0;
    let mut prepared_for = None;

    for &length in lengths.iter().filter(|&&l| l > 0) {
        if prepared_for != Some(length) {
            prefix.clear();
            candidates = 0;
            for gap in gaps.iter().take_while(|g| g.len >= length) {
                prefix.push(candidates);
                candidates += gap.len - length + 1;
            }
            prepared_for = Some(length);
        }
        if candidates == 0 {
            return Err(CapacityError::NoRoomForLength {
                length,
                placed: placed.len(),
                total,
            }
            .into());
        }

        let draw = rng.random_range(0..candidates);
        // prefix[0] == 0, so at least one entry is <= draw
        let index = prefix.partition_point(|&c| c <= draw) - 1;
        let offset = draw - prefix[index];
        let gap = gaps[index];

        if !allow_overlap {
            gaps.remove(index);
            if offset >= min_length {
                insert_sorted(
                    &mut gaps,
                    Gap {
                        len: offset,
                        start: gap.start,
                        region: gap.region,
                    },
                );
            }
            let tail = gap.len - offset - length;
            if tail >= min_length {
                insert_sorted(
                    &mut gaps,
                    Gap {
                        len: tail,
                        start: gap.start + offset + length,
                        region: gap.region,
                    },
                );
            }
            prepared_for = None;
        }

        let start = gap.start + offset;
        placed.push((Interval::new(start, start + length), gap.region));
    }
    Ok(placed)
}

/// Places each length at a uniformly random position where `mask` is clear
///
/// Lengths are placed in the order given; zero lengths are skipped. Unless
/// `allow_overlap` is set, placed intervals never overlap one another.
///
/// # Errors
///
/// * `CapacityError::NoRoomForLength` - If no remaining gap can hold a length.
///   Nothing is retried; callers wanting another attempt call again.
pub fn throw_random<B: BitQuery, R: Rng>(
    lengths: &[usize],
    mask: &B,
    allow_overlap: bool,
    rng: &mut R,
) -> Result<Vec<Interval>> {
    let mut gaps = Vec::new();
    let mut end = 0;
    loop {
        let start = mask.next_clear(end);
        if start >= mask.size() {
            break;
        }
        end = mask.next_set(start);
        gaps.push(Gap {
            len: end - start,
            start,
            region: 0,
        });
    }
    let placed = place(lengths, gaps, allow_overlap, rng)?;
    log::trace!("Placed {} intervals into {} positions", placed.len(), mask.size());
    Ok(placed.into_iter().map(|(iv, _)| iv).collect())
}

/// Like [`throw_random`], returning the placements as a bitset the size of `mask`
pub fn throw_random_bits<B: BitQuery, R: Rng>(
    lengths: &[usize],
    mask: &B,
    allow_overlap: bool,
    rng: &mut R,
) -> Result<BinnedBitset> {
    let placed = throw_random(lengths, mask, allow_overlap, rng)?;
    let mut bits = BinnedBitset::new(mask.size())?;
    for iv in placed {
        bits.set_range(iv.start, iv.len())?;
    }
    Ok(bits)
}

/// Places each length inside one of `regions`
///
/// Each placement is returned with the index of the region it falls in.
/// The regions themselves may overlap; placements only avoid each other
/// within the region they were carved from.
///
/// # Errors
///
/// * `RangeError::InvalidInterval` - If a region ends before it starts
/// * `CapacityError::NoRoomForLength` - If no remaining region can hold a length
pub fn throw_random_regions<R: Rng>(
    lengths: &[usize],
    regions: &[Interval],
    allow_overlap: bool,
    rng: &mut R,
) -> Result<Vec<(Interval, usize)>> {
    let gaps = regions
        .iter()
        .enumerate()
        .map(|(region, iv)| {
            if iv.end < iv.start {
                return Err(RangeError::InvalidInterval {
                    start: iv.start,
                    end: iv.end,
                }
                .into());
            }
            Ok(Gap {
                len: iv.len(),
                start: iv.start,
                region,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    place(lengths, gaps, allow_overlap, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::intervals::{bits_from_intervals, intervals_from_bits};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn mask() -> Result<BinnedBitset> {
        // clear gaps: [100, 200), [400, 450), [900, 1000)
        bits_from_intervals(
            1_000,
            [(0, 100), (200, 400), (450, 900)].map(Interval::from),
        )
    }

    #[test]
    fn test_placements_avoid_mask_and_each_other() -> Result<()> {
        let mask = mask()?;
        let lengths = [40, 30, 20, 20, 10, 10, 5];
        for seed in 0..50 {
            let mut rng = SmallRng::seed_from_u64(seed);
            let placed = throw_random(&lengths, &mask, false, &mut rng)?;
            assert_eq!(placed.len(), lengths.len());
            for (iv, &len) in placed.iter().zip(&lengths) {
                assert_eq!(iv.len(), len);
                assert_eq!(mask.count_range(iv.start, iv.len())?, 0);
            }
            let mut rng = SmallRng::seed_from_u64(seed);
            let bits = throw_random_bits(&lengths, &mask, false, &mut rng)?;
            assert_eq!(bits.count(), lengths.iter().sum::<usize>());
            assert_eq!(bits.size(), mask.size());
        }
        Ok(())
    }

    #[test]
    fn test_exact_fit_and_no_room() -> Result<()> {
        let mask = mask()?;
        let mut rng = SmallRng::seed_from_u64(7);
        let placed = throw_random(&[100, 100], &mask, false, &mut rng)?;
        let mut starts: Vec<_> = placed.iter().map(|iv| iv.start).collect();
        starts.sort_unstable();
        assert_eq!(starts, vec![100, 900]);

        assert!(matches!(
            throw_random(&[100, 100, 100], &mask, false, &mut rng),
            Err(Error::CapacityError(CapacityError::NoRoomForLength {
                length: 100,
                placed: 2,
                total: 3
            }))
        ));
        assert!(throw_random(&[101], &mask, false, &mut rng).is_err());
        Ok(())
    }

    #[test]
    fn test_overlap_allowed_reuses_space() -> Result<()> {
        let mask = mask()?;
        let mut rng = SmallRng::seed_from_u64(1);
        let placed = throw_random(&[100; 10], &mask, true, &mut rng)?;
        assert!(placed.iter().all(|iv| iv.start == 100 || iv.start == 900));
        Ok(())
    }

    #[test]
    fn test_zero_lengths_are_ignored() -> Result<()> {
        let mask = mask()?;
        let mut rng = SmallRng::seed_from_u64(2);
        assert!(throw_random(&[0, 0], &mask, false, &mut rng)?.is_empty());
        assert!(throw_random(&[], &mask, false, &mut rng)?.is_empty());
        assert_eq!(throw_random(&[0, 10, 0], &mask, false, &mut rng)?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_full_mask_has_no_room() -> Result<()> {
        let mut full = BinnedBitset::new(500)?;
        full.invert();
        let mut rng = SmallRng::seed_from_u64(0);
        assert!(throw_random(&[1], &full, false, &mut rng).is_err());
        Ok(())
    }

    #[test]
    fn test_every_start_is_reachable() -> Result<()> {
        let mask = bits_from_intervals(20, [Interval::new(0, 10)])?;
        let mut rng = SmallRng::seed_from_u64(5);
        let mut seen = [0usize; 20];
        for _ in 0..2_000 {
            for iv in throw_random(&[3], &mask, false, &mut rng)? {
                seen[iv.start] += 1;
            }
        }
        // starts 10..=17 are the candidates of the single gap [10, 20)
        assert!(seen[..10].iter().all(|&n| n == 0));
        assert!(seen[10..18].iter().all(|&n| n > 150));
        assert!(seen[18..].iter().all(|&n| n == 0));
        Ok(())
    }

    #[test]
    fn test_regions_keep_identity() -> Result<()> {
        let regions = [Interval::new(0, 50), Interval::new(1_000, 1_010), Interval::new(5, 5)];
        let mut rng = SmallRng::seed_from_u64(9);
        let placed = throw_random_regions(&[10, 20, 5], &regions, false, &mut rng)?;
        assert_eq!(placed.len(), 3);
        for (iv, region) in &placed {
            let outer = regions[*region];
            assert!(outer.start <= iv.start && iv.end <= outer.end);
        }
        // the 20 only fits the first region
        assert_eq!(placed[1].1, 0);

        let within = bits_from_intervals(
            2_000,
            placed.iter().map(|(iv, _)| *iv),
        )?;
        assert_eq!(within.count(), 35);
        assert_eq!(intervals_from_bits(&within).iter().map(Interval::len).sum::<usize>(), 35);

        assert!(throw_random_regions(&[1], &[Interval::new(5, 2)], false, &mut rng).is_err());
        Ok(())
    }
}
