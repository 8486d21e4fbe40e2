use std::collections::{BTreeMap, HashMap};

use crate::bits::BinnedBitset;
use crate::error::{RangeError, Result};
use crate::index::binning::MAX_SPACE;

/// Extra positions added around every interval before it is set
///
/// Padding is clamped to `[0, size)` of the chromosome's bitset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Padding {
    /// Positions added before the start
    pub upstream: usize,
    /// Positions added after the end
    pub downstream: usize,
}
impl Padding {
    #[must_use]
    pub fn new(upstream: usize, downstream: usize) -> Self {
        Self {
            upstream,
            downstream,
        }
    }
}

/// Builds one bitset per chromosome from `(chrom, start, end)` records
///
/// The bitset of a chromosome is sized from `lens` when it has an entry,
/// otherwise it spans the full 512 Mi position space. Records of the same
/// chromosome need not be contiguous.
///
/// ```rust
/// use std::collections::HashMap;
/// use binspan::intervals::{bitsets_from_intervals, Padding};
///
/// let records = [("chr1", 10, 20), ("chr2", 0, 5), ("chr1", 15, 30)];
/// let lens = HashMap::from([("chr1".to_string(), 100)]);
/// let bitsets = bitsets_from_intervals(records, &lens, Padding::default()).unwrap();
///
/// assert_eq!(bitsets["chr1"].size(), 100);
/// assert_eq!(bitsets["chr1"].count(), 20);
/// assert_eq!(bitsets["chr2"].count(), 5);
/// ```
///
/// # Errors
///
/// * `RangeError::InvalidInterval` - If a record ends before it starts
/// * `RangeError::RangeOutOfBounds` - If an unpadded record extends past its
///   chromosome length
pub fn bitsets_from_intervals<I, S>(
    records: I,
    lens: &HashMap<String, usize>,
    padding: Padding,
) -> Result<BTreeMap<String, BinnedBitset>>
where
    I: IntoIterator<Item = (S, usize, usize)>,
    S: AsRef<str>,
{
    let mut bitsets: BTreeMap<String, BinnedBitset> = BTreeMap::new();
    for (chrom, start, end) in records {
        let chrom = chrom.as_ref();
        if start > end {
            return Err(RangeError::InvalidInterval { start, end }.into());
        }
        if !bitsets.contains_key(chrom) {
            let size = lens.get(chrom).copied().unwrap_or(MAX_SPACE as usize);
            log::trace!("New bitset for {chrom} of {size} positions");
            bitsets.insert(chrom.to_string(), BinnedBitset::new(size)?);
        }
        let Some(bits) = bitsets.get_mut(chrom) else {
            continue;
        };
        let start = start.saturating_sub(padding.upstream);
        let end = if padding.downstream > 0 {
            end.saturating_add(padding.downstream).min(bits.size())
        } else {
            end
        };
        bits.set_range(start, end.saturating_sub(start))?;
    }
    Ok(bitsets)
}
