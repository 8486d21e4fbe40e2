use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::codec::Codec;
use super::element::{encode, Element};
use super::header::{write_table, ArrayHeader};
use super::{DEFAULT_BIN_SIZE, MAX_SPACE};
use crate::error::{CapacityError, RangeError, Result};

/// Sparse numeric array split into lazily allocated blocks
///
/// The array covers `max_size` slots, grouped into blocks of `bin_size`
/// slots. A block is allocated (filled with the default value) the first
/// time one of its slots is written; slots of untouched blocks read as the
/// default.
#[derive(Debug, Clone)]
pub struct BinnedArray<T: Element> {
    max_size: usize,
    bin_size: usize,
    default: T,
    bins: Vec<Option<Box<[T]>>>,
}
impl<T: Element> BinnedArray<T> {
    /// Creates an empty array
    ///
    /// # Errors
    ///
    /// * `CapacityError::ZeroBlockSize` - If `bin_size` is zero
    /// * `CapacityError::SizeExceedsMaximum` - If `max_size` or `bin_size` do not fit the
    ///   32-bit fields of the file format
    pub fn new(max_size: usize, bin_size: usize, default: T) -> Result<Self> {
        if bin_size == 0 {
            return Err(CapacityError::ZeroBlockSize.into());
        }
        for size in [max_size, bin_size] {
            if size as u64 > u64::from(u32::MAX) {
                return Err(CapacityError::SizeExceedsMaximum {
                    size: size as u64,
                    max: u64::from(u32::MAX),
                }
                .into());
            }
        }
        Ok(Self {
            max_size,
            bin_size,
            default,
            bins: vec![None; max_size.div_ceil(bin_size)],
        })
    }

    #[must_use]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    #[must_use]
    pub fn bin_size(&self) -> usize {
        self.bin_size
    }

    #[must_use]
    pub fn n_bins(&self) -> usize {
        self.bins.len()
    }

    #[must_use]
    pub fn default_value(&self) -> T {
        self.default
    }

    /// Number of blocks holding storage
    #[must_use]
    pub fn n_allocated(&self) -> usize {
        self.bins.iter().filter(|b| b.is_some()).count()
    }

    fn check_pos(&self, pos: usize) -> Result<()> {
        if pos >= self.max_size {
            return Err(RangeError::PositionOutOfRange {
                pos,
                size: self.max_size,
            }
            .into());
        }
        Ok(())
    }

    fn check_range(&self, start: usize, end: usize) -> Result<()> {
        if start > end {
            return Err(RangeError::InvalidInterval { start, end }.into());
        }
        if end > self.max_size {
            return Err(RangeError::RangeOutOfBounds {
                start,
                end,
                size: self.max_size,
            }
            .into());
        }
        Ok(())
    }

    pub fn get(&self, pos: usize) -> Result<T> {
        self.check_pos(pos)?;
        Ok(match &self.bins[pos / self.bin_size] {
            Some(bin) => bin[pos % self.bin_size],
            None => self.default,
        })
    }

    pub fn set(&mut self, pos: usize, value: T) -> Result<()> {
        self.check_pos(pos)?;
        let (index, offset) = (pos / self.bin_size, pos % self.bin_size);
        self.bin_mut(index)[offset] = value;
        Ok(())
    }

    fn bin_mut(&mut self, index: usize) -> &mut [T] {
        let (bin_size, default) = (self.bin_size, self.default);
        self.bins[index].get_or_insert_with(|| vec![default; bin_size].into_boxed_slice())
    }

    /// Assigns `value` to every slot in `[start, end)`
    pub fn set_range(&mut self, start: usize, end: usize, value: T) -> Result<()> {
        self.check_range(start, end)?;
        let mut pos = start;
        while pos < end {
            let (index, offset) = (pos / self.bin_size, pos % self.bin_size);
            let n = (self.bin_size - offset).min(end - pos);
            self.bin_mut(index)[offset..offset + n].fill(value);
            pos += n;
        }
        Ok(())
    }

    /// Assigns every `(start, end, value)` run in order
    pub fn load<I>(&mut self, runs: I) -> Result<()>
    where
        I: IntoIterator<Item = (usize, usize, T)>,
    {
        runs.into_iter()
            .try_for_each(|(start, end, value)| self.set_range(start, end, value))
    }

    /// Values of `[start, end)`, with untouched slots read as the default
    pub fn get_range(&self, start: usize, end: usize) -> Result<Vec<T>> {
        self.check_range(start, end)?;
        let mut values = Vec::with_capacity(end - start);
        let mut pos = start;
        while pos < end {
            let (index, offset) = (pos / self.bin_size, pos % self.bin_size);
            let n = (self.bin_size - offset).min(end - pos);
            match &self.bins[index] {
                Some(bin) => values.extend_from_slice(&bin[offset..offset + n]),
                None => values.resize(values.len() + n, self.default),
            }
            pos += n;
        }
        Ok(values)
    }

    /// Serializes the array, compressing each allocated block independently
    ///
    /// Blocks are compressed before anything is written so the header, the
    /// bin table and the payloads go out in a single forward pass.
    pub fn write_to<W: Write>(&self, writer: &mut W, codec: Codec) -> Result<()> {
        let header = ArrayHeader::new(
            self.max_size as u32,
            self.bin_size as u32,
            self.bins.len() as u32,
            codec,
            self.default,
        );
        let payloads = self
            .bins
            .iter()
            .map(|bin| {
                bin.as_deref()
                    .map(|values| codec.compress(&encode(values)))
                    .transpose()
            })
            .collect::<Result<Vec<_>>>()?;

        let mut offset = header.data_offset();
        let table: Vec<(u64, usize)> = payloads
            .iter()
            .map(|payload| match payload {
                Some(bytes) => {
                    let entry = (offset, bytes.len());
                    offset += bytes.len() as u64;
                    entry
                }
                None => (0, 0),
            })
            .collect();

        header.write_bytes(writer)?;
        write_table(writer, &table)?;
        for bytes in payloads.iter().flatten() {
            writer.write_all(bytes)?;
        }
        writer.flush()?;
        log::debug!(
            "Wrote binned array: {} of {} bins stored, {offset} bytes ({codec:?})",
            self.n_allocated(),
            self.bins.len(),
        );
        Ok(())
    }

    /// Writes the array to a file at `path`
    pub fn to_path<P: AsRef<Path>>(&self, path: P, codec: Codec) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer, codec)
    }
}

impl Default for BinnedArray<f32> {
    /// A 512 Mi slot array of NaN with 512 Ki slot blocks
    fn default() -> Self {
        Self {
            max_size: MAX_SPACE as usize,
            bin_size: DEFAULT_BIN_SIZE,
            default: f32::NAN,
            bins: vec![None; (MAX_SPACE as usize).div_ceil(DEFAULT_BIN_SIZE)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_creation_limits() {
        assert!(matches!(
            BinnedArray::new(100, 0, 0u8),
            Err(Error::CapacityError(CapacityError::ZeroBlockSize))
        ));
        assert!(BinnedArray::new(5_000_000_000, 1024, 0u8).is_err());
        assert!(BinnedArray::new(u32::MAX as usize, 1024, 0u8).is_ok());
    }

    #[test]
    fn test_default_array() -> Result<()> {
        let array = BinnedArray::<f32>::default();
        assert_eq!(array.max_size(), 512 * 1024 * 1024);
        assert_eq!(array.n_bins(), 1024);
        assert!(array.get(12_345_678)?.is_nan());
        assert_eq!(array.n_allocated(), 0);
        Ok(())
    }

    #[test]
    fn test_sparse_defaults() -> Result<()> {
        let mut array = BinnedArray::new(1_000, 128, -1i32)?;
        array.set(5, 10)?;
        array.set(999, 20)?;
        assert_eq!(array.n_allocated(), 2);
        assert_eq!(array.get(5)?, 10);
        assert_eq!(array.get(6)?, -1);
        assert_eq!(array.get(500)?, -1);
        assert_eq!(array.get(999)?, 20);
        assert!(array.get(1_000).is_err());
        assert!(array.set(1_000, 0).is_err());

        let range = array.get_range(0, 1_000)?;
        assert_eq!(range.len(), 1_000);
        assert_eq!(range.iter().filter(|&&v| v != -1).count(), 2);
        assert!(array.get_range(0, 0)?.is_empty());
        assert!(array.get_range(10, 5).is_err());
        assert!(array.get_range(10, 1_001).is_err());
        Ok(())
    }

    #[test]
    fn test_set_at_block_edges() -> Result<()> {
        let mut array = BinnedArray::new(250, 100, 0u8)?;
        for (pos, value) in [(0, 1), (99, 2), (100, 3), (199, 4), (200, 5), (249, 6)] {
            array.set(pos, value)?;
        }
        assert_eq!(array.n_allocated(), 3);
        let values = array.get_range(0, 250)?;
        assert_eq!(
            [values[0], values[99], values[100], values[199], values[200], values[249]],
            [1, 2, 3, 4, 5, 6]
        );
        assert_eq!(values.iter().filter(|&&v| v != 0).count(), 6);
        Ok(())
    }

    #[test]
    fn test_set_range_and_load() -> Result<()> {
        let mut array = BinnedArray::new(1_000, 100, 0u16)?;
        array.load([(50, 250, 7), (240, 260, 9), (900, 900, 1)])?;
        assert_eq!(array.n_allocated(), 3);
        assert_eq!(array.get(49)?, 0);
        assert_eq!(array.get(50)?, 7);
        assert_eq!(array.get(239)?, 7);
        assert_eq!(array.get(240)?, 9);
        assert_eq!(array.get(259)?, 9);
        assert_eq!(array.get(260)?, 0);
        assert_eq!(array.get(900)?, 0);
        Ok(())
    }

    #[test]
    fn test_random_access_matches_vector() -> Result<()> {
        let mut rng = SmallRng::seed_from_u64(11);
        let size = 13 * 900;
        let mut flat = vec![f32::NAN; size];
        let mut array = BinnedArray::new(size, 128, f32::NAN)?;
        for chunk in flat.chunks_mut(900) {
            if rng.random_bool(0.5) {
                chunk.iter_mut().for_each(|v| *v = rng.random());
            }
        }
        for (pos, &value) in flat.iter().enumerate() {
            if !value.is_nan() {
                array.set(pos, value)?;
            }
        }
        for _ in 0..50 {
            let a = rng.random_range(0..size);
            let b = rng.random_range(a..=size);
            let got = array.get_range(a, b)?;
            let want = &flat[a..b];
            assert!(got
                .iter()
                .zip(want)
                .all(|(g, w)| g == w || (g.is_nan() && w.is_nan())));
        }
        Ok(())
    }
}
