//! # binspan
//!
//! Data structures for working with large sets of intervals over genomic
//! coordinates: block-partitioned bit vectors, a hierarchical binning index
//! for interval overlap queries, and sparse numeric arrays with compressed,
//! randomly accessible files.
//!
//! ## Modules
//!
//! * [`bits`] - flat and lazily allocated bit vectors with word-level run scans
//! * [`index`] - interval-to-payload index with an on-disk format read on demand
//! * [`array`] - sparse per-position numeric arrays, in memory and on disk
//! * [`intervals`] - interval set algebra, random placement and clustering
//!
//! Every structure is synchronous and owns its state; independent readers
//! over the same file may be used from different threads.
//!
//! ## Logging
//!
//! Diagnostics go through the [`log`](https://docs.rs/log) facade and are
//! silent unless the application installs a logger.

pub mod array;
pub mod bits;
mod error;
pub mod index;
pub mod intervals;
pub mod prelude;
mod source;
mod utils;

pub use error::{CapacityError, Error, FormatError, RangeError, Result, SizeMismatchError};
pub use source::{MmapSource, SeekSource, Source};

#[cfg(test)]
mod testing {

    use super::array::{BinnedArray, BinnedArrayWriterBuilder, CacheMode, Codec, FileBinnedArray};
    use super::bits::{BinnedBitset, Bitset};
    use super::index::{Entry, Index, IndexFile, Indexes};
    use super::intervals::{intervals_from_bits, throw_random, Interval};
    use super::SeekSource;
    use anyhow::Result;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use std::io::Cursor;

    #[test]
    fn test_bitset_scenario() -> Result<()> {
        let mut flat = Bitset::new(100);
        let mut binned = BinnedBitset::with_granularity(100, 16)?;
        flat.set_range(10, 20)?;
        binned.set_range(10, 20)?;

        assert_eq!(flat.count_range(0, 100)?, 20);
        assert_eq!(flat.next_set(0), 10);
        assert_eq!(flat.next_clear(10), 30);
        assert_eq!(flat.next_set(30), 100);

        assert_eq!(binned.count_range(0, 100)?, 20);
        assert_eq!(binned.next_set(0), 10);
        assert_eq!(binned.next_clear(10), 30);
        assert_eq!(binned.next_set(30), 100);
        Ok(())
    }

    #[test]
    fn test_index_scenario() -> Result<()> {
        let mut index = Index::new(0, 1 << 20)?;
        index.add(1000, 2000, 7)?;
        index.add(500_000, 500_100, 9)?;
        assert_eq!(index.find(1500, 1600), vec![Entry::new(1000, 2000, 7)]);
        assert!(index.find(0, 500).is_empty());

        // the same answers once written and read back
        let mut indexes = Indexes::new();
        indexes.insert("chr1", index);
        let mut buffer = Vec::new();
        indexes.write(&mut buffer)?;
        let mut file = IndexFile::from_source(SeekSource::new(Cursor::new(buffer)))?;
        assert_eq!(file.find("chr1", 1500, 1600)?, vec![Entry::new(1000, 2000, 7)]);
        assert!(file.find("chr1", 0, 500)?.is_empty());
        assert!(file.find("chr2", 0, 500)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_index_round_trip_shapes() -> Result<()> {
        let empty = Index::new(0, 1 << 20)?;
        let mut sparse = Index::new(0, 1 << 20)?;
        sparse.add(10, 20, 1)?;
        let mut dense = Index::new(0, 4096)?;
        for start in 0..4095 {
            dense.add(start, start + 1, start)?;
        }

        let mut indexes = Indexes::new();
        indexes.insert("dense", dense.clone());
        indexes.insert("empty", empty);
        indexes.insert("sparse", sparse.clone());
        let mut buffer = Vec::new();
        indexes.write(&mut buffer)?;

        let mut file = IndexFile::from_source(SeekSource::new(Cursor::new(buffer)))?;
        assert!(file.find("empty", 0, 1 << 20)?.is_empty());
        assert_eq!(file.find("sparse", 0, 100)?, sparse.find(0, 100));
        for (start, end) in [(0, 4096), (100, 101), (1000, 3000)] {
            assert_eq!(file.find("dense", start, end)?, dense.find(start, end));
        }
        Ok(())
    }

    #[test]
    fn test_array_round_trip_shapes() -> Result<()> {
        let size = 3_000;
        let empty = BinnedArray::new(size, 256, f32::NAN)?;
        let mut sparse = BinnedArray::new(size, 256, f32::NAN)?;
        sparse.set(1_234, 5.5)?;
        let mut dense = BinnedArray::new(size, 256, f32::NAN)?;
        for pos in 0..size {
            dense.set(pos, pos as f32)?;
        }

        for (array, codec) in [(empty, Codec::None), (sparse, Codec::Zlib), (dense, Codec::Zstd)] {
            let mut buffer = Vec::new();
            array.write_to(&mut buffer, codec)?;
            let source = SeekSource::new(Cursor::new(buffer));
            let mut file = FileBinnedArray::<f32, _>::from_source(source, CacheMode::Lru(2))?;
            let stored = file.get_range(0, size)?;
            let expected = array.get_range(0, size)?;
            assert!(stored
                .iter()
                .zip(&expected)
                .all(|(a, b)| a == b || (a.is_nan() && b.is_nan())));
        }
        Ok(())
    }

    #[test]
    fn test_streamed_array_on_disk() -> Result<()> {
        let file = tempfile::NamedTempFile::new()?;
        let mut writer = BinnedArrayWriterBuilder::<f64>::default()
            .bin_size(100)
            .max_size(1_000)
            .build(file.reopen()?)?;
        for pos in 0..450 {
            if pos % 3 == 0 {
                writer.write(pos as f64)?;
            } else {
                writer.skip()?;
            }
        }
        writer.finish()?;
        drop(writer);

        let mut mapped = FileBinnedArray::<f64, _>::open_mmap(file.path(), CacheMode::Lite)?;
        assert!((mapped.get(300)? - 300.0).abs() < f64::EPSILON);
        assert!(mapped.get(301)?.is_nan());
        assert!(mapped.get(999)?.is_nan());
        Ok(())
    }

    #[test]
    fn test_random_placement_stays_clear() -> Result<()> {
        let mut mask = BinnedBitset::with_granularity(10_000, 512)?;
        mask.set_range(0, 2_000)?;
        mask.set_range(5_000, 1_000)?;
        let lengths = [500, 250, 250, 100, 100, 100, 50];
        let mut rng = SmallRng::seed_from_u64(42);
        let placed = throw_random(&lengths, &mask, false, &mut rng)?;

        let mut covered = BinnedBitset::with_granularity(10_000, 512)?;
        for iv in &placed {
            assert_eq!(mask.count_range(iv.start, iv.len())?, 0);
            assert_eq!(covered.count_range(iv.start, iv.len())?, 0);
            covered.set_range(iv.start, iv.len())?;
        }
        assert_eq!(covered.count(), lengths.iter().sum::<usize>());
        let runs: usize = intervals_from_bits(&covered).iter().map(Interval::len).sum();
        assert_eq!(runs, 1_350);
        Ok(())
    }
}
