use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::element::{decode, Element};
use super::header::{read_table, ArrayHeader};
use super::DEFAULT_CACHE_BLOCKS;
use crate::error::{Error, FormatError, RangeError, Result};
use crate::source::{MmapSource, SeekSource, Source};

/// How decoded blocks are retained by a [`FileBinnedArray`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Every block stays resident once loaded
    Unbounded,
    /// At most `n` blocks stay resident, least recently used evicted first
    ///
    /// A capacity of zero behaves like one.
    Lru(usize),
    /// Only the most recently loaded block stays resident
    Lite,
}
impl Default for CacheMode {
    fn default() -> Self {
        Self::Lru(DEFAULT_CACHE_BLOCKS)
    }
}

/// Decoded blocks keyed by bin index
#[derive(Debug)]
struct BlockCache<T> {
    mode: CacheMode,
    blocks: HashMap<usize, Box<[T]>>,

    /// Recency order for LRU eviction, oldest first
    order: VecDeque<usize>,
}
impl<T: Element> BlockCache<T> {
    fn new(mode: CacheMode) -> Self {
        Self {
            mode,
            blocks: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn len(&self) -> usize {
        self.blocks.len()
    }

    fn touch(&mut self, bin: usize) {
        if let CacheMode::Lru(_) = self.mode {
            if let Some(pos) = self.order.iter().position(|&b| b == bin) {
                self.order.remove(pos);
            }
            self.order.push_back(bin);
        }
    }

    /// Evicts blocks so one more fits
    fn make_room(&mut self) {
        match self.mode {
            CacheMode::Unbounded => {}
            CacheMode::Lite => {
                if !self.blocks.is_empty() {
                    log::trace!("Dropping {} cached blocks", self.blocks.len());
                    self.blocks.clear();
                }
            }
            CacheMode::Lru(capacity) => {
                while self.blocks.len() >= capacity.max(1) {
                    let Some(oldest) = self.order.pop_front() else {
                        break;
                    };
                    log::trace!("Evicting block {oldest}");
                    self.blocks.remove(&oldest);
                }
            }
        }
    }

    /// Returns the cached block for `bin`, loading it with `load` when absent
    fn get_or_load<F>(&mut self, bin: usize, load: F) -> Result<&[T]>
    where
        F: FnOnce() -> Result<Box<[T]>>,
    {
        if self.blocks.contains_key(&bin) {
            self.touch(bin);
        } else {
            let block = load()?;
            self.make_room();
            self.touch(bin);
            self.blocks.insert(bin, block);
        }
        Ok(&**self.blocks.entry(bin).or_default())
    }
}

/// Read-only random access to a binned array file
///
/// Only the header and bin table are read on open. Blocks are decompressed
/// on first access and retained according to the [`CacheMode`].
pub struct FileBinnedArray<T: Element, S: Source> {
    source: S,
    header: ArrayHeader<T>,
    table: Vec<(u64, usize)>,
    cache: BlockCache<T>,
}
impl<T: Element> FileBinnedArray<T, SeekSource<BufReader<File>>> {
    /// Opens a binned array file through a buffered file handle
    pub fn open<P: AsRef<Path>>(path: P, cache: CacheMode) -> Result<Self> {
        Self::from_source(SeekSource::open(path)?, cache)
    }
}
impl<T: Element> FileBinnedArray<T, MmapSource> {
    /// Opens a binned array file through a memory map
    pub fn open_mmap<P: AsRef<Path>>(path: P, cache: CacheMode) -> Result<Self> {
        Self::from_source(MmapSource::open(path)?, cache)
    }
}
impl<T: Element, S: Source> FileBinnedArray<T, S> {
    /// Reads the header and bin table from `source`
    pub fn from_source(mut source: S, cache: CacheMode) -> Result<Self> {
        let header = ArrayHeader::from_source(&mut source)?;
        let table = read_table(&mut source, &header)?;
        log::debug!(
            "Opened binned array (version {}): {} slots, {} bins of {} ({:?})",
            header.version,
            header.max_size,
            header.nbins,
            header.bin_size,
            header.codec
        );
        Ok(Self {
            source,
            header,
            table,
            cache: BlockCache::new(cache),
        })
    }

    #[must_use]
    pub fn header(&self) -> &ArrayHeader<T> {
        &self.header
    }

    #[must_use]
    pub fn max_size(&self) -> usize {
        self.header.max_size as usize
    }

    #[must_use]
    pub fn bin_size(&self) -> usize {
        self.header.bin_size as usize
    }

    #[must_use]
    pub fn default_value(&self) -> T {
        self.header.default
    }

    /// Number of decoded blocks currently held in memory
    #[must_use]
    pub fn cached_blocks(&self) -> usize {
        self.cache.len()
    }

    /// True when `bin` has a stored payload
    fn is_stored(&self, bin: usize) -> bool {
        self.table.get(bin).is_some_and(|&(_, len)| len > 0)
    }

    fn block(&mut self, bin: usize) -> Result<&[T]> {
        let Self {
            source,
            header,
            table,
            cache,
        } = self;
        cache.get_or_load(bin, || read_block(source, header, table[bin], bin))
    }

    pub fn get(&mut self, pos: usize) -> Result<T> {
        if pos >= self.max_size() {
            return Err(RangeError::PositionOutOfRange {
                pos,
                size: self.max_size(),
            }
            .into());
        }
        let (bin, offset) = (pos / self.bin_size(), pos % self.bin_size());
        if !self.is_stored(bin) {
            return Ok(self.header.default);
        }
        Ok(self.block(bin)?[offset])
    }

    /// Values of `[start, end)`, with unstored slots read as the default
    pub fn get_range(&mut self, start: usize, end: usize) -> Result<Vec<T>> {
        if start > end {
            return Err(RangeError::InvalidInterval { start, end }.into());
        }
        if end > self.max_size() {
            return Err(RangeError::RangeOutOfBounds {
                start,
                end,
                size: self.max_size(),
            }
            .into());
        }
        let bin_size = self.bin_size();
        let mut values = Vec::with_capacity(end - start);
        let mut pos = start;
        while pos < end {
            let (bin, offset) = (pos / bin_size, pos % bin_size);
            let n = (bin_size - offset).min(end - pos);
            if self.is_stored(bin) {
                values.extend_from_slice(&self.block(bin)?[offset..offset + n]);
            } else {
                values.resize(values.len() + n, self.header.default);
            }
            pos += n;
        }
        Ok(values)
    }
}

/// Reads, decompresses and decodes one stored block
fn read_block<T: Element, S: Source>(
    source: &mut S,
    header: &ArrayHeader<T>,
    (offset, len): (u64, usize),
    index: usize,
) -> Result<Box<[T]>> {
    let raw = source.read_vec(offset, len)?;
    let expected = header.bin_size as usize;
    let bytes = header
        .codec
        .decompress(&raw, expected * T::SIZE)
        .map_err(|err| match err {
            Error::IoError(source) => FormatError::CorruptBlock { index, source }.into(),
            other => other,
        })?;
    if bytes.len() != expected * T::SIZE {
        return Err(FormatError::BlockSizeMismatch {
            index,
            expected,
            got: bytes.len().div_ceil(T::SIZE),
        }
        .into());
    }
    log::trace!("Loaded block {index}: {len} bytes at offset {offset}");
    Ok(decode(&bytes).into_boxed_slice())
}
