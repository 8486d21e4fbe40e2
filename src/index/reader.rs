use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use byteorder::{BigEndian, ByteOrder};

use super::binning::{bin_count, candidate_bins, offsets_for_max_size};
use super::{Entry, INDEX_MAGIC, SIZE_ENTRY, SIZE_FILE_HEADER};
use crate::error::{FormatError, Result};
use crate::source::{MmapSource, SeekSource, Source};

/// Highest index file version understood by the reader
const MAX_READ_VERSION: u32 = 1;

/// Index of one source as stored on disk
///
/// The bounds and bin table are read when the source is first queried.
/// Bins are read individually, with one read per bin, the first time a
/// query needs them.
#[derive(Debug, Clone)]
pub struct FileIndex {
    min: u32,
    max: u32,
    offsets: Vec<u32>,

    /// `(byte offset, entry count)` per bin
    table: Vec<(u64, usize)>,

    /// Entries of the bins loaded so far
    bins: Vec<Option<Vec<Entry>>>,
}
impl FileIndex {
    fn load<S: Source>(source: &mut S, offset: u64) -> Result<Self> {
        let mut bounds = [0u8; 8];
        source.read_at(offset, &mut bounds)?;
        let min = BigEndian::read_u32(&bounds[0..4]);
        let max = BigEndian::read_u32(&bounds[4..8]);
        if min > max {
            return Err(FormatError::InconsistentHeader("index min exceeds max").into());
        }
        let offsets = offsets_for_max_size(max);
        let n_bins = bin_count(&offsets, max);

        let buffer = source.read_vec(offset + 8, n_bins * 8)?;
        let table = buffer
            .chunks_exact(8)
            .map(|pair| {
                (
                    u64::from(BigEndian::read_u32(&pair[0..4])),
                    BigEndian::read_u32(&pair[4..8]) as usize,
                )
            })
            .collect();

        log::trace!("Loaded bin table at offset {offset}: bounds [{min}, {max}], {n_bins} bins");
        Ok(Self {
            min,
            max,
            offsets,
            table,
            bins: vec![None; n_bins],
        })
    }

    #[must_use]
    pub fn min(&self) -> u32 {
        self.min
    }

    #[must_use]
    pub fn max(&self) -> u32 {
        self.max
    }

    #[must_use]
    pub fn bin_count(&self) -> usize {
        self.table.len()
    }

    /// Number of bins whose entries are resident
    #[must_use]
    pub fn loaded_bins(&self) -> usize {
        self.bins.iter().filter(|b| b.is_some()).count()
    }

    fn load_bin<S: Source>(&mut self, source: &mut S, bin: usize) -> Result<&[Entry]> {
        if self.bins[bin].is_none() {
            let (offset, count) = self.table[bin];
            let entries = if count == 0 {
                Vec::new()
            } else {
                let buffer = source.read_vec(offset, count * SIZE_ENTRY)?;
                log::trace!("Loaded bin {bin}: {count} entries at offset {offset}");
                buffer.chunks_exact(SIZE_ENTRY).map(Entry::from_bytes).collect()
            };
            self.bins[bin] = Some(entries);
        }
        Ok(self.bins[bin].as_deref().unwrap_or_default())
    }

    /// Entries overlapping `[start, end)`, sorted by `(start, end, payload)`
    pub fn find<S: Source>(&mut self, source: &mut S, start: u32, end: u32) -> Result<Vec<Entry>> {
        let bins: Vec<usize> =
            candidate_bins(&self.offsets, self.min, self.max, start, end).collect();
        let mut hits = Vec::new();
        for bin in bins {
            hits.extend(
                self.load_bin(source, bin)?
                    .iter()
                    .filter(|e| e.overlaps(start, end)),
            );
        }
        hits.sort_unstable();
        Ok(hits)
    }

    /// Every entry, bin by bin
    pub fn entries<S: Source>(&mut self, source: &mut S) -> Result<Vec<Entry>> {
        let mut entries = Vec::new();
        for bin in 0..self.table.len() {
            entries.extend_from_slice(self.load_bin(source, bin)?);
        }
        Ok(entries)
    }
}

#[derive(Debug, Clone)]
enum Slot {
    /// Table offset of a source not queried yet
    Unloaded(u64),
    Loaded(FileIndex),
}

/// Reader over an interval index file
///
/// Opening reads only the file header and the source table.
pub struct IndexFile<S: Source> {
    source: S,
    version: u32,
    slots: BTreeMap<String, Slot>,
}
impl IndexFile<SeekSource<BufReader<File>>> {
    /// Opens an index file through a buffered file handle
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_source(SeekSource::open(path)?)
    }
}
impl IndexFile<MmapSource> {
    /// Opens an index file through a memory map
    pub fn open_mmap<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_source(MmapSource::open(path)?)
    }
}
impl<S: Source> IndexFile<S> {
    /// Parses the file header and source table from `source`
    pub fn from_source(mut source: S) -> Result<Self> {
        let mut header = [0u8; SIZE_FILE_HEADER];
        source.read_at(0, &mut header)?;
        let magic = BigEndian::read_u32(&header[0..4]);
        if magic != INDEX_MAGIC {
            return Err(FormatError::InvalidMagicNumber(magic).into());
        }
        let version = BigEndian::read_u32(&header[4..8]);
        if version > MAX_READ_VERSION {
            return Err(FormatError::UnsupportedVersion(version).into());
        }
        let n_sources = BigEndian::read_u32(&header[8..12]);

        let mut pos = SIZE_FILE_HEADER as u64;
        let mut word = [0u8; 4];
        let mut slots = BTreeMap::new();
        for _ in 0..n_sources {
            source.read_at(pos, &mut word)?;
            let key_len = BigEndian::read_u32(&word) as usize;
            pos += 4;

            let key = source.read_vec(pos, key_len)?;
            let key = std::str::from_utf8(&key)?.to_owned();
            pos += key_len as u64;

            source.read_at(pos, &mut word)?;
            let offset = u64::from(BigEndian::read_u32(&word));
            pos += 4;

            if version >= 1 {
                source.read_at(pos, &mut word)?;
                let value_size = BigEndian::read_u32(&word);
                if value_size != 4 {
                    return Err(FormatError::UnsupportedValueSize(value_size).into());
                }
                pos += 4;
            }
            slots.insert(key, Slot::Unloaded(offset));
        }

        log::debug!("Opened interval index (version {version}) with {n_sources} sources");
        Ok(Self {
            source,
            version,
            slots,
        })
    }

    /// Format version found in the file header
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Source names in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Loads the index of `name` if needed and lends it out with the source
    fn slot(&mut self, name: &str) -> Result<Option<(&mut FileIndex, &mut S)>> {
        let Self { source, slots, .. } = self;
        let Some(slot) = slots.get_mut(name) else {
            return Ok(None);
        };
        if let Slot::Unloaded(offset) = *slot {
            *slot = Slot::Loaded(FileIndex::load(source, offset)?);
        }
        match slot {
            Slot::Loaded(index) => Ok(Some((index, source))),
            Slot::Unloaded(_) => Ok(None),
        }
    }

    /// Returns the index of `name`, loading its bin table on first use
    pub fn get(&mut self, name: &str) -> Result<Option<&mut FileIndex>> {
        Ok(self.slot(name)?.map(|(index, _)| index))
    }

    /// Entries of `name` overlapping `[start, end)`; unknown names have none
    pub fn find(&mut self, name: &str, start: u32, end: u32) -> Result<Vec<Entry>> {
        match self.slot(name)? {
            Some((index, source)) => index.find(source, start, end),
            None => Ok(Vec::new()),
        }
    }

    /// Every entry of `name`, bin by bin; unknown names have none
    pub fn entries(&mut self, name: &str) -> Result<Vec<Entry>> {
        match self.slot(name)? {
            Some((index, source)) => index.entries(source),
            None => Ok(Vec::new()),
        }
    }
}

/// Several index files queried as one
///
/// Results are concatenated in file order; each file's results keep their
/// own sort order.
pub struct MultiIndex<S: Source> {
    files: Vec<IndexFile<S>>,
}
impl MultiIndex<SeekSource<BufReader<File>>> {
    pub fn open<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let files = paths
            .iter()
            .map(IndexFile::open)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(files))
    }
}
impl<S: Source> MultiIndex<S> {
    #[must_use]
    pub fn new(files: Vec<IndexFile<S>>) -> Self {
        Self { files }
    }

    #[must_use]
    pub fn n_files(&self) -> usize {
        self.files.len()
    }

    /// Source names present in any file, sorted and deduplicated
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.files.iter().flat_map(IndexFile::keys).collect();
        keys.sort_unstable();
        keys.dedup();
        keys
    }

    pub fn find(&mut self, name: &str, start: u32, end: u32) -> Result<Vec<Entry>> {
        let mut hits = Vec::new();
        for file in &mut self.files {
            hits.extend(file.find(name, start, end)?);
        }
        Ok(hits)
    }
}
