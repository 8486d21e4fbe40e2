use std::io::{Seek, SeekFrom, Write};

use super::codec::Codec;
use super::element::{encode, Element};
use super::header::{write_table, ArrayHeader};
use super::{DEFAULT_BIN_SIZE, MAX_SPACE};
use crate::error::{CapacityError, RangeError, Result};

/// Builder for a [`BinnedArrayWriter`]
///
/// Unset parameters fall back to 512 Ki slot blocks, a 512 Mi slot space,
/// the element's missing value (NaN for floats) and zlib compression.
///
/// ```rust
/// use std::io::Cursor;
/// use binspan::array::{BinnedArrayWriterBuilder, Codec};
///
/// let mut writer = BinnedArrayWriterBuilder::<f32>::default()
///     .bin_size(1024)
///     .max_size(1 << 20)
///     .codec(Codec::Zstd)
///     .build(Cursor::new(Vec::new()))
///     .unwrap();
/// writer.write(1.5).unwrap();
/// writer.skip().unwrap();
/// writer.write(2.5).unwrap();
/// writer.finish().unwrap();
/// ```
#[derive(Debug, Clone, Copy)]
pub struct BinnedArrayWriterBuilder<T: Element> {
    bin_size: Option<usize>,
    max_size: Option<usize>,
    default: Option<T>,
    codec: Option<Codec>,
}
impl<T: Element> Default for BinnedArrayWriterBuilder<T> {
    fn default() -> Self {
        Self {
            bin_size: None,
            max_size: None,
            default: None,
            codec: None,
        }
    }
}
impl<T: Element> BinnedArrayWriterBuilder<T> {
    /// Sets the number of slots per block
    #[must_use]
    pub fn bin_size(mut self, bin_size: usize) -> Self {
        self.bin_size = Some(bin_size);
        self
    }

    /// Sets the maximum number of slots the stream may cover
    #[must_use]
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = Some(max_size);
        self
    }

    /// Sets the value of slots that are skipped or never written
    #[must_use]
    pub fn default_value(mut self, default: T) -> Self {
        self.default = Some(default);
        self
    }

    #[must_use]
    pub fn codec(mut self, codec: Codec) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Builds the writer and writes a provisional header to `inner`
    pub fn build<W: Write + Seek>(self, inner: W) -> Result<BinnedArrayWriter<T, W>> {
        BinnedArrayWriter::new(
            inner,
            self.bin_size.unwrap_or(DEFAULT_BIN_SIZE),
            self.max_size.unwrap_or(MAX_SPACE as usize),
            self.default.unwrap_or(T::MISSING),
            self.codec.unwrap_or_default(),
        )
    }
}

/// Sequential writer of a binned array file
///
/// Values are appended one slot at a time. Each completed block is
/// compressed and written immediately unless every slot in it was skipped.
/// [`BinnedArrayWriter::finish`] rewrites the header and bin table once the
/// number of blocks is known; it runs on drop if not called explicitly.
pub struct BinnedArrayWriter<T: Element, W: Write + Seek> {
    /// Underlying stream; only taken by `into_inner`
    inner: Option<W>,

    header: ArrayHeader<T>,

    /// Slots of the block being filled
    buffer: Vec<T>,

    /// Next slot within `buffer`
    pos: usize,

    /// Whether any slot of `buffer` was written rather than skipped
    dirty: bool,

    /// Total slots consumed so far
    consumed: usize,

    /// `(offset, length)` of every completed block
    table: Vec<(u64, usize)>,

    /// Byte offset of the next payload
    offset: u64,

    finished: bool,
}
impl<T: Element, W: Write + Seek> BinnedArrayWriter<T, W> {
    fn new(
        mut inner: W,
        bin_size: usize,
        max_size: usize,
        default: T,
        codec: Codec,
    ) -> Result<Self> {
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
        let nbins = max_size.div_ceil(bin_size) as u32;
        let header = ArrayHeader::new(max_size as u32, bin_size as u32, nbins, codec, default);

        // Reserve room for a full bin table; payloads start right after it
        inner.seek(SeekFrom::Start(0))?;
        header.write_bytes(&mut inner)?;
        let offset = header.data_offset();
        inner.seek(SeekFrom::Start(offset))?;

        Ok(Self {
            inner: Some(inner),
            header,
            buffer: vec![default; bin_size],
            pos: 0,
            dirty: false,
            consumed: 0,
            table: Vec::with_capacity(nbins as usize),
            offset,
            finished: false,
        })
    }

    fn inner_mut(&mut self) -> Result<&mut W> {
        self.inner
            .as_mut()
            .ok_or_else(|| std::io::Error::other("writer already consumed").into())
    }

    fn check_capacity(&self) -> Result<()> {
        let size = self.header.max_size as usize;
        if self.finished || self.consumed >= size {
            return Err(RangeError::PositionOutOfRange {
                pos: self.consumed,
                size,
            }
            .into());
        }
        Ok(())
    }

    /// Appends one value
    pub fn write(&mut self, value: T) -> Result<()> {
        self.check_capacity()?;
        self.buffer[self.pos] = value;
        self.dirty = true;
        self.advance()
    }

    /// Appends one slot left at the default value
    pub fn skip(&mut self) -> Result<()> {
        self.check_capacity()?;
        self.advance()
    }

    /// Number of slots written or skipped so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.consumed
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.consumed == 0
    }

    fn advance(&mut self) -> Result<()> {
        self.pos += 1;
        self.consumed += 1;
        if self.pos == self.buffer.len() {
            self.flush_block()?;
        }
        Ok(())
    }

    /// Writes the current block (or an empty table entry) and starts a new one
    fn flush_block(&mut self) -> Result<()> {
        if self.dirty {
            let payload = self.header.codec.compress(&encode(&self.buffer))?;
            self.inner_mut()?.write_all(&payload)?;
            self.table.push((self.offset, payload.len()));
            self.offset += payload.len() as u64;
        } else {
            self.table.push((0, 0));
        }
        self.buffer.fill(self.header.default);
        self.pos = 0;
        self.dirty = false;
        Ok(())
    }

    /// Flushes the last partial block and rewrites the header and bin table
    ///
    /// Calling `finish` more than once is a no-op.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        if self.pos > 0 {
            self.flush_block()?;
        }
        self.header.nbins = self.table.len() as u32;

        let header = self.header;
        let table = std::mem::take(&mut self.table);
        let end = self.offset;
        let inner = self.inner_mut()?;
        inner.seek(SeekFrom::Start(0))?;
        header.write_bytes(inner)?;
        write_table(inner, &table)?;
        inner.seek(SeekFrom::Start(end))?;
        inner.flush()?;
        self.finished = true;
        log::debug!(
            "Finished binned array stream: {} slots in {} bins, {end} bytes",
            self.consumed,
            header.nbins
        );
        Ok(())
    }

    /// Finishes the stream and returns the underlying writer
    pub fn into_inner(mut self) -> Result<W> {
        self.finish()?;
        self.inner
            .take()
            .ok_or_else(|| std::io::Error::other("writer already consumed").into())
    }
}

impl<T: Element, W: Write + Seek> Drop for BinnedArrayWriter<T, W> {
    fn drop(&mut self) {
        if self.inner.is_some() {
            if let Err(err) = self.finish() {
                log::warn!("Binned array writer dropped without finishing: {err}");
            }
        }
    }
}
