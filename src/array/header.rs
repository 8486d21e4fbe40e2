use std::io::Write;

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

use super::codec::Codec;
use super::element::{Element, KNOWN_TYPECODES};
use crate::error::{FormatError, Result};
use crate::source::Source;
use crate::utils::offset_u32;

/// Magic number opening every binned array file
#[allow(clippy::unreadable_literal)]
pub const ARRAY_MAGIC: u32 = 0x4AB04612;

/// Format version written by this library
pub const ARRAY_VERSION: u32 = 2;

/// Size of the fixed part of the header: magic, version, max size, bin size, bin count
pub const SIZE_FIXED_HEADER: usize = 20;

/// Size of one `(offset, length)` bin table entry
pub const SIZE_TABLE_ENTRY: usize = 8;

/// Header of a binned array file
///
/// ```text
/// MAGIC VERSION MAX_SIZE BIN_SIZE NBINS     (u32 each, big-endian)
/// TYPECODE                                  (1 byte, version >= 1)
/// CODEC                                     (4 ascii bytes, version >= 2)
/// DEFAULT                                   (one element)
/// ```
///
/// Version 0 files carry no type code (elements are `f32`) and version 0
/// and 1 files carry no codec (blocks are zlib streams).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrayHeader<T: Element> {
    pub version: u32,
    pub max_size: u32,
    pub bin_size: u32,

    /// Number of entries in the bin table
    pub nbins: u32,
    pub codec: Codec,
    pub default: T,
}
impl<T: Element> ArrayHeader<T> {
    /// Creates a header for the current format version
    #[must_use]
    pub fn new(max_size: u32, bin_size: u32, nbins: u32, codec: Codec, default: T) -> Self {
        Self {
            version: ARRAY_VERSION,
            max_size,
            bin_size,
            nbins,
            codec,
            default,
        }
    }

    /// Serialized length of the header in bytes
    #[must_use]
    pub fn size(&self) -> usize {
        let mut size = SIZE_FIXED_HEADER + T::SIZE;
        if self.version >= 1 {
            size += 1;
        }
        if self.version >= 2 {
            size += 4;
        }
        size
    }

    /// Byte offset of the bin table
    #[must_use]
    pub fn table_offset(&self) -> u64 {
        self.size() as u64
    }

    /// Byte offset just past a bin table of `nbins` entries
    #[must_use]
    pub fn data_offset(&self) -> u64 {
        self.table_offset() + (SIZE_TABLE_ENTRY as u64) * u64::from(self.nbins)
    }

    /// Writes the header in the current format version
    pub fn write_bytes<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<BigEndian>(ARRAY_MAGIC)?;
        writer.write_u32::<BigEndian>(ARRAY_VERSION)?;
        writer.write_u32::<BigEndian>(self.max_size)?;
        writer.write_u32::<BigEndian>(self.bin_size)?;
        writer.write_u32::<BigEndian>(self.nbins)?;
        writer.write_u8(T::TYPECODE)?;
        writer.write_all(&self.codec.tag())?;
        let mut default = [0u8; 8];
        self.default.write_be(&mut default);
        writer.write_all(&default[..T::SIZE])?;
        Ok(())
    }

    /// Reads and validates a header at the start of `source`
    ///
    /// # Errors
    ///
    /// * `FormatError::InvalidMagicNumber` - If the file is not a binned array
    /// * `FormatError::UnsupportedVersion` - If the version is newer than this library
    /// * `FormatError::UnknownElementType` - If the type code is not a known one
    /// * `FormatError::ElementTypeMismatch` - If the file holds another element type than `T`
    /// * `FormatError::UnsupportedCodec` - If the codec tag is not a known one
    pub fn from_source<S: Source>(source: &mut S) -> Result<Self> {
        let mut fixed = [0u8; SIZE_FIXED_HEADER];
        source.read_at(0, &mut fixed)?;
        let magic = BigEndian::read_u32(&fixed[0..4]);
        if magic != ARRAY_MAGIC {
            return Err(FormatError::InvalidMagicNumber(magic).into());
        }
        let version = BigEndian::read_u32(&fixed[4..8]);
        if version > ARRAY_VERSION {
            return Err(FormatError::UnsupportedVersion(version).into());
        }
        let max_size = BigEndian::read_u32(&fixed[8..12]);
        let bin_size = BigEndian::read_u32(&fixed[12..16]);
        let nbins = BigEndian::read_u32(&fixed[16..20]);
        if bin_size == 0 {
            return Err(FormatError::InconsistentHeader("bin size is zero").into());
        }

        let mut pos = SIZE_FIXED_HEADER as u64;
        let typecode = if version >= 1 {
            let mut code = [0u8; 1];
            source.read_at(pos, &mut code)?;
            pos += 1;
            code[0]
        } else {
            b'f'
        };
        if !KNOWN_TYPECODES.contains(&typecode) {
            return Err(FormatError::UnknownElementType(char::from(typecode)).into());
        }
        if typecode != T::TYPECODE {
            return Err(FormatError::ElementTypeMismatch {
                expected: char::from(T::TYPECODE),
                found: char::from(typecode),
            }
            .into());
        }

        let codec = if version >= 2 {
            let mut tag = [0u8; 4];
            source.read_at(pos, &mut tag)?;
            pos += 4;
            Codec::from_tag(tag)?
        } else {
            Codec::Zlib
        };

        let mut default = [0u8; 8];
        source.read_at(pos, &mut default[..T::SIZE])?;

        Ok(Self {
            version,
            max_size,
            bin_size,
            nbins,
            codec,
            default: T::read_be(&default),
        })
    }
}

/// Writes a bin table of `(offset, length)` pairs
pub(crate) fn write_table<W: Write>(writer: &mut W, table: &[(u64, usize)]) -> Result<()> {
    for &(offset, len) in table {
        writer.write_u32::<BigEndian>(offset_u32(offset)?)?;
        writer.write_u32::<BigEndian>(offset_u32(len as u64)?)?;
    }
    Ok(())
}

/// Reads the bin table that follows `header`
pub(crate) fn read_table<T: Element, S: Source>(
    source: &mut S,
    header: &ArrayHeader<T>,
) -> Result<Vec<(u64, usize)>> {
    let buffer = source.read_vec(
        header.table_offset(),
        header.nbins as usize * SIZE_TABLE_ENTRY,
    )?;
    Ok(buffer
        .chunks_exact(SIZE_TABLE_ENTRY)
        .map(|pair| {
            (
                u64::from(BigEndian::read_u32(&pair[0..4])),
                BigEndian::read_u32(&pair[4..8]) as usize,
            )
        })
        .collect())
}
