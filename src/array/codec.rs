use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use zstd::{Decoder as ZstdDecoder, Encoder as ZstdEncoder};

use crate::error::{FormatError, Result};

/// Default zstd compression level
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Compression applied to each stored block
///
/// The codec is named in the file header by a four-byte ASCII tag and is
/// never guessed from block contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    /// Blocks are stored as raw big-endian values
    None,
    /// zlib (deflate) streams
    #[default]
    Zlib,
    /// zstd frames
    Zstd,
}
impl Codec {
    /// Four-byte tag written to the file header
    #[must_use]
    pub fn tag(self) -> [u8; 4] {
        match self {
            Self::None => *b"none",
            Self::Zlib => *b"zlib",
            Self::Zstd => *b"zstd",
        }
    }

    /// Parses a header tag; trailing spaces and NULs are ignored
    pub fn from_tag(tag: [u8; 4]) -> Result<Self> {
        let end = tag
            .iter()
            .rposition(|&b| b != b' ' && b != 0)
            .map_or(0, |i| i + 1);
        match &tag[..end] {
            b"none" => Ok(Self::None),
            b"zlib" => Ok(Self::Zlib),
            b"zstd" => Ok(Self::Zstd),
            other => Err(
                FormatError::UnsupportedCodec(String::from_utf8_lossy(other).into_owned()).into(),
            ),
        }
    }

    pub fn compress(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::None => Ok(data.to_vec()),
            Self::Zlib => {
                let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(data)?;
                Ok(encoder.finish()?)
            }
            Self::Zstd => {
                let mut encoder = ZstdEncoder::new(Vec::new(), DEFAULT_COMPRESSION_LEVEL)?;
                encoder.write_all(data)?;
                Ok(encoder.finish()?)
            }
        }
    }

    /// Decompresses a block, producing at most `limit + 1` bytes
    ///
    /// The extra byte lets callers tell an oversized block from one of
    /// exactly `limit` bytes without inflating a corrupt stream without bound.
    pub fn decompress(self, data: &[u8], limit: usize) -> Result<Vec<u8>> {
        let cap = limit as u64 + 1;
        let mut out = Vec::with_capacity(limit.min(data.len().saturating_mul(8)));
        match self {
            Self::None => out.extend_from_slice(data),
            Self::Zlib => {
                ZlibDecoder::new(data).take(cap).read_to_end(&mut out)?;
            }
            Self::Zstd => {
                ZstdDecoder::with_buffer(data)?.take(cap).read_to_end(&mut out)?;
            }
        }
        Ok(out)
    }
}
