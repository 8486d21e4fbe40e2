//! Positioned byte sources for the on-disk readers
//!
//! The file readers fetch headers, tables and payloads by absolute offset.
//! [`Source`] hides whether those bytes come from a seekable handle or a
//! memory map.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use auto_impl::auto_impl;
use memmap2::Mmap;

use crate::error::{truncated, FormatError, Result};

/// Random access to an immutable byte sequence
#[auto_impl(&mut, Box)]
pub trait Source {
    /// Fills `buf` with the bytes starting at `offset`
    ///
    /// Fails with `FormatError::Truncated` if fewer than `buf.len()` bytes
    /// remain past `offset`.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Total number of bytes, if the source can tell
    fn total_len(&mut self) -> Option<u64> {
        None
    }

    /// Reads `len` bytes starting at `offset` into a new buffer
    ///
    /// Lengths taken from a file are checked against [`Source::total_len`]
    /// before anything is allocated.
    fn read_vec(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        if let Some(total) = self.total_len() {
            let end = offset.checked_add(len as u64);
            if end.map_or(true, |end| end > total) {
                return Err(FormatError::Truncated { offset, len }.into());
            }
        }
        let mut buf = vec![0; len];
        self.read_at(offset, &mut buf)?;
        Ok(buf)
    }
}

/// Source backed by any seekable reader
#[derive(Debug)]
pub struct SeekSource<R> {
    inner: R,

    /// Stream length, measured on first use
    len: Option<u64>,
}
impl<R: Read + Seek> SeekSource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, len: None }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}
impl SeekSource<BufReader<File>> {
    /// Opens a buffered handle to the file at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}
impl<R: Read + Seek> Source for SeekSource<R> {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.inner.seek(SeekFrom::Start(offset))?;
        self.inner
            .read_exact(buf)
            .map_err(|e| truncated(e, offset, buf.len()))
    }

    fn total_len(&mut self) -> Option<u64> {
        if self.len.is_none() {
            // every read seeks to its own offset, so the position need not be restored
            self.len = self.inner.seek(SeekFrom::End(0)).ok();
        }
        self.len
    }
}

/// Source backed by a read-only memory map of a whole file
pub struct MmapSource {
    mmap: Mmap,
}
impl MmapSource {
    /// Memory-maps the file at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;

        // Safety: the file is opened read-only and is not expected to change
        // while the map is alive
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self { mmap })
    }

    /// Total number of mapped bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }
}
impl Source for MmapSource {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        match start
            .checked_add(buf.len())
            .and_then(|end| self.mmap.get(start..end))
        {
            Some(bytes) => {
                buf.copy_from_slice(bytes);
                Ok(())
            }
            None => Err(FormatError::Truncated {
                offset,
                len: buf.len(),
            }
            .into()),
        }
    }

    fn total_len(&mut self) -> Option<u64> {
        Some(self.mmap.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::{Cursor, Write};

    #[test]
    fn test_seek_source() -> Result<()> {
        let mut source = SeekSource::new(Cursor::new((0u8..32).collect::<Vec<_>>()));
        assert_eq!(source.read_vec(4, 3)?, vec![4, 5, 6]);
        assert_eq!(source.read_vec(0, 1)?, vec![0]);
        assert!(matches!(
            source.read_vec(30, 4),
            Err(Error::FormatError(FormatError::Truncated { offset: 30, len: 4 }))
        ));
        assert_eq!(source.total_len(), Some(32));
        Ok(())
    }

    #[test]
    fn test_oversized_read_is_refused() {
        let mut source = SeekSource::new(Cursor::new(vec![0u8; 16]));
        assert!(matches!(
            source.read_vec(8, usize::MAX / 2),
            Err(Error::FormatError(FormatError::Truncated { offset: 8, .. }))
        ));
        assert!(matches!(
            source.read_vec(u64::MAX, 2),
            Err(Error::FormatError(FormatError::Truncated { .. }))
        ));
        assert!(source.read_vec(16, 0).is_ok_and(|buf| buf.is_empty()));
    }

    #[test]
    fn test_mmap_source() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(&(0u8..32).collect::<Vec<_>>())?;
        file.flush()?;

        let mut source = MmapSource::open(file.path())?;
        assert_eq!(source.len(), 32);
        assert_eq!(source.total_len(), Some(32));
        assert!(source.read_vec(0, usize::MAX / 2).is_err());
        assert_eq!(source.read_vec(28, 4)?, vec![28, 29, 30, 31]);
        assert!(source.read_vec(29, 4).is_err());
        assert!(source.read_vec(u64::MAX, 1).is_err());
        Ok(())
    }
}
