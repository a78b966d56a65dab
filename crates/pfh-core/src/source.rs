//! Random-access byte sources.
//!
//! Extraction never relies on a shared file cursor: every read names its own
//! absolute offset through [`ReadAt`], so one open archive can serve reads from
//! several threads at once.

use crate::error::{Error, Result};
use bytes::Bytes;
use std::fs::File;
use std::path::Path;

/// Trait for positioned reads from a read-only data source
pub trait ReadAt: Send + Sync {
    /// Reads up to `buf.len()` bytes starting at `offset`.
    ///
    /// Returns the number of bytes read, which is smaller than `buf.len()` only
    /// when the source ends first.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Total length of the source in bytes
    fn size(&self) -> u64;
}

/// Read-only archive file with positioned reads
#[derive(Debug)]
pub struct FileSource {
    file: File,
    size: u64,
    #[cfg(not(any(unix, windows)))]
    cursor: std::sync::Mutex<()>,
}

impl FileSource {
    /// Opens `path` read-only.
    ///
    /// Fails with [`Error::NotFound`] if the path cannot be opened or is not a
    /// regular file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::not_found(path, e))?;
        let metadata = file.metadata().map_err(|e| Error::not_found(path, e))?;
        if !metadata.is_file() {
            return Err(Error::not_found(
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
            ));
        }

        Ok(Self {
            file,
            size: metadata.len(),
            #[cfg(not(any(unix, windows)))]
            cursor: std::sync::Mutex::new(()),
        })
    }
}

impl ReadAt for FileSource {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read_once(offset + filled as u64, &mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    fn size(&self) -> u64 {
        self.size
    }
}

impl FileSource {
    #[cfg(unix)]
    fn read_once(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        use std::os::unix::fs::FileExt;
        retry_interrupted(|| self.file.read_at(buf, offset))
    }

    // seek_read moves the handle's cursor, but nothing here reads from the cursor
    #[cfg(windows)]
    fn read_once(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        use std::os::windows::fs::FileExt;
        retry_interrupted(|| self.file.seek_read(buf, offset))
    }

    // No positioned read available: the seek and the read must not interleave
    #[cfg(not(any(unix, windows)))]
    fn read_once(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        use std::io::{Read, Seek, SeekFrom};
        let _guard = self
            .cursor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut file = &self.file;
        file.seek(SeekFrom::Start(offset))?;
        retry_interrupted(|| file.read(buf))
    }
}

fn retry_interrupted(mut read: impl FnMut() -> std::io::Result<usize>) -> Result<usize> {
    loop {
        match read() {
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            other => return Ok(other?),
        }
    }
}

fn read_from_slice(data: &[u8], offset: u64, buf: &mut [u8]) -> usize {
    let Ok(start) = usize::try_from(offset) else {
        return 0;
    };
    if start >= data.len() {
        return 0;
    }
    let n = buf.len().min(data.len() - start);
    buf[..n].copy_from_slice(&data[start..start + n]);
    n
}

impl ReadAt for [u8] {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        Ok(read_from_slice(self, offset, buf))
    }

    fn size(&self) -> u64 {
        self.len() as u64
    }
}

impl ReadAt for Vec<u8> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        Ok(read_from_slice(self, offset, buf))
    }

    fn size(&self) -> u64 {
        self.len() as u64
    }
}

impl ReadAt for Bytes {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        Ok(read_from_slice(self, offset, buf))
    }

    fn size(&self) -> u64 {
        self.len() as u64
    }
}

impl<T: ReadAt + ?Sized> ReadAt for &T {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        (**self).read_at(offset, buf)
    }

    fn size(&self) -> u64 {
        (**self).size()
    }
}

/// Reads exactly `len` bytes at `offset`, returning fewer only if the source ends.
///
/// The buffer never grows past what the source can still supply, so a bogus
/// length from a damaged header costs nothing.
pub(crate) fn read_range<S>(source: &S, offset: u64, len: usize) -> Result<Vec<u8>>
where
    S: ReadAt + ?Sized,
{
    let available = source.size().saturating_sub(offset);
    let len = len.min(usize::try_from(available).unwrap_or(usize::MAX));
    let mut buf = vec![0u8; len];
    let n = source.read_at(offset, &mut buf)?;
    buf.truncate(n);
    Ok(buf)
}
