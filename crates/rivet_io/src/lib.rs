pub mod filesystem;
pub mod memory;

use std::fmt::Debug;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use bytes::Bytes;
use rivet_error::{RivetError, Result};

pub use filesystem::{FileSystemProvider, LocalFileSystem};
pub use memory::{MemorySink, MemorySource};

/// A seekable source of bytes.
///
/// Reads take `&mut self` since most implementations move an underlying
/// cursor. Concurrent readers of the same source need external
/// synchronization.
pub trait FileSource: Debug + Send {
    /// Read an exact range of bytes starting at `start`.
    ///
    /// An error should be returned if the full range cannot be read.
    fn read_range(&mut self, start: usize, len: usize) -> Result<Bytes>;

    /// Total size of the source in bytes.
    fn size(&mut self) -> Result<usize>;
}

/// An append-only destination for bytes.
pub trait FileSink: Debug + Send {
    fn write_all(&mut self, buf: &[u8]) -> Result<()>;

    /// Flush anything buffered. The sink should not be written to afterwards.
    fn finish(&mut self) -> Result<()>;
}

impl<S: FileSource + ?Sized> FileSource for Box<S> {
    fn read_range(&mut self, start: usize, len: usize) -> Result<Bytes> {
        self.as_mut().read_range(start, len)
    }

    fn size(&mut self) -> Result<usize> {
        self.as_mut().size()
    }
}

impl<S: FileSink + ?Sized> FileSink for Box<S> {
    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.as_mut().write_all(buf)
    }

    fn finish(&mut self) -> Result<()> {
        self.as_mut().finish()
    }
}

impl FileSource for File {
    fn read_range(&mut self, start: usize, len: usize) -> Result<Bytes> {
        let mut buf = vec![0; len];
        read_at_sync(self, start, &mut buf)?;
        Ok(Bytes::from(buf))
    }

    fn size(&mut self) -> Result<usize> {
        let len = self.metadata()?.len();
        usize::try_from(len).map_err(|_| RivetError::new(format!("File size {len} too large")))
    }
}

impl FileSink for File {
    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        Write::write_all(self, buf)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.flush()?;
        self.sync_all()?;
        Ok(())
    }
}

/// Helper for synchronously reading into a buffer.
fn read_at_sync<R>(mut reader: R, start: usize, buf: &mut [u8]) -> Result<()>
where
    R: Read + Seek,
{
    reader.seek(SeekFrom::Start(start as u64))?;
    reader.read_exact(buf)?;
    Ok(())
}
