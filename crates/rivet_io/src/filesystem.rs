use std::fmt::Debug;
use std::fs::{File, OpenOptions};
use std::path::Path;

use rivet_error::{Result, ResultExt};
use tracing::debug;

use crate::{FileSink, FileSource};

/// Provides access to a filesystem (real or virtual).
pub trait FileSystemProvider: Debug + Sync + Send + 'static {
    /// Get a read handle to some underlying file.
    fn reader(&self, path: &Path) -> Result<Box<dyn FileSource>>;

    /// Get a write handle to some underlying file, truncating it if it
    /// already exists.
    fn sink(&self, path: &Path) -> Result<Box<dyn FileSink>>;
}

/// Filesystem provider for the local disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl FileSystemProvider for LocalFileSystem {
    fn reader(&self, path: &Path) -> Result<Box<dyn FileSource>> {
        debug!(path = %path.display(), "opening local file for reading");
        let file = File::open(path).context_fn(|| format!("Failed to open {}", path.display()))?;
        Ok(Box::new(file))
    }

    fn sink(&self, path: &Path) -> Result<Box<dyn FileSink>> {
        debug!(path = %path.display(), "opening local file for writing");
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .context_fn(|| format!("Failed to create {}", path.display()))?;
        Ok(Box::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");

        let fs = LocalFileSystem;
        let mut sink = fs.sink(&path).unwrap();
        sink.write_all(b"0123456789").unwrap();
        sink.finish().unwrap();

        let mut reader = fs.reader(&path).unwrap();
        assert_eq!(10, reader.size().unwrap());
        assert_eq!(&b"345"[..], &reader.read_range(3, 3).unwrap()[..]);
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = LocalFileSystem.reader(&dir.path().join("nope")).unwrap_err();
        assert_eq!(rivet_error::ErrorKind::Io, err.kind());
    }
}
