use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use rivet_error::{ErrorKind, Result, RivetError};

use crate::{FileSink, FileSource};

/// A file source backed by an in-memory buffer.
#[derive(Debug, Clone)]
pub struct MemorySource {
    buf: Bytes,
}

impl MemorySource {
    pub fn new(buf: impl Into<Bytes>) -> Self {
        MemorySource { buf: buf.into() }
    }
}

impl FileSource for MemorySource {
    fn read_range(&mut self, start: usize, len: usize) -> Result<Bytes> {
        let end = start.checked_add(len).unwrap_or(usize::MAX);
        if end > self.buf.len() {
            return Err(RivetError::with_kind(
                ErrorKind::Io,
                format!(
                    "Read of range {start}..{end} out of bounds for buffer of size {}",
                    self.buf.len()
                ),
            ));
        }
        Ok(self.buf.slice(start..end))
    }

    fn size(&mut self) -> Result<usize> {
        Ok(self.buf.len())
    }
}

/// A file sink writing into a shared in-memory buffer.
///
/// Clones share the same buffer, so one clone can be handed to a writer while
/// another is kept around to inspect what was written.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    buf: Arc<Mutex<Vec<u8>>>,
    finished: Arc<Mutex<bool>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy out everything written so far.
    pub fn contents(&self) -> Bytes {
        Bytes::from(self.buf.lock().clone())
    }

    pub fn is_finished(&self) -> bool {
        *self.finished.lock()
    }
}

impl FileSink for MemorySink {
    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        if self.is_finished() {
            return Err(RivetError::new("Cannot write to a finished sink"));
        }
        self.buf.lock().extend_from_slice(buf);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        *self.finished.lock() = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_source_ranges() {
        let mut source = MemorySource::new(b"abcdef".to_vec());
        assert_eq!(&b"cd"[..], &source.read_range(2, 2).unwrap()[..]);
        assert_eq!(6, source.size().unwrap());

        let err = source.read_range(4, 4).unwrap_err();
        assert_eq!(ErrorKind::Io, err.kind());
    }

    #[test]
    fn memory_sink_shared() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        writer.write_all(b"abc").unwrap();
        writer.write_all(b"def").unwrap();
        writer.finish().unwrap();

        assert_eq!(&b"abcdef"[..], &sink.contents()[..]);
        assert!(sink.is_finished());
        assert!(writer.write_all(b"g").is_err());
    }
}
