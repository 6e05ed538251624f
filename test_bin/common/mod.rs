use std::path::{Path, PathBuf};
use std::sync::Once;

use rivet_error::Result;
use rivet_io::{FileSystemProvider, LocalFileSystem};
use rivet_parquet::{FileMetadata, ParquetFile, ReaderOptions, Schema, Value, Writer, WriterOptions};
use tracing::Level;

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        logutil::configure_global_logger(Level::DEBUG, logutil::LogFormat::HumanReadable)
    });
}

/// Write records to `name` under `dir`.
pub fn write_file(
    dir: &Path,
    name: &str,
    schema: Schema,
    options: WriterOptions,
    records: &[Value],
) -> Result<(PathBuf, FileMetadata)> {
    init_logging();
    let path = dir.join(name);
    let sink = LocalFileSystem.sink(&path)?;
    let mut writer = Writer::new(sink, schema, options)?;
    writer.write_all(records)?;
    let metadata = writer.finish()?;
    Ok((path, metadata))
}

pub fn open(path: &Path, options: ReaderOptions) -> Result<ParquetFile> {
    init_logging();
    ParquetFile::open(LocalFileSystem.reader(path)?, options)
}

pub fn read_all(path: &Path) -> Result<Vec<Value>> {
    open(path, ReaderOptions::default())?.reader().records().collect()
}
