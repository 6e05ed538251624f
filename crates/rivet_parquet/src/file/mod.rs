pub mod reader;
pub mod writer;

pub use reader::{ParquetFile, Reader, Records};
pub use writer::Writer;

/// Magic bytes at the start and end of every parquet file.
pub const MAGIC: &[u8; 4] = b"PAR1";

/// Footer length (4 bytes) plus the trailing magic.
pub const FOOTER_SIZE: usize = 8;
