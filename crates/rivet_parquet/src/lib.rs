//! Reading and writing parquet files as streams of records.
//!
//! Records are [`Value::Struct`]s shaped like the file's [`Schema`]. Reading
//! goes through [`ParquetFile`] and [`Reader`], writing through [`Writer`].
pub mod binary;
pub mod coder;
pub mod column;
pub mod compression;
pub mod dictionary;
pub mod encoding;
pub mod file;
pub mod format;
pub mod metadata;
pub mod options;
pub mod page;
pub mod record;
pub mod row_group;
pub mod schema;
pub mod types;
pub mod value;

pub(crate) mod thrift_ext;

pub use file::{ParquetFile, Reader, Records, Writer};
pub use metadata::file::FileMetadata;
pub use options::{ReaderOptions, WriterOptions, WriterVersion};
pub use schema::{FieldDef, Schema};
pub use value::Value;
