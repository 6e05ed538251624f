pub mod reader;
pub mod writer;

pub use reader::{ColumnChunkReader, PageHeaders, SharedSource};
pub use writer::ColumnChunkBuilder;
