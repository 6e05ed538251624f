//! Metadata read from and written to the file footer.
pub mod column_chunk;
pub mod file;
pub mod row_group;
pub mod statistics;
