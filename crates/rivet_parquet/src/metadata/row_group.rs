//! Row group metadata.
use rivet_error::{Result, RivetError};

use super::column_chunk::ColumnChunkMetadata;
use crate::format;
use crate::schema::Schema;

#[derive(Debug, Clone, PartialEq)]
pub struct RowGroupMetadata {
    /// One chunk per leaf column, in schema order.
    pub columns: Vec<ColumnChunkMetadata>,
    pub num_rows: i64,
    /// Total uncompressed size of all column data.
    pub total_byte_size: i64,
    /// Offset from beginning of file.
    pub file_offset: Option<i64>,
    pub total_compressed_size: Option<i64>,
    /// Row group ordinal in the file.
    pub ordinal: Option<i16>,
}

impl RowGroupMetadata {
    pub fn try_from_thrift(rg: format::RowGroup, schema: &Schema) -> Result<Self> {
        if rg.columns.len() != schema.num_leaves() {
            return Err(RivetError::invalid_format(format!(
                "Row group has {} column chunks, schema has {} leaf columns",
                rg.columns.len(),
                schema.num_leaves()
            )));
        }
        if rg.num_rows < 0 {
            return Err(RivetError::invalid_format(format!(
                "Negative row count in row group: {}",
                rg.num_rows
            )));
        }

        let columns = rg
            .columns
            .into_iter()
            .zip(schema.leaves())
            .map(|(chunk, leaf)| ColumnChunkMetadata::try_from_thrift(chunk, leaf))
            .collect::<Result<Vec<_>>>()?;

        Ok(RowGroupMetadata {
            columns,
            num_rows: rg.num_rows,
            total_byte_size: rg.total_byte_size,
            file_offset: rg.file_offset,
            total_compressed_size: rg.total_compressed_size,
            ordinal: rg.ordinal,
        })
    }

    pub fn to_thrift(&self) -> format::RowGroup {
        format::RowGroup {
            columns: self.columns.iter().map(|c| c.to_thrift()).collect(),
            total_byte_size: self.total_byte_size,
            num_rows: self.num_rows,
            file_offset: self.file_offset,
            total_compressed_size: self.total_compressed_size,
            ordinal: self.ordinal,
        }
    }
}
