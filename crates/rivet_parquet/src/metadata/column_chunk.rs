//! Column chunk metadata

use rivet_error::{not_implemented, OptionExt, Result, RivetError};
use tracing::warn;

use super::statistics::Statistics;
use crate::compression::CompressionCodec;
use crate::encoding::Encoding;
use crate::format;
use crate::schema::Column;
use crate::types::PhysicalType;

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnChunkMetadata {
    /// Path of the leaf column in the schema.
    pub path: Vec<String>,
    pub physical_type: PhysicalType,
    pub encodings: Vec<Encoding>,
    pub compression: CompressionCodec,
    /// Number of values, including nulls.
    pub num_values: i64,
    pub total_uncompressed_size: i64,
    pub total_compressed_size: i64,
    pub data_page_offset: i64,
    pub dictionary_page_offset: Option<i64>,
    pub statistics: Option<Statistics>,
    pub file_offset: i64,
}

impl ColumnChunkMetadata {
    /// Convert from the footer representation, checking it against the leaf
    /// column it belongs to.
    pub fn try_from_thrift(chunk: format::ColumnChunk, leaf: &Column) -> Result<Self> {
        if let Some(path) = &chunk.file_path {
            not_implemented!("Column chunks in external files ({path})");
        }
        let meta = chunk
            .meta_data
            .required("Column chunk is missing column metadata")?;

        let flat = leaf.flat().required("Column chunk must map to a leaf column")?;
        let physical_type =
            PhysicalType::try_from_thrift(meta.type_, flat.type_length().map(|l| l as i32))?;
        if physical_type != flat.physical_type {
            return Err(RivetError::invalid_format(format!(
                "Column chunk for '{}' has physical type {physical_type}, schema says {}",
                leaf.path_string(),
                flat.physical_type
            )));
        }

        if meta.path_in_schema != leaf.path {
            warn!(
                chunk_path = %meta.path_in_schema.join("."),
                schema_path = %leaf.path_string(),
                "column chunk path does not match schema"
            );
        }

        let mut encodings = Vec::with_capacity(meta.encodings.len());
        for code in meta.encodings {
            match Encoding::try_from_thrift(code) {
                Ok(enc) => encodings.push(enc),
                Err(_) => warn!(code, "ignoring unknown encoding in column metadata"),
            }
        }

        if meta.data_page_offset < 0 || meta.total_compressed_size < 0 {
            return Err(RivetError::invalid_format(format!(
                "Invalid byte range for column chunk '{}'",
                leaf.path_string()
            )));
        }

        Ok(ColumnChunkMetadata {
            path: meta.path_in_schema,
            physical_type,
            encodings,
            compression: CompressionCodec::try_from_thrift(meta.codec)?,
            num_values: meta.num_values,
            total_uncompressed_size: meta.total_uncompressed_size,
            total_compressed_size: meta.total_compressed_size,
            data_page_offset: meta.data_page_offset,
            dictionary_page_offset: meta.dictionary_page_offset,
            statistics: meta.statistics.map(Statistics::from_thrift),
            file_offset: chunk.file_offset,
        })
    }

    pub fn to_thrift(&self) -> format::ColumnChunk {
        format::ColumnChunk {
            file_path: None,
            file_offset: self.file_offset,
            meta_data: Some(format::ColumnMetaData {
                type_: self.physical_type.thrift_code(),
                encodings: self.encodings.iter().map(|e| e.thrift_code()).collect(),
                path_in_schema: self.path.clone(),
                codec: self.compression.thrift_code(),
                num_values: self.num_values,
                total_uncompressed_size: self.total_uncompressed_size,
                total_compressed_size: self.total_compressed_size,
                key_value_metadata: None,
                data_page_offset: self.data_page_offset,
                index_page_offset: None,
                dictionary_page_offset: self.dictionary_page_offset,
                statistics: self.statistics.as_ref().map(|s| s.to_thrift()),
            }),
        }
    }

    /// Byte offset and length of the chunk in the file.
    ///
    /// Starts at the dictionary page if there is one. Some writers emit a
    /// dictionary offset of 0 when there is no dictionary, so that's ignored.
    pub fn byte_range(&self) -> (usize, usize) {
        let start = match self.dictionary_page_offset {
            Some(offset) if offset > 0 && offset < self.data_page_offset => offset,
            _ => self.data_page_offset,
        };
        (start as usize, self.total_compressed_size as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, Schema};
    use crate::types::Repetition;

    fn leaf_schema() -> Schema {
        Schema::new(
            "s",
            vec![FieldDef::primitive("a", Repetition::Optional, PhysicalType::Int64)],
        )
        .unwrap()
    }

    fn chunk(type_: i32, dict: Option<i64>) -> format::ColumnChunk {
        format::ColumnChunk {
            file_path: None,
            file_offset: 0,
            meta_data: Some(format::ColumnMetaData {
                type_,
                encodings: vec![0, 3, 1],
                path_in_schema: vec!["a".to_string()],
                codec: 1,
                num_values: 10,
                total_uncompressed_size: 120,
                total_compressed_size: 100,
                data_page_offset: 50,
                dictionary_page_offset: dict,
                ..Default::default()
            }),
        }
    }

    #[test]
    fn byte_range_with_dictionary() {
        let schema = leaf_schema();
        let leaf = schema.leaf(0).unwrap();

        let meta = ColumnChunkMetadata::try_from_thrift(chunk(2, Some(4)), leaf).unwrap();
        assert_eq!((4, 100), meta.byte_range());
        assert_eq!(CompressionCodec::Snappy, meta.compression);
        // Unknown encoding code 1 dropped.
        assert_eq!(vec![Encoding::Plain, Encoding::Rle], meta.encodings);

        let meta = ColumnChunkMetadata::try_from_thrift(chunk(2, Some(0)), leaf).unwrap();
        assert_eq!((50, 100), meta.byte_range());
    }

    #[test]
    fn physical_type_mismatch() {
        let schema = leaf_schema();
        let err = ColumnChunkMetadata::try_from_thrift(chunk(1, None), schema.leaf(0).unwrap())
            .unwrap_err();
        assert_eq!(rivet_error::ErrorKind::InvalidFormat, err.kind());
    }
}
