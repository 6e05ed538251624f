//! File metadata.
use rivet_error::Result;
use tracing::debug;

use super::row_group::RowGroupMetadata;
use crate::format;
use crate::schema::Schema;
use crate::thrift_ext::{read_compact, write_compact};

/// File metadata for a parquet file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileMetadata {
    pub version: i32,
    pub schema: Schema,
    pub num_rows: i64,
    pub row_groups: Vec<RowGroupMetadata>,
    pub created_by: Option<String>,
    pub key_value_metadata: Vec<(String, Option<String>)>,
}

impl FileMetadata {
    /// Try to decode the metadata from a byte buffer.
    ///
    /// This should come from the end of a parquet file, and be the exact size
    /// of the metadata.
    pub fn try_decode(buf: &[u8]) -> Result<Self> {
        let (file_meta, _): (format::FileMetaData, _) = read_compact(buf)?;
        let schema = Schema::try_from_thrift(&file_meta.schema)?;

        let row_groups = file_meta
            .row_groups
            .into_iter()
            .map(|rg| RowGroupMetadata::try_from_thrift(rg, &schema))
            .collect::<Result<Vec<_>>>()?;

        let key_value_metadata = file_meta
            .key_value_metadata
            .unwrap_or_default()
            .into_iter()
            .map(|kv| (kv.key, kv.value))
            .collect();

        debug!(
            num_rows = file_meta.num_rows,
            num_row_groups = row_groups.len(),
            created_by = ?file_meta.created_by,
            "decoded file metadata"
        );

        Ok(FileMetadata {
            version: file_meta.version,
            schema,
            num_rows: file_meta.num_rows,
            row_groups,
            created_by: file_meta.created_by,
            key_value_metadata,
        })
    }

    /// Encode the metadata for writing to the file footer.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let key_value_metadata = if self.key_value_metadata.is_empty() {
            None
        } else {
            Some(
                self.key_value_metadata
                    .iter()
                    .map(|(key, value)| format::KeyValue {
                        key: key.clone(),
                        value: value.clone(),
                    })
                    .collect(),
            )
        };

        let file_meta = format::FileMetaData {
            version: self.version,
            schema: self.schema.to_thrift(),
            num_rows: self.num_rows,
            row_groups: self.row_groups.iter().map(|rg| rg.to_thrift()).collect(),
            key_value_metadata,
            created_by: self.created_by.clone(),
        };

        let mut buf = Vec::new();
        write_compact(&file_meta, &mut buf)?;
        Ok(buf)
    }

    /// Look up a key in the key/value metadata.
    pub fn key_value(&self, key: &str) -> Option<&str> {
        self.key_value_metadata
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldDef;
    use crate::types::{PhysicalType, Repetition};

    #[test]
    fn encode_decode() {
        let schema = Schema::new(
            "schema",
            vec![FieldDef::primitive("a", Repetition::Required, PhysicalType::Boolean)],
        )
        .unwrap();
        let meta = FileMetadata {
            version: 2,
            schema,
            num_rows: 0,
            row_groups: Vec::new(),
            created_by: Some("me".to_string()),
            key_value_metadata: vec![("k".to_string(), Some("v".to_string()))],
        };

        let buf = meta.encode().unwrap();
        let got = FileMetadata::try_decode(&buf).unwrap();
        assert_eq!(meta, got);
        assert_eq!(Some("v"), got.key_value("k"));
        assert_eq!(None, got.key_value("nope"));
    }
}
