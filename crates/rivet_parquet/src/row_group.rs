//! Row group assembly on the write path.
use rivet_error::Result;
use tracing::debug;

use crate::binary::DataSize;
use crate::column::ColumnChunkBuilder;
use crate::metadata::row_group::RowGroupMetadata;
use crate::options::WriterOptions;
use crate::record::Shredder;
use crate::schema::Schema;
use crate::value::Value;

/// Buffers rows for a single row group.
#[derive(Debug)]
pub struct RowGroupBuilder {
    shredder: Shredder,
    columns: Vec<ColumnChunkBuilder>,
    num_rows: usize,
    /// Ordinal of the next row group flushed.
    ordinal: i16,
}

impl RowGroupBuilder {
    pub fn new(schema: &Schema, options: &WriterOptions) -> Result<Self> {
        let columns = schema
            .leaves()
            .map(|leaf| ColumnChunkBuilder::new(leaf, options))
            .collect::<Result<Vec<_>>>()?;

        Ok(RowGroupBuilder {
            shredder: Shredder::new(schema, options.validate),
            columns,
            num_rows: 0,
            ordinal: 0,
        })
    }

    /// Shred and buffer a record.
    ///
    /// Nothing is buffered if the record doesn't fit the schema.
    pub fn append(&mut self, record: &Value) -> Result<()> {
        let shredded = self.shredder.shred(record)?;

        // Convert everything up front so a bad value can't leave a partial
        // row behind.
        let mut prepared = Vec::with_capacity(shredded.len());
        for (column, slots) in self.columns.iter().zip(shredded) {
            let slots = slots
                .into_iter()
                .map(|(rep, def, value)| {
                    let value = value.map(|v| column.prepare(&v)).transpose()?;
                    Ok((rep, def, value))
                })
                .collect::<Result<Vec<_>>>()?;
            prepared.push(slots);
        }

        for (column, slots) in self.columns.iter_mut().zip(prepared) {
            for (rep, def, value) in slots {
                column.push(rep, def, value)?;
            }
        }
        self.num_rows += 1;

        Ok(())
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Estimated size of all buffered column data.
    pub fn buffered_size(&self) -> DataSize {
        self.columns
            .iter()
            .fold(DataSize::ZERO, |acc, c| acc + c.buffered_size())
    }

    /// Encode the buffered rows into a row group starting at `file_offset`.
    ///
    /// Returns the encoded bytes and the row group's metadata. The builder
    /// is reset to start accumulating the next row group.
    pub fn flush(&mut self, file_offset: usize) -> Result<(Vec<u8>, RowGroupMetadata)> {
        let mut buf = Vec::new();
        let mut chunks = Vec::with_capacity(self.columns.len());
        for column in &mut self.columns {
            let offset = file_offset + buf.len();
            chunks.push(column.flush(offset, &mut buf)?);
        }

        let meta = RowGroupMetadata {
            total_byte_size: chunks.iter().map(|c| c.total_uncompressed_size).sum(),
            total_compressed_size: Some(buf.len() as i64),
            columns: chunks,
            num_rows: self.num_rows as i64,
            file_offset: Some(file_offset as i64),
            ordinal: Some(self.ordinal),
        };

        debug!(
            ordinal = self.ordinal,
            num_rows = self.num_rows,
            bytes = buf.len(),
            "flushed row group"
        );

        self.num_rows = 0;
        self.ordinal += 1;

        Ok((buf, meta))
    }
}

#[cfg(test)]
mod tests {
    use rivet_error::ErrorKind;

    use super::*;
    use crate::schema::FieldDef;
    use crate::types::{PhysicalType, Repetition};

    fn schema() -> Schema {
        Schema::new(
            "s",
            vec![
                FieldDef::primitive("a", Repetition::Required, PhysicalType::Int32),
                FieldDef::primitive("b", Repetition::Optional, PhysicalType::Int64),
            ],
        )
        .unwrap()
    }

    #[test]
    fn flush_and_reset() {
        let mut builder = RowGroupBuilder::new(&schema(), &WriterOptions::default()).unwrap();
        for i in 0..10 {
            let b = if i % 2 == 0 { Value::Int64(i as i64) } else { Value::Null };
            builder
                .append(&Value::new_struct([("a", Value::Int32(i)), ("b", b)]))
                .unwrap();
        }
        assert_eq!(10, builder.num_rows());
        assert!(builder.buffered_size() > DataSize::ZERO);

        let (buf, meta) = builder.flush(4).unwrap();
        assert_eq!(10, meta.num_rows);
        assert_eq!(2, meta.columns.len());
        assert_eq!(Some(4), meta.file_offset);
        assert_eq!(Some(0), meta.ordinal);
        assert_eq!(4, meta.columns[0].file_offset);
        assert_eq!(
            4 + meta.columns[0].total_compressed_size,
            meta.columns[1].file_offset
        );
        assert_eq!(Some(buf.len() as i64), meta.total_compressed_size);

        assert_eq!(0, builder.num_rows());
        assert_eq!(DataSize::ZERO, builder.buffered_size());
        let (_, meta) = builder.flush(100).unwrap();
        assert_eq!(Some(1), meta.ordinal);
    }

    #[test]
    fn bad_record_leaves_nothing_behind() {
        let mut builder = RowGroupBuilder::new(&schema(), &WriterOptions::default()).unwrap();
        // First leaf converts fine, second doesn't.
        let record = Value::new_struct([("a", Value::Int32(1)), ("b", Value::from("x"))]);
        let err = builder.append(&record).unwrap_err();
        assert_eq!(ErrorKind::SchemaViolation, err.kind());
        assert_eq!(0, builder.num_rows());
        assert_eq!(DataSize::ZERO, builder.buffered_size());
    }
}
