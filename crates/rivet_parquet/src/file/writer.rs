use rivet_error::Result;
use rivet_io::FileSink;
use tracing::debug;

use super::MAGIC;
use crate::metadata::file::FileMetadata;
use crate::metadata::row_group::RowGroupMetadata;
use crate::options::WriterOptions;
use crate::row_group::RowGroupBuilder;
use crate::schema::Schema;
use crate::value::Value;

/// Writes records to a parquet file.
///
/// Row groups are written to the sink as they fill up. The file is only
/// valid once [`Writer::finish`] has written the footer.
#[derive(Debug)]
pub struct Writer {
    sink: Box<dyn FileSink>,
    schema: Schema,
    options: WriterOptions,
    row_group: RowGroupBuilder,
    row_groups: Vec<RowGroupMetadata>,
    /// Number of bytes written so far.
    offset: usize,
    num_rows: i64,
    rows_since_check: usize,
}

impl Writer {
    pub fn new(
        mut sink: Box<dyn FileSink>,
        schema: Schema,
        options: WriterOptions,
    ) -> Result<Self> {
        let row_group = RowGroupBuilder::new(&schema, &options)?;
        sink.write_all(MAGIC)?;

        Ok(Writer {
            sink,
            schema,
            options,
            row_group,
            row_groups: Vec::new(),
            offset: MAGIC.len(),
            num_rows: 0,
            rows_since_check: 0,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Write a single record.
    ///
    /// The row group size is checked every `row_group_check_interval` rows,
    /// flushing the row group once it's big enough.
    pub fn write(&mut self, record: &Value) -> Result<()> {
        self.row_group.append(record)?;
        self.num_rows += 1;
        self.rows_since_check += 1;

        if self.rows_since_check >= self.options.row_group_check_interval {
            self.rows_since_check = 0;
            let buffered = self.row_group.buffered_size();
            if buffered.bytes() >= self.options.row_group_size as u64 {
                debug!(%buffered, "row group size reached");
                self.flush_row_group()?;
            }
        }

        Ok(())
    }

    pub fn write_all<'a>(&mut self, records: impl IntoIterator<Item = &'a Value>) -> Result<()> {
        for record in records {
            self.write(record)?;
        }
        Ok(())
    }

    /// Write out the current row group, if it has any rows.
    pub fn flush_row_group(&mut self) -> Result<()> {
        if self.row_group.num_rows() == 0 {
            return Ok(());
        }
        let (buf, meta) = self.row_group.flush(self.offset)?;
        self.sink.write_all(&buf)?;
        self.offset += buf.len();
        self.row_groups.push(meta);
        Ok(())
    }

    /// Flush remaining rows and write the footer.
    ///
    /// Returns the metadata written to the footer.
    pub fn finish(mut self) -> Result<FileMetadata> {
        self.flush_row_group()?;

        let metadata = FileMetadata {
            version: self.options.writer_version.as_num(),
            schema: self.schema,
            num_rows: self.num_rows,
            row_groups: self.row_groups,
            created_by: Some(self.options.created_by.clone()),
            key_value_metadata: self.options.key_value_metadata.clone(),
        };

        let encoded = metadata.encode()?;
        self.sink.write_all(&encoded)?;
        self.sink.write_all(&(encoded.len() as u32).to_le_bytes())?;
        self.sink.write_all(MAGIC)?;
        self.sink.finish()?;

        debug!(
            num_rows = metadata.num_rows,
            num_row_groups = metadata.row_groups.len(),
            bytes = self.offset + encoded.len() + 8,
            "finished parquet file"
        );

        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use rivet_error::ErrorKind;
    use rivet_io::{MemorySink, MemorySource};

    use super::*;
    use crate::file::ParquetFile;
    use crate::options::ReaderOptions;
    use crate::schema::FieldDef;
    use crate::types::{LogicalType, PhysicalType, Repetition};

    fn schema() -> Schema {
        Schema::new(
            "schema",
            vec![
                FieldDef::primitive("id", Repetition::Required, PhysicalType::Int64),
                FieldDef::primitive("name", Repetition::Optional, PhysicalType::ByteArray)
                    .with_logical_type(LogicalType::String),
                FieldDef::list(
                    "tags",
                    Repetition::Optional,
                    FieldDef::primitive("tag", Repetition::Required, PhysicalType::Int32),
                ),
            ],
        )
        .unwrap()
    }

    fn record(i: i64) -> Value {
        let name = if i % 4 == 0 {
            Value::Null
        } else {
            Value::Utf8(format!("name-{}", i % 3))
        };
        let tags = match i % 3 {
            0 => Value::Null,
            1 => Value::List(vec![]),
            _ => Value::List((0..i as i32 % 5).map(Value::Int32).collect()),
        };
        Value::new_struct([("id", Value::Int64(i)), ("name", name), ("tags", tags)])
    }

    fn write_file(records: &[Value], options: WriterOptions) -> (MemorySink, FileMetadata) {
        let sink = MemorySink::new();
        let mut writer = Writer::new(Box::new(sink.clone()), schema(), options).unwrap();
        writer.write_all(records).unwrap();
        let meta = writer.finish().unwrap();
        (sink, meta)
    }

    fn open(sink: &MemorySink) -> ParquetFile {
        ParquetFile::open(
            Box::new(MemorySource::new(sink.contents())),
            ReaderOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn write_then_read() {
        let records: Vec<_> = (0..50).map(record).collect();
        let (sink, written) = write_file(&records, WriterOptions::default());
        assert!(sink.is_finished());

        let contents = sink.contents();
        assert_eq!(MAGIC, &contents[..4]);
        assert_eq!(MAGIC, &contents[contents.len() - 4..]);

        let file = open(&sink);
        assert_eq!(&written, file.metadata());
        assert_eq!(50, file.metadata().num_rows);
        assert_eq!(1, file.metadata().row_groups.len());

        let got = file
            .reader()
            .records()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(records, got);
    }

    #[test]
    fn multiple_row_groups() {
        let records: Vec<_> = (0..100).map(record).collect();
        let options = WriterOptions::builder()
            .row_group_size(64)
            .row_group_check_interval(10)
            .build()
            .unwrap();
        let (sink, meta) = write_file(&records, options);
        assert!(meta.row_groups.len() > 1);
        let total: i64 = meta.row_groups.iter().map(|rg| rg.num_rows).sum();
        assert_eq!(100, total);

        let file = open(&sink);
        let reader = file.reader();
        let got = reader.records().collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(records, got);

        // Offset crossing a row group boundary.
        let got = reader
            .records_with(15, 30)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(&records[15..45], got.as_slice());

        let err = reader.records_with(0, 0).unwrap_err();
        assert_eq!(ErrorKind::OutOfRange, err.kind());
    }

    #[test]
    fn projection() {
        let records: Vec<_> = (0..10).map(record).collect();
        let (sink, _) = write_file(&records, WriterOptions::default());
        let file = open(&sink);

        let reader = file.reader().project(&["tags", "id"]).unwrap();
        let got = reader.records().collect::<Result<Vec<_>>>().unwrap();
        let expected: Vec<_> = records
            .iter()
            .map(|r| {
                Value::new_struct([
                    ("tags", r.field("tags").cloned().unwrap()),
                    ("id", r.field("id").cloned().unwrap()),
                ])
            })
            .collect();
        assert_eq!(expected, got);

        let err = file.reader().project(&["missing"]).unwrap_err();
        assert_eq!(ErrorKind::OutOfRange, err.kind());
    }

    #[test]
    fn bad_magic() {
        let mut buf = b"PAR1".to_vec();
        buf.extend_from_slice(&[0; 16]);
        buf.extend_from_slice(b"PAR2");
        let err = ParquetFile::open(Box::new(MemorySource::new(buf)), ReaderOptions::default())
            .unwrap_err();
        assert_eq!(ErrorKind::InvalidFormat, err.kind());

        let err = ParquetFile::open(
            Box::new(MemorySource::new(b"PA".to_vec())),
            ReaderOptions::default(),
        )
        .unwrap_err();
        assert_eq!(ErrorKind::InvalidFormat, err.kind());
    }

    #[test]
    fn unfinished_file_is_invalid() {
        let sink = MemorySink::new();
        let mut writer =
            Writer::new(Box::new(sink.clone()), schema(), WriterOptions::default()).unwrap();
        writer.write(&record(1)).unwrap();
        writer.flush_row_group().unwrap();
        drop(writer);

        let err = ParquetFile::open(
            Box::new(MemorySource::new(sink.contents())),
            ReaderOptions::default(),
        )
        .unwrap_err();
        assert_eq!(ErrorKind::InvalidFormat, err.kind());
    }

    #[test]
    fn page_headers() {
        let records: Vec<_> = (0..20).map(record).collect();
        let (sink, _) = write_file(&records, WriterOptions::default());
        let file = open(&sink);

        // The name column is low cardinality, so gets a dictionary.
        let headers = file.page_headers(0, 1).unwrap();
        assert_eq!(2, headers.len());
        assert_eq!(crate::page::PageType::DictionaryPage, headers[0].page_type());
        assert_eq!(20, headers[1].num_values());

        assert!(file.page_headers(1, 0).is_err());
        assert!(file.page_headers(0, 3).is_err());
    }
}
