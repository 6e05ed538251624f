use std::sync::Arc;

use parking_lot::Mutex;
use rivet_error::{Result, RivetError};
use rivet_io::FileSource;
use tracing::debug;

use super::{FOOTER_SIZE, MAGIC};
use crate::column::{ColumnChunkReader, SharedSource};
use crate::metadata::file::FileMetadata;
use crate::options::ReaderOptions;
use crate::page::PageHeader;
use crate::record::{Field, LeafCursor, RecordAssembler};
use crate::schema::Schema;
use crate::value::Value;

/// An open parquet file.
///
/// Cloning is cheap, clones share the underlying source and metadata.
#[derive(Debug, Clone)]
pub struct ParquetFile {
    source: SharedSource,
    metadata: Arc<FileMetadata>,
    options: ReaderOptions,
}

impl ParquetFile {
    /// Open a file, reading and parsing its footer.
    pub fn open(mut source: Box<dyn FileSource>, options: ReaderOptions) -> Result<Self> {
        let size = source.size()?;
        if size < MAGIC.len() {
            return Err(RivetError::invalid_format(format!(
                "File of {size} bytes too small to be a parquet file"
            )));
        }

        let trailing = source.read_range(size - MAGIC.len(), MAGIC.len())?;
        if trailing.as_ref() != MAGIC {
            return Err(RivetError::invalid_format(format!(
                "Invalid magic number at end of file: {:?}",
                trailing.as_ref()
            )));
        }
        if size < MAGIC.len() + FOOTER_SIZE {
            return Err(RivetError::invalid_format(format!(
                "File of {size} bytes too small to be a parquet file"
            )));
        }

        let leading = source.read_range(0, MAGIC.len())?;
        if leading.as_ref() != MAGIC {
            return Err(RivetError::invalid_format("Invalid magic number at start of file"));
        }

        let len_buf = source.read_range(size - FOOTER_SIZE, 4)?;
        let metadata_len =
            u32::from_le_bytes([len_buf[0], len_buf[1], len_buf[2], len_buf[3]]) as usize;
        if metadata_len + FOOTER_SIZE + MAGIC.len() > size {
            return Err(RivetError::invalid_format(format!(
                "Metadata length {metadata_len} exceeds file size {size}"
            )));
        }

        let buf = source.read_range(size - FOOTER_SIZE - metadata_len, metadata_len)?;
        let metadata = FileMetadata::try_decode(&buf)?;

        debug!(
            size,
            metadata_len,
            num_rows = metadata.num_rows,
            num_row_groups = metadata.row_groups.len(),
            "opened parquet file"
        );

        Ok(ParquetFile {
            source: Arc::new(Mutex::new(source)),
            metadata: Arc::new(metadata),
            options,
        })
    }

    pub fn metadata(&self) -> &FileMetadata {
        &self.metadata
    }

    pub fn schema(&self) -> &Schema {
        &self.metadata.schema
    }

    pub fn options(&self) -> ReaderOptions {
        self.options
    }

    /// Get a reader for the column chunk of a leaf column in a row group.
    pub fn column_chunk_reader(
        &self,
        row_group: usize,
        column: usize,
    ) -> Result<ColumnChunkReader> {
        let rg = self.metadata.row_groups.get(row_group).ok_or_else(|| {
            RivetError::out_of_range(format!(
                "Row group {row_group} out of range, file has {}",
                self.metadata.row_groups.len()
            ))
        })?;
        let (chunk, leaf) = match (rg.columns.get(column), self.schema().leaf(column)) {
            (Some(chunk), Some(leaf)) => (chunk, leaf),
            _ => {
                return Err(RivetError::out_of_range(format!(
                    "Column {column} out of range, file has {}",
                    self.schema().num_leaves()
                )))
            }
        };
        ColumnChunkReader::new(self.source.clone(), chunk, leaf, self.options)
    }

    /// Headers of all pages in a column chunk, without decoding the pages.
    pub fn page_headers(&self, row_group: usize, column: usize) -> Result<Vec<PageHeader>> {
        self.column_chunk_reader(row_group, column)?
            .view()
            .collect()
    }

    /// Reader over all columns.
    pub fn reader(&self) -> Reader {
        Reader {
            file: self.clone(),
            root: Arc::new(Field::from_schema(self.schema())),
        }
    }
}

/// Reads records from a file.
#[derive(Debug, Clone)]
pub struct Reader {
    file: ParquetFile,
    /// Fields to assemble.
    root: Arc<Field>,
}

impl Reader {
    /// Restrict records to the named top level columns.
    pub fn project(&self, columns: &[&str]) -> Result<Reader> {
        let root = Field::from_projection(self.file.schema(), columns)?;
        Ok(Reader {
            file: self.file.clone(),
            root: Arc::new(root),
        })
    }

    /// Iterate over all records.
    ///
    /// Every call starts a fresh pass over the file.
    pub fn records(&self) -> Records {
        Records {
            file: self.file.clone(),
            root: self.root.clone(),
            row_group: 0,
            current: None,
            skip: 0,
            done: false,
        }
    }

    /// Iterate over at most `limit` records after skipping `offset`.
    pub fn records_with(&self, offset: usize, limit: usize) -> Result<std::iter::Take<Records>> {
        if limit == 0 {
            return Err(RivetError::out_of_range("Limit must be greater than zero"));
        }
        let mut records = self.records();
        records.skip = offset;
        Ok(records.take(limit))
    }
}

/// Iterator over records, one row group at a time.
///
/// Stops after the first error.
#[derive(Debug)]
pub struct Records {
    file: ParquetFile,
    root: Arc<Field>,
    /// Next row group to open.
    row_group: usize,
    /// Assembler for the current row group and its remaining rows.
    current: Option<(RecordAssembler, usize)>,
    /// Records left to skip.
    skip: usize,
    done: bool,
}

impl Records {
    fn open_row_group(&self, idx: usize) -> Result<RecordAssembler> {
        let schema = self.file.schema();
        let mut cursors: Vec<Option<LeafCursor>> = (0..schema.num_leaves()).map(|_| None).collect();
        for &leaf in &self.root.leaves {
            let reader = self.file.column_chunk_reader(idx, leaf)?;
            let max_def = schema
                .leaf(leaf)
                .map(|c| c.max_def_level)
                .unwrap_or_default();
            cursors[leaf] = Some(LeafCursor::new(Box::new(reader), max_def));
        }
        Ok(RecordAssembler::new(self.root.as_ref().clone(), cursors))
    }
}

impl Iterator for Records {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            if let Some((assembler, remaining)) = &mut self.current {
                if *remaining > 0 {
                    *remaining -= 1;
                    match assembler.next_record() {
                        Ok(_) if self.skip > 0 => {
                            self.skip -= 1;
                            continue;
                        }
                        Ok(record) => return Some(Ok(record)),
                        Err(e) => {
                            self.done = true;
                            return Some(Err(e));
                        }
                    }
                }
            }
            self.current = None;

            let idx = self.row_group;
            let num_rows = match self.file.metadata.row_groups.get(idx) {
                Some(rg) => rg.num_rows as usize,
                None => {
                    self.done = true;
                    return None;
                }
            };
            self.row_group += 1;

            // Whole row groups can be skipped without decoding anything.
            if self.skip >= num_rows {
                self.skip -= num_rows;
                continue;
            }

            debug!(row_group = idx, num_rows, "reading row group");
            match self.open_row_group(idx) {
                Ok(assembler) => self.current = Some((assembler, num_rows)),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
