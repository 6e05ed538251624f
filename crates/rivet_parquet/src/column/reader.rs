//! Page by page reading of a single column chunk.
use std::borrow::Cow;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use rivet_error::{Result, RivetError};
use rivet_io::FileSource;
use tracing::{debug, trace};

use crate::coder::{ColumnData, DataCoder};
use crate::compression::Codec;
use crate::dictionary::Dictionary;
use crate::encoding::Encoding;
use crate::metadata::column_chunk::ColumnChunkMetadata;
use crate::options::{ReaderOptions, DEFAULT_GZIP_LEVEL};
use crate::page::{PageHeader, PageKind};
use crate::schema::Column;

/// A file source shared between the readers of an open file.
///
/// Every read seeks, so readers for different columns can interleave their
/// reads, they just can't run them concurrently.
pub type SharedSource = Arc<Mutex<Box<dyn FileSource>>>;

/// Initial number of bytes read when looking for a page header.
const HEADER_READ_SIZE: usize = 16 * 1024;

/// Reads the pages of a column chunk one at a time.
///
/// Only the current page is held in memory. The dictionary page (if any) is
/// kept until the reader is dropped.
#[derive(Debug)]
pub struct ColumnChunkReader {
    source: SharedSource,
    path: String,
    codec: Codec,
    coder: DataCoder,
    dictionary: Option<Dictionary>,
    /// Absolute file offset of the next page header.
    offset: usize,
    /// Absolute end of the chunk.
    end: usize,
}

impl ColumnChunkReader {
    pub fn new(
        source: SharedSource,
        chunk: &ColumnChunkMetadata,
        leaf: &Column,
        options: ReaderOptions,
    ) -> Result<Self> {
        // Compression level doesn't matter for decompressing.
        let codec = chunk.compression.codec(DEFAULT_GZIP_LEVEL)?;
        let coder = DataCoder::new(leaf, options)?;
        let (start, len) = chunk.byte_range();
        let size = source.lock().size()?;
        if start.checked_add(len).map_or(true, |end| end > size) {
            return Err(RivetError::invalid_format(format!(
                "Column chunk '{}' at {start}..{} extends past the end of the file ({size} bytes)",
                leaf.path_string(),
                start.saturating_add(len),
            )));
        }

        debug!(
            column = %leaf.path_string(),
            start,
            len,
            compression = %chunk.compression,
            num_values = chunk.num_values,
            "opening column chunk"
        );

        Ok(ColumnChunkReader {
            source,
            path: leaf.path_string(),
            codec,
            coder,
            dictionary: None,
            offset: start,
            end: start + len,
        })
    }

    /// Read and decode the next data page.
    ///
    /// Dictionary pages are decoded and held on to, index pages are skipped.
    /// Returns `None` once the end of the chunk is reached.
    pub fn next_page(&mut self) -> Result<Option<ColumnData>> {
        loop {
            let (header, body_offset) = match self.next_header()? {
                Some(next) => next,
                None => return Ok(None),
            };
            trace!(column = %self.path, %header, "read page header");

            match &header.kind {
                PageKind::Index => continue,
                PageKind::Dictionary(dict) => {
                    if self.dictionary.is_some() {
                        return Err(RivetError::invalid_format(format!(
                            "Column chunk '{}' has more than one dictionary page",
                            self.path
                        )));
                    }
                    if !matches!(dict.encoding, Encoding::Plain | Encoding::PlainDictionary) {
                        return Err(RivetError::unsupported_encoding(format!(
                            "Dictionary page encoding {} not supported",
                            dict.encoding
                        )));
                    }
                    let body = self.read_body(body_offset, header.compressed_size)?;
                    let buf = self.codec.decompress(&body, header.uncompressed_size)?;
                    self.dictionary = Some(
                        self.coder
                            .decode_dictionary(&buf, dict.num_values as usize)?,
                    );
                }
                PageKind::Data(data) => {
                    let body = self.read_body(body_offset, header.compressed_size)?;
                    let buf = self.codec.decompress(&body, header.uncompressed_size)?;
                    let decoded = self.coder.decode_v1(&buf, data, self.dictionary.as_ref())?;
                    return Ok(Some(decoded));
                }
                PageKind::DataV2(data) => {
                    let rep_len = data.repetition_levels_byte_length as usize;
                    let def_len = data.definition_levels_byte_length as usize;
                    let levels_len = rep_len + def_len;
                    if levels_len > header.compressed_size
                        || levels_len > header.uncompressed_size
                    {
                        return Err(RivetError::invalid_format(format!(
                            "Level lengths exceed page size in column '{}'",
                            self.path
                        )));
                    }

                    let body = self.read_body(body_offset, header.compressed_size)?;
                    let (rep, rest) = body.split_at(rep_len);
                    let (def, values) = rest.split_at(def_len);
                    let values = if data.is_compressed {
                        Cow::Owned(
                            self.codec
                                .decompress(values, header.uncompressed_size - levels_len)?,
                        )
                    } else {
                        Cow::Borrowed(values)
                    };

                    let decoded = self.coder.decode_v2(
                        rep,
                        def,
                        &values,
                        data.encoding,
                        data.num_values as usize,
                        self.dictionary.as_ref(),
                    )?;
                    return Ok(Some(decoded));
                }
            }
        }
    }

    /// Iterate over the page headers without decoding any pages.
    pub fn view(self) -> PageHeaders {
        PageHeaders { reader: self }
    }

    /// Read the next page header, moving past its body.
    ///
    /// Returns the header along with the offset of the page body.
    fn next_header(&mut self) -> Result<Option<(PageHeader, usize)>> {
        if self.offset >= self.end {
            return Ok(None);
        }

        let remaining = self.end - self.offset;
        let mut window = HEADER_READ_SIZE.min(remaining);
        let header = loop {
            let buf = self.source.lock().read_range(self.offset, window)?;
            match PageHeader::try_decode(&buf) {
                Ok(header) => break header,
                // Header may be larger than what we read (big statistics).
                Err(_) if window < remaining => window = (window * 4).min(remaining),
                Err(e) => return Err(e),
            }
        };

        let body_offset = self.offset + header.header_size;
        let body_end = body_offset + header.compressed_size;
        if body_end > self.end {
            return Err(RivetError::invalid_format(format!(
                "Page in column '{}' extends past the end of the column chunk",
                self.path
            )));
        }
        self.offset = body_end;

        Ok(Some((header, body_offset)))
    }

    fn read_body(&self, offset: usize, len: usize) -> Result<Bytes> {
        self.source.lock().read_range(offset, len)
    }

    /// Stop reading, any further calls return nothing.
    fn abort(&mut self) {
        self.offset = self.end;
    }
}

impl Iterator for ColumnChunkReader {
    type Item = Result<ColumnData>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_page() {
            Ok(page) => page.map(Ok),
            Err(e) => {
                self.abort();
                Some(Err(e))
            }
        }
    }
}

/// Page headers of a column chunk, see [`ColumnChunkReader::view`].
#[derive(Debug)]
pub struct PageHeaders {
    reader: ColumnChunkReader,
}

impl Iterator for PageHeaders {
    type Item = Result<PageHeader>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.next_header() {
            Ok(next) => next.map(|(header, _)| Ok(header)),
            Err(e) => {
                self.reader.abort();
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rivet_error::ErrorKind;
    use rivet_io::MemorySource;

    use super::*;
    use crate::coder::{encode_levels_v1, encode_plain_values};
    use crate::compression::CompressionCodec;
    use crate::page::DataPageHeaderV1;
    use crate::schema::{FieldDef, Schema};
    use crate::types::{PhysicalType, Repetition};
    use crate::value::Value;

    fn schema() -> Schema {
        Schema::new(
            "s",
            vec![FieldDef::primitive("a", Repetition::Optional, PhysicalType::Int32)],
        )
        .unwrap()
    }

    fn chunk_meta(len: usize) -> ColumnChunkMetadata {
        ColumnChunkMetadata {
            path: vec!["a".to_string()],
            physical_type: PhysicalType::Int32,
            encodings: vec![Encoding::Plain, Encoding::Rle],
            compression: CompressionCodec::Uncompressed,
            num_values: 2,
            total_uncompressed_size: len as i64,
            total_compressed_size: len as i64,
            data_page_offset: 4,
            dictionary_page_offset: None,
            statistics: None,
            file_offset: 4,
        }
    }

    /// A file holding a single v1 page with one value and one null.
    fn single_page_file(definition_level_encoding: Encoding) -> (Vec<u8>, usize) {
        let mut body = Vec::new();
        encode_levels_v1(&[1, 0], 1, &mut body);
        body.extend(encode_plain_values(PhysicalType::Int32, &[Value::Int32(7)]).unwrap());

        let header = PageHeader {
            uncompressed_size: body.len(),
            compressed_size: body.len(),
            crc: None,
            header_size: 0,
            kind: PageKind::Data(DataPageHeaderV1 {
                num_values: 2,
                encoding: Encoding::Plain,
                definition_level_encoding,
                repetition_level_encoding: Encoding::Rle,
                statistics: None,
            }),
        };

        let mut buf = b"PAR1".to_vec();
        header.encode(&mut buf).unwrap();
        buf.extend(body);
        let len = buf.len() - 4;
        (buf, len)
    }

    fn reader_for(buf: Vec<u8>, meta: &ColumnChunkMetadata) -> Result<ColumnChunkReader> {
        let schema = schema();
        let boxed: Box<dyn FileSource> = Box::new(MemorySource::new(buf));
        let source: SharedSource = Arc::new(Mutex::new(boxed));
        ColumnChunkReader::new(source, meta, schema.leaf(0).unwrap(), ReaderOptions::default())
    }

    #[test]
    fn read_single_page() {
        let (buf, len) = single_page_file(Encoding::Rle);
        let mut reader = reader_for(buf, &chunk_meta(len)).unwrap();

        let page = reader.next().unwrap().unwrap();
        assert_eq!(vec![1, 0], page.def_levels);
        assert_eq!(vec![Value::Int32(7)], page.values);
        assert!(reader.next().is_none());
    }

    #[test]
    fn bit_packed_levels_unsupported() {
        let (buf, len) = single_page_file(Encoding::BitPacked);
        let mut reader = reader_for(buf, &chunk_meta(len)).unwrap();

        let err = reader.next().unwrap().unwrap_err();
        assert_eq!(ErrorKind::UnsupportedEncoding, err.kind());
        assert!(reader.next().is_none());
    }

    #[test]
    fn chunk_past_end_of_file() {
        let (buf, len) = single_page_file(Encoding::Rle);
        let err = reader_for(buf, &chunk_meta(len + 1)).unwrap_err();
        assert_eq!(ErrorKind::InvalidFormat, err.kind());
    }
}
