//! Buffering and encoding of a single column chunk.
use std::cmp::Ordering;
use std::ops::Range;

use hashbrown::HashMap;
use rivet_error::{Result, RivetError};
use tracing::{debug, trace};

use crate::binary::{decimal_from_be_bytes, DataSize};
use crate::coder::{
    encode_dictionary_indices,
    encode_levels,
    encode_levels_v1,
    encode_plain_values,
    DataCoder,
};
use crate::compression::Codec;
use crate::encoding::plain::plain_bytes;
use crate::encoding::{bit_width, Encoding};
use crate::metadata::column_chunk::ColumnChunkMetadata;
use crate::metadata::statistics::Statistics;
use crate::options::{ReaderOptions, WriterOptions, WriterVersion};
use crate::page::{DataPageHeaderV1, DataPageHeaderV2, DictionaryPageHeader, PageHeader, PageKind};
use crate::schema::Column;
use crate::types::{LogicalType, PhysicalType};
use crate::value::Value;

/// Accumulates the levels and values of one leaf column for the current row
/// group, and encodes them into pages on flush.
///
/// All values for the row group are buffered so that the dictionary decision
/// can be made with the full chunk in view.
#[derive(Debug)]
pub struct ColumnChunkBuilder {
    path: Vec<String>,
    coder: DataCoder,
    codec: Codec,
    page_size: usize,
    writer_version: WriterVersion,
    dictionary_enabled: bool,
    dictionary_page_size_limit: usize,
    dictionary_ratio_threshold: f64,
    rep_levels: Vec<i16>,
    def_levels: Vec<i16>,
    /// Physical values for slots at the max definition level.
    values: Vec<Value>,
    stats: StatisticsBuilder,
    buffered: DataSize,
}

impl ColumnChunkBuilder {
    pub fn new(leaf: &Column, options: &WriterOptions) -> Result<Self> {
        let coder = DataCoder::new(leaf, ReaderOptions::default())?;
        let decimal_order = matches!(leaf.logical_type, Some(LogicalType::Decimal { .. }));

        Ok(ColumnChunkBuilder {
            path: leaf.path.clone(),
            codec: options.codec()?,
            page_size: options.page_size,
            writer_version: options.writer_version,
            dictionary_enabled: options.dictionary_enabled,
            dictionary_page_size_limit: options.dictionary_page_size_limit,
            dictionary_ratio_threshold: options.dictionary_ratio_threshold,
            rep_levels: Vec::new(),
            def_levels: Vec::new(),
            values: Vec::new(),
            stats: StatisticsBuilder::new(coder.physical_type(), decimal_order),
            buffered: DataSize::ZERO,
            coder,
        })
    }

    /// Convert a record value into the physical value for this column.
    pub fn prepare(&self, value: &Value) -> Result<Value> {
        self.coder.to_physical(value)
    }

    /// Append a slot. `value` must be a physical value (see [`Self::prepare`])
    /// and present exactly when `def` is the max definition level.
    pub fn push(&mut self, rep: i16, def: i16, value: Option<Value>) -> Result<()> {
        let max_def = self.coder.max_def_level();
        match (def == max_def, value) {
            (true, Some(value)) => {
                self.buffered = self.buffered + self.value_size(&value);
                self.stats.update(&value);
                self.values.push(value);
            }
            (false, None) => self.stats.null_count += 1,
            (_, value) => {
                return Err(RivetError::new(format!(
                    "Definition level {def} (max {max_def}) does not match value presence \
                     ({}) for '{}'",
                    value.is_some(),
                    self.path.join(".")
                )))
            }
        }

        self.buffered = self.buffered + self.level_size();
        self.rep_levels.push(rep);
        self.def_levels.push(def);
        Ok(())
    }

    /// Number of buffered slots.
    pub fn num_slots(&self) -> usize {
        self.def_levels.len()
    }

    /// Estimated size of the buffered data once plain encoded.
    pub fn buffered_size(&self) -> DataSize {
        self.buffered
    }

    /// Encode buffered data as pages, appending them to `out`.
    ///
    /// `offset` is the file offset the first byte appended will land at. The
    /// builder is reset afterwards.
    pub fn flush(&mut self, offset: usize, out: &mut Vec<u8>) -> Result<ColumnChunkMetadata> {
        let start = out.len();
        let physical = self.coder.physical_type();
        let dictionary = self.build_dictionary()?;

        let mut total_uncompressed = 0;
        let mut dictionary_page_offset = None;
        let mut encodings = vec![Encoding::Plain, Encoding::Rle];

        if let Some((dict_values, _)) = &dictionary {
            encodings.push(Encoding::RleDictionary);
            dictionary_page_offset = Some((offset + out.len() - start) as i64);

            let body = encode_plain_values(physical, dict_values)?;
            let compressed = self.codec.compress(&body)?;
            let header = PageHeader {
                uncompressed_size: body.len(),
                compressed_size: compressed.len(),
                crc: None,
                header_size: 0,
                kind: PageKind::Dictionary(DictionaryPageHeader {
                    num_values: dict_values.len() as i32,
                    encoding: Encoding::Plain,
                    is_sorted: false,
                }),
            };
            total_uncompressed += write_page(out, &header, &compressed)? + body.len();
        }

        let data_page_offset = (offset + out.len() - start) as i64;
        let pages = self.page_ranges();
        for page in &pages {
            let values = match &dictionary {
                Some((dict_values, indices)) => {
                    encode_dictionary_indices(&indices[page.values.clone()], dict_values.len())
                }
                None => encode_plain_values(physical, &self.values[page.values.clone()])?,
            };
            let encoding = if dictionary.is_some() {
                Encoding::RleDictionary
            } else {
                Encoding::Plain
            };
            total_uncompressed += self.write_data_page(out, page, encoding, values)?;
        }

        let statistics = self.stats.finish(dictionary.as_ref().map(|(d, _)| d.len()))?;
        let meta = ColumnChunkMetadata {
            path: self.path.clone(),
            physical_type: physical,
            encodings,
            compression: self.codec.compression(),
            num_values: self.def_levels.len() as i64,
            total_uncompressed_size: total_uncompressed as i64,
            total_compressed_size: (out.len() - start) as i64,
            data_page_offset,
            dictionary_page_offset,
            statistics: Some(statistics),
            file_offset: offset as i64,
        };

        debug!(
            column = %self.path.join("."),
            slots = self.def_levels.len(),
            pages = pages.len(),
            dictionary = dictionary.is_some(),
            bytes = meta.total_compressed_size,
            "flushed column chunk"
        );

        self.reset();
        Ok(meta)
    }

    fn reset(&mut self) {
        self.rep_levels.clear();
        self.def_levels.clear();
        self.values.clear();
        self.stats = StatisticsBuilder::new(self.stats.physical, self.stats.decimal_order);
        self.buffered = DataSize::ZERO;
    }

    /// Write a single data page, returning its uncompressed size including
    /// the header.
    fn write_data_page(
        &self,
        out: &mut Vec<u8>,
        page: &PageRange,
        encoding: Encoding,
        values: Vec<u8>,
    ) -> Result<usize> {
        let max_rep = self.coder.max_rep_level();
        let max_def = self.coder.max_def_level();
        let rep = &self.rep_levels[page.slots.clone()];
        let def = &self.def_levels[page.slots.clone()];
        let num_values = page.slots.len() as i32;

        let (header, body, uncompressed) = match self.writer_version {
            WriterVersion::V1 => {
                let mut body = Vec::new();
                if max_rep > 0 {
                    encode_levels_v1(rep, max_rep, &mut body);
                }
                if max_def > 0 {
                    encode_levels_v1(def, max_def, &mut body);
                }
                body.extend_from_slice(&values);

                let compressed = self.codec.compress(&body)?;
                let header = PageHeader {
                    uncompressed_size: body.len(),
                    compressed_size: compressed.len(),
                    crc: None,
                    header_size: 0,
                    kind: PageKind::Data(DataPageHeaderV1 {
                        num_values,
                        encoding,
                        definition_level_encoding: Encoding::Rle,
                        repetition_level_encoding: Encoding::Rle,
                        statistics: None,
                    }),
                };
                (header, compressed, body.len())
            }
            WriterVersion::V2 => {
                let rep_bytes = if max_rep > 0 {
                    encode_levels(rep, max_rep)
                } else {
                    Vec::new()
                };
                let def_bytes = if max_def > 0 {
                    encode_levels(def, max_def)
                } else {
                    Vec::new()
                };
                let is_compressed = self.codec != Codec::Uncompressed;
                let compressed_values = if is_compressed {
                    self.codec.compress(&values)?
                } else {
                    values.clone()
                };

                let levels_len = rep_bytes.len() + def_bytes.len();
                let mut body = Vec::with_capacity(levels_len + compressed_values.len());
                body.extend_from_slice(&rep_bytes);
                body.extend_from_slice(&def_bytes);
                body.extend_from_slice(&compressed_values);

                let uncompressed = levels_len + values.len();
                let header = PageHeader {
                    uncompressed_size: uncompressed,
                    compressed_size: body.len(),
                    crc: None,
                    header_size: 0,
                    kind: PageKind::DataV2(DataPageHeaderV2 {
                        num_values,
                        num_nulls: def.iter().filter(|&&d| d < max_def).count() as i32,
                        num_rows: rep.iter().filter(|&&r| r == 0).count() as i32,
                        encoding,
                        definition_levels_byte_length: def_bytes.len() as i32,
                        repetition_levels_byte_length: rep_bytes.len() as i32,
                        is_compressed,
                        statistics: None,
                    }),
                };
                (header, body, uncompressed)
            }
        };

        trace!(column = %self.path.join("."), %header, "writing page");
        Ok(write_page(out, &header, &body)? + uncompressed)
    }

    /// Split buffered slots into pages of roughly `page_size` bytes.
    ///
    /// Pages only start at record boundaries.
    fn page_ranges(&self) -> Vec<PageRange> {
        let max_def = self.coder.max_def_level();
        let page_bits = (self.page_size as u64) * 8;
        let mut pages = Vec::new();

        let mut page = PageRange {
            slots: 0..0,
            values: 0..0,
        };
        let mut page_size = DataSize::ZERO;
        for (idx, (&rep, &def)) in self.rep_levels.iter().zip(&self.def_levels).enumerate() {
            if rep == 0 && !page.slots.is_empty() && page_size.bits() >= page_bits {
                let next = PageRange {
                    slots: idx..idx,
                    values: page.values.end..page.values.end,
                };
                pages.push(std::mem::replace(&mut page, next));
                page_size = DataSize::ZERO;
            }

            page.slots.end = idx + 1;
            page_size = page_size + self.level_size();
            if def == max_def {
                page_size = page_size + self.value_size(&self.values[page.values.end]);
                page.values.end += 1;
            }
        }
        if !page.slots.is_empty() || pages.is_empty() {
            pages.push(page);
        }

        pages
    }

    /// Build a dictionary if the column is a good fit for one.
    ///
    /// Returns the dictionary values and the index of each buffered value.
    fn build_dictionary(&self) -> Result<Option<(Vec<Value>, Vec<u32>)>> {
        let physical = self.coder.physical_type();
        if !self.dictionary_enabled || physical == PhysicalType::Boolean || self.values.is_empty() {
            return Ok(None);
        }

        let mut lookup: HashMap<Vec<u8>, u32> = HashMap::new();
        let mut dict_values = Vec::new();
        let mut indices = Vec::with_capacity(self.values.len());
        let mut dict_size = 0;

        for value in &self.values {
            let key = plain_bytes(physical, value)?;
            let idx = match lookup.get(&key) {
                Some(&idx) => idx,
                None => {
                    dict_size += key.len();
                    if dict_size > self.dictionary_page_size_limit {
                        debug!(
                            column = %self.path.join("."),
                            dict_size,
                            "dictionary too large, using plain encoding"
                        );
                        return Ok(None);
                    }
                    let idx = dict_values.len() as u32;
                    lookup.insert(key, idx);
                    dict_values.push(value.clone());
                    idx
                }
            };
            indices.push(idx);
        }

        let ratio = dict_values.len() as f64 / self.values.len() as f64;
        if ratio > self.dictionary_ratio_threshold {
            trace!(column = %self.path.join("."), ratio, "too many distinct values for dictionary");
            return Ok(None);
        }

        Ok(Some((dict_values, indices)))
    }

    fn level_size(&self) -> DataSize {
        let rep = bit_width(self.coder.max_rep_level() as u64);
        let def = bit_width(self.coder.max_def_level() as u64);
        DataSize::from_bits((rep + def) as u64)
    }

    /// Plain encoded size of a physical value.
    fn value_size(&self, value: &Value) -> DataSize {
        match (self.coder.physical_type(), value) {
            (PhysicalType::Boolean, _) => DataSize::from_bits(1),
            (PhysicalType::Int32 | PhysicalType::Float, _) => DataSize::from_bytes(4),
            (PhysicalType::Int64 | PhysicalType::Double, _) => DataSize::from_bytes(8),
            (PhysicalType::Int96, _) => DataSize::from_bytes(12),
            (PhysicalType::ByteArray, Value::Binary(b)) => DataSize::from_bytes(4 + b.len() as u64),
            (PhysicalType::FixedLenByteArray(len), _) => DataSize::from_bytes(len as u64),
            (PhysicalType::ByteArray, _) => DataSize::from_bytes(4),
        }
    }
}

/// Slots and values making up a single page.
#[derive(Debug)]
struct PageRange {
    slots: Range<usize>,
    values: Range<usize>,
}

/// Write a page header and body, returning the header size.
fn write_page(out: &mut Vec<u8>, header: &PageHeader, body: &[u8]) -> Result<usize> {
    let before = out.len();
    header.encode(out)?;
    let header_size = out.len() - before;
    out.extend_from_slice(body);
    Ok(header_size)
}

/// Tracks min, max, and null count of physical values.
#[derive(Debug)]
struct StatisticsBuilder {
    physical: PhysicalType,
    /// Compare byte arrays as big endian signed decimals.
    decimal_order: bool,
    min: Option<Value>,
    max: Option<Value>,
    null_count: i64,
}

impl StatisticsBuilder {
    fn new(physical: PhysicalType, decimal_order: bool) -> Self {
        StatisticsBuilder {
            physical,
            decimal_order,
            min: None,
            max: None,
            null_count: 0,
        }
    }

    fn update(&mut self, value: &Value) {
        // Skips unordered values like NaN and int96.
        if self.compare(value, value).is_none() {
            return;
        }
        if self
            .min
            .as_ref()
            .map_or(true, |min| self.compare(value, min) == Some(Ordering::Less))
        {
            self.min = Some(value.clone());
        }
        if self
            .max
            .as_ref()
            .map_or(true, |max| self.compare(value, max) == Some(Ordering::Greater))
        {
            self.max = Some(value.clone());
        }
    }

    fn compare(&self, a: &Value, b: &Value) -> Option<Ordering> {
        match (a, b) {
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::Int32(a), Value::Int32(b)) => Some(a.cmp(b)),
            (Value::Int64(a), Value::Int64(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
            (Value::Binary(a), Value::Binary(b)) if self.decimal_order => {
                let a = decimal_from_be_bytes(a).ok()?;
                let b = decimal_from_be_bytes(b).ok()?;
                Some(a.cmp(&b))
            }
            (Value::Binary(a), Value::Binary(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    fn finish(&self, distinct_count: Option<usize>) -> Result<Statistics> {
        let encode = |v: &Value| match (self.physical, v) {
            // Byte arrays are stored without the length prefix.
            (PhysicalType::ByteArray, Value::Binary(b)) => Ok(b.clone()),
            (physical, v) => plain_bytes(physical, v),
        };

        Ok(Statistics {
            min: self.min.as_ref().map(encode).transpose()?,
            max: self.max.as_ref().map(encode).transpose()?,
            null_count: Some(self.null_count),
            distinct_count: distinct_count.map(|c| c as i64),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use rivet_io::{FileSource, MemorySource};

    use super::*;
    use crate::column::reader::{ColumnChunkReader, SharedSource};
    use crate::compression::CompressionCodec;
    use crate::page::PageType;
    use crate::schema::{FieldDef, Schema};
    use crate::types::Repetition;

    fn source(buf: Vec<u8>) -> SharedSource {
        let source: Box<dyn FileSource> = Box::new(MemorySource::new(buf));
        Arc::new(Mutex::new(source))
    }

    /// Flush the builder after a leading magic and read everything back.
    fn roundtrip(
        builder: &mut ColumnChunkBuilder,
        leaf: &Column,
    ) -> (ColumnChunkMetadata, Vec<PageType>, Vec<i16>, Vec<i16>, Vec<Value>) {
        let mut buf = b"PAR1".to_vec();
        let meta = builder.flush(4, &mut buf).unwrap();
        let source = source(buf);

        let page_types =
            ColumnChunkReader::new(source.clone(), &meta, leaf, ReaderOptions::default())
                .unwrap()
            .view()
            .map(|h| h.unwrap().page_type())
            .collect();

        let (mut rep, mut def, mut values) = (Vec::new(), Vec::new(), Vec::new());
        let reader = ColumnChunkReader::new(source, &meta, leaf, ReaderOptions::default()).unwrap();
        for page in reader {
            let page = page.unwrap();
            rep.extend(page.rep_levels);
            def.extend(page.def_levels);
            values.extend(page.values);
        }

        (meta, page_types, rep, def, values)
    }

    #[test]
    fn plain_pages_with_nulls() {
        let schema = Schema::new(
            "s",
            vec![FieldDef::primitive("a", Repetition::Optional, PhysicalType::Int32)],
        )
        .unwrap();
        let leaf = schema.leaf(0).unwrap();
        let options = WriterOptions::builder()
            .page_size(16)
            .dictionary_enabled(false)
            .build()
            .unwrap();
        let mut builder = ColumnChunkBuilder::new(leaf, &options).unwrap();

        let mut expected = Vec::new();
        for i in 0..20 {
            if i % 3 == 0 {
                builder.push(0, 0, None).unwrap();
            } else {
                builder.push(0, 1, Some(Value::Int32(i - 10))).unwrap();
                expected.push(Value::Int32(i - 10));
            }
        }
        assert_eq!(20, builder.num_slots());

        let (meta, page_types, rep, def, values) = roundtrip(&mut builder, leaf);
        assert!(page_types.len() > 1);
        assert!(page_types.iter().all(|t| *t == PageType::DataPage));
        assert_eq!(vec![0; 20], rep);
        assert_eq!(20, def.len());
        assert_eq!(expected, values);

        let stats = meta.statistics.unwrap();
        assert_eq!(Some(7), stats.null_count);
        assert_eq!(
            Some(Value::Int32(-9)),
            stats.min_value(PhysicalType::Int32).unwrap()
        );
        assert_eq!(
            Some(Value::Int32(9)),
            stats.max_value(PhysicalType::Int32).unwrap()
        );
        assert_eq!(None, meta.dictionary_page_offset);

        // Builder is reset after flush.
        assert_eq!(0, builder.num_slots());
        assert_eq!(DataSize::ZERO, builder.buffered_size());
    }

    #[test]
    fn dictionary_with_compression() {
        let schema = Schema::new(
            "s",
            vec![FieldDef::primitive("s", Repetition::Required, PhysicalType::ByteArray)
                .with_logical_type(LogicalType::String)],
        )
        .unwrap();
        let leaf = schema.leaf(0).unwrap();
        let options = WriterOptions::builder()
            .compression(CompressionCodec::Snappy)
            .build()
            .unwrap();
        let mut builder = ColumnChunkBuilder::new(leaf, &options).unwrap();

        let words = ["apple", "banana", "cherry"];
        for i in 0..30 {
            let value = builder.prepare(&Value::from(words[i % 3])).unwrap();
            builder.push(0, 0, Some(value)).unwrap();
        }

        let (meta, page_types, _, _, values) = roundtrip(&mut builder, leaf);
        assert_eq!(vec![PageType::DictionaryPage, PageType::DataPage], page_types);
        assert!(meta.encodings.contains(&Encoding::RleDictionary));
        assert_eq!(Some(4), meta.dictionary_page_offset);
        assert_eq!(CompressionCodec::Snappy, meta.compression);

        let expected: Vec<_> = (0..30).map(|i| Value::from(words[i % 3])).collect();
        assert_eq!(expected, values);

        let stats = meta.statistics.unwrap();
        assert_eq!(Some(3), stats.distinct_count);
        assert_eq!(Some(b"apple".to_vec()), stats.min);
        assert_eq!(Some(b"cherry".to_vec()), stats.max);
    }

    #[test]
    fn dictionary_ratio_fallback() {
        let schema = Schema::new(
            "s",
            vec![FieldDef::primitive("a", Repetition::Required, PhysicalType::Int64)],
        )
        .unwrap();
        let leaf = schema.leaf(0).unwrap();
        let options = WriterOptions::default();
        let mut builder = ColumnChunkBuilder::new(leaf, &options).unwrap();
        for i in 0..10 {
            builder.push(0, 0, Some(Value::Int64(i))).unwrap();
        }

        let (meta, page_types, _, _, values) = roundtrip(&mut builder, leaf);
        assert_eq!(vec![PageType::DataPage], page_types);
        assert!(!meta.encodings.contains(&Encoding::RleDictionary));
        assert_eq!((0..10).map(Value::Int64).collect::<Vec<_>>(), values);
    }

    #[test]
    fn v2_repeated_gzip() {
        let schema = Schema::new(
            "s",
            vec![FieldDef::primitive("r", Repetition::Repeated, PhysicalType::Double)],
        )
        .unwrap();
        let leaf = schema.leaf(0).unwrap();
        let options = WriterOptions::builder()
            .compression(CompressionCodec::Gzip)
            .writer_version(WriterVersion::V2)
            .page_size(8)
            .build()
            .unwrap();
        let mut builder = ColumnChunkBuilder::new(leaf, &options).unwrap();

        // Rows: [1.5, 2.5], [], [3.5]
        let slots = [
            (0, 1, Some(1.5)),
            (1, 1, Some(2.5)),
            (0, 0, None),
            (0, 1, Some(3.5)),
        ];
        for (rep, def, v) in slots {
            builder.push(rep, def, v.map(Value::Double)).unwrap();
        }

        let (_, page_types, rep, def, values) = roundtrip(&mut builder, leaf);
        assert!(page_types.iter().all(|t| *t == PageType::DataPageV2));
        // Second element of the first row stays on the first page.
        assert_eq!(2, page_types.len());
        assert_eq!(vec![0, 1, 0, 0], rep);
        assert_eq!(vec![1, 1, 0, 1], def);
        assert_eq!(
            vec![Value::Double(1.5), Value::Double(2.5), Value::Double(3.5)],
            values
        );
    }

    #[test]
    fn level_value_mismatch() {
        let schema = Schema::new(
            "s",
            vec![FieldDef::primitive("a", Repetition::Optional, PhysicalType::Int32)],
        )
        .unwrap();
        let mut builder =
            ColumnChunkBuilder::new(schema.leaf(0).unwrap(), &WriterOptions::default()).unwrap();
        assert!(builder.push(0, 1, None).is_err());
        assert!(builder.push(0, 0, Some(Value::Int32(1))).is_err());
    }
}
