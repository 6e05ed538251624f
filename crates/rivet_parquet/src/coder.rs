//! Encoding and decoding of page contents.
//!
//! A data page holds repetition levels, definition levels, then the non-null
//! values. Levels are RLE/bit-packed at the smallest width that fits the
//! column's max level. In v1 pages each level section is prefixed by its 4
//! byte length, v2 pages store the lengths in the header instead.
use rivet_error::{Result, RivetError};
use tracing::trace;

use crate::binary::{
    decimal_from_be_bytes,
    decimal_min_len,
    decimal_to_be_bytes,
    BinaryReader,
    BinaryWriter,
};
use crate::dictionary::Dictionary;
use crate::encoding::plain::{decode_plain, encode_plain};
use crate::encoding::rle_bp::{decode_rle_bp, encode_rle_bp};
use crate::encoding::{bit_width, Encoding};
use crate::options::ReaderOptions;
use crate::page::DataPageHeaderV1;
use crate::schema::Column;
use crate::types::{Int96, LogicalType, PhysicalType, TimeUnit};
use crate::value::Value;

/// Decoded contents of a single data page.
///
/// `rep_levels` and `def_levels` have one entry per slot. `values` only has
/// entries for slots where the definition level is at its max.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnData {
    pub physical_type: PhysicalType,
    pub logical_type: Option<LogicalType>,
    pub rep_levels: Vec<i16>,
    pub def_levels: Vec<i16>,
    pub values: Vec<Value>,
}

impl ColumnData {
    /// Number of slots.
    pub fn len(&self) -> usize {
        self.def_levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.def_levels.is_empty()
    }
}

/// Encodes and decodes pages for a single leaf column.
#[derive(Debug, Clone)]
pub struct DataCoder {
    path: String,
    physical_type: PhysicalType,
    logical_type: Option<LogicalType>,
    max_def_level: i16,
    max_rep_level: i16,
    options: ReaderOptions,
}

impl DataCoder {
    pub fn new(leaf: &Column, options: ReaderOptions) -> Result<Self> {
        let flat = leaf.flat().ok_or_else(|| {
            RivetError::new(format!("Cannot build a page coder for group '{}'", leaf.path_string()))
        })?;
        Ok(DataCoder {
            path: leaf.path_string(),
            physical_type: flat.physical_type,
            logical_type: leaf.logical_type,
            max_def_level: leaf.max_def_level,
            max_rep_level: leaf.max_rep_level,
            options,
        })
    }

    pub fn physical_type(&self) -> PhysicalType {
        self.physical_type
    }

    pub fn max_def_level(&self) -> i16 {
        self.max_def_level
    }

    pub fn max_rep_level(&self) -> i16 {
        self.max_rep_level
    }

    /// Decode a decompressed v1 data page.
    ///
    /// Only RLE level streams are supported. Level encodings are ignored for
    /// levels that aren't stored.
    pub fn decode_v1(
        &self,
        buf: &[u8],
        header: &DataPageHeaderV1,
        dictionary: Option<&Dictionary>,
    ) -> Result<ColumnData> {
        let num_values = header.num_values as usize;
        let mut reader = BinaryReader::new(buf);
        let rep_levels = if self.max_rep_level > 0 {
            self.check_level_encoding("repetition", header.repetition_level_encoding)?;
            let block = read_prefixed_block(&mut reader)?;
            decode_levels(block, self.max_rep_level, num_values)?
        } else {
            vec![0; num_values]
        };
        let def_levels = if self.max_def_level > 0 {
            self.check_level_encoding("definition", header.definition_level_encoding)?;
            let block = read_prefixed_block(&mut reader)?;
            decode_levels(block, self.max_def_level, num_values)?
        } else {
            vec![0; num_values]
        };

        self.finish_decode(
            rep_levels,
            def_levels,
            reader.remaining(),
            header.encoding,
            dictionary,
        )
    }

    fn check_level_encoding(&self, levels: &str, encoding: Encoding) -> Result<()> {
        if encoding != Encoding::Rle {
            return Err(RivetError::unsupported_encoding(format!(
                "Encoding {encoding} not supported for {levels} levels of column '{}'",
                self.path
            )));
        }
        Ok(())
    }

    /// Decode a v2 data page from its already separated sections.
    ///
    /// `values` must already be decompressed.
    pub fn decode_v2(
        &self,
        rep: &[u8],
        def: &[u8],
        values: &[u8],
        encoding: Encoding,
        num_values: usize,
        dictionary: Option<&Dictionary>,
    ) -> Result<ColumnData> {
        let rep_levels = if self.max_rep_level > 0 {
            decode_levels(rep, self.max_rep_level, num_values)?
        } else {
            vec![0; num_values]
        };
        let def_levels = if self.max_def_level > 0 {
            decode_levels(def, self.max_def_level, num_values)?
        } else {
            vec![0; num_values]
        };

        self.finish_decode(rep_levels, def_levels, values, encoding, dictionary)
    }

    fn finish_decode(
        &self,
        rep_levels: Vec<i16>,
        def_levels: Vec<i16>,
        buf: &[u8],
        encoding: Encoding,
        dictionary: Option<&Dictionary>,
    ) -> Result<ColumnData> {
        let null_count = def_levels
            .iter()
            .filter(|&&d| d < self.max_def_level)
            .count();
        let count = def_levels.len() - null_count;

        let mut values = Vec::with_capacity(count);
        match encoding {
            Encoding::Plain => {
                let mut reader = BinaryReader::new(buf);
                decode_plain(&mut reader, self.physical_type, count, &mut values)?;
                for value in values.iter_mut() {
                    let physical = std::mem::replace(value, Value::Null);
                    *value = self.to_logical(physical)?;
                }
            }
            Encoding::PlainDictionary | Encoding::RleDictionary => {
                let dictionary = dictionary.ok_or_else(|| {
                    RivetError::invalid_format(format!(
                        "Dictionary encoded page for '{}' without a dictionary page",
                        self.path
                    ))
                })?;
                if count > 0 {
                    let (&width, indices) = buf.split_first().ok_or_else(|| {
                        RivetError::invalid_format("Dictionary indices missing bit width")
                    })?;
                    let indices = decode_rle_bp(indices, width, count)?;
                    dictionary.resolve(&indices, &mut values)?;
                }
            }
            Encoding::Rle if self.physical_type == PhysicalType::Boolean => {
                let mut reader = BinaryReader::new(buf);
                let block = read_prefixed_block(&mut reader)?;
                for v in decode_rle_bp(block, 1, count)? {
                    values.push(Value::Boolean(v != 0));
                }
            }
            other => {
                return Err(RivetError::unsupported_encoding(format!(
                    "Encoding {other} not supported for {} column '{}'",
                    self.physical_type, self.path
                )))
            }
        }

        trace!(
            column = %self.path,
            slots = def_levels.len(),
            null_count,
            %encoding,
            "decoded page"
        );

        Ok(ColumnData {
            physical_type: self.physical_type,
            logical_type: self.logical_type,
            rep_levels,
            def_levels,
            values,
        })
    }

    /// Decode a dictionary page. Dictionary pages are plain encoded and have
    /// no levels.
    pub fn decode_dictionary(&self, buf: &[u8], num_values: usize) -> Result<Dictionary> {
        let mut reader = BinaryReader::new(buf);
        let mut values = Vec::with_capacity(num_values);
        decode_plain(&mut reader, self.physical_type, num_values, &mut values)?;
        let values = values
            .into_iter()
            .map(|v| self.to_logical(v))
            .collect::<Result<Vec<_>>>()?;
        Ok(Dictionary::new(values))
    }

    /// Convert a physical value read from a page into its logical value.
    pub fn to_logical(&self, value: Value) -> Result<Value> {
        let value = match (self.logical_type, value) {
            (
                Some(LogicalType::String | LogicalType::Enum | LogicalType::Json),
                Value::Binary(b),
            ) => Value::Utf8(self.utf8(b)?),
            (Some(LogicalType::Date), Value::Int32(v)) => Value::Date(v),
            (Some(LogicalType::Time { unit, .. }), Value::Int32(v)) => Value::Time(v as i64, unit),
            (Some(LogicalType::Time { unit, .. }), Value::Int64(v)) => Value::Time(v, unit),
            (Some(LogicalType::Timestamp { unit, .. }), Value::Int64(v)) => self.timestamp(v, unit),
            (Some(LogicalType::Decimal { scale, precision }), value) => {
                let unscaled = match value {
                    Value::Int32(v) => v as i128,
                    Value::Int64(v) => v as i128,
                    Value::Binary(b) => decimal_from_be_bytes(&b)?,
                    other => return Ok(other),
                };
                Value::Decimal {
                    value: unscaled,
                    precision,
                    scale,
                }
            }
            (None, Value::Binary(b)) if self.options.byte_array_as_string => {
                Value::Utf8(self.utf8(b)?)
            }
            (None, Value::Int96(v)) if self.options.int96_as_timestamp => {
                self.timestamp(v.to_nanos(), TimeUnit::Nanos)
            }
            // Everything else (bson, uuid, integers, unknown) is read as its
            // physical value.
            (_, value) => value,
        };
        Ok(value)
    }

    /// Convert a value from a record into the physical value written to a
    /// page.
    pub fn to_physical(&self, value: &Value) -> Result<Value> {
        let physical = match (self.physical_type, self.logical_type, value) {
            (PhysicalType::Boolean, _, Value::Boolean(_))
            | (PhysicalType::Int32, _, Value::Int32(_))
            | (PhysicalType::Int64, _, Value::Int64(_))
            | (PhysicalType::Int96, _, Value::Int96(_))
            | (PhysicalType::Float, _, Value::Float(_))
            | (PhysicalType::Double, _, Value::Double(_))
            | (PhysicalType::ByteArray, _, Value::Binary(_)) => value.clone(),
            (PhysicalType::FixedLenByteArray(len), _, Value::Binary(b)) if b.len() == len => {
                value.clone()
            }

            (PhysicalType::ByteArray, _, Value::Utf8(s)) => Value::Binary(s.as_bytes().to_vec()),
            (PhysicalType::FixedLenByteArray(len), _, Value::Utf8(s)) if s.len() == len => {
                Value::Binary(s.as_bytes().to_vec())
            }

            (PhysicalType::Int32, Some(LogicalType::Date), Value::Date(v)) => Value::Int32(*v),
            (PhysicalType::Int32, Some(LogicalType::Time { unit, .. }), Value::Time(v, from)) => {
                let v = from.convert(*v, unit);
                Value::Int32(i32::try_from(v).map_err(|_| self.violation(value))?)
            }
            (PhysicalType::Int64, Some(LogicalType::Time { unit, .. }), Value::Time(v, from))
            | (
                PhysicalType::Int64,
                Some(LogicalType::Timestamp { unit, .. }),
                Value::Timestamp(v, from),
            ) => Value::Int64(from.convert(*v, unit)),
            (PhysicalType::Int96, _, Value::Timestamp(v, from)) => {
                Value::Int96(Int96::from_nanos(from.convert(*v, TimeUnit::Nanos)))
            }

            (
                physical,
                Some(LogicalType::Decimal { scale, precision }),
                Value::Decimal {
                    value: v,
                    scale: s,
                    precision: p,
                },
            ) => {
                if *s != scale || *p > precision {
                    return Err(RivetError::schema_violation(format!(
                        "Decimal({p},{s}) does not fit column '{}' of DECIMAL({precision},{scale})",
                        self.path
                    )));
                }
                match physical {
                    PhysicalType::Int32 => {
                        Value::Int32(i32::try_from(*v).map_err(|_| self.violation(value))?)
                    }
                    PhysicalType::Int64 => {
                        Value::Int64(i64::try_from(*v).map_err(|_| self.violation(value))?)
                    }
                    PhysicalType::ByteArray => {
                        Value::Binary(decimal_to_be_bytes(*v, decimal_min_len(*v))?)
                    }
                    PhysicalType::FixedLenByteArray(len) => Value::Binary(
                        decimal_to_be_bytes(*v, len).map_err(|_| self.violation(value))?,
                    ),
                    _ => return Err(self.violation(value)),
                }
            }

            _ => return Err(self.violation(value)),
        };
        Ok(physical)
    }

    fn violation(&self, value: &Value) -> RivetError {
        RivetError::schema_violation(format!(
            "Cannot write {} value to {} column '{}'",
            value.type_name(),
            self.physical_type,
            self.path
        ))
    }

    fn utf8(&self, bytes: Vec<u8>) -> Result<String> {
        String::from_utf8(bytes).map_err(|e| {
            RivetError::invalid_format(format!("Invalid utf8 in column '{}': {e}", self.path))
        })
    }

    fn timestamp(&self, v: i64, unit: TimeUnit) -> Value {
        if unit == TimeUnit::Nanos && self.options.round_nanoseconds {
            // Half up.
            let micros = (v as i128 + 500).div_euclid(1000) as i64;
            return Value::Timestamp(micros, TimeUnit::Micros);
        }
        Value::Timestamp(v, unit)
    }
}

/// Read a block prefixed with its 4 byte little endian length.
fn read_prefixed_block<'a>(reader: &mut BinaryReader<'a>) -> Result<&'a [u8]> {
    let len = reader.read_u32()? as usize;
    reader.read_bytes(len)
}

/// Decode `count` levels, checking none exceed `max_level`.
pub fn decode_levels(buf: &[u8], max_level: i16, count: usize) -> Result<Vec<i16>> {
    let raw = decode_rle_bp(buf, bit_width(max_level as u64), count)?;
    raw.into_iter()
        .map(|l| {
            if l > max_level as u64 {
                Err(RivetError::invalid_format(format!(
                    "Level {l} exceeds max level {max_level}"
                )))
            } else {
                Ok(l as i16)
            }
        })
        .collect()
}

/// Encode levels without a length prefix.
pub fn encode_levels(levels: &[i16], max_level: i16) -> Vec<u8> {
    encode_rle_bp(levels.iter().map(|&l| l as u64), bit_width(max_level as u64))
}

/// Encode levels with a 4 byte length prefix, as stored in v1 pages.
pub fn encode_levels_v1(levels: &[i16], max_level: i16, out: &mut Vec<u8>) {
    let encoded = encode_levels(levels, max_level);
    out.extend_from_slice(&(encoded.len() as u32).to_le_bytes());
    out.extend_from_slice(&encoded);
}

/// Plain encode physical values.
pub fn encode_plain_values<'a>(
    physical: PhysicalType,
    values: impl IntoIterator<Item = &'a Value>,
) -> Result<Vec<u8>> {
    let mut writer = BinaryWriter::new();
    for value in values {
        encode_plain(&mut writer, physical, value)?;
    }
    Ok(writer.into_inner())
}

/// Encode dictionary indices, prefixed by the bit width.
pub fn encode_dictionary_indices(indices: &[u32], dictionary_len: usize) -> Vec<u8> {
    let width = bit_width(dictionary_len.saturating_sub(1) as u64);
    let mut out = vec![width];
    out.extend(encode_rle_bp(indices.iter().map(|&i| i as u64), width));
    out
}
