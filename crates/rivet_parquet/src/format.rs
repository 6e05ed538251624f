//! Thrift definitions for the parquet footer and page headers.
//!
//! Only the parts of parquet.thrift that we read or write are defined here.
//! Unknown fields are skipped when reading.
//!
//! See: <https://github.com/apache/parquet-format/blob/master/src/main/thrift/parquet.thrift>
use thrift::protocol::{TInputProtocol, TOutputProtocol, TStructIdentifier, TType};

use crate::thrift_ext::{
    field_begin,
    missing_field,
    read_list,
    write_binary_field,
    write_bool_field,
    write_i32_field,
    write_i64_field,
    write_list,
    write_string_field,
    write_struct_field,
    EmptyStruct,
    TSerializable,
};

/// Loop over the fields of a struct, calling `$body` with the field id and
/// type. The body must consume the field (or skip it).
macro_rules! read_fields {
    ($prot:ident, |$id:ident, $ty:ident| $body:block) => {{
        $prot.read_struct_begin()?;
        loop {
            let field = $prot.read_field_begin()?;
            if field.field_type == TType::Stop {
                break;
            }
            let $id = field.id.unwrap_or(-1);
            let $ty = field.field_type;
            $body
            $prot.read_field_end()?;
        }
        $prot.read_struct_end()?;
    }};
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct KeyValue {
    pub key: String,
    pub value: Option<String>,
}

impl TSerializable for KeyValue {
    fn read_from_in_protocol<T: TInputProtocol>(i_prot: &mut T) -> thrift::Result<Self> {
        let mut key = None;
        let mut value = None;
        read_fields!(i_prot, |id, ty| {
            match id {
                1 => key = Some(i_prot.read_string()?),
                2 => value = Some(i_prot.read_string()?),
                _ => i_prot.skip(ty)?,
            }
        });
        Ok(KeyValue {
            key: key.ok_or_else(|| missing_field("KeyValue", "key"))?,
            value,
        })
    }

    fn write_to_out_protocol<T: TOutputProtocol>(&self, o_prot: &mut T) -> thrift::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("KeyValue"))?;
        write_string_field(o_prot, "key", 1, &self.key)?;
        if let Some(value) = &self.value {
            write_string_field(o_prot, "value", 2, value)?;
        }
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Statistics {
    /// Deprecated min/max with signed comparison.
    pub max: Option<Vec<u8>>,
    pub min: Option<Vec<u8>>,
    pub null_count: Option<i64>,
    pub distinct_count: Option<i64>,
    pub max_value: Option<Vec<u8>>,
    pub min_value: Option<Vec<u8>>,
}

impl TSerializable for Statistics {
    fn read_from_in_protocol<T: TInputProtocol>(i_prot: &mut T) -> thrift::Result<Self> {
        let mut s = Statistics::default();
        read_fields!(i_prot, |id, ty| {
            match id {
                1 => s.max = Some(i_prot.read_bytes()?),
                2 => s.min = Some(i_prot.read_bytes()?),
                3 => s.null_count = Some(i_prot.read_i64()?),
                4 => s.distinct_count = Some(i_prot.read_i64()?),
                5 => s.max_value = Some(i_prot.read_bytes()?),
                6 => s.min_value = Some(i_prot.read_bytes()?),
                _ => i_prot.skip(ty)?,
            }
        });
        Ok(s)
    }

    fn write_to_out_protocol<T: TOutputProtocol>(&self, o_prot: &mut T) -> thrift::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("Statistics"))?;
        if let Some(v) = &self.max {
            write_binary_field(o_prot, "max", 1, v)?;
        }
        if let Some(v) = &self.min {
            write_binary_field(o_prot, "min", 2, v)?;
        }
        if let Some(v) = self.null_count {
            write_i64_field(o_prot, "null_count", 3, v)?;
        }
        if let Some(v) = self.distinct_count {
            write_i64_field(o_prot, "distinct_count", 4, v)?;
        }
        if let Some(v) = &self.max_value {
            write_binary_field(o_prot, "max_value", 5, v)?;
        }
        if let Some(v) = &self.min_value {
            write_binary_field(o_prot, "min_value", 6, v)?;
        }
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}

/// Time unit union.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Millis,
    Micros,
    Nanos,
}

impl TSerializable for TimeUnit {
    fn read_from_in_protocol<T: TInputProtocol>(i_prot: &mut T) -> thrift::Result<Self> {
        let mut unit = None;
        read_fields!(i_prot, |id, ty| {
            match id {
                1 | 2 | 3 => {
                    EmptyStruct::read_from_in_protocol(i_prot)?;
                    unit = Some(match id {
                        1 => TimeUnit::Millis,
                        2 => TimeUnit::Micros,
                        _ => TimeUnit::Nanos,
                    });
                }
                _ => i_prot.skip(ty)?,
            }
        });
        unit.ok_or_else(|| missing_field("TimeUnit", "<variant>"))
    }

    fn write_to_out_protocol<T: TOutputProtocol>(&self, o_prot: &mut T) -> thrift::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("TimeUnit"))?;
        let (name, id) = match self {
            TimeUnit::Millis => ("MILLIS", 1),
            TimeUnit::Micros => ("MICROS", 2),
            TimeUnit::Nanos => ("NANOS", 3),
        };
        write_struct_field(o_prot, name, id, &EmptyStruct)?;
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}

/// Logical type union.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalType {
    String,
    Map,
    List,
    Enum,
    Decimal { scale: i32, precision: i32 },
    Date,
    Time { is_adjusted_to_utc: bool, unit: TimeUnit },
    Timestamp { is_adjusted_to_utc: bool, unit: TimeUnit },
    Integer { bit_width: i8, is_signed: bool },
    Unknown,
    Json,
    Bson,
    Uuid,
    Float16,
    /// A variant we don't know about.
    Unrecognized(i16),
}

fn read_decimal<T: TInputProtocol>(i_prot: &mut T) -> thrift::Result<LogicalType> {
    let mut scale = None;
    let mut precision = None;
    read_fields!(i_prot, |id, ty| {
        match id {
            1 => scale = Some(i_prot.read_i32()?),
            2 => precision = Some(i_prot.read_i32()?),
            _ => i_prot.skip(ty)?,
        }
    });
    Ok(LogicalType::Decimal {
        scale: scale.ok_or_else(|| missing_field("DecimalType", "scale"))?,
        precision: precision.ok_or_else(|| missing_field("DecimalType", "precision"))?,
    })
}

fn read_time_like<T: TInputProtocol>(i_prot: &mut T) -> thrift::Result<(bool, TimeUnit)> {
    let mut adjusted = None;
    let mut unit = None;
    read_fields!(i_prot, |id, ty| {
        match id {
            1 => adjusted = Some(i_prot.read_bool()?),
            2 => unit = Some(TimeUnit::read_from_in_protocol(i_prot)?),
            _ => i_prot.skip(ty)?,
        }
    });
    Ok((
        adjusted.ok_or_else(|| missing_field("TimeType", "isAdjustedToUTC"))?,
        unit.ok_or_else(|| missing_field("TimeType", "unit"))?,
    ))
}

fn read_int<T: TInputProtocol>(i_prot: &mut T) -> thrift::Result<LogicalType> {
    let mut bit_width = None;
    let mut is_signed = None;
    read_fields!(i_prot, |id, ty| {
        match id {
            1 => bit_width = Some(i_prot.read_i8()?),
            2 => is_signed = Some(i_prot.read_bool()?),
            _ => i_prot.skip(ty)?,
        }
    });
    Ok(LogicalType::Integer {
        bit_width: bit_width.ok_or_else(|| missing_field("IntType", "bitWidth"))?,
        is_signed: is_signed.ok_or_else(|| missing_field("IntType", "isSigned"))?,
    })
}

impl TSerializable for LogicalType {
    fn read_from_in_protocol<T: TInputProtocol>(i_prot: &mut T) -> thrift::Result<Self> {
        let mut logical = None;
        read_fields!(i_prot, |id, ty| {
            let v = match id {
                1 => Some(LogicalType::String),
                2 => Some(LogicalType::Map),
                3 => Some(LogicalType::List),
                4 => Some(LogicalType::Enum),
                5 => {
                    logical = Some(read_decimal(i_prot)?);
                    None
                }
                6 => Some(LogicalType::Date),
                7 => {
                    let (is_adjusted_to_utc, unit) = read_time_like(i_prot)?;
                    logical = Some(LogicalType::Time {
                        is_adjusted_to_utc,
                        unit,
                    });
                    None
                }
                8 => {
                    let (is_adjusted_to_utc, unit) = read_time_like(i_prot)?;
                    logical = Some(LogicalType::Timestamp {
                        is_adjusted_to_utc,
                        unit,
                    });
                    None
                }
                10 => {
                    logical = Some(read_int(i_prot)?);
                    None
                }
                11 => Some(LogicalType::Unknown),
                12 => Some(LogicalType::Json),
                13 => Some(LogicalType::Bson),
                14 => Some(LogicalType::Uuid),
                15 => Some(LogicalType::Float16),
                other => {
                    i_prot.skip(ty)?;
                    logical = Some(LogicalType::Unrecognized(other));
                    None
                }
            };
            if let Some(v) = v {
                // Variant with an empty struct payload.
                EmptyStruct::read_from_in_protocol(i_prot)?;
                logical = Some(v);
            }
        });
        logical.ok_or_else(|| missing_field("LogicalType", "<variant>"))
    }

    fn write_to_out_protocol<T: TOutputProtocol>(&self, o_prot: &mut T) -> thrift::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("LogicalType"))?;
        match self {
            LogicalType::String => write_struct_field(o_prot, "STRING", 1, &EmptyStruct)?,
            LogicalType::Map => write_struct_field(o_prot, "MAP", 2, &EmptyStruct)?,
            LogicalType::List => write_struct_field(o_prot, "LIST", 3, &EmptyStruct)?,
            LogicalType::Enum => write_struct_field(o_prot, "ENUM", 4, &EmptyStruct)?,
            LogicalType::Decimal { scale, precision } => {
                field_begin(o_prot, "DECIMAL", TType::Struct, 5)?;
                o_prot.write_struct_begin(&TStructIdentifier::new("DecimalType"))?;
                write_i32_field(o_prot, "scale", 1, *scale)?;
                write_i32_field(o_prot, "precision", 2, *precision)?;
                o_prot.write_field_stop()?;
                o_prot.write_struct_end()?;
                o_prot.write_field_end()?;
            }
            LogicalType::Date => write_struct_field(o_prot, "DATE", 6, &EmptyStruct)?,
            LogicalType::Time {
                is_adjusted_to_utc,
                unit,
            } => write_time_like(o_prot, "TIME", 7, *is_adjusted_to_utc, unit)?,
            LogicalType::Timestamp {
                is_adjusted_to_utc,
                unit,
            } => write_time_like(o_prot, "TIMESTAMP", 8, *is_adjusted_to_utc, unit)?,
            LogicalType::Integer {
                bit_width,
                is_signed,
            } => {
                field_begin(o_prot, "INTEGER", TType::Struct, 10)?;
                o_prot.write_struct_begin(&TStructIdentifier::new("IntType"))?;
                field_begin(o_prot, "bitWidth", TType::I08, 1)?;
                o_prot.write_i8(*bit_width)?;
                o_prot.write_field_end()?;
                write_bool_field(o_prot, "isSigned", 2, *is_signed)?;
                o_prot.write_field_stop()?;
                o_prot.write_struct_end()?;
                o_prot.write_field_end()?;
            }
            LogicalType::Unknown => write_struct_field(o_prot, "UNKNOWN", 11, &EmptyStruct)?,
            LogicalType::Json => write_struct_field(o_prot, "JSON", 12, &EmptyStruct)?,
            LogicalType::Bson => write_struct_field(o_prot, "BSON", 13, &EmptyStruct)?,
            LogicalType::Uuid => write_struct_field(o_prot, "UUID", 14, &EmptyStruct)?,
            LogicalType::Float16 => write_struct_field(o_prot, "FLOAT16", 15, &EmptyStruct)?,
            LogicalType::Unrecognized(id) => {
                return Err(thrift::Error::Protocol(thrift::ProtocolError::new(
                    thrift::ProtocolErrorKind::InvalidData,
                    format!("Cannot write unrecognized logical type variant {id}"),
                )))
            }
        }
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}

fn write_time_like<T: TOutputProtocol>(
    o_prot: &mut T,
    name: &str,
    id: i16,
    is_adjusted_to_utc: bool,
    unit: &TimeUnit,
) -> thrift::Result<()> {
    field_begin(o_prot, name, TType::Struct, id)?;
    o_prot.write_struct_begin(&TStructIdentifier::new(name))?;
    write_bool_field(o_prot, "isAdjustedToUTC", 1, is_adjusted_to_utc)?;
    write_struct_field(o_prot, "unit", 2, unit)?;
    o_prot.write_field_stop()?;
    o_prot.write_struct_end()?;
    o_prot.write_field_end()
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SchemaElement {
    pub type_: Option<i32>,
    pub type_length: Option<i32>,
    pub repetition_type: Option<i32>,
    pub name: String,
    pub num_children: Option<i32>,
    pub converted_type: Option<i32>,
    pub scale: Option<i32>,
    pub precision: Option<i32>,
    pub field_id: Option<i32>,
    pub logical_type: Option<LogicalType>,
}

impl TSerializable for SchemaElement {
    fn read_from_in_protocol<T: TInputProtocol>(i_prot: &mut T) -> thrift::Result<Self> {
        let mut e = SchemaElement::default();
        let mut name = None;
        read_fields!(i_prot, |id, ty| {
            match id {
                1 => e.type_ = Some(i_prot.read_i32()?),
                2 => e.type_length = Some(i_prot.read_i32()?),
                3 => e.repetition_type = Some(i_prot.read_i32()?),
                4 => name = Some(i_prot.read_string()?),
                5 => e.num_children = Some(i_prot.read_i32()?),
                6 => e.converted_type = Some(i_prot.read_i32()?),
                7 => e.scale = Some(i_prot.read_i32()?),
                8 => e.precision = Some(i_prot.read_i32()?),
                9 => e.field_id = Some(i_prot.read_i32()?),
                10 => e.logical_type = Some(LogicalType::read_from_in_protocol(i_prot)?),
                _ => i_prot.skip(ty)?,
            }
        });
        e.name = name.ok_or_else(|| missing_field("SchemaElement", "name"))?;
        Ok(e)
    }

    fn write_to_out_protocol<T: TOutputProtocol>(&self, o_prot: &mut T) -> thrift::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("SchemaElement"))?;
        if let Some(v) = self.type_ {
            write_i32_field(o_prot, "type", 1, v)?;
        }
        if let Some(v) = self.type_length {
            write_i32_field(o_prot, "type_length", 2, v)?;
        }
        if let Some(v) = self.repetition_type {
            write_i32_field(o_prot, "repetition_type", 3, v)?;
        }
        write_string_field(o_prot, "name", 4, &self.name)?;
        if let Some(v) = self.num_children {
            write_i32_field(o_prot, "num_children", 5, v)?;
        }
        if let Some(v) = self.converted_type {
            write_i32_field(o_prot, "converted_type", 6, v)?;
        }
        if let Some(v) = self.scale {
            write_i32_field(o_prot, "scale", 7, v)?;
        }
        if let Some(v) = self.precision {
            write_i32_field(o_prot, "precision", 8, v)?;
        }
        if let Some(v) = self.field_id {
            write_i32_field(o_prot, "field_id", 9, v)?;
        }
        if let Some(v) = &self.logical_type {
            write_struct_field(o_prot, "logicalType", 10, v)?;
        }
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColumnMetaData {
    pub type_: i32,
    pub encodings: Vec<i32>,
    pub path_in_schema: Vec<String>,
    pub codec: i32,
    pub num_values: i64,
    pub total_uncompressed_size: i64,
    pub total_compressed_size: i64,
    pub key_value_metadata: Option<Vec<KeyValue>>,
    pub data_page_offset: i64,
    pub index_page_offset: Option<i64>,
    pub dictionary_page_offset: Option<i64>,
    pub statistics: Option<Statistics>,
}

impl TSerializable for ColumnMetaData {
    fn read_from_in_protocol<T: TInputProtocol>(i_prot: &mut T) -> thrift::Result<Self> {
        let mut m = ColumnMetaData::default();
        let mut seen = [false; 8];
        read_fields!(i_prot, |id, ty| {
            match id {
                1 => m.type_ = i_prot.read_i32()?,
                2 => m.encodings = read_list(i_prot, |p| p.read_i32())?,
                3 => m.path_in_schema = read_list(i_prot, |p| p.read_string())?,
                4 => m.codec = i_prot.read_i32()?,
                5 => m.num_values = i_prot.read_i64()?,
                6 => m.total_uncompressed_size = i_prot.read_i64()?,
                7 => m.total_compressed_size = i_prot.read_i64()?,
                8 => {
                    m.key_value_metadata =
                        Some(read_list(i_prot, KeyValue::read_from_in_protocol)?)
                }
                9 => m.data_page_offset = i_prot.read_i64()?,
                10 => m.index_page_offset = Some(i_prot.read_i64()?),
                11 => m.dictionary_page_offset = Some(i_prot.read_i64()?),
                12 => m.statistics = Some(Statistics::read_from_in_protocol(i_prot)?),
                _ => i_prot.skip(ty)?,
            }
            if (1..=7).contains(&id) {
                seen[id as usize] = true;
            }
            if id == 9 {
                seen[0] = true;
            }
        });

        const REQUIRED: [(usize, &str); 8] = [
            (0, "data_page_offset"),
            (1, "type"),
            (2, "encodings"),
            (3, "path_in_schema"),
            (4, "codec"),
            (5, "num_values"),
            (6, "total_uncompressed_size"),
            (7, "total_compressed_size"),
        ];
        for (idx, name) in REQUIRED {
            if !seen[idx] {
                return Err(missing_field("ColumnMetaData", name));
            }
        }

        Ok(m)
    }

    fn write_to_out_protocol<T: TOutputProtocol>(&self, o_prot: &mut T) -> thrift::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("ColumnMetaData"))?;
        write_i32_field(o_prot, "type", 1, self.type_)?;
        field_begin(o_prot, "encodings", TType::List, 2)?;
        write_list(o_prot, TType::I32, &self.encodings, |p, v| p.write_i32(*v))?;
        o_prot.write_field_end()?;
        field_begin(o_prot, "path_in_schema", TType::List, 3)?;
        write_list(o_prot, TType::String, &self.path_in_schema, |p, v| {
            p.write_string(v)
        })?;
        o_prot.write_field_end()?;
        write_i32_field(o_prot, "codec", 4, self.codec)?;
        write_i64_field(o_prot, "num_values", 5, self.num_values)?;
        write_i64_field(
            o_prot,
            "total_uncompressed_size",
            6,
            self.total_uncompressed_size,
        )?;
        write_i64_field(
            o_prot,
            "total_compressed_size",
            7,
            self.total_compressed_size,
        )?;
        if let Some(kvs) = &self.key_value_metadata {
            field_begin(o_prot, "key_value_metadata", TType::List, 8)?;
            write_list(o_prot, TType::Struct, kvs, |p, v| v.write_to_out_protocol(p))?;
            o_prot.write_field_end()?;
        }
        write_i64_field(o_prot, "data_page_offset", 9, self.data_page_offset)?;
        if let Some(v) = self.index_page_offset {
            write_i64_field(o_prot, "index_page_offset", 10, v)?;
        }
        if let Some(v) = self.dictionary_page_offset {
            write_i64_field(o_prot, "dictionary_page_offset", 11, v)?;
        }
        if let Some(v) = &self.statistics {
            write_struct_field(o_prot, "statistics", 12, v)?;
        }
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColumnChunk {
    pub file_path: Option<String>,
    pub file_offset: i64,
    pub meta_data: Option<ColumnMetaData>,
}

impl TSerializable for ColumnChunk {
    fn read_from_in_protocol<T: TInputProtocol>(i_prot: &mut T) -> thrift::Result<Self> {
        let mut c = ColumnChunk::default();
        read_fields!(i_prot, |id, ty| {
            match id {
                1 => c.file_path = Some(i_prot.read_string()?),
                2 => c.file_offset = i_prot.read_i64()?,
                3 => c.meta_data = Some(ColumnMetaData::read_from_in_protocol(i_prot)?),
                _ => i_prot.skip(ty)?,
            }
        });
        Ok(c)
    }

    fn write_to_out_protocol<T: TOutputProtocol>(&self, o_prot: &mut T) -> thrift::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("ColumnChunk"))?;
        if let Some(v) = &self.file_path {
            write_string_field(o_prot, "file_path", 1, v)?;
        }
        write_i64_field(o_prot, "file_offset", 2, self.file_offset)?;
        if let Some(v) = &self.meta_data {
            write_struct_field(o_prot, "meta_data", 3, v)?;
        }
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowGroup {
    pub columns: Vec<ColumnChunk>,
    pub total_byte_size: i64,
    pub num_rows: i64,
    pub file_offset: Option<i64>,
    pub total_compressed_size: Option<i64>,
    pub ordinal: Option<i16>,
}

impl TSerializable for RowGroup {
    fn read_from_in_protocol<T: TInputProtocol>(i_prot: &mut T) -> thrift::Result<Self> {
        let mut rg = RowGroup::default();
        let mut num_rows = None;
        read_fields!(i_prot, |id, ty| {
            match id {
                1 => rg.columns = read_list(i_prot, ColumnChunk::read_from_in_protocol)?,
                2 => rg.total_byte_size = i_prot.read_i64()?,
                3 => num_rows = Some(i_prot.read_i64()?),
                5 => rg.file_offset = Some(i_prot.read_i64()?),
                6 => rg.total_compressed_size = Some(i_prot.read_i64()?),
                7 => rg.ordinal = Some(i_prot.read_i16()?),
                _ => i_prot.skip(ty)?,
            }
        });
        rg.num_rows = num_rows.ok_or_else(|| missing_field("RowGroup", "num_rows"))?;
        Ok(rg)
    }

    fn write_to_out_protocol<T: TOutputProtocol>(&self, o_prot: &mut T) -> thrift::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("RowGroup"))?;
        field_begin(o_prot, "columns", TType::List, 1)?;
        write_list(o_prot, TType::Struct, &self.columns, |p, v| {
            v.write_to_out_protocol(p)
        })?;
        o_prot.write_field_end()?;
        write_i64_field(o_prot, "total_byte_size", 2, self.total_byte_size)?;
        write_i64_field(o_prot, "num_rows", 3, self.num_rows)?;
        if let Some(v) = self.file_offset {
            write_i64_field(o_prot, "file_offset", 5, v)?;
        }
        if let Some(v) = self.total_compressed_size {
            write_i64_field(o_prot, "total_compressed_size", 6, v)?;
        }
        if let Some(v) = self.ordinal {
            field_begin(o_prot, "ordinal", TType::I16, 7)?;
            o_prot.write_i16(v)?;
            o_prot.write_field_end()?;
        }
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FileMetaData {
    pub version: i32,
    pub schema: Vec<SchemaElement>,
    pub num_rows: i64,
    pub row_groups: Vec<RowGroup>,
    pub key_value_metadata: Option<Vec<KeyValue>>,
    pub created_by: Option<String>,
}

impl TSerializable for FileMetaData {
    fn read_from_in_protocol<T: TInputProtocol>(i_prot: &mut T) -> thrift::Result<Self> {
        let mut m = FileMetaData::default();
        let mut version = None;
        let mut num_rows = None;
        read_fields!(i_prot, |id, ty| {
            match id {
                1 => version = Some(i_prot.read_i32()?),
                2 => m.schema = read_list(i_prot, SchemaElement::read_from_in_protocol)?,
                3 => num_rows = Some(i_prot.read_i64()?),
                4 => m.row_groups = read_list(i_prot, RowGroup::read_from_in_protocol)?,
                5 => {
                    m.key_value_metadata =
                        Some(read_list(i_prot, KeyValue::read_from_in_protocol)?)
                }
                6 => m.created_by = Some(i_prot.read_string()?),
                _ => i_prot.skip(ty)?,
            }
        });
        m.version = version.ok_or_else(|| missing_field("FileMetaData", "version"))?;
        m.num_rows = num_rows.ok_or_else(|| missing_field("FileMetaData", "num_rows"))?;
        Ok(m)
    }

    fn write_to_out_protocol<T: TOutputProtocol>(&self, o_prot: &mut T) -> thrift::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("FileMetaData"))?;
        write_i32_field(o_prot, "version", 1, self.version)?;
        field_begin(o_prot, "schema", TType::List, 2)?;
        write_list(o_prot, TType::Struct, &self.schema, |p, v| {
            v.write_to_out_protocol(p)
        })?;
        o_prot.write_field_end()?;
        write_i64_field(o_prot, "num_rows", 3, self.num_rows)?;
        field_begin(o_prot, "row_groups", TType::List, 4)?;
        write_list(o_prot, TType::Struct, &self.row_groups, |p, v| {
            v.write_to_out_protocol(p)
        })?;
        o_prot.write_field_end()?;
        if let Some(kvs) = &self.key_value_metadata {
            field_begin(o_prot, "key_value_metadata", TType::List, 5)?;
            write_list(o_prot, TType::Struct, kvs, |p, v| v.write_to_out_protocol(p))?;
            o_prot.write_field_end()?;
        }
        if let Some(v) = &self.created_by {
            write_string_field(o_prot, "created_by", 6, v)?;
        }
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataPageHeader {
    pub num_values: i32,
    pub encoding: i32,
    pub definition_level_encoding: i32,
    pub repetition_level_encoding: i32,
    pub statistics: Option<Statistics>,
}

impl TSerializable for DataPageHeader {
    fn read_from_in_protocol<T: TInputProtocol>(i_prot: &mut T) -> thrift::Result<Self> {
        let mut h = DataPageHeader::default();
        let mut num_values = None;
        let mut encoding = None;
        read_fields!(i_prot, |id, ty| {
            match id {
                1 => num_values = Some(i_prot.read_i32()?),
                2 => encoding = Some(i_prot.read_i32()?),
                3 => h.definition_level_encoding = i_prot.read_i32()?,
                4 => h.repetition_level_encoding = i_prot.read_i32()?,
                5 => h.statistics = Some(Statistics::read_from_in_protocol(i_prot)?),
                _ => i_prot.skip(ty)?,
            }
        });
        h.num_values = num_values.ok_or_else(|| missing_field("DataPageHeader", "num_values"))?;
        h.encoding = encoding.ok_or_else(|| missing_field("DataPageHeader", "encoding"))?;
        Ok(h)
    }

    fn write_to_out_protocol<T: TOutputProtocol>(&self, o_prot: &mut T) -> thrift::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("DataPageHeader"))?;
        write_i32_field(o_prot, "num_values", 1, self.num_values)?;
        write_i32_field(o_prot, "encoding", 2, self.encoding)?;
        write_i32_field(
            o_prot,
            "definition_level_encoding",
            3,
            self.definition_level_encoding,
        )?;
        write_i32_field(
            o_prot,
            "repetition_level_encoding",
            4,
            self.repetition_level_encoding,
        )?;
        if let Some(v) = &self.statistics {
            write_struct_field(o_prot, "statistics", 5, v)?;
        }
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DictionaryPageHeader {
    pub num_values: i32,
    pub encoding: i32,
    pub is_sorted: Option<bool>,
}

impl TSerializable for DictionaryPageHeader {
    fn read_from_in_protocol<T: TInputProtocol>(i_prot: &mut T) -> thrift::Result<Self> {
        let mut h = DictionaryPageHeader::default();
        let mut num_values = None;
        let mut encoding = None;
        read_fields!(i_prot, |id, ty| {
            match id {
                1 => num_values = Some(i_prot.read_i32()?),
                2 => encoding = Some(i_prot.read_i32()?),
                3 => h.is_sorted = Some(i_prot.read_bool()?),
                _ => i_prot.skip(ty)?,
            }
        });
        h.num_values =
            num_values.ok_or_else(|| missing_field("DictionaryPageHeader", "num_values"))?;
        h.encoding = encoding.ok_or_else(|| missing_field("DictionaryPageHeader", "encoding"))?;
        Ok(h)
    }

    fn write_to_out_protocol<T: TOutputProtocol>(&self, o_prot: &mut T) -> thrift::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("DictionaryPageHeader"))?;
        write_i32_field(o_prot, "num_values", 1, self.num_values)?;
        write_i32_field(o_prot, "encoding", 2, self.encoding)?;
        if let Some(v) = self.is_sorted {
            write_bool_field(o_prot, "is_sorted", 3, v)?;
        }
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataPageHeaderV2 {
    pub num_values: i32,
    pub num_nulls: i32,
    pub num_rows: i32,
    pub encoding: i32,
    pub definition_levels_byte_length: i32,
    pub repetition_levels_byte_length: i32,
    pub is_compressed: Option<bool>,
    pub statistics: Option<Statistics>,
}

impl TSerializable for DataPageHeaderV2 {
    fn read_from_in_protocol<T: TInputProtocol>(i_prot: &mut T) -> thrift::Result<Self> {
        let mut h = DataPageHeaderV2::default();
        read_fields!(i_prot, |id, ty| {
            match id {
                1 => h.num_values = i_prot.read_i32()?,
                2 => h.num_nulls = i_prot.read_i32()?,
                3 => h.num_rows = i_prot.read_i32()?,
                4 => h.encoding = i_prot.read_i32()?,
                5 => h.definition_levels_byte_length = i_prot.read_i32()?,
                6 => h.repetition_levels_byte_length = i_prot.read_i32()?,
                7 => h.is_compressed = Some(i_prot.read_bool()?),
                8 => h.statistics = Some(Statistics::read_from_in_protocol(i_prot)?),
                _ => i_prot.skip(ty)?,
            }
        });
        Ok(h)
    }

    fn write_to_out_protocol<T: TOutputProtocol>(&self, o_prot: &mut T) -> thrift::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("DataPageHeaderV2"))?;
        write_i32_field(o_prot, "num_values", 1, self.num_values)?;
        write_i32_field(o_prot, "num_nulls", 2, self.num_nulls)?;
        write_i32_field(o_prot, "num_rows", 3, self.num_rows)?;
        write_i32_field(o_prot, "encoding", 4, self.encoding)?;
        write_i32_field(
            o_prot,
            "definition_levels_byte_length",
            5,
            self.definition_levels_byte_length,
        )?;
        write_i32_field(
            o_prot,
            "repetition_levels_byte_length",
            6,
            self.repetition_levels_byte_length,
        )?;
        if let Some(v) = self.is_compressed {
            write_bool_field(o_prot, "is_compressed", 7, v)?;
        }
        if let Some(v) = &self.statistics {
            write_struct_field(o_prot, "statistics", 8, v)?;
        }
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageHeader {
    pub type_: i32,
    pub uncompressed_page_size: i32,
    pub compressed_page_size: i32,
    pub crc: Option<i32>,
    pub data_page_header: Option<DataPageHeader>,
    pub dictionary_page_header: Option<DictionaryPageHeader>,
    pub data_page_header_v2: Option<DataPageHeaderV2>,
}

impl TSerializable for PageHeader {
    fn read_from_in_protocol<T: TInputProtocol>(i_prot: &mut T) -> thrift::Result<Self> {
        let mut h = PageHeader::default();
        let mut type_ = None;
        read_fields!(i_prot, |id, ty| {
            match id {
                1 => type_ = Some(i_prot.read_i32()?),
                2 => h.uncompressed_page_size = i_prot.read_i32()?,
                3 => h.compressed_page_size = i_prot.read_i32()?,
                4 => h.crc = Some(i_prot.read_i32()?),
                5 => h.data_page_header = Some(DataPageHeader::read_from_in_protocol(i_prot)?),
                7 => {
                    h.dictionary_page_header =
                        Some(DictionaryPageHeader::read_from_in_protocol(i_prot)?)
                }
                8 => {
                    h.data_page_header_v2 = Some(DataPageHeaderV2::read_from_in_protocol(i_prot)?)
                }
                _ => i_prot.skip(ty)?,
            }
        });
        h.type_ = type_.ok_or_else(|| missing_field("PageHeader", "type"))?;
        Ok(h)
    }

    fn write_to_out_protocol<T: TOutputProtocol>(&self, o_prot: &mut T) -> thrift::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("PageHeader"))?;
        write_i32_field(o_prot, "type", 1, self.type_)?;
        write_i32_field(
            o_prot,
            "uncompressed_page_size",
            2,
            self.uncompressed_page_size,
        )?;
        write_i32_field(o_prot, "compressed_page_size", 3, self.compressed_page_size)?;
        if let Some(v) = self.crc {
            write_i32_field(o_prot, "crc", 4, v)?;
        }
        if let Some(v) = &self.data_page_header {
            write_struct_field(o_prot, "data_page_header", 5, v)?;
        }
        if let Some(v) = &self.dictionary_page_header {
            write_struct_field(o_prot, "dictionary_page_header", 7, v)?;
        }
        if let Some(v) = &self.data_page_header_v2 {
            write_struct_field(o_prot, "data_page_header_v2", 8, v)?;
        }
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thrift_ext::{read_compact, write_compact};

    #[test]
    fn page_header_consumed_bytes() {
        let header = PageHeader {
            type_: 0,
            uncompressed_page_size: 100,
            compressed_page_size: 80,
            crc: None,
            data_page_header: Some(DataPageHeader {
                num_values: 10,
                encoding: 0,
                definition_level_encoding: 3,
                repetition_level_encoding: 3,
                statistics: None,
            }),
            dictionary_page_header: None,
            data_page_header_v2: None,
        };

        let mut buf = Vec::new();
        write_compact(&header, &mut buf).unwrap();
        let header_len = buf.len();
        // Trailing page data shouldn't be consumed.
        buf.extend_from_slice(&[1, 2, 3, 4]);

        let (got, n): (PageHeader, _) = read_compact(&buf).unwrap();
        assert_eq!(header, got);
        assert_eq!(header_len, n);
    }

    #[test]
    fn file_metadata_with_logical_types() {
        let meta = FileMetaData {
            version: 1,
            schema: vec![
                SchemaElement {
                    name: "schema".to_string(),
                    num_children: Some(2),
                    ..Default::default()
                },
                SchemaElement {
                    name: "ts".to_string(),
                    type_: Some(2),
                    repetition_type: Some(1),
                    logical_type: Some(LogicalType::Timestamp {
                        is_adjusted_to_utc: true,
                        unit: TimeUnit::Micros,
                    }),
                    ..Default::default()
                },
                SchemaElement {
                    name: "small".to_string(),
                    type_: Some(1),
                    repetition_type: Some(0),
                    logical_type: Some(LogicalType::Integer {
                        bit_width: 8,
                        is_signed: false,
                    }),
                    ..Default::default()
                },
            ],
            num_rows: 0,
            row_groups: Vec::new(),
            key_value_metadata: Some(vec![KeyValue {
                key: "k".to_string(),
                value: None,
            }]),
            created_by: Some("rivet".to_string()),
        };

        let mut buf = Vec::new();
        write_compact(&meta, &mut buf).unwrap();
        let (got, n): (FileMetaData, _) = read_compact(&buf).unwrap();
        assert_eq!(meta, got);
        assert_eq!(buf.len(), n);
    }

    #[test]
    fn garbage_is_invalid_format() {
        let err = read_compact::<FileMetaData>(&[0xFF, 0xFF, 0xFF]).unwrap_err();
        assert_eq!(rivet_error::ErrorKind::InvalidFormat, err.kind());
    }

    #[test]
    fn missing_required_field() {
        // Struct with only a stop field.
        let err = read_compact::<FileMetaData>(&[0x00]).unwrap_err();
        assert_eq!(rivet_error::ErrorKind::InvalidFormat, err.kind());
    }
}
