use std::fmt;

use rivet_error::{Result, RivetError};

/// Physical types representable in parquet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhysicalType {
    Boolean,
    Int32,
    Int64,
    Int96,
    Float,
    Double,
    ByteArray,
    /// Fixed length byte array with the given length in bytes.
    FixedLenByteArray(usize),
}

impl PhysicalType {
    /// Create from the thrift type code and (optional) declared type length.
    pub fn try_from_thrift(code: i32, type_length: Option<i32>) -> Result<Self> {
        Ok(match code {
            0 => Self::Boolean,
            1 => Self::Int32,
            2 => Self::Int64,
            3 => Self::Int96,
            4 => Self::Float,
            5 => Self::Double,
            6 => Self::ByteArray,
            7 => {
                let len = type_length.unwrap_or(-1);
                if len < 0 {
                    return Err(RivetError::invalid_format(format!(
                        "Invalid type length for fixed length byte array: {len}"
                    )));
                }
                Self::FixedLenByteArray(len as usize)
            }
            other => {
                return Err(RivetError::invalid_format(format!(
                    "Unknown physical type: {other}"
                )))
            }
        })
    }

    pub fn thrift_code(&self) -> i32 {
        match self {
            Self::Boolean => 0,
            Self::Int32 => 1,
            Self::Int64 => 2,
            Self::Int96 => 3,
            Self::Float => 4,
            Self::Double => 5,
            Self::ByteArray => 6,
            Self::FixedLenByteArray(_) => 7,
        }
    }

    pub fn type_length(&self) -> Option<usize> {
        match self {
            Self::FixedLenByteArray(len) => Some(*len),
            _ => None,
        }
    }
}

impl fmt::Display for PhysicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean => write!(f, "boolean"),
            Self::Int32 => write!(f, "int32"),
            Self::Int64 => write!(f, "int64"),
            Self::Int96 => write!(f, "int96"),
            Self::Float => write!(f, "float"),
            Self::Double => write!(f, "double"),
            Self::ByteArray => write!(f, "binary"),
            Self::FixedLenByteArray(len) => write!(f, "fixed_len_byte_array({len})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Repetition {
    Required,
    Optional,
    Repeated,
}

impl Repetition {
    pub fn try_from_thrift(code: i32) -> Result<Self> {
        Ok(match code {
            0 => Self::Required,
            1 => Self::Optional,
            2 => Self::Repeated,
            other => {
                return Err(RivetError::invalid_format(format!(
                    "Unknown repetition type: {other}"
                )))
            }
        })
    }

    pub fn thrift_code(&self) -> i32 {
        match self {
            Self::Required => 0,
            Self::Optional => 1,
            Self::Repeated => 2,
        }
    }
}

impl fmt::Display for Repetition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => write!(f, "required"),
            Self::Optional => write!(f, "optional"),
            Self::Repeated => write!(f, "repeated"),
        }
    }
}

/// Parquet converted type, deprecated.
///
/// Only used to interpret files that carry no logical type, and written
/// alongside logical types for older readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertedType {
    Utf8,
    Map,
    MapKeyValue,
    List,
    Enum,
    Decimal,
    Date,
    TimeMillis,
    TimeMicros,
    TimestampMillis,
    TimestampMicros,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Int8,
    Int16,
    Int32,
    Int64,
    Json,
    Bson,
    Interval,
}

impl ConvertedType {
    pub fn try_from_thrift(code: i32) -> Result<Self> {
        Ok(match code {
            0 => Self::Utf8,
            1 => Self::Map,
            2 => Self::MapKeyValue,
            3 => Self::List,
            4 => Self::Enum,
            5 => Self::Decimal,
            6 => Self::Date,
            7 => Self::TimeMillis,
            8 => Self::TimeMicros,
            9 => Self::TimestampMillis,
            10 => Self::TimestampMicros,
            11 => Self::Uint8,
            12 => Self::Uint16,
            13 => Self::Uint32,
            14 => Self::Uint64,
            15 => Self::Int8,
            16 => Self::Int16,
            17 => Self::Int32,
            18 => Self::Int64,
            19 => Self::Json,
            20 => Self::Bson,
            21 => Self::Interval,
            other => {
                return Err(RivetError::invalid_format(format!(
                    "Unknown converted type: {other}"
                )))
            }
        })
    }

    pub fn thrift_code(&self) -> i32 {
        match self {
            Self::Utf8 => 0,
            Self::Map => 1,
            Self::MapKeyValue => 2,
            Self::List => 3,
            Self::Enum => 4,
            Self::Decimal => 5,
            Self::Date => 6,
            Self::TimeMillis => 7,
            Self::TimeMicros => 8,
            Self::TimestampMillis => 9,
            Self::TimestampMicros => 10,
            Self::Uint8 => 11,
            Self::Uint16 => 12,
            Self::Uint32 => 13,
            Self::Uint64 => 14,
            Self::Int8 => 15,
            Self::Int16 => 16,
            Self::Int32 => 17,
            Self::Int64 => 18,
            Self::Json => 19,
            Self::Bson => 20,
            Self::Interval => 21,
        }
    }

    /// Get the logical type equivalent to this converted type.
    ///
    /// Returns None for converted types without an equivalent (INTERVAL).
    pub fn to_logical(&self, precision: Option<i32>, scale: Option<i32>) -> Option<LogicalType> {
        Some(match self {
            Self::Utf8 => LogicalType::String,
            Self::Map | Self::MapKeyValue => LogicalType::Map,
            Self::List => LogicalType::List,
            Self::Enum => LogicalType::Enum,
            Self::Decimal => LogicalType::Decimal {
                precision: precision.unwrap_or(0),
                scale: scale.unwrap_or(0),
            },
            Self::Date => LogicalType::Date,
            Self::TimeMillis => LogicalType::Time {
                is_adjusted_to_utc: true,
                unit: TimeUnit::Millis,
            },
            Self::TimeMicros => LogicalType::Time {
                is_adjusted_to_utc: true,
                unit: TimeUnit::Micros,
            },
            Self::TimestampMillis => LogicalType::Timestamp {
                is_adjusted_to_utc: true,
                unit: TimeUnit::Millis,
            },
            Self::TimestampMicros => LogicalType::Timestamp {
                is_adjusted_to_utc: true,
                unit: TimeUnit::Micros,
            },
            Self::Uint8 => LogicalType::Integer {
                bit_width: 8,
                is_signed: false,
            },
            Self::Uint16 => LogicalType::Integer {
                bit_width: 16,
                is_signed: false,
            },
            Self::Uint32 => LogicalType::Integer {
                bit_width: 32,
                is_signed: false,
            },
            Self::Uint64 => LogicalType::Integer {
                bit_width: 64,
                is_signed: false,
            },
            Self::Int8 => LogicalType::Integer {
                bit_width: 8,
                is_signed: true,
            },
            Self::Int16 => LogicalType::Integer {
                bit_width: 16,
                is_signed: true,
            },
            Self::Int32 => LogicalType::Integer {
                bit_width: 32,
                is_signed: true,
            },
            Self::Int64 => LogicalType::Integer {
                bit_width: 64,
                is_signed: true,
            },
            Self::Json => LogicalType::Json,
            Self::Bson => LogicalType::Bson,
            Self::Interval => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Millis,
    Micros,
    Nanos,
}

impl TimeUnit {
    /// Number of units in one second.
    pub const fn per_second(&self) -> i64 {
        match self {
            Self::Millis => 1_000,
            Self::Micros => 1_000_000,
            Self::Nanos => 1_000_000_000,
        }
    }

    /// Convert a value in this unit to `other`, truncating when going to a
    /// coarser unit.
    pub fn convert(&self, value: i64, other: TimeUnit) -> i64 {
        let (from, to) = (self.per_second(), other.per_second());
        if from == to {
            value
        } else if from < to {
            value.saturating_mul(to / from)
        } else {
            value / (from / to)
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Millis => write!(f, "MILLIS"),
            Self::Micros => write!(f, "MICROS"),
            Self::Nanos => write!(f, "NANOS"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
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
}

impl LogicalType {
    /// Get the converted type to write alongside this logical type.
    pub fn to_converted(&self) -> Option<ConvertedType> {
        Some(match self {
            Self::String => ConvertedType::Utf8,
            Self::Map => ConvertedType::Map,
            Self::List => ConvertedType::List,
            Self::Enum => ConvertedType::Enum,
            Self::Decimal { .. } => ConvertedType::Decimal,
            Self::Date => ConvertedType::Date,
            Self::Time { unit, .. } => match unit {
                TimeUnit::Millis => ConvertedType::TimeMillis,
                TimeUnit::Micros => ConvertedType::TimeMicros,
                TimeUnit::Nanos => return None,
            },
            Self::Timestamp { unit, .. } => match unit {
                TimeUnit::Millis => ConvertedType::TimestampMillis,
                TimeUnit::Micros => ConvertedType::TimestampMicros,
                TimeUnit::Nanos => return None,
            },
            Self::Integer {
                bit_width,
                is_signed,
            } => match (bit_width, is_signed) {
                (8, true) => ConvertedType::Int8,
                (16, true) => ConvertedType::Int16,
                (32, true) => ConvertedType::Int32,
                (64, true) => ConvertedType::Int64,
                (8, false) => ConvertedType::Uint8,
                (16, false) => ConvertedType::Uint16,
                (32, false) => ConvertedType::Uint32,
                (64, false) => ConvertedType::Uint64,
                _ => return None,
            },
            Self::Json => ConvertedType::Json,
            Self::Bson => ConvertedType::Bson,
            Self::Unknown | Self::Uuid | Self::Float16 => return None,
        })
    }

    /// Check that the logical type can annotate the given physical type.
    pub fn validate_physical(&self, physical: PhysicalType) -> Result<()> {
        let ok = match self {
            Self::String | Self::Enum | Self::Json | Self::Bson => {
                physical == PhysicalType::ByteArray
            }
            Self::Map | Self::List => false,
            Self::Decimal { precision, scale } => {
                if *precision < 1 || *scale < 0 || scale > precision {
                    return Err(RivetError::schema_violation(format!(
                        "Invalid decimal precision/scale: ({precision}, {scale})"
                    )));
                }
                match physical {
                    PhysicalType::Int32 => *precision <= 9,
                    PhysicalType::Int64 => *precision <= 18,
                    PhysicalType::ByteArray => true,
                    PhysicalType::FixedLenByteArray(len) => {
                        decimal_max_precision(len) >= *precision as usize
                    }
                    _ => false,
                }
            }
            Self::Date => physical == PhysicalType::Int32,
            Self::Time { unit, .. } => match unit {
                TimeUnit::Millis => physical == PhysicalType::Int32,
                _ => physical == PhysicalType::Int64,
            },
            Self::Timestamp { .. } => physical == PhysicalType::Int64,
            Self::Integer { bit_width, .. } => match bit_width {
                8 | 16 | 32 => physical == PhysicalType::Int32,
                64 => physical == PhysicalType::Int64,
                _ => false,
            },
            Self::Unknown => true,
            Self::Uuid => physical == PhysicalType::FixedLenByteArray(16),
            Self::Float16 => physical == PhysicalType::FixedLenByteArray(2),
        };

        if !ok {
            return Err(RivetError::schema_violation(format!(
                "Logical type {self} cannot annotate physical type {physical}"
            )));
        }

        Ok(())
    }
}

/// Max number of decimal digits that can be stored in `len` bytes.
pub fn decimal_max_precision(len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    // floor(log10(2^(8*len - 1) - 1))
    let bits = (8 * len - 1) as f64;
    (bits * std::f64::consts::LN_2 / std::f64::consts::LN_10).floor() as usize
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "STRING"),
            Self::Map => write!(f, "MAP"),
            Self::List => write!(f, "LIST"),
            Self::Enum => write!(f, "ENUM"),
            Self::Decimal { scale, precision } => write!(f, "DECIMAL({precision},{scale})"),
            Self::Date => write!(f, "DATE"),
            Self::Time {
                is_adjusted_to_utc,
                unit,
            } => write!(f, "TIME({unit},{is_adjusted_to_utc})"),
            Self::Timestamp {
                is_adjusted_to_utc,
                unit,
            } => write!(f, "TIMESTAMP({unit},{is_adjusted_to_utc})"),
            Self::Integer {
                bit_width,
                is_signed,
            } => write!(f, "INTEGER({bit_width},{is_signed})"),
            Self::Unknown => write!(f, "UNKNOWN"),
            Self::Json => write!(f, "JSON"),
            Self::Bson => write!(f, "BSON"),
            Self::Uuid => write!(f, "UUID"),
            Self::Float16 => write!(f, "FLOAT16"),
        }
    }
}

/// Julian day of the unix epoch.
const JULIAN_DAY_OF_EPOCH: i64 = 2_440_588;
const NANOS_PER_DAY: i64 = 86_400 * 1_000_000_000;

/// Parquet Int96 type. Deprecated.
///
/// Stored as nanoseconds within the day in the first 8 bytes and the julian
/// day in the last 4 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Int96(pub [u32; 3]);

impl Int96 {
    pub fn from_le_bytes(bytes: [u8; 12]) -> Self {
        let mut parts = [0; 3];
        for (idx, part) in parts.iter_mut().enumerate() {
            let start = idx * 4;
            *part = u32::from_le_bytes([
                bytes[start],
                bytes[start + 1],
                bytes[start + 2],
                bytes[start + 3],
            ]);
        }
        Int96(parts)
    }

    pub fn to_le_bytes(&self) -> [u8; 12] {
        let mut buf = [0; 12];
        buf[0..4].copy_from_slice(&u32::to_le_bytes(self.0[0]));
        buf[4..8].copy_from_slice(&u32::to_le_bytes(self.0[1]));
        buf[8..12].copy_from_slice(&u32::to_le_bytes(self.0[2]));
        buf
    }

    /// Nanoseconds since the unix epoch.
    pub fn to_nanos(&self) -> i64 {
        let nanos_of_day = ((self.0[1] as u64) << 32 | self.0[0] as u64) as i64;
        let day = self.0[2] as i64;
        (day - JULIAN_DAY_OF_EPOCH)
            .wrapping_mul(NANOS_PER_DAY)
            .wrapping_add(nanos_of_day)
    }

    pub fn from_nanos(nanos: i64) -> Self {
        let day = nanos.div_euclid(NANOS_PER_DAY) + JULIAN_DAY_OF_EPOCH;
        let nanos_of_day = nanos.rem_euclid(NANOS_PER_DAY) as u64;
        Int96([nanos_of_day as u32, (nanos_of_day >> 32) as u32, day as u32])
    }
}
