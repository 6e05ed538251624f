//! In-memory representation of (possibly nested) record values.
use std::fmt;

use chrono::{DateTime, NaiveTime};

use crate::types::{Int96, TimeUnit};

/// A single value in a record.
///
/// Leaf values carry their logical interpretation (e.g. `Date` instead of the
/// physical `Int32`). Nested values are lists, maps, and structs.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Int96(Int96),
    Float(f32),
    Double(f64),
    Binary(Vec<u8>),
    Utf8(String),
    Decimal {
        value: i128,
        precision: i32,
        scale: i32,
    },
    /// Days since the unix epoch.
    Date(i32),
    /// Time since midnight.
    Time(i64, TimeUnit),
    /// Time since the unix epoch.
    Timestamp(i64, TimeUnit),
    List(Vec<Value>),
    /// Ordered key/value pairs.
    Map(Vec<(Value, Value)>),
    /// Ordered named fields.
    Struct(Vec<(String, Value)>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Build a struct value from name/value pairs.
    pub fn new_struct<S, I>(fields: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = (S, Value)>,
    {
        Value::Struct(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Get a field of a struct value by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Struct(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Short name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Int96(_) => "int96",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Binary(_) => "binary",
            Value::Utf8(_) => "utf8",
            Value::Decimal { .. } => "decimal",
            Value::Date(_) => "date",
            Value::Time(..) => "time",
            Value::Timestamp(..) => "timestamp",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Struct(_) => "struct",
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int64(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Utf8(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Utf8(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Binary(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

fn write_decimal(f: &mut fmt::Formatter<'_>, value: i128, scale: i32) -> fmt::Result {
    if scale <= 0 {
        return write!(f, "{value}");
    }
    let scale = scale as u32;
    let divisor = 10_i128.pow(scale);
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.unsigned_abs();
    let int = abs / divisor as u128;
    let frac = abs % divisor as u128;
    write!(f, "{sign}{int}.{frac:0width$}", width = scale as usize)
}

fn write_timestamp(f: &mut fmt::Formatter<'_>, value: i64, unit: TimeUnit) -> fmt::Result {
    let dt = match unit {
        TimeUnit::Millis => DateTime::from_timestamp_millis(value),
        TimeUnit::Micros => DateTime::from_timestamp_micros(value),
        TimeUnit::Nanos => Some(DateTime::from_timestamp_nanos(value)),
    };
    match dt {
        Some(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.f")),
        None => write!(f, "{value}"),
    }
}

fn write_time(f: &mut fmt::Formatter<'_>, value: i64, unit: TimeUnit) -> fmt::Result {
    let per_sec = unit.per_second();
    let secs = value.div_euclid(per_sec);
    let nanos = value.rem_euclid(per_sec) * (1_000_000_000 / per_sec);
    match NaiveTime::from_num_seconds_from_midnight_opt(secs as u32, nanos as u32) {
        Some(t) if secs >= 0 && secs < 86_400 => write!(f, "{}", t.format("%H:%M:%S%.f")),
        _ => write!(f, "{value}"),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Int96(v) => write_timestamp(f, v.to_nanos(), TimeUnit::Nanos),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Binary(v) => {
                write!(f, "0x")?;
                for b in v {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
            Value::Utf8(v) => write!(f, "{v}"),
            Value::Decimal { value, scale, .. } => write_decimal(f, *value, *scale),
            Value::Date(days) => {
                match DateTime::from_timestamp(*days as i64 * 86_400, 0) {
                    Some(dt) => write!(f, "{}", dt.format("%Y-%m-%d")),
                    None => write!(f, "{days}"),
                }
            }
            Value::Time(v, unit) => write_time(f, *v, *unit),
            Value::Timestamp(v, unit) => write_timestamp(f, *v, *unit),
            Value::List(items) => {
                write!(f, "[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (idx, (k, v)) in entries.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::Struct(fields) => {
                write!(f, "{{")?;
                for (idx, (name, v)) in fields.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_scalars() {
        assert_eq!("NULL", Value::Null.to_string());
        assert_eq!("0x00ff", Value::Binary(vec![0, 255]).to_string());
        assert_eq!("1970-01-02", Value::Date(1).to_string());
        assert_eq!(
            "2023-11-14 22:13:20.123",
            Value::Timestamp(1_700_000_000_123, TimeUnit::Millis).to_string()
        );
        assert_eq!(
            "01:00:00.000500",
            Value::Time(3_600_000_500, TimeUnit::Micros).to_string()
        );
    }

    #[test]
    fn display_decimal() {
        let v = |value, scale| Value::Decimal {
            value,
            precision: 10,
            scale,
        };
        assert_eq!("123.45", v(12345, 2).to_string());
        assert_eq!("-0.05", v(-5, 2).to_string());
        assert_eq!("7", v(7, 0).to_string());
    }

    #[test]
    fn display_nested() {
        let v = Value::new_struct([
            ("a", Value::List(vec![1.into(), Value::Null])),
            ("b", Value::Map(vec![("k".into(), 2_i64.into())])),
        ]);
        assert_eq!("{a: [1, NULL], b: {k: 2}}", v.to_string());
    }

    #[test]
    fn conversions() {
        assert_eq!(Value::Null, Value::from(None::<i32>));
        assert_eq!(Value::Binary(vec![1, 2]), Value::from(vec![1_u8, 2]));
        assert_eq!(Value::Int32(1), Value::from(Some(1)));
        let s = Value::new_struct([("x", Value::Int32(3))]);
        assert_eq!(Some(&Value::Int32(3)), s.field("x"));
        assert_eq!(None, s.field("y"));
    }
}
