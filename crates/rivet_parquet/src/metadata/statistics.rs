//! Column chunk statistics.
use rivet_error::Result;

use crate::encoding::plain::decode_plain_single;
use crate::format;
use crate::types::PhysicalType;
use crate::value::Value;

/// Statistics for a column chunk.
///
/// Min and max are stored plain encoded (without a length prefix for byte
/// arrays).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Statistics {
    pub min: Option<Vec<u8>>,
    pub max: Option<Vec<u8>>,
    pub null_count: Option<i64>,
    pub distinct_count: Option<i64>,
}

impl Statistics {
    /// Prefers `min_value`/`max_value`, falling back to the deprecated
    /// `min`/`max` fields.
    pub fn from_thrift(stats: format::Statistics) -> Self {
        Statistics {
            min: stats.min_value.or(stats.min),
            max: stats.max_value.or(stats.max),
            null_count: stats.null_count,
            distinct_count: stats.distinct_count,
        }
    }

    pub fn to_thrift(&self) -> format::Statistics {
        format::Statistics {
            max: None,
            min: None,
            null_count: self.null_count,
            distinct_count: self.distinct_count,
            max_value: self.max.clone(),
            min_value: self.min.clone(),
        }
    }

    /// Decode the min value as a physical value.
    pub fn min_value(&self, physical: PhysicalType) -> Result<Option<Value>> {
        self.min
            .as_deref()
            .map(|b| decode_plain_single(physical, b))
            .transpose()
    }

    /// Decode the max value as a physical value.
    pub fn max_value(&self, physical: PhysicalType) -> Result<Option<Value>> {
        self.max
            .as_deref()
            .map(|b| decode_plain_single(physical, b))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_new_fields() {
        let stats = Statistics::from_thrift(format::Statistics {
            max: Some(vec![9, 0, 0, 0]),
            min: Some(vec![1, 0, 0, 0]),
            null_count: Some(2),
            distinct_count: None,
            max_value: Some(vec![8, 0, 0, 0]),
            min_value: None,
        });
        assert_eq!(
            Some(Value::Int32(8)),
            stats.max_value(PhysicalType::Int32).unwrap()
        );
        assert_eq!(
            Some(Value::Int32(1)),
            stats.min_value(PhysicalType::Int32).unwrap()
        );
        assert_eq!(Some(2), stats.null_count);
    }

    #[test]
    fn byte_array_without_prefix() {
        let stats = Statistics {
            min: Some(b"abc".to_vec()),
            ..Default::default()
        };
        assert_eq!(
            Some(Value::Binary(b"abc".to_vec())),
            stats.min_value(PhysicalType::ByteArray).unwrap()
        );
        assert_eq!(None, stats.max_value(PhysicalType::ByteArray).unwrap());
    }
}
