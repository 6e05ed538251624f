//! PLAIN encoding of physical values.
//!
//! Booleans are bit-packed LSB first, fixed width types are stored little
//! endian, and byte arrays are prefixed with a 4 byte length.
use rivet_error::{Result, RivetError};

use crate::binary::{BinaryReader, BinaryWriter};
use crate::types::PhysicalType;
use crate::value::Value;

/// Decode `count` plain values of the given physical type.
pub fn decode_plain(
    reader: &mut BinaryReader,
    physical: PhysicalType,
    count: usize,
    out: &mut Vec<Value>,
) -> Result<()> {
    out.reserve(count);
    match physical {
        PhysicalType::Boolean => {
            for _ in 0..count {
                out.push(Value::Boolean(reader.read_bool()?));
            }
        }
        PhysicalType::Int32 => {
            for _ in 0..count {
                out.push(Value::Int32(reader.read_i32()?));
            }
        }
        PhysicalType::Int64 => {
            for _ in 0..count {
                out.push(Value::Int64(reader.read_i64()?));
            }
        }
        PhysicalType::Int96 => {
            for _ in 0..count {
                out.push(Value::Int96(reader.read_i96()?));
            }
        }
        PhysicalType::Float => {
            for _ in 0..count {
                out.push(Value::Float(reader.read_f32()?));
            }
        }
        PhysicalType::Double => {
            for _ in 0..count {
                out.push(Value::Double(reader.read_f64()?));
            }
        }
        PhysicalType::ByteArray => {
            for _ in 0..count {
                out.push(Value::Binary(reader.read_byte_array()?.to_vec()));
            }
        }
        PhysicalType::FixedLenByteArray(len) => {
            for _ in 0..count {
                out.push(Value::Binary(reader.read_bytes(len)?.to_vec()));
            }
        }
    }

    Ok(())
}

/// Plain encode a single physical value.
///
/// The value must already be the variant matching the physical type.
pub fn encode_plain(
    writer: &mut BinaryWriter,
    physical: PhysicalType,
    value: &Value,
) -> Result<()> {
    match (physical, value) {
        (PhysicalType::Boolean, Value::Boolean(v)) => writer.write_bool(*v),
        (PhysicalType::Int32, Value::Int32(v)) => writer.write_i32(*v),
        (PhysicalType::Int64, Value::Int64(v)) => writer.write_i64(*v),
        (PhysicalType::Int96, Value::Int96(v)) => writer.write_i96(*v),
        (PhysicalType::Float, Value::Float(v)) => writer.write_f32(*v),
        (PhysicalType::Double, Value::Double(v)) => writer.write_f64(*v),
        (PhysicalType::ByteArray, Value::Binary(v)) => writer.write_byte_array(v)?,
        (PhysicalType::FixedLenByteArray(len), Value::Binary(v)) => {
            if v.len() != len {
                return Err(RivetError::schema_violation(format!(
                    "Expected {len} bytes for fixed length byte array, got {}",
                    v.len()
                )));
            }
            writer.write_bytes(v)
        }
        (physical, value) => {
            return Err(RivetError::schema_violation(format!(
                "Cannot plain encode {} value as {physical}",
                value.type_name()
            )))
        }
    }

    Ok(())
}

/// Plain encode a single value into its own buffer.
///
/// Used for dictionary keys and statistics.
pub fn plain_bytes(physical: PhysicalType, value: &Value) -> Result<Vec<u8>> {
    let mut writer = BinaryWriter::new();
    encode_plain(&mut writer, physical, value)?;
    Ok(writer.into_inner())
}

/// Decode a single plain encoded value.
///
/// Byte arrays in statistics are stored without the length prefix, so for
/// `ByteArray` the whole buffer is the value.
pub fn decode_plain_single(physical: PhysicalType, buf: &[u8]) -> Result<Value> {
    if physical == PhysicalType::ByteArray {
        return Ok(Value::Binary(buf.to_vec()));
    }
    let mut reader = BinaryReader::new(buf);
    let mut out = Vec::with_capacity(1);
    decode_plain(&mut reader, physical, 1, &mut out)?;
    out.pop()
        .ok_or_else(|| RivetError::invalid_format("Missing plain encoded value"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Int96;

    #[test]
    fn booleans_are_bit_packed() {
        let mut w = BinaryWriter::new();
        for v in [true, false, true, true, false, false, false, false, true] {
            encode_plain(&mut w, PhysicalType::Boolean, &Value::Boolean(v)).unwrap();
        }
        let buf = w.into_inner();
        assert_eq!(vec![0b0000_1101, 0b0000_0001], buf);

        let mut r = BinaryReader::new(&buf);
        let mut out = Vec::new();
        decode_plain(&mut r, PhysicalType::Boolean, 3, &mut out).unwrap();
        assert_eq!(
            vec![Value::Boolean(true), Value::Boolean(false), Value::Boolean(true)],
            out
        );
    }

    #[test]
    fn mixed_types() {
        let cases = [
            (PhysicalType::Int32, Value::Int32(-7)),
            (PhysicalType::Int64, Value::Int64(1 << 50)),
            (PhysicalType::Int96, Value::Int96(Int96([1, 2, 3]))),
            (PhysicalType::Float, Value::Float(0.5)),
            (PhysicalType::Double, Value::Double(1e100)),
            (PhysicalType::ByteArray, Value::Binary(b"abc".to_vec())),
            (
                PhysicalType::FixedLenByteArray(2),
                Value::Binary(vec![9, 8]),
            ),
        ];

        for (physical, value) in cases {
            let buf = plain_bytes(physical, &value).unwrap();
            let mut r = BinaryReader::new(&buf);
            let mut out = Vec::new();
            decode_plain(&mut r, physical, 1, &mut out).unwrap();
            assert_eq!(vec![value], out);
            assert_eq!(0, r.remaining_bytes());
        }
    }

    #[test]
    fn byte_array_has_length_prefix() {
        let buf = plain_bytes(PhysicalType::ByteArray, &Value::Binary(b"hi".to_vec())).unwrap();
        assert_eq!(vec![2, 0, 0, 0, b'h', b'i'], buf);
    }

    #[test]
    fn mismatched_value() {
        let err = plain_bytes(PhysicalType::Int32, &Value::Utf8("x".to_string())).unwrap_err();
        assert_eq!(rivet_error::ErrorKind::SchemaViolation, err.kind());

        let err =
            plain_bytes(PhysicalType::FixedLenByteArray(4), &Value::Binary(vec![1])).unwrap_err();
        assert_eq!(rivet_error::ErrorKind::SchemaViolation, err.kind());
    }

    #[test]
    fn truncated_input() {
        let buf = [5, 0, 0, 0, b'a'];
        let mut r = BinaryReader::new(&buf);
        let mut out = Vec::new();
        let err = decode_plain(&mut r, PhysicalType::ByteArray, 1, &mut out).unwrap_err();
        assert_eq!(rivet_error::ErrorKind::InvalidFormat, err.kind());
    }
}
