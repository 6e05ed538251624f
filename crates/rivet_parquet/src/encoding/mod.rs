//! Implementations for parquet encoding/decoding schemes.
//!
//! See: <https://parquet.apache.org/docs/file-format/data-pages/encodings>

pub mod bitpack;
pub mod plain;
pub mod rle_bp;
pub mod uleb128;

use std::fmt;

use rivet_error::{Result, RivetError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    Plain,
    PlainDictionary,
    Rle,
    BitPacked,
    DeltaBinaryPacked,
    DeltaLengthByteArray,
    DeltaByteArray,
    RleDictionary,
    ByteStreamSplit,
}

impl Encoding {
    pub fn try_from_thrift(code: i32) -> Result<Self> {
        Ok(match code {
            0 => Self::Plain,
            2 => Self::PlainDictionary,
            3 => Self::Rle,
            4 => Self::BitPacked,
            5 => Self::DeltaBinaryPacked,
            6 => Self::DeltaLengthByteArray,
            7 => Self::DeltaByteArray,
            8 => Self::RleDictionary,
            9 => Self::ByteStreamSplit,
            other => {
                return Err(RivetError::unsupported_encoding(format!(
                    "Unknown encoding: {other}"
                )))
            }
        })
    }

    pub fn thrift_code(&self) -> i32 {
        match self {
            Self::Plain => 0,
            Self::PlainDictionary => 2,
            Self::Rle => 3,
            Self::BitPacked => 4,
            Self::DeltaBinaryPacked => 5,
            Self::DeltaLengthByteArray => 6,
            Self::DeltaByteArray => 7,
            Self::RleDictionary => 8,
            Self::ByteStreamSplit => 9,
        }
    }

    pub fn is_dictionary(&self) -> bool {
        matches!(self, Self::PlainDictionary | Self::RleDictionary)
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Plain => "PLAIN",
            Self::PlainDictionary => "PLAIN_DICTIONARY",
            Self::Rle => "RLE",
            Self::BitPacked => "BIT_PACKED",
            Self::DeltaBinaryPacked => "DELTA_BINARY_PACKED",
            Self::DeltaLengthByteArray => "DELTA_LENGTH_BYTE_ARRAY",
            Self::DeltaByteArray => "DELTA_BYTE_ARRAY",
            Self::RleDictionary => "RLE_DICTIONARY",
            Self::ByteStreamSplit => "BYTE_STREAM_SPLIT",
        };
        write!(f, "{s}")
    }
}

/// Number of bits required to store values up to and including `max`.
pub fn bit_width(max: u64) -> u8 {
    (64 - max.leading_zeros()) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_width_for_levels() {
        assert_eq!(0, bit_width(0));
        assert_eq!(1, bit_width(1));
        assert_eq!(2, bit_width(2));
        assert_eq!(2, bit_width(3));
        assert_eq!(3, bit_width(4));
        assert_eq!(17, bit_width((1 << 17) - 1));
    }

    #[test]
    fn unknown_encoding_code() {
        let err = Encoding::try_from_thrift(1).unwrap_err();
        assert_eq!(rivet_error::ErrorKind::UnsupportedEncoding, err.kind());
    }
}
