//! Page compression.
use std::fmt;
use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use rivet_error::{Result, ResultExt, RivetError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompressionCodec {
    #[default]
    Uncompressed,
    Snappy,
    Gzip,
    Lzo,
    Brotli,
    Lz4,
    Zstd,
    Lz4Raw,
}

impl CompressionCodec {
    pub fn try_from_thrift(code: i32) -> Result<Self> {
        Ok(match code {
            0 => Self::Uncompressed,
            1 => Self::Snappy,
            2 => Self::Gzip,
            3 => Self::Lzo,
            4 => Self::Brotli,
            5 => Self::Lz4,
            6 => Self::Zstd,
            7 => Self::Lz4Raw,
            other => {
                return Err(RivetError::unsupported_compression(format!(
                    "Unknown compression codec: {other}"
                )))
            }
        })
    }

    pub fn thrift_code(&self) -> i32 {
        match self {
            Self::Uncompressed => 0,
            Self::Snappy => 1,
            Self::Gzip => 2,
            Self::Lzo => 3,
            Self::Brotli => 4,
            Self::Lz4 => 5,
            Self::Zstd => 6,
            Self::Lz4Raw => 7,
        }
    }

    /// Get the codec for compressing/decompressing pages.
    ///
    /// `gzip_level` is only used for gzip. Errors for codecs we don't have an
    /// implementation for.
    pub fn codec(&self, gzip_level: u32) -> Result<Codec> {
        match self {
            Self::Uncompressed => Ok(Codec::Uncompressed),
            Self::Snappy => Ok(Codec::Snappy),
            Self::Gzip => {
                if gzip_level > 9 {
                    return Err(RivetError::out_of_range(format!(
                        "Gzip compression level must be between 0 and 9, got {gzip_level}"
                    )));
                }
                Ok(Codec::Gzip { level: gzip_level })
            }
            other => Err(RivetError::unsupported_compression(format!(
                "Compression codec {other} is not supported"
            ))),
        }
    }
}

impl fmt::Display for CompressionCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Uncompressed => "UNCOMPRESSED",
            Self::Snappy => "SNAPPY",
            Self::Gzip => "GZIP",
            Self::Lzo => "LZO",
            Self::Brotli => "BROTLI",
            Self::Lz4 => "LZ4",
            Self::Zstd => "ZSTD",
            Self::Lz4Raw => "LZ4_RAW",
        };
        write!(f, "{s}")
    }
}

/// A compression implementation for a supported codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Uncompressed,
    Snappy,
    Gzip { level: u32 },
}

impl Codec {
    pub fn compression(&self) -> CompressionCodec {
        match self {
            Self::Uncompressed => CompressionCodec::Uncompressed,
            Self::Snappy => CompressionCodec::Snappy,
            Self::Gzip { .. } => CompressionCodec::Gzip,
        }
    }

    pub fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Uncompressed => Ok(input.to_vec()),
            Self::Snappy => snap::raw::Encoder::new()
                .compress_vec(input)
                .context("Failed to snappy compress page"),
            Self::Gzip { level } => {
                let mut enc = GzEncoder::new(Vec::new(), Compression::new(*level));
                enc.write_all(input)
                    .context("Failed to gzip compress page")?;
                enc.finish().context("Failed to gzip compress page")
            }
        }
    }

    /// Decompress a page.
    ///
    /// `uncompressed_size` is the size from the page header and is used to
    /// size the output buffer and sanity check the result.
    pub fn decompress(&self, input: &[u8], uncompressed_size: usize) -> Result<Vec<u8>> {
        let out = match self {
            Self::Uncompressed => input.to_vec(),
            Self::Snappy => {
                let mut out = vec![0; uncompressed_size];
                let n = snap::raw::Decoder::new()
                    .decompress(input, &mut out)
                    .context("Failed to snappy decompress page")
                    .map_err(|e| e.into_kind(rivet_error::ErrorKind::InvalidFormat))?;
                out.truncate(n);
                out
            }
            Self::Gzip { .. } => {
                let mut out = Vec::with_capacity(uncompressed_size);
                GzDecoder::new(input)
                    .read_to_end(&mut out)
                    .context("Failed to gzip decompress page")
                    .map_err(|e| e.into_kind(rivet_error::ErrorKind::InvalidFormat))?;
                out
            }
        };

        if out.len() != uncompressed_size {
            return Err(RivetError::invalid_format(format!(
                "Decompressed page size {} does not match expected size {uncompressed_size}",
                out.len()
            )));
        }

        Ok(out)
    }
}
