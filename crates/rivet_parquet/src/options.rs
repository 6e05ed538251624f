//! Reader and writer configuration.
//!
//! Options are immutable once built. Writer options are validated when built.
use rivet_error::{Result, RivetError};

use crate::compression::{Codec, CompressionCodec};

pub const DEFAULT_PAGE_SIZE: usize = 1024 * 1024;
pub const DEFAULT_ROW_GROUP_SIZE: usize = 128 * 1024 * 1024;
pub const DEFAULT_ROW_GROUP_CHECK_INTERVAL: usize = 100;
pub const DEFAULT_DICTIONARY_PAGE_SIZE_LIMIT: usize = DEFAULT_PAGE_SIZE;
pub const DEFAULT_DICTIONARY_RATIO_THRESHOLD: f64 = 0.67;
pub const DEFAULT_GZIP_LEVEL: u32 = 6;
pub const DEFAULT_CREATED_BY: &str = concat!("rivet version ", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReaderOptions {
    /// Read BYTE_ARRAY columns without a logical type as utf8 strings.
    pub byte_array_as_string: bool,
    /// Read INT96 columns as nanosecond timestamps.
    pub int96_as_timestamp: bool,
    /// Round nanosecond timestamps to microseconds.
    pub round_nanoseconds: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriterVersion {
    /// Writes DATA_PAGE pages.
    #[default]
    V1,
    /// Writes DATA_PAGE_V2 pages.
    V2,
}

impl WriterVersion {
    /// Version number written to the file footer.
    pub fn as_num(&self) -> i32 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
        }
    }

    pub fn try_from_num(num: i32) -> Result<Self> {
        match num {
            1 => Ok(Self::V1),
            2 => Ok(Self::V2),
            other => Err(RivetError::out_of_range(format!(
                "Writer version must be 1 or 2, got {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriterOptions {
    pub compression: CompressionCodec,
    pub gzip_level: u32,
    /// Target size of a data page in bytes.
    pub page_size: usize,
    /// Target size of a row group in bytes.
    pub row_group_size: usize,
    /// Number of rows between row group size checks.
    pub row_group_check_interval: usize,
    /// Max size of a dictionary page. Columns with larger dictionaries fall
    /// back to plain encoding.
    pub dictionary_page_size_limit: usize,
    /// Dictionary encode a column when distinct/total values is at or below
    /// this ratio.
    pub dictionary_ratio_threshold: f64,
    pub dictionary_enabled: bool,
    pub writer_version: WriterVersion,
    pub created_by: String,
    /// Validate values against the schema when writing.
    pub validate: bool,
    pub key_value_metadata: Vec<(String, Option<String>)>,
}

impl Default for WriterOptions {
    fn default() -> Self {
        WriterOptions {
            compression: CompressionCodec::Uncompressed,
            gzip_level: DEFAULT_GZIP_LEVEL,
            page_size: DEFAULT_PAGE_SIZE,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
            row_group_check_interval: DEFAULT_ROW_GROUP_CHECK_INTERVAL,
            dictionary_page_size_limit: DEFAULT_DICTIONARY_PAGE_SIZE_LIMIT,
            dictionary_ratio_threshold: DEFAULT_DICTIONARY_RATIO_THRESHOLD,
            dictionary_enabled: true,
            writer_version: WriterVersion::V1,
            created_by: DEFAULT_CREATED_BY.to_string(),
            validate: true,
            key_value_metadata: Vec::new(),
        }
    }
}

impl WriterOptions {
    pub fn builder() -> WriterOptionsBuilder {
        WriterOptionsBuilder {
            options: WriterOptions::default(),
        }
    }

    /// Codec to use for compressing pages.
    pub fn codec(&self) -> Result<Codec> {
        self.compression.codec(self.gzip_level)
    }
}

#[derive(Debug, Clone)]
pub struct WriterOptionsBuilder {
    options: WriterOptions,
}

impl WriterOptionsBuilder {
    pub fn compression(mut self, value: CompressionCodec) -> Self {
        self.options.compression = value;
        self
    }

    pub fn gzip_level(mut self, value: u32) -> Self {
        self.options.gzip_level = value;
        self
    }

    pub fn page_size(mut self, value: usize) -> Self {
        self.options.page_size = value;
        self
    }

    pub fn row_group_size(mut self, value: usize) -> Self {
        self.options.row_group_size = value;
        self
    }

    pub fn row_group_check_interval(mut self, value: usize) -> Self {
        self.options.row_group_check_interval = value;
        self
    }

    pub fn dictionary_page_size_limit(mut self, value: usize) -> Self {
        self.options.dictionary_page_size_limit = value;
        self
    }

    pub fn dictionary_ratio_threshold(mut self, value: f64) -> Self {
        self.options.dictionary_ratio_threshold = value;
        self
    }

    pub fn dictionary_enabled(mut self, value: bool) -> Self {
        self.options.dictionary_enabled = value;
        self
    }

    pub fn writer_version(mut self, value: WriterVersion) -> Self {
        self.options.writer_version = value;
        self
    }

    pub fn created_by(mut self, value: impl Into<String>) -> Self {
        self.options.created_by = value.into();
        self
    }

    pub fn validate(mut self, value: bool) -> Self {
        self.options.validate = value;
        self
    }

    pub fn key_value(mut self, key: impl Into<String>, value: Option<String>) -> Self {
        self.options.key_value_metadata.push((key.into(), value));
        self
    }

    pub fn build(self) -> Result<WriterOptions> {
        let opts = self.options;

        if opts.gzip_level > 9 {
            return Err(RivetError::out_of_range(format!(
                "Gzip level must be between 0 and 9, got {}",
                opts.gzip_level
            )));
        }
        for (name, v) in [
            ("page size", opts.page_size),
            ("row group size", opts.row_group_size),
            ("row group check interval", opts.row_group_check_interval),
            ("dictionary page size limit", opts.dictionary_page_size_limit),
        ] {
            if v == 0 {
                return Err(RivetError::out_of_range(format!(
                    "{name} must be greater than zero"
                )));
            }
        }
        if !(opts.dictionary_ratio_threshold > 0.0 && opts.dictionary_ratio_threshold <= 1.0) {
            return Err(RivetError::out_of_range(format!(
                "Dictionary ratio threshold must be in (0, 1], got {}",
                opts.dictionary_ratio_threshold
            )));
        }
        // Fail early on codecs we can't write with.
        opts.codec()?;

        Ok(opts)
    }
}

#[cfg(test)]
mod tests {
    use rivet_error::ErrorKind;

    use super::*;

    #[test]
    fn defaults() {
        let opts = WriterOptions::builder().build().unwrap();
        assert_eq!(WriterOptions::default(), opts);
        assert_eq!(CompressionCodec::Uncompressed, opts.compression);
        assert_eq!(1024 * 1024, opts.page_size);
        assert_eq!(100, opts.row_group_check_interval);
        assert_eq!(WriterVersion::V1, opts.writer_version);
        assert!(opts.validate);
    }

    #[test]
    fn rejects_bad_values() {
        let cases = [
            WriterOptions::builder().gzip_level(10),
            WriterOptions::builder().page_size(0),
            WriterOptions::builder().row_group_size(0),
            WriterOptions::builder().row_group_check_interval(0),
            WriterOptions::builder().dictionary_page_size_limit(0),
            WriterOptions::builder().dictionary_ratio_threshold(0.0),
            WriterOptions::builder().dictionary_ratio_threshold(1.5),
        ];
        for builder in cases {
            let err = builder.build().unwrap_err();
            assert_eq!(ErrorKind::OutOfRange, err.kind());
        }

        let err = WriterOptions::builder()
            .compression(CompressionCodec::Zstd)
            .build()
            .unwrap_err();
        assert_eq!(ErrorKind::UnsupportedCompression, err.kind());
    }

    #[test]
    fn writer_versions() {
        assert_eq!(WriterVersion::V2, WriterVersion::try_from_num(2).unwrap());
        assert!(WriterVersion::try_from_num(3).is_err());
    }
}
