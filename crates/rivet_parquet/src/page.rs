//! Page headers.
use std::fmt;

use rivet_error::{OptionExt, Result, RivetError};

use crate::encoding::Encoding;
use crate::format;
use crate::metadata::statistics::Statistics;
use crate::thrift_ext::{read_compact, write_compact};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    DataPage,
    IndexPage,
    DictionaryPage,
    DataPageV2,
}

impl PageType {
    pub fn try_from_thrift(code: i32) -> Result<Self> {
        Ok(match code {
            0 => Self::DataPage,
            1 => Self::IndexPage,
            2 => Self::DictionaryPage,
            3 => Self::DataPageV2,
            other => return Err(RivetError::invalid_format(format!("Unknown page type: {other}"))),
        })
    }

    pub fn thrift_code(&self) -> i32 {
        match self {
            Self::DataPage => 0,
            Self::IndexPage => 1,
            Self::DictionaryPage => 2,
            Self::DataPageV2 => 3,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DataPageHeaderV1 {
    pub num_values: i32,
    pub encoding: Encoding,
    pub definition_level_encoding: Encoding,
    pub repetition_level_encoding: Encoding,
    pub statistics: Option<Statistics>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataPageHeaderV2 {
    pub num_values: i32,
    pub num_nulls: i32,
    pub num_rows: i32,
    pub encoding: Encoding,
    pub definition_levels_byte_length: i32,
    pub repetition_levels_byte_length: i32,
    /// Whether the values section is compressed. Levels never are.
    pub is_compressed: bool,
    pub statistics: Option<Statistics>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryPageHeader {
    pub num_values: i32,
    pub encoding: Encoding,
    pub is_sorted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageKind {
    Data(DataPageHeaderV1),
    DataV2(DataPageHeaderV2),
    Dictionary(DictionaryPageHeader),
    /// Index pages carry nothing we use and are skipped.
    Index,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageHeader {
    pub uncompressed_size: usize,
    pub compressed_size: usize,
    pub crc: Option<i32>,
    /// Size of the encoded header itself. Only set for headers read from a
    /// buffer.
    pub header_size: usize,
    pub kind: PageKind,
}

impl PageHeader {
    /// Decode a page header from the start of `buf`.
    pub fn try_decode(buf: &[u8]) -> Result<Self> {
        let (header, header_size): (format::PageHeader, _) = read_compact(buf)?;
        let mut page = Self::try_from_thrift(header)?;
        page.header_size = header_size;
        Ok(page)
    }

    /// Append the encoded header to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        write_compact(&self.to_thrift(), out)
    }

    pub fn page_type(&self) -> PageType {
        match &self.kind {
            PageKind::Data(_) => PageType::DataPage,
            PageKind::DataV2(_) => PageType::DataPageV2,
            PageKind::Dictionary(_) => PageType::DictionaryPage,
            PageKind::Index => PageType::IndexPage,
        }
    }

    /// Number of level slots in a data page, zero for other pages.
    pub fn num_values(&self) -> usize {
        match &self.kind {
            PageKind::Data(h) => h.num_values as usize,
            PageKind::DataV2(h) => h.num_values as usize,
            _ => 0,
        }
    }

    pub fn try_from_thrift(header: format::PageHeader) -> Result<Self> {
        let page_type = PageType::try_from_thrift(header.type_)?;
        if header.compressed_page_size < 0 || header.uncompressed_page_size < 0 {
            return Err(RivetError::invalid_format(format!(
                "Negative page size in header (compressed: {}, uncompressed: {})",
                header.compressed_page_size, header.uncompressed_page_size
            )));
        }

        let kind = match page_type {
            PageType::DataPage => {
                let h = header
                    .data_page_header
                    .required("Data page is missing its header")?;
                check_count(h.num_values)?;
                PageKind::Data(DataPageHeaderV1 {
                    num_values: h.num_values,
                    encoding: Encoding::try_from_thrift(h.encoding)?,
                    definition_level_encoding: Encoding::try_from_thrift(
                        h.definition_level_encoding,
                    )?,
                    repetition_level_encoding: Encoding::try_from_thrift(
                        h.repetition_level_encoding,
                    )?,
                    statistics: h.statistics.map(Statistics::from_thrift),
                })
            }
            PageType::DataPageV2 => {
                let h = header
                    .data_page_header_v2
                    .required("Data page v2 is missing its header")?;
                check_count(h.num_values)?;
                if h.definition_levels_byte_length < 0 || h.repetition_levels_byte_length < 0 {
                    return Err(RivetError::invalid_format("Negative level length in data page v2"));
                }
                PageKind::DataV2(DataPageHeaderV2 {
                    num_values: h.num_values,
                    num_nulls: h.num_nulls,
                    num_rows: h.num_rows,
                    encoding: Encoding::try_from_thrift(h.encoding)?,
                    definition_levels_byte_length: h.definition_levels_byte_length,
                    repetition_levels_byte_length: h.repetition_levels_byte_length,
                    is_compressed: h.is_compressed.unwrap_or(true),
                    statistics: h.statistics.map(Statistics::from_thrift),
                })
            }
            PageType::DictionaryPage => {
                let h = header
                    .dictionary_page_header
                    .required("Dictionary page is missing its header")?;
                check_count(h.num_values)?;
                PageKind::Dictionary(DictionaryPageHeader {
                    num_values: h.num_values,
                    encoding: Encoding::try_from_thrift(h.encoding)?,
                    is_sorted: h.is_sorted.unwrap_or(false),
                })
            }
            PageType::IndexPage => PageKind::Index,
        };

        Ok(PageHeader {
            uncompressed_size: header.uncompressed_page_size as usize,
            compressed_size: header.compressed_page_size as usize,
            crc: header.crc,
            header_size: 0,
            kind,
        })
    }

    pub fn to_thrift(&self) -> format::PageHeader {
        let mut header = format::PageHeader {
            type_: self.page_type().thrift_code(),
            uncompressed_page_size: self.uncompressed_size as i32,
            compressed_page_size: self.compressed_size as i32,
            crc: self.crc,
            ..Default::default()
        };

        match &self.kind {
            PageKind::Data(h) => {
                header.data_page_header = Some(format::DataPageHeader {
                    num_values: h.num_values,
                    encoding: h.encoding.thrift_code(),
                    definition_level_encoding: h.definition_level_encoding.thrift_code(),
                    repetition_level_encoding: h.repetition_level_encoding.thrift_code(),
                    statistics: h.statistics.as_ref().map(|s| s.to_thrift()),
                })
            }
            PageKind::DataV2(h) => {
                header.data_page_header_v2 = Some(format::DataPageHeaderV2 {
                    num_values: h.num_values,
                    num_nulls: h.num_nulls,
                    num_rows: h.num_rows,
                    encoding: h.encoding.thrift_code(),
                    definition_levels_byte_length: h.definition_levels_byte_length,
                    repetition_levels_byte_length: h.repetition_levels_byte_length,
                    is_compressed: Some(h.is_compressed),
                    statistics: h.statistics.as_ref().map(|s| s.to_thrift()),
                })
            }
            PageKind::Dictionary(h) => {
                header.dictionary_page_header = Some(format::DictionaryPageHeader {
                    num_values: h.num_values,
                    encoding: h.encoding.thrift_code(),
                    is_sorted: Some(h.is_sorted),
                })
            }
            PageKind::Index => (),
        }

        header
    }
}

fn check_count(num_values: i32) -> Result<()> {
    if num_values < 0 {
        return Err(RivetError::invalid_format(format!(
            "Negative value count in page header: {num_values}"
        )));
    }
    Ok(())
}

impl fmt::Display for PageHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            PageKind::Data(h) => {
                write!(f, "DATA_PAGE values={} encoding={}", h.num_values, h.encoding)?
            }
            PageKind::DataV2(h) => write!(
                f,
                "DATA_PAGE_V2 values={} nulls={} rows={} encoding={}",
                h.num_values, h.num_nulls, h.num_rows, h.encoding
            )?,
            PageKind::Dictionary(h) => {
                write!(f, "DICTIONARY_PAGE values={} encoding={}", h.num_values, h.encoding)?
            }
            PageKind::Index => write!(f, "INDEX_PAGE")?,
        }
        write!(
            f,
            " compressed={} uncompressed={}",
            self.compressed_size, self.uncompressed_size
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_data_page() {
        let header = PageHeader {
            uncompressed_size: 100,
            compressed_size: 80,
            crc: None,
            header_size: 0,
            kind: PageKind::Data(DataPageHeaderV1 {
                num_values: 12,
                encoding: Encoding::RleDictionary,
                definition_level_encoding: Encoding::Rle,
                repetition_level_encoding: Encoding::Rle,
                statistics: None,
            }),
        };

        let mut buf = Vec::new();
        header.encode(&mut buf).unwrap();
        let encoded_len = buf.len();
        // Trailing page data shouldn't be consumed.
        buf.extend_from_slice(&[1, 2, 3]);

        let got = PageHeader::try_decode(&buf).unwrap();
        assert_eq!(encoded_len, got.header_size);
        assert_eq!(PageHeader { header_size: encoded_len, ..header }, got);
        assert_eq!(12, got.num_values());
    }

    #[test]
    fn missing_sub_header() {
        let header = format::PageHeader {
            type_: 2,
            uncompressed_page_size: 1,
            compressed_page_size: 1,
            ..Default::default()
        };
        assert!(PageHeader::try_from_thrift(header).is_err());
    }

    #[test]
    fn display() {
        let header = PageHeader {
            uncompressed_size: 10,
            compressed_size: 10,
            crc: None,
            header_size: 0,
            kind: PageKind::Dictionary(DictionaryPageHeader {
                num_values: 3,
                encoding: Encoding::Plain,
                is_sorted: false,
            }),
        };
        assert_eq!(
            "DICTIONARY_PAGE values=3 encoding=PLAIN compressed=10 uncompressed=10",
            header.to_string()
        );
    }
}
