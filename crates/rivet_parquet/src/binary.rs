//! Bit-level reading and writing over in-memory buffers.
//!
//! Both the reader and writer track their position in bits. Reads/writes of
//! whole values (integers, floats, byte arrays) first align to the next byte
//! boundary. Bit runs are packed LSB first for little endian and MSB first for
//! big endian.
use std::fmt;
use std::ops::Add;

use rivet_error::{Result, RivetError};

use crate::encoding::uleb128::{decode_uleb128, encode_uleb128};
use crate::types::Int96;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    LittleEndian,
    BigEndian,
}

macro_rules! read_fixed {
    ($name:ident, $ty:ty, $width:literal) => {
        pub fn $name(&mut self) -> Result<$ty> {
            let bytes = self.read_bytes($width)?;
            let mut arr = [0; $width];
            arr.copy_from_slice(bytes);
            Ok(match self.order {
                ByteOrder::LittleEndian => <$ty>::from_le_bytes(arr),
                ByteOrder::BigEndian => <$ty>::from_be_bytes(arr),
            })
        }
    };
}

macro_rules! write_fixed {
    ($name:ident, $ty:ty) => {
        pub fn $name(&mut self, v: $ty) {
            match self.order {
                ByteOrder::LittleEndian => self.write_bytes(&v.to_le_bytes()),
                ByteOrder::BigEndian => self.write_bytes(&v.to_be_bytes()),
            }
        }
    };
}

/// Reads primitive values from a byte buffer.
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    buf: &'a [u8],
    /// Current position in bits.
    bit_pos: usize,
    order: ByteOrder,
}

impl<'a> BinaryReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self::with_byte_order(buf, ByteOrder::LittleEndian)
    }

    pub fn with_byte_order(buf: &'a [u8], order: ByteOrder) -> Self {
        BinaryReader {
            buf,
            bit_pos: 0,
            order,
        }
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    pub fn bit_position(&self) -> usize {
        self.bit_pos
    }

    /// Byte position, rounded up if we're in the middle of a byte.
    pub fn byte_position(&self) -> usize {
        self.bit_pos.div_ceil(8)
    }

    pub fn remaining_bits(&self) -> usize {
        self.buf.len() * 8 - self.bit_pos
    }

    /// Bytes left after aligning to the next byte.
    pub fn remaining_bytes(&self) -> usize {
        self.buf.len() - self.byte_position()
    }

    /// The unread portion of the buffer, starting from the next byte boundary.
    pub fn remaining(&self) -> &'a [u8] {
        &self.buf[self.byte_position()..]
    }

    pub fn align_to_byte(&mut self) {
        self.bit_pos = self.byte_position() * 8;
    }

    /// Move the cursor forward by `n` bytes, aligning first.
    pub fn skip_bytes(&mut self, n: usize) -> Result<()> {
        self.read_bytes(n).map(|_| ())
    }

    fn check_bits(&self, num_bits: usize) -> Result<()> {
        if num_bits > self.remaining_bits() {
            return Err(RivetError::invalid_format(format!(
                "Attempted to read {num_bits} bits with only {} bits remaining",
                self.remaining_bits()
            )));
        }
        Ok(())
    }

    /// Read `num_bits` (at most 64) as an unsigned integer.
    pub fn read_bits(&mut self, num_bits: u8) -> Result<u64> {
        if num_bits > 64 {
            return Err(RivetError::out_of_range(format!(
                "Cannot read {num_bits} bits into a u64"
            )));
        }
        let num_bits = num_bits as usize;
        self.check_bits(num_bits)?;

        let mut value = 0u64;
        let mut read = 0;
        while read < num_bits {
            let byte = self.buf[self.bit_pos / 8];
            let offset = self.bit_pos % 8;
            let available = 8 - offset;
            let take = available.min(num_bits - read);
            let mask = (1u16 << take) - 1;

            match self.order {
                ByteOrder::LittleEndian => {
                    let bits = ((byte as u16 >> offset) & mask) as u64;
                    value |= bits << read;
                }
                ByteOrder::BigEndian => {
                    let bits = ((byte as u16 >> (available - take)) & mask) as u64;
                    value = (value << take) | bits;
                }
            }

            read += take;
            self.bit_pos += take;
        }

        Ok(value)
    }

    /// Read a single bit as a boolean.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_bits(1)? == 1)
    }

    /// Read `len` raw bytes, aligning to the next byte first.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.align_to_byte();
        let start = self.bit_pos / 8;
        if len > self.buf.len() - start {
            return Err(RivetError::invalid_format(format!(
                "Attempted to read {len} bytes with only {} bytes remaining",
                self.buf.len() - start
            )));
        }
        self.bit_pos += len * 8;
        Ok(&self.buf[start..start + len])
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    read_fixed!(read_i32, i32, 4);
    read_fixed!(read_u32, u32, 4);
    read_fixed!(read_i64, i64, 8);
    read_fixed!(read_f32, f32, 4);
    read_fixed!(read_f64, f64, 8);

    pub fn read_i96(&mut self) -> Result<Int96> {
        let bytes = self.read_bytes(12)?;
        let mut arr = [0; 12];
        arr.copy_from_slice(bytes);
        if self.order == ByteOrder::BigEndian {
            arr.reverse();
        }
        Ok(Int96::from_le_bytes(arr))
    }

    /// Read an unsigned LEB128 varint.
    pub fn read_varint(&mut self) -> Result<u64> {
        self.align_to_byte();
        let (v, n) = decode_uleb128(self.remaining())?;
        self.bit_pos += n * 8;
        Ok(v)
    }

    /// Read a byte array prefixed with a 4 byte length.
    pub fn read_byte_array(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u32()? as usize;
        self.read_bytes(len)
    }

    /// Read a utf8 string prefixed with a 4 byte length.
    pub fn read_string(&mut self) -> Result<&'a str> {
        let bytes = self.read_byte_array()?;
        Ok(std::str::from_utf8(bytes)?)
    }

    /// Read a big endian two's complement integer stored in `len` bytes.
    ///
    /// This is how decimals are stored in fixed length byte arrays regardless
    /// of the reader's byte order.
    pub fn read_fixed_decimal(&mut self, len: usize) -> Result<i128> {
        let bytes = self.read_bytes(len)?;
        decimal_from_be_bytes(bytes)
    }
}

/// Decode a big endian two's complement integer, sign extending to 128 bits.
pub fn decimal_from_be_bytes(bytes: &[u8]) -> Result<i128> {
    if bytes.len() > 16 {
        return Err(RivetError::out_of_range(format!(
            "Decimal with {} bytes doesn't fit in 128 bits",
            bytes.len()
        )));
    }
    if bytes.is_empty() {
        return Ok(0);
    }

    let negative = bytes[0] & 0x80 != 0;
    let mut arr = if negative { [0xFF; 16] } else { [0; 16] };
    arr[16 - bytes.len()..].copy_from_slice(bytes);
    Ok(i128::from_be_bytes(arr))
}

/// Encode a decimal as big endian two's complement in exactly `len` bytes.
pub fn decimal_to_be_bytes(value: i128, len: usize) -> Result<Vec<u8>> {
    let full = value.to_be_bytes();
    if len >= 16 {
        let fill = if value < 0 { 0xFF } else { 0 };
        let mut out = vec![fill; len - 16];
        out.extend_from_slice(&full);
        return Ok(out);
    }

    let out = full[16 - len..].to_vec();
    // Check that truncation didn't lose information.
    if decimal_from_be_bytes(&out)? != value {
        return Err(RivetError::out_of_range(format!(
            "Decimal value {value} does not fit in {len} bytes"
        )));
    }
    Ok(out)
}

/// Minimal number of bytes needed to store `value` as two's complement.
pub fn decimal_min_len(value: i128) -> usize {
    let bits = if value < 0 {
        128 - (!value).leading_zeros() + 1
    } else {
        128 - value.leading_zeros() + 1
    };
    (bits as usize).div_ceil(8).max(1)
}

/// Writes primitive values to a growable byte buffer.
#[derive(Debug, Clone, Default)]
pub struct BinaryWriter {
    buf: Vec<u8>,
    /// Number of bits used in the last byte. Zero when aligned.
    bit_offset: usize,
    order: ByteOrder,
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        BinaryWriter {
            buf: Vec::with_capacity(cap),
            bit_offset: 0,
            order: ByteOrder::LittleEndian,
        }
    }

    pub fn with_byte_order(order: ByteOrder) -> Self {
        BinaryWriter {
            buf: Vec::new(),
            bit_offset: 0,
            order,
        }
    }

    /// Length in bytes, including a partially filled last byte.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn bit_len(&self) -> usize {
        if self.bit_offset == 0 {
            self.buf.len() * 8
        } else {
            (self.buf.len() - 1) * 8 + self.bit_offset
        }
    }

    pub fn data_size(&self) -> DataSize {
        DataSize::from_bits(self.bit_len() as u64)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    /// Pad the last partially written byte with zeros.
    pub fn align_to_byte(&mut self) {
        self.bit_offset = 0;
    }

    /// Write the low `num_bits` bits of `value`.
    pub fn write_bits(&mut self, value: u64, num_bits: u8) {
        debug_assert!(num_bits <= 64);
        let num_bits = num_bits as usize;
        let mut written = 0;

        while written < num_bits {
            if self.bit_offset == 0 {
                self.buf.push(0);
            }
            let available = 8 - self.bit_offset;
            let take = available.min(num_bits - written);
            let mask = (1u64 << take) - 1;

            let bits = match self.order {
                ByteOrder::LittleEndian => ((value >> written) & mask) << self.bit_offset,
                ByteOrder::BigEndian => {
                    ((value >> (num_bits - written - take)) & mask) << (available - take)
                }
            };
            // Buffer always has a last byte here.
            if let Some(last) = self.buf.last_mut() {
                *last |= bits as u8;
            }

            written += take;
            self.bit_offset = (self.bit_offset + take) % 8;
        }
    }

    pub fn write_bool(&mut self, v: bool) {
        self.write_bits(v as u64, 1)
    }

    /// Write raw bytes, aligning first.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.align_to_byte();
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.write_bytes(&[v])
    }

    write_fixed!(write_i32, i32);
    write_fixed!(write_u32, u32);
    write_fixed!(write_i64, i64);
    write_fixed!(write_f32, f32);
    write_fixed!(write_f64, f64);

    pub fn write_i96(&mut self, v: Int96) {
        let mut bytes = v.to_le_bytes();
        if self.order == ByteOrder::BigEndian {
            bytes.reverse();
        }
        self.write_bytes(&bytes)
    }

    pub fn write_varint(&mut self, v: u64) {
        self.align_to_byte();
        encode_uleb128(v, &mut self.buf);
    }

    /// Write a byte array prefixed with its 4 byte length.
    pub fn write_byte_array(&mut self, bytes: &[u8]) -> Result<()> {
        let len = u32::try_from(bytes.len()).map_err(|_| {
            RivetError::out_of_range(format!("Byte array of {} bytes too large", bytes.len()))
        })?;
        self.write_u32(len);
        self.write_bytes(bytes);
        Ok(())
    }

    pub fn write_string(&mut self, s: &str) -> Result<()> {
        self.write_byte_array(s.as_bytes())
    }

    /// Write a decimal as big endian two's complement in exactly `len` bytes.
    pub fn write_fixed_decimal(&mut self, value: i128, len: usize) -> Result<()> {
        let bytes = decimal_to_be_bytes(value, len)?;
        self.write_bytes(&bytes);
        Ok(())
    }
}

/// Size of some data, tracked in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DataSize {
    bits: u64,
}

impl DataSize {
    pub const ZERO: DataSize = DataSize { bits: 0 };

    pub const fn from_bits(bits: u64) -> Self {
        DataSize { bits }
    }

    pub const fn from_bytes(bytes: u64) -> Self {
        DataSize { bits: bytes * 8 }
    }

    pub const fn bits(&self) -> u64 {
        self.bits
    }

    /// Size in bytes, rounding to the nearest byte with ties rounding down.
    ///
    /// 4 leftover bits round down, 5 or more round up.
    pub const fn bytes(&self) -> u64 {
        let whole = self.bits / 8;
        if self.bits % 8 > 4 {
            whole + 1
        } else {
            whole
        }
    }

    /// Number of bytes needed to actually store this many bits.
    pub const fn storage_bytes(&self) -> u64 {
        self.bits.div_ceil(8)
    }
}

impl Add for DataSize {
    type Output = DataSize;

    fn add(self, rhs: Self) -> Self::Output {
        DataSize::from_bits(self.bits + rhs.bits)
    }
}

impl fmt::Display for DataSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const KIB: u64 = 1024;
        const MIB: u64 = 1024 * 1024;
        let bytes = self.bytes();
        if bytes >= MIB {
            write!(f, "{:.2} MiB", bytes as f64 / MIB as f64)
        } else if bytes >= KIB {
            write!(f, "{:.2} KiB", bytes as f64 / KIB as f64)
        } else {
            write!(f, "{bytes} B")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_little_endian() {
        let mut w = BinaryWriter::new();
        w.write_bits(0b101, 3);
        w.write_bits(0b11, 2);
        w.write_bits(0x1FF, 9);
        assert_eq!(14, w.bit_len());

        let buf = w.into_inner();
        assert_eq!(2, buf.len());
        assert_eq!(0b1111_1101, buf[0]);

        let mut r = BinaryReader::new(&buf);
        assert_eq!(0b101, r.read_bits(3).unwrap());
        assert_eq!(0b11, r.read_bits(2).unwrap());
        assert_eq!(0x1FF, r.read_bits(9).unwrap());
        assert_eq!(2, r.remaining_bits());
    }

    #[test]
    fn bits_big_endian() {
        let mut w = BinaryWriter::with_byte_order(ByteOrder::BigEndian);
        w.write_bits(0b101, 3);
        w.write_bits(0x1FF, 9);
        let buf = w.into_inner();
        assert_eq!(0b1011_1111, buf[0]);

        let mut r = BinaryReader::with_byte_order(&buf, ByteOrder::BigEndian);
        assert_eq!(0b101, r.read_bits(3).unwrap());
        assert_eq!(0x1FF, r.read_bits(9).unwrap());
    }

    #[test]
    fn full_width_bits() {
        let mut w = BinaryWriter::new();
        w.write_bits(u64::MAX, 64);
        w.write_bits(1, 1);
        let buf = w.into_inner();

        let mut r = BinaryReader::new(&buf);
        assert_eq!(u64::MAX, r.read_bits(64).unwrap());
        assert!(r.read_bool().unwrap());
    }

    #[test]
    fn fixed_width_values() {
        let mut w = BinaryWriter::new();
        w.write_bool(true);
        // Aligns before the int.
        w.write_i32(-5);
        w.write_i64(1 << 40);
        w.write_f32(1.5);
        w.write_f64(-2.25);
        w.write_i96(Int96([1, 2, 3]));
        w.write_string("hello").unwrap();
        w.write_varint(300);
        let buf = w.into_inner();

        let mut r = BinaryReader::new(&buf);
        assert!(r.read_bool().unwrap());
        assert_eq!(-5, r.read_i32().unwrap());
        assert_eq!(1 << 40, r.read_i64().unwrap());
        assert_eq!(1.5, r.read_f32().unwrap());
        assert_eq!(-2.25, r.read_f64().unwrap());
        assert_eq!(Int96([1, 2, 3]), r.read_i96().unwrap());
        assert_eq!("hello", r.read_string().unwrap());
        assert_eq!(300, r.read_varint().unwrap());
        assert_eq!(0, r.remaining_bytes());
    }

    #[test]
    fn big_endian_ints() {
        let mut w = BinaryWriter::with_byte_order(ByteOrder::BigEndian);
        w.write_i32(1);
        assert_eq!(&[0, 0, 0, 1], w.as_slice());

        let buf = w.into_inner();
        let mut r = BinaryReader::with_byte_order(&buf, ByteOrder::BigEndian);
        assert_eq!(1, r.read_i32().unwrap());
    }

    #[test]
    fn read_past_end() {
        let buf = [1, 2, 3];
        let mut r = BinaryReader::new(&buf);
        let err = r.read_i32().unwrap_err();
        assert_eq!(rivet_error::ErrorKind::InvalidFormat, err.kind());

        let mut r = BinaryReader::new(&buf);
        r.read_bits(20).unwrap();
        assert!(r.read_bits(5).is_err());
    }

    #[test]
    fn fixed_decimals() {
        for (value, len) in [(0_i128, 1), (-1, 1), (127, 1), (-128, 1), (123456, 4), (-99999, 16)] {
            let mut w = BinaryWriter::new();
            w.write_fixed_decimal(value, len).unwrap();
            let buf = w.into_inner();
            assert_eq!(len, buf.len());

            let mut r = BinaryReader::new(&buf);
            assert_eq!(value, r.read_fixed_decimal(len).unwrap());
        }

        let mut w = BinaryWriter::new();
        assert!(w.write_fixed_decimal(128, 1).is_err());
    }

    #[test]
    fn decimal_min_lengths() {
        assert_eq!(1, decimal_min_len(0));
        assert_eq!(1, decimal_min_len(127));
        assert_eq!(2, decimal_min_len(128));
        assert_eq!(1, decimal_min_len(-128));
        assert_eq!(2, decimal_min_len(-129));
    }

    #[test]
    fn data_size_rounding() {
        assert_eq!(1, DataSize::from_bits(12).bytes());
        assert_eq!(2, DataSize::from_bits(13).bytes());
        assert_eq!(0, DataSize::from_bits(4).bytes());
        assert_eq!(1, DataSize::from_bits(5).bytes());
        assert_eq!(1, DataSize::from_bits(4).storage_bytes());
        assert_eq!(DataSize::from_bytes(3), DataSize::from_bits(8) + DataSize::from_bits(16));
        assert_eq!("2.00 KiB", DataSize::from_bytes(2048).to_string());
    }
}
