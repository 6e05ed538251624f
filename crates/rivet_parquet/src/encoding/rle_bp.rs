//! RLE/bit-packing hybrid encoding.
//!
//! Used for repetition levels, definition levels, and dictionary indices.
//!
//! Each run starts with a ULEB128 header. If the low bit is 0, the run is an
//! RLE run of `header >> 1` copies of a single value stored in `ceil(w/8)`
//! little endian bytes. If the low bit is 1, the run is `header >> 1` groups
//! of 8 bit-packed values.
//!
//! See the "Run Length Encoding / Bit-Packing Hybrid" section of
//! <https://parquet.apache.org/docs/file-format/data-pages/encodings/>
use rivet_error::{Result, RivetError};

use super::bitpack::{pack8, unpack8, GROUP_SIZE};
use super::uleb128::{decode_uleb128, encode_uleb128};

/// Max number of literal values buffered before being flushed as a single
/// bit-packed run. Keeps the run header at one byte.
const MAX_LITERAL_VALUES: usize = 63 * GROUP_SIZE;

/// Min run length before a run is written as RLE instead of being bit-packed.
const MIN_RLE_RUN: usize = 8;

#[derive(Debug)]
enum Run {
    Rle { value: u64, remaining: usize },
    Packed { remaining_groups: usize },
}

#[derive(Debug)]
pub struct RleBpDecoder<'a> {
    buf: &'a [u8],
    pos: usize,
    bit_width: u8,
    run: Option<Run>,
    /// Unpacked values from the current bit-packed group.
    group: [u64; GROUP_SIZE],
    group_idx: usize,
}

impl<'a> RleBpDecoder<'a> {
    pub fn new(buf: &'a [u8], bit_width: u8) -> Self {
        RleBpDecoder {
            buf,
            pos: 0,
            bit_width,
            run: None,
            group: [0; GROUP_SIZE],
            group_idx: GROUP_SIZE,
        }
    }

    /// Number of bytes consumed from the input so far.
    pub fn bytes_consumed(&self) -> usize {
        self.pos
    }

    /// Decode exactly `count` values, appending them to `out`.
    pub fn decode(&mut self, count: usize, out: &mut Vec<u64>) -> Result<()> {
        if self.bit_width > 64 {
            return Err(RivetError::invalid_format(format!(
                "Invalid bit width for RLE/bit-packed data: {}",
                self.bit_width
            )));
        }

        if self.bit_width == 0 {
            out.resize(out.len() + count, 0);
            return Ok(());
        }

        out.reserve(count);
        let mut remaining = count;
        while remaining > 0 {
            remaining -= self.decode_some(remaining, out)?;
        }

        Ok(())
    }

    /// Decode up to `max` values from the current run, reading the next run
    /// header if needed. Returns the number of values decoded.
    fn decode_some(&mut self, max: usize, out: &mut Vec<u64>) -> Result<usize> {
        // Drain any values left in the current unpacked group.
        if self.group_idx < GROUP_SIZE {
            let n = (GROUP_SIZE - self.group_idx).min(max);
            out.extend_from_slice(&self.group[self.group_idx..self.group_idx + n]);
            self.group_idx += n;
            return Ok(n);
        }

        match self.run.take() {
            Some(Run::Rle { value, remaining }) => {
                let n = remaining.min(max);
                out.resize(out.len() + n, value);
                if remaining > n {
                    self.run = Some(Run::Rle {
                        value,
                        remaining: remaining - n,
                    });
                }
                Ok(n)
            }
            Some(Run::Packed { remaining_groups }) => {
                if self.pos >= self.buf.len() {
                    return Err(RivetError::invalid_format(
                        "Unexpected end of bit-packed run",
                    ));
                }
                let width = self.bit_width as usize;
                let end = (self.pos + width).min(self.buf.len());
                unpack8(&self.buf[self.pos..end], width, &mut self.group);
                self.pos = end;
                self.group_idx = 0;
                if remaining_groups > 1 {
                    self.run = Some(Run::Packed {
                        remaining_groups: remaining_groups - 1,
                    });
                }
                Ok(0)
            }
            None => {
                self.read_header()?;
                Ok(0)
            }
        }
    }

    fn read_header(&mut self) -> Result<()> {
        if self.pos >= self.buf.len() {
            return Err(RivetError::invalid_format(
                "Not enough values in RLE/bit-packed data",
            ));
        }

        let (header, n) = decode_uleb128(&self.buf[self.pos..])?;
        self.pos += n;

        let count = (header >> 1) as usize;
        if header & 1 == 1 {
            if count == 0 {
                return Err(RivetError::invalid_format("Empty bit-packed run"));
            }
            self.run = Some(Run::Packed {
                remaining_groups: count,
            });
        } else {
            let num_bytes = (self.bit_width as usize).div_ceil(8);
            if self.pos + num_bytes > self.buf.len() {
                return Err(RivetError::invalid_format("Truncated RLE run value"));
            }
            let mut bytes = [0; 8];
            bytes[..num_bytes].copy_from_slice(&self.buf[self.pos..self.pos + num_bytes]);
            self.pos += num_bytes;
            if count == 0 {
                return Err(RivetError::invalid_format("Empty RLE run"));
            }
            self.run = Some(Run::Rle {
                value: u64::from_le_bytes(bytes),
                remaining: count,
            });
        }

        Ok(())
    }
}

/// Decode `count` values at `bit_width` from `buf`.
pub fn decode_rle_bp(buf: &[u8], bit_width: u8, count: usize) -> Result<Vec<u64>> {
    let mut out = Vec::with_capacity(count);
    RleBpDecoder::new(buf, bit_width).decode(count, &mut out)?;
    Ok(out)
}

/// Encoder for the hybrid encoding.
///
/// Values are buffered as literals until a run of at least 8 repeated values
/// is seen, at which point buffered literals are flushed as a bit-packed run
/// and the repeated values written as an RLE run.
#[derive(Debug)]
pub struct RleBpEncoder {
    bit_width: u8,
    buf: Vec<u8>,
    literals: Vec<u64>,
    run_value: u64,
    run_len: usize,
}

impl RleBpEncoder {
    pub fn new(bit_width: u8) -> Self {
        RleBpEncoder {
            bit_width,
            buf: Vec::new(),
            literals: Vec::with_capacity(MAX_LITERAL_VALUES),
            run_value: 0,
            run_len: 0,
        }
    }

    pub fn put(&mut self, value: u64) {
        if self.bit_width == 0 {
            return;
        }
        if self.run_len > 0 && value == self.run_value {
            self.run_len += 1;
            return;
        }
        self.end_run();
        self.run_value = value;
        self.run_len = 1;
    }

    fn end_run(&mut self) {
        let mut run_len = std::mem::take(&mut self.run_len);
        if run_len >= MIN_RLE_RUN {
            // Top up literals so they form whole groups.
            while self.literals.len() % GROUP_SIZE != 0 && run_len > 0 {
                self.push_literal(self.run_value);
                run_len -= 1;
            }
            if run_len >= MIN_RLE_RUN {
                self.flush_literals();
                self.write_rle(self.run_value, run_len);
                return;
            }
        }

        for _ in 0..run_len {
            self.push_literal(self.run_value);
        }
    }

    fn push_literal(&mut self, value: u64) {
        self.literals.push(value);
        if self.literals.len() >= MAX_LITERAL_VALUES {
            self.flush_literals();
        }
    }

    fn write_rle(&mut self, value: u64, count: usize) {
        encode_uleb128((count as u64) << 1, &mut self.buf);
        let num_bytes = (self.bit_width as usize).div_ceil(8);
        self.buf
            .extend_from_slice(&value.to_le_bytes()[..num_bytes]);
    }

    fn flush_literals(&mut self) {
        if self.literals.is_empty() {
            return;
        }
        // Pad final group with zeros.
        let padded = self.literals.len().next_multiple_of(GROUP_SIZE);
        self.literals.resize(padded, 0);

        let groups = padded / GROUP_SIZE;
        encode_uleb128(((groups as u64) << 1) | 1, &mut self.buf);
        for chunk in self.literals.chunks_exact(GROUP_SIZE) {
            let mut group = [0u64; GROUP_SIZE];
            group.copy_from_slice(chunk);
            pack8(&group, self.bit_width as usize, &mut self.buf);
        }
        self.literals.clear();
    }

    /// Flush everything and return the encoded bytes.
    pub fn finish(mut self) -> Vec<u8> {
        self.end_run();
        self.flush_literals();
        self.buf
    }
}

/// Encode all `values` at `bit_width`.
pub fn encode_rle_bp(values: impl IntoIterator<Item = u64>, bit_width: u8) -> Vec<u8> {
    let mut enc = RleBpEncoder::new(bit_width);
    for v in values {
        enc.put(v);
    }
    enc.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(values: &[u64], bit_width: u8) {
        let encoded = encode_rle_bp(values.iter().copied(), bit_width);
        let decoded = decode_rle_bp(&encoded, bit_width, values.len()).unwrap();
        assert_eq!(values, decoded, "bit width: {bit_width}");
    }

    #[test]
    fn representative_widths() {
        for width in [0_u8, 1, 3, 8, 17] {
            let max = if width == 0 { 1 } else { 1u64 << width };
            // Mix of short literal runs and long repeated runs.
            let mut values = Vec::new();
            for i in 0..100 {
                values.push((i * 7919) % max);
            }
            values.extend(std::iter::repeat(max - 1).take(50));
            values.extend((0..13).map(|i| i % max));
            values.extend(std::iter::repeat(0).take(9));
            roundtrip(&values, width);
        }
    }

    #[test]
    fn single_rle_run() {
        let encoded = encode_rle_bp(std::iter::repeat(1).take(100), 1);
        // Header (100 << 1) = 200 as varint, then one byte value.
        assert_eq!(vec![0xC8, 0x01, 0x01], encoded);
        roundtrip(&[1; 100], 1);
    }

    #[test]
    fn literals_topped_up_before_rle() {
        // 3 literals, then a run of 12. 5 values of the run top up the
        // literals to a full group, leaving an RLE run of 7 which is too
        // short. All 15 end up bit-packed.
        let mut values = vec![0, 1, 0];
        values.extend(std::iter::repeat(2).take(12));
        let encoded = encode_rle_bp(values.iter().copied(), 2);
        assert_eq!(0b101, encoded[0]); // 2 groups, bit-packed
        roundtrip(&values, 2);

        // With a longer run the remainder gets RLE encoded.
        let mut values = vec![0, 1, 0];
        values.extend(std::iter::repeat(2).take(20));
        let encoded = encode_rle_bp(values.iter().copied(), 2);
        assert_eq!(0b11, encoded[0]); // 1 group, bit-packed
        roundtrip(&values, 2);
    }

    #[test]
    fn top_up_fills_literal_buffer() {
        // 501 literals, topped up to a full buffer by a run of 10 with 7 of
        // the run left over.
        let mut values: Vec<u64> = (0..501).map(|i| i % 2).collect();
        values.extend(std::iter::repeat(2).take(10));
        let encoded = encode_rle_bp(values.iter().copied(), 2);

        // 63 groups in a one byte header, then the 7 leftovers in a group of
        // their own.
        assert_eq!(0x7F, encoded[0]);
        assert_eq!(0b11, encoded[1 + 63 * 2]);
        assert_eq!(1 + 63 * 2 + 1 + 2, encoded.len());
        roundtrip(&values, 2);
    }

    #[test]
    fn decode_known_bytes() {
        // RLE run of 4 x 5, then one bit-packed group of [0..8) at width 3.
        let buf = [0x08, 0x05, 0x03, 0b10001000, 0b11000110, 0b11111010];
        let values = decode_rle_bp(&buf, 3, 12).unwrap();
        assert_eq!(vec![5, 5, 5, 5, 0, 1, 2, 3, 4, 5, 6, 7], values);
    }

    #[test]
    fn decode_not_enough_values() {
        let buf = [0x08, 0x05];
        let err = decode_rle_bp(&buf, 3, 5).unwrap_err();
        assert_eq!(rivet_error::ErrorKind::InvalidFormat, err.kind());
    }

    #[test]
    fn zero_width_consumes_nothing() {
        let mut dec = RleBpDecoder::new(&[0xFF, 0xFF], 0);
        let mut out = Vec::new();
        dec.decode(5, &mut out).unwrap();
        assert_eq!(vec![0; 5], out);
        assert_eq!(0, dec.bytes_consumed());
    }

    #[test]
    fn decode_in_pieces() {
        let values: Vec<u64> = (0..40).map(|v| v % 6).collect();
        let encoded = encode_rle_bp(values.iter().copied(), 3);

        let mut dec = RleBpDecoder::new(&encoded, 3);
        let mut out = Vec::new();
        dec.decode(3, &mut out).unwrap();
        dec.decode(20, &mut out).unwrap();
        dec.decode(17, &mut out).unwrap();
        assert_eq!(values, out);
    }
}
