//! Packing and unpacking groups of 8 values at a fixed bit width.
//!
//! A group of 8 values packed at `num_bits` occupies exactly `num_bits` bytes.
//! Values are packed LSB first.
use num::PrimInt;

/// Number of values in a bit-packed group.
pub const GROUP_SIZE: usize = 8;

/// Unpack a group of 8 values from `input`.
///
/// `input` may be shorter than `num_bits` bytes, in which case missing bits
/// are treated as zero. Some writers truncate the final group of a run.
pub fn unpack8<T: PrimInt>(input: &[u8], num_bits: usize, output: &mut [T; GROUP_SIZE]) {
    debug_assert!(num_bits <= 64);

    if num_bits == 0 {
        output.fill(T::zero());
        return;
    }

    let mask = mask_for(num_bits);
    for (idx, out) in output.iter_mut().enumerate() {
        let start_bit = idx * num_bits;
        let mut value: u128 = 0;
        // At most 9 bytes can hold a 64 bit value starting at an arbitrary bit
        // offset.
        for byte_idx in 0..9 {
            let pos = start_bit / 8 + byte_idx;
            if byte_idx * 8 >= num_bits + start_bit % 8 {
                break;
            }
            let byte = input.get(pos).copied().unwrap_or(0);
            value |= (byte as u128) << (byte_idx * 8);
        }
        let value = ((value >> (start_bit % 8)) as u64) & mask;
        // Caller guarantees T can hold `num_bits`.
        *out = T::from(value).unwrap_or_else(T::zero);
    }
}

/// Pack a group of 8 values, appending exactly `num_bits` bytes to `output`.
///
/// Bits above `num_bits` in each value are ignored.
pub fn pack8<T: PrimInt>(input: &[T; GROUP_SIZE], num_bits: usize, output: &mut Vec<u8>) {
    debug_assert!(num_bits <= 64);

    if num_bits == 0 {
        return;
    }

    let start = output.len();
    output.resize(start + num_bits, 0);
    let packed = &mut output[start..];

    let mask = mask_for(num_bits);
    for (idx, v) in input.iter().enumerate() {
        let value = (v.to_u64().unwrap_or(0) & mask) as u128;
        let start_bit = idx * num_bits;
        let shifted = value << (start_bit % 8);

        let mut byte_idx = start_bit / 8;
        let mut remaining = shifted;
        while remaining != 0 {
            packed[byte_idx] |= remaining as u8;
            remaining >>= 8;
            byte_idx += 1;
        }
    }
}

const fn mask_for(num_bits: usize) -> u64 {
    if num_bits == 64 {
        u64::MAX
    } else {
        (1 << num_bits) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_width_3() {
        // Example from the parquet encoding docs.
        let values: [u32; 8] = [0, 1, 2, 3, 4, 5, 6, 7];
        let mut out = Vec::new();
        pack8(&values, 3, &mut out);
        assert_eq!(vec![0b10001000, 0b11000110, 0b11111010], out);

        let mut unpacked = [0u32; 8];
        unpack8(&out, 3, &mut unpacked);
        assert_eq!(values, unpacked);
    }

    #[test]
    fn pack_full_width() {
        let values: [u64; 8] = [u64::MAX, 0, 1, u64::MAX - 1, 42, 7, 1 << 63, 3];
        let mut out = Vec::new();
        pack8(&values, 64, &mut out);
        assert_eq!(64, out.len());

        let mut unpacked = [0u64; 8];
        unpack8(&out, 64, &mut unpacked);
        assert_eq!(values, unpacked);
    }

    #[test]
    fn unpack_truncated_input() {
        let values: [u8; 8] = [1, 1, 1, 1, 1, 1, 1, 1];
        let mut out = Vec::new();
        pack8(&values, 2, &mut out);
        assert_eq!(2, out.len());

        // Only first 4 values are present.
        let mut unpacked = [9u8; 8];
        unpack8(&out[..1], 2, &mut unpacked);
        assert_eq!([1, 1, 1, 1, 0, 0, 0, 0], unpacked);
    }

    #[test]
    fn zero_width() {
        let mut out = Vec::new();
        pack8(&[5u32; 8], 0, &mut out);
        assert!(out.is_empty());

        let mut unpacked = [1u32; 8];
        unpack8(&[], 0, &mut unpacked);
        assert_eq!([0; 8], unpacked);
    }
}
