//! Bit and register packing for coil and register payloads
//!
//! Coils use LSB-first ordering: bit 0 of byte 0 is the first item.
//! Registers are 16-bit big-endian.

/// Pack booleans LSB-first, `ceil(n / 8)` bytes
pub fn pack_bits(values: &[bool]) -> Vec<u8> {
    let mut bytes = vec![0u8; values.len().div_ceil(8)];
    for (i, _) in values.iter().enumerate().filter(|(_, on)| **on) {
        set_bit(&mut bytes, i);
    }
    bytes
}

/// Unpack `count` booleans, `None` if `bytes` holds fewer bits
pub fn unpack_bits(bytes: &[u8], count: usize) -> Option<Vec<bool>> {
    if bytes.len() * 8 < count {
        return None;
    }
    Some((0..count).map(|i| extract_bit(bytes, i)).collect())
}

#[inline]
pub fn set_bit(bytes: &mut [u8], bit_position: usize) {
    let byte_index = bit_position / 8;
    if byte_index < bytes.len() {
        bytes[byte_index] |= 1 << (bit_position % 8);
    }
}

#[inline]
pub fn extract_bit(bytes: &[u8], bit_position: usize) -> bool {
    bytes
        .get(bit_position / 8)
        .is_some_and(|byte| (byte >> (bit_position % 8)) & 0x01 != 0)
}

/// Pack registers big-endian, 2 bytes each
pub fn pack_registers(values: &[u16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

/// Unpack big-endian registers; a trailing odd byte is ignored
pub fn unpack_registers(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}
