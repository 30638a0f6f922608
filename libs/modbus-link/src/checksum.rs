//! RTU error-detection code (CRC-16/MODBUS)
//!
//! Register seeded with 0xFFFF, reflected polynomial 0xA001, emitted low byte
//! first on the wire.

use crc::{Crc, CRC_16_MODBUS};

const MODBUS_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// Compute the two checksum bytes for `data`, low byte first
#[inline]
pub fn checksum(data: &[u8]) -> [u8; 2] {
    MODBUS_CRC.checksum(data).to_le_bytes()
}

/// Compute the checksum over several consecutive slices without joining them
pub fn checksum_parts(parts: &[&[u8]]) -> [u8; 2] {
    let mut digest = MODBUS_CRC.digest();
    for part in parts {
        digest.update(part);
    }
    digest.finalize().to_le_bytes()
}

/// Check that the last two bytes of `frame` are the checksum of the rest
pub fn verify(frame: &[u8]) -> bool {
    if frame.len() < 2 {
        return false;
    }
    let (body, tail) = frame.split_at(frame.len() - 2);
    checksum(body) == [tail[0], tail[1]]
}
