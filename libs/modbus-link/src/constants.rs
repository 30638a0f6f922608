//! Modbus protocol constants
//!
//! Wire-level sizes, the eight supported function codes, protocol limits and
//! default timings used by the client and transports.

use std::time::Duration;

// ============================================================================
// Frame Size Constants
// ============================================================================

/// MBAP header length as handled by the TCP codec
/// Format: Transaction ID(2) + Protocol ID(2) + Length(2) + Unit ID(1) + Function Code(1) = 8 bytes
pub const MBAP_HEADER_LEN: usize = 8;

/// Bytes of the MBAP length field that precede the payload (Unit ID + Function Code)
pub const MBAP_LENGTH_OVERHEAD: usize = 2;

/// Fixed protocol identifier carried in every MBAP header
pub const MBAP_PROTOCOL_ID: u16 = 0x0000;

/// Station id + function code at the head of an RTU frame
pub const RTU_HEADER_LEN: usize = 2;

/// CRC length at the tail of an RTU frame
pub const RTU_CHECKSUM_LEN: usize = 2;

/// Address(2) + count/value(2)
pub const ADDRESS_COUNT_LEN: usize = 4;

/// Maximum PDU size per Modbus specification
/// RS485 ADU (256 bytes) - Slave Address (1 byte) - CRC (2 bytes) = 253 bytes
pub const MAX_PDU_SIZE: usize = 253;

// ============================================================================
// Register / Coil Limits
// ============================================================================

/// FC01/FC02: 1 + 1 + ceil(N / 8) <= 253, rounded down to 2000
pub const MAX_READ_COILS: u16 = 2000;

/// FC03/FC04: 1 + 1 + 2N <= 253
pub const MAX_READ_REGISTERS: u16 = 125;

/// FC15: 1 + 2 + 2 + 1 + ceil(N / 8) <= 253, conservative 0x7B0
pub const MAX_WRITE_COILS: u16 = 1968;

/// FC16: 1 + 2 + 2 + 1 + 2N <= 253
pub const MAX_WRITE_REGISTERS: u16 = 123;

// ============================================================================
// Modbus Function Codes
// ============================================================================

/// Read Coils (FC01)
pub const FC_READ_COILS: u8 = 0x01;

/// Read Discrete Inputs (FC02)
pub const FC_READ_DISCRETE_INPUTS: u8 = 0x02;

/// Read Holding Registers (FC03)
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;

/// Read Input Registers (FC04)
pub const FC_READ_INPUT_REGISTERS: u8 = 0x04;

/// Write Single Coil (FC05)
pub const FC_WRITE_SINGLE_COIL: u8 = 0x05;

/// Write Single Register (FC06)
pub const FC_WRITE_SINGLE_REGISTER: u8 = 0x06;

/// Write Multiple Coils (FC15)
pub const FC_WRITE_MULTIPLE_COILS: u8 = 0x0F;

/// Write Multiple Registers (FC16)
pub const FC_WRITE_MULTIPLE_REGISTERS: u8 = 0x10;

/// Added to a function code to mark an exception response
pub const EXCEPTION_FLAG: u8 = 0x80;

/// Server Device Busy, returned as the payload of an empty read response
pub const EXCEPTION_SERVER_DEVICE_BUSY: u8 = 0x06;

// ============================================================================
// Coil Encodings (FC05)
// ============================================================================

/// Single coil ON
pub const COIL_ON: u16 = 0xFF00;

/// Single coil OFF
pub const COIL_OFF: u16 = 0x0000;

// ============================================================================
// Timing Defaults
// ============================================================================

/// Modbus TCP default port
pub const DEFAULT_TCP_PORT: u16 = 502;

/// Delay between writing a request and reading its response
pub const DEFAULT_INTER_FRAME_DELAY: Duration = Duration::from_millis(20);

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(2);

pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(2);

/// Default bounded queue depth for stream capture
pub const DEFAULT_CAPTURE_QUEUE: usize = 64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_size_constants() {
        assert_eq!(MBAP_HEADER_LEN, 8);
        assert_eq!(RTU_HEADER_LEN + RTU_CHECKSUM_LEN, 4);
        assert_eq!(MAX_PDU_SIZE, 253);
    }

    #[test]
    fn test_register_limits() {
        let read_pdu_size = 1 + 1 + (MAX_READ_REGISTERS as usize * 2);
        assert!(read_pdu_size <= MAX_PDU_SIZE);

        let write_pdu_size = 1 + 2 + 2 + 1 + (MAX_WRITE_REGISTERS as usize * 2);
        assert!(write_pdu_size <= MAX_PDU_SIZE);
    }

    #[test]
    fn test_coil_limits() {
        let read_coil_pdu = 1 + 1 + (MAX_READ_COILS as usize).div_ceil(8);
        assert!(read_coil_pdu <= MAX_PDU_SIZE);

        let write_coil_pdu = 1 + 2 + 2 + 1 + (MAX_WRITE_COILS as usize).div_ceil(8);
        assert!(write_coil_pdu <= MAX_PDU_SIZE);
    }
}
