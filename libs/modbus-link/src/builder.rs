//! Payload builder for the eight supported function codes
//!
//! Each function produces the bytes that follow the function code on the
//! wire, for either direction. Builders that can be asked to produce an empty
//! or inconsistent payload answer with the server-device-busy sentinel and
//! flag the result as an exception; the caller then transmits the function
//! code with the exception bit set (see [`BuiltPayload::function_code`]).

use crate::bits::{pack_bits, pack_registers};
use crate::constants::{COIL_OFF, COIL_ON, EXCEPTION_FLAG, EXCEPTION_SERVER_DEVICE_BUSY};
use crate::error::{ModbusError, ModbusResult};
use crate::function::FunctionCode;

/// Payload bytes plus whether they form an exception response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltPayload {
    pub data: Vec<u8>,
    pub exception: bool,
}

impl BuiltPayload {
    fn normal(data: Vec<u8>) -> Self {
        Self {
            data,
            exception: false,
        }
    }

    /// `[0x06]`, server device busy
    pub fn busy() -> Self {
        Self {
            data: vec![EXCEPTION_SERVER_DEVICE_BUSY],
            exception: true,
        }
    }

    /// Function code byte to transmit alongside this payload
    pub fn function_code(&self, fc: FunctionCode) -> u8 {
        if self.exception {
            fc.code() | EXCEPTION_FLAG
        } else {
            fc.code()
        }
    }
}

fn address_pair(address: u16, second: u16) -> Vec<u8> {
    let mut data = Vec::with_capacity(4);
    data.extend_from_slice(&address.to_be_bytes());
    data.extend_from_slice(&second.to_be_bytes());
    data
}

fn byte_count(len: usize) -> ModbusResult<u8> {
    u8::try_from(len).map_err(|_| {
        ModbusError::invalid_length(format!("{len} data bytes exceed the one-byte byte count"))
    })
}

/// Read request for FC01-FC04: `address ‖ count`
pub fn read_request(address: u16, count: u16) -> Vec<u8> {
    address_pair(address, count)
}

/// Read coils / discrete inputs response: `byteCount ‖ packed bits`
pub fn read_bits_response(values: &[bool]) -> ModbusResult<BuiltPayload> {
    if values.is_empty() {
        return Ok(BuiltPayload::busy());
    }
    let packed = pack_bits(values);
    let mut data = Vec::with_capacity(1 + packed.len());
    data.push(byte_count(packed.len())?);
    data.extend_from_slice(&packed);
    Ok(BuiltPayload::normal(data))
}

/// Read holding / input registers response: `byteCount ‖ registers`
pub fn read_registers_response(values: &[u16]) -> ModbusResult<BuiltPayload> {
    if values.is_empty() {
        return Ok(BuiltPayload::busy());
    }
    let packed = pack_registers(values);
    let mut data = Vec::with_capacity(1 + packed.len());
    data.push(byte_count(packed.len())?);
    data.extend_from_slice(&packed);
    Ok(BuiltPayload::normal(data))
}

/// FC05 request or echo: `address ‖ 0xFF00 | 0x0000`
pub fn write_single_coil(address: u16, value: bool) -> Vec<u8> {
    address_pair(address, if value { COIL_ON } else { COIL_OFF })
}

/// FC06 request or echo: `address ‖ value`
pub fn write_single_register(address: u16, value: u16) -> Vec<u8> {
    address_pair(address, value)
}

/// FC15 request: `address ‖ count ‖ byteCount ‖ packed bits`
///
/// Answers busy when `values` is empty or its length differs from `count`.
pub fn write_multiple_coils_request(
    address: u16,
    count: u16,
    values: &[bool],
) -> ModbusResult<BuiltPayload> {
    if values.is_empty() || usize::from(count) != values.len() {
        return Ok(BuiltPayload::busy());
    }
    let packed = pack_bits(values);
    let mut data = address_pair(address, count);
    data.push(byte_count(packed.len())?);
    data.extend_from_slice(&packed);
    Ok(BuiltPayload::normal(data))
}

/// FC15 acknowledgment: `address ‖ count`
pub fn write_multiple_coils_response(address: u16, count: u16) -> Vec<u8> {
    address_pair(address, count)
}

/// FC16 request: `address ‖ count ‖ byteCount ‖ registers`
///
/// Answers busy when `values` is empty or its length differs from `count`.
pub fn write_multiple_registers_request(
    address: u16,
    count: u16,
    values: &[u16],
) -> ModbusResult<BuiltPayload> {
    if values.is_empty() || usize::from(count) != values.len() {
        return Ok(BuiltPayload::busy());
    }
    let packed = pack_registers(values);
    let mut data = address_pair(address, count);
    data.push(byte_count(packed.len())?);
    data.extend_from_slice(&packed);
    Ok(BuiltPayload::normal(data))
}

/// FC16 acknowledgment: `address ‖ count`
pub fn write_multiple_registers_response(address: u16, count: u16) -> Vec<u8> {
    address_pair(address, count)
}
