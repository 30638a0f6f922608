//! Typed extraction from decoded frames
//!
//! Every accessor first checks the frame's function code, then the payload
//! length, and only then reads values. Layouts mirror [`crate::builder`].

use crate::bits::{unpack_bits, unpack_registers};
use crate::constants::{ADDRESS_COUNT_LEN, COIL_OFF, COIL_ON};
use crate::error::{ModbusError, ModbusResult};
use crate::frame::Frame;
use crate::function::FunctionCode;

/// Decoded FC15 request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteCoilsRequest {
    pub address: u16,
    pub count: u16,
    pub values: Vec<bool>,
}

/// Decoded FC16 request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRegistersRequest {
    pub address: u16,
    pub count: u16,
    pub values: Vec<u16>,
}

/// Borrowing view over a frame's payload
#[derive(Debug, Clone, Copy)]
pub struct DataParser<'a> {
    frame: &'a Frame,
}

impl Frame {
    pub fn parser(&self) -> DataParser<'_> {
        DataParser::new(self)
    }
}

impl<'a> DataParser<'a> {
    pub fn new(frame: &'a Frame) -> Self {
        Self { frame }
    }

    fn expect(&self, fc: FunctionCode) -> ModbusResult<&'a [u8]> {
        if self.frame.function_code != fc {
            return Err(ModbusError::FunctionCodeMismatch {
                expected: fc.code(),
                actual: self.frame.function_code.code(),
            });
        }
        Ok(&self.frame.payload)
    }

    fn address_pair(&self, fc: FunctionCode) -> ModbusResult<(u16, u16)> {
        let payload = self.expect(fc)?;
        if payload.len() != ADDRESS_COUNT_LEN {
            return Err(ModbusError::invalid_length(format!(
                "{fc} expects {ADDRESS_COUNT_LEN} payload bytes, got {}",
                payload.len()
            )));
        }
        Ok(split_pair(payload))
    }

    /// `(address, count)` of an FC01-FC04 request
    pub fn read_request(&self, fc: FunctionCode) -> ModbusResult<(u16, u16)> {
        self.address_pair(fc)
    }

    /// Unpack `count` coil or discrete input states
    pub fn bits_response(&self, fc: FunctionCode, count: u16) -> ModbusResult<Vec<bool>> {
        let data = byte_counted(self.expect(fc)?, fc)?;
        unpack_bits(data, usize::from(count)).ok_or_else(|| {
            ModbusError::invalid_length(format!(
                "{count} bits requested, payload carries {}",
                data.len() * 8
            ))
        })
    }

    /// Holding or input register values
    pub fn registers_response(&self, fc: FunctionCode) -> ModbusResult<Vec<u16>> {
        let data = byte_counted(self.expect(fc)?, fc)?;
        if data.len() % 2 != 0 {
            return Err(ModbusError::invalid_length(format!(
                "odd register byte count {}",
                data.len()
            )));
        }
        Ok(unpack_registers(data))
    }

    /// FC05 request or echo
    pub fn write_single_coil(&self) -> ModbusResult<(u16, bool)> {
        let (address, status) = self.address_pair(FunctionCode::WriteSingleCoil)?;
        match status {
            COIL_ON => Ok((address, true)),
            COIL_OFF => Ok((address, false)),
            other => Err(ModbusError::invalid_value(format!(
                "coil status 0x{other:04X}, expected 0xFF00 or 0x0000"
            ))),
        }
    }

    /// FC06 request or echo
    pub fn write_single_register(&self) -> ModbusResult<(u16, u16)> {
        self.address_pair(FunctionCode::WriteSingleRegister)
    }

    pub fn write_multiple_coils_request(&self) -> ModbusResult<WriteCoilsRequest> {
        let fc = FunctionCode::WriteMultipleCoils;
        let (address, count, data) = address_count_prefixed(self.expect(fc)?, fc)?;
        let expected = usize::from(count).div_ceil(8);
        if data.len() != expected {
            return Err(ModbusError::invalid_length(format!(
                "{count} coils need {expected} bytes, byte count says {}",
                data.len()
            )));
        }
        let values = unpack_bits(data, usize::from(count))
            .ok_or_else(|| ModbusError::invalid_length("coil data shorter than count"))?;
        Ok(WriteCoilsRequest {
            address,
            count,
            values,
        })
    }

    pub fn write_multiple_coils_response(&self) -> ModbusResult<(u16, u16)> {
        self.address_pair(FunctionCode::WriteMultipleCoils)
    }

    pub fn write_multiple_registers_request(&self) -> ModbusResult<WriteRegistersRequest> {
        let fc = FunctionCode::WriteMultipleRegisters;
        let (address, count, data) = address_count_prefixed(self.expect(fc)?, fc)?;
        if data.len() != usize::from(count) * 2 {
            return Err(ModbusError::invalid_length(format!(
                "{count} registers need {} bytes, byte count says {}",
                usize::from(count) * 2,
                data.len()
            )));
        }
        Ok(WriteRegistersRequest {
            address,
            count,
            values: unpack_registers(data),
        })
    }

    pub fn write_multiple_registers_response(&self) -> ModbusResult<(u16, u16)> {
        self.address_pair(FunctionCode::WriteMultipleRegisters)
    }
}

fn split_pair(bytes: &[u8]) -> (u16, u16) {
    (
        u16::from_be_bytes([bytes[0], bytes[1]]),
        u16::from_be_bytes([bytes[2], bytes[3]]),
    )
}

/// `byteCount ‖ data`, with byteCount equal to the remaining length
fn byte_counted(payload: &[u8], fc: FunctionCode) -> ModbusResult<&[u8]> {
    let (&count, data) = payload
        .split_first()
        .ok_or_else(|| ModbusError::invalid_length(format!("{fc} response without byte count")))?;
    if usize::from(count) != data.len() {
        return Err(ModbusError::invalid_length(format!(
            "byte count {count} but {} data bytes follow",
            data.len()
        )));
    }
    Ok(data)
}

/// `address ‖ count ‖ byteCount ‖ data`
fn address_count_prefixed(payload: &[u8], fc: FunctionCode) -> ModbusResult<(u16, u16, &[u8])> {
    if payload.len() < ADDRESS_COUNT_LEN + 1 {
        return Err(ModbusError::invalid_length(format!(
            "{fc} request of {} bytes is shorter than its header",
            payload.len()
        )));
    }
    let (address, count) = split_pair(payload);
    let data = byte_counted(&payload[ADDRESS_COUNT_LEN..], fc)?;
    Ok((address, count, data))
}
