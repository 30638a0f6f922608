//! Function codes and their payload layouts
//!
//! The byte layout of a payload depends on the function code and on the
//! direction of the frame. That mapping lives here as plain data so the codecs
//! stay free of per-code branching.

use std::fmt;

use crate::constants::*;
use crate::error::ModbusError;

/// The eight supported data-access function codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FunctionCode {
    ReadCoils = FC_READ_COILS,
    ReadDiscreteInputs = FC_READ_DISCRETE_INPUTS,
    ReadHoldingRegisters = FC_READ_HOLDING_REGISTERS,
    ReadInputRegisters = FC_READ_INPUT_REGISTERS,
    WriteSingleCoil = FC_WRITE_SINGLE_COIL,
    WriteSingleRegister = FC_WRITE_SINGLE_REGISTER,
    WriteMultipleCoils = FC_WRITE_MULTIPLE_COILS,
    WriteMultipleRegisters = FC_WRITE_MULTIPLE_REGISTERS,
}

/// Which side of a transaction a frame belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Sent by a controller (master) to a device
    Request,
    /// Returned by a device (slave) to the controller
    Response,
}

/// Payload shape that follows the function code on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadLayout {
    /// Exactly this many bytes
    Fixed(usize),
    /// Address(2) + count(2) + byte count(1) + `byte count` bytes
    AddressCountPrefixed,
    /// Byte count(1) + `byte count` bytes
    ByteCountPrefixed,
}

impl FunctionCode {
    pub const ALL: [FunctionCode; 8] = [
        FunctionCode::ReadCoils,
        FunctionCode::ReadDiscreteInputs,
        FunctionCode::ReadHoldingRegisters,
        FunctionCode::ReadInputRegisters,
        FunctionCode::WriteSingleCoil,
        FunctionCode::WriteSingleRegister,
        FunctionCode::WriteMultipleCoils,
        FunctionCode::WriteMultipleRegisters,
    ];

    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Function code byte of the matching exception response
    #[inline]
    pub fn exception_code(self) -> u8 {
        self.code() | EXCEPTION_FLAG
    }

    pub fn name(self) -> &'static str {
        match self {
            FunctionCode::ReadCoils => "Read Coils",
            FunctionCode::ReadDiscreteInputs => "Read Discrete Inputs",
            FunctionCode::ReadHoldingRegisters => "Read Holding Registers",
            FunctionCode::ReadInputRegisters => "Read Input Registers",
            FunctionCode::WriteSingleCoil => "Write Single Coil",
            FunctionCode::WriteSingleRegister => "Write Single Register",
            FunctionCode::WriteMultipleCoils => "Write Multiple Coils",
            FunctionCode::WriteMultipleRegisters => "Write Multiple Registers",
        }
    }

    pub fn is_read(self) -> bool {
        matches!(
            self,
            FunctionCode::ReadCoils
                | FunctionCode::ReadDiscreteInputs
                | FunctionCode::ReadHoldingRegisters
                | FunctionCode::ReadInputRegisters
        )
    }

    /// Coils and discrete inputs carry bits, everything else 16-bit registers
    pub fn is_bit_access(self) -> bool {
        matches!(
            self,
            FunctionCode::ReadCoils
                | FunctionCode::ReadDiscreteInputs
                | FunctionCode::WriteSingleCoil
                | FunctionCode::WriteMultipleCoils
        )
    }

    /// Payload layout of a request carrying this function code
    pub fn request_layout(self) -> PayloadLayout {
        match self {
            FunctionCode::WriteMultipleCoils | FunctionCode::WriteMultipleRegisters => {
                PayloadLayout::AddressCountPrefixed
            },
            _ => PayloadLayout::Fixed(ADDRESS_COUNT_LEN),
        }
    }

    /// Payload layout of a response carrying this function code
    ///
    /// Multi-write acknowledgments echo address and count without a byte count.
    pub fn response_layout(self) -> PayloadLayout {
        if self.is_read() {
            PayloadLayout::ByteCountPrefixed
        } else {
            PayloadLayout::Fixed(ADDRESS_COUNT_LEN)
        }
    }

    pub fn layout(self, direction: Direction) -> PayloadLayout {
        match direction {
            Direction::Request => self.request_layout(),
            Direction::Response => self.response_layout(),
        }
    }
}

impl TryFrom<u8> for FunctionCode {
    type Error = ModbusError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            FC_READ_COILS => Ok(FunctionCode::ReadCoils),
            FC_READ_DISCRETE_INPUTS => Ok(FunctionCode::ReadDiscreteInputs),
            FC_READ_HOLDING_REGISTERS => Ok(FunctionCode::ReadHoldingRegisters),
            FC_READ_INPUT_REGISTERS => Ok(FunctionCode::ReadInputRegisters),
            FC_WRITE_SINGLE_COIL => Ok(FunctionCode::WriteSingleCoil),
            FC_WRITE_SINGLE_REGISTER => Ok(FunctionCode::WriteSingleRegister),
            FC_WRITE_MULTIPLE_COILS => Ok(FunctionCode::WriteMultipleCoils),
            FC_WRITE_MULTIPLE_REGISTERS => Ok(FunctionCode::WriteMultipleRegisters),
            other => Err(ModbusError::UnknownFunctionCode(other)),
        }
    }
}

impl From<FunctionCode> for u8 {
    fn from(fc: FunctionCode) -> Self {
        fc.code()
    }
}

impl fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FC{:02X} ({})", self.code(), self.name())
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Request => f.write_str("request"),
            Direction::Response => f.write_str("response"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_from_all_supported() {
        for fc in FunctionCode::ALL {
            assert_eq!(FunctionCode::try_from(fc.code()), Ok(fc));
        }
    }

    #[test]
    fn test_try_from_rejects_others() {
        for value in 0..=255u8 {
            let supported = FunctionCode::ALL.iter().any(|fc| fc.code() == value);
            assert_eq!(FunctionCode::try_from(value).is_ok(), supported);
        }
        assert_eq!(
            FunctionCode::try_from(0x83),
            Err(ModbusError::UnknownFunctionCode(0x83))
        );
    }

    #[test]
    fn test_exception_code() {
        assert_eq!(FunctionCode::ReadHoldingRegisters.exception_code(), 0x83);
        assert_eq!(FunctionCode::WriteMultipleRegisters.exception_code(), 0x90);
    }

    #[test]
    fn test_request_layout_table() {
        use FunctionCode::*;
        for fc in [
            ReadCoils,
            ReadDiscreteInputs,
            ReadHoldingRegisters,
            ReadInputRegisters,
            WriteSingleCoil,
            WriteSingleRegister,
        ] {
            assert_eq!(fc.request_layout(), PayloadLayout::Fixed(4), "{fc}");
        }
        assert_eq!(
            WriteMultipleCoils.request_layout(),
            PayloadLayout::AddressCountPrefixed
        );
        assert_eq!(
            WriteMultipleRegisters.request_layout(),
            PayloadLayout::AddressCountPrefixed
        );
    }

    #[test]
    fn test_response_layout_table() {
        use FunctionCode::*;
        for fc in [ReadCoils, ReadDiscreteInputs, ReadHoldingRegisters, ReadInputRegisters] {
            assert_eq!(fc.response_layout(), PayloadLayout::ByteCountPrefixed, "{fc}");
        }
        for fc in [
            WriteSingleCoil,
            WriteSingleRegister,
            WriteMultipleCoils,
            WriteMultipleRegisters,
        ] {
            assert_eq!(fc.response_layout(), PayloadLayout::Fixed(4), "{fc}");
        }
    }

    #[test]
    fn test_classification() {
        assert!(FunctionCode::ReadInputRegisters.is_read());
        assert!(!FunctionCode::WriteSingleCoil.is_read());
        assert!(FunctionCode::WriteMultipleCoils.is_bit_access());
        assert!(!FunctionCode::ReadHoldingRegisters.is_bit_access());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            FunctionCode::ReadHoldingRegisters.to_string(),
            "FC03 (Read Holding Registers)"
        );
        assert_eq!(Direction::Response.to_string(), "response");
    }
}
