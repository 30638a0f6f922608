//! Decoded Modbus frame
//!
//! A frame is the unit of protocol exchange for both encodings. The TCP codec
//! fills the transaction id from the MBAP header; RTU frames always carry 0.

use std::fmt;

use bytes::Bytes;

use crate::function::FunctionCode;

/// One decoded frame, with the wire-exact bytes it was decoded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// MBAP transaction identifier (0 for RTU)
    pub transaction_id: u16,
    /// Station (unit) id
    pub station_id: u8,
    pub function_code: FunctionCode,
    /// Function-code specific data following the function code
    pub payload: Bytes,
    /// Complete frame as it appeared on the wire
    pub raw: Bytes,
}

impl Frame {
    /// Hex rendering of the wire bytes for logs
    pub fn raw_hex(&self) -> String {
        hex::encode_upper(&self.raw)
    }

    /// Transaction, station and function code triple used to pair a response with its request
    pub fn key(&self) -> (u16, u8, u8) {
        (self.transaction_id, self.station_id, self.function_code.code())
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tid={} station={} {} payload={}",
            self.transaction_id,
            self.station_id,
            self.function_code,
            hex::encode_upper(&self.payload)
        )
    }
}
