//! Frame codecs for the two Modbus encodings
//!
//! ```text
//! RTU: [Unit(1)][FC(1)][Data...][CRC(2)]
//! TCP: [TID(2)][Proto(2)][Len(2)][Unit(1)][FC(1)][Data...]
//! ```
//!
//! The codec is picked once per connection. Decoding has two explicit entry
//! points because RTU shapes the payload of one function code differently for
//! requests and responses.

mod rtu;
mod tcp;

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

use crate::error::ModbusResult;
use crate::frame::Frame;
use crate::function::Direction;
use crate::reader::FrameReader;

/// Wire encoding used on a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    /// Serial framing with CRC
    Rtu,
    /// MBAP framing over a byte stream
    Tcp,
}

impl Codec {
    /// Whether frames carry a meaningful transaction id
    pub fn uses_transaction_id(self) -> bool {
        matches!(self, Codec::Tcp)
    }

    /// Encode an outgoing frame
    ///
    /// `function_code` is the raw byte so exception responses (`fc | 0x80`) can
    /// be emitted. RTU ignores `transaction_id`.
    pub fn encode(
        self,
        transaction_id: u16,
        station_id: u8,
        function_code: u8,
        payload: &[u8],
    ) -> ModbusResult<Vec<u8>> {
        match self {
            Codec::Rtu => Ok(rtu::encode(station_id, function_code, payload)),
            Codec::Tcp => tcp::encode(transaction_id, station_id, function_code, payload),
        }
    }

    /// Decode a frame sent by a controller
    pub async fn decode_as_request<R: AsyncRead + Unpin>(
        self,
        reader: &mut FrameReader<R>,
    ) -> ModbusResult<Frame> {
        self.decode(reader, Direction::Request).await
    }

    /// Decode a frame returned by a device
    pub async fn decode_as_response<R: AsyncRead + Unpin>(
        self,
        reader: &mut FrameReader<R>,
    ) -> ModbusResult<Frame> {
        self.decode(reader, Direction::Response).await
    }

    pub async fn decode<R: AsyncRead + Unpin>(
        self,
        reader: &mut FrameReader<R>,
        direction: Direction,
    ) -> ModbusResult<Frame> {
        match self {
            Codec::Rtu => rtu::decode(reader, direction).await,
            Codec::Tcp => tcp::decode(reader).await,
        }
    }

    /// One-shot decode of a complete frame held in memory
    pub async fn decode_slice(self, bytes: &[u8], direction: Direction) -> ModbusResult<Frame> {
        let mut reader = FrameReader::new(bytes);
        self.decode(&mut reader, direction).await
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Codec::Rtu => f.write_str("RTU"),
            Codec::Tcp => f.write_str("TCP"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder;
    use crate::function::FunctionCode;

    /// Representative request and response payloads for every function code
    fn payloads(fc: FunctionCode, items: usize) -> (Vec<u8>, Vec<u8>) {
        let bits: Vec<bool> = (0..items).map(|i| i % 3 == 0).collect();
        let regs: Vec<u16> = (0..items).map(|i| (i as u16).wrapping_mul(0x0101)).collect();
        let count = items as u16;
        match fc {
            FunctionCode::ReadCoils | FunctionCode::ReadDiscreteInputs => (
                builder::read_request(0x0010, count),
                builder::read_bits_response(&bits).unwrap().data,
            ),
            FunctionCode::ReadHoldingRegisters | FunctionCode::ReadInputRegisters => (
                builder::read_request(0x0010, count),
                builder::read_registers_response(&regs).unwrap().data,
            ),
            FunctionCode::WriteSingleCoil => (
                builder::write_single_coil(0x0020, true),
                builder::write_single_coil(0x0020, true),
            ),
            FunctionCode::WriteSingleRegister => (
                builder::write_single_register(0x0020, 0xBEEF),
                builder::write_single_register(0x0020, 0xBEEF),
            ),
            FunctionCode::WriteMultipleCoils => (
                builder::write_multiple_coils_request(0x0030, count, &bits)
                    .unwrap()
                    .data,
                builder::write_multiple_coils_response(0x0030, count),
            ),
            FunctionCode::WriteMultipleRegisters => (
                builder::write_multiple_registers_request(0x0030, count, &regs)
                    .unwrap()
                    .data,
                builder::write_multiple_registers_response(0x0030, count),
            ),
        }
    }

    async fn assert_roundtrip(codec: Codec, fc: FunctionCode, direction: Direction, payload: &[u8]) {
        let tid = if codec.uses_transaction_id() { 0x1234 } else { 0 };
        let bytes = codec.encode(tid, 0x11, fc.code(), payload).unwrap();
        let frame = codec.decode_slice(&bytes, direction).await.unwrap();

        assert_eq!(frame.transaction_id, tid, "{codec} {fc} {direction}");
        assert_eq!(frame.station_id, 0x11);
        assert_eq!(frame.function_code, fc);
        assert_eq!(frame.payload.as_ref(), payload, "{codec} {fc} {direction}");
        assert_eq!(frame.raw.as_ref(), bytes.as_slice());
    }

    #[tokio::test]
    async fn test_roundtrip_all_codes_both_codecs() {
        for codec in [Codec::Rtu, Codec::Tcp] {
            for fc in FunctionCode::ALL {
                for items in [1usize, 8, 100] {
                    let (request, response) = payloads(fc, items);
                    assert_roundtrip(codec, fc, Direction::Request, &request).await;
                    assert_roundtrip(codec, fc, Direction::Response, &response).await;
                }
            }
        }
    }

    #[tokio::test]
    async fn test_roundtrip_length_extremes() {
        let none: [bool; 0] = [];
        let many = vec![true; 255];
        for codec in [Codec::Rtu, Codec::Tcp] {
            let empty = builder::write_multiple_coils_request(0, 0, &none).unwrap();
            assert!(empty.exception);

            let full = builder::write_multiple_coils_request(0, 255, &many).unwrap();
            assert_eq!(full.data[4], 32);
            assert_roundtrip(codec, FunctionCode::WriteMultipleCoils, Direction::Request, &full.data)
                .await;

            let bits = builder::read_bits_response(&many).unwrap();
            assert_roundtrip(codec, FunctionCode::ReadCoils, Direction::Response, &bits.data).await;

            // Zero data bytes behind the byte count
            assert_roundtrip(codec, FunctionCode::ReadCoils, Direction::Response, &[0x00]).await;

            let regs = builder::read_registers_response(&[0xABCD; 127]).unwrap();
            assert_eq!(regs.data[0], 254);
            assert_roundtrip(
                codec,
                FunctionCode::ReadHoldingRegisters,
                Direction::Response,
                &regs.data,
            )
            .await;
        }
    }

    #[test]
    fn test_exception_function_code_can_be_encoded() {
        let fc = FunctionCode::ReadCoils.exception_code();
        let bytes = Codec::Rtu.encode(0, 1, fc, &[0x06]).unwrap();
        assert_eq!(bytes[1], 0x81);
        assert!(crate::checksum::verify(&bytes));
    }
}
