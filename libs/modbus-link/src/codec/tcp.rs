//! TCP (MBAP) framing
//!
//! `[TID(2)][Proto(2)][Len(2)][Unit(1)][FC(1)][Data...]`, all big-endian.
//! The length field counts unit id, function code and payload. TCP carries no
//! direction marker, so requests and responses decode the same way.

use tokio::io::AsyncRead;
use tracing::debug;

use crate::constants::{MBAP_HEADER_LEN, MBAP_LENGTH_OVERHEAD, MBAP_PROTOCOL_ID};
use crate::error::{ModbusError, ModbusResult};
use crate::frame::Frame;
use crate::function::FunctionCode;
use crate::reader::FrameReader;

pub(crate) fn encode(
    transaction_id: u16,
    station_id: u8,
    function_code: u8,
    payload: &[u8],
) -> ModbusResult<Vec<u8>> {
    let length = u16::try_from(MBAP_LENGTH_OVERHEAD + payload.len()).map_err(|_| {
        ModbusError::invalid_length(format!(
            "payload of {} bytes does not fit the MBAP length field",
            payload.len()
        ))
    })?;

    let mut frame = Vec::with_capacity(MBAP_HEADER_LEN + payload.len());
    frame.extend_from_slice(&transaction_id.to_be_bytes());
    frame.extend_from_slice(&MBAP_PROTOCOL_ID.to_be_bytes());
    frame.extend_from_slice(&length.to_be_bytes());
    frame.push(station_id);
    frame.push(function_code);
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Decode one MBAP frame
///
/// The header is validated while still buffered. A bad protocol id or function
/// code drops a single byte so the caller can resynchronise on the next call.
pub(crate) async fn decode<R: AsyncRead + Unpin>(
    reader: &mut FrameReader<R>,
) -> ModbusResult<Frame> {
    let mut header = [0u8; MBAP_HEADER_LEN];
    header.copy_from_slice(reader.peek(MBAP_HEADER_LEN).await?);

    let transaction_id = u16::from_be_bytes([header[0], header[1]]);
    let protocol_id = u16::from_be_bytes([header[2], header[3]]);
    if protocol_id != MBAP_PROTOCOL_ID {
        reader.consume(1);
        return Err(ModbusError::ProtocolFlag(protocol_id));
    }

    let station_id = header[6];
    let function_code = match FunctionCode::try_from(header[7]) {
        Ok(fc) => fc,
        Err(e) => {
            reader.consume(1);
            return Err(e);
        },
    };

    let length = u16::from_be_bytes([header[4], header[5]]) as usize;
    if length < MBAP_LENGTH_OVERHEAD {
        reader.consume(1);
        return Err(ModbusError::invalid_length(format!(
            "MBAP length {length} shorter than unit id + function code"
        )));
    }

    let frame_len = MBAP_HEADER_LEN + length - MBAP_LENGTH_OVERHEAD;
    reader.peek(frame_len).await?;
    let raw = reader.consume(frame_len);
    debug!("TCP frame tid={} len={}", transaction_id, frame_len);

    Ok(Frame {
        transaction_id,
        station_id,
        function_code,
        payload: raw.slice(MBAP_HEADER_LEN..),
        raw,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_header() {
        let frame = encode(0x0102, 0x11, 0x03, &[0x00, 0x6B, 0x00, 0x03]).unwrap();
        assert_eq!(
            frame,
            vec![0x01, 0x02, 0x00, 0x00, 0x00, 0x06, 0x11, 0x03, 0x00, 0x6B, 0x00, 0x03]
        );
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        let payload = vec![0u8; u16::MAX as usize];
        assert!(matches!(
            encode(1, 1, 0x10, &payload),
            Err(ModbusError::InvalidLength(_))
        ));
    }

    #[tokio::test]
    async fn test_decode_roundtrip() {
        let bytes = encode(42, 0x01, 0x04, &[0x04, 0x00, 0x0A, 0x00, 0x0B]).unwrap();
        let mut reader = FrameReader::new(bytes.as_slice());
        let frame = decode(&mut reader).await.unwrap();

        assert_eq!(frame.transaction_id, 42);
        assert_eq!(frame.station_id, 1);
        assert_eq!(frame.function_code, FunctionCode::ReadInputRegisters);
        assert_eq!(frame.payload.as_ref(), &[0x04, 0x00, 0x0A, 0x00, 0x0B]);
        assert_eq!(frame.raw.as_ref(), bytes.as_slice());
    }

    #[tokio::test]
    async fn test_protocol_flag_error_skips_one_byte() {
        let bytes = [0x00, 0x01, 0x00, 0x01, 0x00, 0x06, 0x01, 0x03, 0x00, 0x00, 0x00, 0x01];
        let mut reader = FrameReader::new(&bytes[..]);
        assert_eq!(
            decode(&mut reader).await,
            Err(ModbusError::ProtocolFlag(0x0001))
        );
        assert_eq!(reader.buffered(), bytes.len() - 1);
    }

    #[tokio::test]
    async fn test_unknown_function_code_skips_one_byte() {
        let bytes = [0x00, 0x01, 0x00, 0x00, 0x00, 0x03, 0x01, 0x83, 0x02];
        let mut reader = FrameReader::new(&bytes[..]);
        assert_eq!(
            decode(&mut reader).await,
            Err(ModbusError::UnknownFunctionCode(0x83))
        );
        assert_eq!(reader.buffered(), bytes.len() - 1);
    }

    #[tokio::test]
    async fn test_resync_after_garbage_prefix() {
        let mut bytes = vec![0xFF];
        bytes.extend(encode(7, 0x01, 0x06, &[0x00, 0x01, 0x00, 0x02]).unwrap());
        let mut reader = FrameReader::new(bytes.as_slice());

        // 0xFF 0x00 | 0x07 0x00 ... protocol id reads as 0x0700
        assert!(matches!(
            decode(&mut reader).await,
            Err(ModbusError::ProtocolFlag(_))
        ));
        let frame = decode(&mut reader).await.unwrap();
        assert_eq!(frame.transaction_id, 7);
    }

    #[tokio::test]
    async fn test_short_length_field_rejected() {
        let bytes = [0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x01, 0x03];
        let mut reader = FrameReader::new(&bytes[..]);
        assert!(matches!(
            decode(&mut reader).await,
            Err(ModbusError::InvalidLength(_))
        ));
    }
}
