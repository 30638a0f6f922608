//! RTU framing: `station ‖ function ‖ payload ‖ crc(lo, hi)`
//!
//! There are no delimiters on the wire, so the payload length is derived from
//! the function code layout table and the embedded byte counts.

use tokio::io::AsyncRead;
use tracing::debug;

use crate::checksum::{checksum, checksum_parts};
use crate::constants::{ADDRESS_COUNT_LEN, RTU_CHECKSUM_LEN, RTU_HEADER_LEN};
use crate::error::{ModbusError, ModbusResult};
use crate::frame::Frame;
use crate::function::{Direction, FunctionCode, PayloadLayout};
use crate::reader::FrameReader;

pub(crate) fn encode(station_id: u8, function_code: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(RTU_HEADER_LEN + payload.len() + RTU_CHECKSUM_LEN);
    frame.push(station_id);
    frame.push(function_code);
    frame.extend_from_slice(payload);
    let header = [station_id, function_code];
    let crc = checksum_parts(&[&header[..], payload]);
    frame.extend_from_slice(&crc);
    frame
}

/// Number of payload bytes that follow the header for this layout
async fn payload_len<R: AsyncRead + Unpin>(
    reader: &mut FrameReader<R>,
    layout: PayloadLayout,
) -> ModbusResult<usize> {
    let len = match layout {
        PayloadLayout::Fixed(n) => n,
        PayloadLayout::ByteCountPrefixed => {
            let head = reader.peek(RTU_HEADER_LEN + 1).await?;
            1 + head[RTU_HEADER_LEN] as usize
        },
        PayloadLayout::AddressCountPrefixed => {
            let at = RTU_HEADER_LEN + ADDRESS_COUNT_LEN;
            let head = reader.peek(at + 1).await?;
            ADDRESS_COUNT_LEN + 1 + head[at] as usize
        },
    };
    Ok(len)
}

pub(crate) async fn decode<R: AsyncRead + Unpin>(
    reader: &mut FrameReader<R>,
    direction: Direction,
) -> ModbusResult<Frame> {
    let (station_id, fc_byte) = {
        let head = reader.peek(RTU_HEADER_LEN).await?;
        (head[0], head[1])
    };

    let function_code = match FunctionCode::try_from(fc_byte) {
        Ok(fc) => fc,
        Err(e) => {
            reader.consume(RTU_HEADER_LEN);
            return Err(e);
        },
    };

    let payload_len = payload_len(reader, function_code.layout(direction)).await?;
    let body_len = RTU_HEADER_LEN + payload_len;
    let frame_len = body_len + RTU_CHECKSUM_LEN;

    reader.peek(frame_len).await?;
    let raw = reader.consume(frame_len);

    let expected = checksum(&raw[..body_len]);
    let actual = [raw[body_len], raw[body_len + 1]];
    if expected != actual {
        debug!(
            "RTU CRC mismatch: {} (calc {:02X?})",
            hex::encode_upper(&raw),
            expected
        );
        return Err(ModbusError::Checksum { expected, actual });
    }

    Ok(Frame {
        transaction_id: 0,
        station_id,
        function_code,
        payload: raw.slice(RTU_HEADER_LEN..body_len),
        raw,
    })
}
