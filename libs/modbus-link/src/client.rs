//! Transaction client
//!
//! One request is in flight at a time. Each operation runs the same sequence:
//! allocate a transaction id, build the payload, encode and write, wait the
//! inter-frame delay, decode the response under the read timeout, check that
//! it answers the request, then parse it.
//!
//! All operations take `&mut self`; share a client across tasks behind a
//! `tokio::sync::Mutex`.

use std::fmt;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::builder::{self, BuiltPayload};
use crate::codec::Codec;
use crate::constants::{
    DEFAULT_INTER_FRAME_DELAY, MAX_READ_COILS, MAX_READ_REGISTERS, MAX_WRITE_COILS,
    MAX_WRITE_REGISTERS,
};
use crate::error::{ModbusError, ModbusResult};
use crate::frame::Frame;
use crate::function::FunctionCode;
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    Connected,
    Sending,
    AwaitingResponse,
}

/// Which way a monitored frame travelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDirection {
    Sent,
    Received,
}

/// Callback invoked with every raw frame sent and received
pub type FrameMonitor = Box<dyn Fn(FrameDirection, &[u8]) + Send + Sync>;

pub struct ModbusClient {
    codec: Codec,
    transport: Transport,
    state: ClientState,
    /// Last issued TCP transaction id, 0 before the first request
    transaction_id: u16,
    inter_frame_delay: Duration,
    monitor: Option<FrameMonitor>,
}

impl fmt::Debug for ModbusClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModbusClient")
            .field("codec", &self.codec)
            .field("transport", &self.transport)
            .field("state", &self.state)
            .field("transaction_id", &self.transaction_id)
            .field("inter_frame_delay", &self.inter_frame_delay)
            .finish_non_exhaustive()
    }
}

impl ModbusClient {
    pub fn new(codec: Codec, transport: Transport) -> Self {
        Self {
            codec,
            transport,
            state: ClientState::Disconnected,
            transaction_id: 0,
            inter_frame_delay: DEFAULT_INTER_FRAME_DELAY,
            monitor: None,
        }
    }

    /// Pause between writing a request and reading its response
    pub fn with_inter_frame_delay(mut self, delay: Duration) -> Self {
        self.inter_frame_delay = delay;
        self
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.transport.set_read_timeout(read_timeout);
        self
    }

    pub fn set_frame_monitor<F>(&mut self, monitor: F)
    where
        F: Fn(FrameDirection, &[u8]) + Send + Sync + 'static,
    {
        self.monitor = Some(Box::new(monitor));
    }

    pub fn clear_frame_monitor(&mut self) {
        self.monitor = None;
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn is_tcp(&self) -> bool {
        self.codec == Codec::Tcp
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub fn endpoint(&self) -> String {
        self.transport.endpoint()
    }

    /// Open the link and restart transaction ids at 1
    pub async fn connect(&mut self) -> ModbusResult<()> {
        if let Err(e) = self.transport.connect().await {
            // the previous link is already closed at this point
            self.state = ClientState::Disconnected;
            return Err(e);
        }
        self.transaction_id = 0;
        self.state = ClientState::Connected;
        info!("Modbus {} client connected: {}", self.codec, self.endpoint());
        Ok(())
    }

    pub async fn close(&mut self) {
        self.transport.close().await;
        self.state = ClientState::Disconnected;
    }

    /// Discard received bytes that were never decoded
    pub fn flush(&mut self) -> ModbusResult<usize> {
        self.transport.flush()
    }

    /// Next transaction id: 1..=65535 then back to 1 for TCP, always 0 for RTU
    pub fn next_transaction_id(&mut self) -> u16 {
        if !self.codec.uses_transaction_id() {
            return 0;
        }
        self.transaction_id = match self.transaction_id {
            u16::MAX => 1,
            id => id + 1,
        };
        self.transaction_id
    }

    // ========================================================================
    // Operations
    // ========================================================================

    pub async fn read_coils(
        &mut self,
        station_id: u8,
        address: u16,
        count: u16,
    ) -> ModbusResult<Vec<bool>> {
        self.read_bits(FunctionCode::ReadCoils, station_id, address, count)
            .await
    }

    pub async fn read_discrete_inputs(
        &mut self,
        station_id: u8,
        address: u16,
        count: u16,
    ) -> ModbusResult<Vec<bool>> {
        self.read_bits(FunctionCode::ReadDiscreteInputs, station_id, address, count)
            .await
    }

    pub async fn read_holding_registers(
        &mut self,
        station_id: u8,
        address: u16,
        count: u16,
    ) -> ModbusResult<Vec<u16>> {
        self.read_registers(FunctionCode::ReadHoldingRegisters, station_id, address, count)
            .await
    }

    pub async fn read_input_registers(
        &mut self,
        station_id: u8,
        address: u16,
        count: u16,
    ) -> ModbusResult<Vec<u16>> {
        self.read_registers(FunctionCode::ReadInputRegisters, station_id, address, count)
            .await
    }

    /// Returns the `(address, value)` echoed by the device
    pub async fn write_single_coil(
        &mut self,
        station_id: u8,
        address: u16,
        value: bool,
    ) -> ModbusResult<(u16, bool)> {
        let payload = builder::write_single_coil(address, value);
        let frame = self
            .transact(station_id, FunctionCode::WriteSingleCoil, &payload)
            .await?;
        frame.parser().write_single_coil()
    }

    /// Returns the `(address, value)` echoed by the device
    pub async fn write_single_register(
        &mut self,
        station_id: u8,
        address: u16,
        value: u16,
    ) -> ModbusResult<(u16, u16)> {
        let payload = builder::write_single_register(address, value);
        let frame = self
            .transact(station_id, FunctionCode::WriteSingleRegister, &payload)
            .await?;
        frame.parser().write_single_register()
    }

    /// Returns the `(address, count)` acknowledged by the device
    pub async fn write_multiple_coils(
        &mut self,
        station_id: u8,
        address: u16,
        values: &[bool],
    ) -> ModbusResult<(u16, u16)> {
        let fc = FunctionCode::WriteMultipleCoils;
        let count = check_write(fc, address, values.len(), MAX_WRITE_COILS)?;
        let payload = request_payload(
            fc,
            builder::write_multiple_coils_request(address, count, values)?,
        )?;
        let frame = self.transact(station_id, fc, &payload).await?;
        frame.parser().write_multiple_coils_response()
    }

    /// Returns the `(address, count)` acknowledged by the device
    pub async fn write_multiple_registers(
        &mut self,
        station_id: u8,
        address: u16,
        values: &[u16],
    ) -> ModbusResult<(u16, u16)> {
        let fc = FunctionCode::WriteMultipleRegisters;
        let count = check_write(fc, address, values.len(), MAX_WRITE_REGISTERS)?;
        let payload = request_payload(
            fc,
            builder::write_multiple_registers_request(address, count, values)?,
        )?;
        let frame = self.transact(station_id, fc, &payload).await?;
        frame.parser().write_multiple_registers_response()
    }

    async fn read_bits(
        &mut self,
        fc: FunctionCode,
        station_id: u8,
        address: u16,
        count: u16,
    ) -> ModbusResult<Vec<bool>> {
        check_read(fc, address, count, MAX_READ_COILS)?;
        let payload = builder::read_request(address, count);
        let frame = self.transact(station_id, fc, &payload).await?;
        frame.parser().bits_response(fc, count)
    }

    async fn read_registers(
        &mut self,
        fc: FunctionCode,
        station_id: u8,
        address: u16,
        count: u16,
    ) -> ModbusResult<Vec<u16>> {
        check_read(fc, address, count, MAX_READ_REGISTERS)?;
        let payload = builder::read_request(address, count);
        let frame = self.transact(station_id, fc, &payload).await?;
        let values = frame.parser().registers_response(fc)?;
        if values.len() != usize::from(count) {
            debug!("{} asked {} registers, got {}", fc, count, values.len());
        }
        Ok(values)
    }

    // ========================================================================
    // Transaction
    // ========================================================================

    /// Send one request and return the matching response frame
    pub async fn transact(
        &mut self,
        station_id: u8,
        fc: FunctionCode,
        payload: &[u8],
    ) -> ModbusResult<Frame> {
        if !self.transport.is_connected() {
            return Err(ModbusError::NoConnection);
        }

        let tid = self.next_transaction_id();
        let request = self.codec.encode(tid, station_id, fc.code(), payload)?;

        self.state = ClientState::Sending;
        let result = self.exchange(tid, station_id, fc, &request).await;

        match &result {
            Ok(_) => self.state = ClientState::Connected,
            Err(e) if e.needs_reconnect() => {
                warn!("{} link lost: {}", self.codec, e);
                self.transport.close().await;
                self.state = ClientState::Disconnected;
            },
            Err(e) => {
                debug!("{} transaction failed: {}", self.codec, e);
                // Leftovers of a bad or late frame must not be paired with the next request
                if let Err(flush_err) = self.transport.flush() {
                    debug!("{} flush after failure skipped: {}", self.codec, flush_err);
                }
                self.state = ClientState::Connected;
            },
        }
        result
    }

    async fn exchange(
        &mut self,
        tid: u16,
        station_id: u8,
        fc: FunctionCode,
        request: &[u8],
    ) -> ModbusResult<Frame> {
        debug!("{} TX: {}", self.codec, hex::encode_upper(request));
        self.notify(FrameDirection::Sent, request);
        self.transport.write_frame(request).await?;

        if !self.inter_frame_delay.is_zero() {
            sleep(self.inter_frame_delay).await;
        }

        self.state = ClientState::AwaitingResponse;
        let codec = self.codec;
        let read_timeout = self.transport.read_timeout();
        let reader = self.transport.reader()?;
        let response = timeout(read_timeout, codec.decode_as_response(reader))
            .await
            .map_err(|_| {
                ModbusError::timeout(format!("no response to {fc} within {read_timeout:?}"))
            })??;

        debug!("{} RX: {}", self.codec, response.raw_hex());
        self.notify(FrameDirection::Received, &response.raw);

        let (got_tid, got_station, got_fc) = response.key();
        if (got_tid, got_station, got_fc) != (tid, station_id, fc.code()) {
            warn!(
                "Response mismatch: sent tid={} station={} {}, got {}",
                tid, station_id, fc, response
            );
            return Err(ModbusError::ResponseMismatch {
                sent_tid: tid,
                sent_station: station_id,
                sent_fc: fc.code(),
                got_tid,
                got_station,
                got_fc,
            });
        }
        Ok(response)
    }

    fn notify(&self, direction: FrameDirection, bytes: &[u8]) {
        if let Some(monitor) = &self.monitor {
            monitor(direction, bytes);
        }
    }
}

fn check_range(fc: FunctionCode, address: u16, count: usize) -> ModbusResult<()> {
    if usize::from(address) + count > usize::from(u16::MAX) + 1 {
        return Err(ModbusError::invalid_argument(format!(
            "{fc}: address {address} + count {count} runs past 65535"
        )));
    }
    Ok(())
}

fn check_read(fc: FunctionCode, address: u16, count: u16, max: u16) -> ModbusResult<()> {
    if count == 0 || count > max {
        return Err(ModbusError::invalid_argument(format!(
            "{fc}: count {count} outside 1..={max}"
        )));
    }
    check_range(fc, address, usize::from(count))
}

fn check_write(fc: FunctionCode, address: u16, len: usize, max: u16) -> ModbusResult<u16> {
    if len == 0 {
        return Err(ModbusError::invalid_argument(format!("{fc}: nothing to write")));
    }
    if len > usize::from(max) {
        return Err(ModbusError::invalid_argument(format!(
            "{fc}: {len} values exceed the limit of {max}"
        )));
    }
    check_range(fc, address, len)?;
    Ok(len as u16)
}

fn request_payload(fc: FunctionCode, built: BuiltPayload) -> ModbusResult<Vec<u8>> {
    if built.exception {
        return Err(ModbusError::invalid_argument(format!(
            "{fc}: values do not match the declared count"
        )));
    }
    Ok(built.data)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use tokio::io::{AsyncWriteExt, DuplexStream};
    use tokio::task::JoinHandle;
    use tracing_test::traced_test;

    use super::*;
    use crate::reader::FrameReader;
    use crate::transport::{boxed_halves, BoxedReader, BoxedWriter, Connector};

    /// Hands out one in-memory pipe per connect
    #[derive(Debug)]
    struct PipeConnector {
        pipes: Mutex<VecDeque<DuplexStream>>,
    }

    #[async_trait]
    impl Connector for PipeConnector {
        async fn connect(&self) -> ModbusResult<(BoxedReader, BoxedWriter)> {
            let stream = self
                .pipes
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| ModbusError::connection("no more pipes"))?;
            let (r, w) = tokio::io::split(stream);
            Ok(boxed_halves(r, w))
        }

        fn endpoint(&self) -> String {
            "pipe".to_string()
        }
    }

    /// Decodes requests, records them and writes whatever `respond` returns
    fn spawn_device<F>(codec: Codec, stream: DuplexStream, respond: F) -> JoinHandle<Vec<Frame>>
    where
        F: Fn(&Frame) -> Option<Vec<u8>> + Send + 'static,
    {
        tokio::spawn(async move {
            let (r, mut w) = tokio::io::split(stream);
            let mut reader = FrameReader::new(r);
            let mut seen = Vec::new();
            while let Ok(request) = codec.decode_as_request(&mut reader).await {
                if let Some(reply) = respond(&request) {
                    if w.write_all(&reply).await.is_err() {
                        break;
                    }
                }
                seen.push(request);
            }
            seen
        })
    }

    /// Answers FC03 with registers 0..count
    fn holding_registers(codec: Codec) -> impl Fn(&Frame) -> Option<Vec<u8>> + Send + 'static {
        move |req| {
            let (_, count) = req
                .parser()
                .read_request(FunctionCode::ReadHoldingRegisters)
                .ok()?;
            let values: Vec<u16> = (0..count).collect();
            let built = builder::read_registers_response(&values).ok()?;
            codec
                .encode(
                    req.transaction_id,
                    req.station_id,
                    built.function_code(req.function_code),
                    &built.data,
                )
                .ok()
        }
    }

    fn client_with_pipes(codec: Codec, pipes: Vec<DuplexStream>) -> ModbusClient {
        let connector = PipeConnector {
            pipes: Mutex::new(pipes.into()),
        };
        ModbusClient::new(codec, Transport::new(connector))
            .with_inter_frame_delay(Duration::ZERO)
            .with_read_timeout(Duration::from_millis(200))
    }

    async fn connected<F>(codec: Codec, respond: F) -> (ModbusClient, JoinHandle<Vec<Frame>>)
    where
        F: Fn(&Frame) -> Option<Vec<u8>> + Send + 'static,
    {
        let (ours, theirs) = tokio::io::duplex(1024);
        let device = spawn_device(codec, theirs, respond);
        let mut client = client_with_pipes(codec, vec![ours]);
        client.connect().await.unwrap();
        (client, device)
    }

    // ========================================================================
    // Transaction ids
    // ========================================================================

    #[tokio::test]
    async fn test_transaction_ids_increment_from_one() {
        let (mut client, device) = connected(Codec::Tcp, holding_registers(Codec::Tcp)).await;
        for _ in 0..3 {
            assert_eq!(client.read_holding_registers(1, 0, 2).await.unwrap(), vec![0, 1]);
        }
        client.close().await;

        let tids: Vec<u16> = device.await.unwrap().iter().map(|f| f.transaction_id).collect();
        assert_eq!(tids, vec![1, 2, 3]);
    }

    #[test]
    fn test_transaction_id_wraps_to_one() {
        let (ours, _theirs) = tokio::io::duplex(8);
        let mut client = client_with_pipes(Codec::Tcp, vec![ours]);
        client.transaction_id = u16::MAX - 1;
        assert_eq!(client.next_transaction_id(), u16::MAX);
        assert_eq!(client.next_transaction_id(), 1);
    }

    #[test]
    fn test_rtu_transaction_id_is_zero() {
        let (ours, _theirs) = tokio::io::duplex(8);
        let mut client = client_with_pipes(Codec::Rtu, vec![ours]);
        assert!(!client.is_tcp());
        assert_eq!(client.next_transaction_id(), 0);
        assert_eq!(client.next_transaction_id(), 0);
    }

    #[tokio::test]
    async fn test_connect_resets_transaction_ids() {
        let (a_ours, a_theirs) = tokio::io::duplex(1024);
        let (b_ours, b_theirs) = tokio::io::duplex(1024);
        let first = spawn_device(Codec::Tcp, a_theirs, holding_registers(Codec::Tcp));
        let second = spawn_device(Codec::Tcp, b_theirs, holding_registers(Codec::Tcp));

        let mut client = client_with_pipes(Codec::Tcp, vec![a_ours, b_ours]);
        client.connect().await.unwrap();
        client.read_holding_registers(1, 0, 1).await.unwrap();
        client.read_holding_registers(1, 0, 1).await.unwrap();

        client.connect().await.unwrap();
        client.read_holding_registers(1, 0, 1).await.unwrap();
        client.close().await;

        let first_tids: Vec<u16> = first.await.unwrap().iter().map(|f| f.transaction_id).collect();
        let second_tids: Vec<u16> = second.await.unwrap().iter().map(|f| f.transaction_id).collect();
        assert_eq!(first_tids, vec![1, 2]);
        assert_eq!(second_tids, vec![1]);
    }

    #[tokio::test]
    async fn test_failed_reconnect_leaves_client_disconnected() {
        let (mut client, _device) = connected(Codec::Tcp, holding_registers(Codec::Tcp)).await;
        assert_eq!(client.state(), ClientState::Connected);

        let err = client.connect().await.unwrap_err();
        assert!(matches!(err, ModbusError::Connection(_)));
        assert_eq!(client.state(), ClientState::Disconnected);
        assert!(!client.is_connected());
        assert_eq!(
            client.read_holding_registers(1, 0, 1).await,
            Err(ModbusError::NoConnection)
        );
    }

    // ========================================================================
    // Operations
    // ========================================================================

    #[tokio::test]
    async fn test_rtu_read_holding_end_to_end() {
        let (mut client, device) = connected(Codec::Rtu, |_| {
            Some(vec![0x01, 0x03, 0x02, 0x19, 0x98, 0xB2, 0x7E])
        })
        .await;

        let values = client.read_holding_registers(1, 11, 9).await.unwrap();
        assert_eq!(values, vec![0x1998]);
        client.close().await;

        let requests = device.await.unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].raw.as_ref(),
            &[0x01, 0x03, 0x00, 0x0B, 0x00, 0x09, 0xF4, 0x0E]
        );
    }

    #[tokio::test]
    async fn test_read_coils() {
        let codec = Codec::Tcp;
        let (mut client, _device) = connected(codec, move |req| {
            let built = builder::read_bits_response(&[true, false, true]).ok()?;
            codec
                .encode(req.transaction_id, req.station_id, req.function_code.code(), &built.data)
                .ok()
        })
        .await;

        assert_eq!(
            client.read_coils(3, 0, 3).await.unwrap(),
            vec![true, false, true]
        );
    }

    #[tokio::test]
    async fn test_writes_echo_and_acknowledge() {
        let codec = Codec::Rtu;
        let (mut client, device) = connected(codec, move |req| {
            let echo = match req.function_code {
                FunctionCode::WriteSingleCoil | FunctionCode::WriteSingleRegister => {
                    req.payload.to_vec()
                },
                FunctionCode::WriteMultipleCoils | FunctionCode::WriteMultipleRegisters => {
                    req.payload[..4].to_vec()
                },
                _ => return None,
            };
            Some(codec.encode(0, req.station_id, req.function_code.code(), &echo).unwrap())
        })
        .await;

        assert_eq!(client.write_single_coil(2, 0x00AC, true).await, Ok((0x00AC, true)));
        assert_eq!(client.write_single_register(2, 1, 0x0003).await, Ok((1, 3)));
        assert_eq!(
            client.write_multiple_coils(2, 0x13, &[true, false, true]).await,
            Ok((0x13, 3))
        );
        assert_eq!(
            client.write_multiple_registers(2, 1, &[0x000A, 0x0102]).await,
            Ok((1, 2))
        );
        client.close().await;

        let requests = device.await.unwrap();
        assert_eq!(requests.len(), 4);
        let coils = requests[2].parser().write_multiple_coils_request().unwrap();
        assert_eq!(coils.values, vec![true, false, true]);
        let regs = requests[3].parser().write_multiple_registers_request().unwrap();
        assert_eq!(regs.values, vec![0x000A, 0x0102]);
    }

    // ========================================================================
    // Failures
    // ========================================================================

    #[tokio::test]
    async fn test_not_connected() {
        let (ours, _theirs) = tokio::io::duplex(8);
        let mut client = client_with_pipes(Codec::Tcp, vec![ours]);
        assert_eq!(client.state(), ClientState::Disconnected);
        assert_eq!(
            client.read_coils(1, 0, 1).await,
            Err(ModbusError::NoConnection)
        );
    }

    #[tokio::test]
    async fn test_invalid_arguments_rejected_before_write() {
        let (mut client, device) = connected(Codec::Tcp, |_| None).await;

        for result in [
            client.read_coils(1, 0, 0).await.map(|_| ()),
            client.read_coils(1, 0, 2001).await.map(|_| ()),
            client.read_input_registers(1, 0, 126).await.map(|_| ()),
            client.read_holding_registers(1, 0xFFFF, 2).await.map(|_| ()),
            client.write_multiple_coils(1, 0, &[]).await.map(|_| ()),
            client.write_multiple_registers(1, 0, &[0; 124]).await.map(|_| ()),
        ] {
            assert!(matches!(result, Err(ModbusError::InvalidArgument(_))));
        }
        client.close().await;
        assert!(device.await.unwrap().is_empty());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_response_mismatch() {
        let codec = Codec::Tcp;
        let (mut client, _device) = connected(codec, move |req| {
            let built = builder::read_registers_response(&[7]).ok()?;
            // Answer from a different station
            codec
                .encode(req.transaction_id, req.station_id + 1, req.function_code.code(), &built.data)
                .ok()
        })
        .await;

        let err = client.read_holding_registers(1, 0, 1).await.unwrap_err();
        assert_eq!(
            err,
            ModbusError::ResponseMismatch {
                sent_tid: 1,
                sent_station: 1,
                sent_fc: 0x03,
                got_tid: 1,
                got_station: 2,
                got_fc: 0x03,
            }
        );
        assert_eq!(client.state(), ClientState::Connected);
        assert!(client.is_connected());
        assert!(logs_contain("TCP transaction failed"));
        assert!(!logs_contain("flush after failure skipped"));
    }

    #[tokio::test]
    async fn test_exception_response_is_unknown_function_code() {
        let codec = Codec::Rtu;
        let (mut client, _device) = connected(codec, move |req| {
            let busy = BuiltPayload::busy();
            codec
                .encode(0, req.station_id, busy.function_code(req.function_code), &busy.data)
                .ok()
        })
        .await;

        let err = client.read_coils(1, 0, 8).await.unwrap_err();
        assert_eq!(err, ModbusError::UnknownFunctionCode(0x81));
        assert_eq!(client.state(), ClientState::Connected);
    }

    #[tokio::test]
    async fn test_timeout_keeps_connection() {
        let (mut client, _device) = connected(Codec::Tcp, |_| None).await;
        let err = client.read_holding_registers(1, 0, 1).await.unwrap_err();
        assert!(err.is_recoverable(), "{err}");
        assert_eq!(client.state(), ClientState::Connected);
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn test_peer_gone_disconnects() {
        let (ours, theirs) = tokio::io::duplex(1024);
        drop(theirs);
        let mut client = client_with_pipes(Codec::Tcp, vec![ours]);
        client.connect().await.unwrap();

        let err = client.read_holding_registers(1, 0, 1).await.unwrap_err();
        assert!(err.needs_reconnect(), "{err}");
        assert_eq!(client.state(), ClientState::Disconnected);
        assert!(!client.is_connected());
    }

    // ========================================================================
    // Monitoring
    // ========================================================================

    #[tokio::test]
    #[traced_test]
    async fn test_frame_monitor_and_logs() {
        let (mut client, _device) = connected(Codec::Tcp, holding_registers(Codec::Tcp)).await;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        client.set_frame_monitor(move |direction, bytes| {
            sink.lock().unwrap().push((direction, bytes.len()));
        });

        client.read_holding_registers(1, 0, 1).await.unwrap();

        let seen = seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![(FrameDirection::Sent, 12), (FrameDirection::Received, 11)]
        );
        assert!(logs_contain("TCP TX: 000100000006010300000001"));
        assert!(logs_contain("TCP RX:"));
    }
}
