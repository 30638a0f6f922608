//! Byte transports under the protocol engine
//!
//! A [`Connector`] knows how to open one kind of link (TCP socket, serial
//! port) and hands back boxed read/write halves. [`Transport`] owns the
//! connector plus the live link and applies read/write timeouts.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::constants::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT, DEFAULT_WRITE_TIMEOUT};
use crate::error::{ModbusError, ModbusResult};
use crate::reader::FrameReader;

#[cfg(feature = "rtu")]
use crate::config::Parity;
#[cfg(feature = "rtu")]
use tokio_serial::SerialPortBuilderExt;

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Box a pair of concrete halves
pub fn boxed_halves<R, W>(reader: R, writer: W) -> (BoxedReader, BoxedWriter)
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    (Box::new(reader), Box::new(writer))
}

/// Opens a link and splits it into read and write halves
#[async_trait]
pub trait Connector: Send + Sync + fmt::Debug {
    async fn connect(&self) -> ModbusResult<(BoxedReader, BoxedWriter)>;

    /// Human readable endpoint for logs
    fn endpoint(&self) -> String;
}

/// TCP connector
#[derive(Debug, Clone)]
pub struct TcpConnector {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self) -> ModbusResult<(BoxedReader, BoxedWriter)> {
        let addr = self.endpoint();
        debug!("TCP connecting: {}", addr);

        match timeout(self.connect_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!("TCP_NODELAY: {}", e);
                }
                let (reader, writer) = stream.into_split();
                Ok(boxed_halves(reader, writer))
            },
            Ok(Err(e)) => {
                error!("TCP err: {} - {}", addr, e);
                Err(ModbusError::connection(format!(
                    "Failed to connect to {addr}: {e}"
                )))
            },
            Err(_) => {
                warn!("TCP timeout: {}", addr);
                Err(ModbusError::timeout(format!(
                    "Connection to {addr} timed out"
                )))
            },
        }
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Serial line connector
#[cfg(feature = "rtu")]
#[derive(Debug, Clone)]
pub struct SerialConnector {
    pub device: String,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    pub parity: Parity,
}

#[cfg(feature = "rtu")]
impl SerialConnector {
    pub fn new(device: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            device: device.into(),
            baud_rate,
            data_bits: 8,
            stop_bits: 1,
            parity: Parity::None,
        }
    }

    /// Map the line settings onto `tokio_serial`, rejecting unsupported values
    fn line_settings(
        &self,
    ) -> ModbusResult<(tokio_serial::DataBits, tokio_serial::StopBits, tokio_serial::Parity)> {
        let data_bits = match self.data_bits {
            5 => tokio_serial::DataBits::Five,
            6 => tokio_serial::DataBits::Six,
            7 => tokio_serial::DataBits::Seven,
            8 => tokio_serial::DataBits::Eight,
            other => {
                return Err(ModbusError::config(format!(
                    "data_bits must be 5..=8, got {other}"
                )))
            },
        };
        let stop_bits = match self.stop_bits {
            1 => tokio_serial::StopBits::One,
            2 => tokio_serial::StopBits::Two,
            other => {
                return Err(ModbusError::config(format!(
                    "stop_bits must be 1 or 2, got {other}"
                )))
            },
        };
        let parity = match self.parity {
            Parity::Even => tokio_serial::Parity::Even,
            Parity::Odd => tokio_serial::Parity::Odd,
            Parity::None => tokio_serial::Parity::None,
        };
        Ok((data_bits, stop_bits, parity))
    }
}

#[cfg(feature = "rtu")]
#[async_trait]
impl Connector for SerialConnector {
    async fn connect(&self) -> ModbusResult<(BoxedReader, BoxedWriter)> {
        debug!("RTU: {} @{}baud", self.device, self.baud_rate);

        let (data_bits, stop_bits, parity) = self.line_settings()?;

        match tokio_serial::new(&self.device, self.baud_rate)
            .data_bits(data_bits)
            .parity(parity)
            .stop_bits(stop_bits)
            .open_native_async()
        {
            Ok(port) => {
                let (reader, writer) = tokio::io::split(port);
                Ok(boxed_halves(reader, writer))
            },
            Err(e) => {
                error!("RTU err: {} - {}", self.device, e);
                Err(ModbusError::connection(format!(
                    "Failed to open serial port {}: {e}",
                    self.device
                )))
            },
        }
    }

    fn endpoint(&self) -> String {
        format!("{}@{}", self.device, self.baud_rate)
    }
}

struct Link {
    reader: FrameReader<BoxedReader>,
    writer: BoxedWriter,
}

/// Owned connector plus the currently open link
pub struct Transport {
    connector: Box<dyn Connector>,
    link: Option<Link>,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("connector", &self.connector)
            .field("connected", &self.is_connected())
            .field("read_timeout", &self.read_timeout)
            .field("write_timeout", &self.write_timeout)
            .finish()
    }
}

impl Transport {
    pub fn new(connector: impl Connector + 'static) -> Self {
        Self::from_boxed(Box::new(connector))
    }

    pub fn from_boxed(connector: Box<dyn Connector>) -> Self {
        Self {
            connector,
            link: None,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, read_timeout: Duration, write_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self.write_timeout = write_timeout;
        self
    }

    pub fn set_read_timeout(&mut self, read_timeout: Duration) {
        self.read_timeout = read_timeout;
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn endpoint(&self) -> String {
        self.connector.endpoint()
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// Open the link, replacing any link that is already open
    pub async fn connect(&mut self) -> ModbusResult<()> {
        if self.link.is_some() {
            self.close().await;
        }
        let (reader, writer) = self.connector.connect().await?;
        self.link = Some(Link {
            reader: FrameReader::new(reader),
            writer,
        });
        info!("Link open: {}", self.connector.endpoint());
        Ok(())
    }

    pub async fn close(&mut self) {
        if let Some(mut link) = self.link.take() {
            if let Err(e) = link.writer.shutdown().await {
                debug!("Shutdown {}: {}", self.connector.endpoint(), e);
            }
            info!("Link closed: {}", self.connector.endpoint());
        }
    }

    /// Write one complete frame and flush it
    pub async fn write_frame(&mut self, frame: &[u8]) -> ModbusResult<()> {
        let link = self.link.as_mut().ok_or(ModbusError::NoConnection)?;
        let writer = &mut link.writer;
        timeout(self.write_timeout, async {
            writer.write_all(frame).await?;
            writer.flush().await
        })
        .await
        .map_err(|_| ModbusError::timeout(format!("write of {} bytes timed out", frame.len())))??;
        Ok(())
    }

    pub fn reader(&mut self) -> ModbusResult<&mut FrameReader<BoxedReader>> {
        self.link
            .as_mut()
            .map(|link| &mut link.reader)
            .ok_or(ModbusError::NoConnection)
    }

    /// Drop bytes received but not yet decoded, returning how many
    pub fn flush(&mut self) -> ModbusResult<usize> {
        let dropped = self.reader()?.discard_buffered();
        if dropped > 0 {
            debug!("Flushed {} unread bytes", dropped);
        }
        Ok(dropped)
    }
}
