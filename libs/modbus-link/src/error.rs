//! Modbus Link Error Types
//!
//! Core error types for framing, parsing, transactions and transports.

use std::io;

use thiserror::Error;

/// Result type for modbus-link operations
pub type ModbusResult<T> = std::result::Result<T, ModbusError>;

/// Modbus link errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModbusError {
    /// Function code outside the eight supported codes
    #[error("Unknown function code: 0x{0:02X}")]
    UnknownFunctionCode(u8),

    /// RTU checksum mismatch, the frame was discarded
    #[error("Checksum error: expected {expected:02X?}, got {actual:02X?}")]
    Checksum { expected: [u8; 2], actual: [u8; 2] },

    /// MBAP protocol identifier is not zero
    #[error("Protocol flag error: protocol id 0x{0:04X}")]
    ProtocolFlag(u16),

    /// Declared or actual payload length failed validation
    #[error("Invalid length: {0}")]
    InvalidLength(String),

    /// Parser invoked against a frame of another function code
    #[error("Function code mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    FunctionCodeMismatch { expected: u8, actual: u8 },

    /// Response does not belong to the request that was sent
    #[error(
        "Response mismatch: sent tid={sent_tid} station={sent_station} fc=0x{sent_fc:02X}, \
         got tid={got_tid} station={got_station} fc=0x{got_fc:02X}"
    )]
    ResponseMismatch {
        sent_tid: u16,
        sent_station: u8,
        sent_fc: u8,
        got_tid: u16,
        got_station: u8,
        got_fc: u8,
    },

    /// Well-formed payload carrying a value the protocol does not allow
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Request arguments rejected before anything was written
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Not connected
    #[error("Not connected")]
    NoConnection,

    /// The byte source reached end of stream
    #[error("End of stream")]
    EndOfStream,

    /// Timeout, the connection is presumed alive
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Peer closed, reset or broken pipe, the connection is presumed dead
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Connect or open failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// Other IO errors
    #[error("IO error: {0}")]
    Io(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<io::Error> for ModbusError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
                ModbusError::Timeout(err.to_string())
            },
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected => ModbusError::ConnectionLost(err.to_string()),
            io::ErrorKind::UnexpectedEof => ModbusError::EndOfStream,
            _ => ModbusError::Io(err.to_string()),
        }
    }
}

impl From<tokio::time::error::Elapsed> for ModbusError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        ModbusError::Timeout(err.to_string())
    }
}

// Helper methods for creating errors
impl ModbusError {
    pub fn invalid_length(msg: impl Into<String>) -> Self {
        ModbusError::InvalidLength(msg.into())
    }

    pub fn invalid_value(msg: impl Into<String>) -> Self {
        ModbusError::InvalidValue(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        ModbusError::InvalidArgument(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        ModbusError::Timeout(msg.into())
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        ModbusError::Connection(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        ModbusError::Config(msg.into())
    }

    /// Timeouts leave the link usable
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ModbusError::Timeout(_))
    }

    /// Check if this error indicates a need for reconnection
    pub fn needs_reconnect(&self) -> bool {
        matches!(
            self,
            ModbusError::ConnectionLost(_)
                | ModbusError::Connection(_)
                | ModbusError::NoConnection
                | ModbusError::EndOfStream
        )
    }

    /// Decode failures that only spoil the current frame
    pub fn is_frame_error(&self) -> bool {
        matches!(
            self,
            ModbusError::UnknownFunctionCode(_)
                | ModbusError::Checksum { .. }
                | ModbusError::ProtocolFlag(_)
                | ModbusError::InvalidLength(_)
        )
    }
}
