//! # Modbus Link - Modbus RTU/TCP Protocol Engine
//!
//! Framing, checksum, payload building and parsing for the eight core
//! function codes, a transaction client and a passive stream decoder.
//!
//! ## Supported Function Codes
//!
//! | Code | Function | Client | Capture |
//! |------|----------|--------|---------|
//! | 0x01 | Read Coils | ✅ | ✅ |
//! | 0x02 | Read Discrete Inputs | ✅ | ✅ |
//! | 0x03 | Read Holding Registers | ✅ | ✅ |
//! | 0x04 | Read Input Registers | ✅ | ✅ |
//! | 0x05 | Write Single Coil | ✅ | ✅ |
//! | 0x06 | Write Single Register | ✅ | ✅ |
//! | 0x0F | Write Multiple Coils | ✅ | ✅ |
//! | 0x10 | Write Multiple Registers | ✅ | ✅ |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use modbus_link::{LinkConfig, ModbusResult};
//!
//! #[tokio::main]
//! async fn main() -> ModbusResult<()> {
//!     let mut client = LinkConfig::tcp("127.0.0.1", 502).build_client()?;
//!     client.connect().await?;
//!
//!     let values = client.read_holding_registers(1, 0, 10).await?;
//!     println!("Read registers: {:?}", values);
//!
//!     client.write_single_register(1, 100, 0x1234).await?;
//!     client.close().await;
//!     Ok(())
//! }
//! ```

// ============================================================================
// Protocol core
// ============================================================================

/// Core error types and result handling
pub mod error;

/// Protocol constants and limits
pub mod constants;

/// CRC-16/MODBUS
pub mod checksum;

/// Function code table and payload layouts
pub mod function;

pub mod frame;

/// Buffered, peekable byte source
pub mod reader;

/// RTU and TCP frame codecs
pub mod codec;

/// Coil and register packing
pub mod bits;

pub mod builder;
pub mod parser;

// ============================================================================
// Links and sessions
// ============================================================================

/// Connectors and the transport wrapper
pub mod transport;

/// Request/response client
pub mod client;

/// Passive capture
pub mod stream;

/// YAML + environment configuration
pub mod config;

// ============================================================================
// Re-exports for convenience
// ============================================================================

pub use client::{ClientState, FrameDirection, ModbusClient};
pub use codec::Codec;
pub use config::LinkConfig;
pub use error::{ModbusError, ModbusResult};
pub use frame::Frame;
pub use function::{Direction, FunctionCode};
pub use reader::FrameReader;
pub use stream::{spawn_capture, CaptureStats, CaptureStop, StreamDecoder};
pub use transport::{Connector, TcpConnector, Transport};

#[cfg(feature = "rtu")]
pub use transport::SerialConnector;
