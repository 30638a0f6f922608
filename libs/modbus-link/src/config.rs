//! Link configuration
//!
//! Loaded from YAML with environment overrides:
//!
//! ```yaml
//! mode: tcp
//! tcp:
//!   host: 192.168.1.10
//!   port: 502
//! timeouts:
//!   read_ms: 1000
//! ```
//!
//! `MODBUS_TCP__HOST=10.0.0.5` overrides `tcp.host`.

use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::client::ModbusClient;
use crate::codec::Codec;
use crate::constants::DEFAULT_TCP_PORT;
use crate::error::{ModbusError, ModbusResult};
use crate::transport::{Connector, TcpConnector, Transport};

#[cfg(feature = "rtu")]
use crate::transport::SerialConnector;

/// Environment prefix for overrides, nested keys split on `__`
pub const ENV_PREFIX: &str = "MODBUS_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    pub mode: Codec,
    #[serde(default)]
    pub tcp: Option<TcpConfig>,
    #[serde(default)]
    pub serial: Option<SerialConfig>,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialConfig {
    pub device: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    #[serde(default)]
    pub parity: Parity,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

/// All values in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub connect_ms: u64,
    pub read_ms: u64,
    pub write_ms: u64,
    pub inter_frame_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 3000,
            read_ms: 2000,
            write_ms: 2000,
            inter_frame_ms: 20,
        }
    }
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn read(&self) -> Duration {
        Duration::from_millis(self.read_ms)
    }

    pub fn write(&self) -> Duration {
        Duration::from_millis(self.write_ms)
    }

    pub fn inter_frame(&self) -> Duration {
        Duration::from_millis(self.inter_frame_ms)
    }
}

fn default_port() -> u16 {
    DEFAULT_TCP_PORT
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

impl LinkConfig {
    /// TCP link with default timeouts
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self {
            mode: Codec::Tcp,
            tcp: Some(TcpConfig {
                host: host.into(),
                port,
            }),
            serial: None,
            timeouts: TimeoutConfig::default(),
        }
    }

    /// RTU link at 8N1
    pub fn rtu(device: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            mode: Codec::Rtu,
            tcp: None,
            serial: Some(SerialConfig {
                device: device.into(),
                baud_rate,
                data_bits: default_data_bits(),
                stop_bits: default_stop_bits(),
                parity: Parity::None,
            }),
            timeouts: TimeoutConfig::default(),
        }
    }

    /// Load from a YAML file, then apply `MODBUS_` environment overrides
    pub fn load(path: impl AsRef<Path>) -> ModbusResult<Self> {
        Self::load_with_env_prefix(path, ENV_PREFIX)
    }

    pub fn load_with_env_prefix(path: impl AsRef<Path>, prefix: &str) -> ModbusResult<Self> {
        let config: LinkConfig = Figment::new()
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed(prefix).split("__"))
            .extract()
            .map_err(|e| ModbusError::config(format!("Failed to load configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ModbusResult<()> {
        match self.mode {
            Codec::Tcp => {
                let tcp = self
                    .tcp
                    .as_ref()
                    .ok_or_else(|| ModbusError::config("mode tcp requires a tcp section"))?;
                if tcp.host.trim().is_empty() {
                    return Err(ModbusError::config("tcp.host is empty"));
                }
                if tcp.port == 0 {
                    return Err(ModbusError::config("tcp.port must be non-zero"));
                }
            },
            Codec::Rtu => {
                let serial = self
                    .serial
                    .as_ref()
                    .ok_or_else(|| ModbusError::config("mode rtu requires a serial section"))?;
                if serial.device.trim().is_empty() {
                    return Err(ModbusError::config("serial.device is empty"));
                }
                if serial.baud_rate == 0 {
                    return Err(ModbusError::config("serial.baud_rate must be non-zero"));
                }
                if !(5..=8).contains(&serial.data_bits) {
                    return Err(ModbusError::config(format!(
                        "serial.data_bits {} outside 5..=8",
                        serial.data_bits
                    )));
                }
                if !(1..=2).contains(&serial.stop_bits) {
                    return Err(ModbusError::config(format!(
                        "serial.stop_bits {} outside 1..=2",
                        serial.stop_bits
                    )));
                }
            },
        }
        Ok(())
    }

    /// Connector for the configured link
    pub fn connector(&self) -> ModbusResult<Box<dyn Connector>> {
        self.validate()?;
        match self.mode {
            Codec::Tcp => {
                let tcp = self
                    .tcp
                    .as_ref()
                    .ok_or_else(|| ModbusError::config("mode tcp requires a tcp section"))?;
                Ok(Box::new(
                    TcpConnector::new(tcp.host.clone(), tcp.port)
                        .with_connect_timeout(self.timeouts.connect()),
                ))
            },
            #[cfg(feature = "rtu")]
            Codec::Rtu => {
                let serial = self
                    .serial
                    .as_ref()
                    .ok_or_else(|| ModbusError::config("mode rtu requires a serial section"))?;
                Ok(Box::new(SerialConnector {
                    device: serial.device.clone(),
                    baud_rate: serial.baud_rate,
                    data_bits: serial.data_bits,
                    stop_bits: serial.stop_bits,
                    parity: serial.parity,
                }))
            },
            #[cfg(not(feature = "rtu"))]
            Codec::Rtu => Err(ModbusError::config(
                "serial support not compiled in (enable the `rtu` feature)",
            )),
        }
    }

    /// Client wired to this link, not yet connected
    pub fn build_client(&self) -> ModbusResult<ModbusClient> {
        let transport = Transport::from_boxed(self.connector()?)
            .with_timeouts(self.timeouts.read(), self.timeouts.write());
        Ok(ModbusClient::new(self.mode, transport)
            .with_inter_frame_delay(self.timeouts.inter_frame()))
    }
}
