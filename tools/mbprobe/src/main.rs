//! mbprobe - Modbus RTU/TCP probe
//!
//! Issues single requests against a device or passively captures bus traffic.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use modbus_link::constants::DEFAULT_CAPTURE_QUEUE;
use modbus_link::{
    spawn_capture, Direction, Frame, FrameDirection, LinkConfig, ModbusClient, ModbusError,
    StreamDecoder,
};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "mbprobe")]
#[command(about = "Modbus RTU/TCP probe")]
#[command(long_about = "Modbus RTU/TCP probe

Examples:
  mbprobe --tcp 192.168.1.10:502 read-holding --address 0 --count 10
  mbprobe --serial /dev/ttyUSB0 --baud 19200 write-coil --address 5 --value on
  mbprobe --config link.yaml capture --direction response --station 3")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// YAML link configuration (MODBUS_* environment variables override it)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Modbus TCP endpoint, host:port
    #[arg(long, global = true, conflicts_with = "serial")]
    tcp: Option<String>,

    /// Serial device for Modbus RTU
    #[arg(long, global = true)]
    serial: Option<String>,

    /// Serial baud rate
    #[arg(long, global = true, default_value_t = 9600)]
    baud: u32,

    /// Station (unit) id; requests default to 1, capture shows every station
    #[arg(short, long, global = true)]
    station: Option<u8>,

    /// Enable verbose logging and print raw frames
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Read coils (FC01)
    ReadCoils(ReadArgs),
    /// Read discrete inputs (FC02)
    ReadDiscrete(ReadArgs),
    /// Read holding registers (FC03)
    ReadHolding(ReadArgs),
    /// Read input registers (FC04)
    ReadInput(ReadArgs),

    /// Write a single coil (FC05)
    WriteCoil {
        #[arg(short, long)]
        address: u16,
        /// on/off, true/false or 1/0
        #[arg(long, value_parser = parse_coil)]
        value: bool,
    },

    /// Write a single register (FC06)
    WriteRegister {
        #[arg(short, long)]
        address: u16,
        #[arg(long)]
        value: u16,
    },

    /// Write multiple coils (FC15)
    WriteCoils {
        #[arg(short, long)]
        address: u16,
        /// Comma separated, e.g. 1,0,1,1
        #[arg(long, value_delimiter = ',', value_parser = parse_coil, required = true)]
        values: Vec<bool>,
    },

    /// Write multiple registers (FC16)
    WriteRegisters {
        #[arg(short, long)]
        address: u16,
        /// Comma separated, e.g. 10,20,30
        #[arg(long, value_delimiter = ',', required = true)]
        values: Vec<u16>,
    },

    /// Passively decode frames from the link until Ctrl-C
    Capture {
        #[arg(long, value_enum, default_value_t = CaptureDirection::Response)]
        direction: CaptureDirection,
    },
}

#[derive(clap::Args)]
struct ReadArgs {
    #[arg(short, long, default_value_t = 0)]
    address: u16,
    #[arg(short = 'n', long, default_value_t = 1)]
    count: u16,
}

#[derive(Clone, Copy, ValueEnum)]
enum CaptureDirection {
    /// Frames sent by a controller
    Request,
    /// Frames returned by devices
    Response,
}

impl From<CaptureDirection> for Direction {
    fn from(direction: CaptureDirection) -> Self {
        match direction {
            CaptureDirection::Request => Direction::Request,
            CaptureDirection::Response => Direction::Response,
        }
    }
}

fn parse_coil(s: &str) -> Result<bool, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "on" | "true" => Ok(true),
        "0" | "off" | "false" => Ok(false),
        other => Err(format!("invalid coil value '{other}'")),
    }
}

impl Cli {
    fn request_station(&self) -> u8 {
        self.station.unwrap_or(1)
    }

    fn capture_decoder(&self, config: &LinkConfig, direction: Direction) -> StreamDecoder {
        let decoder = StreamDecoder::new(config.mode, direction);
        match self.station {
            Some(station) => decoder.with_station_filter(station),
            None => decoder,
        }
    }
}

/// Command line flags win over the configuration file
fn link_config(cli: &Cli) -> Result<LinkConfig> {
    let mut config = match &cli.config {
        Some(path) => Some(
            LinkConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
        ),
        None => None,
    };

    if let Some(endpoint) = &cli.tcp {
        let (host, port) = endpoint
            .rsplit_once(':')
            .context("--tcp expects host:port")?;
        let port: u16 = port.parse().context("--tcp port is not a number")?;
        let timeouts = config.map(|c| c.timeouts).unwrap_or_default();
        let mut tcp = LinkConfig::tcp(host, port);
        tcp.timeouts = timeouts;
        config = Some(tcp);
    } else if let Some(device) = &cli.serial {
        let timeouts = config.map(|c| c.timeouts).unwrap_or_default();
        let mut rtu = LinkConfig::rtu(device.clone(), cli.baud);
        rtu.timeouts = timeouts;
        config = Some(rtu);
    }

    let Some(config) = config else {
        bail!("no link given: use --config, --tcp or --serial");
    };
    config.validate()?;
    Ok(config)
}

fn print_bits(address: u16, values: &[bool]) {
    for (offset, value) in values.iter().enumerate() {
        let state = if *value { "ON".green() } else { "OFF".dimmed() };
        println!("{:>5}: {}", usize::from(address) + offset, state);
    }
}

fn print_registers(address: u16, values: &[u16]) {
    for (offset, value) in values.iter().enumerate() {
        println!(
            "{:>5}: {:>5}  {}",
            usize::from(address) + offset,
            value,
            format!("0x{value:04X}").dimmed()
        );
    }
}

fn print_frame(frame: &Frame) {
    println!(
        "{} {} {} {}",
        format!("tid={:<5}", frame.transaction_id).dimmed(),
        format!("station={:<3}", frame.station_id).cyan(),
        frame.function_code.to_string().bold(),
        hex::encode_upper(&frame.payload)
    );
}

async fn run_request(cli: &Cli, mut client: ModbusClient) -> Result<()> {
    if cli.verbose {
        client.set_frame_monitor(|direction, bytes| {
            let tag = match direction {
                FrameDirection::Sent => "TX".yellow(),
                FrameDirection::Received => "RX".blue(),
            };
            eprintln!("{} {}", tag, hex::encode_upper(bytes));
        });
    }
    client
        .connect()
        .await
        .with_context(|| format!("connecting to {}", client.endpoint()))?;

    let station = cli.request_station();
    let result = match &cli.command {
        Commands::ReadCoils(args) => client
            .read_coils(station, args.address, args.count)
            .await
            .map(|values| print_bits(args.address, &values)),
        Commands::ReadDiscrete(args) => client
            .read_discrete_inputs(station, args.address, args.count)
            .await
            .map(|values| print_bits(args.address, &values)),
        Commands::ReadHolding(args) => client
            .read_holding_registers(station, args.address, args.count)
            .await
            .map(|values| print_registers(args.address, &values)),
        Commands::ReadInput(args) => client
            .read_input_registers(station, args.address, args.count)
            .await
            .map(|values| print_registers(args.address, &values)),
        Commands::WriteCoil { address, value } => client
            .write_single_coil(station, *address, *value)
            .await
            .map(|(addr, value)| println!("{} coil {} = {}", "OK".green(), addr, value)),
        Commands::WriteRegister { address, value } => client
            .write_single_register(station, *address, *value)
            .await
            .map(|(addr, value)| println!("{} register {} = {}", "OK".green(), addr, value)),
        Commands::WriteCoils { address, values } => client
            .write_multiple_coils(station, *address, values)
            .await
            .map(|(addr, count)| println!("{} {} coils from {}", "OK".green(), count, addr)),
        Commands::WriteRegisters { address, values } => client
            .write_multiple_registers(station, *address, values)
            .await
            .map(|(addr, count)| println!("{} {} registers from {}", "OK".green(), count, addr)),
        Commands::Capture { .. } => Err(ModbusError::invalid_argument(
            "capture does not issue requests",
        )),
    };

    client.close().await;
    result.context("request failed")
}

async fn run_capture(cli: &Cli, config: &LinkConfig, direction: Direction) -> Result<()> {
    let connector = config.connector()?;
    let (reader, _writer) = connector
        .connect()
        .await
        .with_context(|| format!("opening {}", connector.endpoint()))?;

    let decoder = cli.capture_decoder(config, direction);
    let (handle, mut frames, token) = spawn_capture(decoder, reader, DEFAULT_CAPTURE_QUEUE);
    info!("Capturing {} {}s on {}", config.mode, direction, connector.endpoint());

    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Some(frame) => print_frame(&frame),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                token.cancel();
                break;
            }
        }
    }

    // A blocked read only observes cancellation once more bytes arrive
    if token.is_cancelled() {
        handle.abort();
        return Ok(());
    }
    let (decoder, outcome) = handle.await?;
    let stats = decoder.stats();
    match outcome {
        Ok(stop) => info!("Capture stopped: {:?} ({} frames)", stop, stats.frames),
        Err(e) => warn!("Capture ended: {} ({} frames, {} resyncs)", e, stats.frames, stats.resyncs),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = link_config(&cli)?;

    match &cli.command {
        Commands::Capture { direction } => run_capture(&cli, &config, (*direction).into()).await,
        _ => run_request(&cli, config.build_client()?).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_coil() {
        assert_eq!(parse_coil("ON"), Ok(true));
        assert_eq!(parse_coil("0"), Ok(false));
        assert!(parse_coil("maybe").is_err());
    }

    #[test]
    fn test_tcp_flag_builds_config() {
        let cli = Cli::parse_from(["mbprobe", "--tcp", "10.1.2.3:1502", "read-holding", "-n", "4"]);
        let config = link_config(&cli).unwrap();
        let tcp = config.tcp.unwrap();
        assert_eq!((tcp.host.as_str(), tcp.port), ("10.1.2.3", 1502));
        assert!(matches!(cli.command, Commands::ReadHolding(ReadArgs { count: 4, .. })));
    }

    #[test]
    fn test_write_coils_values() {
        let cli = Cli::parse_from([
            "mbprobe", "--serial", "/dev/ttyS1", "write-coils", "--address", "3", "--values",
            "1,off,true",
        ]);
        match cli.command {
            Commands::WriteCoils { address, ref values } => {
                assert_eq!(address, 3);
                assert_eq!(values, &vec![true, false, true]);
            },
            _ => panic!("wrong subcommand"),
        }
        assert_eq!(link_config(&cli).unwrap().mode, modbus_link::Codec::Rtu);
    }

    #[test]
    fn test_capture_without_station_accepts_all() {
        let cli = Cli::parse_from(["mbprobe", "--tcp", "10.0.0.1:502", "capture"]);
        assert_eq!(cli.station, None);
        assert_eq!(cli.request_station(), 1);

        let config = link_config(&cli).unwrap();
        let decoder = cli.capture_decoder(&config, Direction::Response);
        assert_eq!(decoder.station_filter(), None);
    }

    #[test]
    fn test_capture_station_filter() {
        let cli = Cli::parse_from(["mbprobe", "--tcp", "10.0.0.1:502", "capture", "-s", "3"]);
        assert_eq!(cli.station, Some(3));
        let config = link_config(&cli).unwrap();
        let decoder = cli.capture_decoder(&config, Direction::Response);
        assert_eq!(decoder.station_filter(), Some(3));
    }

    #[test]
    fn test_link_required() {
        let cli = Cli::parse_from(["mbprobe", "read-coils"]);
        assert!(link_config(&cli).is_err());
    }
}
