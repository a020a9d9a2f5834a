//! Log BME280 readings through a Bus Pirate 5.
//!
//! ```bash
//! # List serial ports, the Bus Pirate is marked
//! bme280 --list-ports
//!
//! # Poll once a second on the default port
//! bme280
//!
//! # Ten readings from a sensor strapped to 0x76, with timestamps
//! bme280 --port /dev/ttyACM1 --address 0x76 --count 10 --timestamps
//!
//! # Everything from a file, CLI flags still win
//! bme280 --config datalogger.toml -vv
//! ```

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use bus_pirate::{BusPirate, SerialPortType, BUS_PIRATE_PID, BUS_PIRATE_VID};
use clap::Parser;
use datalogger::config::Config;
use datalogger::session;
use log::{debug, LevelFilter};

#[derive(Debug, Parser)]
#[command(version, about = "Read a BME280 through a Bus Pirate 5")]
struct Cli {
    /// TOML settings file; flags given here override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial device of the Bus Pirate terminal.
    #[arg(short, long)]
    port: Option<String>,

    #[arg(short, long)]
    baud: Option<u32>,

    /// Seconds to wait for each reply.
    #[arg(short, long)]
    timeout: Option<f64>,

    /// 7-bit sensor address, decimal or 0x-prefixed hex.
    #[arg(short, long, value_parser = parse_address)]
    address: Option<u8>,

    /// Seconds between readings.
    #[arg(short, long)]
    interval: Option<f64>,

    /// Stop after this many readings.
    #[arg(short = 'n', long)]
    count: Option<usize>,

    /// Prefix readings with the local time.
    #[arg(long)]
    timestamps: bool,

    /// List serial ports and exit.
    #[arg(long)]
    list_ports: bool,

    /// More logging, repeat for trace.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_address(text: &str) -> std::result::Result<u8, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|e| format!("invalid I2C address {text:?}: {e}"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_module("datalogger", level)
        .filter_module("bme280", level)
        .filter_module("bus_pirate", level)
        .parse_default_env()
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("[!] {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if cli.list_ports {
        return list_ports();
    }

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    apply_overrides(&mut config, &cli);
    config.validate()?;
    debug!("{:#?}", config);

    let settings = config.session_settings();
    let port = config.bus_pirate.port.clone();
    println!("[*] Connecting to {}...", port);
    let mut pirate = BusPirate::connect(config.bus_pirate)?;

    let stdout = io::stdout();
    session::run(&mut pirate, &settings, &mut stdout.lock())
        .with_context(|| format!("session on {port} aborted"))
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(port) = &cli.port {
        config.bus_pirate.port = port.clone();
    }
    if let Some(baud) = cli.baud {
        config.bus_pirate.baud = baud;
    }
    if let Some(timeout) = cli.timeout {
        config.bus_pirate.timeout_seconds = timeout;
    }
    if let Some(address) = cli.address {
        config.sensor.address = address;
    }
    if let Some(interval) = cli.interval {
        config.poll.interval_seconds = interval;
    }
    if cli.count.is_some() {
        config.poll.count = cli.count;
    }
    if cli.timestamps {
        config.poll.timestamps = true;
    }
}

fn list_ports() -> Result<()> {
    let ports = bus_pirate::list_ports()?;
    println!("Available serial ports:");
    if ports.is_empty() {
        println!("  (none)");
    }
    for port in ports {
        print!("  {}", port.port_name);
        match &port.port_type {
            SerialPortType::UsbPort(info) => {
                let marker = if info.vid == BUS_PIRATE_VID && info.pid == BUS_PIRATE_PID {
                    "  <- Bus Pirate"
                } else {
                    ""
                };
                println!(
                    " - USB (VID: 0x{:04x}, PID: 0x{:04x}){}",
                    info.vid, info.pid, marker
                );
                if let Some(ref product) = info.product {
                    println!("      Product: {}", product);
                }
                if let Some(ref serial) = info.serial_number {
                    println!("      Serial: {}", serial);
                }
            }
            SerialPortType::BluetoothPort => println!(" - Bluetooth"),
            SerialPortType::PciPort => println!(" - PCI"),
            SerialPortType::Unknown => println!(" - Unknown"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_accepts_hex_and_decimal() {
        assert_eq!(parse_address("0x76"), Ok(0x76));
        assert_eq!(parse_address("119"), Ok(0x77));
        assert!(parse_address("0x1FF").is_err());
    }

    #[test]
    fn flags_override_the_file() {
        let cli = Cli::parse_from(["bme280", "--port", "COM7", "-a", "0x76", "-n", "5"]);
        let mut config = Config::from_toml("[bus_pirate]\nport = \"/dev/ttyACM3\"\nbaud = 9600\n")
            .unwrap();
        apply_overrides(&mut config, &cli);
        assert_eq!(config.bus_pirate.port, "COM7");
        assert_eq!(config.bus_pirate.baud, 9600);
        assert_eq!(config.sensor.address, 0x76);
        assert_eq!(config.poll.count, Some(5));
        assert!(!config.poll.timestamps);
    }
}
