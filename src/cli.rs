//! CLI argument parsing

use std::path::PathBuf;
use std::time::Duration;

use biostalk_core::{AddressStep, Check, Config, Levels};
use clap::Parser;

/// Parse a string as a hex or decimal u64
fn parse_address(s: &str) -> Result<u64, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u64>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a non-negative float as a duration in seconds
fn parse_seconds(s: &str) -> Result<Duration, String> {
    let seconds = s
        .parse::<f64>()
        .map_err(|e| format!("Invalid duration: {}", e))?;
    Duration::try_from_secs_f64(seconds).map_err(|_| format!("Invalid duration: {}", s))
}

fn parse_check(s: &str) -> Result<Check, String> {
    match s.to_ascii_lowercase().as_str() {
        "off" => Ok(Check::Off),
        "on" => Ok(Check::On),
        "write" => Ok(Check::Write),
        _ => Err(format!(
            "Invalid verification mode: {} (expected Off, On or Write)",
            s
        )),
    }
}

fn parse_step(s: &str) -> Result<AddressStep, String> {
    match s.to_ascii_lowercase().as_str() {
        "byte" => Ok(AddressStep::Byte),
        "quad" => Ok(AddressStep::Quad),
        _ => Err(format!(
            "Invalid address step: {} (expected byte or quad)",
            s
        )),
    }
}

fn parse_levels(s: &str) -> Result<Levels, String> {
    Levels::parse_set(s)
}

#[derive(Parser)]
#[command(name = "biostalk")]
#[command(author, version, about = "Send a firmware image to a BIOS bootloader over TCP", long_about = None)]
pub struct Cli {
    /// TCP host to connect to
    #[arg(short = 'H', long, default_value = "localhost")]
    pub host: String,

    /// TCP port to connect to
    #[arg(short, long, default_value_t = 8880)]
    pub port: u16,

    /// Pause in seconds between connection attempts
    #[arg(short, long, value_parser = parse_seconds, default_value = "5")]
    pub retry_interval: Duration,

    /// Pause in seconds between socket writes belonging to the same command
    #[arg(long, value_parser = parse_seconds, default_value = "0")]
    pub minor_pause: Duration,

    /// Pause in seconds between commands
    #[arg(long, value_parser = parse_seconds, default_value = "0")]
    pub major_pause: Duration,

    /// Write the image to device RAM (on by default)
    #[arg(short, long)]
    pub write: bool,

    /// Skip the write pass (verify-only session)
    #[arg(long, conflicts_with = "write")]
    pub no_write: bool,

    /// Verification mode: Off, On (independent pass), Write (read back each byte)
    #[arg(short, long, value_parser = parse_check, default_value = "Off")]
    pub check: Check,

    /// Binary file to send
    #[arg(short, long, default_value = "firmware/obj_dir/main.bin")]
    pub file: PathBuf,

    /// Start address (addresses quad-words of RAM), hex or decimal
    #[arg(short = 'a', long, value_parser = parse_address, default_value = "0x00000000")]
    pub start_address: u64,

    /// Unit the address counter advances by per byte: byte or quad
    #[arg(long, value_parser = parse_step, default_value = "byte")]
    pub address_step: AddressStep,

    /// Send the boot command after the RAM operations
    #[arg(short, long)]
    pub boot: bool,

    /// Send BOOT without the preceding RST (newer bootloader revisions)
    #[arg(long)]
    pub boot_only: bool,

    /// Console bytes to stream after boot: -1 (all, CTRL-C to exit), 0 (none) or a count
    #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
    pub stream: i64,

    /// Output/log level: Off, Fatal, Error, Status, Progress, Wire, Calculation (comma separated)
    #[arg(short = 'o', long, value_parser = parse_levels, default_value = "Fatal,Error,Status")]
    pub log_level: Levels,
}

impl Cli {
    /// Resolve the arguments into the session configuration record.
    pub fn into_config(self) -> Config {
        Config {
            host: self.host,
            port: self.port,
            retry_interval: self.retry_interval,
            minor_pause: self.minor_pause,
            major_pause: self.major_pause,
            write: !self.no_write,
            check: self.check,
            file: self.file,
            start_address: self.start_address,
            address_step: self.address_step,
            boot: self.boot,
            reset_before_boot: !self.boot_only,
            stream: self.stream,
            levels: self.log_level,
        }
    }
}
