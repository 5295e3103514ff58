//! Resolved session configuration
//!
//! Built once by the CLI layer and passed into the session constructor;
//! read-only for the lifetime of the session.

use std::path::PathBuf;
use std::time::Duration;

use crate::report::Levels;

/// Verification mode for the firmware image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    /// No verification
    Off,
    /// Independent verification pass after any write
    On,
    /// Read back each byte immediately after writing it
    Write,
}

/// Unit the byte address counter advances by per item.
///
/// Bootloader revisions disagree on whether the host steps through RAM one
/// byte at a time (lanes cycle 0..3) or one quad-word at a time (lane fixed
/// by the start address). Selectable, not unified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressStep {
    /// Advance the byte counter by 1 per item
    Byte,
    /// Advance the byte counter by 4 per item
    Quad,
}

impl AddressStep {
    /// Byte-counter increment for this step unit.
    pub const fn increment(self) -> u64 {
        match self {
            AddressStep::Byte => 1,
            AddressStep::Quad => 4,
        }
    }
}

/// Resolved parameters for one session.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP host the device listens on
    pub host: String,
    /// TCP port the device listens on
    pub port: u16,
    /// Wait between connection attempts
    pub retry_interval: Duration,
    /// Pause after each opcode frame of a command
    pub minor_pause: Duration,
    /// Pause after each value/data frame, between commands
    pub major_pause: Duration,
    /// Whether the write pipeline runs
    pub write: bool,
    /// Verification mode
    pub check: Check,
    /// Firmware image path (loaded by the caller, named in reports)
    pub file: PathBuf,
    /// Start address in quad-words of RAM
    pub start_address: u64,
    /// Address-counter increment per item
    pub address_step: AddressStep,
    /// Whether the boot sequencer runs after programming
    pub boot: bool,
    /// Send RST before BOOT (older bootloader revisions require it)
    pub reset_before_boot: bool,
    /// Console bytes to stream after boot: 0 = none, negative = unbounded
    pub stream: i64,
    /// Active report level set
    pub levels: Levels,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 8880,
            retry_interval: Duration::from_secs(5),
            minor_pause: Duration::ZERO,
            major_pause: Duration::ZERO,
            write: true,
            check: Check::Off,
            file: PathBuf::from("firmware/obj_dir/main.bin"),
            start_address: 0,
            address_step: AddressStep::Byte,
            boot: false,
            reset_before_boot: true,
            stream: 0,
            levels: Levels::default(),
        }
    }
}
