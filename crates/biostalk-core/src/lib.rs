//! biostalk-core - BIOS bootloader protocol client
//!
//! This crate implements the host side of the byte-oriented command
//! protocol spoken by the FPGA-hosted BIOS bootloader: programming device
//! RAM over TCP, verifying it, booting the loaded firmware, and streaming
//! the console output back.
//!
//! # Protocol Overview
//!
//! Every command is one opcode byte. RAM is addressed in quad-words
//! through two 16-bit address registers (upper/lower half, big-endian on
//! the wire); the byte within a quad-word is selected by one of four
//! lane-specific read/write opcodes. Per item the client sends ADR_UPPER
//! only when the upper half changed, then ADR_LOWER, then the read or
//! write command itself.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//! use std::sync::Arc;
//! use biostalk_core::{connect_retry, Config, Levels, Reporter, Session};
//!
//! let config = Config::default();
//! let reporter = Reporter::new(config.levels);
//! let cancel = Arc::new(AtomicBool::new(false));
//!
//! let link = connect_retry(
//!     &config.host,
//!     config.port,
//!     config.retry_interval,
//!     &cancel,
//!     &reporter,
//! )?;
//!
//! let image = std::fs::read(&config.file)?;
//! let mut session = Session::new(link, config, reporter, cancel);
//! session.run(&image)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod address;
pub mod config;
pub mod error;
pub mod protocol;
pub mod report;
pub mod session;
pub mod transport;

// Re-exports
pub use address::AddressCursor;
pub use config::{AddressStep, Check, Config};
pub use error::{Error, Result};
pub use protocol::Opcode;
pub use report::{Levels, Reporter};
pub use session::Session;
pub use transport::{connect_retry, TcpTransport, Transport};
