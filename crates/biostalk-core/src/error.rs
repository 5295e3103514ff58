//! Error types for the BIOS client

use std::path::PathBuf;

use thiserror::Error;

/// Client errors
///
/// `NoData` and `Mismatch` are protocol failures the session driver
/// escalates to a fatal report; `Cancelled` is a clean user-initiated
/// termination and must never be treated as an error.
#[derive(Debug, Error)]
pub enum Error {
    /// Firmware image file does not exist
    #[error("Error: File '{}' not found.", .0.display())]
    FileNotFound(PathBuf),

    /// Device returned nothing for a read command
    #[error("Error: Did not receive data when reading at address {address:#x} for byte {lane:#x}.")]
    NoData {
        /// Quad-word address of the failed read
        address: u64,
        /// Byte lane within the quad-word
        lane: u8,
    },

    /// Device RAM does not contain the expected byte
    #[error("Data mismatch at address {address:#x} for byte {lane:#x}: expected {expected}, got {actual}")]
    Mismatch {
        /// Quad-word address of the mismatch
        address: u64,
        /// Byte lane within the quad-word
        lane: u8,
        /// Byte from the firmware image
        expected: u8,
        /// Byte the device returned
        actual: u8,
    },

    /// Peer closed the connection
    #[error("Connection closed by the device.")]
    Closed,

    /// Session cancelled by an external interrupt
    #[error("Operation cancelled by user.")]
    Cancelled,

    /// I/O error on the link
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, Error>;
