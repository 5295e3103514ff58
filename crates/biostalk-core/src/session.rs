//! One programming session against the bootloader
//!
//! A session owns the connection for its whole lifetime and drives the
//! passes strictly in order: write, verify, boot, console stream. The write
//! and verify passes each walk the firmware image behind a fresh address
//! cursor seeded from the configured start address, so verification can run
//! standalone without a write in the same session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::address::AddressCursor;
use crate::config::{Check, Config};
use crate::error::{Error, Result};
use crate::protocol::Opcode;
use crate::report::{Levels, Reporter};
use crate::transport::{interruptible_sleep, Transport};

/// How long a blocking read waits between cancellation checks.
const READ_POLL: Duration = Duration::from_millis(100);

/// Session driver, generic over the link so tests can run against an
/// in-memory device.
pub struct Session<T: Transport> {
    link: T,
    config: Config,
    reporter: Reporter,
    cancel: Arc<AtomicBool>,
}

impl<T: Transport> Session<T> {
    pub fn new(link: T, config: Config, reporter: Reporter, cancel: Arc<AtomicBool>) -> Self {
        Self {
            link,
            config,
            reporter,
            cancel,
        }
    }

    /// Consume the session, releasing the link.
    pub fn into_link(self) -> T {
        self.link
    }

    /// Run the configured passes over the firmware image, in order.
    pub fn run(&mut self, image: &[u8]) -> Result<()> {
        if self.config.write {
            self.write_image(image)?;
        }
        if self.config.check == Check::On {
            self.verify_image(image)?;
        }
        if self.config.boot {
            self.boot()?;
        }
        if self.config.stream != 0 {
            self.stream_console(&mut std::io::stdout().lock())?;
        }
        Ok(())
    }

    /// Write the image to device RAM, byte by byte.
    ///
    /// In `Check::Write` mode every byte is read back and compared right
    /// after its write command, before the cursor advances.
    pub fn write_image(&mut self, image: &[u8]) -> Result<()> {
        let mut cursor = AddressCursor::new(self.config.start_address);
        let count = image.len();

        for (iota, &byte) in image.iter().enumerate() {
            self.send_address(&mut cursor)?;

            let status = if self.config.check == Check::Write {
                "Writing and Verifying"
            } else {
                "Writing"
            };
            self.reporter.report(
                Levels::PROGRESS,
                &format!("{}: Byte {}/{}", status, iota + 1, count),
            );

            self.send(&[Opcode::write(cursor.lane())], self.config.minor_pause)?;
            self.send(&[byte], self.config.major_pause)?;

            if self.config.check == Check::Write {
                self.check_byte(&cursor, byte)?;
            }

            cursor.advance(self.config.address_step.increment());
        }

        self.reporter.report(
            Levels::STATUS,
            &format!(
                "\nSuccessfully sent '{}' to {}:{}.",
                self.config.file.display(),
                self.config.host,
                self.config.port
            ),
        );
        Ok(())
    }

    /// Re-scan device RAM against the image from the configured start
    /// address, independent of any earlier write pass.
    pub fn verify_image(&mut self, image: &[u8]) -> Result<()> {
        self.reporter
            .report(Levels::STATUS, "Starting data verification...");

        let mut cursor = AddressCursor::new(self.config.start_address);
        let count = image.len();

        for (iota, &expected) in image.iter().enumerate() {
            self.send_address(&mut cursor)?;

            self.reporter.report(
                Levels::PROGRESS,
                &format!("Verifying: Byte {}/{}", iota + 1, count),
            );

            self.check_byte(&cursor, expected)?;
            cursor.advance(self.config.address_step.increment());
        }

        self.reporter
            .report(Levels::STATUS, "\nData verification successful.");
        Ok(())
    }

    /// Send the boot command, preceded by a reset on bootloader revisions
    /// that require one.
    pub fn boot(&mut self) -> Result<()> {
        if self.config.reset_before_boot {
            self.send(&[Opcode::Rst.byte()], self.config.major_pause)?;
        }
        self.send(&[Opcode::Boot.byte()], self.config.major_pause)?;

        let message = if self.config.reset_before_boot {
            "Sent reset and boot command."
        } else {
            "Sent boot command."
        };
        self.reporter.report(Levels::STATUS, message);
        Ok(())
    }

    /// Echo the device console to `out`, one byte at a time as it arrives.
    ///
    /// Runs for the configured count, or until cancellation when the count
    /// is negative. The peer closing the connection ends the stream quietly.
    pub fn stream_console<W: std::io::Write>(&mut self, out: &mut W) -> Result<()> {
        let mut remaining = self.config.stream;

        while remaining != 0 {
            let byte = match self.recv_byte() {
                Ok(byte) => byte,
                Err(Error::Closed) => break,
                Err(e) => return Err(e),
            };

            out.write_all(&[byte])?;
            out.flush()?;

            if remaining > 0 {
                remaining -= 1;
            }
        }
        Ok(())
    }

    /// Send the address frames for the current item: ADR_LOWER always,
    /// ADR_UPPER only when the upper half changed since last transmitted.
    fn send_address(&mut self, cursor: &mut AddressCursor) -> Result<()> {
        if self.reporter.active().intersects(Levels::CALCULATION) {
            self.reporter.report(
                Levels::CALCULATION,
                &format!("calculation: address={:#x}", cursor.quad_address()),
            );
            self.reporter.report(
                Levels::CALCULATION,
                &format!(
                    "calculation: address_upper={:#x} address_lower={:#x}",
                    cursor.upper(),
                    cursor.lower()
                ),
            );
            self.reporter.report(
                Levels::CALCULATION,
                &format!("calculation: byte_lane={:#x}", cursor.lane()),
            );
        }

        let (upper, lower) = cursor.address_frames();

        if let Some(upper) = upper {
            self.send(&[Opcode::AdrUpper.byte()], self.config.minor_pause)?;
            self.send(&upper.to_be_bytes(), self.config.major_pause)?;
        }

        self.send(&[Opcode::AdrLower.byte()], self.config.minor_pause)?;
        self.send(&lower.to_be_bytes(), self.config.major_pause)?;
        Ok(())
    }

    /// Read the addressed byte back and compare it against `expected`.
    ///
    /// The bootloader currently needs the read command issued twice; the
    /// first returned byte is discarded and only the second is compared.
    fn check_byte(&mut self, cursor: &AddressCursor, expected: u8) -> Result<()> {
        let lane = cursor.lane();
        let mut received = None;

        for _ in 0..2 {
            self.send(&[Opcode::read(lane)], Duration::ZERO)?;

            match self.recv_byte() {
                Ok(byte) => {
                    if self.reporter.active().intersects(Levels::WIRE) {
                        self.reporter
                            .report(Levels::WIRE, &format!("raw in: {:02x}", byte));
                    }
                    received = Some(byte);
                }
                Err(Error::Closed) => {
                    received = None;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        match received {
            None => Err(Error::NoData {
                address: cursor.quad_address(),
                lane,
            }),
            Some(actual) if actual != expected => Err(Error::Mismatch {
                address: cursor.quad_address(),
                lane,
                expected,
                actual,
            }),
            Some(_) => Ok(()),
        }
    }

    /// Write one frame to the link, trace it, and apply the trailing pause.
    fn send(&mut self, raw: &[u8], pause: Duration) -> Result<()> {
        self.link.write(raw)?;

        if self.reporter.active().intersects(Levels::WIRE) {
            self.reporter
                .report(Levels::WIRE, &format!("raw: {}", hex_string(raw)));
        }

        if !pause.is_zero() {
            interruptible_sleep(pause, &self.cancel)?;
        }
        Ok(())
    }

    /// Block until one byte arrives, honoring the cancellation flag.
    fn recv_byte(&mut self) -> Result<u8> {
        loop {
            if self.cancel.load(Ordering::Relaxed) {
                return Err(Error::Cancelled);
            }
            if let Some(byte) = self.link.read_byte(READ_POLL)? {
                return Ok(byte);
            }
        }
    }
}

fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
