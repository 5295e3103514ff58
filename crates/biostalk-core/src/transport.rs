//! Transport layer for the bootloader link
//!
//! The device speaks the protocol over a plain TCP socket. The `Transport`
//! trait keeps the session testable against an in-memory device.

use std::io::Read;
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::report::{Levels, Reporter};

/// Slice width for cancellable waits.
const CANCEL_POLL: Duration = Duration::from_millis(50);

/// Byte link to the device.
pub trait Transport {
    /// Write bytes to the link.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Wait up to `timeout` for a single byte.
    ///
    /// `Ok(None)` on timeout, `Err(Error::Closed)` once the peer has closed
    /// the connection. The protocol never needs wider reads: every response
    /// is exactly one byte.
    fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>>;
}

/// TCP socket transport.
///
/// Exclusively owned by the session; dropping it on any exit path closes
/// the connection.
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    /// Connect to the device at the specified host and port.
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        let addr = format!("{}:{}", host, port);
        log::debug!("Connecting to bootloader at {}", addr);

        let stream = TcpStream::connect(&addr)?;

        // The protocol is one opcode byte at a time; coalescing them would
        // only add latency.
        stream.set_nodelay(true)?;

        log::debug!("Connected to bootloader at {}", addr);

        Ok(Self { stream })
    }
}

impl Transport for TcpTransport {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        use std::io::Write;
        self.stream.write_all(data)?;
        Ok(())
    }

    fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>> {
        self.stream.set_read_timeout(Some(timeout))?;

        let mut buf = [0u8];
        match self.stream.read(&mut buf) {
            Ok(0) => Err(Error::Closed),
            Ok(_) => Ok(Some(buf[0])),
            Err(e)
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::Interrupted =>
            {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Sleep for `duration`, checking the cancellation flag in short slices.
pub fn interruptible_sleep(duration: Duration, cancel: &AtomicBool) -> Result<()> {
    let deadline = Instant::now() + duration;
    loop {
        if cancel.load(Ordering::Relaxed) {
            return Err(Error::Cancelled);
        }
        let Some(remaining) = deadline.checked_duration_since(Instant::now()).filter(|d| !d.is_zero()) else {
            return Ok(());
        };
        std::thread::sleep(remaining.min(CANCEL_POLL));
    }
}

/// Connect to the device, retrying on refusal until success or cancellation.
///
/// Each refusal is reported at `Error` level and followed by a wait of
/// `interval`; any other connection failure propagates. Success is reported
/// at `Status` level.
pub fn connect_retry(
    host: &str,
    port: u16,
    interval: Duration,
    cancel: &AtomicBool,
    reporter: &Reporter,
) -> Result<TcpTransport> {
    loop {
        if cancel.load(Ordering::Relaxed) {
            return Err(Error::Cancelled);
        }

        match TcpTransport::connect(host, port) {
            Ok(transport) => {
                reporter.report(Levels::STATUS, &format!("Connected to {}:{}.", host, port));
                return Ok(transport);
            }
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
                reporter.report(
                    Levels::ERROR,
                    &format!(
                        "Error: Unable to connect to {} on port {}. Retrying in {} seconds...",
                        host,
                        port,
                        interval.as_secs_f64()
                    ),
                );
                interruptible_sleep(interval, cancel)?;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn silent() -> Reporter {
        Reporter::new(Levels::empty())
    }

    /// Port that was just bound and released; nothing listens on it.
    fn dead_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[test]
    fn connects_once_listener_appears() {
        let port = dead_port();
        let cancel = Arc::new(AtomicBool::new(false));

        let server = std::thread::spawn(move || {
            // Let the client eat a few refusals first
            std::thread::sleep(Duration::from_millis(200));
            let listener = TcpListener::bind(("127.0.0.1", port)).unwrap();
            let _ = listener.accept();
        });

        let result = connect_retry(
            "127.0.0.1",
            port,
            Duration::from_millis(20),
            &cancel,
            &silent(),
        );
        assert!(result.is_ok());
        server.join().unwrap();
    }

    #[test]
    fn retry_unwinds_on_cancellation() {
        let port = dead_port();
        let cancel = Arc::new(AtomicBool::new(false));

        let flag = cancel.clone();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            flag.store(true, Ordering::Relaxed);
        });

        let started = Instant::now();
        let result = connect_retry(
            "127.0.0.1",
            port,
            Duration::from_secs(60),
            &cancel,
            &silent(),
        );
        canceller.join().unwrap();

        assert!(matches!(result, Err(Error::Cancelled)));
        // The 60 s retry wait must not run to completion
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn sleep_returns_cancelled_when_flag_set() {
        let cancel = AtomicBool::new(true);
        assert!(matches!(
            interruptible_sleep(Duration::from_secs(60), &cancel),
            Err(Error::Cancelled)
        ));
    }

    #[test]
    fn read_byte_times_out_quietly() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            // Hold the connection open without sending anything
            std::thread::sleep(Duration::from_millis(300));
            drop(stream);
        });

        let mut transport = TcpTransport::connect("127.0.0.1", port).unwrap();
        let got = transport.read_byte(Duration::from_millis(50)).unwrap();
        assert_eq!(got, None);
        server.join().unwrap();
    }
}
