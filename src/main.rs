//! biostalk - program and boot an FPGA-hosted BIOS over TCP
//!
//! Connects to the bootloader (retrying until it appears), streams a
//! firmware image into device RAM with optional verification, optionally
//! issues the boot command, and echoes the device console.
//!
//! The session is strictly sequential over one owned connection; CTRL-C
//! cancels whatever is blocking (retry wait, pause, read) and unwinds
//! cleanly, releasing the socket on the way out.

mod cli;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use biostalk_core::{connect_retry, Check, Config, Error, Levels, Reporter, Result, Session};
use clap::Parser;

fn main() {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = cli::Cli::parse().into_config();
    let reporter = Reporter::new(config.levels);

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        if let Err(e) = ctrlc::set_handler(move || cancel.store(true, Ordering::SeqCst)) {
            log::warn!("Failed to install interrupt handler: {}", e);
        }
    }

    match run(config, &reporter, cancel) {
        Ok(()) => {}
        Err(Error::Cancelled) => {
            reporter.report(Levels::STATUS, "\nOperation cancelled by user.");
        }
        Err(e) => reporter.fatal(&e.to_string()),
    }
}

fn run(config: Config, reporter: &Reporter, cancel: Arc<AtomicBool>) -> Result<()> {
    let link = connect_retry(
        &config.host,
        config.port,
        config.retry_interval,
        &cancel,
        reporter,
    )?;

    let mut image = Vec::new();
    if config.write || config.check != Check::Off {
        image = match std::fs::read(&config.file) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::FileNotFound(config.file.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        if image.is_empty() {
            reporter.report(
                Levels::ERROR,
                &format!("File '{}' is empty.", config.file.display()),
            );
            reporter.report(Levels::ERROR, "Continuing.");
        }
    }

    let mut session = Session::new(link, config, *reporter, cancel);
    session.run(&image)
}
