//! Report levels and output routing
//!
//! User-facing output is gated by a bit-set of severity/category levels
//! resolved once from the configuration. This is separate from the `log`
//! facade, which carries developer diagnostics only.

use std::io::Write;

bitflags::bitflags! {
    /// Bit-set of report levels. The empty set is `Off`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Levels: u8 {
        /// Unrecoverable failure; reporting it terminates the process
        const FATAL = 1 << 0;
        /// Recoverable failure worth telling the user about
        const ERROR = 1 << 1;
        /// Session milestones (connected, pass finished, booted)
        const STATUS = 1 << 2;
        /// Per-byte progress counters
        const PROGRESS = 1 << 3;
        /// Raw bytes on the wire, both directions
        const WIRE = 1 << 4;
        /// Derived address values per item
        const CALCULATION = 1 << 5;
    }
}

impl Levels {
    /// Whether reports must each get their own line.
    ///
    /// Wire and calculation tracing interleave with the progress counter;
    /// overwriting the current line would garble them, so either level being
    /// active forces one report per line globally.
    pub fn synchronous(self) -> bool {
        self.intersects(Levels::WIRE | Levels::CALCULATION)
    }

    /// Whether the set includes an error level (routes to stderr).
    pub fn errors(self) -> bool {
        self.intersects(Levels::FATAL | Levels::ERROR)
    }

    /// Parse a comma- (or pipe-) separated list of level names.
    ///
    /// `Off` contributes nothing and is how an empty set is spelled.
    pub fn parse_set(s: &str) -> Result<Levels, String> {
        let mut set = Levels::empty();
        for name in s.replace('|', ",").split(',') {
            set |= match name.trim().to_ascii_lowercase().as_str() {
                "off" => Levels::empty(),
                "fatal" => Levels::FATAL,
                "error" => Levels::ERROR,
                "status" => Levels::STATUS,
                "progress" => Levels::PROGRESS,
                "wire" => Levels::WIRE,
                "calculation" => Levels::CALCULATION,
                other => return Err(format!("unknown log level: {}", other)),
            };
        }
        Ok(set)
    }
}

impl Default for Levels {
    fn default() -> Self {
        Levels::FATAL | Levels::ERROR | Levels::STATUS
    }
}

/// Routes report messages according to the active level set.
#[derive(Debug, Clone, Copy)]
pub struct Reporter {
    active: Levels,
}

impl Reporter {
    pub fn new(active: Levels) -> Self {
        Self { active }
    }

    pub fn active(&self) -> Levels {
        self.active
    }

    /// Emit `message` if `level` intersects the active set.
    ///
    /// Progress reports overwrite the current output line unless the active
    /// set is synchronous. Error levels route to stderr. A fatal report
    /// terminates the process with a non-zero status after emitting.
    pub fn report(&self, level: Levels, message: &str) {
        if !self.active.intersects(level) {
            return;
        }

        if level.contains(Levels::PROGRESS) && !self.active.synchronous() {
            print!("\r{}", message);
            std::io::stdout().flush().ok();
            return;
        }

        if level.errors() {
            eprintln!("{}", message);
        } else {
            println!("{}", message);
        }

        if level.contains(Levels::FATAL) {
            std::process::exit(1);
        }
    }

    /// Report a fatal diagnostic and terminate with a non-zero status.
    ///
    /// The exit happens even when `Fatal` is filtered out of the active
    /// set; only the message is suppressed.
    pub fn fatal(&self, message: &str) -> ! {
        self.report(Levels::FATAL, message);
        std::process::exit(1);
    }
}
