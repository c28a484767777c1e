//! Leveled output for stdlib natives.
//!
//! `std.print` and the runtime's teardown diagnostics write through here
//! so stream routing and prefixes stay in one place. Debug and info lines
//! go to stdout, warnings and errors to stderr; info is unprefixed since
//! it carries script-visible `print` output.

/// Line severity. Selects the output stream and prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Prefixed diagnostics on stdout.
    Debug,
    /// Bare output on stdout; the `print` channel.
    Info,
    /// Prefixed warnings on stderr.
    Warn,
    /// Prefixed errors on stderr.
    Error,
}

impl Level {
    fn prefix(self) -> &'static str {
        match self {
            Level::Debug => "[DEBUG] ",
            Level::Info => "",
            Level::Warn => "[WARN] ",
            Level::Error => "[ERROR] ",
        }
    }

    fn to_stderr(self) -> bool {
        matches!(self, Level::Warn | Level::Error)
    }
}

/// Write one line at `level`.
pub fn log(level: Level, message: &str) {
    if level.to_stderr() {
        eprintln!("{}{}", level.prefix(), message);
    } else {
        println!("{}{}", level.prefix(), message);
    }
}

/// Debug line on stdout.
pub fn debug(message: &str) {
    log(Level::Debug, message);
}

/// Unprefixed line on stdout.
pub fn info(message: &str) {
    log(Level::Info, message);
}

/// Warning line on stderr.
pub fn warn(message: &str) {
    log(Level::Warn, message);
}

/// Error line on stderr.
pub fn error(message: &str) {
    log(Level::Error, message);
}
