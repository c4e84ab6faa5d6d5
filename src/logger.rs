//! Console Logger
//!
//! Backend for the `log` facade. Records go to a console sink registered
//! once at boot (the PL011 UART on hardware, a buffer in tests).
//!
//! # Format
//! `[LEVEL] message`, one record per line.

use core::fmt::Write;

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use spin::{Mutex, Once};

/// Any console the logger can write to.
pub type Sink = Mutex<dyn Write + Send>;

struct ConsoleLogger {
    sink: Once<&'static Sink>,
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Some(sink) = self.sink.get() {
            let mut out = sink.lock();
            let _ = writeln!(out, "[{:<5}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: ConsoleLogger = ConsoleLogger { sink: Once::new() };

/// Install the console logger.
///
/// # Errors
/// Fails if a logger was already installed.
pub fn init(sink: &'static Sink, level: LevelFilter) -> Result<(), SetLoggerError> {
    LOGGER.sink.call_once(|| sink);
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TspConfig;

    static CONSOLE: Mutex<String> = Mutex::new(String::new());

    #[test]
    fn test_records_reach_sink() {
        init(&CONSOLE, TspConfig::DEFAULT.log_level).unwrap();
        log::info!("[TEST] console online");
        log::trace!("[TEST] filtered out");

        let out = CONSOLE.lock();
        assert!(out.contains("[INFO ] [TEST] console online\n"));
        assert!(!out.contains("filtered out"));

        drop(out);
        assert!(init(&CONSOLE, LevelFilter::Info).is_err());
    }
}
