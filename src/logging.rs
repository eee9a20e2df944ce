//! Logging setup with a runtime-adjustable level.
//!
//! The binary installs one `tracing` subscriber at startup. Its level lives in
//! a shared [`LogLevelFilter`] so a reloaded `logLevel` takes effect without
//! restarting. A `RUST_LOG` directive, when present, further narrows output.

use std::fs::OpenOptions;
use std::sync::{
    Arc,
    atomic::{AtomicU8, Ordering},
};
use tracing::Level;
use tracing_subscriber::{
    EnvFilter, Layer, filter::filter_fn, fmt::MakeWriter, layer::SubscriberExt,
};

/// Atomic maximum level.
///
/// Stored as 0=error, 1=warn, 2=info, 3=debug, 4=trace.
#[derive(Debug)]
pub struct LogLevelFilter(AtomicU8);

impl LogLevelFilter {
    pub fn new(level: Level) -> Self {
        Self(AtomicU8::new(level_to_u8(level)))
    }

    pub fn get(&self) -> Level {
        u8_to_level(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, level: Level) {
        self.0.store(level_to_u8(level), Ordering::Relaxed);
    }

    /// Apply a config `logLevel` string; unknown names leave the level alone.
    pub fn set_from_config(&self, name: &str) -> bool {
        match parse_level(name) {
            Some(level) => {
                self.set(level);
                true
            }
            None => false,
        }
    }

    pub fn should_log(&self, level: Level) -> bool {
        level_to_u8(level) <= self.0.load(Ordering::Relaxed)
    }
}

impl Default for LogLevelFilter {
    fn default() -> Self {
        Self::new(Level::INFO)
    }
}

fn level_to_u8(level: Level) -> u8 {
    match level {
        Level::ERROR => 0,
        Level::WARN => 1,
        Level::INFO => 2,
        Level::DEBUG => 3,
        Level::TRACE => 4,
    }
}

fn u8_to_level(val: u8) -> Level {
    match val {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Map a config `logLevel` value to a tracing level.
pub fn parse_level(name: &str) -> Option<Level> {
    match name.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

fn install<W>(writer: W, ansi: bool, filter: Arc<LogLevelFilter>) -> anyhow::Result<()>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let fmt = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_filter(filter_fn(move |meta| filter.should_log(*meta.level())));
    let subscriber = tracing_subscriber::registry()
        .with(fmt)
        .with(EnvFilter::try_from_default_env().ok());
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Install the global subscriber for `target`: `0`/`off`, `1`/`stdout`,
/// `2`/`stderr`, or a file name appended to.
pub fn init_logging(target: &str, filter: Arc<LogLevelFilter>) -> anyhow::Result<()> {
    match target {
        "0" | "off" => Ok(()),
        "1" | "stdout" => install(std::io::stdout, true, filter),
        "2" | "stderr" => install(std::io::stderr, true, filter),
        filename => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(filename)?;
            install(file, false, filter)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filter() {
        let filter = LogLevelFilter::new(Level::WARN);
        assert!(filter.should_log(Level::ERROR));
        assert!(filter.should_log(Level::WARN));
        assert!(!filter.should_log(Level::INFO));

        filter.set(Level::TRACE);
        assert!(filter.should_log(Level::DEBUG));
        assert_eq!(filter.get(), Level::TRACE);
    }

    #[test]
    fn test_set_from_config() {
        let filter = LogLevelFilter::default();
        assert!(filter.set_from_config(" DEBUG "));
        assert_eq!(filter.get(), Level::DEBUG);
        assert!(!filter.set_from_config("chatty"));
        assert_eq!(filter.get(), Level::DEBUG);
    }

    #[test]
    fn test_roundtrip_levels() {
        for level in [Level::ERROR, Level::WARN, Level::INFO, Level::DEBUG, Level::TRACE] {
            assert_eq!(u8_to_level(level_to_u8(level)), level);
        }
    }
}
