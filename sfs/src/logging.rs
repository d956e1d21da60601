//! A stderr logger for the command-line front ends.

use log::{Level, LevelFilter, Log, Metadata, Record};

struct SimpleLogger;

impl Log for SimpleLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let color = match record.level() {
            Level::Error => 31,
            Level::Warn => 93,
            Level::Info => 34,
            Level::Debug => 32,
            Level::Trace => 90,
        };
        eprintln!(
            "\u{1B}[{}m[{:>5}] {}\u{1B}[0m",
            color,
            record.level(),
            record.args(),
        );
    }

    fn flush(&self) {}
}

/// Installs the logger. The level comes from `SFS_LOG`
/// (`error`, `warn`, `info`, `debug`, `trace`) and defaults to `warn`.
pub fn init() {
    static LOGGER: SimpleLogger = SimpleLogger;
    // A second call keeps the first logger.
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(level_from(std::env::var("SFS_LOG").ok().as_deref()));
}

fn level_from(var: Option<&str>) -> LevelFilter {
    match var {
        Some("error") => LevelFilter::Error,
        Some("info") => LevelFilter::Info,
        Some("debug") => LevelFilter::Debug,
        Some("trace") => LevelFilter::Trace,
        Some("off") => LevelFilter::Off,
        _ => LevelFilter::Warn,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_levels_fall_back_to_warn() {
        assert_eq!(level_from(None), LevelFilter::Warn);
        assert_eq!(level_from(Some("loud")), LevelFilter::Warn);
        assert_eq!(level_from(Some("debug")), LevelFilter::Debug);
    }
}
