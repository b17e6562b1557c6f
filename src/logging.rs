//! Stderr logger behind the `log` facade.
//!
//! Level resolution: explicit level from the command line, then the
//! `PUMLVIEW_LOG` environment variable, then `warn`. Records can optionally be
//! mirrored to a log file.

use log::{LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Environment variable consulted when no level is given explicitly.
pub const LOG_LEVEL_ENV: &str = "PUMLVIEW_LOG";

struct StderrLogger {
    level: LevelFilter,
    file: Mutex<Option<File>>,
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = format!(
            "[{}] [{:<5}] [{}] {}",
            timestamp(),
            record.level(),
            record.target(),
            record.args()
        );

        eprintln!("{line}");

        if let Some(file) = self.file.lock().as_mut() {
            let _ = writeln!(file, "{line}");
        }
    }

    fn flush(&self) {
        if let Some(file) = self.file.lock().as_mut() {
            let _ = file.flush();
        }
    }
}

fn timestamp() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}.{:06}", now.as_secs(), now.subsec_micros())
}

/// Parse a level name (`off`, `error`, `warn`, `info`, `debug`, `trace`).
pub fn parse_level(value: &str) -> Option<LevelFilter> {
    value.trim().parse::<LevelFilter>().ok()
}

fn resolve_level(explicit: Option<LevelFilter>) -> LevelFilter {
    explicit
        .or_else(|| {
            std::env::var(LOG_LEVEL_ENV)
                .ok()
                .and_then(|v| parse_level(&v))
        })
        .unwrap_or(LevelFilter::Warn)
}

/// Install the logger. Calling this twice keeps the first logger.
pub fn init(explicit: Option<LevelFilter>, log_file: Option<&Path>) -> Result<(), String> {
    let level = resolve_level(explicit);

    let file = match log_file {
        Some(path) => Some(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| format!("Failed to open log file {}: {}", path.display(), e))?,
        ),
        None => None,
    };

    let logger = StderrLogger {
        level,
        file: Mutex::new(file),
    };

    if log::set_boxed_logger(Box::new(logger)).is_ok() {
        log::set_max_level(level);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{parse_level, resolve_level};
    use log::LevelFilter;

    #[test]
    fn parses_level_names_case_insensitively() {
        assert_eq!(parse_level("DEBUG"), Some(LevelFilter::Debug));
        assert_eq!(parse_level(" off "), Some(LevelFilter::Off));
        assert_eq!(parse_level("loud"), None);
    }

    #[test]
    fn explicit_level_wins() {
        assert_eq!(resolve_level(Some(LevelFilter::Trace)), LevelFilter::Trace);
    }
}
