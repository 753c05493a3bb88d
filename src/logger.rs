/*!
A `log` backend that writes to stderr, configured by `RECUR_LOG`.

Lines look like `16:30:55.123 DEBUG recur::recur::chain: message`. The time
is UTC, since finding the system time zone may itself log.
*/

use std::io::Write;

use log::{LevelFilter, Log, Metadata, Record};

use crate::style::Theme;

/// Installs the stderr logger, at the level named by the value of the
/// `RECUR_LOG` environment variable.
pub fn init(name: &str) -> anyhow::Result<()> {
    let level = level(name)?;
    log::set_logger(&StderrLogger)?;
    log::set_max_level(level);
    Ok(())
}

/// Parses a log level. An empty value turns logging off.
fn level(name: &str) -> anyhow::Result<LevelFilter> {
    if name.is_empty() {
        return Ok(LevelFilter::Off);
    }
    name.parse().map_err(|_| {
        anyhow::anyhow!(
            "unrecognized log level `{name}` (expected one of \
             off, error, warn, info, debug or trace)",
        )
    })
}

#[derive(Debug)]
struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let theme = Theme::stderr();
        let now = jiff::Timestamp::now();
        let target = record.module_path().unwrap_or(record.target());
        // There's nowhere left to report a failure to write a log line.
        let _ = writeln!(
            std::io::stderr().lock(),
            "{} {} {}: {}",
            theme.time(now.strftime("%H:%M:%S%.3f")),
            theme.level(record.level()),
            theme.target(target),
            record.args(),
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}
