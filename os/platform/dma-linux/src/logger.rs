use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::{self, Write};

/// Writes log records to standard error as `[LEVEL] target: message`.
#[derive(Debug, Copy, Clone)]
pub struct StderrLogger {
    max_level: LevelFilter,
}

impl StderrLogger {
    #[must_use]
    pub const fn new(max_level: LevelFilter) -> Self {
        Self { max_level }
    }

    /// Level from a name such as `"debug"` (case-insensitive), as read from
    /// an environment variable.
    #[must_use]
    pub fn level_from_name(name: &str) -> Option<LevelFilter> {
        name.trim().parse().ok()
    }

    #[inline]
    #[must_use]
    pub const fn max_level(&self) -> LevelFilter {
        self.max_level
    }

    /// Install as the global logger. Call once, early.
    ///
    /// # Errors
    /// If another logger has already been installed.
    pub fn init(self) -> Result<(), SetLoggerError> {
        let max_level = self.max_level;
        log::set_logger(Box::leak(Box::new(self)))?;
        log::set_max_level(max_level);
        Ok(())
    }

    fn write_record(&self, out: &mut impl Write, record: &Record) -> io::Result<()> {
        if !self.enabled(record.metadata()) {
            return Ok(());
        }
        writeln!(
            out,
            "[{}] {}: {}",
            record.level(),
            record.target(),
            record.args()
        )
    }
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        // Best effort; there is nowhere left to report a failing stderr.
        let _ = self.write_record(&mut io::stderr().lock(), record);
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;

    fn render(logger: &StderrLogger, level: Level, message: &str) -> String {
        let mut out = Vec::new();
        logger
            .write_record(
                &mut out,
                &Record::builder()
                    .level(level)
                    .target("sg_list::list")
                    .args(format_args!("{message}"))
                    .build(),
            )
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn formats_level_target_and_message() {
        let logger = StderrLogger::new(LevelFilter::Debug);
        assert_eq!(
            render(&logger, Level::Warn, "arena exhausted"),
            "[WARN] sg_list::list: arena exhausted\n"
        );
    }

    #[test]
    fn drops_records_above_the_max_level() {
        let logger = StderrLogger::new(LevelFilter::Info);
        assert_eq!(render(&logger, Level::Debug, "noise"), "");
        assert_eq!(render(&logger, Level::Error, "x"), "[ERROR] sg_list::list: x\n");
    }

    #[test]
    fn parses_level_names() {
        assert_eq!(
            StderrLogger::level_from_name("TRACE"),
            Some(LevelFilter::Trace)
        );
        assert_eq!(
            StderrLogger::level_from_name(" warn\n"),
            Some(LevelFilter::Warn)
        );
        assert_eq!(StderrLogger::level_from_name("off"), Some(LevelFilter::Off));
        assert_eq!(StderrLogger::level_from_name("loud"), None);
    }
}
