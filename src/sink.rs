//! Error/log sink. §5: "the only shared global is an `ErrorSink` for logs
//! and a process-wide `context`". The default sink forwards to the `log`
//! crate (the teacher's own logging dependency); a host can supply its own
//! `ErrorSink` to capture structured log entries instead (e.g. for the
//! `Report.log` slice §6 promises downstream).

use crate::mask::{LogEntry, LogLevel};

pub trait ErrorSink {
    fn emit(&mut self, entry: LogEntry);
}

/// Forwards every entry to the `log` crate with the `tag` as a prefix,
/// matching §7's "structured tag" requirement (`NMEA0183:` / `UBX:`).
#[derive(Debug, Default)]
pub struct LogCrateSink;

impl ErrorSink for LogCrateSink {
    fn emit(&mut self, entry: LogEntry) {
        match entry.level {
            LogLevel::Data => log::debug!("{} {}", entry.tag, entry.message),
            LogLevel::Warn => log::warn!("{} {}", entry.tag, entry.message),
            LogLevel::Error => log::error!("{} {}", entry.tag, entry.message),
        }
    }
}

/// Collects entries in memory; used by tests and by hosts that want to
/// surface the log alongside a `Report` rather than through `log`.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub entries: Vec<LogEntry>,
}

impl ErrorSink for CollectingSink {
    fn emit(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }
}

pub(crate) fn warn(sink: &mut dyn ErrorSink, tag: &'static str, message: impl Into<String>) {
    sink.emit(LogEntry { level: LogLevel::Warn, tag, message: message.into() });
}

pub(crate) fn data(sink: &mut dyn ErrorSink, tag: &'static str, message: impl Into<String>) {
    sink.emit(LogEntry { level: LogLevel::Data, tag, message: message.into() });
}
