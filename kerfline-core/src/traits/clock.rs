//! Time source and diagnostic output

use core::fmt;

/// Monotonic millisecond clock
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Severity of a diagnostic line
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Sink for diagnostic log lines
///
/// Fire-and-forget: implementations must not block and the controller
/// never inspects the outcome.
pub trait DiagnosticSink {
    fn emit(&mut self, level: LogLevel, args: fmt::Arguments<'_>);
}
