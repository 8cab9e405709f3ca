//! Diagnostic logging macros
//!
//! Thin wrappers that format a line and hand it to a `DiagnosticSink`.
//! The first argument is the sink place expression, e.g. `ctx.io.diag`.

macro_rules! log_at {
    ($sink:expr, $level:ident, $($arg:tt)*) => {
        $crate::traits::DiagnosticSink::emit(
            &mut $sink,
            $crate::traits::LogLevel::$level,
            format_args!($($arg)*),
        )
    };
}

macro_rules! trace {
    ($sink:expr, $($arg:tt)*) => { log_at!($sink, Trace, $($arg)*) };
}

macro_rules! debug {
    ($sink:expr, $($arg:tt)*) => { log_at!($sink, Debug, $($arg)*) };
}

macro_rules! info {
    ($sink:expr, $($arg:tt)*) => { log_at!($sink, Info, $($arg)*) };
}

macro_rules! warn {
    ($sink:expr, $($arg:tt)*) => { log_at!($sink, Warn, $($arg)*) };
}

macro_rules! error {
    ($sink:expr, $($arg:tt)*) => { log_at!($sink, Error, $($arg)*) };
}
