//! Simple to ``stderr`` logger.
//!
//! `trace!`, `debug!` and `info!` are only compiled in when the *calling* crate
//! has a `debug` feature enabled, which is expected to forward to `logger/debug`.
//! `warn!` and `error!` always print.

use std::fmt;

/// Timestamp related functions.
///
/// This module is used by [`emit`], which is called from the exported macros in
/// external crates; so this has to be public in scope.
#[cfg(feature = "debug")]
pub mod timestamp {
    use chrono::Utc;

    /// Generate the current timestamp.
    pub fn now() -> String {
        Utc::now().to_rfc3339()
    }
}

/// Severity of a log line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    /// The label printed in front of the message.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }

    /// ANSI colours of the label and of the message.
    const fn colours(&self) -> (&'static str, &'static str) {
        match self {
            Self::Trace => ("\x1b[38:5:240m", "\x1b[38:5:240m"),
            Self::Debug => ("\x1b[38:5:245m", "\x1b[38:5:245m"),
            Self::Info => ("\x1b[38:5:15m", "\x1b[38:5:7m"),
            Self::Warn => ("\x1b[38:5:11m", "\x1b[38:5:228m"),
            Self::Error => ("\x1b[38:5:9m", "\x1b[38:5:160m"),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Write a single formatted line to ``stderr``.
///
/// Not meant to be called directly; use the macros instead.
pub fn emit(level: Level, args: fmt::Arguments<'_>) {
    let (label_colour, text_colour) = level.colours();

    #[cfg(feature = "debug")]
    eprintln!(
        "\x1b[38:5:240m{}\x1b[39m \x1b[1m{label_colour}{:<5}\x1b[39m | \x1b[22m{text_colour}{}\x1b[39m",
        timestamp::now(),
        level.label(),
        args
    );

    #[cfg(not(feature = "debug"))]
    eprintln!(
        "\x1b[1m{label_colour}{:<5}\x1b[39m | \x1b[22m{text_colour}{}\x1b[39m",
        level.label(),
        args
    );
}

#[macro_export]
macro_rules! trace {
    ($($arg:tt)+) => {{
        #[cfg(feature = "debug")]
        $crate::emit($crate::Level::Trace, format_args!($($arg)+));
    }};
}

#[macro_export]
macro_rules! debug {
    ($($arg:tt)+) => {{
        #[cfg(feature = "debug")]
        $crate::emit($crate::Level::Debug, format_args!($($arg)+));
    }};
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)+) => {{
        #[cfg(feature = "debug")]
        $crate::emit($crate::Level::Info, format_args!($($arg)+));
    }};
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)+) => {{
        $crate::emit($crate::Level::Warn, format_args!($($arg)+));
    }};
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)+) => {{
        $crate::emit($crate::Level::Error, format_args!($($arg)+));
    }};
}
