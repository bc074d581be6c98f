//! Console logging for the exemplar workspace.
//!
//! Every line goes to stderr with a short coloured level prefix so stdout stays
//! free for machine-readable output (JSON results, rendered instructions).
//!
//! `verbose` and `debug` lines are suppressed unless [`set_verbose`] has been
//! called, typically from a `--verbose` CLI flag.
//!
//! The macros accept `format!`-style arguments:
//!
//! ```
//! bentley::info!("loaded {} records", 42);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

use colored::*;

#[cfg(feature = "daemon-logs")]
pub mod daemon_logs;

static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Enable or disable `verbose` and `debug` output for the whole process.
pub fn set_verbose(enabled: bool) {
  VERBOSE.store(enabled, Ordering::Relaxed);
}

pub fn is_verbose() -> bool {
  VERBOSE.load(Ordering::Relaxed)
}

/// Log level understood by both the console functions and the daemon log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
  Verbose,
  Debug,
  Info,
  Success,
  Warn,
  Error,
}

impl Level {
  pub fn as_str(&self) -> &'static str {
    match self {
      Level::Verbose => "verbose",
      Level::Debug => "debug",
      Level::Info => "info",
      Level::Success => "success",
      Level::Warn => "warn",
      Level::Error => "error",
    }
  }

  fn tag(&self) -> (&'static str, Color) {
    match self {
      Level::Verbose => ("verb", Color::Cyan),
      Level::Debug => ("debug", Color::Magenta),
      Level::Info => ("info", Color::Blue),
      Level::Success => ("sccs", Color::Green),
      Level::Warn => ("warn", Color::Yellow),
      Level::Error => ("error", Color::Red),
    }
  }

  fn is_gated(&self) -> bool {
    matches!(self, Level::Verbose | Level::Debug)
  }
}

impl std::str::FromStr for Level {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "verbose" => Ok(Level::Verbose),
      "debug" => Ok(Level::Debug),
      "info" => Ok(Level::Info),
      "success" => Ok(Level::Success),
      "warn" | "warning" => Ok(Level::Warn),
      "error" => Ok(Level::Error),
      other => Err(format!("unknown log level '{other}'")),
    }
  }
}

fn format_prefix(level: Level) -> String {
  let (prefix, color) = level.tag();
  format!("[{}]{:<width$}", prefix.color(color).bold(), "", width = 7 - prefix.len() - 2)
}

/// Render a message with the level prefix on every line.
pub fn render(level: Level, message: &str) -> String {
  let prefix = format_prefix(level);
  message.lines().map(|line| format!("{prefix} {line}")).collect::<Vec<_>>().join("\n")
}

/// Print a message at `level`, honouring the verbosity gate.
pub fn emit(level: Level, message: &str) {
  if level.is_gated() && !is_verbose() {
    return;
  }
  if message.is_empty() {
    return;
  }
  eprintln!("{}", render(level, message));
}

pub fn verbose(message: &str) {
  emit(Level::Verbose, message);
}

pub fn debug(message: &str) {
  emit(Level::Debug, message);
}

pub fn info(message: &str) {
  emit(Level::Info, message);
}

pub fn success(message: &str) {
  emit(Level::Success, message);
}

pub fn warn(message: &str) {
  emit(Level::Warn, message);
}

pub fn error(message: &str) {
  emit(Level::Error, message);
}

#[macro_export]
macro_rules! verbose {
  ($($arg:tt)*) => {
    $crate::verbose(&format!($($arg)*)) // LCOV_EXCL_LINE
  };
}

#[macro_export]
macro_rules! debug {
  ($($arg:tt)*) => {
    $crate::debug(&format!($($arg)*)) // LCOV_EXCL_LINE
  };
}

#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => {
    $crate::info(&format!($($arg)*)) // LCOV_EXCL_LINE
  };
}

#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => {
    $crate::success(&format!($($arg)*)) // LCOV_EXCL_LINE
  };
}

#[macro_export]
macro_rules! warn {
  ($($arg:tt)*) => {
    $crate::warn(&format!($($arg)*)) // LCOV_EXCL_LINE
  };
}

#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => {
    $crate::error(&format!($($arg)*)) // LCOV_EXCL_LINE
  };
}
