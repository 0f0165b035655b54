//! Runtime configuration read from the environment.
//!
//! Nothing here changes the accepted language; it only selects the emitted
//! entry label and how chatty diagnostics are.

use std::env;

use tracing::Level;

const ENTRY_ENV: &str = "STACKCC_ENTRY";
const LOG_ENV: &str = "STACKCC_LOG";
const DEFAULT_ENTRY: &str = "main";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
  /// Global label the generated code is placed under.
  pub entry_symbol: String,
  pub log_level: Level,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      entry_symbol: DEFAULT_ENTRY.to_string(),
      log_level: Level::WARN,
    }
  }
}

impl Config {
  /// Read `STACKCC_ENTRY` and `STACKCC_LOG`. Rejected values fall back to
  /// the defaults and are reported in the returned list, since logging is
  /// not set up yet when this runs.
  pub fn from_env() -> (Self, Vec<String>) {
    Self::from_values(env::var(ENTRY_ENV).ok(), env::var(LOG_ENV).ok())
  }

  pub fn from_values(entry: Option<String>, log: Option<String>) -> (Self, Vec<String>) {
    let mut config = Self::default();
    let mut rejected = Vec::new();

    if let Some(raw) = entry {
      let trimmed = raw.trim();
      if is_symbol(trimmed) {
        config.entry_symbol = trimmed.to_string();
      } else {
        rejected.push(format!(
          "ignoring {ENTRY_ENV}={raw:?}: not a valid symbol, using \"{DEFAULT_ENTRY}\""
        ));
      }
    }

    if let Some(raw) = log {
      match parse_level(&raw) {
        Some(level) => config.log_level = level,
        None => rejected.push(format!(
          "ignoring {LOG_ENV}={raw:?}: expected error, warn, info, debug or trace"
        )),
      }
    }

    (config, rejected)
  }
}

fn is_symbol(s: &str) -> bool {
  let mut chars = s.chars();
  chars
    .next()
    .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '.')
    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

fn parse_level(raw: &str) -> Option<Level> {
  match raw.trim().to_ascii_lowercase().as_str() {
    "error" => Some(Level::ERROR),
    "warn" => Some(Level::WARN),
    "info" => Some(Level::INFO),
    "debug" => Some(Level::DEBUG),
    "trace" => Some(Level::TRACE),
    _ => None,
  }
}
