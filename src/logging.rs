//! Diagnostic logging on stderr.
//!
//! Generalizes the sync-progress reporter's dual human/JSON stderr output
//! (see the teacher's `progress.rs`) into a free-form leveled line logger.
//! No external logging framework is introduced: the teacher's own tree
//! carries none, using `println!`/`eprintln!` directly, and this module
//! follows that choice rather than pulling in `tracing`.

use serde::Serialize;
use std::io::Write;
use std::sync::OnceLock;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LogMode {
    Human,
    Json,
}

impl LogMode {
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            LogMode::Human
        } else {
            LogMode::Json
        }
    }
}

static MODE: OnceLock<LogMode> = OnceLock::new();

/// Set the process-wide logging mode. Call once at startup; later calls are
/// ignored (first writer wins), matching the teacher's process-lifetime
/// singleton pattern.
pub fn init(mode: LogMode) {
    let _ = MODE.set(mode);
}

fn mode() -> LogMode {
    *MODE.get_or_init(LogMode::default_for_tty)
}

#[derive(Serialize)]
struct LogLine<'a> {
    level: &'a str,
    event: &'a str,
    message: &'a str,
}

fn emit(level: &str, event: &str, message: &str) {
    match mode() {
        LogMode::Human => {
            let _ = writeln!(std::io::stderr(), "{:<5} {:<24} {}", level, event, message);
        }
        LogMode::Json => {
            let line = LogLine {
                level,
                event,
                message,
            };
            if let Ok(s) = serde_json::to_string(&line) {
                let _ = writeln!(std::io::stderr(), "{}", s);
            }
        }
    }
}

pub fn info(event: &str, message: &str) {
    emit("INFO", event, message);
}

pub fn warn(event: &str, message: &str) {
    emit("WARN", event, message);
}

pub fn error(event: &str, message: &str) {
    emit("ERROR", event, message);
}
