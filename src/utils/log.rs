// src/utils/log.rs

//! Console output with server-style formatting.
//!
//! Diagnostics go through the `log` facade. This module renders the
//! user-facing parts of a run: banners, the live progress line and the
//! final summary.

use std::io::Write;
use std::sync::OnceLock;

use chrono::Local;

/// Log level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "debug" | "trace" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

/// Current console level
static LOG_LEVEL: OnceLock<LogLevel> = OnceLock::new();

/// Initialize the console with a level name
pub fn init(level: &str) {
    let _ = LOG_LEVEL.set(LogLevel::from_str(level));
}

/// Check if a log level should be displayed
fn should_log(level: LogLevel) -> bool {
    let current = LOG_LEVEL.get().copied().unwrap_or(LogLevel::Info);
    level >= current
}

/// Format a log message with timestamp and level
fn format_log(level: LogLevel, message: &str) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    format!("[{}] [{}] {}", timestamp, level.as_str(), message)
}

/// Log a success message (always shown as INFO)
pub fn success(message: &str) {
    clear_line();
    println!("{}", format_log(LogLevel::Info, &format!("✓ {}", message)));
}

/// Log a failure message
pub fn failure(message: &str) {
    if should_log(LogLevel::Error) {
        clear_line();
        eprintln!("{}", format_log(LogLevel::Error, &format!("✗ {}", message)));
    }
}

/// Rewrite the live status line in place
pub fn progress(line: &str) {
    if should_log(LogLevel::Info) {
        let mut out = std::io::stdout();
        let _ = write!(out, "\r\x1b[K{}", line);
        let _ = out.flush();
    }
}

/// Erase the live status line so regular output starts clean
pub fn clear_line() {
    let mut out = std::io::stdout();
    let _ = write!(out, "\r\x1b[K");
    let _ = out.flush();
}

/// Log a separator line
pub fn separator() {
    if should_log(LogLevel::Info) {
        println!("{}", "═".repeat(60));
    }
}

/// Log a header
pub fn header(title: &str) {
    if should_log(LogLevel::Info) {
        println!();
        separator();
        println!("  {}", title);
        separator();
    }
}

/// Log a sub-item (indented)
pub fn sub_item(message: &str) {
    if should_log(LogLevel::Info) {
        println!("    {}", message);
    }
}

/// Log a summary section
pub fn summary(title: &str, items: &[(&str, String)]) {
    if should_log(LogLevel::Info) {
        clear_line();
        println!();
        println!("[{}] [SUMMARY] {}", Local::now().format("%H:%M:%S"), title);
        for (key, value) in items {
            println!("    {}: {}", key, value);
        }
    }
}

/// Format whole seconds as `H:MM:SS`.
pub fn format_elapsed(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{}:{:02}:{:02}", hours, minutes, seconds)
}
