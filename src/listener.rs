//! Diagnostics sinks for human-readable progress messages.
//!
//! A listener never fails: write errors are swallowed so that reporting a
//! problem can never become a problem of its own.

use std::io::Write;
use std::sync::Mutex;

/// Destination for build-console style messages.
pub trait Listener: Send + Sync {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
}

/// Target of events emitted by [`TracingListener`].
pub const CONSOLE_TARGET: &str = "buildmail::console";

/// Forwards messages to `tracing` under [`CONSOLE_TARGET`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingListener;

impl Listener for TracingListener {
    fn info(&self, message: &str) {
        tracing::info!(target: CONSOLE_TARGET, "{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!(target: CONSOLE_TARGET, "{message}");
    }
}

/// Layer filter for outputs that already show console diagnostics directly.
pub fn is_not_console_event(meta: &tracing::Metadata<'_>) -> bool {
    meta.target() != CONSOLE_TARGET
}

/// Writes one line per message, errors prefixed with `ERROR: `.
#[derive(Debug)]
pub struct ConsoleListener<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> ConsoleListener<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_line(&self, line: &str) {
        if let Ok(mut out) = self.out.lock() {
            let _ = writeln!(out, "{line}");
        }
    }
}

impl<W: Write + Send> Listener for ConsoleListener<W> {
    fn info(&self, message: &str) {
        self.write_line(message);
    }

    fn error(&self, message: &str) {
        self.write_line(&format!("ERROR: {message}"));
    }
}

/// Severity of a recorded diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Error,
}

/// A single recorded message.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Diagnostic {
    pub level: Level,
    pub message: String,
}

/// Keeps every message in memory.
#[derive(Debug, Default)]
pub struct RecordingListener {
    entries: Mutex<Vec<Diagnostic>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    /// Messages of the given level, in order.
    pub fn messages(&self, level: Level) -> Vec<String> {
        self.diagnostics()
            .into_iter()
            .filter(|d| d.level == level)
            .map(|d| d.message)
            .collect()
    }

    fn push(&self, level: Level, message: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(Diagnostic {
                level,
                message: message.to_string(),
            });
        }
    }
}

impl Listener for RecordingListener {
    fn info(&self, message: &str) {
        self.push(Level::Info, message);
    }

    fn error(&self, message: &str) {
        self.push(Level::Error, message);
    }
}

/// Sends every message to two listeners.
pub struct Tee<'a>(pub &'a dyn Listener, pub &'a dyn Listener);

impl Listener for Tee<'_> {
    fn info(&self, message: &str) {
        self.0.info(message);
        self.1.info(message);
    }

    fn error(&self, message: &str) {
        self.0.error(message);
        self.1.error(message);
    }
}
