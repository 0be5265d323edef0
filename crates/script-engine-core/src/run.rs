//! Per-call run context.
//!
//! This module provides:
//! - [`RunContext`]: Per-call state reachable from host natives
//! - [`LogEntry`] and [`LogLevel`]: Structured logging from guest code
//! - [`ExecutionMetrics`]: Measurements for each call

use std::time::{Duration, Instant};

use crate::reply::Reply;

/// Per-call execution context.
///
/// Created by the host for each invocation and handed to `call`. While the
/// guest runs, host natives reach it through the interpreter, so anything
/// they record (logs) ends up here once the call returns.
#[derive(Debug)]
pub struct RunContext {
    /// Unique request identifier for tracing.
    pub request_id: String,

    /// Logs collected from guest code.
    pub logs: Vec<LogEntry>,

    /// Reply produced by the function, if it returned.
    pub reply: Option<Reply>,

    /// Error text if the function raised or replied with an error.
    pub error: Option<String>,

    /// Execution metrics.
    pub metrics: ExecutionMetrics,

    start_time: Instant,
}

/// A single log entry from guest code.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Log level.
    pub level: LogLevel,

    /// Log message content.
    pub message: String,

    /// Timestamp when the log was recorded.
    pub timestamp: Instant,
}

/// Log level for guest logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug-level messages.
    Debug,
    /// Informational messages.
    Info,
    /// Warning messages.
    Warn,
    /// Error messages.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Execution metrics.
#[derive(Debug, Clone, Default)]
pub struct ExecutionMetrics {
    /// Interpreter heap in bytes right after the call.
    pub used_memory_bytes: usize,

    /// Total execution duration.
    pub duration: Option<Duration>,
}

impl RunContext {
    /// Create a new run context with the given request ID.
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            logs: Vec::new(),
            reply: None,
            error: None,
            metrics: ExecutionMetrics::default(),
            start_time: Instant::now(),
        }
    }

    /// Add a log entry.
    pub fn log(&mut self, level: LogLevel, message: String) {
        self.logs.push(LogEntry {
            level,
            message,
            timestamp: Instant::now(),
        });
    }

    /// Record the function's reply.
    ///
    /// An error reply also sets [`RunContext::error`].
    pub fn set_reply(&mut self, reply: Reply) {
        if let Reply::Error(message) = &reply {
            self.error = Some(message.clone());
        }
        self.reply = Some(reply);
    }

    /// Record a raised error.
    pub fn set_error(&mut self, message: String) {
        self.reply = Some(Reply::Error(message.clone()));
        self.error = Some(message);
    }

    /// Returns `true` if the call raised or replied with an error.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Get elapsed time since the context was created.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Finalize metrics after execution.
    pub fn finalize_metrics(&mut self, used_memory_bytes: usize) {
        self.metrics.used_memory_bytes = used_memory_bytes;
        self.metrics.duration = Some(self.start_time.elapsed());
    }
}

impl Default for RunContext {
    /// A context with a random v4 request id.
    fn default() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }
}
