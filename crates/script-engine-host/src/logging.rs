//! Logging host function implementation.
//!
//! This module provides the host side of `server.log`, letting guest
//! functions emit logs that are captured by the runtime.

use script_engine_core::{LogEntry, LogLevel, RunContext};
use tracing::{debug, error, info, warn};

/// Host implementation for the logging interface.
///
/// Logs are both:
/// 1. Stored in the [`RunContext`] for later retrieval
/// 2. Emitted via the `tracing` crate for observability
pub struct LoggingHost;

impl LoggingHost {
    /// Log a message at the specified level.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The run context to store logs in
    /// * `engine` - Name of the engine running the guest
    /// * `level` - The log level
    /// * `message` - The log message
    pub fn log(ctx: &mut RunContext, engine: &str, level: LogLevel, message: &str) {
        ctx.logs.push(LogEntry {
            level,
            message: message.to_string(),
            timestamp: std::time::Instant::now(),
        });

        let request_id = &ctx.request_id;
        match level {
            LogLevel::Debug => debug!(request_id, engine, guest_log = true, "{}", message),
            LogLevel::Info => info!(request_id, engine, guest_log = true, "{}", message),
            LogLevel::Warn => warn!(request_id, engine, guest_log = true, "{}", message),
            LogLevel::Error => error!(request_id, engine, guest_log = true, "{}", message),
        }
    }

    /// Log a message emitted outside of a call, e.g. from a function's top level
    /// while it is being created. Nothing is stored.
    pub fn log_detached(engine: &str, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => debug!(engine, guest_log = true, "{}", message),
            LogLevel::Info => info!(engine, guest_log = true, "{}", message),
            LogLevel::Warn => warn!(engine, guest_log = true, "{}", message),
            LogLevel::Error => error!(engine, guest_log = true, "{}", message),
        }
    }
}

/// Convert a numeric guest log level to [`LogLevel`].
///
/// Returns `None` for anything outside `0..=3` (debug, info, warn, error).
pub fn level_from_i64(level: i64) -> Option<LogLevel> {
    match level {
        0 => Some(LogLevel::Debug),
        1 => Some(LogLevel::Info),
        2 => Some(LogLevel::Warn),
        3 => Some(LogLevel::Error),
        _ => None,
    }
}

/// Convert a [`LogLevel`] to its numeric guest value.
pub fn level_to_i64(level: LogLevel) -> i64 {
    match level {
        LogLevel::Debug => 0,
        LogLevel::Info => 1,
        LogLevel::Warn => 2,
        LogLevel::Error => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_stores_in_context() {
        let mut ctx = RunContext::new("test-123");

        LoggingHost::log(&mut ctx, "LUA", LogLevel::Info, "Hello");
        LoggingHost::log(&mut ctx, "LUA", LogLevel::Error, "World");

        assert_eq!(ctx.logs.len(), 2);
        assert_eq!(ctx.logs[0].message, "Hello");
        assert_eq!(ctx.logs[0].level, LogLevel::Info);
        assert_eq!(ctx.logs[1].message, "World");
        assert_eq!(ctx.logs[1].level, LogLevel::Error);
    }

    #[test]
    fn test_level_from_i64() {
        assert_eq!(level_from_i64(0), Some(LogLevel::Debug));
        assert_eq!(level_from_i64(1), Some(LogLevel::Info));
        assert_eq!(level_from_i64(2), Some(LogLevel::Warn));
        assert_eq!(level_from_i64(3), Some(LogLevel::Error));
        assert_eq!(level_from_i64(4), None);
        assert_eq!(level_from_i64(-1), None);
    }

    #[test]
    fn test_level_round_trip() {
        for level in [LogLevel::Debug, LogLevel::Info, LogLevel::Warn, LogLevel::Error] {
            assert_eq!(level_from_i64(level_to_i64(level)), Some(level));
        }
    }
}
