//! Error types for script-engine.
//!
//! This module defines a hierarchy of error types using `thiserror`:
//! - [`EngineError`]: Errors surfaced by engines and the engine registry
//! - [`HostFunctionError`]: Errors raised by host-provided natives called from guest code

use std::io;

use thiserror::Error;

/// Top-level engine errors.
///
/// Guest failures come in two kinds: [`EngineError::Compile`] from `create`
/// and [`EngineError::Runtime`] from `call`. A [`EngineError::ContractViolation`]
/// points at a bug in the host integration rather than in guest code.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The source blob failed to compile into a function.
    #[error("Error compiling function: {reason}")]
    Compile {
        /// Interpreter diagnostic.
        reason: String,
    },

    /// Guest code raised an error while running.
    ///
    /// The message is already decorated with the guest `source:line` when
    /// one could be recovered.
    #[error("{message}")]
    Runtime {
        /// Decorated error message.
        message: String,
    },

    /// An engine with the same name is already registered.
    #[error("Engine already registered: {name}")]
    AlreadyRegistered {
        /// The conflicting engine name.
        name: String,
    },

    /// No engine is registered under the requested name.
    #[error("Engine not found: {name}")]
    EngineNotFound {
        /// The requested engine name.
        name: String,
    },

    /// The host broke the engine contract (stale handle, foreign handle,
    /// non-callable artifact).
    #[error("Engine contract violation: {reason}")]
    ContractViolation {
        /// Description of the violated invariant.
        reason: String,
    },

    /// Engine bring-up failed.
    #[error("Engine initialization failed: {reason}")]
    Initialization {
        /// Description of the failing step.
        reason: String,
    },

    /// Invalid configuration was provided.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Errors raised by host-provided natives.
///
/// These are handed to the interpreter as external errors, so the guest sees
/// their `Display` text, prefixed with the guest call site.
#[derive(Error, Debug)]
pub enum HostFunctionError {
    /// A native was called with the wrong number or type of arguments.
    #[error("{reason}")]
    InvalidArgument {
        /// Description of why the arguments were rejected.
        reason: String,
    },

    /// `server.log` was called with an unknown level.
    #[error("Invalid log level: {level}")]
    InvalidLogLevel {
        /// The rejected level.
        level: i64,
    },
}

impl EngineError {
    /// Create a new `Compile` error.
    pub fn compile(reason: impl Into<String>) -> Self {
        Self::Compile {
            reason: reason.into(),
        }
    }

    /// Create a new `Runtime` error.
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }

    /// Create a new `ContractViolation` error.
    pub fn contract_violation(reason: impl Into<String>) -> Self {
        Self::ContractViolation {
            reason: reason.into(),
        }
    }

    /// Create a new `Initialization` error.
    pub fn initialization(reason: impl Into<String>) -> Self {
        Self::Initialization {
            reason: reason.into(),
        }
    }

    /// Create a new `InvalidConfig` error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Returns `true` if the error was caused by guest code.
    pub fn is_guest_error(&self) -> bool {
        matches!(self, Self::Compile { .. } | Self::Runtime { .. })
    }

    /// Returns `true` if the error indicates a host integration bug.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::ContractViolation { .. })
    }
}

impl HostFunctionError {
    /// Create a new `InvalidArgument` error.
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::compile("[string \"x\"]:1: unexpected symbol");
        assert_eq!(
            err.to_string(),
            "Error compiling function: [string \"x\"]:1: unexpected symbol"
        );

        let err = EngineError::runtime("user_function:3: boom");
        assert_eq!(err.to_string(), "user_function:3: boom");

        let err = EngineError::AlreadyRegistered { name: "LUA".into() };
        assert_eq!(err.to_string(), "Engine already registered: LUA");
    }

    #[test]
    fn test_host_function_error_display() {
        let err = HostFunctionError::invalid_argument("server.log() requires two arguments or more.");
        assert_eq!(err.to_string(), "server.log() requires two arguments or more.");

        let err = HostFunctionError::InvalidLogLevel { level: 9 };
        assert_eq!(err.to_string(), "Invalid log level: 9");
    }

    #[test]
    fn test_is_guest_error() {
        assert!(EngineError::compile("bad").is_guest_error());
        assert!(EngineError::runtime("bad").is_guest_error());
        assert!(!EngineError::contract_violation("stale handle").is_guest_error());
        assert!(!EngineError::EngineNotFound { name: "JS".into() }.is_guest_error());
    }

    #[test]
    fn test_is_contract_violation() {
        assert!(EngineError::contract_violation("double free").is_contract_violation());
        assert!(!EngineError::initialization("boom").is_contract_violation());
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "missing.lua");
        let err: EngineError = io_err.into();

        assert!(matches!(err, EngineError::Io(_)));
    }
}
