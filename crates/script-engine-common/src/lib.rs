//! Common types, errors, and configuration for script-engine.
//!
//! This crate provides shared functionality used across the script-engine workspace:
//! - Error types using `thiserror` for type-safe error handling
//! - Configuration structures for engine and execution settings
//! - TOML configuration file loading

pub mod config;
pub mod config_file;
pub mod error;

pub use config::{EngineConfig, ExecutionConfig, RuntimeConfig};
pub use config_file::{ConfigFile, ConfigFileError, LoggingConfig};
pub use error::{EngineError, HostFunctionError};
