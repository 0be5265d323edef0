//! Configuration structures for script-engine.
//!
//! This module defines configuration options for various components:
//! - [`RuntimeConfig`]: Top-level configuration containing all settings
//! - [`EngineConfig`]: Interpreter bring-up settings (name, memory cap, globals protection)
//! - [`ExecutionConfig`]: Function lifecycle settings

use serde::{Deserialize, Serialize};

/// Top-level runtime configuration.
///
/// This structure contains all configuration options for the engines.
/// It can be loaded from TOML or JSON.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RuntimeConfig {
    /// Engine bring-up configuration.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Function lifecycle configuration.
    #[serde(default)]
    pub execution: ExecutionConfig,
}

/// Engine bring-up configuration.
///
/// These settings are applied once, when the interpreter instance is created.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Name the engine registers under.
    ///
    /// Names are case-insensitive in the registry.
    #[serde(default = "defaults::name")]
    pub name: String,

    /// Chunk name given to every compiled source blob.
    ///
    /// A leading `@` marks it as a file-like name, so diagnostics read
    /// `user_function:3: ...`.
    #[serde(default = "defaults::chunk_name")]
    pub chunk_name: String,

    /// Interpreter heap cap in megabytes. `0` means unlimited.
    #[serde(default)]
    pub memory_limit_mb: u32,

    /// Heap headroom in megabytes granted to a source's top level while it
    /// runs inside `create`. The collector is paused there, so this bounds
    /// what the top level can allocate.
    #[serde(default = "defaults::create_memory_budget_mb")]
    pub create_memory_budget_mb: u32,

    /// Freeze the guest global namespace after initialization.
    #[serde(default = "defaults::globals_protection")]
    pub globals_protection: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: defaults::name(),
            chunk_name: defaults::chunk_name(),
            memory_limit_mb: 0,
            create_memory_budget_mb: defaults::create_memory_budget_mb(),
            globals_protection: defaults::globals_protection(),
        }
    }
}

impl EngineConfig {
    /// Get the memory limit in bytes, if one is configured.
    pub fn memory_limit_bytes(&self) -> Option<usize> {
        (self.memory_limit_mb > 0).then(|| self.memory_limit_mb as usize * 1024 * 1024)
    }

    /// Get the create-time heap headroom in bytes.
    pub fn create_memory_budget_bytes(&self) -> usize {
        self.create_memory_budget_mb.max(1) as usize * 1024 * 1024
    }
}

/// Function lifecycle configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ExecutionConfig {
    /// Run a full garbage collection after a function is freed.
    ///
    /// Makes `get_used_memory` reflect the release immediately at the cost
    /// of a full sweep per free.
    #[serde(default)]
    pub collect_garbage_after_free: bool,
}

/// Default value functions for serde.
mod defaults {
    pub fn name() -> String {
        "LUA".to_string()
    }

    pub fn chunk_name() -> String {
        "@user_function".to_string()
    }

    pub const fn globals_protection() -> bool {
        true
    }

    pub const fn create_memory_budget_mb() -> u32 {
        64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();

        assert_eq!(config.engine.name, "LUA");
        assert_eq!(config.engine.chunk_name, "@user_function");
        assert_eq!(config.engine.memory_limit_mb, 0);
        assert_eq!(config.engine.create_memory_budget_mb, 64);
        assert!(config.engine.globals_protection);
        assert!(!config.execution.collect_garbage_after_free);
    }

    #[test]
    fn test_memory_limit_bytes() {
        let mut config = EngineConfig::default();
        assert_eq!(config.memory_limit_bytes(), None);

        config.memory_limit_mb = 2;
        assert_eq!(config.memory_limit_bytes(), Some(2 * 1024 * 1024));
    }

    #[test]
    fn test_create_memory_budget_bytes() {
        let mut config = EngineConfig::default();
        assert_eq!(config.create_memory_budget_bytes(), 64 * 1024 * 1024);

        // Zero would leave no room to compile at all
        config.create_memory_budget_mb = 0;
        assert_eq!(config.create_memory_budget_bytes(), 1024 * 1024);
    }

    #[test]
    fn test_partial_deserialization() {
        let json = r#"{"engine": {"memory_limit_mb": 64}}"#;
        let config: RuntimeConfig = serde_json::from_str(json).unwrap();

        // Explicitly set value
        assert_eq!(config.engine.memory_limit_mb, 64);
        // Default values for unspecified fields
        assert_eq!(config.engine.name, "LUA");
        assert!(config.engine.globals_protection);
        assert!(!config.execution.collect_garbage_after_free);
    }
}
