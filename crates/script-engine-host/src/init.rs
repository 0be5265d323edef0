//! Engine bring-up.
//!
//! Builds the Lua engine with the host bindings installed and registers it.
//! Bring-up happens once per process; any failure here should stop startup.

use tracing::info;

use script_engine_common::{EngineError, RuntimeConfig};
use script_engine_core::{EngineDescriptor, EngineRegistry, LuaEngine};

use crate::bindings::register_all;

/// Create a Lua engine with all host bindings installed.
///
/// # Errors
///
/// Returns an error if any bring-up step fails.
pub fn create_lua_engine(config: &RuntimeConfig) -> Result<LuaEngine, EngineError> {
    LuaEngine::new(config, register_all)
}

/// Create the Lua engine and register it under the configured name.
///
/// # Errors
///
/// Returns [`EngineError::AlreadyRegistered`] on a name collision, or the
/// bring-up error if the engine could not be built.
pub fn register_lua_engine(
    registry: &EngineRegistry,
    config: &RuntimeConfig,
) -> Result<EngineDescriptor, EngineError> {
    let engine = create_lua_engine(config)?;
    let descriptor = registry.register(&config.engine.name, Box::new(engine))?;

    info!(engine = %descriptor.name(), "Lua engine ready");
    Ok(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_lua_engine() {
        let registry = EngineRegistry::new();
        let descriptor = register_lua_engine(&registry, &RuntimeConfig::default()).unwrap();

        assert_eq!(descriptor.name(), "LUA");
        assert!(registry.dispatch("lua").is_ok());
    }

    #[test]
    fn test_register_twice_fails() {
        let registry = EngineRegistry::new();
        register_lua_engine(&registry, &RuntimeConfig::default()).unwrap();

        let result = register_lua_engine(&registry, &RuntimeConfig::default());
        assert!(matches!(result, Err(EngineError::AlreadyRegistered { .. })));
    }

    #[test]
    fn test_custom_engine_name() {
        let mut config = RuntimeConfig::default();
        config.engine.name = "lua54".into();
        let registry = EngineRegistry::new();

        register_lua_engine(&registry, &config).unwrap();

        assert_eq!(registry.names(), vec!["LUA54".to_string()]);
    }
}
