//! Engine registry.
//!
//! The host dispatches every operation through an [`EngineRegistry`], never
//! directly to an engine. Registrations are permanent: there is no removal.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::{Mutex, MutexGuard};
use tracing::info;

use script_engine_common::EngineError;

use crate::contract::ScriptEngine;

/// A registered engine.
///
/// Cloning is cheap; all clones share the same engine. The mutex enforces
/// the one-operation-at-a-time rule for the engine's interpreter.
#[derive(Clone)]
pub struct EngineDescriptor {
    name: Arc<str>,
    engine: Arc<Mutex<Box<dyn ScriptEngine>>>,
}

impl EngineDescriptor {
    /// Registered (normalized) engine name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lock the engine for a sequence of operations.
    ///
    /// Hold the guard across a whole create/call/free sequence when the
    /// sequence must not interleave with other callers.
    pub fn lock(&self) -> MutexGuard<'_, Box<dyn ScriptEngine>> {
        self.engine.lock()
    }
}

impl std::fmt::Debug for EngineDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineDescriptor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Mapping from engine name to engine, shared by the whole process.
///
/// Names are case-insensitive.
#[derive(Default)]
pub struct EngineRegistry {
    engines: DashMap<String, EngineDescriptor>,
}

impl EngineRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an engine under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AlreadyRegistered`] if the name is taken; the
    /// existing registration is left untouched.
    pub fn register(
        &self,
        name: &str,
        engine: Box<dyn ScriptEngine>,
    ) -> Result<EngineDescriptor, EngineError> {
        let key = normalize(name);

        match self.engines.entry(key.clone()) {
            Entry::Occupied(_) => Err(EngineError::AlreadyRegistered { name: key }),
            Entry::Vacant(slot) => {
                let descriptor = EngineDescriptor {
                    name: Arc::from(key.as_str()),
                    engine: Arc::new(Mutex::new(engine)),
                };
                slot.insert(descriptor.clone());

                info!(engine = %key, "Engine registered");
                Ok(descriptor)
            }
        }
    }

    /// Look up an engine by name.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EngineNotFound`] for unknown names.
    pub fn dispatch(&self, name: &str) -> Result<EngineDescriptor, EngineError> {
        let key = normalize(name);
        self.engines
            .get(&key)
            .map(|entry| entry.value().clone())
            .ok_or(EngineError::EngineNotFound { name: key })
    }

    /// Registered engine names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.engines.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Number of registered engines.
    pub fn len(&self) -> usize {
        self.engines.len()
    }

    /// Returns `true` if no engine is registered.
    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("engines", &self.names())
            .finish()
    }
}

fn normalize(name: &str) -> String {
    name.to_ascii_uppercase()
}
