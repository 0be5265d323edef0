//! Lua engine adapter.
//!
//! [`LuaEngine`] implements [`ScriptEngine`] on top of one persistent Lua 5.4
//! interpreter. It is:
//! - Created once per process and registered under a fixed name
//! - Frozen after bring-up: guest code can read but never add globals
//! - Fronted by a generation-checked handle table for compiled functions

use std::time::Instant;

use mlua::{ChunkMode, Function, IntoLuaMulti, Lua, LuaOptions, StdLib, Table, Value};
use tracing::{debug, error, info, instrument};

use script_engine_common::{EngineError, ExecutionConfig, RuntimeConfig};

use crate::contract::ScriptEngine;
use crate::diagnostics::{self, error_message, error_text};
use crate::function::CompiledFunction;
use crate::globals;
use crate::handle::{FunctionHandle, HandleTable};
use crate::memory::MemoryFootprint;
use crate::reply::Reply;
use crate::run::RunContext;

/// Name the Lua engine registers under unless configured otherwise.
pub const ENGINE_NAME: &str = "LUA";

/// Back-reference from the interpreter to the engine that owns it.
///
/// Stored as interpreter app data, so host natives can tell which engine is
/// running them.
#[derive(Debug, Clone)]
pub struct EngineTag {
    /// Registered engine name.
    pub name: String,
}

/// Engine adapter around a persistent Lua interpreter.
///
/// # Bring-up
///
/// [`LuaEngine::new`] performs, in order:
/// 1. Create the interpreter (base, table, string, math, utf8 and coroutine libraries)
/// 2. Install the host bindings into the global namespace
/// 3. Create the error handler and store it in the interpreter registry
/// 4. Tag the interpreter with its owning engine
/// 5. Freeze the namespace guest chunks run against
///
/// Registration is left to the caller.
///
/// # Example
///
/// ```
/// use script_engine_common::{EngineError, RuntimeConfig};
/// use script_engine_core::{LuaEngine, Reply, RunContext, ScriptEngine};
///
/// # fn main() -> Result<(), EngineError> {
/// let mut engine = LuaEngine::new(&RuntimeConfig::default(), |_| Ok(()))?;
/// let handle = engine.create(b"return function(keys, args) return 1 + 1 end")?;
/// let mut run = RunContext::default();
/// engine.call(&mut run, handle, &[], &[])?;
///
/// assert_eq!(run.reply, Some(Reply::Integer(2)));
/// engine.free_function(handle)?;
/// # Ok(())
/// # }
/// ```
pub struct LuaEngine {
    lua: Lua,

    /// Environment guest chunks are compiled against.
    env: Table,

    /// `xpcall`, captured before the namespace is frozen.
    xpcall: Function,

    functions: HandleTable<CompiledFunction>,

    name: String,
    chunk_name: String,
    memory_limit: Option<usize>,
    create_budget: usize,
    execution: ExecutionConfig,
}

impl LuaEngine {
    /// Create a new Lua engine.
    ///
    /// `bindings` installs the host API into the interpreter globals; it runs
    /// before the namespace is frozen.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Initialization`] if any bring-up step fails.
    #[instrument(skip_all, fields(engine = %config.engine.name))]
    pub fn new<F>(config: &RuntimeConfig, bindings: F) -> Result<Self, EngineError>
    where
        F: FnOnce(&Lua) -> mlua::Result<()>,
    {
        let libs = StdLib::TABLE | StdLib::STRING | StdLib::MATH | StdLib::UTF8 | StdLib::COROUTINE;
        let lua = Lua::new_with(libs, LuaOptions::default())
            .map_err(|e| init_failed("Failed to create interpreter", &e))?;

        if let Some(limit) = config.engine.memory_limit_bytes() {
            lua.set_memory_limit(limit)
                .map_err(|e| init_failed("Failed to set memory limit", &e))?;
            debug!(limit_bytes = limit, "Interpreter memory limit set");
        }

        bindings(&lua).map_err(|e| init_failed("Failed to install host bindings", &e))?;

        diagnostics::install_error_handler(&lua)
            .map_err(|e| init_failed("Failed to install error handler", &e))?;

        let xpcall: Function = lua
            .globals()
            .get("xpcall")
            .map_err(|e| init_failed("Interpreter lacks xpcall", &e))?;

        lua.set_app_data(EngineTag {
            name: config.engine.name.clone(),
        });

        let env = if config.engine.globals_protection {
            globals::frozen_view(&lua, lua.globals())
                .map_err(|e| init_failed("Failed to freeze global namespace", &e))?
        } else {
            lua.globals()
        };

        info!(
            globals_protection = config.engine.globals_protection,
            used_memory = lua.used_memory(),
            "Lua engine initialized"
        );

        Ok(Self {
            lua,
            env,
            xpcall,
            functions: HandleTable::new(),
            name: config.engine.name.clone(),
            chunk_name: config.engine.chunk_name.clone(),
            memory_limit: config.engine.memory_limit_bytes(),
            create_budget: config.engine.create_memory_budget_bytes(),
            execution: config.execution.clone(),
        })
    }

    /// Get the engine name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of live functions.
    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Get the compiled function behind a handle.
    pub fn function(&self, handle: FunctionHandle) -> Option<&CompiledFunction> {
        self.functions.get(handle)
    }

    /// Compile `source` and evaluate its top level, which must produce a function.
    fn produce_function(&self, source: &[u8]) -> Result<Function, EngineError> {
        let chunk = self
            .lua
            .load(source)
            .set_name(self.chunk_name.as_str())
            .set_mode(ChunkMode::Text)
            .set_environment(self.env.clone())
            .into_function()
            .map_err(|e| EngineError::compile(error_message(&e)))?;

        match self.protected_call(&chunk, ()) {
            Ok(Value::Function(function)) => Ok(function),
            Ok(other) => Err(EngineError::compile(format!(
                "expected the source to return a function, got {}",
                other.type_name()
            ))),
            Err(EngineError::Runtime { message }) => Err(EngineError::compile(message)),
            Err(e) => Err(e),
        }
    }

    /// Run `function` under the error handler.
    ///
    /// Guest errors come back as [`EngineError::Runtime`] with the decorated
    /// message.
    fn protected_call(
        &self,
        function: &Function,
        args: impl IntoLuaMulti,
    ) -> Result<Value, EngineError> {
        let handler = diagnostics::error_handler(&self.lua).map_err(|e| {
            EngineError::contract_violation(format!("error handler unavailable: {e}"))
        })?;

        let (ok, value): (bool, Value) = self
            .xpcall
            .call((function.clone(), handler, args))
            .map_err(|e| EngineError::runtime(error_message(&e)))?;

        if ok {
            Ok(value)
        } else {
            Err(EngineError::runtime(error_text(&value)))
        }
    }

    /// Heap cap in force while a source's top level runs.
    ///
    /// Never looser than the configured limit.
    fn create_limit(&self) -> usize {
        let cap = self.lua.used_memory().saturating_add(self.create_budget);
        self.memory_limit.map_or(cap, |limit| limit.min(cap))
    }

    fn bad_handle(&self, handle: FunctionHandle) -> EngineError {
        if self.functions.owns(handle) {
            EngineError::contract_violation(format!("{handle:?} was already freed"))
        } else {
            EngineError::contract_violation(format!(
                "{handle:?} was not issued by engine {}",
                self.name
            ))
        }
    }
}

impl ScriptEngine for LuaEngine {
    #[instrument(skip(self, source), fields(bytes_len = source.len()))]
    fn create(&mut self, source: &[u8]) -> Result<FunctionHandle, EngineError> {
        let start = Instant::now();

        // No collection while compiling, so used memory never drops across create.
        // The top level is capped instead, since nothing reclaims its garbage.
        let configured_limit = self.lua.set_memory_limit(self.create_limit()).map_err(|e| {
            EngineError::contract_violation(format!("failed to cap create memory: {e}"))
        })?;
        let gc_was_running = self.lua.gc_is_running();
        self.lua.gc_stop();
        let produced = self.produce_function(source);
        if gc_was_running {
            self.lua.gc_restart();
        }
        self.lua.set_memory_limit(configured_limit).map_err(|e| {
            EngineError::contract_violation(format!("failed to restore memory limit: {e}"))
        })?;

        let function = match produced {
            Ok(function) => function,
            Err(e) => {
                debug!(error = %e, "Function compilation failed");
                return Err(e);
            }
        };

        let key = self
            .lua
            .create_registry_value(function)
            .map_err(|e| EngineError::compile(error_message(&e)))?;
        let compiled = CompiledFunction::new(key, source);

        info!(
            content_hash = %compiled.content_hash(),
            duration_us = start.elapsed().as_micros(),
            "Function compiled"
        );

        self.functions.insert(compiled)
    }

    #[instrument(skip_all, fields(request_id = %run.request_id, keys = keys.len(), args = args.len()))]
    fn call(
        &mut self,
        run: &mut RunContext,
        handle: FunctionHandle,
        keys: &[Vec<u8>],
        args: &[Vec<u8>],
    ) -> Result<(), EngineError> {
        let compiled = self
            .functions
            .get(handle)
            .ok_or_else(|| self.bad_handle(handle))?;

        let function: Function = self.lua.registry_value(compiled.key()).map_err(|e| {
            EngineError::contract_violation(format!("{handle:?} does not resolve to a function: {e}"))
        })?;

        let outcome = match (byte_array(&self.lua, keys), byte_array(&self.lua, args)) {
            (Ok(keys), Ok(args)) => {
                // Host natives reach the run context through app data while the guest runs.
                self.lua.set_app_data(std::mem::take(run));
                let outcome = self.protected_call(&function, (keys, args));
                if let Some(active) = self.lua.remove_app_data::<RunContext>() {
                    *run = active;
                }
                outcome
            }
            (Err(e), _) | (_, Err(e)) => Err(EngineError::runtime(error_message(&e))),
        };

        run.finalize_metrics(self.lua.used_memory());
        let duration = run.elapsed();

        match outcome {
            Ok(value) => {
                run.set_reply(Reply::from_lua(&value));
                info!(
                    duration_us = duration.as_micros(),
                    used_memory = run.metrics.used_memory_bytes,
                    "Function completed"
                );
                Ok(())
            }
            Err(EngineError::Runtime { message }) => {
                error!(
                    duration_us = duration.as_micros(),
                    error = %message,
                    "Function raised an error"
                );
                run.set_error(message);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn used_memory(&self) -> usize {
        self.lua.used_memory()
    }

    fn function_memory_overhead(&self, handle: FunctionHandle) -> usize {
        self.functions
            .get(handle)
            .map_or(0, MemoryFootprint::footprint)
    }

    fn engine_memory_overhead(&self) -> usize {
        self.footprint()
    }

    #[instrument(skip(self))]
    fn free_function(&mut self, handle: FunctionHandle) -> Result<(), EngineError> {
        let compiled = self
            .functions
            .remove(handle)
            .ok_or_else(|| self.bad_handle(handle))?;

        self.lua
            .remove_registry_value(compiled.into_key())
            .map_err(|e| EngineError::contract_violation(format!("registry key mismatch: {e}")))?;

        if self.execution.collect_garbage_after_free {
            self.lua
                .gc_collect()
                .map_err(|e| EngineError::runtime(error_message(&e)))?;
        }

        debug!(live_functions = self.functions.len(), "Function freed");
        Ok(())
    }
}

impl MemoryFootprint for LuaEngine {
    fn footprint(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.functions.slot_bytes()
            + self.name.capacity()
            + self.chunk_name.capacity()
    }
}

impl std::fmt::Debug for LuaEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LuaEngine")
            .field("name", &self.name)
            .field("functions", &self.functions.len())
            .field("used_memory", &self.lua.used_memory())
            .finish_non_exhaustive()
    }
}

fn init_failed(step: &str, err: &mlua::Error) -> EngineError {
    EngineError::initialization(format!("{step}: {err}"))
}

/// Build a 1-based Lua array of binary-safe strings.
fn byte_array(lua: &Lua, items: &[Vec<u8>]) -> mlua::Result<Table> {
    let table = lua.create_table_with_capacity(items.len(), 0)?;
    for (index, item) in items.iter().enumerate() {
        table.raw_set(index + 1, lua.create_string(item)?)?;
    }
    Ok(table)
}
