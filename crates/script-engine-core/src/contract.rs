//! The engine contract.
//!
//! Every execution backend implements [`ScriptEngine`]. The host only talks
//! to engines through this trait, reached via the
//! [`EngineRegistry`](crate::EngineRegistry).

use script_engine_common::EngineError;

use crate::handle::FunctionHandle;
use crate::run::RunContext;

/// Operations a pluggable execution backend provides.
///
/// An engine owns one interpreter instance and is not internally
/// synchronized: callers serialize all operations against it (the registry
/// hands engines out behind a mutex).
pub trait ScriptEngine: Send {
    /// Compile a source blob into a reusable function.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Compile`] if the blob does not compile into a
    /// function. No handle is issued and nothing stays reachable in the
    /// interpreter.
    fn create(&mut self, source: &[u8]) -> Result<FunctionHandle, EngineError>;

    /// Invoke a function with positional keys and arguments.
    ///
    /// Guest failures are reported through `run` (see [`RunContext::error`]),
    /// not through the return value.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ContractViolation`] if `handle` was not issued
    /// by this engine or has been freed.
    fn call(
        &mut self,
        run: &mut RunContext,
        handle: FunctionHandle,
        keys: &[Vec<u8>],
        args: &[Vec<u8>],
    ) -> Result<(), EngineError>;

    /// Total live heap managed by the interpreter, in bytes.
    fn used_memory(&self) -> usize;

    /// Size of the host-side wrapper behind `handle`, in bytes.
    ///
    /// Compiled code is part of [`ScriptEngine::used_memory`], not this figure.
    fn function_memory_overhead(&self, handle: FunctionHandle) -> usize;

    /// Size of the engine's own host-side state, in bytes.
    fn engine_memory_overhead(&self) -> usize;

    /// Release a function.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ContractViolation`] on a foreign handle or a
    /// second free of the same handle.
    fn free_function(&mut self, handle: FunctionHandle) -> Result<(), EngineError>;
}
