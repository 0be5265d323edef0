//! Engine contract, registry and Lua engine adapter for script-engine.
//!
//! This crate provides the execution side of the workspace:
//! - [`ScriptEngine`]: The contract every execution backend implements
//! - [`EngineRegistry`]: Name-to-engine dispatch table
//! - [`LuaEngine`]: Engine adapter around a persistent Lua interpreter
//! - [`RunContext`]: Per-call context reachable from host natives
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    EngineRegistry                       │
//! │  (Owned by the host, one entry per engine name)         │
//! └─────────────────────────────────────────────────────────┘
//!                            │ dispatch(name)
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │            LuaEngine (behind a mutex)                   │
//! │  - One persistent interpreter                           │
//! │  - Error handler in the interpreter registry            │
//! │  - Frozen guest namespace                               │
//! └─────────────────────────────────────────────────────────┘
//!                            │ create / call / free
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │        HandleTable<CompiledFunction>                    │
//! │  - Generation-checked handles                           │
//! │  - Registry keys anchoring compiled functions           │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod contract;
pub mod diagnostics;
pub mod engine;
pub mod function;
pub mod globals;
pub mod handle;
pub mod memory;
pub mod registry;
pub mod reply;
pub mod run;

pub use contract::ScriptEngine;
pub use diagnostics::DiagnosticContext;
pub use engine::{ENGINE_NAME, EngineTag, LuaEngine};
pub use function::CompiledFunction;
pub use handle::{FunctionHandle, HandleTable};
pub use memory::{MemoryFootprint, MemoryReport};
pub use registry::{EngineDescriptor, EngineRegistry};
pub use reply::Reply;
pub use run::{ExecutionMetrics, LogEntry, LogLevel, RunContext};

pub use mlua;
