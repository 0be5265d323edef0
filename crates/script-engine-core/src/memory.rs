//! Memory accounting.
//!
//! Engines answer three questions: how big the interpreter heap is, how much
//! host-side memory a function wrapper costs, and how much the engine's own
//! state costs. [`MemoryFootprint`] is how wrappers report the latter two;
//! [`MemoryReport`] gathers all figures for one engine.

use crate::contract::ScriptEngine;
use crate::handle::FunctionHandle;

/// Host-side size of an engine wrapper.
pub trait MemoryFootprint {
    /// Bytes owned by this value, including its inline size.
    fn footprint(&self) -> usize;
}

/// Snapshot of an engine's memory figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryReport {
    /// Interpreter heap in bytes.
    pub used_memory: usize,
    /// Engine wrapper bytes.
    pub engine_overhead: usize,
    /// Sum of the function wrapper bytes of the given handles.
    pub functions_overhead: usize,
}

impl MemoryReport {
    /// Collect figures for `engine` and the functions in `handles`.
    pub fn collect(engine: &dyn ScriptEngine, handles: &[FunctionHandle]) -> Self {
        Self {
            used_memory: engine.used_memory(),
            engine_overhead: engine.engine_memory_overhead(),
            functions_overhead: handles
                .iter()
                .map(|handle| engine.function_memory_overhead(*handle))
                .sum(),
        }
    }

    /// All figures combined.
    pub fn total(&self) -> usize {
        self.used_memory + self.engine_overhead + self.functions_overhead
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total() {
        let report = MemoryReport {
            used_memory: 100,
            engine_overhead: 20,
            functions_overhead: 3,
        };

        assert_eq!(report.total(), 123);
    }
}
