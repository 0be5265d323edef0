//! Compiled guest functions.
//!
//! A [`CompiledFunction`] is the host-side wrapper of a function produced by
//! `create`. The function itself lives in the interpreter; the wrapper only
//! holds the registry key that keeps it reachable, plus metadata for
//! debugging.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::time::Instant;

use mlua::RegistryKey;

use crate::memory::MemoryFootprint;

/// Host-side wrapper of a compiled guest function.
pub struct CompiledFunction {
    /// Anchor keeping the function reachable in the interpreter registry.
    key: RegistryKey,

    /// Hash of the source blob.
    content_hash: String,

    /// When this function was compiled.
    compiled_at: Instant,
}

impl CompiledFunction {
    /// Wrap an anchored function compiled from `source`.
    pub fn new(key: RegistryKey, source: &[u8]) -> Self {
        Self {
            key,
            content_hash: compute_hash(source),
            compiled_at: Instant::now(),
        }
    }

    /// Registry key of the function.
    pub fn key(&self) -> &RegistryKey {
        &self.key
    }

    /// Give up the wrapper, returning the registry key so it can be released.
    pub fn into_key(self) -> RegistryKey {
        self.key
    }

    /// Get the content hash of the source blob.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Get when this function was compiled.
    pub fn compiled_at(&self) -> Instant {
        self.compiled_at
    }
}

impl MemoryFootprint for CompiledFunction {
    fn footprint(&self) -> usize {
        std::mem::size_of::<Self>() + self.content_hash.capacity()
    }
}

impl std::fmt::Debug for CompiledFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledFunction")
            .field("content_hash", &self.content_hash)
            .finish_non_exhaustive()
    }
}

/// Compute a hash of the given bytes.
pub(crate) fn compute_hash(bytes: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}
