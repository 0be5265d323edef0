//! Function handle table.
//!
//! [`HandleTable`] maps host-visible [`FunctionHandle`]s to engine-internal
//! artifacts. Slots are reused after release, so every handle carries the
//! slot generation it was issued under and the id of the issuing table:
//! a handle that outlived its slot, or that belongs to another engine
//! context, resolves to nothing instead of to someone else's function.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use script_engine_common::EngineError;

static NEXT_TABLE_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque reference to a compiled function.
///
/// Returned by `create`, consumed by `call` and `free_function`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionHandle {
    table: u64,
    index: u32,
    generation: u32,
}

impl fmt::Debug for FunctionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FunctionHandle({}:{}v{})", self.table, self.index, self.generation)
    }
}

struct Slot<T> {
    generation: u32,
    entry: Option<T>,
}

/// Generation-checked arena of engine artifacts.
pub struct HandleTable<T> {
    id: u64,
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
    max_slots: u32,
}

impl<T> HandleTable<T> {
    /// Create an empty table with a process-unique id.
    pub fn new() -> Self {
        Self::with_max_slots(u32::MAX)
    }

    /// Create an empty table that never grows past `max_slots` slots.
    pub fn with_max_slots(max_slots: u32) -> Self {
        Self {
            id: NEXT_TABLE_ID.fetch_add(1, Ordering::Relaxed),
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            max_slots,
        }
    }

    /// Store an artifact and issue a fresh handle for it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ContractViolation`] when every slot is live;
    /// the artifact is dropped.
    pub fn insert(&mut self, entry: T) -> Result<FunctionHandle, EngineError> {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some(entry);
            self.live += 1;
            return Ok(FunctionHandle {
                table: self.id,
                index,
                generation: slot.generation,
            });
        }

        let index = match u32::try_from(self.slots.len()) {
            Ok(index) if index < self.max_slots => index,
            _ => {
                return Err(EngineError::contract_violation(format!(
                    "handle table is full ({} live handles)",
                    self.live
                )));
            }
        };
        self.slots.push(Slot {
            generation: 0,
            entry: Some(entry),
        });

        self.live += 1;

        Ok(FunctionHandle {
            table: self.id,
            index,
            generation: 0,
        })
    }

    /// Resolve a handle, if it is live and was issued by this table.
    pub fn get(&self, handle: FunctionHandle) -> Option<&T> {
        self.slot(handle).and_then(|slot| slot.entry.as_ref())
    }

    /// Release a handle, returning its artifact.
    ///
    /// The slot generation is bumped so the released handle never resolves again.
    pub fn remove(&mut self, handle: FunctionHandle) -> Option<T> {
        if handle.table != self.id {
            return None;
        }

        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }

        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.live -= 1;

        Some(entry)
    }

    /// Check whether a handle belongs to this table, live or not.
    pub fn owns(&self, handle: FunctionHandle) -> bool {
        handle.table == self.id
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns `true` if no handle is live.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Bytes held by the table's own slot storage.
    pub fn slot_bytes(&self) -> usize {
        self.slots.capacity() * std::mem::size_of::<Slot<T>>()
            + self.free.capacity() * std::mem::size_of::<u32>()
    }

    fn slot(&self, handle: FunctionHandle) -> Option<&Slot<T>> {
        if handle.table != self.id {
            return None;
        }

        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
    }
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for HandleTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleTable")
            .field("id", &self.id)
            .field("live", &self.live)
            .field("slots", &self.slots.len())
            .finish()
    }
}
