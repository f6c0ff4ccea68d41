//! Wasm indirect call table for `call_indirect`.
//!
//! A Wasm table is a vector of nullable function references. Generated Rust
//! functions have heterogeneous signatures, so an entry stores only the
//! callee's canonical type index and its function index; the transpiler emits
//! a match over `func_index` after comparing `type_index` with the caller's
//! expected type.

use crate::{WasmResult, WasmTrap};

/// A single table entry: a typed function reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuncRef {
    /// Canonical type index of the callee. Structurally identical types share
    /// one canonical index, so the check is a plain integer comparison.
    pub type_index: u32,
    /// Index into the module's function index space.
    pub func_index: u32,
}

/// Indirect call table. `None` slots trap with `UndefinedElement`.
#[derive(Debug, Clone, Default)]
pub struct Table {
    entries: Vec<Option<FuncRef>>,
    max_size: Option<u32>,
}

impl Table {
    /// Create a table with `initial_size` empty slots.
    pub fn new(initial_size: u32, max_size: Option<u32>) -> Self {
        Self {
            entries: vec![None; initial_size as usize],
            max_size,
        }
    }

    /// Current number of slots.
    #[inline(always)]
    pub fn size(&self) -> u32 {
        self.entries.len() as u32
    }

    /// Look up a table entry by index.
    ///
    /// - `TableOutOfBounds` if `index >= size`
    /// - `UndefinedElement` if the slot is empty
    #[inline]
    pub fn get(&self, index: u32) -> WasmResult<FuncRef> {
        self.entries
            .get(index as usize)
            .ok_or(WasmTrap::TableOutOfBounds)?
            .ok_or(WasmTrap::UndefinedElement)
    }

    /// Set a table entry.
    #[inline]
    pub fn set(&mut self, index: u32, entry: Option<FuncRef>) -> WasmResult<()> {
        let slot = self
            .entries
            .get_mut(index as usize)
            .ok_or(WasmTrap::TableOutOfBounds)?;
        *slot = entry;
        Ok(())
    }

    /// Write `(type_index, func_index)` pairs into consecutive slots from `base`.
    pub fn init_elements(&mut self, base: u32, entries: &[(u32, u32)]) -> WasmResult<()> {
        for (i, &(type_index, func_index)) in entries.iter().enumerate() {
            let index = base
                .checked_add(i as u32)
                .ok_or(WasmTrap::TableOutOfBounds)?;
            self.set(
                index,
                Some(FuncRef {
                    type_index,
                    func_index,
                }),
            )?;
        }
        Ok(())
    }

    /// Grow the table by `delta` slots filled with `init`.
    /// Returns the previous size, or -1 if the declared maximum would be exceeded.
    pub fn grow(&mut self, delta: u32, init: Option<FuncRef>) -> i32 {
        let old = self.size();
        let Some(new) = old.checked_add(delta) else {
            return -1;
        };
        if self.max_size.is_some_and(|max| new > max) {
            return -1;
        }
        self.entries.resize(new as usize, init);
        old as i32
    }
}
