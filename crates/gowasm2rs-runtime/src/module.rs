//! Wasm module container.
//!
//! A `Module` owns the per-instance state every generated function reaches
//! into: linear memory, module-level globals (`G`, transpiler-generated) and
//! the indirect call table. The transpiler wraps it together with the host
//! import implementation and generates the exported methods.

use crate::memory::{DataSegment, LinearMemory};
use crate::table::Table;
use crate::WasmResult;

/// Per-instance state of a transpiled module.
#[derive(Debug)]
pub struct Module<G> {
    pub memory: LinearMemory,
    pub globals: G,
    pub table: Table,
}

impl<G> Module<G> {
    /// Build an instance: memory pre-populated with the data segments, and the
    /// table filled from `(base, entries)` element segments.
    pub fn new(
        initial_pages: u32,
        data: &[DataSegment<'_>],
        globals: G,
        mut table: Table,
        elements: &[(u32, &[(u32, u32)])],
    ) -> WasmResult<Self> {
        for (base, entries) in elements {
            table.init_elements(*base, entries)?;
        }
        Ok(Self {
            memory: LinearMemory::with_data(initial_pages, data),
            globals,
            table,
        })
    }
}
