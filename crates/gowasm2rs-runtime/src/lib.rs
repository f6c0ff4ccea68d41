//! `gowasm2rs-runtime`: runtime library for gowasm2rs transpiled output.
//!
//! Generated modules link against this crate. It provides:
//! - [`LinearMemory`]: growable Wasm linear memory with Go-runtime helpers
//! - [`bits`]: Go `math/bits` compatible bit primitives
//! - [`Table`] / [`ops`]: indirect call table and trapping numeric helpers
//! - [`js`]: the JavaScript host emulation a Go `js/wasm` module expects
//! - [`task`]: task queue and one-shot timer for deferred host callbacks
//! - `WasmTrap` / `WasmResult<T>` for Wasm trap handling

/// WebAssembly page size: 64 KiB.
pub const PAGE_SIZE: usize = 65536;

/// Hard ceiling on linear memory size (2 GiB).
pub const MAX_MEMORY_SIZE: usize = 2 * 1024 * 1024 * 1024;

/// `MAX_MEMORY_SIZE` in pages.
pub const MAX_PAGES: usize = MAX_MEMORY_SIZE / PAGE_SIZE;

pub mod bits;
pub mod js;
pub mod ops;
pub mod task;

mod memory;
pub use memory::{DataSegment, LinearMemory};

mod table;
pub use table::{FuncRef, Table};

mod module;
pub use module::Module;

/// Traps raised by generated code and the runtime helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WasmTrap {
    /// Integer division by zero.
    #[error("integer divide by zero")]
    DivisionByZero,
    /// Integer overflow (e.g., `i32.trunc_f64_s` on out-of-range float).
    #[error("integer overflow")]
    IntegerOverflow,
    /// Unreachable instruction executed.
    #[error("unreachable executed")]
    Unreachable,
    /// Indirect call type mismatch (`call_indirect` signature check).
    #[error("indirect call type mismatch")]
    IndirectCallTypeMismatch,
    /// Table access out of bounds.
    #[error("table index out of bounds")]
    TableOutOfBounds,
    /// Undefined element in table.
    #[error("uninitialized table element")]
    UndefinedElement,
    /// A host import reported a failure it could not deliver to the guest.
    #[error("host call failed")]
    HostFault,
}

/// Result type for Wasm operations.
pub type WasmResult<T> = Result<T, WasmTrap>;
