//! Code generation backends.
//!
//! A backend turns one translated statement into one Rust statement. It
//! knows nothing about block layout or module structure; the code generator
//! handles both and asks the backend for the text of each statement.

mod rust;
pub use rust::RustBackend;

use crate::assemble::{GlobalBinding, ImportBinding};
use crate::ir::{
    BinaryOp, CompareOp, ConstValue, ConvertOp, MemAccess, NumKind, Slot, UnaryOp,
};

/// Statement emitter. Returned strings carry no indentation.
pub trait Backend {
    fn emit_const(&self, dest: Slot, value: ConstValue) -> String;

    /// `dest = src;` where either side may be a slot or a local.
    fn emit_assign(&self, dest: &str, src: &str) -> String;

    fn emit_unary(&self, dest: Slot, kind: NumKind, op: UnaryOp, src: Slot) -> String;

    fn emit_binary(&self, dest: Slot, kind: NumKind, op: BinaryOp, lhs: Slot, rhs: Slot)
        -> String;

    /// Comparisons produce an `i32` 0 or 1.
    fn emit_compare(&self, dest: Slot, kind: NumKind, op: CompareOp, lhs: Slot, rhs: Slot)
        -> String;

    fn emit_convert(&self, dest: Slot, op: ConvertOp, from: NumKind, to: NumKind, src: Slot)
        -> String;

    fn emit_select(&self, dest: Slot, cond: Slot, if_true: Slot, if_false: Slot) -> String;

    fn emit_load(&self, dest: Slot, kind: NumKind, access: MemAccess, addr: Slot) -> String;

    fn emit_store(&self, kind: NumKind, access: MemAccess, addr: Slot, value: Slot) -> String;

    fn emit_memory_size(&self, dest: Slot) -> String;

    /// Grows by `delta` pages; `dest` receives the previous page count.
    fn emit_memory_grow(&self, dest: Slot, delta: Slot) -> String;

    fn emit_memory_copy(&self, dst: Slot, src: Slot, len: Slot) -> String;

    fn emit_memory_fill(&self, dst: Slot, value: Slot, len: Slot) -> String;

    /// Mutable globals live in `Globals`, immutable ones are `const G{i}`.
    fn emit_global_get(&self, dest: Slot, global: &GlobalBinding) -> String;

    fn emit_global_set(&self, global: &GlobalBinding, src: Slot) -> String;

    /// Call expression for a function defined in the module.
    fn call_expr(&self, ident: &str, args: &[Slot]) -> String;

    /// Call expression dispatching an import through its host trait.
    fn import_call_expr(&self, import: &ImportBinding, args: &[Slot]) -> String;

    /// `dest = expr;` or `expr;`.
    fn emit_call(&self, dest: Option<Slot>, call: &str) -> String;

    /// Table lookup, signature check, then a match over `arms`
    /// (`(function index, call expression)`).
    fn emit_call_indirect(
        &self,
        dest: Option<Slot>,
        canonical_type: u32,
        index: Slot,
        arms: &[(u32, String)],
    ) -> String;

    fn emit_passthrough(&self, name: &str) -> String;

    fn emit_return(&self, value: Option<Slot>) -> String;

    fn emit_trap(&self) -> String;

    fn emit_jump_to_index(&self, target: usize) -> String;

    fn emit_branch_if_to_index(&self, cond: Slot, if_true: usize, if_false: usize) -> String;

    fn emit_branch_table_to_index(&self, index: Slot, targets: &[usize], default: usize)
        -> String;
}
