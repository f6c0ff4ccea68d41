use thiserror::Error;

use crate::ir::NumKind;

/// Structurally invalid function bodies. Translation of the function stops.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    #[error("operand stack underflow at instruction {at}")]
    StackUnderflow { at: usize },
    #[error("type mismatch at instruction {at}: expected {expected}, found {found}")]
    TypeMismatch {
        at: usize,
        expected: NumKind,
        found: NumKind,
    },
    #[error("unknown local {0}")]
    UnknownLocal(u32),
    #[error("unknown global {0}")]
    UnknownGlobal(u32),
    #[error("global {0} is immutable")]
    ImmutableGlobal(u32),
    #[error("unknown function {0}")]
    UnknownFunction(u32),
    #[error("unknown type {0}")]
    UnknownType(u32),
    #[error("call_indirect on table {0}; only table 0 is supported")]
    UnsupportedTable(u32),
    #[error("branch depth {depth} exceeds nesting depth {nesting}")]
    BranchDepth { depth: u32, nesting: usize },
    #[error("else without a matching if")]
    ElseWithoutIf,
    #[error("end without an open block")]
    UnbalancedEnd,
    #[error("{0} block(s) still open at the end of the body")]
    UnclosedBlocks(usize),
    #[error("signature returns {0} values; at most one is supported")]
    MultiValueReturn(usize),
}
