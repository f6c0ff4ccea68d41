//! Typed instruction set between the binary decoder and the translator.

mod instruction;
mod types;

pub use instruction::{
    decode, lower_operator, BinaryOp, BlockType, CompareOp, ConvertOp, Instruction, MemAccess,
    UnaryOp, Width,
};
pub use types::{BlockId, ConstValue, FuncSignature, NumKind, Slot};
