//! Typed building blocks shared by the decoder, translator and code generator.

use std::fmt;

use anyhow::{bail, Result};
use wasmparser::ValType;

/// Closed set of numeric kinds a translation-time slot can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumKind {
    I32,
    I64,
    F32,
    F64,
}

impl NumKind {
    pub fn from_val_type(ty: ValType) -> Result<Self> {
        Ok(match ty {
            ValType::I32 => NumKind::I32,
            ValType::I64 => NumKind::I64,
            ValType::F32 => NumKind::F32,
            ValType::F64 => NumKind::F64,
            other => bail!("unsupported value type {other:?}"),
        })
    }

    /// Rust primitive spelling.
    pub fn rust_type(self) -> &'static str {
        match self {
            NumKind::I32 => "i32",
            NumKind::I64 => "i64",
            NumKind::F32 => "f32",
            NumKind::F64 => "f64",
        }
    }

    pub fn zero(self) -> &'static str {
        match self {
            NumKind::I32 => "0i32",
            NumKind::I64 => "0i64",
            NumKind::F32 => "0.0f32",
            NumKind::F64 => "0.0f64",
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, NumKind::F32 | NumKind::F64)
    }
}

impl fmt::Display for NumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.rust_type())
    }
}

/// A named translation-time operand (`s0`, `s1`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot(pub u32);

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Basic block label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// Parameter and result kinds of a function or block type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FuncSignature {
    pub params: Vec<NumKind>,
    pub results: Vec<NumKind>,
}

impl FuncSignature {
    pub fn new(params: Vec<NumKind>, results: Vec<NumKind>) -> Self {
        Self { params, results }
    }

    pub fn from_func_type(ty: &wasmparser::FuncType) -> Result<Self> {
        let convert = |types: &[ValType]| {
            types
                .iter()
                .map(|&t| NumKind::from_val_type(t))
                .collect::<Result<Vec<_>>>()
        };
        Ok(Self {
            params: convert(ty.params())?,
            results: convert(ty.results())?,
        })
    }

    /// The single result kind, if the signature has exactly one.
    pub fn return_kind(&self) -> Option<NumKind> {
        match self.results.as_slice() {
            [kind] => Some(*kind),
            _ => None,
        }
    }
}

/// A numeric literal. Floats are kept as raw bits so NaN payloads and the
/// sign of zero survive translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstValue {
    I32(i32),
    I64(i64),
    F32(u32),
    F64(u64),
}

impl ConstValue {
    pub fn kind(self) -> NumKind {
        match self {
            ConstValue::I32(_) => NumKind::I32,
            ConstValue::I64(_) => NumKind::I64,
            ConstValue::F32(_) => NumKind::F32,
            ConstValue::F64(_) => NumKind::F64,
        }
    }

    /// Rust expression producing exactly this value.
    pub fn to_rust(self) -> String {
        match self {
            ConstValue::I32(v) => format!("{v}i32"),
            ConstValue::I64(v) => format!("{v}i64"),
            ConstValue::F32(bits) => format!("f32::from_bits({bits:#010x})"),
            ConstValue::F64(bits) => format!("f64::from_bits({bits:#018x})"),
        }
    }
}
