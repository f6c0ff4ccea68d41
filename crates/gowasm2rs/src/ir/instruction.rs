//! Decoded instruction set.
//!
//! [`decode`] turns a function's operator bytes into a closed [`Instruction`]
//! enum. Operators outside the supported set become
//! [`Instruction::Unhandled`] so the translator can record them and move on.

use anyhow::{Context, Result};
use wasmparser::{BinaryReader, Operator};

use super::types::{ConstValue, NumKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    Empty,
    Value(NumKind),
    /// Multi-value block typed by a type-section entry.
    Func(u32),
}

/// Access width of a load or store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    Full,
    W8,
    W16,
    W32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemAccess {
    pub offset: u64,
    pub width: Width,
    /// Sign-extend narrow loads. Ignored for stores and full-width access.
    pub signed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Eqz,
    Clz,
    Ctz,
    Popcnt,
    Extend8S,
    Extend16S,
    Extend32S,
    Abs,
    Neg,
    Ceil,
    Floor,
    Trunc,
    Nearest,
    Sqrt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    DivS,
    DivU,
    RemS,
    RemU,
    And,
    Or,
    Xor,
    Shl,
    ShrS,
    ShrU,
    Rotl,
    Rotr,
    Div,
    Min,
    Max,
    Copysign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    LtS,
    LtU,
    GtS,
    GtU,
    LeS,
    LeU,
    GeS,
    GeU,
    Lt,
    Gt,
    Le,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertOp {
    Wrap,
    ExtendS,
    ExtendU,
    TruncS,
    TruncU,
    TruncSatS,
    TruncSatU,
    ConvertS,
    ConvertU,
    Demote,
    Promote,
    Reinterpret,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Unreachable,
    Nop,
    Block(BlockType),
    Loop(BlockType),
    If(BlockType),
    Else,
    End,
    Br(u32),
    BrIf(u32),
    BrTable { targets: Vec<u32>, default: u32 },
    Return,
    Call(u32),
    CallIndirect { type_index: u32, table_index: u32 },
    Drop,
    Select,
    LocalGet(u32),
    LocalSet(u32),
    LocalTee(u32),
    GlobalGet(u32),
    GlobalSet(u32),
    Load { kind: NumKind, access: MemAccess },
    Store { kind: NumKind, access: MemAccess },
    MemorySize,
    MemoryGrow,
    MemoryCopy,
    MemoryFill,
    Const(ConstValue),
    Unary { kind: NumKind, op: UnaryOp },
    Binary { kind: NumKind, op: BinaryOp },
    Compare { kind: NumKind, op: CompareOp },
    Convert { op: ConvertOp, from: NumKind, to: NumKind },
    /// Operator outside the supported set, by name.
    Unhandled(String),
}

fn block_type(ty: wasmparser::BlockType) -> Result<BlockType> {
    Ok(match ty {
        wasmparser::BlockType::Empty => BlockType::Empty,
        wasmparser::BlockType::Type(ty) => BlockType::Value(NumKind::from_val_type(ty)?),
        wasmparser::BlockType::FuncType(index) => BlockType::Func(index),
    })
}

fn access(memarg: wasmparser::MemArg, width: Width, signed: bool) -> MemAccess {
    MemAccess {
        offset: memarg.offset,
        width,
        signed,
    }
}

fn operator_name(op: &Operator) -> String {
    let debug = format!("{op:?}");
    debug
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Map one `wasmparser` operator onto the instruction set.
pub fn lower_operator(op: &Operator) -> Result<Instruction> {
    use Instruction as I;
    use NumKind::{F32, F64, I32, I64};
    use Width::{Full, W16, W32, W8};

    let unary = |kind, op| I::Unary { kind, op };
    let binary = |kind, op| I::Binary { kind, op };
    let compare = |kind, op| I::Compare { kind, op };
    let convert = |op, from, to| I::Convert { op, from, to };
    let load = |kind, memarg, width, signed| I::Load {
        kind,
        access: access(memarg, width, signed),
    };
    let store = |kind, memarg, width| I::Store {
        kind,
        access: access(memarg, width, false),
    };

    Ok(match *op {
        Operator::Unreachable => I::Unreachable,
        Operator::Nop => I::Nop,
        Operator::Block { blockty } => I::Block(block_type(blockty)?),
        Operator::Loop { blockty } => I::Loop(block_type(blockty)?),
        Operator::If { blockty } => I::If(block_type(blockty)?),
        Operator::Else => I::Else,
        Operator::End => I::End,
        Operator::Br { relative_depth } => I::Br(relative_depth),
        Operator::BrIf { relative_depth } => I::BrIf(relative_depth),
        Operator::BrTable { ref targets } => I::BrTable {
            targets: targets
                .targets()
                .collect::<Result<Vec<_>, _>>()
                .context("reading br_table targets")?,
            default: targets.default(),
        },
        Operator::Return => I::Return,
        Operator::Call { function_index } => I::Call(function_index),
        Operator::CallIndirect {
            type_index,
            table_index,
        } => I::CallIndirect {
            type_index,
            table_index,
        },
        Operator::Drop => I::Drop,
        Operator::Select => I::Select,
        Operator::TypedSelect { ty } => {
            NumKind::from_val_type(ty)?;
            I::Select
        }
        Operator::LocalGet { local_index } => I::LocalGet(local_index),
        Operator::LocalSet { local_index } => I::LocalSet(local_index),
        Operator::LocalTee { local_index } => I::LocalTee(local_index),
        Operator::GlobalGet { global_index } => I::GlobalGet(global_index),
        Operator::GlobalSet { global_index } => I::GlobalSet(global_index),

        Operator::I32Load { memarg } => load(I32, memarg, Full, false),
        Operator::I64Load { memarg } => load(I64, memarg, Full, false),
        Operator::F32Load { memarg } => load(F32, memarg, Full, false),
        Operator::F64Load { memarg } => load(F64, memarg, Full, false),
        Operator::I32Load8S { memarg } => load(I32, memarg, W8, true),
        Operator::I32Load8U { memarg } => load(I32, memarg, W8, false),
        Operator::I32Load16S { memarg } => load(I32, memarg, W16, true),
        Operator::I32Load16U { memarg } => load(I32, memarg, W16, false),
        Operator::I64Load8S { memarg } => load(I64, memarg, W8, true),
        Operator::I64Load8U { memarg } => load(I64, memarg, W8, false),
        Operator::I64Load16S { memarg } => load(I64, memarg, W16, true),
        Operator::I64Load16U { memarg } => load(I64, memarg, W16, false),
        Operator::I64Load32S { memarg } => load(I64, memarg, W32, true),
        Operator::I64Load32U { memarg } => load(I64, memarg, W32, false),
        Operator::I32Store { memarg } => store(I32, memarg, Full),
        Operator::I64Store { memarg } => store(I64, memarg, Full),
        Operator::F32Store { memarg } => store(F32, memarg, Full),
        Operator::F64Store { memarg } => store(F64, memarg, Full),
        Operator::I32Store8 { memarg } => store(I32, memarg, W8),
        Operator::I32Store16 { memarg } => store(I32, memarg, W16),
        Operator::I64Store8 { memarg } => store(I64, memarg, W8),
        Operator::I64Store16 { memarg } => store(I64, memarg, W16),
        Operator::I64Store32 { memarg } => store(I64, memarg, W32),
        Operator::MemorySize { mem: 0 } => I::MemorySize,
        Operator::MemoryGrow { mem: 0 } => I::MemoryGrow,
        Operator::MemoryCopy {
            dst_mem: 0,
            src_mem: 0,
        } => I::MemoryCopy,
        Operator::MemoryFill { mem: 0 } => I::MemoryFill,

        Operator::I32Const { value } => I::Const(ConstValue::I32(value)),
        Operator::I64Const { value } => I::Const(ConstValue::I64(value)),
        Operator::F32Const { value } => I::Const(ConstValue::F32(value.bits())),
        Operator::F64Const { value } => I::Const(ConstValue::F64(value.bits())),

        Operator::I32Eqz => unary(I32, UnaryOp::Eqz),
        Operator::I32Eq => compare(I32, CompareOp::Eq),
        Operator::I32Ne => compare(I32, CompareOp::Ne),
        Operator::I32LtS => compare(I32, CompareOp::LtS),
        Operator::I32LtU => compare(I32, CompareOp::LtU),
        Operator::I32GtS => compare(I32, CompareOp::GtS),
        Operator::I32GtU => compare(I32, CompareOp::GtU),
        Operator::I32LeS => compare(I32, CompareOp::LeS),
        Operator::I32LeU => compare(I32, CompareOp::LeU),
        Operator::I32GeS => compare(I32, CompareOp::GeS),
        Operator::I32GeU => compare(I32, CompareOp::GeU),
        Operator::I64Eqz => unary(I64, UnaryOp::Eqz),
        Operator::I64Eq => compare(I64, CompareOp::Eq),
        Operator::I64Ne => compare(I64, CompareOp::Ne),
        Operator::I64LtS => compare(I64, CompareOp::LtS),
        Operator::I64LtU => compare(I64, CompareOp::LtU),
        Operator::I64GtS => compare(I64, CompareOp::GtS),
        Operator::I64GtU => compare(I64, CompareOp::GtU),
        Operator::I64LeS => compare(I64, CompareOp::LeS),
        Operator::I64LeU => compare(I64, CompareOp::LeU),
        Operator::I64GeS => compare(I64, CompareOp::GeS),
        Operator::I64GeU => compare(I64, CompareOp::GeU),
        Operator::F32Eq => compare(F32, CompareOp::Eq),
        Operator::F32Ne => compare(F32, CompareOp::Ne),
        Operator::F32Lt => compare(F32, CompareOp::Lt),
        Operator::F32Gt => compare(F32, CompareOp::Gt),
        Operator::F32Le => compare(F32, CompareOp::Le),
        Operator::F32Ge => compare(F32, CompareOp::Ge),
        Operator::F64Eq => compare(F64, CompareOp::Eq),
        Operator::F64Ne => compare(F64, CompareOp::Ne),
        Operator::F64Lt => compare(F64, CompareOp::Lt),
        Operator::F64Gt => compare(F64, CompareOp::Gt),
        Operator::F64Le => compare(F64, CompareOp::Le),
        Operator::F64Ge => compare(F64, CompareOp::Ge),

        Operator::I32Clz => unary(I32, UnaryOp::Clz),
        Operator::I32Ctz => unary(I32, UnaryOp::Ctz),
        Operator::I32Popcnt => unary(I32, UnaryOp::Popcnt),
        Operator::I32Add => binary(I32, BinaryOp::Add),
        Operator::I32Sub => binary(I32, BinaryOp::Sub),
        Operator::I32Mul => binary(I32, BinaryOp::Mul),
        Operator::I32DivS => binary(I32, BinaryOp::DivS),
        Operator::I32DivU => binary(I32, BinaryOp::DivU),
        Operator::I32RemS => binary(I32, BinaryOp::RemS),
        Operator::I32RemU => binary(I32, BinaryOp::RemU),
        Operator::I32And => binary(I32, BinaryOp::And),
        Operator::I32Or => binary(I32, BinaryOp::Or),
        Operator::I32Xor => binary(I32, BinaryOp::Xor),
        Operator::I32Shl => binary(I32, BinaryOp::Shl),
        Operator::I32ShrS => binary(I32, BinaryOp::ShrS),
        Operator::I32ShrU => binary(I32, BinaryOp::ShrU),
        Operator::I32Rotl => binary(I32, BinaryOp::Rotl),
        Operator::I32Rotr => binary(I32, BinaryOp::Rotr),
        Operator::I64Clz => unary(I64, UnaryOp::Clz),
        Operator::I64Ctz => unary(I64, UnaryOp::Ctz),
        Operator::I64Popcnt => unary(I64, UnaryOp::Popcnt),
        Operator::I64Add => binary(I64, BinaryOp::Add),
        Operator::I64Sub => binary(I64, BinaryOp::Sub),
        Operator::I64Mul => binary(I64, BinaryOp::Mul),
        Operator::I64DivS => binary(I64, BinaryOp::DivS),
        Operator::I64DivU => binary(I64, BinaryOp::DivU),
        Operator::I64RemS => binary(I64, BinaryOp::RemS),
        Operator::I64RemU => binary(I64, BinaryOp::RemU),
        Operator::I64And => binary(I64, BinaryOp::And),
        Operator::I64Or => binary(I64, BinaryOp::Or),
        Operator::I64Xor => binary(I64, BinaryOp::Xor),
        Operator::I64Shl => binary(I64, BinaryOp::Shl),
        Operator::I64ShrS => binary(I64, BinaryOp::ShrS),
        Operator::I64ShrU => binary(I64, BinaryOp::ShrU),
        Operator::I64Rotl => binary(I64, BinaryOp::Rotl),
        Operator::I64Rotr => binary(I64, BinaryOp::Rotr),

        Operator::F32Abs => unary(F32, UnaryOp::Abs),
        Operator::F32Neg => unary(F32, UnaryOp::Neg),
        Operator::F32Ceil => unary(F32, UnaryOp::Ceil),
        Operator::F32Floor => unary(F32, UnaryOp::Floor),
        Operator::F32Trunc => unary(F32, UnaryOp::Trunc),
        Operator::F32Nearest => unary(F32, UnaryOp::Nearest),
        Operator::F32Sqrt => unary(F32, UnaryOp::Sqrt),
        Operator::F32Add => binary(F32, BinaryOp::Add),
        Operator::F32Sub => binary(F32, BinaryOp::Sub),
        Operator::F32Mul => binary(F32, BinaryOp::Mul),
        Operator::F32Div => binary(F32, BinaryOp::Div),
        Operator::F32Min => binary(F32, BinaryOp::Min),
        Operator::F32Max => binary(F32, BinaryOp::Max),
        Operator::F32Copysign => binary(F32, BinaryOp::Copysign),
        Operator::F64Abs => unary(F64, UnaryOp::Abs),
        Operator::F64Neg => unary(F64, UnaryOp::Neg),
        Operator::F64Ceil => unary(F64, UnaryOp::Ceil),
        Operator::F64Floor => unary(F64, UnaryOp::Floor),
        Operator::F64Trunc => unary(F64, UnaryOp::Trunc),
        Operator::F64Nearest => unary(F64, UnaryOp::Nearest),
        Operator::F64Sqrt => unary(F64, UnaryOp::Sqrt),
        Operator::F64Add => binary(F64, BinaryOp::Add),
        Operator::F64Sub => binary(F64, BinaryOp::Sub),
        Operator::F64Mul => binary(F64, BinaryOp::Mul),
        Operator::F64Div => binary(F64, BinaryOp::Div),
        Operator::F64Min => binary(F64, BinaryOp::Min),
        Operator::F64Max => binary(F64, BinaryOp::Max),
        Operator::F64Copysign => binary(F64, BinaryOp::Copysign),

        Operator::I32WrapI64 => convert(ConvertOp::Wrap, I64, I32),
        Operator::I32TruncF32S => convert(ConvertOp::TruncS, F32, I32),
        Operator::I32TruncF32U => convert(ConvertOp::TruncU, F32, I32),
        Operator::I32TruncF64S => convert(ConvertOp::TruncS, F64, I32),
        Operator::I32TruncF64U => convert(ConvertOp::TruncU, F64, I32),
        Operator::I64ExtendI32S => convert(ConvertOp::ExtendS, I32, I64),
        Operator::I64ExtendI32U => convert(ConvertOp::ExtendU, I32, I64),
        Operator::I64TruncF32S => convert(ConvertOp::TruncS, F32, I64),
        Operator::I64TruncF32U => convert(ConvertOp::TruncU, F32, I64),
        Operator::I64TruncF64S => convert(ConvertOp::TruncS, F64, I64),
        Operator::I64TruncF64U => convert(ConvertOp::TruncU, F64, I64),
        Operator::F32ConvertI32S => convert(ConvertOp::ConvertS, I32, F32),
        Operator::F32ConvertI32U => convert(ConvertOp::ConvertU, I32, F32),
        Operator::F32ConvertI64S => convert(ConvertOp::ConvertS, I64, F32),
        Operator::F32ConvertI64U => convert(ConvertOp::ConvertU, I64, F32),
        Operator::F32DemoteF64 => convert(ConvertOp::Demote, F64, F32),
        Operator::F64ConvertI32S => convert(ConvertOp::ConvertS, I32, F64),
        Operator::F64ConvertI32U => convert(ConvertOp::ConvertU, I32, F64),
        Operator::F64ConvertI64S => convert(ConvertOp::ConvertS, I64, F64),
        Operator::F64ConvertI64U => convert(ConvertOp::ConvertU, I64, F64),
        Operator::F64PromoteF32 => convert(ConvertOp::Promote, F32, F64),
        Operator::I32ReinterpretF32 => convert(ConvertOp::Reinterpret, F32, I32),
        Operator::I64ReinterpretF64 => convert(ConvertOp::Reinterpret, F64, I64),
        Operator::F32ReinterpretI32 => convert(ConvertOp::Reinterpret, I32, F32),
        Operator::F64ReinterpretI64 => convert(ConvertOp::Reinterpret, I64, F64),

        Operator::I32Extend8S => unary(I32, UnaryOp::Extend8S),
        Operator::I32Extend16S => unary(I32, UnaryOp::Extend16S),
        Operator::I64Extend8S => unary(I64, UnaryOp::Extend8S),
        Operator::I64Extend16S => unary(I64, UnaryOp::Extend16S),
        Operator::I64Extend32S => unary(I64, UnaryOp::Extend32S),

        Operator::I32TruncSatF32S => convert(ConvertOp::TruncSatS, F32, I32),
        Operator::I32TruncSatF32U => convert(ConvertOp::TruncSatU, F32, I32),
        Operator::I32TruncSatF64S => convert(ConvertOp::TruncSatS, F64, I32),
        Operator::I32TruncSatF64U => convert(ConvertOp::TruncSatU, F64, I32),
        Operator::I64TruncSatF32S => convert(ConvertOp::TruncSatS, F32, I64),
        Operator::I64TruncSatF32U => convert(ConvertOp::TruncSatU, F32, I64),
        Operator::I64TruncSatF64S => convert(ConvertOp::TruncSatS, F64, I64),
        Operator::I64TruncSatF64U => convert(ConvertOp::TruncSatU, F64, I64),

        ref other => I::Unhandled(operator_name(other)),
    })
}

/// Decode a function body's operator bytes.
pub fn decode(body: &[u8]) -> Result<Vec<Instruction>> {
    let mut reader = BinaryReader::new(body, 0);
    let mut instructions = Vec::new();
    while !reader.eof() {
        let offset = reader.original_position();
        let op = reader
            .read_operator()
            .with_context(|| format!("decoding operator at offset {offset}"))?;
        instructions.push(lower_operator(&op)?);
    }
    Ok(instructions)
}
