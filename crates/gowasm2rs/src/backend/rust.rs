//! Safe Rust backend.
//!
//! Emits plain safe Rust over the runtime crate: wrapping integer arithmetic,
//! trapping division and truncation through `ops`, bit counts and rotations
//! through `bits`, and memory access through `LinearMemory`'s typed
//! accessors at `addr as u32 + offset`.

use crate::assemble::{GlobalBinding, ImportBinding};
use crate::backend::Backend;
use crate::ir::{
    BinaryOp, CompareOp, ConstValue, ConvertOp, MemAccess, NumKind, Slot, UnaryOp, Width,
};

const MEMORY: &str = "rt.module.memory";

/// Unsigned counterpart of an integer kind.
fn unsigned(kind: NumKind) -> &'static str {
    match kind {
        NumKind::I64 => "u64",
        _ => "u32",
    }
}

/// Bit-width suffix of the `bits`/`ops` helpers (`32`/`64`).
fn width(kind: NumKind) -> u32 {
    match kind {
        NumKind::I64 | NumKind::F64 => 64,
        _ => 32,
    }
}

fn address(addr: Slot, offset: u64) -> String {
    if offset == 0 {
        format!("{addr} as u32 as usize")
    } else {
        format!("{addr} as u32 as usize + {offset}")
    }
}

fn args_list(args: &[Slot]) -> String {
    args.iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn bool_to_i32(expr: String) -> String {
    format!("({expr}) as i32")
}

#[derive(Debug, Clone, Default)]
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        RustBackend
    }
}

impl Backend for RustBackend {
    fn emit_const(&self, dest: Slot, value: ConstValue) -> String {
        format!("{dest} = {};", value.to_rust())
    }

    fn emit_assign(&self, dest: &str, src: &str) -> String {
        format!("{dest} = {src};")
    }

    fn emit_unary(&self, dest: Slot, kind: NumKind, op: UnaryOp, src: Slot) -> String {
        let ty = kind.rust_type();
        let w = width(kind);
        let u = unsigned(kind);
        let expr = match op {
            UnaryOp::Eqz => bool_to_i32(format!("{src} == 0")),
            UnaryOp::Clz => format!("bits::leading_zeros{w}({src} as {u}) as {ty}"),
            UnaryOp::Ctz => format!("bits::trailing_zeros{w}({src} as {u}) as {ty}"),
            UnaryOp::Popcnt => format!("bits::ones_count{w}({src} as {u}) as {ty}"),
            UnaryOp::Extend8S => format!("{src} as i8 as {ty}"),
            UnaryOp::Extend16S => format!("{src} as i16 as {ty}"),
            UnaryOp::Extend32S => format!("{src} as i32 as {ty}"),
            UnaryOp::Abs => format!("{src}.abs()"),
            UnaryOp::Neg => format!("-{src}"),
            UnaryOp::Ceil => format!("{src}.ceil()"),
            UnaryOp::Floor => format!("{src}.floor()"),
            UnaryOp::Trunc => format!("{src}.trunc()"),
            UnaryOp::Nearest => format!("ops::{ty}_nearest({src})"),
            UnaryOp::Sqrt => format!("{src}.sqrt()"),
        };
        format!("{dest} = {expr};")
    }

    fn emit_binary(
        &self,
        dest: Slot,
        kind: NumKind,
        op: BinaryOp,
        lhs: Slot,
        rhs: Slot,
    ) -> String {
        let ty = kind.rust_type();
        let u = unsigned(kind);
        let w = width(kind);
        // Rotation amounts are `i32` in `bits`; truncation keeps the low bits.
        let (amount, negated) = if kind == NumKind::I64 {
            (format!("{rhs} as i32"), format!("({rhs} as i32).wrapping_neg()"))
        } else {
            (rhs.to_string(), format!("{rhs}.wrapping_neg()"))
        };
        let expr = if kind.is_float() {
            match op {
                BinaryOp::Add => format!("{lhs} + {rhs}"),
                BinaryOp::Sub => format!("{lhs} - {rhs}"),
                BinaryOp::Mul => format!("{lhs} * {rhs}"),
                BinaryOp::Div => format!("{lhs} / {rhs}"),
                BinaryOp::Min => format!("ops::{ty}_min({lhs}, {rhs})"),
                BinaryOp::Max => format!("ops::{ty}_max({lhs}, {rhs})"),
                BinaryOp::Copysign => format!("{lhs}.copysign({rhs})"),
                other => return format!("// invalid {ty} operator {other:?}"),
            }
        } else {
            match op {
                BinaryOp::Add => format!("{lhs}.wrapping_add({rhs})"),
                BinaryOp::Sub => format!("{lhs}.wrapping_sub({rhs})"),
                BinaryOp::Mul => format!("{lhs}.wrapping_mul({rhs})"),
                BinaryOp::DivS => format!("ops::{ty}_div_s({lhs}, {rhs})?"),
                BinaryOp::DivU => format!("ops::{ty}_div_u({lhs}, {rhs})?"),
                BinaryOp::RemS => format!("ops::{ty}_rem_s({lhs}, {rhs})?"),
                BinaryOp::RemU => format!("ops::{ty}_rem_u({lhs}, {rhs})?"),
                BinaryOp::And => format!("{lhs} & {rhs}"),
                BinaryOp::Or => format!("{lhs} | {rhs}"),
                BinaryOp::Xor => format!("{lhs} ^ {rhs}"),
                BinaryOp::Shl => format!("{lhs}.wrapping_shl({rhs} as u32)"),
                BinaryOp::ShrS => format!("{lhs}.wrapping_shr({rhs} as u32)"),
                BinaryOp::ShrU => format!("({lhs} as {u}).wrapping_shr({rhs} as u32) as {ty}"),
                BinaryOp::Rotl => format!("bits::rotate_left{w}({lhs} as {u}, {amount}) as {ty}"),
                BinaryOp::Rotr => format!("bits::rotate_left{w}({lhs} as {u}, {negated}) as {ty}"),
                other => return format!("// invalid {ty} operator {other:?}"),
            }
        };
        format!("{dest} = {expr};")
    }

    fn emit_compare(
        &self,
        dest: Slot,
        kind: NumKind,
        op: CompareOp,
        lhs: Slot,
        rhs: Slot,
    ) -> String {
        let u = unsigned(kind);
        let (symbol, as_unsigned) = match op {
            CompareOp::Eq => ("==", false),
            CompareOp::Ne => ("!=", false),
            CompareOp::LtS | CompareOp::Lt => ("<", false),
            CompareOp::GtS | CompareOp::Gt => (">", false),
            CompareOp::LeS | CompareOp::Le => ("<=", false),
            CompareOp::GeS | CompareOp::Ge => (">=", false),
            CompareOp::LtU => ("<", true),
            CompareOp::GtU => (">", true),
            CompareOp::LeU => ("<=", true),
            CompareOp::GeU => (">=", true),
        };
        let expr = if as_unsigned {
            format!("({lhs} as {u}) {symbol} ({rhs} as {u})")
        } else {
            format!("{lhs} {symbol} {rhs}")
        };
        format!("{dest} = {};", bool_to_i32(expr))
    }

    fn emit_convert(
        &self,
        dest: Slot,
        op: ConvertOp,
        from: NumKind,
        to: NumKind,
        src: Slot,
    ) -> String {
        let to_ty = to.rust_type();
        let expr = match op {
            ConvertOp::Wrap => format!("{src} as i32"),
            ConvertOp::ExtendS => format!("{src} as i64"),
            ConvertOp::ExtendU => format!("{src} as u32 as i64"),
            ConvertOp::TruncS => format!("ops::{to_ty}_trunc_{from}_s({src})?"),
            ConvertOp::TruncU => format!("ops::{to_ty}_trunc_{from}_u({src})?"),
            // `as` from float to int saturates and maps NaN to zero.
            ConvertOp::TruncSatS => format!("{src} as {to_ty}"),
            ConvertOp::TruncSatU => format!("{src} as {} as {to_ty}", unsigned(to)),
            ConvertOp::ConvertS => format!("{src} as {to_ty}"),
            ConvertOp::ConvertU => format!("{src} as {} as {to_ty}", unsigned(from)),
            ConvertOp::Demote | ConvertOp::Promote => format!("{src} as {to_ty}"),
            ConvertOp::Reinterpret => {
                if to.is_float() {
                    format!("{to_ty}::from_bits({src} as {})", unsigned(from))
                } else {
                    format!("{src}.to_bits() as {to_ty}")
                }
            }
        };
        format!("{dest} = {expr};")
    }

    fn emit_select(&self, dest: Slot, cond: Slot, if_true: Slot, if_false: Slot) -> String {
        format!("{dest} = if {cond} != 0 {{ {if_true} }} else {{ {if_false} }};")
    }

    fn emit_load(&self, dest: Slot, kind: NumKind, access: MemAccess, addr: Slot) -> String {
        let at = address(addr, access.offset);
        let ty = kind.rust_type();
        let load = match (access.width, access.signed) {
            (Width::Full, _) => return format!("{dest} = {MEMORY}.load_{ty}({at});"),
            (Width::W8, true) => "i8",
            (Width::W8, false) => "u8",
            (Width::W16, true) => "i16",
            (Width::W16, false) => "u16",
            (Width::W32, true) => "i32",
            (Width::W32, false) => "u32",
        };
        format!("{dest} = {MEMORY}.load_{load}({at}) as {ty};")
    }

    fn emit_store(&self, kind: NumKind, access: MemAccess, addr: Slot, value: Slot) -> String {
        let at = address(addr, access.offset);
        let narrow = match access.width {
            Width::Full => return format!("{MEMORY}.store_{}({at}, {value});", kind.rust_type()),
            Width::W8 => "i8",
            Width::W16 => "i16",
            Width::W32 => "i32",
        };
        format!("{MEMORY}.store_{narrow}({at}, {value} as {narrow});")
    }

    fn emit_memory_size(&self, dest: Slot) -> String {
        format!("{dest} = {MEMORY}.size() as i32;")
    }

    fn emit_memory_grow(&self, dest: Slot, delta: Slot) -> String {
        format!("{dest} = {MEMORY}.grow({delta} as u32) as i32;")
    }

    fn emit_memory_copy(&self, dst: Slot, src: Slot, len: Slot) -> String {
        format!(
            "{MEMORY}.memmove({}, {}, {len} as u32 as usize);",
            address(dst, 0),
            address(src, 0)
        )
    }

    fn emit_memory_fill(&self, dst: Slot, value: Slot, len: Slot) -> String {
        format!(
            "{MEMORY}.memset({}, {value} as u8, {len} as u32 as usize);",
            address(dst, 0)
        )
    }

    fn emit_global_get(&self, dest: Slot, global: &GlobalBinding) -> String {
        if global.mutable {
            format!("{dest} = rt.module.globals.{};", global.field)
        } else {
            format!("{dest} = G{};", global.index)
        }
    }

    fn emit_global_set(&self, global: &GlobalBinding, src: Slot) -> String {
        format!("rt.module.globals.{} = {src};", global.field)
    }

    fn call_expr(&self, ident: &str, args: &[Slot]) -> String {
        if args.is_empty() {
            format!("{ident}(rt)?")
        } else {
            format!("{ident}(rt, {})?", args_list(args))
        }
    }

    fn import_call_expr(&self, import: &ImportBinding, args: &[Slot]) -> String {
        let mut params = vec!["&mut rt.host".to_string(), format!("&mut {MEMORY}")];
        params.extend(args.iter().map(|a| a.to_string()));
        format!(
            "<H as {}>::{}({})?",
            import.trait_name,
            import.method_name,
            params.join(", ")
        )
    }

    fn emit_call(&self, dest: Option<Slot>, call: &str) -> String {
        match dest {
            Some(d) => format!("{d} = {call};"),
            None => format!("{call};"),
        }
    }

    fn emit_call_indirect(
        &self,
        dest: Option<Slot>,
        canonical_type: u32,
        index: Slot,
        arms: &[(u32, String)],
    ) -> String {
        let mut code = String::from("{\n");
        code.push_str(&format!(
            "    let __entry = rt.module.table.get({index} as u32)?;\n"
        ));
        code.push_str(&format!(
            "    if __entry.type_index != {canonical_type} {{\n        return Err(WasmTrap::IndirectCallTypeMismatch);\n    }}\n"
        ));
        let assign = dest.map(|d| format!("{d} = ")).unwrap_or_default();
        code.push_str(&format!("    {assign}match __entry.func_index {{\n"));
        for (func, call) in arms {
            code.push_str(&format!("        {func} => {call},\n"));
        }
        code.push_str("        _ => return Err(WasmTrap::UndefinedElement),\n");
        code.push_str("    };\n}");
        code
    }

    fn emit_passthrough(&self, name: &str) -> String {
        format!("// unhandled operator: {name}")
    }

    fn emit_return(&self, value: Option<Slot>) -> String {
        match value {
            Some(v) => format!("return Ok({v});"),
            None => "return Ok(());".to_string(),
        }
    }

    fn emit_trap(&self) -> String {
        "return Err(WasmTrap::Unreachable);".to_string()
    }

    fn emit_jump_to_index(&self, target: usize) -> String {
        format!("__current_block = Block::B{target};\ncontinue;")
    }

    fn emit_branch_if_to_index(&self, cond: Slot, if_true: usize, if_false: usize) -> String {
        format!(
            "__current_block = if {cond} != 0 {{ Block::B{if_true} }} else {{ Block::B{if_false} }};\ncontinue;"
        )
    }

    fn emit_branch_table_to_index(
        &self,
        index: Slot,
        targets: &[usize],
        default: usize,
    ) -> String {
        if targets.is_empty() {
            return self.emit_jump_to_index(default);
        }
        let mut code = format!("__current_block = match {index} as u32 as usize {{\n");
        for (i, target) in targets.iter().enumerate() {
            code.push_str(&format!("    {i} => Block::B{target},\n"));
        }
        code.push_str(&format!("    _ => Block::B{default},\n}};\ncontinue;"));
        code
    }
}
