//! Function code generation.
//!
//! A translated function is a flat statement list cut into basic blocks by
//! labels. One block ending in a return is emitted flat; anything else
//! becomes a per-function `Block` enum driven by `loop { match }`.

use std::collections::HashMap;

use anyhow::{bail, Context, Result};

use crate::assemble::{AssembledModule, FunctionBinding};
use crate::backend::Backend;
use crate::ir::{BlockId, NumKind, Slot};
use crate::translate::Stmt;

const ALLOWS: &str = "#[allow(unused_mut, unused_variables, unused_assignments, unused_parens, unreachable_code, dead_code, clippy::needless_return, clippy::never_loop, clippy::unnecessary_cast, clippy::too_many_arguments, clippy::match_single_binding)]\n";

struct BasicBlock<'a> {
    id: BlockId,
    body: &'a [Stmt],
    terminator: &'a Stmt,
}

fn split_blocks(statements: &[Stmt]) -> Result<Vec<BasicBlock<'_>>> {
    let mut blocks = Vec::new();
    let mut rest = statements;
    while let Some((first, tail)) = rest.split_first() {
        let Stmt::Label(id) = first else {
            bail!("statement {first:?} outside of any block");
        };
        let end = tail
            .iter()
            .position(Stmt::is_terminator)
            .with_context(|| format!("block {id} has no terminator"))?;
        blocks.push(BasicBlock {
            id: *id,
            body: &tail[..end],
            terminator: &tail[end],
        });
        rest = &tail[end + 1..];
    }
    Ok(blocks)
}

fn indent(code: &str, depth: usize) -> String {
    let pad = " ".repeat(depth);
    let mut out = String::new();
    for line in code.lines() {
        if !line.is_empty() {
            out.push_str(&pad);
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

fn local(index: u32) -> String {
    format!("l{index}")
}

fn return_type(kind: Option<NumKind>) -> String {
    match kind {
        Some(kind) => format!("WasmResult<{kind}>"),
        None => "WasmResult<()>".to_string(),
    }
}

/// Emits the statements of one function against the module's bindings.
struct FunctionEmitter<'a, B: Backend> {
    backend: &'a B,
    module: &'a AssembledModule,
    idents: &'a HashMap<u32, String>,
    block_index: HashMap<BlockId, usize>,
}

impl<B: Backend> FunctionEmitter<'_, B> {
    fn call(&self, func: u32, args: &[Slot]) -> Result<String> {
        if let Some(import) = self.module.import(func) {
            return Ok(self.backend.import_call_expr(import, args));
        }
        let ident = self
            .idents
            .get(&func)
            .with_context(|| format!("call to unknown function {func}"))?;
        Ok(self.backend.call_expr(ident, args))
    }

    fn target(&self, block: BlockId) -> Result<usize> {
        self.block_index
            .get(&block)
            .copied()
            .with_context(|| format!("branch to missing block {block}"))
    }

    fn statement(&self, stmt: &Stmt) -> Result<String> {
        let b = self.backend;
        let global = |index: u32| {
            self.module
                .global(index)
                .with_context(|| format!("unknown global {index}"))
        };
        Ok(match stmt {
            Stmt::Const { dest, value } => b.emit_const(*dest, *value),
            Stmt::LocalGet { dest, local: l } => b.emit_assign(&dest.to_string(), &local(*l)),
            Stmt::LocalSet { local: l, src } => b.emit_assign(&local(*l), &src.to_string()),
            Stmt::GlobalGet { dest, global: g } => b.emit_global_get(*dest, global(*g)?),
            Stmt::GlobalSet { global: g, src } => b.emit_global_set(global(*g)?, *src),
            Stmt::Move { dest, src } => b.emit_assign(&dest.to_string(), &src.to_string()),
            Stmt::Unary { dest, kind, op, src } => b.emit_unary(*dest, *kind, *op, *src),
            Stmt::Binary {
                dest,
                kind,
                op,
                lhs,
                rhs,
            } => b.emit_binary(*dest, *kind, *op, *lhs, *rhs),
            Stmt::Compare {
                dest,
                kind,
                op,
                lhs,
                rhs,
            } => b.emit_compare(*dest, *kind, *op, *lhs, *rhs),
            Stmt::Convert {
                dest,
                op,
                from,
                to,
                src,
            } => b.emit_convert(*dest, *op, *from, *to, *src),
            Stmt::Select {
                dest,
                cond,
                if_true,
                if_false,
            } => b.emit_select(*dest, *cond, *if_true, *if_false),
            Stmt::Load {
                dest,
                kind,
                access,
                addr,
            } => b.emit_load(*dest, *kind, *access, *addr),
            Stmt::Store {
                kind,
                access,
                addr,
                value,
            } => b.emit_store(*kind, *access, *addr, *value),
            Stmt::MemorySize { dest } => b.emit_memory_size(*dest),
            Stmt::MemoryGrow { dest, delta } => b.emit_memory_grow(*dest, *delta),
            Stmt::MemoryCopy { dst, src, len } => b.emit_memory_copy(*dst, *src, *len),
            Stmt::MemoryFill { dst, value, len } => b.emit_memory_fill(*dst, *value, *len),
            Stmt::Call { dest, func, args } | Stmt::CallImport { dest, func, args } => {
                b.emit_call(*dest, &self.call(*func, args)?)
            }
            Stmt::CallIndirect {
                dest,
                type_index,
                index,
                args,
            } => {
                let canonical = *self
                    .module
                    .context
                    .canonical_types
                    .get(*type_index as usize)
                    .with_context(|| format!("unknown type {type_index}"))?;
                let arms = self
                    .module
                    .table_functions()
                    .into_iter()
                    .filter(|&func| {
                        self.module
                            .context
                            .functions
                            .get(func as usize)
                            .zip(self.module.context.types.get(canonical as usize))
                            .is_some_and(|(sig, expected)| sig == expected)
                    })
                    .map(|func| self.call(func, args).map(|call| (func, call)))
                    .collect::<Result<Vec<_>>>()?;
                b.emit_call_indirect(*dest, canonical, *index, &arms)
            }
            Stmt::Passthrough(name) => b.emit_passthrough(name),
            Stmt::Jump(target) => b.emit_jump_to_index(self.target(*target)?),
            Stmt::BranchIf {
                cond,
                then_block,
                else_block,
            } => b.emit_branch_if_to_index(
                *cond,
                self.target(*then_block)?,
                self.target(*else_block)?,
            ),
            Stmt::BranchTable {
                index,
                targets,
                default,
            } => {
                let targets = targets
                    .iter()
                    .map(|t| self.target(*t))
                    .collect::<Result<Vec<_>>>()?;
                b.emit_branch_table_to_index(*index, &targets, self.target(*default)?)
            }
            Stmt::Return(value) => b.emit_return(*value),
            Stmt::Trap => b.emit_trap(),
            Stmt::Label(id) => bail!("unexpected label {id} inside a block"),
        })
    }
}

/// Generate one private `fn func_{i}`.
pub fn generate_function<B: Backend>(
    backend: &B,
    module: &AssembledModule,
    function: &FunctionBinding,
    idents: &HashMap<u32, String>,
    emit_names: bool,
) -> Result<String> {
    let translated = &function.translated;
    let blocks = split_blocks(&translated.statements)?;
    let emitter = FunctionEmitter {
        backend,
        module,
        idents,
        block_index: blocks.iter().enumerate().map(|(i, b)| (b.id, i)).collect(),
    };

    let mut out = String::new();
    if emit_names {
        if let Some(name) = &function.name {
            out.push_str(&format!("/// `{name}`\n"));
        }
    }
    out.push_str(ALLOWS);

    let mut params = vec!["rt: &mut WasmModule<H>".to_string()];
    params.extend(
        translated
            .params()
            .iter()
            .enumerate()
            .map(|(i, kind)| format!("mut {}: {kind}", local(i as u32))),
    );
    out.push_str(&format!(
        "fn {}<H: Imports>({}) -> {} {{\n",
        function.ident,
        params.join(", "),
        return_type(translated.return_kind())
    ));

    let first_local = translated.params().len();
    for (i, kind) in translated.locals.iter().enumerate() {
        out.push_str(&format!(
            "    let mut {}: {kind} = {};\n",
            local((first_local + i) as u32),
            kind.zero()
        ));
    }
    for (i, kind) in translated.slot_kinds.iter().enumerate() {
        out.push_str(&format!(
            "    let mut {}: {kind} = {};\n",
            Slot(i as u32),
            kind.zero()
        ));
    }

    let flat = matches!(
        blocks.as_slice(),
        [only] if matches!(only.terminator, Stmt::Return(_) | Stmt::Trap)
    );
    if flat {
        let block = &blocks[0];
        for stmt in block.body.iter().chain(Some(block.terminator)) {
            out.push_str(&indent(&emitter.statement(stmt)?, 4));
        }
    } else {
        let variants: Vec<String> = (0..blocks.len()).map(|i| format!("B{i}")).collect();
        out.push_str("    #[derive(Clone, Copy)]\n    #[allow(dead_code)]\n");
        out.push_str(&format!("    enum Block {{ {} }}\n", variants.join(", ")));
        out.push_str("    let mut __current_block = Block::B0;\n");
        out.push_str("    loop {\n        match __current_block {\n");
        for (i, block) in blocks.iter().enumerate() {
            out.push_str(&format!("            Block::B{i} => {{\n"));
            for stmt in block.body.iter().chain(Some(block.terminator)) {
                out.push_str(&indent(&emitter.statement(stmt)?, 16));
            }
            out.push_str("            }\n");
        }
        out.push_str("        }\n    }\n");
    }
    out.push_str("}\n");
    Ok(out)
}
