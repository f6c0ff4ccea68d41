//! Instruction translator.
//!
//! Simulates the WebAssembly operand stack over typed [`Slot`]s and lowers a
//! decoded function body into a flat list of [`Stmt`]s. Structured control
//! flow becomes basic blocks separated by [`Stmt::Label`]; values that flow
//! into a merge point (block results, loop parameters) are moved into merge
//! slots on every incoming edge.

mod error;
mod stmt;

pub use error::TranslateError;
pub use stmt::{Stmt, TranslatedFunction};

use anyhow::{Context, Result};

use crate::ir::{BlockId, BlockType, FuncSignature, Instruction, NumKind, Slot, UnaryOp};
use crate::parser::{ImportKind, InitValue, ParsedModule};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalType {
    pub kind: NumKind,
    pub mutable: bool,
}

/// Read-only module facts the translator consults while lowering a body.
#[derive(Debug, Clone, Default)]
pub struct ModuleContext {
    /// Type-section signatures.
    pub types: Vec<FuncSignature>,
    /// First type index with an identical signature, per type index.
    pub canonical_types: Vec<u32>,
    /// Signatures of the whole function index space, imports first.
    pub functions: Vec<FuncSignature>,
    pub num_imported_functions: u32,
    /// Global index space, imports first.
    pub globals: Vec<GlobalType>,
}

impl ModuleContext {
    pub fn from_module(module: &ParsedModule) -> Result<Self> {
        let types = module
            .types
            .iter()
            .enumerate()
            .map(|(i, ty)| FuncSignature::from_func_type(ty).with_context(|| format!("type {i}")))
            .collect::<Result<Vec<_>>>()?;

        let canonical_types = types
            .iter()
            .map(|sig| types.iter().position(|other| other == sig).unwrap_or(0) as u32)
            .collect();

        let signature = |ty: u32| {
            types
                .get(ty as usize)
                .cloned()
                .with_context(|| format!("function refers to missing type {ty}"))
        };
        let mut functions = Vec::new();
        let mut globals = Vec::new();
        for import in &module.imports {
            match &import.kind {
                ImportKind::Function(ty) => functions.push(signature(*ty)?),
                ImportKind::Global { val_type, mutable } => globals.push(GlobalType {
                    kind: NumKind::from_val_type(*val_type)?,
                    mutable: *mutable,
                }),
                ImportKind::Memory | ImportKind::Table => {}
            }
        }
        for function in &module.functions {
            functions.push(signature(function.type_idx)?);
        }
        for global in &module.globals {
            globals.push(GlobalType {
                kind: NumKind::from_val_type(global.val_type)?,
                mutable: global.mutable,
            });
        }

        Ok(Self {
            types,
            canonical_types,
            functions,
            num_imported_functions: module.num_imported_functions,
            globals,
        })
    }

    pub fn is_import(&self, func: u32) -> bool {
        func < self.num_imported_functions
    }
}

/// Kind of an [`InitValue`].
pub fn init_kind(value: InitValue) -> NumKind {
    match value {
        InitValue::I32(_) => NumKind::I32,
        InitValue::I64(_) => NumKind::I64,
        InitValue::F32(_) => NumKind::F32,
        InitValue::F64(_) => NumKind::F64,
    }
}

/// A decoded function body ready for translation.
#[derive(Debug, Clone)]
pub struct FunctionBody {
    /// Index in the function index space.
    pub index: u32,
    pub signature: FuncSignature,
    /// Declared locals, after the parameters.
    pub locals: Vec<NumKind>,
    pub instructions: Vec<Instruction>,
}

/// Translate one function body.
pub fn translate_function(
    body: &FunctionBody,
    ctx: &ModuleContext,
) -> Result<TranslatedFunction, TranslateError> {
    if body.signature.results.len() > 1 {
        return Err(TranslateError::MultiValueReturn(
            body.signature.results.len(),
        ));
    }
    Translator::new(body, ctx).run(&body.instructions)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Function,
    Block,
    Loop,
    If,
}

#[derive(Debug, Clone)]
struct Frame {
    kind: FrameKind,
    /// Loop header.
    start: BlockId,
    end: BlockId,
    else_block: Option<BlockId>,
    /// Loop: merge slots at the header. If: parameter values at entry.
    params: Vec<Slot>,
    /// Merge slots written on every edge into `end`.
    results: Vec<Slot>,
    stack_height: usize,
    reachable_at_entry: bool,
    end_reachable: bool,
    else_seen: bool,
}

impl Frame {
    fn new(kind: FrameKind, start: BlockId, end: BlockId, stack_height: usize) -> Self {
        Self {
            kind,
            start,
            end,
            else_block: None,
            params: Vec::new(),
            results: Vec::new(),
            stack_height,
            reachable_at_entry: true,
            end_reachable: false,
            else_seen: false,
        }
    }
}

/// Where a branch goes.
enum Target {
    /// Jump to `block` after moving the branch values into `slots`.
    Block { block: BlockId, slots: Vec<Slot> },
    Return,
}

struct Translator<'a> {
    ctx: &'a ModuleContext,
    index: u32,
    signature: &'a FuncSignature,
    locals: &'a [NumKind],
    slot_kinds: Vec<NumKind>,
    live_slots: Vec<Slot>,
    frames: Vec<Frame>,
    statements: Vec<Stmt>,
    next_block: u32,
    reachable: bool,
    /// Blocks opened while unreachable; their `else`/`end` are skipped too.
    skipped_depth: u32,
    at: usize,
    result: Option<Slot>,
    finished: bool,
}

impl<'a> Translator<'a> {
    fn new(body: &'a FunctionBody, ctx: &'a ModuleContext) -> Self {
        Self {
            ctx,
            index: body.index,
            signature: &body.signature,
            locals: &body.locals,
            slot_kinds: Vec::new(),
            live_slots: Vec::new(),
            frames: Vec::new(),
            statements: Vec::new(),
            next_block: 0,
            reachable: true,
            skipped_depth: 0,
            at: 0,
            result: None,
            finished: false,
        }
    }

    fn run(mut self, instructions: &[Instruction]) -> Result<TranslatedFunction, TranslateError> {
        let entry = self.new_block();
        let exit = self.new_block();
        self.emit(Stmt::Label(entry));
        self.frames
            .push(Frame::new(FrameKind::Function, entry, exit, 0));

        for (at, instruction) in instructions.iter().enumerate() {
            if self.finished {
                return Err(TranslateError::UnbalancedEnd);
            }
            self.at = at;
            self.step(instruction)?;
        }

        if !self.finished {
            let open = self.frames.len().saturating_sub(1) + self.skipped_depth as usize;
            if open > 0 {
                return Err(TranslateError::UnclosedBlocks(open));
            }
            self.finish()?;
        }

        Ok(TranslatedFunction {
            index: self.index,
            signature: self.signature.clone(),
            locals: self.locals.to_vec(),
            slot_kinds: self.slot_kinds,
            statements: self.statements,
            result: self.result,
        })
    }

    fn new_slot(&mut self, kind: NumKind) -> Slot {
        let slot = Slot(self.slot_kinds.len() as u32);
        self.slot_kinds.push(kind);
        slot
    }

    fn new_block(&mut self) -> BlockId {
        let block = BlockId(self.next_block);
        self.next_block += 1;
        block
    }

    fn emit(&mut self, stmt: Stmt) {
        self.statements.push(stmt);
    }

    fn kind_of(&self, slot: Slot) -> NumKind {
        self.slot_kinds[slot.0 as usize]
    }

    fn floor(&self) -> usize {
        self.frames.last().map_or(0, |f| f.stack_height)
    }

    fn push(&mut self, kind: NumKind) -> Slot {
        let slot = self.new_slot(kind);
        self.live_slots.push(slot);
        slot
    }

    fn underflow(&self) -> TranslateError {
        TranslateError::StackUnderflow { at: self.at }
    }

    fn expect_kind(&self, slot: Slot, expected: NumKind) -> Result<Slot, TranslateError> {
        let found = self.kind_of(slot);
        if found != expected {
            return Err(TranslateError::TypeMismatch {
                at: self.at,
                expected,
                found,
            });
        }
        Ok(slot)
    }

    fn pop(&mut self) -> Result<Slot, TranslateError> {
        if self.live_slots.len() <= self.floor() {
            return Err(self.underflow());
        }
        self.live_slots.pop().ok_or_else(|| self.underflow())
    }

    fn pop_kind(&mut self, expected: NumKind) -> Result<Slot, TranslateError> {
        let slot = self.pop()?;
        self.expect_kind(slot, expected)
    }

    /// Pop values for `kinds`, returned in stack order.
    fn pop_many(&mut self, kinds: &[NumKind]) -> Result<Vec<Slot>, TranslateError> {
        let mut slots = kinds
            .iter()
            .rev()
            .map(|&kind| self.pop_kind(kind))
            .collect::<Result<Vec<_>, _>>()?;
        slots.reverse();
        Ok(slots)
    }

    /// The top `kinds.len()` slots, without popping.
    fn top(&self, kinds: &[NumKind], floor: usize) -> Result<Vec<Slot>, TranslateError> {
        let n = kinds.len();
        if self.live_slots.len() < floor + n {
            return Err(self.underflow());
        }
        let slots = self.live_slots[self.live_slots.len() - n..].to_vec();
        for (&slot, &kind) in slots.iter().zip(kinds) {
            self.expect_kind(slot, kind)?;
        }
        Ok(slots)
    }

    fn local_kind(&self, local: u32) -> Result<NumKind, TranslateError> {
        let params = &self.signature.params;
        let index = local as usize;
        if index < params.len() {
            Ok(params[index])
        } else {
            self.locals
                .get(index - params.len())
                .copied()
                .ok_or(TranslateError::UnknownLocal(local))
        }
    }

    fn block_signature(&self, ty: BlockType) -> Result<FuncSignature, TranslateError> {
        match ty {
            BlockType::Empty => Ok(FuncSignature::default()),
            BlockType::Value(kind) => Ok(FuncSignature::new(Vec::new(), vec![kind])),
            BlockType::Func(index) => self
                .ctx
                .types
                .get(index as usize)
                .cloned()
                .ok_or(TranslateError::UnknownType(index)),
        }
    }

    /// Copy the top of the stack into `dests`. Several values go through
    /// temporaries so a destination may also be a source.
    fn emit_moves(&mut self, dests: &[Slot], floor: usize) -> Result<(), TranslateError> {
        let kinds: Vec<NumKind> = dests.iter().map(|&d| self.kind_of(d)).collect();
        let sources = self.top(&kinds, floor)?;
        if let ([dest], [src]) = (dests, sources.as_slice()) {
            if dest != src {
                self.emit(Stmt::Move {
                    dest: *dest,
                    src: *src,
                });
            }
            return Ok(());
        }
        let temps: Vec<Slot> = sources
            .iter()
            .zip(&kinds)
            .map(|(&src, &kind)| {
                let temp = self.new_slot(kind);
                self.emit(Stmt::Move { dest: temp, src });
                temp
            })
            .collect();
        for (&dest, temp) in dests.iter().zip(temps) {
            self.emit(Stmt::Move { dest, src: temp });
        }
        Ok(())
    }

    fn branch_target(&mut self, depth: u32) -> Result<Target, TranslateError> {
        let nesting = self.frames.len();
        let index = nesting
            .checked_sub(depth as usize + 1)
            .ok_or(TranslateError::BranchDepth { depth, nesting })?;
        let frame = &mut self.frames[index];
        Ok(match frame.kind {
            FrameKind::Function => Target::Return,
            FrameKind::Loop => Target::Block {
                block: frame.start,
                slots: frame.params.clone(),
            },
            FrameKind::Block | FrameKind::If => {
                frame.end_reachable = true;
                Target::Block {
                    block: frame.end,
                    slots: frame.results.clone(),
                }
            }
        })
    }

    fn emit_branch(&mut self, target: Target) -> Result<(), TranslateError> {
        match target {
            Target::Block { block, slots } => {
                self.emit_moves(&slots, self.floor())?;
                self.emit(Stmt::Jump(block));
                Ok(())
            }
            Target::Return => self.emit_return(),
        }
    }

    fn emit_return(&mut self) -> Result<(), TranslateError> {
        let value = match self.signature.return_kind() {
            Some(kind) => Some(self.top(&[kind], self.floor())?[0]),
            None => None,
        };
        self.emit(Stmt::Return(value));
        Ok(())
    }

    /// A conditional edge: direct when no values move, otherwise through an
    /// edge block holding the moves.
    fn edge_block(&mut self, target: Target, pending: &mut Vec<(BlockId, Target)>) -> BlockId {
        match target {
            Target::Block { block, slots } if slots.is_empty() => block,
            target => {
                let edge = self.new_block();
                pending.push((edge, target));
                edge
            }
        }
    }

    fn emit_edges(&mut self, pending: Vec<(BlockId, Target)>) -> Result<(), TranslateError> {
        for (edge, target) in pending {
            self.emit(Stmt::Label(edge));
            self.emit_branch(target)?;
        }
        Ok(())
    }

    fn step(&mut self, instruction: &Instruction) -> Result<(), TranslateError> {
        if !self.reachable {
            match instruction {
                Instruction::Block(_) | Instruction::Loop(_) | Instruction::If(_) => {
                    self.skipped_depth += 1;
                    return Ok(());
                }
                Instruction::Else if self.skipped_depth > 0 => return Ok(()),
                Instruction::End if self.skipped_depth > 0 => {
                    self.skipped_depth -= 1;
                    return Ok(());
                }
                Instruction::Else | Instruction::End => {}
                _ => return Ok(()),
            }
        }

        match instruction {
            Instruction::Unreachable => {
                self.emit(Stmt::Trap);
                self.reachable = false;
            }
            Instruction::Nop => {}

            Instruction::Block(ty) => {
                let sig = self.block_signature(*ty)?;
                let floor = self.floor();
                self.top(&sig.params, floor)?;
                let stack_height = self.live_slots.len() - sig.params.len();
                let end = self.new_block();
                let mut frame = Frame::new(FrameKind::Block, end, end, stack_height);
                frame.results = sig.results.iter().map(|&k| self.new_slot(k)).collect();
                self.frames.push(frame);
            }

            Instruction::Loop(ty) => {
                let sig = self.block_signature(*ty)?;
                let values = self.pop_many(&sig.params)?;
                let phis: Vec<Slot> = sig.params.iter().map(|&k| self.new_slot(k)).collect();
                for (&dest, &src) in phis.iter().zip(&values) {
                    self.emit(Stmt::Move { dest, src });
                }
                let header = self.new_block();
                self.emit(Stmt::Jump(header));
                self.emit(Stmt::Label(header));
                let stack_height = self.live_slots.len();
                self.live_slots.extend(&phis);
                let mut frame = Frame::new(FrameKind::Loop, header, header, stack_height);
                frame.params = phis;
                self.frames.push(frame);
            }

            Instruction::If(ty) => {
                let cond = self.pop_kind(NumKind::I32)?;
                let sig = self.block_signature(*ty)?;
                let params = self.top(&sig.params, self.floor())?;
                let stack_height = self.live_slots.len() - params.len();
                let then_block = self.new_block();
                let else_block = self.new_block();
                let end = self.new_block();
                self.emit(Stmt::BranchIf {
                    cond,
                    then_block,
                    else_block,
                });
                self.emit(Stmt::Label(then_block));
                let mut frame = Frame::new(FrameKind::If, end, end, stack_height);
                frame.else_block = Some(else_block);
                frame.params = params;
                frame.results = sig.results.iter().map(|&k| self.new_slot(k)).collect();
                self.frames.push(frame);
            }

            Instruction::Else => {
                let frame = match self.frames.last() {
                    Some(f) if f.kind == FrameKind::If && !f.else_seen => f.clone(),
                    _ => return Err(TranslateError::ElseWithoutIf),
                };
                if self.reachable {
                    self.emit_moves(&frame.results, frame.stack_height)?;
                    self.emit(Stmt::Jump(frame.end));
                }
                let reached_end = self.reachable;
                if let Some(top) = self.frames.last_mut() {
                    top.end_reachable |= reached_end;
                    top.else_seen = true;
                }
                self.live_slots.truncate(frame.stack_height);
                self.live_slots.extend(&frame.params);
                if let Some(else_block) = frame.else_block {
                    self.emit(Stmt::Label(else_block));
                }
                self.reachable = frame.reachable_at_entry;
            }

            Instruction::End => self.end_frame()?,

            Instruction::Br(depth) => {
                let target = self.branch_target(*depth)?;
                self.emit_branch(target)?;
                self.reachable = false;
            }

            Instruction::BrIf(depth) => {
                let cond = self.pop_kind(NumKind::I32)?;
                let target = self.branch_target(*depth)?;
                let mut pending = Vec::new();
                let then_block = self.edge_block(target, &mut pending);
                let cont = self.new_block();
                self.emit(Stmt::BranchIf {
                    cond,
                    then_block,
                    else_block: cont,
                });
                self.emit_edges(pending)?;
                self.emit(Stmt::Label(cont));
            }

            Instruction::BrTable { targets, default } => {
                let index = self.pop_kind(NumKind::I32)?;
                let mut pending = Vec::new();
                let mut blocks = Vec::with_capacity(targets.len());
                for &depth in targets {
                    let target = self.branch_target(depth)?;
                    blocks.push(self.edge_block(target, &mut pending));
                }
                let target = self.branch_target(*default)?;
                let default = self.edge_block(target, &mut pending);
                self.emit(Stmt::BranchTable {
                    index,
                    targets: blocks,
                    default,
                });
                self.emit_edges(pending)?;
                self.reachable = false;
            }

            Instruction::Return => {
                self.emit_return()?;
                self.reachable = false;
            }

            Instruction::Call(func) => {
                let sig = self
                    .ctx
                    .functions
                    .get(*func as usize)
                    .cloned()
                    .ok_or(TranslateError::UnknownFunction(*func))?;
                if sig.results.len() > 1 {
                    return Err(TranslateError::MultiValueReturn(sig.results.len()));
                }
                let args = self.pop_many(&sig.params)?;
                let dest = sig.return_kind().map(|kind| self.push(kind));
                let func = *func;
                self.emit(if self.ctx.is_import(func) {
                    Stmt::CallImport { dest, func, args }
                } else {
                    Stmt::Call { dest, func, args }
                });
            }

            Instruction::CallIndirect {
                type_index,
                table_index,
            } => {
                if *table_index != 0 {
                    return Err(TranslateError::UnsupportedTable(*table_index));
                }
                let sig = self
                    .ctx
                    .types
                    .get(*type_index as usize)
                    .cloned()
                    .ok_or(TranslateError::UnknownType(*type_index))?;
                if sig.results.len() > 1 {
                    return Err(TranslateError::MultiValueReturn(sig.results.len()));
                }
                let index = self.pop_kind(NumKind::I32)?;
                let args = self.pop_many(&sig.params)?;
                let dest = sig.return_kind().map(|kind| self.push(kind));
                self.emit(Stmt::CallIndirect {
                    dest,
                    type_index: *type_index,
                    index,
                    args,
                });
            }

            Instruction::Drop => {
                self.pop()?;
            }

            Instruction::Select => {
                let cond = self.pop_kind(NumKind::I32)?;
                let if_false = self.pop()?;
                let kind = self.kind_of(if_false);
                let if_true = self.pop_kind(kind)?;
                let dest = self.push(kind);
                self.emit(Stmt::Select {
                    dest,
                    cond,
                    if_true,
                    if_false,
                });
            }

            Instruction::LocalGet(local) => {
                let kind = self.local_kind(*local)?;
                let dest = self.push(kind);
                self.emit(Stmt::LocalGet {
                    dest,
                    local: *local,
                });
            }
            Instruction::LocalSet(local) => {
                let kind = self.local_kind(*local)?;
                let src = self.pop_kind(kind)?;
                self.emit(Stmt::LocalSet { local: *local, src });
            }
            Instruction::LocalTee(local) => {
                let kind = self.local_kind(*local)?;
                let src = self.top(&[kind], self.floor())?[0];
                self.emit(Stmt::LocalSet { local: *local, src });
            }

            Instruction::GlobalGet(global) => {
                let ty = self.global_type(*global)?;
                let dest = self.push(ty.kind);
                self.emit(Stmt::GlobalGet {
                    dest,
                    global: *global,
                });
            }
            Instruction::GlobalSet(global) => {
                let ty = self.global_type(*global)?;
                if !ty.mutable {
                    return Err(TranslateError::ImmutableGlobal(*global));
                }
                let src = self.pop_kind(ty.kind)?;
                self.emit(Stmt::GlobalSet {
                    global: *global,
                    src,
                });
            }

            Instruction::Load { kind, access } => {
                let addr = self.pop_kind(NumKind::I32)?;
                let dest = self.push(*kind);
                self.emit(Stmt::Load {
                    dest,
                    kind: *kind,
                    access: *access,
                    addr,
                });
            }
            Instruction::Store { kind, access } => {
                let value = self.pop_kind(*kind)?;
                let addr = self.pop_kind(NumKind::I32)?;
                self.emit(Stmt::Store {
                    kind: *kind,
                    access: *access,
                    addr,
                    value,
                });
            }
            Instruction::MemorySize => {
                let dest = self.push(NumKind::I32);
                self.emit(Stmt::MemorySize { dest });
            }
            Instruction::MemoryGrow => {
                let delta = self.pop_kind(NumKind::I32)?;
                let dest = self.push(NumKind::I32);
                self.emit(Stmt::MemoryGrow { dest, delta });
            }
            Instruction::MemoryCopy => {
                let len = self.pop_kind(NumKind::I32)?;
                let src = self.pop_kind(NumKind::I32)?;
                let dst = self.pop_kind(NumKind::I32)?;
                self.emit(Stmt::MemoryCopy { dst, src, len });
            }
            Instruction::MemoryFill => {
                let len = self.pop_kind(NumKind::I32)?;
                let value = self.pop_kind(NumKind::I32)?;
                let dst = self.pop_kind(NumKind::I32)?;
                self.emit(Stmt::MemoryFill { dst, value, len });
            }

            Instruction::Const(value) => {
                let dest = self.push(value.kind());
                self.emit(Stmt::Const {
                    dest,
                    value: *value,
                });
            }
            Instruction::Unary { kind, op } => {
                let src = self.pop_kind(*kind)?;
                let result = if *op == UnaryOp::Eqz {
                    NumKind::I32
                } else {
                    *kind
                };
                let dest = self.push(result);
                self.emit(Stmt::Unary {
                    dest,
                    kind: *kind,
                    op: *op,
                    src,
                });
            }
            Instruction::Binary { kind, op } => {
                let rhs = self.pop_kind(*kind)?;
                let lhs = self.pop_kind(*kind)?;
                let dest = self.push(*kind);
                self.emit(Stmt::Binary {
                    dest,
                    kind: *kind,
                    op: *op,
                    lhs,
                    rhs,
                });
            }
            Instruction::Compare { kind, op } => {
                let rhs = self.pop_kind(*kind)?;
                let lhs = self.pop_kind(*kind)?;
                let dest = self.push(NumKind::I32);
                self.emit(Stmt::Compare {
                    dest,
                    kind: *kind,
                    op: *op,
                    lhs,
                    rhs,
                });
            }
            Instruction::Convert { op, from, to } => {
                let src = self.pop_kind(*from)?;
                let dest = self.push(*to);
                self.emit(Stmt::Convert {
                    dest,
                    op: *op,
                    from: *from,
                    to: *to,
                    src,
                });
            }

            Instruction::Unhandled(name) => {
                log::warn!(
                    "function {}: `{name}` is not lowered, emitting a passthrough marker",
                    self.index
                );
                self.emit(Stmt::Passthrough(name.clone()));
            }
        }
        Ok(())
    }

    fn global_type(&self, global: u32) -> Result<GlobalType, TranslateError> {
        self.ctx
            .globals
            .get(global as usize)
            .copied()
            .ok_or(TranslateError::UnknownGlobal(global))
    }

    fn end_frame(&mut self) -> Result<(), TranslateError> {
        if self.frames.len() == 1 {
            self.finish()?;
            self.frames.pop();
            return Ok(());
        }
        let frame = self.frames.pop().ok_or(TranslateError::UnbalancedEnd)?;

        if frame.kind == FrameKind::Loop {
            // Only fall-through reaches a loop's end; its results stay live.
            if !self.reachable {
                self.live_slots.truncate(frame.stack_height);
            }
            return Ok(());
        }

        let mut end_reachable = frame.end_reachable;
        if self.reachable {
            self.emit_moves(&frame.results, frame.stack_height)?;
            self.emit(Stmt::Jump(frame.end));
            end_reachable = true;
        }
        if frame.kind == FrameKind::If && !frame.else_seen {
            if let Some(else_block) = frame.else_block {
                self.live_slots.truncate(frame.stack_height);
                self.live_slots.extend(&frame.params);
                self.emit(Stmt::Label(else_block));
                self.emit_moves(&frame.results, frame.stack_height)?;
                self.emit(Stmt::Jump(frame.end));
                end_reachable = true;
            }
        }

        self.live_slots.truncate(frame.stack_height);
        if end_reachable {
            self.emit(Stmt::Label(frame.end));
            self.live_slots.extend(&frame.results);
        }
        self.reachable = end_reachable;
        Ok(())
    }

    /// Function-level `end`: return the top slot, or trap when a value is
    /// demanded and none is live.
    fn finish(&mut self) -> Result<(), TranslateError> {
        self.finished = true;
        if !self.reachable {
            return Ok(());
        }
        let arity = self.signature.results.len();
        if self.live_slots.len() > arity {
            log::warn!(
                "function {}: {} value(s) left on the stack at the end of the body",
                self.index,
                self.live_slots.len() - arity
            );
        }
        match self.signature.return_kind() {
            None => self.emit(Stmt::Return(None)),
            Some(kind) => match self.live_slots.last().copied() {
                Some(top) => {
                    self.expect_kind(top, kind)?;
                    self.result = Some(top);
                    self.emit(Stmt::Return(Some(top)));
                }
                None => {
                    log::warn!(
                        "function {}: no value left for the declared {kind} result",
                        self.index
                    );
                    self.emit(Stmt::Trap);
                }
            },
        }
        self.reachable = false;
        Ok(())
    }
}

/// Turn a structural error into an `anyhow` error naming the function.
pub fn with_function_context(
    result: Result<TranslatedFunction, TranslateError>,
    index: u32,
    name: Option<&str>,
) -> Result<TranslatedFunction> {
    result.with_context(|| match name {
        Some(name) => format!("translating function {index} ({name})"),
        None => format!("translating function {index}"),
    })
}

#[cfg(test)]
mod tests;
