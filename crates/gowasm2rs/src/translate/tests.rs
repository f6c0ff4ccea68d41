use std::collections::HashSet;

use super::*;
use crate::ir::{decode, BinaryOp, ConstValue};
use crate::parser::parse_wasm;

fn body(signature: FuncSignature, instructions: Vec<Instruction>) -> FunctionBody {
    FunctionBody {
        index: 0,
        signature,
        locals: Vec::new(),
        instructions,
    }
}

fn i32_pair_to_i32() -> FuncSignature {
    FuncSignature::new(vec![NumKind::I32, NumKind::I32], vec![NumKind::I32])
}

/// Translate every defined function of a WAT module.
fn translate_wat(wat: &str) -> Vec<TranslatedFunction> {
    let module = parse_wasm(&wat::parse_str(wat).unwrap()).unwrap();
    let ctx = ModuleContext::from_module(&module).unwrap();
    module
        .functions
        .iter()
        .enumerate()
        .map(|(i, f)| {
            let index = module.num_imported_functions + i as u32;
            let body = FunctionBody {
                index,
                signature: ctx.functions[index as usize].clone(),
                locals: f
                    .locals
                    .iter()
                    .map(|&t| NumKind::from_val_type(t).unwrap())
                    .collect(),
                instructions: decode(&f.body).unwrap(),
            };
            translate_function(&body, &ctx).unwrap()
        })
        .collect()
}

/// Every block starts with a label, ends with one terminator, and every
/// branch target is a label in the function.
fn assert_well_formed(f: &TranslatedFunction) {
    let labels: HashSet<BlockId> = f
        .statements
        .iter()
        .filter_map(|s| match s {
            Stmt::Label(b) => Some(*b),
            _ => None,
        })
        .collect();
    assert_eq!(labels.len(), f.block_count(), "duplicate label");
    assert!(matches!(f.statements.first(), Some(Stmt::Label(_))));
    assert!(f.statements.last().unwrap().is_terminator());

    for pair in f.statements.windows(2) {
        if let Stmt::Label(_) = pair[1] {
            assert!(pair[0].is_terminator(), "block falls into a label: {pair:?}");
        }
        if pair[0].is_terminator() {
            assert!(
                matches!(pair[1], Stmt::Label(_)),
                "statement after terminator: {pair:?}"
            );
        }
    }
    for stmt in &f.statements {
        for target in stmt.successors() {
            assert!(labels.contains(&target), "jump to missing {target}");
        }
    }
}

fn count(f: &TranslatedFunction, pred: impl Fn(&Stmt) -> bool) -> usize {
    f.statements.iter().filter(|s| pred(s)).count()
}

#[test]
fn add_uses_three_slots_and_one_return() {
    let f = translate_function(
        &body(
            i32_pair_to_i32(),
            vec![
                Instruction::LocalGet(0),
                Instruction::LocalGet(1),
                Instruction::Binary {
                    kind: NumKind::I32,
                    op: BinaryOp::Add,
                },
                Instruction::End,
            ],
        ),
        &ModuleContext::default(),
    )
    .unwrap();

    assert_eq!(f.slot_kinds, vec![NumKind::I32; 3]);
    assert_eq!(f.result, Some(Slot(2)));
    assert_eq!(
        f.statements,
        vec![
            Stmt::Label(BlockId(0)),
            Stmt::LocalGet {
                dest: Slot(0),
                local: 0
            },
            Stmt::LocalGet {
                dest: Slot(1),
                local: 1
            },
            Stmt::Binary {
                dest: Slot(2),
                kind: NumKind::I32,
                op: BinaryOp::Add,
                lhs: Slot(0),
                rhs: Slot(1),
            },
            Stmt::Return(Some(Slot(2))),
        ]
    );
}

#[test]
fn body_without_trailing_end_still_returns() {
    let f = translate_function(
        &body(
            i32_pair_to_i32(),
            vec![
                Instruction::LocalGet(0),
                Instruction::LocalGet(1),
                Instruction::Binary {
                    kind: NumKind::I32,
                    op: BinaryOp::Add,
                },
            ],
        ),
        &ModuleContext::default(),
    )
    .unwrap();
    assert_eq!(f.statements.last(), Some(&Stmt::Return(Some(Slot(2)))));
}

#[test]
fn missing_return_value_traps() {
    let sig = FuncSignature::new(Vec::new(), vec![NumKind::I32]);
    let f = translate_function(&body(sig, vec![Instruction::End]), &ModuleContext::default())
        .unwrap();
    assert_eq!(f.statements, vec![Stmt::Label(BlockId(0)), Stmt::Trap]);
    assert_eq!(f.result, None);
}

#[test]
fn void_function_returns_nothing() {
    let f = translate_function(
        &body(FuncSignature::default(), vec![Instruction::Nop, Instruction::End]),
        &ModuleContext::default(),
    )
    .unwrap();
    assert_eq!(f.statements.last(), Some(&Stmt::Return(None)));
}

#[test]
fn structural_errors() {
    let ctx = ModuleContext::default();
    let sig = FuncSignature::default();
    let err = |instructions| translate_function(&body(sig.clone(), instructions), &ctx).unwrap_err();

    assert_eq!(
        err(vec![Instruction::Drop]),
        TranslateError::StackUnderflow { at: 0 }
    );
    assert_eq!(
        err(vec![Instruction::LocalGet(3)]),
        TranslateError::UnknownLocal(3)
    );
    assert_eq!(
        err(vec![Instruction::Br(2)]),
        TranslateError::BranchDepth {
            depth: 2,
            nesting: 1
        }
    );
    assert_eq!(err(vec![Instruction::Else]), TranslateError::ElseWithoutIf);
    assert_eq!(
        err(vec![Instruction::End, Instruction::End]),
        TranslateError::UnbalancedEnd
    );
    assert_eq!(
        err(vec![Instruction::Block(BlockType::Empty)]),
        TranslateError::UnclosedBlocks(1)
    );
    assert_eq!(err(vec![Instruction::Call(9)]), TranslateError::UnknownFunction(9));
    assert_eq!(
        err(vec![
            Instruction::Const(ConstValue::I64(1)),
            Instruction::Const(ConstValue::I32(1)),
            Instruction::Binary {
                kind: NumKind::I32,
                op: BinaryOp::Add
            },
        ]),
        TranslateError::TypeMismatch {
            at: 2,
            expected: NumKind::I32,
            found: NumKind::I64
        }
    );
}

#[test]
fn block_cannot_pop_outer_values() {
    let sig = FuncSignature::default();
    let err = translate_function(
        &body(
            sig,
            vec![
                Instruction::Const(ConstValue::I32(1)),
                Instruction::Block(BlockType::Empty),
                Instruction::Drop,
            ],
        ),
        &ModuleContext::default(),
    )
    .unwrap_err();
    assert_eq!(err, TranslateError::StackUnderflow { at: 2 });
}

#[test]
fn multi_value_signatures_are_rejected() {
    let sig = FuncSignature::new(Vec::new(), vec![NumKind::I32, NumKind::I32]);
    assert_eq!(
        translate_function(&body(sig, Vec::new()), &ModuleContext::default()).unwrap_err(),
        TranslateError::MultiValueReturn(2)
    );
}

#[test]
fn unhandled_operators_become_passthrough() {
    let f = translate_function(
        &body(
            FuncSignature::default(),
            vec![Instruction::Unhandled("V128Load".to_string()), Instruction::End],
        ),
        &ModuleContext::default(),
    )
    .unwrap();
    assert!(f.is_partial());
    assert_eq!(f.statements[1], Stmt::Passthrough("V128Load".to_string()));
}

#[test]
fn block_result_merges_through_slot() {
    let funcs = translate_wat(
        r#"(module (func (param i32) (result i32)
            (block (result i32)
                i32.const 10
                local.get 0
                br_if 0
                drop
                i32.const 20)))"#,
    );
    let f = &funcs[0];
    assert_well_formed(f);
    // Both the taken br_if edge and the fall-through move into the merge slot.
    let merge = match f.statements.last() {
        Some(Stmt::Return(Some(slot))) => *slot,
        other => panic!("unexpected tail {other:?}"),
    };
    assert_eq!(count(f, |s| matches!(s, Stmt::Move { dest, .. } if *dest == merge)), 2);
    assert_eq!(f.result, Some(merge));
}

#[test]
fn dead_code_after_branch_is_skipped() {
    let funcs = translate_wat(
        r#"(module (func (result i32)
            (block
                br 0
                i32.const 99
                drop
                (block (loop (br 0))))
            i32.const 1))"#,
    );
    let f = &funcs[0];
    assert_well_formed(f);
    assert_eq!(
        count(f, |s| matches!(s, Stmt::Const { .. })),
        1,
        "only the reachable constant is emitted"
    );
    assert_eq!(count(f, |s| matches!(s, Stmt::Return(_))), 1);
}

#[test]
fn loop_branches_back_to_header() {
    let funcs = translate_wat(
        r#"(module (func (param i32) (result i32) (local i32)
            i32.const 1
            local.set 1
            (loop
                local.get 1
                local.get 0
                i32.mul
                local.set 1
                local.get 0
                i32.const 1
                i32.sub
                local.tee 0
                i32.const 1
                i32.gt_s
                br_if 0)
            local.get 1))"#,
    );
    let f = &funcs[0];
    assert_well_formed(f);
    let header = f
        .statements
        .iter()
        .find_map(|s| match s {
            Stmt::Jump(b) => Some(*b),
            _ => None,
        })
        .unwrap();
    let back_edge = f.statements.iter().any(|s| {
        matches!(s, Stmt::BranchIf { then_block, .. } if *then_block == header)
    });
    assert!(back_edge, "br_if should target the loop header directly");
}

#[test]
fn loop_parameters_become_header_slots() {
    let funcs = translate_wat(
        r#"(module
            (type $step (func (param i32) (result i32)))
            (func (param i32) (result i32)
                local.get 0
                (loop $l (type $step)
                    i32.const 1
                    i32.sub
                    local.tee 0
                    local.get 0
                    br_if $l)))"#,
    );
    let f = &funcs[0];
    assert_well_formed(f);
    // Entry move into the header slot, plus the back-edge move in its edge block.
    let header_slot = match f.statements.iter().find(|s| matches!(s, Stmt::Move { .. })) {
        Some(Stmt::Move { dest, .. }) => *dest,
        _ => panic!("no move into the loop parameter"),
    };
    assert_eq!(
        count(f, |s| matches!(s, Stmt::Move { dest, .. } if *dest == header_slot)),
        2
    );
}

#[test]
fn if_without_else_moves_params_to_results() {
    let funcs = translate_wat(
        r#"(module
            (type $bump (func (param i32) (result i32)))
            (func (param i32) (result i32)
                i32.const 5
                local.get 0
                (if (type $bump) (then i32.const 1 i32.add))))"#,
    );
    let f = &funcs[0];
    assert_well_formed(f);
    // then-edge and synthesized else-edge both feed the result slot.
    let result = f.result.unwrap();
    assert_eq!(count(f, |s| matches!(s, Stmt::Move { dest, .. } if *dest == result)), 2);
}

#[test]
fn if_else_with_both_arms_returning() {
    let funcs = translate_wat(
        r#"(module (func (param i32) (result i32)
            local.get 0
            (if (result i32)
                (then i32.const 1 return)
                (else i32.const 2 return))))"#,
    );
    let f = &funcs[0];
    assert_well_formed(f);
    // The if's end is never reached, so the function-level end adds nothing.
    assert_eq!(count(f, |s| matches!(s, Stmt::Return(Some(_)))), 2);
    assert_eq!(f.result, None);
}

#[test]
fn br_table_routes_values_through_edge_blocks() {
    let funcs = translate_wat(
        r#"(module (func (param i32) (result i32)
            (block $a (result i32)
                (block $b (result i32)
                    i32.const 7
                    local.get 0
                    br_table $a $b $a)
                i32.const 1
                i32.add)))"#,
    );
    let f = &funcs[0];
    assert_well_formed(f);
    let (targets, default) = f
        .statements
        .iter()
        .find_map(|s| match s {
            Stmt::BranchTable {
                targets, default, ..
            } => Some((targets.clone(), *default)),
            _ => None,
        })
        .unwrap();
    assert_eq!(targets.len(), 2);
    // Every edge carries a value, so no edge targets a merge block directly.
    let edges: HashSet<BlockId> = targets.iter().copied().chain(Some(default)).collect();
    assert_eq!(edges.len(), 3);
}

#[test]
fn multi_value_branch_uses_temporaries() {
    let funcs = translate_wat(
        r#"(module
            (type $pair (func (result i32 i32)))
            (func (param i32) (result i32)
                (block (type $pair)
                    i32.const 1
                    i32.const 2
                    br 0)
                i32.add))"#,
    );
    let f = &funcs[0];
    assert_well_formed(f);
    assert_eq!(count(f, |s| matches!(s, Stmt::Move { .. })), 4);
}

#[test]
fn calls_distinguish_imports() {
    let funcs = translate_wat(
        r#"(module
            (import "gojs" "runtime.wasmExit" (func (param i32)))
            (type $unary (func (param i32) (result i32)))
            (table 1 funcref)
            (func $id (type $unary) local.get 0)
            (func (param i32) (result i32)
                local.get 0
                call 0
                local.get 0
                call $id
                local.get 0
                call_indirect (type $unary)))"#,
    );
    let f = &funcs[1];
    assert_well_formed(f);
    assert!(f
        .statements
        .iter()
        .any(|s| matches!(s, Stmt::CallImport { func: 0, dest: None, .. })));
    assert!(f
        .statements
        .iter()
        .any(|s| matches!(s, Stmt::Call { func: 1, dest: Some(_), .. })));
    assert!(f
        .statements
        .iter()
        .any(|s| matches!(s, Stmt::CallIndirect { dest: Some(_), args, .. } if args.len() == 1)));
}

#[test]
fn memory_and_globals() {
    let funcs = translate_wat(
        r#"(module
            (memory 1)
            (global $sp (mut i32) (i32.const 1024))
            (func (param i32)
                global.get $sp
                local.get 0
                i32.store8 offset=4
                global.get $sp
                i32.const 8
                i32.sub
                global.set $sp
                i32.const 1
                memory.grow
                drop))"#,
    );
    let f = &funcs[0];
    assert_well_formed(f);
    assert!(f
        .statements
        .iter()
        .any(|s| matches!(s, Stmt::Store { access, .. } if access.offset == 4)));
    assert!(f
        .statements
        .iter()
        .any(|s| matches!(s, Stmt::GlobalSet { global: 0, .. })));
    assert!(f
        .statements
        .iter()
        .any(|s| matches!(s, Stmt::MemoryGrow { .. })));
}

#[test]
fn immutable_global_cannot_be_set() {
    let ctx = ModuleContext {
        globals: vec![GlobalType {
            kind: NumKind::I32,
            mutable: false,
        }],
        ..ModuleContext::default()
    };
    let err = translate_function(
        &body(
            FuncSignature::default(),
            vec![
                Instruction::Const(ConstValue::I32(0)),
                Instruction::GlobalSet(0),
            ],
        ),
        &ctx,
    )
    .unwrap_err();
    assert_eq!(err, TranslateError::ImmutableGlobal(0));
}

#[test]
fn canonical_types_collapse_duplicates() {
    let module = parse_wasm(
        &wat::parse_str(
            r#"(module
                (type (func (param i32)))
                (type (func (result i64)))
                (type (func (param i32))))"#,
        )
        .unwrap(),
    )
    .unwrap();
    let ctx = ModuleContext::from_module(&module).unwrap();
    assert_eq!(ctx.canonical_types, vec![0, 1, 0]);
}
