//! Transpiled `call_indirect`: dispatch through the table with a
//! canonical-type check.

use gowasm2rs_runtime::WasmTrap;
use gowasm2rs_tests::indirect;

fn module() -> indirect::WasmModule<()> {
    indirect::new(()).unwrap()
}

#[test]
fn dispatch_by_table_index() {
    let mut m = module();
    assert_eq!(m.dispatch_binop(7, 3, 0).unwrap(), 10);
    assert_eq!(m.dispatch_binop(7, 3, 1).unwrap(), 4);
    assert_eq!(m.dispatch_unop(5, 3).unwrap(), -5);
}

#[test]
fn structurally_equal_types_match() {
    // `$mul` is declared with a distinct but identical type.
    let mut m = module();
    assert_eq!(m.dispatch_binop(7, 3, 2).unwrap(), 21);
}

#[test]
fn signature_mismatch_traps() {
    let mut m = module();
    assert_eq!(
        m.dispatch_binop(1, 2, 3),
        Err(WasmTrap::IndirectCallTypeMismatch)
    );
    assert_eq!(
        m.dispatch_unop(1, 0),
        Err(WasmTrap::IndirectCallTypeMismatch)
    );
}

#[test]
fn empty_and_out_of_range_slots_trap() {
    let mut m = module();
    assert_eq!(m.dispatch_binop(1, 2, 4), Err(WasmTrap::UndefinedElement));
    assert_eq!(m.dispatch_unop(1, 5), Err(WasmTrap::UndefinedElement));
    assert_eq!(m.dispatch_binop(1, 2, 6), Err(WasmTrap::TableOutOfBounds));
    assert_eq!(m.dispatch_unop(1, -1), Err(WasmTrap::TableOutOfBounds));
}
