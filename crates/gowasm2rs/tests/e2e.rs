//! End-to-end tests: WAT -> wasm -> Rust source.

use anyhow::{Context, Result};
use gowasm2rs::{transpile, TranspileOptions};

fn transpile_wat(wat_source: &str) -> Result<String> {
    let wasm_bytes = wat::parse_str(wat_source).context("failed to parse WAT")?;
    transpile(&wasm_bytes, &TranspileOptions::default())
}

#[test]
fn add_function_with_export() -> Result<()> {
    let rust_code = transpile_wat(
        r#"
        (module
            (func $add (export "add") (param i32 i32) (result i32)
                local.get 0
                local.get 1
                i32.add))
        "#,
    )?;

    assert!(rust_code.starts_with("// Generated by gowasm2rs. Do not edit."));
    assert!(rust_code.contains("use gowasm2rs_runtime::{bits, ops, DataSegment"));
    assert!(rust_code.contains("pub trait Imports {}\nimpl<T> Imports for T {}"));
    assert!(rust_code.contains("/// `add`\n"));
    assert!(rust_code.contains("fn func_0<H: Imports>(rt: &mut WasmModule<H>, mut l0: i32, mut l1: i32) -> WasmResult<i32>"));
    assert!(rust_code.contains("s2 = s0.wrapping_add(s1);"));
    assert_eq!(rust_code.matches("return Ok(s2);").count(), 1);
    assert!(rust_code.contains("pub fn add(&mut self, v0: i32, v1: i32) -> WasmResult<i32> {\n        func_0(self, v0, v1)\n    }"));
    Ok(())
}

#[test]
fn missing_return_value_becomes_a_trap() -> Result<()> {
    let rust_code = transpile_wat(r#"(module (func (result i32) nop))"#)?;
    assert!(rust_code.contains("return Err(WasmTrap::Unreachable);"));
    Ok(())
}

#[test]
fn go_style_module() -> Result<()> {
    let rust_code = transpile_wat(
        r#"
        (module
            (import "gojs" "runtime.wasmExit" (func $exit (param i32)))
            (import "gojs" "runtime.wasmWrite" (func $write (param i32)))
            (import "gojs" "syscall/js.valueGet" (func $get (param i32)))
            (memory (export "mem") 2)
            (global $sp (mut i32) (i32.const 65536))
            (data (i32.const 4096) "go\00")
            (func $run (export "run") (param i32 i32)
                global.get $sp
                i32.const 8
                i32.sub
                global.set $sp
                global.get $sp
                call $write
                i32.const 0
                call $exit)
            (export "getsp" (global $sp)))
        "#,
    )?;

    assert!(rust_code.contains("/// Host functions imported from `gojs`.\npub trait GojsImports {"));
    assert!(rust_code.contains(
        "fn runtime_wasm_exit(&mut self, memory: &mut LinearMemory, a0: i32) -> WasmResult<()>;"
    ));
    assert!(rust_code.contains("fn syscall_js_value_get(&mut self"));
    assert!(rust_code.contains("pub trait Imports: GojsImports {}\nimpl<T: GojsImports> Imports for T {}"));
    assert!(rust_code.contains("pub struct Globals {\n    pub g0: i32,\n}"));
    assert!(rust_code.contains("            g0: 65536i32,"));
    assert!(rust_code.contains("const INITIAL_PAGES: u32 = 2;"));
    assert!(rust_code.contains(r#"DataSegment { offset: 4096, data: b"go\x00" },"#));
    assert!(rust_code.contains("<H as GojsImports>::runtime_wasm_write(&mut rt.host, &mut rt.module.memory, "));
    assert!(rust_code.contains("rt.module.globals.g0 = "));
    assert!(rust_code.contains("pub fn mem(&mut self) -> &mut LinearMemory"));
    assert!(rust_code.contains("pub fn getsp(&self) -> i32 {\n        self.module.globals.g0\n    }"));
    Ok(())
}

#[test]
fn loops_and_branch_tables_use_the_block_state_machine() -> Result<()> {
    let rust_code = transpile_wat(
        r#"
        (module
            (func (export "fact") (param i64) (result i64) (local i64)
                i64.const 1
                local.set 1
                (block
                    (loop
                        local.get 0
                        i64.eqz
                        br_if 1
                        local.get 1
                        local.get 0
                        i64.mul
                        local.set 1
                        local.get 0
                        i64.const 1
                        i64.sub
                        local.set 0
                        br 0))
                local.get 1)
            (func (export "pick") (param i32) (result i32)
                (block (block (block
                    local.get 0
                    br_table 0 1 2)
                    i32.const 10
                    return)
                    i32.const 20
                    return)
                i32.const 30))
        "#,
    )?;

    assert!(rust_code.contains("let mut __current_block = Block::B0;"));
    assert!(rust_code.contains(".wrapping_mul("));
    assert!(rust_code.contains("__current_block = match "));
    assert!(rust_code.contains("as u32 as usize {"));
    assert!(rust_code.contains("pub fn fact(&mut self, v0: i64) -> WasmResult<i64>"));
    Ok(())
}

#[test]
fn start_function_runs_in_constructor() -> Result<()> {
    let rust_code = transpile_wat(
        r#"
        (module
            (global $ready (mut i32) (i32.const 0))
            (func $init i32.const 1 global.set $ready)
            (start $init))
        "#,
    )?;
    assert!(rust_code.contains("    let mut rt = WasmModule { module, host };\n    func_0(&mut rt)?;\n    Ok(rt)\n"));
    Ok(())
}

#[test]
fn runtime_path_and_names_are_configurable() -> Result<()> {
    let wasm = wat::parse_str(r#"(module (func $main.main))"#)?;
    let options = TranspileOptions {
        runtime_path: "crate::rt".to_string(),
        parallel: false,
        emit_names: false,
    };
    let rust_code = transpile(&wasm, &options)?;
    assert!(rust_code.contains("use crate::rt::{bits"));
    assert!(!rust_code.contains("/// `main.main`"));
    Ok(())
}

#[test]
fn immutable_float_globals_are_consts() -> Result<()> {
    let rust_code = transpile_wat(
        r#"
        (module
            (global $pi f64 (f64.const 3.5))
            (func (export "pi") (result f64) global.get $pi))
        "#,
    )?;
    assert!(rust_code.contains(&format!(
        "const G0: f64 = f64::from_bits({:#018x});",
        3.5f64.to_bits()
    )));
    assert!(rust_code.contains("= G0;"));
    Ok(())
}

#[test]
fn structural_errors_fail_the_whole_module() {
    // `drop` on an empty operand stack is malformed, not merely unhandled.
    let err = transpile_wat(r#"(module (func $bad drop))"#).unwrap_err();
    let chain = format!("{err:#}");
    assert!(chain.contains("translating function 0 (bad)"), "{chain}");
    assert!(chain.contains("operand stack underflow"), "{chain}");
}

#[test]
fn invalid_wasm_reports_context() {
    let err = transpile(b"\0asm\x02\0\0\0", &TranspileOptions::default()).unwrap_err();
    assert!(format!("{err:#}").contains("failed to parse WebAssembly module"));
}
