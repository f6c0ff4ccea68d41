//! Code generation: emits one Rust source file from an [`AssembledModule`].
//!
//! # Layout of the generated file
//!
//! ```text
//! use <runtime>::{...};
//! pub trait GojsImports { ... }          one per import module
//! pub trait Imports: GojsImports {}      umbrella bound
//! pub struct Globals { ... }             mutable globals
//! const G{i}: T = ...;                   immutable globals
//! static DATA / ELEMENTS                 data and element segments
//! pub struct WasmModule<H> { module, host }
//! pub fn new<H: Imports>(host) -> WasmResult<WasmModule<H>>
//! fn func_{i}<H: Imports>(rt: &mut WasmModule<H>, ...)   one per function
//! impl<H: Imports> WasmModule<H> { exports }
//! ```
//!
//! Generated items are plain items without inner attributes, so the output
//! can be `include!`d inside a `mod` block.
//!
//! Statement text comes from a [`Backend`]; this module only decides the
//! structure around it.

mod export;
mod function;
mod module;
mod traits;

use std::collections::HashMap;

use anyhow::{Context, Result};

use crate::assemble::AssembledModule;
use crate::backend::Backend;
use crate::TranspileOptions;

fn preamble(runtime_path: &str) -> String {
    format!(
        "// Generated by gowasm2rs. Do not edit.\n\n\
         #[allow(unused_imports)]\n\
         use {runtime_path}::{{bits, ops, DataSegment, LinearMemory, Module, Table, WasmResult, WasmTrap}};\n\n"
    )
}

/// Generate the complete Rust source of a module.
pub fn generate_module<B: Backend>(
    backend: &B,
    module: &AssembledModule,
    options: &TranspileOptions,
) -> Result<String> {
    let mut code = preamble(&options.runtime_path);
    code.push_str(&traits::generate_host_traits(module));
    code.push_str(&module::generate_globals(module));
    code.push_str(&module::generate_statics(module));
    code.push_str(&module::generate_instance(module)?);

    let idents: HashMap<u32, String> = module
        .functions
        .iter()
        .map(|f| (f.index, f.ident.clone()))
        .collect();
    let mut partial = 0;
    for function in &module.functions {
        if function.translated.is_partial() {
            partial += 1;
        }
        let body = function::generate_function(
            backend,
            module,
            function,
            &idents,
            options.emit_names,
        )
        .with_context(|| format!("generating code for function {}", function.index))?;
        code.push_str(&body);
        code.push('\n');
    }
    if partial > 0 {
        log::warn!("{partial} function(s) contain passthrough markers for unhandled operators");
    }

    code.push_str(&export::generate_export_impl(module)?);
    log::debug!("generated {} bytes of Rust", code.len());
    Ok(code)
}
