//! gowasm2rs: translate Go-compiled WebAssembly modules into Rust source.
//!
//! The pipeline is parse, then per-function decode and translation to typed
//! slot statements, then module assembly, then Rust code generation. The
//! generated code links against `gowasm2rs-runtime`.

pub mod assemble;
pub mod backend;
pub mod codegen;
pub mod ir;
pub mod parser;
pub mod translate;

pub use anyhow::{Context, Result};
use backend::RustBackend;
use parser::parse_wasm;

/// Configuration options for transpilation
#[derive(Debug, Clone)]
pub struct TranspileOptions {
    /// Crate path the generated code imports the runtime from.
    pub runtime_path: String,
    /// Translate functions on scoped worker threads.
    pub parallel: bool,
    /// Emit name-section function names as doc comments.
    pub emit_names: bool,
}

impl Default for TranspileOptions {
    fn default() -> Self {
        Self {
            runtime_path: "gowasm2rs_runtime".to_string(),
            parallel: true,
            emit_names: true,
        }
    }
}

/// Transpile a WebAssembly module to Rust source code.
///
/// # Example
/// ```no_run
/// use gowasm2rs::{transpile, TranspileOptions};
///
/// let wasm_bytes = std::fs::read("main.wasm").unwrap();
/// let rust_code = transpile(&wasm_bytes, &TranspileOptions::default()).unwrap();
/// std::fs::write("main.rs", rust_code).unwrap();
/// ```
pub fn transpile(wasm_bytes: &[u8], options: &TranspileOptions) -> Result<String> {
    let parsed = parse_wasm(wasm_bytes).context("failed to parse WebAssembly module")?;
    log::debug!(
        "parsed module: {} types, {} imports, {} functions, {} exports",
        parsed.types.len(),
        parsed.imports.len(),
        parsed.functions.len(),
        parsed.exports.len()
    );

    let assembled = assemble::assemble(&parsed, options).context("failed to translate module")?;

    codegen::generate_module(&RustBackend::new(), &assembled, options)
        .context("failed to generate Rust code")
}
