//! Export method generation.
//!
//! Exported functions forward to their `func_{i}`, exported globals become
//! getters, and an exported memory becomes a `&mut LinearMemory` accessor.

use std::fmt::Write as _;

use anyhow::{Context, Result};

use crate::assemble::{AssembledModule, ExportBinding};

/// The `impl<H: Imports> WasmModule<H>` block. Empty when nothing is exported.
pub fn generate_export_impl(module: &AssembledModule) -> Result<String> {
    if module.exports.is_empty() {
        return Ok(String::new());
    }
    let mut code = String::from("impl<H: Imports> WasmModule<H> {\n");
    for export in &module.exports {
        match export {
            ExportBinding::Function { name, method, func } => {
                let signature = module
                    .context
                    .functions
                    .get(*func as usize)
                    .with_context(|| format!("export `{name}` names missing function {func}"))?;
                let params: Vec<String> = signature
                    .params
                    .iter()
                    .enumerate()
                    .map(|(i, kind)| format!("v{i}: {kind}"))
                    .collect();
                let args: Vec<String> = (0..params.len()).map(|i| format!("v{i}")).collect();
                let ret = match signature.return_kind() {
                    Some(kind) => format!("WasmResult<{kind}>"),
                    None => "WasmResult<()>".to_string(),
                };
                let mut call_args = vec!["self".to_string()];
                call_args.extend(args);
                let mut receiver = vec!["&mut self".to_string()];
                receiver.extend(params);
                let _ = write!(
                    code,
                    "    /// Export `{name}`.\n    pub fn {method}({}) -> {ret} {{\n        func_{func}({})\n    }}\n\n",
                    receiver.join(", "),
                    call_args.join(", ")
                );
            }
            ExportBinding::Global {
                name,
                method,
                global,
            } => {
                let binding = module
                    .global(*global)
                    .with_context(|| format!("export `{name}` names missing global {global}"))?;
                let value = if binding.mutable {
                    format!("self.module.globals.{}", binding.field)
                } else {
                    format!("G{}", binding.index)
                };
                let _ = write!(
                    code,
                    "    /// Global export `{name}`.\n    pub fn {method}(&self) -> {} {{\n        {value}\n    }}\n\n",
                    binding.kind
                );
            }
            ExportBinding::Memory { name, method } => {
                let _ = write!(
                    code,
                    "    /// Memory export `{name}`.\n    pub fn {method}(&mut self) -> &mut LinearMemory {{\n        &mut self.module.memory\n    }}\n\n"
                );
            }
        }
    }
    code.push_str("}\n\n");
    Ok(code)
}
