//! Host trait generation from imports.
//!
//! Each import module becomes one trait (`gojs` -> `GojsImports`) with a
//! method per imported function. Every method receives the instance's linear
//! memory, since Go's `gojs` imports pass only a stack pointer and read
//! their arguments out of memory. An umbrella `Imports` trait with a blanket
//! impl keeps generated signatures to a single bound.

use crate::assemble::AssembledModule;
use crate::ir::FuncSignature;

fn method_signature(method: &str, signature: &FuncSignature) -> String {
    let mut params = vec![
        "&mut self".to_string(),
        "memory: &mut LinearMemory".to_string(),
    ];
    params.extend(
        signature
            .params
            .iter()
            .enumerate()
            .map(|(i, kind)| format!("a{i}: {kind}")),
    );
    let ret = match signature.return_kind() {
        Some(kind) => format!("WasmResult<{kind}>"),
        None => "WasmResult<()>".to_string(),
    };
    format!("fn {method}({}) -> {ret}", params.join(", "))
}

/// Trait definitions plus the `Imports` umbrella.
pub fn generate_host_traits(module: &AssembledModule) -> String {
    let mut code = String::new();
    for host_trait in &module.import_traits {
        code.push_str(&format!(
            "/// Host functions imported from `{}`.\npub trait {} {{\n",
            host_trait.module, host_trait.trait_name
        ));
        let mut emitted: Vec<&str> = Vec::new();
        for import in module
            .imports
            .iter()
            .filter(|i| i.module == host_trait.module)
        {
            // Duplicate imports of one name share a method.
            if emitted.contains(&import.method_name.as_str()) {
                continue;
            }
            emitted.push(import.method_name.as_str());
            code.push_str(&format!(
                "    /// `{}.{}`\n    {};\n",
                import.module,
                import.name,
                method_signature(&import.method_name, &import.signature)
            ));
        }
        code.push_str("}\n\n");
    }

    if module.import_traits.is_empty() {
        code.push_str("/// The module imports nothing; any host type will do.\npub trait Imports {}\nimpl<T> Imports for T {}\n\n");
    } else {
        let bounds = module
            .import_traits
            .iter()
            .map(|t| t.trait_name.as_str())
            .collect::<Vec<_>>()
            .join(" + ");
        code.push_str(&format!(
            "/// Every host trait the module imports from.\npub trait Imports: {bounds} {{}}\nimpl<T: {bounds}> Imports for T {{}}\n\n"
        ));
    }
    code
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::NumKind;

    #[test]
    fn method_takes_memory_then_params() {
        let sig = FuncSignature::new(vec![NumKind::I32, NumKind::F64], vec![NumKind::I64]);
        assert_eq!(
            method_signature("value_get", &sig),
            "fn value_get(&mut self, memory: &mut LinearMemory, a0: i32, a1: f64) -> WasmResult<i64>"
        );
        assert_eq!(
            method_signature("getsp", &FuncSignature::default()),
            "fn getsp(&mut self, memory: &mut LinearMemory) -> WasmResult<()>"
        );
    }
}
