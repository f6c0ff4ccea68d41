//! Module-level items: globals, static data, the instance type and its
//! constructor.

use std::fmt::Write as _;

use anyhow::{Context, Result};

use crate::assemble::AssembledModule;

/// `b"..."` literal for raw segment bytes.
pub fn byte_string(data: &[u8]) -> String {
    let mut literal = String::with_capacity(data.len() + 3);
    literal.push_str("b\"");
    for &byte in data {
        for escaped in std::ascii::escape_default(byte) {
            literal.push(escaped as char);
        }
    }
    literal.push('"');
    literal
}

/// Mutable globals as fields of `Globals`, immutable ones as `const G{i}`.
pub fn generate_globals(module: &AssembledModule) -> String {
    let mut code = String::new();
    let mutable: Vec<_> = module.globals.iter().filter(|g| g.mutable).collect();

    code.push_str("#[derive(Debug, Clone, PartialEq)]\npub struct Globals {\n");
    for g in &mutable {
        let _ = writeln!(code, "    pub {}: {},", g.field, g.kind);
    }
    code.push_str("}\n\n");

    code.push_str("impl Default for Globals {\n    fn default() -> Self {\n        Self {\n");
    for g in &mutable {
        let _ = writeln!(code, "            {}: {},", g.field, g.init.to_rust());
    }
    code.push_str("        }\n    }\n}\n\n");

    for g in module.globals.iter().filter(|g| !g.mutable) {
        let _ = writeln!(code, "const G{}: {} = {};", g.index, g.kind, g.init.to_rust());
    }
    if module.globals.iter().any(|g| !g.mutable) {
        code.push('\n');
    }
    code
}

/// Memory and table sizes, data segments and element segments.
pub fn generate_statics(module: &AssembledModule) -> String {
    let mut code = String::new();
    let (pages, data) = match &module.memory {
        Some(memory) => (memory.initial_pages, memory.data.as_slice()),
        None => (0, &[][..]),
    };
    let _ = writeln!(code, "const INITIAL_PAGES: u32 = {pages};");

    code.push_str("static DATA: &[DataSegment<'static>] = &[\n");
    for segment in data {
        let _ = writeln!(
            code,
            "    DataSegment {{ offset: {}, data: {} }},",
            segment.offset,
            byte_string(&segment.data)
        );
    }
    code.push_str("];\n\n");

    let (initial, max) = module
        .table
        .as_ref()
        .map_or((0, None), |t| (t.initial_size, t.max_size));
    let _ = writeln!(code, "const TABLE_INITIAL: u32 = {initial};");
    let _ = writeln!(code, "const TABLE_MAX: Option<u32> = {max:?};");

    code.push_str("static ELEMENTS: &[(u32, &[(u32, u32)])] = &[\n");
    for (base, entries) in module.table.iter().flat_map(|t| &t.elements) {
        let entries = entries
            .iter()
            .map(|(ty, func)| format!("({ty}, {func})"))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(code, "    ({base}, &[{entries}]),");
    }
    code.push_str("];\n\n");
    code
}

/// `WasmModule<H>` and the `new` constructor, which runs the start function.
pub fn generate_instance(module: &AssembledModule) -> Result<String> {
    let mut code = String::new();
    code.push_str(
        "/// One instance: runtime state plus the host implementing the imports.\n\
         pub struct WasmModule<H> {\n    pub module: Module<Globals>,\n    pub host: H,\n}\n\n",
    );
    code.push_str(
        "/// Instantiate the module: memory with data segments, table with elements,\n\
         /// then the start function if there is one.\n\
         pub fn new<H: Imports>(host: H) -> WasmResult<WasmModule<H>> {\n",
    );
    code.push_str(
        "    let module = Module::new(\n        INITIAL_PAGES,\n        DATA,\n        Globals::default(),\n        Table::new(TABLE_INITIAL, TABLE_MAX),\n        ELEMENTS,\n    )?;\n",
    );
    let Some(start) = module.start else {
        code.push_str("    Ok(WasmModule { module, host })\n}\n\n");
        return Ok(code);
    };
    code.push_str("    let mut rt = WasmModule { module, host };\n");
    let call = if module.context.is_import(start) {
        let import = module
            .import(start)
            .with_context(|| format!("start function {start} is not bound"))?;
        format!(
            "<H as {}>::{}(&mut rt.host, &mut rt.module.memory)?",
            import.trait_name, import.method_name
        )
    } else {
        format!("func_{start}(&mut rt)?")
    };
    let _ = writeln!(code, "    {call};");
    code.push_str("    Ok(rt)\n}\n\n");
    Ok(code)
}
