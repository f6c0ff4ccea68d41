//! Module decoding on top of `wasmparser`.
//!
//! Extracts the sections the translator needs (types, imports, functions,
//! table, memory, globals, exports, elements, data and the `name` custom
//! section) into plain owned structs. Function bodies are kept as raw
//! operator bytes and decoded later, per function, by [`crate::ir::decode`].

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use wasmparser::{
    Encoding, ExternalKind, FuncType, KnownCustom, Name, Operator, Parser, Payload, TypeRef,
    ValType,
};

/// Declared limits of the module's memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryInfo {
    pub initial_pages: u32,
    pub maximum_pages: Option<u32>,
    /// The memory came from the import section instead of being defined.
    pub imported: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableInfo {
    pub initial_size: u32,
    pub max_size: Option<u32>,
}

/// A constant initializer (`i32.const` and friends).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InitValue {
    I32(i32),
    I64(i64),
    F32(u32),
    F64(u64),
}

#[derive(Debug, Clone)]
pub struct GlobalInfo {
    pub val_type: ValType,
    pub mutable: bool,
    pub init_value: InitValue,
}

/// Active element segment for table 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSegment {
    pub offset: u32,
    pub func_indices: Vec<u32>,
}

/// Active data segment for memory 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSegment {
    pub offset: u32,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Func,
    Table,
    Memory,
    Global,
}

#[derive(Debug, Clone)]
pub struct ExportInfo {
    pub name: String,
    pub kind: ExportKind,
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportKind {
    /// Type-section index of the imported function.
    Function(u32),
    Global { val_type: ValType, mutable: bool },
    Memory,
    Table,
}

#[derive(Debug, Clone)]
pub struct ImportInfo {
    pub module: String,
    pub name: String,
    pub kind: ImportKind,
}

/// A defined function: its type index, declared locals and operator bytes.
#[derive(Debug, Clone)]
pub struct ParsedFunction {
    pub type_idx: u32,
    pub locals: Vec<ValType>,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedModule {
    pub types: Vec<FuncType>,
    pub imports: Vec<ImportInfo>,
    pub functions: Vec<ParsedFunction>,
    pub table: Option<TableInfo>,
    pub memory: Option<MemoryInfo>,
    /// Defined globals only; imported ones are in `imports`.
    pub globals: Vec<GlobalInfo>,
    pub exports: Vec<ExportInfo>,
    pub start: Option<u32>,
    pub element_segments: Vec<ElementSegment>,
    pub data_segments: Vec<DataSegment>,
    /// Function names from the `name` section, keyed by function index.
    pub function_names: HashMap<u32, String>,
    pub num_imported_functions: u32,
    pub num_imported_globals: u32,
}

impl ParsedModule {
    /// Signature type index of any function in the function index space.
    pub fn func_type_index(&self, func: u32) -> Option<u32> {
        if func < self.num_imported_functions {
            self.imports
                .iter()
                .filter_map(|import| match import.kind {
                    ImportKind::Function(ty) => Some(ty),
                    _ => None,
                })
                .nth(func as usize)
        } else {
            self.functions
                .get((func - self.num_imported_functions) as usize)
                .map(|f| f.type_idx)
        }
    }
}

fn eval_const_expr(expr: wasmparser::ConstExpr) -> Result<InitValue> {
    let mut reader = expr.get_operators_reader();
    let op = reader.read().context("reading const expr operator")?;
    Ok(match op {
        Operator::I32Const { value } => InitValue::I32(value),
        Operator::I64Const { value } => InitValue::I64(value),
        Operator::F32Const { value } => InitValue::F32(value.bits()),
        Operator::F64Const { value } => InitValue::F64(value.bits()),
        other => bail!("unsupported constant expression: {other:?}"),
    })
}

fn const_offset(expr: wasmparser::ConstExpr, what: &str) -> Result<u32> {
    match eval_const_expr(expr)? {
        InitValue::I32(v) => Ok(v as u32),
        other => bail!("{what} offset must be an i32 constant, got {other:?}"),
    }
}

fn parse_element(element: wasmparser::Element) -> Result<Option<ElementSegment>> {
    let wasmparser::ElementKind::Active {
        table_index,
        offset_expr,
    } = element.kind
    else {
        // Passive and declared segments never touch the table at start-up.
        return Ok(None);
    };
    if let Some(index) = table_index.filter(|&t| t != 0) {
        bail!("element segment targets table {index}; only table 0 is supported");
    }
    let offset = const_offset(offset_expr, "element segment")?;
    let func_indices = match element.items {
        wasmparser::ElementItems::Functions(funcs) => funcs
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .context("reading element function indices")?,
        wasmparser::ElementItems::Expressions(..) => {
            bail!("expression-based element segments are not supported")
        }
    };
    Ok(Some(ElementSegment {
        offset,
        func_indices,
    }))
}

fn parse_data(data: wasmparser::Data) -> Result<Option<DataSegment>> {
    match data.kind {
        wasmparser::DataKind::Active {
            memory_index: 0,
            offset_expr,
        } => Ok(Some(DataSegment {
            offset: const_offset(offset_expr, "data segment")?,
            data: data.data.to_vec(),
        })),
        wasmparser::DataKind::Active { memory_index, .. } => {
            bail!("data segment targets memory {memory_index}; only memory 0 is supported")
        }
        wasmparser::DataKind::Passive => Ok(None),
    }
}

fn parse_code_entry(body: wasmparser::FunctionBody, type_idx: u32) -> Result<ParsedFunction> {
    let mut locals = Vec::new();
    for local in body.get_locals_reader().context("getting locals reader")? {
        let (count, ty) = local.context("reading local declaration")?;
        locals.extend(std::iter::repeat(ty).take(count as usize));
    }

    let mut reader = body
        .get_operators_reader()
        .context("getting operators reader")?
        .get_binary_reader();
    let remaining = reader.bytes_remaining();
    let bytes = reader
        .read_bytes(remaining)
        .context("reading function body")?;

    Ok(ParsedFunction {
        type_idx,
        locals,
        body: bytes.to_vec(),
    })
}

fn parse_names(reader: wasmparser::NameSectionReader, names: &mut HashMap<u32, String>) {
    // A damaged name section only costs us doc comments.
    for subsection in reader {
        let Ok(Name::Function(map)) = subsection else {
            continue;
        };
        for naming in map.into_iter().flatten() {
            names.insert(naming.index, naming.name.to_string());
        }
    }
}

/// Decode a binary module.
pub fn parse_wasm(wasm_bytes: &[u8]) -> Result<ParsedModule> {
    let mut module = ParsedModule::default();
    let mut function_types: Vec<u32> = Vec::new();

    for payload in Parser::new(0).parse_all(wasm_bytes) {
        match payload.context("parsing wasm payload")? {
            Payload::Version { num, encoding, .. } => {
                if encoding != Encoding::Module || num != 1 {
                    bail!("unsupported wasm binary: {encoding:?} version {num}, expected a core module");
                }
            }

            Payload::TypeSection(reader) => {
                for rec_group in reader {
                    let rec_group = rec_group.context("reading rec group")?;
                    for sub_type in rec_group.types() {
                        if let wasmparser::CompositeInnerType::Func(func_ty) =
                            &sub_type.composite_type.inner
                        {
                            module.types.push(func_ty.clone());
                        }
                    }
                }
            }

            Payload::ImportSection(reader) => {
                for import in reader {
                    let import = import.context("reading import")?;
                    let kind = match import.ty {
                        TypeRef::Func(ty) => {
                            module.num_imported_functions += 1;
                            ImportKind::Function(ty)
                        }
                        TypeRef::Global(ty) => {
                            module.num_imported_globals += 1;
                            ImportKind::Global {
                                val_type: ty.content_type,
                                mutable: ty.mutable,
                            }
                        }
                        TypeRef::Memory(ty) => {
                            module.memory = Some(MemoryInfo {
                                initial_pages: ty.initial as u32,
                                maximum_pages: ty.maximum.map(|m| m as u32),
                                imported: true,
                            });
                            ImportKind::Memory
                        }
                        TypeRef::Table(ty) => {
                            module.table = Some(TableInfo {
                                initial_size: ty.initial as u32,
                                max_size: ty.maximum.map(|m| m as u32),
                            });
                            ImportKind::Table
                        }
                        _ => bail!(
                            "unsupported import kind for {}.{}",
                            import.module,
                            import.name
                        ),
                    };
                    module.imports.push(ImportInfo {
                        module: import.module.to_string(),
                        name: import.name.to_string(),
                        kind,
                    });
                }
            }

            Payload::FunctionSection(reader) => {
                for ty in reader {
                    function_types.push(ty.context("reading function type index")?);
                }
            }

            Payload::TableSection(reader) => {
                if let Some(table) = reader.into_iter().next() {
                    let table = table.context("reading table")?;
                    module.table = Some(TableInfo {
                        initial_size: table.ty.initial as u32,
                        max_size: table.ty.maximum.map(|m| m as u32),
                    });
                }
            }

            Payload::MemorySection(reader) => {
                if let Some(memory) = reader.into_iter().next() {
                    let memory = memory.context("reading memory")?;
                    module.memory = Some(MemoryInfo {
                        initial_pages: memory.initial as u32,
                        maximum_pages: memory.maximum.map(|m| m as u32),
                        imported: false,
                    });
                }
            }

            Payload::GlobalSection(reader) => {
                for global in reader {
                    let global = global.context("reading global")?;
                    module.globals.push(GlobalInfo {
                        val_type: global.ty.content_type,
                        mutable: global.ty.mutable,
                        init_value: eval_const_expr(global.init_expr)?,
                    });
                }
            }

            Payload::ExportSection(reader) => {
                for export in reader {
                    let export = export.context("reading export")?;
                    let kind = match export.kind {
                        ExternalKind::Func => ExportKind::Func,
                        ExternalKind::Table => ExportKind::Table,
                        ExternalKind::Memory => ExportKind::Memory,
                        ExternalKind::Global => ExportKind::Global,
                        ExternalKind::Tag => continue,
                    };
                    module.exports.push(ExportInfo {
                        name: export.name.to_string(),
                        kind,
                        index: export.index,
                    });
                }
            }

            Payload::StartSection { func, .. } => module.start = Some(func),

            Payload::ElementSection(reader) => {
                for element in reader {
                    let element = element.context("reading element segment")?;
                    if let Some(segment) = parse_element(element)? {
                        module.element_segments.push(segment);
                    }
                }
            }

            Payload::DataSection(reader) => {
                for data in reader {
                    let data = data.context("reading data segment")?;
                    if let Some(segment) = parse_data(data)? {
                        module.data_segments.push(segment);
                    }
                }
            }

            Payload::CodeSectionEntry(body) => {
                let index = module.functions.len();
                let type_idx = *function_types
                    .get(index)
                    .with_context(|| format!("code entry {index} has no function declaration"))?;
                let function = parse_code_entry(body, type_idx)
                    .with_context(|| format!("reading code entry {index}"))?;
                module.functions.push(function);
            }

            Payload::CustomSection(reader) => {
                if let KnownCustom::Name(names) = reader.as_known() {
                    parse_names(names, &mut module.function_names);
                }
            }

            _ => {}
        }
    }

    if module.functions.len() != function_types.len() {
        bail!(
            "function section declares {} functions but the code section has {}",
            function_types.len(),
            module.functions.len()
        );
    }

    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(wat: &str) -> ParsedModule {
        parse_wasm(&wat::parse_str(wat).unwrap()).unwrap()
    }

    #[test]
    fn empty_module() {
        let module = parse("(module)");
        assert!(module.types.is_empty());
        assert!(module.functions.is_empty());
        assert!(module.memory.is_none());
    }

    #[test]
    fn function_locals_are_expanded() {
        let module = parse(
            r#"(module
                (func (param i32) (result i32)
                    (local i64 i64 f32)
                    local.get 0))"#,
        );
        assert_eq!(module.functions.len(), 1);
        assert_eq!(
            module.functions[0].locals,
            vec![ValType::I64, ValType::I64, ValType::F32]
        );
        assert!(!module.functions[0].body.is_empty());
    }

    #[test]
    fn memory_and_data() {
        let module = parse(
            r#"(module
                (memory 2 10)
                (data (i32.const 16) "Hello"))"#,
        );
        assert_eq!(
            module.memory,
            Some(MemoryInfo {
                initial_pages: 2,
                maximum_pages: Some(10),
                imported: false
            })
        );
        assert_eq!(
            module.data_segments,
            vec![DataSegment {
                offset: 16,
                data: b"Hello".to_vec()
            }]
        );
    }

    #[test]
    fn imported_memory_is_recorded() {
        let module = parse(r#"(module (import "env" "mem" (memory 1)))"#);
        assert!(module.memory.unwrap().imported);
        assert_eq!(module.imports[0].kind, ImportKind::Memory);
    }

    #[test]
    fn globals_keep_float_bits() {
        let module = parse(
            r#"(module
                (global (mut i32) (i32.const 42))
                (global f64 (f64.const -0.0)))"#,
        );
        assert!(module.globals[0].mutable);
        assert_eq!(module.globals[0].init_value, InitValue::I32(42));
        assert!(!module.globals[1].mutable);
        assert_eq!(
            module.globals[1].init_value,
            InitValue::F64((-0.0f64).to_bits())
        );
    }

    #[test]
    fn go_style_imports() {
        let module = parse(
            r#"(module
                (import "gojs" "runtime.wasmExit" (func (param i32)))
                (import "gojs" "syscall/js.valueGet" (func (param i32)))
                (import "env" "counter" (global i32))
                (func (param i32) local.get 0 call 0))"#,
        );
        assert_eq!(module.num_imported_functions, 2);
        assert_eq!(module.num_imported_globals, 1);
        assert_eq!(module.imports[1].module, "gojs");
        assert_eq!(module.imports[1].name, "syscall/js.valueGet");
        assert_eq!(module.func_type_index(0), Some(0));
        assert_eq!(module.func_type_index(2), Some(0));
        assert_eq!(module.func_type_index(3), None);
    }

    #[test]
    fn exports_table_and_elements() {
        let module = parse(
            r#"(module
                (type $t (func (result i32)))
                (table 4 funcref)
                (func $one (type $t) i32.const 1)
                (func $two (type $t) i32.const 2)
                (elem (i32.const 1) $one $two)
                (export "one" (func $one))
                (start $two))"#,
        );
        assert_eq!(
            module.table,
            Some(TableInfo {
                initial_size: 4,
                max_size: None
            })
        );
        assert_eq!(
            module.element_segments,
            vec![ElementSegment {
                offset: 1,
                func_indices: vec![0, 1]
            }]
        );
        assert_eq!(module.exports[0].name, "one");
        assert_eq!(module.exports[0].kind, ExportKind::Func);
        assert_eq!(module.start, Some(1));
    }

    #[test]
    fn name_section_function_names() {
        let module = parse(
            r#"(module
                (import "env" "log" (func $log (param i32)))
                (func $main.main)
                (func $runtime.alloc (result i32) i32.const 0))"#,
        );
        assert_eq!(module.function_names.get(&0).map(String::as_str), Some("log"));
        assert_eq!(
            module.function_names.get(&1).map(String::as_str),
            Some("main.main")
        );
        assert_eq!(
            module.function_names.get(&2).map(String::as_str),
            Some("runtime.alloc")
        );
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_wasm(b"not wasm").is_err());
    }

    #[test]
    fn only_version_one_core_modules_are_accepted() {
        assert!(parse_wasm(b"\0asm\x01\0\0\0").is_ok());
        for header in [&b"\0asm\x02\0\0\0"[..], &b"\0asm\x0d\0\x01\0"[..]] {
            let err = parse_wasm(header).unwrap_err();
            assert!(format!("{err:#}").contains("wasm"), "{err:#}");
        }
    }
}
