//! Module assembly: translate every function and bind module-level entities.
//!
//! Function bodies are independent, so translation fans out over scoped
//! threads and fans back in (in function order) before the bindings that
//! code generation consumes are built.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::thread;

use anyhow::{anyhow, bail, Context, Result};
use heck::{ToSnakeCase, ToUpperCamelCase};

use crate::ir::{decode, ConstValue, FuncSignature, NumKind};
use crate::parser::{DataSegment, ExportKind, ImportKind, InitValue, ParsedFunction, ParsedModule};
use crate::translate::{
    init_kind, translate_function, with_function_context, FunctionBody, ModuleContext,
    TranslatedFunction,
};
use crate::TranspileOptions;

/// Host trait grouping the imports of one import module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportTrait {
    /// Wasm import module name (`gojs`, `env`, ...).
    pub module: String,
    pub trait_name: String,
}

/// Imported function, as a host trait method.
#[derive(Debug, Clone)]
pub struct ImportBinding {
    pub func: u32,
    pub module: String,
    pub name: String,
    pub trait_name: String,
    pub method_name: String,
    pub signature: FuncSignature,
}

/// Defined function.
#[derive(Debug, Clone)]
pub struct FunctionBinding {
    pub index: u32,
    pub ident: String,
    /// From the `name` section, when present.
    pub name: Option<String>,
    pub canonical_type: u32,
    pub translated: TranslatedFunction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportBinding {
    Function {
        name: String,
        method: String,
        func: u32,
    },
    Global {
        name: String,
        method: String,
        global: u32,
    },
    Memory {
        name: String,
        method: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalBinding {
    pub index: u32,
    pub field: String,
    pub kind: NumKind,
    pub mutable: bool,
    pub init: ConstValue,
}

#[derive(Debug, Clone)]
pub struct MemoryLayout {
    pub initial_pages: u32,
    pub maximum_pages: Option<u32>,
    pub data: Vec<DataSegment>,
}

/// Table size and its element segments as `(base, [(canonical type, func)])`.
#[derive(Debug, Clone)]
pub struct TableLayout {
    pub initial_size: u32,
    pub max_size: Option<u32>,
    pub elements: Vec<(u32, Vec<(u32, u32)>)>,
}

#[derive(Debug, Clone)]
pub struct AssembledModule {
    pub context: ModuleContext,
    pub import_traits: Vec<ImportTrait>,
    pub imports: Vec<ImportBinding>,
    pub functions: Vec<FunctionBinding>,
    pub exports: Vec<ExportBinding>,
    pub globals: Vec<GlobalBinding>,
    pub memory: Option<MemoryLayout>,
    pub table: Option<TableLayout>,
    pub start: Option<u32>,
}

impl AssembledModule {
    pub fn import(&self, func: u32) -> Option<&ImportBinding> {
        self.imports.iter().find(|i| i.func == func)
    }

    pub fn global(&self, index: u32) -> Option<&GlobalBinding> {
        self.globals.get(index as usize)
    }

    /// Every function index that can be reached through the table.
    pub fn table_functions(&self) -> Vec<u32> {
        let mut funcs: Vec<u32> = self
            .table
            .iter()
            .flat_map(|t| &t.elements)
            .flat_map(|(_, entries)| entries.iter().map(|&(_, func)| func))
            .collect();
        funcs.sort_unstable();
        funcs.dedup();
        funcs
    }
}

const RESERVED: &[&str] = &[
    "as", "async", "await", "box", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
    "mut", "new", "priv", "pub", "ref", "return", "self", "static", "struct", "super", "trait",
    "true", "try", "type", "unsafe", "use", "where", "while", "yield",
];

/// A snake_case Rust identifier for a wasm name.
pub fn method_ident(name: &str) -> String {
    let mut ident = name.to_snake_case();
    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    if RESERVED.contains(&ident.as_str()) {
        ident.push('_');
    }
    ident
}

/// `gojs` -> `GojsImports`.
pub fn trait_ident(module: &str) -> String {
    let base = module.to_upper_camel_case();
    if base.is_empty() || base.starts_with(|c: char| c.is_ascii_digit()) {
        format!("M{base}Imports")
    } else {
        format!("{base}Imports")
    }
}

/// Make `ident` unique within `taken` by appending a counter.
fn unique(ident: String, taken: &mut HashSet<String>) -> String {
    let mut candidate = ident.clone();
    let mut n = 1;
    while !taken.insert(candidate.clone()) {
        candidate = format!("{ident}_{n}");
        n += 1;
    }
    candidate
}

fn const_value(value: InitValue) -> ConstValue {
    match value {
        InitValue::I32(v) => ConstValue::I32(v),
        InitValue::I64(v) => ConstValue::I64(v),
        InitValue::F32(bits) => ConstValue::F32(bits),
        InitValue::F64(bits) => ConstValue::F64(bits),
    }
}

fn zero(kind: NumKind) -> ConstValue {
    match kind {
        NumKind::I32 => ConstValue::I32(0),
        NumKind::I64 => ConstValue::I64(0),
        NumKind::F32 => ConstValue::F32(0),
        NumKind::F64 => ConstValue::F64(0),
    }
}

fn function_body(
    module: &ParsedModule,
    ctx: &ModuleContext,
    local_index: usize,
    function: &ParsedFunction,
) -> Result<FunctionBody> {
    let index = module.num_imported_functions + local_index as u32;
    let locals = function
        .locals
        .iter()
        .map(|&ty| NumKind::from_val_type(ty))
        .collect::<Result<Vec<_>>>()?;
    Ok(FunctionBody {
        index,
        signature: ctx.functions[index as usize].clone(),
        locals,
        instructions: decode(&function.body)?,
    })
}

fn translate_one(
    module: &ParsedModule,
    ctx: &ModuleContext,
    local_index: usize,
    function: &ParsedFunction,
) -> Result<TranslatedFunction> {
    let index = module.num_imported_functions + local_index as u32;
    let name = module.function_names.get(&index).map(String::as_str);
    let body = function_body(module, ctx, local_index, function).with_context(|| {
        format!("decoding function {index}")
    })?;
    let translated = with_function_context(translate_function(&body, ctx), index, name)?;
    log::debug!(
        "translated function {index}{}: {} statements, {} blocks, {} slots",
        name.map(|n| format!(" ({n})")).unwrap_or_default(),
        translated.statements.len(),
        translated.block_count(),
        translated.slot_kinds.len()
    );
    Ok(translated)
}

/// Translate all defined functions, in function order.
pub fn translate_all(
    module: &ParsedModule,
    ctx: &ModuleContext,
    parallel: bool,
) -> Result<Vec<TranslatedFunction>> {
    let functions: Vec<(usize, &ParsedFunction)> = module.functions.iter().enumerate().collect();
    let workers = thread::available_parallelism().map_or(1, |n| n.get());
    if !parallel || workers < 2 || functions.len() < 2 {
        return functions
            .iter()
            .map(|&(i, f)| translate_one(module, ctx, i, f))
            .collect();
    }

    let chunk_size = functions.len().div_ceil(workers);
    log::debug!(
        "translating {} functions on {} threads",
        functions.len(),
        functions.len().div_ceil(chunk_size)
    );
    thread::scope(|scope| {
        let handles: Vec<_> = functions
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|&(i, f)| translate_one(module, ctx, i, f))
                        .collect::<Result<Vec<_>>>()
                })
            })
            .collect();

        let mut translated = Vec::with_capacity(functions.len());
        for handle in handles {
            let part = handle
                .join()
                .map_err(|_| anyhow!("translation worker panicked"))??;
            translated.extend(part);
        }
        Ok(translated)
    })
}

fn bind_imports(module: &ParsedModule, ctx: &ModuleContext) -> (Vec<ImportTrait>, Vec<ImportBinding>) {
    let mut traits: Vec<ImportTrait> = Vec::new();
    let mut methods: HashMap<String, HashSet<String>> = HashMap::new();
    let mut seen: HashMap<(String, String), String> = HashMap::new();
    let mut bindings = Vec::new();

    let functions = module
        .imports
        .iter()
        .filter(|import| matches!(import.kind, ImportKind::Function(_)));
    for (func, import) in functions.enumerate() {
        let trait_name = trait_ident(&import.module);
        if !traits.iter().any(|t| t.module == import.module) {
            traits.push(ImportTrait {
                module: import.module.clone(),
                trait_name: trait_name.clone(),
            });
        }
        let key = (import.module.clone(), import.name.clone());
        let method_name = match seen.get(&key) {
            Some(existing) => existing.clone(),
            None => {
                let taken = methods.entry(import.module.clone()).or_default();
                let method = unique(method_ident(&import.name), taken);
                seen.insert(key, method.clone());
                method
            }
        };
        bindings.push(ImportBinding {
            func: func as u32,
            module: import.module.clone(),
            name: import.name.clone(),
            trait_name,
            method_name,
            signature: ctx.functions[func].clone(),
        });
    }
    (traits, bindings)
}

fn bind_globals(module: &ParsedModule) -> Result<Vec<GlobalBinding>> {
    let mut globals = Vec::new();
    for import in &module.imports {
        if let ImportKind::Global { val_type, mutable } = import.kind {
            let kind = NumKind::from_val_type(val_type)?;
            log::warn!(
                "imported global {}.{} becomes a module-owned global initialised to zero",
                import.module,
                import.name
            );
            globals.push((kind, mutable, zero(kind)));
        }
    }
    for global in &module.globals {
        let kind = NumKind::from_val_type(global.val_type)?;
        if init_kind(global.init_value) != kind {
            bail!(
                "global {} is {kind} but its initializer is {:?}",
                globals.len(),
                global.init_value
            );
        }
        globals.push((kind, global.mutable, const_value(global.init_value)));
    }
    Ok(globals
        .into_iter()
        .enumerate()
        .map(|(i, (kind, mutable, init))| GlobalBinding {
            index: i as u32,
            field: format!("g{i}"),
            kind,
            mutable,
            init,
        })
        .collect())
}

fn bind_exports(module: &ParsedModule) -> Result<Vec<ExportBinding>> {
    let mut taken: HashSet<String> = ["module", "host", "new"]
        .into_iter()
        .map(String::from)
        .collect();
    let mut exports = Vec::new();
    for export in &module.exports {
        let method = unique(method_ident(&export.name), &mut taken);
        let name = export.name.clone();
        match export.kind {
            ExportKind::Func => {
                if export.index < module.num_imported_functions {
                    bail!(
                        "export `{}` re-exports imported function {}; not supported",
                        export.name,
                        export.index
                    );
                }
                exports.push(ExportBinding::Function {
                    name,
                    method,
                    func: export.index,
                });
            }
            ExportKind::Global => exports.push(ExportBinding::Global {
                name,
                method,
                global: export.index,
            }),
            ExportKind::Memory => exports.push(ExportBinding::Memory { name, method }),
            ExportKind::Table => {
                log::warn!("table export `{}` is not exposed", export.name);
            }
        }
    }
    Ok(exports)
}

fn table_layout(module: &ParsedModule, ctx: &ModuleContext) -> Result<Option<TableLayout>> {
    let Some(table) = module.table else {
        if !module.element_segments.is_empty() {
            bail!("element segments without a table");
        }
        return Ok(None);
    };
    let mut elements = Vec::new();
    for segment in &module.element_segments {
        let entries = segment
            .func_indices
            .iter()
            .map(|&func| {
                let ty = module
                    .func_type_index(func)
                    .with_context(|| format!("element refers to missing function {func}"))?;
                Ok((ctx.canonical_types[ty as usize], func))
            })
            .collect::<Result<Vec<_>>>()?;
        elements.push((segment.offset, entries));
    }
    Ok(Some(TableLayout {
        initial_size: table.initial_size,
        max_size: table.max_size,
        elements,
    }))
}

/// Translate and bind a decoded module.
pub fn assemble(module: &ParsedModule, options: &TranspileOptions) -> Result<AssembledModule> {
    let context = ModuleContext::from_module(module).context("building module context")?;
    let translated = translate_all(module, &context, options.parallel)?;

    let functions = translated
        .into_iter()
        .zip(&module.functions)
        .map(|(translated, parsed)| FunctionBinding {
            index: translated.index,
            ident: format!("func_{}", translated.index),
            name: module.function_names.get(&translated.index).cloned(),
            canonical_type: context.canonical_types[parsed.type_idx as usize],
            translated,
        })
        .collect();

    let (import_traits, imports) = bind_imports(module, &context);

    let memory = module.memory.map(|memory| {
        if memory.imported {
            log::warn!(
                "imported memory becomes a module-owned memory of {} page(s)",
                memory.initial_pages
            );
        }
        MemoryLayout {
            initial_pages: memory.initial_pages,
            maximum_pages: memory.maximum_pages,
            data: module.data_segments.clone(),
        }
    });
    if memory.is_none() && !module.data_segments.is_empty() {
        bail!("data segments without a memory");
    }

    if let Some(start) = module.start {
        let sig = context
            .functions
            .get(start as usize)
            .with_context(|| format!("start function {start} does not exist"))?;
        if !sig.params.is_empty() || !sig.results.is_empty() {
            bail!("start function {start} must take and return nothing");
        }
    }

    let assembled = AssembledModule {
        table: table_layout(module, &context)?,
        globals: bind_globals(module)?,
        exports: bind_exports(module)?,
        context,
        import_traits,
        imports,
        functions,
        memory,
        start: module.start,
    };

    let by_module: BTreeMap<&str, usize> =
        assembled
            .imports
            .iter()
            .fold(BTreeMap::new(), |mut acc, import| {
                *acc.entry(import.module.as_str()).or_default() += 1;
                acc
            });
    log::info!(
        "assembled {} functions, {} imports {:?}, {} exports",
        assembled.functions.len(),
        assembled.imports.len(),
        by_module,
        assembled.exports.len()
    );
    Ok(assembled)
}
