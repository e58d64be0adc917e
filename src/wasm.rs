//! Structural view of the input wasm binary: imports grouped by module,
//! exports, memory definitions, and the call-ctors flag.

use crate::requirements::RequirementsTable;
use crate::symbol_table::{Definition, SymbolKind, SymbolTable};
use anyhow::{bail, Context, Result};
use js_ast::{Expr, PropKey, Property, Stmt};
use wasmparser::{ExternalKind, Parser, Payload, TypeRef, Validator};

/// The wasm import-module name whose imports are fulfilled by the symbols
/// object. The same specifier is the reserved module name symbol imports in
/// user JS files are written against.
pub const SYMBOLS_MODULE: &str = "symbols";

/// Conventional export that runs C++-style static constructors.
pub const CALL_CTORS_SYMBOL: &str = "__wasm_call_ctors";

/// Page limits of a memory, as they appear in a `WebAssembly.Memory`
/// descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WasmLimits {
    pub min: u32,
    pub max: Option<u32>,
}

/// A memory the output script must construct and hand to wasm as an import.
#[derive(Debug, Clone)]
pub struct MemoryDefinition {
    pub name: String,
    pub limits: WasmLimits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WasmObjectKind {
    Function,
    Global,
    Memory,
    Table,
    Tag,
}

#[derive(Debug)]
struct WasmExport {
    name: String,
    kind: WasmObjectKind,
}

/// The linker's view of the input binary.
pub struct WasmFile {
    file_name: String,
    /// Non-symbols import module names, in first-appearance order.
    import_modules: Vec<String>,
    exports: Vec<WasmExport>,
    memory_definitions: Vec<MemoryDefinition>,
    needs_external_call_ctors: bool,
}

impl WasmFile {
    /// Parses and validates the binary, registering its boundary-crossing
    /// names: imports under [`SYMBOLS_MODULE`] become symbol references (or
    /// memory definitions), imports under any other module register a
    /// requirement, and exports define symbols.
    pub fn parse(
        file_name: &str,
        bytes: &[u8],
        symbol_table: &mut SymbolTable,
        requirements: &mut RequirementsTable,
    ) -> Result<WasmFile> {
        Validator::new()
            .validate_all(bytes)
            .with_context(|| format!("failed to validate wasm module `{file_name}`"))?;

        log::debug!("parsing wasm module `{file_name}`");

        let mut import_modules = Vec::new();
        let mut exports = Vec::new();
        let mut memory_definitions = Vec::new();
        let mut saw_call_ctors = false;
        let mut has_start = false;

        for payload in Parser::new(0).parse_all(bytes) {
            match payload? {
                Payload::ImportSection(section) => {
                    for import in section {
                        let import = import?;
                        if import.module != SYMBOLS_MODULE {
                            if !import_modules.iter().any(|m| m == import.module) {
                                import_modules.push(import.module.to_string());
                                requirements.register(import.module);
                            }
                            continue;
                        }
                        match import.ty {
                            TypeRef::Func(_) | TypeRef::Global(_) => {
                                symbol_table.reference(import.name);
                            }
                            TypeRef::Memory(memory) => {
                                if memory.memory64 {
                                    bail!(
                                        "imported memory `{}` uses 64-bit addressing, which has \
                                         no JS representation",
                                        import.name
                                    );
                                }
                                if memory.shared {
                                    bail!("imported memory `{}` must not be shared", import.name);
                                }
                                let limits = WasmLimits {
                                    min: u32::try_from(memory.initial)
                                        .context("memory minimum exceeds the 32-bit page space")?,
                                    max: match memory.maximum {
                                        Some(max) => Some(u32::try_from(max).context(
                                            "memory maximum exceeds the 32-bit page space",
                                        )?),
                                        None => None,
                                    },
                                };
                                symbol_table.define(
                                    import.name,
                                    Definition::MemoryDefinition,
                                    Some(SymbolKind::Memory),
                                )?;
                                memory_definitions.push(MemoryDefinition {
                                    name: import.name.to_string(),
                                    limits,
                                });
                            }
                            TypeRef::Table(_) | TypeRef::Tag(_) => bail!(
                                "wasm import `{}` has a kind the symbols module cannot supply",
                                import.name
                            ),
                        }
                    }
                }
                Payload::ExportSection(section) => {
                    for export in section {
                        let export = export?;
                        if export.name == CALL_CTORS_SYMBOL {
                            saw_call_ctors = true;
                            continue;
                        }
                        let kind = match export.kind {
                            ExternalKind::Func => WasmObjectKind::Function,
                            ExternalKind::Global => WasmObjectKind::Global,
                            ExternalKind::Memory => WasmObjectKind::Memory,
                            ExternalKind::Table => WasmObjectKind::Table,
                            ExternalKind::Tag => WasmObjectKind::Tag,
                        };
                        symbol_table.define(
                            export.name,
                            Definition::WasmExport,
                            Some(match kind {
                                WasmObjectKind::Function => SymbolKind::Function,
                                WasmObjectKind::Memory => SymbolKind::Memory,
                                _ => SymbolKind::Value,
                            }),
                        )?;
                        exports.push(WasmExport {
                            name: export.name.to_string(),
                            kind,
                        });
                    }
                }
                Payload::StartSection { .. } => has_start = true,
                _ => {}
            }
        }

        Ok(WasmFile {
            file_name: file_name.to_string(),
            import_modules,
            exports,
            memory_definitions,
            // With a start section the ctors already ran during
            // instantiation; otherwise the generated script must call them.
            needs_external_call_ctors: saw_call_ctors && !has_start,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn memory_definitions(&self) -> &[MemoryDefinition] {
        &self.memory_definitions
    }

    pub fn needs_external_call_ctors(&self) -> bool {
        self.needs_external_call_ctors
    }

    /// Appends the wasm import-object properties for import modules other
    /// than the symbols module, each fulfilled by its requirement's factory
    /// parameter.
    pub fn append_imports(
        &self,
        properties: &mut Vec<Property>,
        requirements: &RequirementsTable,
    ) -> Result<()> {
        for module in &self.import_modules {
            let requirement = match requirements.get(module) {
                Some(r) => r,
                None => bail!("wasm import module `{module}` has no registered requirement"),
            };
            properties.push(Property::KeyValue {
                key: PropKey::Str(module.clone()),
                value: Expr::ident(&requirement.variable),
            });
        }
        Ok(())
    }

    /// Wires each wasm export into the symbols object: functions through the
    /// trap-guarding wrapper, everything else directly off the raw exports.
    pub fn append_exports(
        &self,
        statements: &mut Vec<Stmt>,
        symbols_var: &str,
        exports_var: &str,
        wrapper_fn: &str,
    ) {
        for export in &self.exports {
            let value = match export.kind {
                WasmObjectKind::Function => Expr::call(
                    Expr::ident(wrapper_fn),
                    vec![Expr::str(export.name.clone())],
                ),
                _ => Expr::computed_member(
                    Expr::ident(exports_var),
                    Expr::str(export.name.clone()),
                ),
            };
            statements.push(Stmt::Expr(Expr::assign(
                Expr::computed_member(Expr::ident(symbols_var), Expr::str(export.name.clone())),
                value,
            )));
        }
    }
}
