//! The user-provided JS inputs: symbols files and exports files.
//!
//! Both kinds are ES modules whose import/export declarations carry linking
//! information. Imports from the reserved `symbols` module bind boundary
//! symbols; imports from any other specifier declare a requirement on an
//! external module. A symbols file's exports define symbols; an exports
//! file's exports form the output module's public surface.

use crate::generator::ModuleGenerator;
use crate::requirements::RequirementsTable;
use crate::symbol_table::{Definition, SymbolTable};
use crate::wasm::SYMBOLS_MODULE;
use anyhow::{anyhow, bail, Result};
use js_ast::{ExportSpecifier, ImportSpecifier, ModuleItem, Stmt};

/// An import statement naming an external module requirement.
#[derive(Debug)]
pub struct RequirementImport {
    pub module: String,
    pub default_binding: Option<String>,
    pub named: Vec<ImportSpecifier>,
}

/// The parsed, partitioned form shared by both file kinds.
#[derive(Debug)]
struct JsFile {
    name: String,
    body: Vec<Stmt>,
    symbol_imports: Vec<ImportSpecifier>,
    requirement_imports: Vec<RequirementImport>,
    exports: Vec<ExportSpecifier>,
}

impl JsFile {
    fn parse(
        name: &str,
        source: &str,
        symbol_table: &mut SymbolTable,
        requirements: &mut RequirementsTable,
        exports_define_symbols: bool,
    ) -> Result<JsFile> {
        let module = js_ast::parse_module(source)
            .map_err(|e| anyhow!("failed to parse `{name}`: {e}"))?;

        let mut body = Vec::new();
        let mut symbol_imports = Vec::new();
        let mut requirement_imports = Vec::new();
        let mut exports = Vec::new();

        for item in module.items {
            match item {
                ModuleItem::Import(import) => {
                    if import.namespace_binding.is_some() {
                        bail!("`{name}`: namespace imports are not supported");
                    }
                    if import.module == SYMBOLS_MODULE {
                        if import.default_binding.is_some() {
                            bail!(
                                "`{name}`: the `{SYMBOLS_MODULE}` module has no default export"
                            );
                        }
                        for specifier in import.named {
                            symbol_table.reference(specifier.imported_name());
                            symbol_imports.push(specifier);
                        }
                    } else {
                        requirements.register(&import.module);
                        requirement_imports.push(RequirementImport {
                            module: import.module,
                            default_binding: import.default_binding,
                            named: import.named,
                        });
                    }
                }
                ModuleItem::Export(export) => {
                    let specifiers = export.specifiers();
                    if let js_ast::ExportDecl::Decl(stmt) = export {
                        body.push(stmt);
                    }
                    if exports_define_symbols {
                        for specifier in &specifiers {
                            symbol_table.define(
                                &specifier.exported,
                                Definition::JsSymbolsFile,
                                None,
                            )?;
                        }
                    }
                    exports.extend(specifiers);
                }
                ModuleItem::Stmt(stmt) => body.push(stmt),
            }
        }

        log::debug!(
            "parsed `{name}`: {} symbol imports, {} requirement imports, {} exports",
            symbol_imports.len(),
            requirement_imports.len(),
            exports.len()
        );

        Ok(JsFile {
            name: name.to_string(),
            body,
            symbol_imports,
            requirement_imports,
            exports,
        })
    }
}

/// A JS file defining symbols shared with the wasm module.
#[derive(Debug)]
pub struct SymbolsFile {
    inner: JsFile,
}

impl SymbolsFile {
    pub fn parse(
        name: &str,
        source: &str,
        symbol_table: &mut SymbolTable,
        requirements: &mut RequirementsTable,
    ) -> Result<SymbolsFile> {
        Ok(SymbolsFile {
            inner: JsFile::parse(name, source, symbol_table, requirements, true)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Appends this file's contribution: import bindings, the module body,
    /// then its exports wired into the symbols object.
    pub fn append_module(
        &self,
        generator: &ModuleGenerator<'_>,
        statements: &mut Vec<Stmt>,
    ) -> Result<()> {
        generator.append_imports(
            statements,
            &self.inner.symbol_imports,
            &self.inner.requirement_imports,
        )?;
        statements.extend(self.inner.body.iter().cloned());
        generator.append_exports(statements, &self.inner.exports, generator.symbols_var());
        Ok(())
    }
}

/// A JS file whose exports become the output module's exports.
#[derive(Debug)]
pub struct ExportsFile {
    inner: JsFile,
}

impl ExportsFile {
    pub fn parse(
        name: &str,
        source: &str,
        symbol_table: &mut SymbolTable,
        requirements: &mut RequirementsTable,
    ) -> Result<ExportsFile> {
        Ok(ExportsFile {
            inner: JsFile::parse(name, source, symbol_table, requirements, false)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The names this file exposes on the output module.
    pub fn exported_names(&self) -> impl Iterator<Item = &str> {
        self.inner.exports.iter().map(|e| e.exported.as_str())
    }

    /// As [`SymbolsFile::append_module`], but exports land on the exports
    /// object.
    pub fn append_module(
        &self,
        generator: &ModuleGenerator<'_>,
        statements: &mut Vec<Stmt>,
    ) -> Result<()> {
        generator.append_imports(
            statements,
            &self.inner.symbol_imports,
            &self.inner.requirement_imports,
        )?;
        statements.extend(self.inner.body.iter().cloned());
        generator.append_exports(statements, &self.inner.exports, crate::generator::EXPORTS_VAR);
        Ok(())
    }
}
