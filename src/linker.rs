//! The link driver: reads the inputs, builds the tables, runs the generator
//! and prints the output script.

use crate::files::{ExportsFile, SymbolsFile};
use crate::generator::{ModuleGenerator, DEFAULT_EXTERNS};
use crate::requirements::RequirementsTable;
use crate::symbol_table::SymbolTable;
use crate::wasm::WasmFile;
use anyhow::{anyhow, bail, Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// The inputs of one link invocation.
#[derive(Debug, Default)]
pub struct LinkConfig {
    /// The input wasm module.
    pub wasm: PathBuf,

    /// JS files defining symbols shared with the wasm module.
    pub symbols: Vec<PathBuf>,

    /// JS files whose exports form the output module's surface.
    pub exports: Vec<PathBuf>,

    /// Optional JS file whose top-level declarations extend the externs
    /// allowlist.
    pub externs: Option<PathBuf>,

    /// The module name exposed to AMD loaders and browser globals.
    pub module_name: String,
}

/// Links one wasm module with its JS files into a UMD module.
pub struct Linker<'a> {
    config: &'a LinkConfig,
}

impl<'a> Linker<'a> {
    pub fn new(config: &'a LinkConfig) -> Linker<'a> {
        Linker { config }
    }

    /// Performs the link and returns the output JavaScript source.
    pub fn link(&self) -> Result<String> {
        let mut symbol_table = SymbolTable::new();
        let mut requirements = RequirementsTable::new();

        let mut externs: BTreeSet<String> =
            DEFAULT_EXTERNS.iter().map(|s| s.to_string()).collect();
        if let Some(path) = &self.config.externs {
            externs.extend(read_externs(path)?);
        }

        let mut symbols_files = Vec::new();
        for path in &self.config.symbols {
            let source = read_source(path)?;
            symbols_files.push(SymbolsFile::parse(
                &file_name(path)?,
                &source,
                &mut symbol_table,
                &mut requirements,
            )?);
        }

        let mut exports_files = Vec::new();
        for path in &self.config.exports {
            let source = read_source(path)?;
            exports_files.push(ExportsFile::parse(
                &file_name(path)?,
                &source,
                &mut symbol_table,
                &mut requirements,
            )?);
        }

        let wasm_bytes = fs::read(&self.config.wasm).with_context(|| {
            format!(
                "failed to read wasm module `{}`",
                self.config.wasm.display()
            )
        })?;
        let wasm_file = WasmFile::parse(
            &file_name(&self.config.wasm)?,
            &wasm_bytes,
            &mut symbol_table,
            &mut requirements,
        )?;

        symbol_table.check_resolved()?;

        let generator = ModuleGenerator::new(
            &symbols_files,
            &exports_files,
            &wasm_file,
            wasm_file.memory_definitions(),
            self.config.module_name.clone(),
            externs,
            &symbol_table,
            &requirements,
        );
        let script = generator.generate()?;
        Ok(js_ast::print(&script))
    }
}

fn read_source(path: &Path) -> Result<String> {
    log::info!("reading `{}`", path.display());
    fs::read_to_string(path).with_context(|| format!("failed to read `{}`", path.display()))
}

fn file_name(path: &Path) -> Result<String> {
    match path.file_name() {
        Some(name) => Ok(name.to_string_lossy().into_owned()),
        None => bail!("`{}` has no file name", path.display()),
    }
}

/// An externs file is plain JS; every top-level declared binding name
/// becomes an allowed free identifier.
fn read_externs(path: &Path) -> Result<Vec<String>> {
    let source = read_source(path)?;
    let script = js_ast::parse_script(&source)
        .map_err(|e| anyhow!("failed to parse `{}`: {e}", path.display()))?;

    let mut names = Vec::new();
    for stmt in &script.body {
        match stmt {
            js_ast::Stmt::VarDecl { declarators, .. } => {
                names.extend(declarators.iter().map(|d| d.name.clone()));
            }
            js_ast::Stmt::Func(decl) => names.push(decl.name.clone()),
            js_ast::Stmt::Class(decl) => names.push(decl.name.clone()),
            _ => {}
        }
    }
    log::debug!("externs from `{}`: {names:?}", path.display());
    Ok(names)
}
