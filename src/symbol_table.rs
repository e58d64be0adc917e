//! Registry of every named symbol that crosses the JS/wasm boundary.

use anyhow::{bail, Result};
use indexmap::IndexMap;

/// The wasm-side kind of a symbol, when wasm is the side that knows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Function,
    Value,
    Memory,
}

/// Which input provided a symbol's single definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Definition {
    JsSymbolsFile,
    WasmExport,
    MemoryDefinition,
}

#[derive(Debug)]
pub struct Symbol {
    name: String,
    defined_by: Option<Definition>,
    descriptor: Option<SymbolKind>,
    imported: bool,
}

impl Symbol {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn defined_by(&self) -> Option<Definition> {
        self.defined_by
    }

    pub fn descriptor(&self) -> Option<SymbolKind> {
        self.descriptor
    }

    /// Whether the symbol's late-binding proxy needs a callable target. A
    /// symbol defined on the JS side carries no wasm descriptor, so it is
    /// assumed callable.
    pub fn is_callable(&self) -> bool {
        match self.descriptor {
            None => true,
            Some(kind) => kind == SymbolKind::Function,
        }
    }
}

/// All symbols seen during one link, keyed by name in first-seen order.
///
/// Every symbol imported by any module must have exactly one definition
/// across all inputs; [`SymbolTable::check_resolved`] enforces the former
/// and [`SymbolTable::define`] the latter.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: IndexMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    fn entry(&mut self, name: &str) -> &mut Symbol {
        self.symbols
            .entry(name.to_string())
            .or_insert_with(|| Symbol {
                name: name.to_string(),
                defined_by: None,
                descriptor: None,
                imported: false,
            })
    }

    /// Records the single definition of `name`. A second definition from any
    /// input is a link-time error.
    pub fn define(
        &mut self,
        name: &str,
        defined_by: Definition,
        descriptor: Option<SymbolKind>,
    ) -> Result<()> {
        let symbol = self.entry(name);
        if symbol.defined_by.is_some() {
            bail!("duplicate definition of symbol `{name}`");
        }
        symbol.defined_by = Some(defined_by);
        symbol.descriptor = descriptor;
        log::debug!("defined symbol `{name}` ({defined_by:?})");
        Ok(())
    }

    /// Records that some module imports `name`.
    pub fn reference(&mut self, name: &str) {
        self.entry(name).imported = true;
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    /// Verifies that every imported symbol was defined somewhere.
    pub fn check_resolved(&self) -> Result<()> {
        let unresolved: Vec<&str> = self
            .symbols
            .values()
            .filter(|s| s.imported && s.defined_by.is_none())
            .map(|s| s.name.as_str())
            .collect();
        if !unresolved.is_empty() {
            let mut message = String::from("module contains unresolved symbols:");
            for name in unresolved {
                message.push_str("\n  ");
                message.push_str(name);
            }
            bail!(message);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_definitions_fail() {
        let mut table = SymbolTable::new();
        table
            .define("foo", Definition::JsSymbolsFile, None)
            .unwrap();
        let err = table
            .define("foo", Definition::WasmExport, Some(SymbolKind::Function))
            .unwrap_err();
        assert!(err.to_string().contains("duplicate definition"));
    }

    #[test]
    fn unresolved_imports_fail() {
        let mut table = SymbolTable::new();
        table.reference("missing");
        table.define("present", Definition::WasmExport, Some(SymbolKind::Value)).unwrap();
        let err = table.check_resolved().unwrap_err();
        assert!(err.to_string().contains("missing"));
        assert!(!err.to_string().contains("present"));
    }

    #[test]
    fn js_symbols_are_assumed_callable() {
        let mut table = SymbolTable::new();
        table
            .define("cb", Definition::JsSymbolsFile, None)
            .unwrap();
        table
            .define("mem", Definition::MemoryDefinition, Some(SymbolKind::Memory))
            .unwrap();
        assert!(table.get("cb").unwrap().is_callable());
        assert!(!table.get("mem").unwrap().is_callable());
    }
}
