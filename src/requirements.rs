//! Registry of the external JS modules the output will depend on.
//!
//! Requirements are ordered: the order of first registration determines the
//! positional argument order of the UMD factory, so an `IndexMap` is load
//! bearing here.

use crate::generator;
use indexmap::IndexMap;
use js_ast::parser::is_reserved_word;

/// A declared dependency on an external JS module.
#[derive(Debug)]
pub struct Requirement {
    /// The specifier as it appears in a `require`/`define` list.
    pub specifier: String,
    /// The identifier the requirement is bound to inside the factory.
    pub variable: String,
}

#[derive(Debug, Default)]
pub struct RequirementsTable {
    requirements: IndexMap<String, Requirement>,
}

impl RequirementsTable {
    pub fn new() -> RequirementsTable {
        RequirementsTable::default()
    }

    /// Registers a requirement on `specifier`, choosing a factory-parameter
    /// name for it the first time it is seen.
    pub fn register(&mut self, specifier: &str) -> &Requirement {
        self.requirements
            .entry(specifier.to_string())
            .or_insert_with(|| {
                let variable = variable_for(specifier);
                log::debug!("registered requirement `{specifier}` as `{variable}`");
                Requirement {
                    specifier: specifier.to_string(),
                    variable,
                }
            })
    }

    pub fn get(&self, specifier: &str) -> Option<&Requirement> {
        self.requirements.get(specifier)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Requirement> {
        self.requirements.values()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }
}

/// Picks the factory-parameter identifier for a module specifier: the
/// specifier itself when it is already a legal identifier, else a sanitised
/// form with a random suffix so it cannot collide with user bindings.
fn variable_for(specifier: &str) -> String {
    if is_identifier(specifier) && !is_reserved_word(specifier) {
        return specifier.to_string();
    }
    let sanitised: String = specifier
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '$' || c == '_' { c } else { '_' })
        .collect();
    let sanitised = match sanitised.chars().next() {
        Some(c) if !c.is_ascii_digit() => sanitised,
        _ => format!("_{sanitised}"),
    };
    generator::mangle(&sanitised)
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c == '$' || c == '_' || c.is_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '$' || c == '_' || c.is_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_specifiers_keep_their_name() {
        let mut table = RequirementsTable::new();
        assert_eq!(table.register("jQuery").variable, "jQuery");
    }

    #[test]
    fn awkward_specifiers_are_sanitised_and_suffixed() {
        let mut table = RequirementsTable::new();
        let variable = table.register("lodash/fp").variable.clone();
        assert!(variable.starts_with("lodash_fp_"));
    }

    #[test]
    fn registration_order_is_preserved() {
        let mut table = RequirementsTable::new();
        table.register("b");
        table.register("a");
        table.register("b");
        let specifiers: Vec<&str> = table.iter().map(|r| r.specifier.as_str()).collect();
        assert_eq!(specifiers, ["b", "a"]);
    }
}
