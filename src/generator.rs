//! The module generator: assembles the output script in six phases
//! (preamble, symbols-file bodies, exports-file bodies, wasm instantiation,
//! UMD wrapper, scope verification).

use crate::files::{ExportsFile, RequirementImport, SymbolsFile};
use crate::requirements::RequirementsTable;
use crate::symbol_table::SymbolTable;
use crate::wasm::{MemoryDefinition, WasmFile, CALL_CTORS_SYMBOL, SYMBOLS_MODULE};
use anyhow::{bail, Result};
use js_ast::{
    ArrowBody, Expr, ExprOrSpread, Func, ImportSpecifier, PropKey, Property, Script, Stmt,
    VarDeclarator, VarKind,
};
use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::BTreeSet;

// Modules are nested inside the output's namespace, so anything the script
// declares around them uses a double-underscore name, and all but the two
// contract names additionally get a random suffix.

/// Stable name for the detected global object, part of the contract with
/// user modules.
pub const ROOT_VAR: &str = "__root";

/// Stable name for the object accumulating the module's exports.
pub const EXPORTS_VAR: &str = "__exports";

/// Free identifiers every generated script is allowed to reference, before
/// user-declared externs are added.
pub const DEFAULT_EXTERNS: &[&str] = &[
    "WebAssembly",
    "Reflect",
    "Proxy",
    "Object",
    "Promise",
    "Error",
    "global",
    "self",
    "module",
    "exports",
    "require",
    "define",
    "__dirname",
    "undefined",
];

/// Appends an underscore and 48 bits of secure randomness, so user code
/// cannot name the symbol: the name changes on every link.
pub(crate) fn mangle(name: &str) -> String {
    format!("{name}_{:x}", rand_u48())
}

fn rand_u48() -> u64 {
    OsRng.next_u64() & ((1u64 << 48) - 1)
}

/// The per-run names of the internals the generated script declares. Drawn
/// once at generator construction and reused for every emission.
#[derive(Debug)]
struct GeneratedNames {
    fetcher: String,
    symbols: String,
    late_bind: String,
}

impl GeneratedNames {
    fn fresh() -> GeneratedNames {
        GeneratedNames {
            fetcher: mangle("__fetcher"),
            symbols: mangle("__symbols"),
            late_bind: mangle("__lateBind"),
        }
    }
}

pub struct ModuleGenerator<'a> {
    symbols_files: &'a [SymbolsFile],
    exports_files: &'a [ExportsFile],
    wasm_file: &'a WasmFile,
    memory_definitions: &'a [MemoryDefinition],
    module_name: String,
    externs: BTreeSet<String>,
    symbol_table: &'a SymbolTable,
    requirements: &'a RequirementsTable,
    names: GeneratedNames,
}

impl<'a> ModuleGenerator<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbols_files: &'a [SymbolsFile],
        exports_files: &'a [ExportsFile],
        wasm_file: &'a WasmFile,
        memory_definitions: &'a [MemoryDefinition],
        module_name: String,
        externs: BTreeSet<String>,
        symbol_table: &'a SymbolTable,
        requirements: &'a RequirementsTable,
    ) -> ModuleGenerator<'a> {
        ModuleGenerator {
            symbols_files,
            exports_files,
            wasm_file,
            memory_definitions,
            module_name,
            externs,
            symbol_table,
            requirements,
            names: GeneratedNames::fresh(),
        }
    }

    /// The mangled name of the symbols object, for emission callbacks.
    pub fn symbols_var(&self) -> &str {
        &self.names.symbols
    }

    pub fn generate(&self) -> Result<Script> {
        let mut statements = Vec::new();
        self.generate_preamble(&mut statements);
        log::debug!("generating {} symbols file(s)", self.symbols_files.len());
        for file in self.symbols_files {
            file.append_module(self, &mut statements)?;
        }
        log::debug!("generating {} exports file(s)", self.exports_files.len());
        for file in self.exports_files {
            file.append_module(self, &mut statements)?;
        }
        self.generate_postamble(&mut statements)?;
        let body = self.generate_wrapper(statements);
        let script = Script {
            directives: vec!["use strict".to_string()],
            body,
        };
        self.analyze_externs(&script)?;
        Ok(script)
    }

    /// Rejects the build if the script references any free identifier
    /// outside the externs allowlist. This catches both user leaks and
    /// generator bugs.
    fn analyze_externs(&self, script: &Script) -> Result<()> {
        let banned: Vec<String> = js_ast::free_variables(script)
            .into_iter()
            .filter(|name| !self.externs.contains(name))
            .collect();
        if !banned.is_empty() {
            let mut message = String::from("module contains unbound variables:");
            for name in &banned {
                message.push_str("\n  ");
                message.push_str(name);
            }
            bail!(message);
        }
        Ok(())
    }

    fn generate_preamble(&self, out: &mut Vec<Stmt>) {
        append_fragment(
            out,
            &format!(
                "const {EXPORTS_VAR} = {{}};\nconst {symbols} = {{}};",
                symbols = self.names.symbols
            ),
        );

        // Modules import from each other and from wasm in a circle, and wasm
        // instantiation is asynchronous, so every imported symbol starts out
        // as a reflective proxy. The binder both looks the real target up
        // and rebinds the caller's variable, so the proxy is only hit until
        // the first use. The fake target must be callable when the symbol
        // is, because a proxy's IsCallable is copied from its target at
        // construction and cannot be forwarded.
        append_fragment(
            out,
            &format!(
                r#"function {late_bind}(binder, isCallable) {{
  const fakeTarget = isCallable ? (function () {{}}) : {{}};
  const reflectingHandler = new Proxy({{}}, {{
    get(reflectingTarget_, prop, reflectingHandler_) {{
      return function (fakeTarget_, ...otherArgs) {{
        const realTarget = binder();
        if (prop == "get" || prop == "set")
          otherArgs[prop == "get" ? 1 : 2] = realTarget;
        return Reflect[prop](realTarget, ...otherArgs);
      }};
    }}
  }});
  return new Proxy(fakeTarget, reflectingHandler);
}}"#,
                late_bind = self.names.late_bind
            ),
        );
    }

    /// Emits the binding statements for one file's imports: requirement
    /// `const`s first, then one `let` covering the symbol imports, then the
    /// late-bind assignment for each.
    pub fn append_imports(
        &self,
        out: &mut Vec<Stmt>,
        symbol_imports: &[ImportSpecifier],
        requirement_imports: &[RequirementImport],
    ) -> Result<()> {
        let mut requirement_declarators = Vec::new();
        for import in requirement_imports {
            let requirement = match self.requirements.get(&import.module) {
                Some(r) => r,
                None => bail!("requirement `{}` was never registered", import.module),
            };
            if let Some(binding) = &import.default_binding {
                if *binding != requirement.variable {
                    requirement_declarators.push(VarDeclarator {
                        name: binding.clone(),
                        init: Some(Expr::ident(&requirement.variable)),
                    });
                }
            }
            for specifier in &import.named {
                requirement_declarators.push(VarDeclarator {
                    name: specifier.local.clone(),
                    init: Some(Expr::computed_member(
                        Expr::ident(&requirement.variable),
                        Expr::str(specifier.imported_name()),
                    )),
                });
            }
        }
        if !requirement_declarators.is_empty() {
            out.push(Stmt::VarDecl {
                kind: VarKind::Const,
                declarators: requirement_declarators,
            });
        }

        if !symbol_imports.is_empty() {
            out.push(Stmt::VarDecl {
                kind: VarKind::Let,
                declarators: symbol_imports
                    .iter()
                    .map(|s| VarDeclarator {
                        name: s.local.clone(),
                        init: None,
                    })
                    .collect(),
            });
        }
        for specifier in symbol_imports {
            let symbol_name = specifier.imported_name();
            let is_callable = match self.symbol_table.get(symbol_name) {
                Some(symbol) => symbol.is_callable(),
                None => true,
            };

            // <binding> = __lateBind(() => (<binding> = __symbols["<name>"]), <isCallable>)
            let lookup = Expr::assign(
                Expr::ident(&specifier.local),
                Expr::computed_member(Expr::ident(&self.names.symbols), Expr::str(symbol_name)),
            );
            let binder = Expr::Arrow {
                params: Vec::new(),
                rest: None,
                body: ArrowBody::Expr(Box::new(lookup)),
            };
            out.push(Stmt::Expr(Expr::assign(
                Expr::ident(&specifier.local),
                Expr::Call {
                    callee: Box::new(Expr::ident(&self.names.late_bind)),
                    args: vec![
                        ExprOrSpread::Expr(binder),
                        ExprOrSpread::Expr(Expr::Bool(is_callable)),
                    ],
                },
            )));
        }
        Ok(())
    }

    /// Emits `<target>["<exported>"] = <local>` for each export specifier.
    pub fn append_exports(
        &self,
        out: &mut Vec<Stmt>,
        exports: &[js_ast::ExportSpecifier],
        target_var: &str,
    ) {
        for specifier in exports {
            out.push(Stmt::Expr(Expr::assign(
                Expr::computed_member(Expr::ident(target_var), Expr::str(&specifier.exported)),
                Expr::ident(specifier.local_name()),
            )));
        }
    }

    fn generate_postamble(&self, out: &mut Vec<Stmt>) -> Result<()> {
        let instantiation = Expr::call(self.generate_instantiation()?, Vec::new());

        let mut instance_statements = Vec::new();
        append_fragment(
            &mut instance_statements,
            "const es = wasmInstance.instance.exports;\n\
             let wasmEx;\n\
             function wrapExport(name) {\n\
               const fn = es[name];\n\
               return function (...args) {\n\
                 if (wasmEx !== undefined)\n\
                   throw new Error(\"WebAssembly previously threw: \" + wasmEx);\n\
                 try { return fn(...args); } catch (e) {\n\
                   wasmEx = e;\n\
                   throw e;\n\
                 }\n\
               };\n\
             }",
        );
        self.wasm_file.append_exports(
            &mut instance_statements,
            &self.names.symbols,
            "es",
            "wrapExport",
        );
        if self.wasm_file.needs_external_call_ctors() {
            instance_statements.push(Stmt::Expr(Expr::call(
                Expr::computed_member(Expr::ident("es"), Expr::str(CALL_CTORS_SYMBOL)),
                Vec::new(),
            )));
        }
        append_fragment(
            &mut instance_statements,
            &format!("return Object.freeze({EXPORTS_VAR});"),
        );

        let promise = Expr::call(
            Expr::member(instantiation, "then"),
            vec![Expr::Func {
                name: None,
                func: Func {
                    params: vec!["wasmInstance".to_string()],
                    rest: None,
                    body: instance_statements,
                },
            }],
        );
        out.push(Stmt::Return(Some(promise)));
        Ok(())
    }

    /// Builds the zero-argument function whose call kicks off
    /// `WebAssembly.instantiateStreaming`. Memories are constructed first so
    /// they are present in the import object.
    fn generate_instantiation(&self) -> Result<Expr> {
        let mut statements = Vec::new();
        for memory in self.memory_definitions {
            let mut limit_properties = vec![Property::KeyValue {
                key: PropKey::Ident("initial".to_string()),
                value: Expr::num(memory.limits.min as f64),
            }];
            if let Some(max) = memory.limits.max {
                limit_properties.push(Property::KeyValue {
                    key: PropKey::Ident("maximum".to_string()),
                    value: Expr::num(max as f64),
                });
            }
            // __symbols["<name>"] = new WebAssembly.Memory({...})
            statements.push(Stmt::Expr(Expr::assign(
                Expr::computed_member(
                    Expr::ident(&self.names.symbols),
                    Expr::str(&memory.name),
                ),
                Expr::new_(
                    Expr::member(Expr::ident("WebAssembly"), "Memory"),
                    vec![Expr::Object(limit_properties)],
                ),
            )));
        }

        let mut import_properties = vec![Property::KeyValue {
            key: PropKey::Str(SYMBOLS_MODULE.to_string()),
            value: Expr::ident(&self.names.symbols),
        }];
        self.wasm_file
            .append_imports(&mut import_properties, self.requirements)?;

        statements.push(Stmt::Return(Some(Expr::call(
            Expr::member(Expr::ident("WebAssembly"), "instantiateStreaming"),
            vec![
                Expr::call(
                    Expr::ident(&self.names.fetcher),
                    vec![Expr::str(self.wasm_file.file_name())],
                ),
                Expr::Object(import_properties),
            ],
        ))));

        Ok(Expr::Func {
            name: None,
            func: Func {
                params: Vec::new(),
                rest: None,
                body: statements,
            },
        })
    }

    /// Wraps the accumulated factory body in the UMD runner and returns the
    /// new singleton statement list.
    fn generate_wrapper(&self, body: Vec<Stmt>) -> Vec<Stmt> {
        let mut umd_body = Vec::new();
        // document.currentScript is only valid synchronously during script
        // execution; the fetcher closes over it because fetches happen after
        // the promise chain has yielded.
        append_fragment(
            &mut umd_body,
            r#"let root, isNode = false;
if (typeof global === "object" && global.toString() == "[object global]") {
  root = global;
  isNode = true;
} else if (typeof self === "object" && self.Object !== undefined && self.Array !== undefined) {
  root = self;
} else throw new Error("Unable to detect global object");
const define = root.define;
const currentScript = isNode ? __dirname : root.document.currentScript.src;
const fetcher = isNode ? function (name) {
  const fs = require("fs"), path = require("path");
  const buf = fs.readFileSync(path.join(currentScript, name));
  const copy = buf.buffer.slice(buf.byteOffset, buf.byteOffset + buf.byteLength);
  return Promise.resolve(copy);
} : function (name) {
  const url = new root.URL(name, currentScript);
  return root.fetch(url.toString());
};
factory = factory.bind(null, root, fetcher);"#,
        );

        let requirements: Vec<_> = self.requirements.iter().collect();

        // define("<name>", ["<specifiers>"...], factory);
        let amd_branch = Stmt::Expr(Expr::call(
            Expr::ident("define"),
            vec![
                Expr::str(&self.module_name),
                Expr::Array(
                    requirements
                        .iter()
                        .map(|r| ExprOrSpread::Expr(Expr::str(&r.specifier)))
                        .collect(),
                ),
                Expr::ident("factory"),
            ],
        ));
        // module.exports = factory(require("<specifier>")...);
        let node_branch = Stmt::Expr(Expr::assign(
            Expr::member(Expr::ident("module"), "exports"),
            Expr::call(
                Expr::ident("factory"),
                requirements
                    .iter()
                    .map(|r| Expr::call(Expr::ident("require"), vec![Expr::str(&r.specifier)]))
                    .collect(),
            ),
        ));
        // root["<name>"] = factory(root["<specifier>"]...);
        let fallback_branch = Stmt::Expr(Expr::assign(
            Expr::computed_member(Expr::ident("root"), Expr::str(&self.module_name)),
            Expr::call(
                Expr::ident("factory"),
                requirements
                    .iter()
                    .map(|r| Expr::computed_member(Expr::ident("root"), Expr::str(&r.specifier)))
                    .collect(),
            ),
        ));
        umd_body.push(Stmt::If {
            test: parse_fragment_expr("typeof define === \"function\" && define.amd"),
            consequent: Box::new(amd_branch),
            alternate: Some(Box::new(Stmt::If {
                test: parse_fragment_expr("typeof module === \"object\" && module.exports"),
                consequent: Box::new(node_branch),
                alternate: Some(Box::new(fallback_branch)),
            })),
        });

        // function (__root, __fetcher, <requirement variables>...) { <body> }
        let mut factory_params = vec![ROOT_VAR.to_string(), self.names.fetcher.clone()];
        factory_params.extend(requirements.iter().map(|r| r.variable.clone()));
        let factory = Expr::Func {
            name: None,
            func: Func {
                params: factory_params,
                rest: None,
                body,
            },
        };

        // (function (factory) { <UMD body> })(<factory>)
        let runner = Expr::call(
            Expr::Func {
                name: None,
                func: Func {
                    params: vec!["factory".to_string()],
                    rest: None,
                    body: umd_body,
                },
            },
            vec![factory],
        );
        vec![Stmt::Expr(runner)]
    }
}

/// Parses a fixed source fragment into statements and appends them. The
/// fragments are compile-time constants (up to identifier substitution), so
/// a parse failure is a generator bug.
fn append_fragment(out: &mut Vec<Stmt>, source: &str) {
    out.extend(js_ast::parse_statements(source).expect("generated fragment parses"));
}

fn parse_fragment_expr(source: &str) -> Expr {
    js_ast::parse_expr(source).expect("generated fragment parses")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mangling_appends_48_bit_hex() {
        let name = mangle("__fetcher");
        let suffix = name.strip_prefix("__fetcher_").unwrap();
        assert!(!suffix.is_empty() && suffix.len() <= 12);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(suffix.chars().filter(|c| c.is_ascii_uppercase()).count() == 0);
    }

    #[test]
    fn mangled_names_differ_across_draws() {
        assert_ne!(mangle("__symbols"), mangle("__symbols"));
    }
}
