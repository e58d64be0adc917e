use anyhow::Result;
use js_ld::files::{ExportsFile, SymbolsFile};
use js_ld::generator::{ModuleGenerator, DEFAULT_EXTERNS};
use js_ld::requirements::RequirementsTable;
use js_ld::symbol_table::SymbolTable;
use js_ld::wasm::WasmFile;
use std::collections::BTreeSet;

/// Links a wat module with in-memory symbols/exports files and returns the
/// emitted JavaScript.
fn link(
    wat: &str,
    symbols: &[(&str, &str)],
    exports: &[(&str, &str)],
    extra_externs: &[&str],
    module_name: &str,
) -> Result<String> {
    let wasm = wat::parse_str(wat)?;

    let mut symbol_table = SymbolTable::new();
    let mut requirements = RequirementsTable::new();

    let mut symbols_files = Vec::new();
    for (name, source) in symbols {
        symbols_files.push(SymbolsFile::parse(
            name,
            source,
            &mut symbol_table,
            &mut requirements,
        )?);
    }
    let mut exports_files = Vec::new();
    for (name, source) in exports {
        exports_files.push(ExportsFile::parse(
            name,
            source,
            &mut symbol_table,
            &mut requirements,
        )?);
    }

    let wasm_file = WasmFile::parse("test.wasm", &wasm, &mut symbol_table, &mut requirements)?;
    symbol_table.check_resolved()?;

    let externs: BTreeSet<String> = DEFAULT_EXTERNS
        .iter()
        .copied()
        .chain(extra_externs.iter().copied())
        .map(str::to_string)
        .collect();

    let generator = ModuleGenerator::new(
        &symbols_files,
        &exports_files,
        &wasm_file,
        wasm_file.memory_definitions(),
        module_name.to_string(),
        externs,
        &symbol_table,
        &requirements,
    );
    Ok(js_ast::print(&generator.generate()?))
}

fn index_of(haystack: &str, needle: &str) -> usize {
    haystack
        .find(needle)
        .unwrap_or_else(|| panic!("`{needle}` not found in output:\n{haystack}"))
}

#[test]
fn empty_link_produces_a_single_umd_statement() -> Result<()> {
    let js = link("(module)", &[], &[], &[], "empty")?;
    assert!(js.starts_with("\"use strict\";\n"));
    assert!(js.contains("(function(factory) {"));
    assert!(js.contains("return Object.freeze(__exports);"));

    // The whole output is the directive plus exactly one statement.
    let script = js_ast::parse_script(&js).unwrap();
    assert_eq!(script.directives, ["use strict"]);
    assert_eq!(script.body.len(), 1);
    Ok(())
}

#[test]
fn output_scope_is_closed() -> Result<()> {
    let js = link(
        "(module (func (export \"run\")))",
        &[(
            "lib.js",
            "import { run } from \"symbols\";\nexport function go() { return run(); }",
        )],
        &[(
            "api.js",
            "import { go } from \"symbols\";\nexport { go };",
        )],
        &[],
        "app",
    )?;

    let script = js_ast::parse_script(&js).unwrap();
    let defaults: BTreeSet<&str> = DEFAULT_EXTERNS.iter().copied().collect();
    for free in js_ast::free_variables(&script) {
        assert!(defaults.contains(free.as_str()), "leaked identifier `{free}`");
    }
    Ok(())
}

#[test]
fn mangled_names_are_stable_within_a_run_and_differ_across_runs() -> Result<()> {
    let inputs = (
        "(module (func (export \"run\")))",
        [(
            "lib.js",
            "import { run } from \"symbols\";\nexport function go() { return run(); }",
        )],
    );
    let first = link(inputs.0, &inputs.1, &[], &[], "app")?;
    let second = link(inputs.0, &inputs.1, &[], &[], "app")?;

    let suffix_after = |js: &str, prefix: &str| -> String {
        let at = index_of(js, prefix) + prefix.len();
        js[at..]
            .chars()
            .take_while(|c| c.is_ascii_hexdigit())
            .collect()
    };

    // Every occurrence in one output uses the same suffix.
    let symbols_name = format!("__symbols_{}", suffix_after(&first, "__symbols_"));
    for at in first.match_indices("__symbols_").map(|(i, _)| i) {
        assert!(first[at..].starts_with(&symbols_name));
    }

    // Two identical links draw different suffixes.
    assert_ne!(
        suffix_after(&first, "__symbols_"),
        suffix_after(&second, "__symbols_")
    );
    Ok(())
}

#[test]
fn requirement_order_is_positional_everywhere() -> Result<()> {
    let js = link(
        "(module)",
        &[],
        &[(
            "api.js",
            "import b from \"b\";\nimport a from \"a\";\nconst both = [b, a];\nexport { both };",
        )],
        &[],
        "app",
    )?;

    assert!(js.contains("define(\"app\", [\"b\", \"a\"], factory);"));
    assert!(js.contains("module.exports = factory(require(\"b\"), require(\"a\"));"));
    assert!(js.contains("root[\"app\"] = factory(root[\"b\"], root[\"a\"]);"));
    assert!(js.contains(", b, a) {"));
    Ok(())
}

#[test]
fn renamed_requirement_binding_gets_a_const() -> Result<()> {
    let js = link(
        "(module)",
        &[],
        &[(
            "api.js",
            "import $ from \"jQuery\";\nconst ajax = $.ajax;\nexport { ajax };",
        )],
        &[],
        "app",
    )?;

    assert!(js.contains("const $ = jQuery;"));
    assert!(js.contains("__exports[\"ajax\"] = ajax;"));
    assert!(js.contains("define(\"app\", [\"jQuery\"], factory);"));
    assert!(js.contains(", jQuery) {"));
    Ok(())
}

#[test]
fn named_requirement_imports_read_members() -> Result<()> {
    let js = link(
        "(module)",
        &[],
        &[(
            "api.js",
            "import { map as mapFn } from \"lodash\";\nexport { mapFn as map };",
        )],
        &[],
        "app",
    )?;

    assert!(js.contains("const mapFn = lodash[\"map\"];"));
    assert!(js.contains("__exports[\"map\"] = mapFn;"));
    Ok(())
}

#[test]
fn host_supplied_memory_precedes_instantiation() -> Result<()> {
    let js = link(
        "(module (import \"symbols\" \"memory\" (memory 1)))",
        &[],
        &[],
        &[],
        "app",
    )?;

    let memory = index_of(&js, "[\"memory\"] = new WebAssembly.Memory({ initial: 1 });");
    let instantiate = index_of(&js, "WebAssembly.instantiateStreaming(");
    assert!(memory < instantiate);
    assert!(js.contains("\"symbols\": __symbols_"));
    assert!(!js.contains("maximum"));
    Ok(())
}

#[test]
fn memory_maximum_is_emitted_only_when_present() -> Result<()> {
    let js = link(
        "(module (import \"symbols\" \"memory\" (memory 2 4)))",
        &[],
        &[],
        &[],
        "app",
    )?;
    assert!(js.contains("new WebAssembly.Memory({ initial: 2, maximum: 4 })"));
    Ok(())
}

#[test]
fn circular_symbols_late_bind_as_callable() -> Result<()> {
    let js = link(
        "(module (import \"symbols\" \"bar\" (func)) (func (export \"foo\")))",
        &[(
            "lib.js",
            "import { foo } from \"symbols\";\nexport function bar() { return foo(); }",
        )],
        &[],
        &[],
        "app",
    )?;

    assert!(js.contains("let foo;"));
    assert!(js.contains("foo = __lateBind_"));
    assert!(js.contains(", true);"));
    assert!(js.contains("[\"bar\"] = bar;"));
    assert!(js.contains("[\"foo\"] = wrapExport(\"foo\");"));
    Ok(())
}

#[test]
fn non_function_symbols_late_bind_as_plain_objects() -> Result<()> {
    let js = link(
        "(module (global (export \"answer\") i32 (i32.const 42)))",
        &[(
            "lib.js",
            "import { answer } from \"symbols\";\nexport function read() { return answer; }",
        )],
        &[],
        &[],
        "app",
    )?;

    assert!(js.contains("answer = __lateBind_"));
    assert!(js.contains(", false);"));
    // Non-function exports are wired straight off the raw exports object.
    assert!(js.contains("[\"answer\"] = es[\"answer\"];"));
    Ok(())
}

#[test]
fn call_ctors_runs_after_export_wiring_and_before_freeze() -> Result<()> {
    let js = link(
        "(module (func (export \"__wasm_call_ctors\")) (func (export \"run\")))",
        &[],
        &[],
        &[],
        "app",
    )?;

    let wrap = index_of(&js, "function wrapExport(name)");
    let wiring = index_of(&js, "[\"run\"] = wrapExport(\"run\");");
    let ctors = index_of(&js, "es[\"__wasm_call_ctors\"]();");
    let freeze = index_of(&js, "return Object.freeze(__exports);");
    assert!(wrap < wiring && wiring < ctors && ctors < freeze);
    Ok(())
}

#[test]
fn start_section_suppresses_the_ctors_call() -> Result<()> {
    let js = link(
        "(module (func $init) (start $init) (func (export \"__wasm_call_ctors\")))",
        &[],
        &[],
        &[],
        "app",
    )?;
    assert!(!js.contains("es[\"__wasm_call_ctors\"]();"));
    Ok(())
}

#[test]
fn reentry_guard_is_part_of_every_wrapped_export() -> Result<()> {
    let js = link("(module (func (export \"boom\")))", &[], &[], &[], "app")?;
    let guard = index_of(
        &js,
        "throw new Error(\"WebAssembly previously threw: \" + wasmEx);",
    );
    let body = index_of(&js, "function wrapExport(name)");
    let wiring = index_of(&js, "[\"boom\"] = wrapExport(\"boom\");");
    assert!(body < guard && guard < wiring);
    Ok(())
}

#[test]
fn undeclared_global_fails_the_link() {
    let err = link(
        "(module)",
        &[(
            "lib.js",
            "export function f() { return window.location; }",
        )],
        &[],
        &[],
        "app",
    )
    .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("unbound variables"));
    assert!(message.contains("window"));
}

#[test]
fn declared_externs_are_allowed() -> Result<()> {
    let js = link(
        "(module)",
        &[(
            "lib.js",
            "export function f() { return window.location; }",
        )],
        &[],
        &["window"],
        "app",
    )?;
    assert!(js.contains("window.location"));
    Ok(())
}

#[test]
fn unresolved_symbol_fails_the_link() {
    let err = link(
        "(module)",
        &[(
            "lib.js",
            "import { missing } from \"symbols\";\nexport function f() { return missing(); }",
        )],
        &[],
        &[],
        "app",
    )
    .unwrap_err();
    assert!(err.to_string().contains("unresolved symbols"));
    assert!(err.to_string().contains("missing"));
}

#[test]
fn duplicate_symbol_fails_the_link() {
    let err = link(
        "(module)",
        &[
            ("a.js", "export function dup() {}"),
            ("b.js", "export function dup() {}"),
        ],
        &[],
        &[],
        "app",
    )
    .unwrap_err();
    assert!(err.to_string().contains("duplicate definition"));
    assert!(err.to_string().contains("dup"));
}

#[test]
fn exports_accumulate_across_exports_files() -> Result<()> {
    let js = link(
        "(module)",
        &[],
        &[
            ("a.js", "export function one() { return 1; }"),
            ("b.js", "const two = 2;\nexport { two };\nexport { two as deux };"),
        ],
        &[],
        "app",
    )?;
    for exported in ["one", "two", "deux"] {
        assert!(js.contains(&format!("__exports[\"{exported}\"] =")));
    }
    Ok(())
}

#[test]
fn wasm_requirement_imports_pass_through() -> Result<()> {
    let js = link(
        "(module (import \"host\" \"tick\" (func)))",
        &[],
        &[],
        &[],
        "app",
    )?;

    // The import object forwards the requirement object wholesale, and the
    // UMD surface acquires the requirement positionally.
    assert!(js.contains("\"host\": host"));
    assert!(js.contains("define(\"app\", [\"host\"], factory);"));
    assert!(js.contains("module.exports = factory(require(\"host\"));"));
    Ok(())
}
