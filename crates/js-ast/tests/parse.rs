use js_ast::{
    parse_expr, parse_module, parse_script, parse_statements, print, print_stmts, Expr,
    ExportDecl, ModuleItem, Stmt,
};
use pretty_assertions::assert_eq;

/// Printing a parsed script and re-parsing it must converge: the second
/// print equals the first.
fn stable(src: &str) {
    let first = print(&parse_script(src).unwrap());
    let second = print(&parse_script(&first).unwrap());
    assert_eq!(first, second);
}

#[test]
fn print_parse_print_is_stable() {
    stable("\"use strict\";\nvar x = 1;");
    stable("function f(a, ...rest) { return a + rest.length; }");
    stable("const f = (a, b) => a * b;");
    stable("if (a) { b(); } else if (c) { d(); } else { e(); }");
    stable("try { f(); } catch (e) { g(e); } finally { h(); }");
    stable("for (let i = 0; i < 10; i++) { f(i); }");
    stable("for (const k in o) { f(k); }");
    stable("for (const v of xs) { f(v); }");
    stable("switch (x) { case 1: f(); break; default: g(); }");
    stable("const o = { a: 1, b, \"c\": 2, [k]: 3, m(x) { return x; } };");
    stable("new Foo(new Bar().baz, ...args);");
    stable("label: while (true) { break label; }");
    stable("const s = `a${b + 1}c`;");
    stable("class A extends B { constructor(x) { f(x); } static of(y) { return y; } }");
}

#[test]
fn module_declarations() {
    let module = parse_module(
        r#"
import { malloc, free } from "symbols";
import $ from "jQuery";
let buffer;
export function alloc(n) {
  buffer = malloc(n);
  return buffer;
}
export { alloc as allocate };
"#,
    )
    .unwrap();

    let imports: Vec<_> = module
        .items
        .iter()
        .filter_map(|i| match i {
            ModuleItem::Import(i) => Some(i),
            _ => None,
        })
        .collect();
    assert_eq!(imports.len(), 2);
    assert_eq!(imports[0].module, "symbols");
    assert_eq!(imports[0].named.len(), 2);
    assert_eq!(imports[1].default_binding.as_deref(), Some("$"));

    let exports: Vec<_> = module
        .items
        .iter()
        .filter_map(|i| match i {
            ModuleItem::Export(e) => Some(e),
            _ => None,
        })
        .collect();
    assert_eq!(exports.len(), 2);
    assert_eq!(exports[0].specifiers()[0].exported, "alloc");
    match exports[1] {
        ExportDecl::Named(specs) => {
            assert_eq!(specs[0].local.as_deref(), Some("alloc"));
            assert_eq!(specs[0].exported, "allocate");
        }
        other => panic!("expected named export, got {other:?}"),
    }
}

#[test]
fn asi_and_restricted_productions() {
    assert_eq!(parse_statements("a = 1\nb = 2").unwrap().len(), 2);
    let f = parse_statements("function f() { return\n1 }").unwrap();
    match &f[0] {
        Stmt::Func(decl) => assert_eq!(decl.func.body[0], Stmt::Return(None)),
        other => panic!("expected function, got {other:?}"),
    }
}

#[test]
fn rejects_unsupported_syntax() {
    assert!(parse_statements("const [a, b] = pair;").is_err());
    assert!(parse_module("export default 1;").is_err());
    assert!(parse_module("export { a } from \"m\";").is_err());
}

#[test]
fn expression_shapes() {
    assert!(matches!(parse_expr("a ? b : c").unwrap(), Expr::Cond { .. }));
    assert!(matches!(parse_expr("a === b").unwrap(), Expr::Binary { .. }));
    assert!(matches!(
        parse_expr("typeof define === \"function\" && define.amd").unwrap(),
        Expr::Logical { .. }
    ));
    let printed = print_stmts(&parse_statements("x = a === b;").unwrap());
    assert_eq!(printed, "x = a === b;\n");
}
