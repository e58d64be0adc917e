//! JavaScript AST construction, parsing, printing and scope analysis.
//!
//! This crate backs the `js-ld` module generator. It covers a pragmatic
//! subset of the language: identifier bindings only (no destructuring), no
//! generators, no `async`/`await`. Hand-written linker glue fits comfortably
//! inside that subset, and keeping the grammar small keeps the free-variable
//! analysis in [`scope`] exact, which is what the linker's closed-scope
//! check rides on.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod printer;
pub mod scope;

pub use ast::{
    ArrowBody, Class, ClassDecl, ExportDecl, ExportSpecifier, Expr, ExprOrSpread, ForHead,
    ForInit, Func, FuncDecl, ImportDecl, ImportSpecifier, MemberProp, MethodKind, Module,
    ModuleItem, PropKey, Property, Script, Stmt, TemplatePart, VarDeclarator, VarKind,
};
pub use parser::{parse_expr, parse_module, parse_script, parse_statements, Error, Result};
pub use printer::{print, print_expr, print_stmts};
pub use scope::free_variables;
