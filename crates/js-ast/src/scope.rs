//! Free-variable analysis.
//!
//! Walks a script with a scope stack, honouring `var`/function hoisting to
//! the enclosing function scope and `let`/`const`/`class` block scoping.
//! Every identifier reference that resolves to no binding is reported as
//! free. Property names, object keys, method names and labels are not
//! references.

use crate::ast::*;
use std::collections::{BTreeSet, HashSet};

/// Returns the set of identifiers referenced but never bound anywhere in the
/// script, sorted.
pub fn free_variables(script: &Script) -> BTreeSet<String> {
    let mut analyzer = Analyzer::default();
    analyzer.scopes.push(HashSet::new());
    analyzer.collect_block_decls(&script.body);
    analyzer.collect_var_decls(&script.body);
    analyzer.stmts(&script.body);
    analyzer.free
}

#[derive(Default)]
struct Analyzer {
    scopes: Vec<HashSet<String>>,
    free: BTreeSet<String>,
}

impl Analyzer {
    fn declare(&mut self, name: &str) {
        self.scopes
            .last_mut()
            .expect("scope stack is never empty")
            .insert(name.to_string());
    }

    fn resolve(&mut self, name: &str) {
        if !self.scopes.iter().any(|s| s.contains(name)) {
            self.free.insert(name.to_string());
        }
    }

    /// Declares the lexically-scoped names (`let`, `const`, `class`, function
    /// declarations) of a statement list into the current scope.
    fn collect_block_decls(&mut self, body: &[Stmt]) {
        for stmt in body {
            match stmt {
                Stmt::VarDecl {
                    kind: VarKind::Let | VarKind::Const,
                    declarators,
                } => {
                    for d in declarators {
                        self.declare(&d.name);
                    }
                }
                Stmt::Func(decl) => self.declare(&decl.name),
                Stmt::Class(decl) => self.declare(&decl.name),
                _ => {}
            }
        }
    }

    /// Declares every `var` binding reachable without crossing a function
    /// boundary into the current (function-level) scope.
    fn collect_var_decls(&mut self, body: &[Stmt]) {
        for stmt in body {
            match stmt {
                Stmt::VarDecl {
                    kind: VarKind::Var,
                    declarators,
                } => {
                    for d in declarators {
                        self.declare(&d.name);
                    }
                }
                Stmt::Block(b) => self.collect_var_decls(b),
                Stmt::If {
                    consequent,
                    alternate,
                    ..
                } => {
                    self.collect_var_decls(std::slice::from_ref(consequent));
                    if let Some(alternate) = alternate {
                        self.collect_var_decls(std::slice::from_ref(alternate));
                    }
                }
                Stmt::While { body, .. }
                | Stmt::DoWhile { body, .. }
                | Stmt::Labeled { body, .. } => {
                    self.collect_var_decls(std::slice::from_ref(body));
                }
                Stmt::For { init, body, .. } => {
                    if let Some(ForInit::VarDecl {
                        kind: VarKind::Var,
                        declarators,
                    }) = init
                    {
                        for d in declarators {
                            self.declare(&d.name);
                        }
                    }
                    self.collect_var_decls(std::slice::from_ref(body));
                }
                Stmt::ForIn { left, body, .. } => {
                    if let ForHead::VarDecl {
                        kind: VarKind::Var,
                        name,
                    } = left
                    {
                        self.declare(name);
                    }
                    self.collect_var_decls(std::slice::from_ref(body));
                }
                Stmt::Try {
                    block,
                    catch,
                    finally,
                } => {
                    self.collect_var_decls(block);
                    if let Some(catch) = catch {
                        self.collect_var_decls(&catch.body);
                    }
                    if let Some(finally) = finally {
                        self.collect_var_decls(finally);
                    }
                }
                Stmt::Switch { cases, .. } => {
                    for case in cases {
                        self.collect_var_decls(&case.body);
                    }
                }
                _ => {}
            }
        }
    }

    fn stmts(&mut self, body: &[Stmt]) {
        for stmt in body {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expr(e) | Stmt::Throw(e) => self.expr(e),
            Stmt::Return(arg) => {
                if let Some(arg) = arg {
                    self.expr(arg);
                }
            }
            Stmt::VarDecl { declarators, .. } => {
                for d in declarators {
                    if let Some(init) = &d.init {
                        self.expr(init);
                    }
                }
            }
            Stmt::Func(decl) => self.function(&decl.func, None),
            Stmt::Class(decl) => self.class(&decl.class, None),
            Stmt::Block(b) => self.block(b),
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                self.expr(test);
                self.substmt(consequent);
                if let Some(alternate) = alternate {
                    self.substmt(alternate);
                }
            }
            Stmt::Try {
                block,
                catch,
                finally,
            } => {
                self.block(block);
                if let Some(catch) = catch {
                    self.scopes.push(HashSet::new());
                    if let Some(param) = &catch.param {
                        self.declare(param);
                    }
                    self.collect_block_decls(&catch.body);
                    self.stmts(&catch.body);
                    self.scopes.pop();
                }
                if let Some(finally) = finally {
                    self.block(finally);
                }
            }
            Stmt::While { test, body } => {
                self.expr(test);
                self.substmt(body);
            }
            Stmt::DoWhile { body, test } => {
                self.substmt(body);
                self.expr(test);
            }
            Stmt::For {
                init,
                test,
                update,
                body,
            } => {
                let mut pushed = false;
                match init {
                    Some(ForInit::VarDecl { kind, declarators }) => {
                        if *kind != VarKind::Var {
                            self.scopes.push(HashSet::new());
                            pushed = true;
                            for d in declarators {
                                self.declare(&d.name);
                            }
                        }
                        for d in declarators {
                            if let Some(init) = &d.init {
                                self.expr(init);
                            }
                        }
                    }
                    Some(ForInit::Expr(e)) => self.expr(e),
                    None => {}
                }
                if let Some(test) = test {
                    self.expr(test);
                }
                if let Some(update) = update {
                    self.expr(update);
                }
                self.substmt(body);
                if pushed {
                    self.scopes.pop();
                }
            }
            Stmt::ForIn {
                left, right, body, ..
            } => {
                let mut pushed = false;
                match left {
                    ForHead::VarDecl { kind, name } => {
                        if *kind != VarKind::Var {
                            self.scopes.push(HashSet::new());
                            pushed = true;
                            self.declare(name);
                        }
                    }
                    ForHead::Target(e) => self.expr(e),
                }
                self.expr(right);
                self.substmt(body);
                if pushed {
                    self.scopes.pop();
                }
            }
            Stmt::Switch {
                discriminant,
                cases,
            } => {
                self.expr(discriminant);
                self.scopes.push(HashSet::new());
                for case in cases {
                    self.collect_block_decls(&case.body);
                }
                for case in cases {
                    if let Some(test) = &case.test {
                        self.expr(test);
                    }
                    self.stmts(&case.body);
                }
                self.scopes.pop();
            }
            Stmt::Labeled { body, .. } => self.substmt(body),
            Stmt::Break(_) | Stmt::Continue(_) | Stmt::Empty => {}
        }
    }

    /// A sub-statement position is a block scope of its own.
    fn substmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(b) => self.block(b),
            _ => self.block(std::slice::from_ref(stmt)),
        }
    }

    fn block(&mut self, body: &[Stmt]) {
        self.scopes.push(HashSet::new());
        self.collect_block_decls(body);
        self.stmts(body);
        self.scopes.pop();
    }

    fn function(&mut self, func: &Func, own_name: Option<&str>) {
        self.scopes.push(HashSet::new());
        if let Some(name) = own_name {
            self.declare(name);
        }
        for param in &func.params {
            self.declare(param);
        }
        if let Some(rest) = &func.rest {
            self.declare(rest);
        }
        self.collect_block_decls(&func.body);
        self.collect_var_decls(&func.body);
        self.stmts(&func.body);
        self.scopes.pop();
    }

    fn class(&mut self, class: &Class, own_name: Option<&str>) {
        self.scopes.push(HashSet::new());
        if let Some(name) = own_name {
            self.declare(name);
        }
        if let Some(superclass) = &class.superclass {
            self.expr(superclass);
        }
        for method in &class.methods {
            if let PropKey::Computed(key) = &method.key {
                self.expr(key);
            }
            self.function(&method.func, None);
        }
        self.scopes.pop();
    }

    fn expr(&mut self, e: &Expr) {
        match e {
            Expr::Ident(name) => self.resolve(name),
            Expr::This
            | Expr::Null
            | Expr::Bool(_)
            | Expr::Num(_)
            | Expr::Str(_)
            | Expr::Regex(_) => {}
            Expr::Template(parts) => {
                for part in parts {
                    if let TemplatePart::Expr(e) = part {
                        self.expr(e);
                    }
                }
            }
            Expr::Array(elements) => {
                for el in elements {
                    self.expr_or_spread(el);
                }
            }
            Expr::Object(properties) => {
                for prop in properties {
                    match prop {
                        Property::Shorthand(name) => self.resolve(name),
                        Property::KeyValue { key, value } => {
                            if let PropKey::Computed(key) = key {
                                self.expr(key);
                            }
                            self.expr(value);
                        }
                        Property::Method { key, func, .. } => {
                            if let PropKey::Computed(key) = key {
                                self.expr(key);
                            }
                            self.function(func, None);
                        }
                        Property::Spread(e) => self.expr(e),
                    }
                }
            }
            Expr::Func { name, func } => self.function(func, name.as_deref()),
            Expr::Class { name, class } => self.class(class, name.as_deref()),
            Expr::Arrow { params, rest, body } => {
                self.scopes.push(HashSet::new());
                for param in params {
                    self.declare(param);
                }
                if let Some(rest) = rest {
                    self.declare(rest);
                }
                match body {
                    ArrowBody::Expr(e) => self.expr(e),
                    ArrowBody::Block(body) => {
                        self.collect_block_decls(body);
                        self.collect_var_decls(body);
                        self.stmts(body);
                    }
                }
                self.scopes.pop();
            }
            Expr::Unary { expr, .. } => self.expr(expr),
            Expr::Update { target, .. } => self.expr(target),
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            Expr::Assign { target, value, .. } => {
                self.expr(target);
                self.expr(value);
            }
            Expr::Cond {
                test,
                consequent,
                alternate,
            } => {
                self.expr(test);
                self.expr(consequent);
                self.expr(alternate);
            }
            Expr::Call { callee, args } | Expr::New { callee, args } => {
                self.expr(callee);
                for arg in args {
                    self.expr_or_spread(arg);
                }
            }
            Expr::Member { object, property } => {
                self.expr(object);
                if let MemberProp::Computed(prop) = property {
                    self.expr(prop);
                }
            }
            Expr::Seq(exprs) => {
                for e in exprs {
                    self.expr(e);
                }
            }
        }
    }

    fn expr_or_spread(&mut self, e: &ExprOrSpread) {
        match e {
            ExprOrSpread::Expr(e) | ExprOrSpread::Spread(e) => self.expr(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_script;

    fn free(src: &str) -> Vec<String> {
        free_variables(&parse_script(src).unwrap())
            .into_iter()
            .collect()
    }

    #[test]
    fn hoisting() {
        assert_eq!(free("f(); function f() {}"), Vec::<String>::new());
        assert_eq!(free("{ var x = 1; } x;"), Vec::<String>::new());
        assert_eq!(free("{ let x = 1; } x;"), vec!["x"]);
    }

    #[test]
    fn properties_are_not_references() {
        assert_eq!(free("var a = {}; a.window;"), Vec::<String>::new());
        assert_eq!(free("var a = { b: 1 };"), Vec::<String>::new());
        assert_eq!(free("var a = { b };"), vec!["b"]);
    }

    #[test]
    fn parameters_bind() {
        assert_eq!(
            free("(function (a, ...r) { return a + r + b; })();"),
            vec!["b"]
        );
    }

    #[test]
    fn catch_param_binds() {
        assert_eq!(free("try {} catch (e) { e; }"), Vec::<String>::new());
    }

    #[test]
    fn assignment_target_is_reference() {
        assert_eq!(free("x = 1;"), vec!["x"]);
    }
}
