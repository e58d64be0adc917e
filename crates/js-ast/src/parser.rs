//! Recursive-descent parser over a pre-lexed token buffer.
//!
//! Supports the subset described in [`crate::ast`], with automatic semicolon
//! insertion and the restricted productions after `return`, `throw`, `break`
//! and `continue`.

use crate::ast::*;
use crate::lexer::{self, LexError, Lexer, TemplateRaw, Tok, Token};
use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

/// A parse failure, with the 1-indexed line/column it occurred at.
#[derive(Debug, Clone)]
pub struct Error {
    inner: Box<ErrorInner>,
}

#[derive(Debug, Clone)]
enum ErrorInner {
    Lex(LexError),
    Custom {
        line: usize,
        col: usize,
        message: String,
    },
}

impl Error {
    fn new(line: usize, col: usize, message: String) -> Error {
        Error {
            inner: Box::new(ErrorInner::Custom { line, col, message }),
        }
    }

    pub fn line(&self) -> usize {
        match &*self.inner {
            ErrorInner::Lex(e) => e.line(),
            ErrorInner::Custom { line, .. } => *line,
        }
    }

    pub fn col(&self) -> usize {
        match &*self.inner {
            ErrorInner::Lex(e) => e.col(),
            ErrorInner::Custom { col, .. } => *col,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.inner {
            ErrorInner::Lex(e) => e.fmt(f),
            ErrorInner::Custom { line, col, message } => {
                write!(f, "{}:{}: {}", line + 1, col + 1, message)
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<LexError> for Error {
    fn from(e: LexError) -> Error {
        Error {
            inner: Box::new(ErrorInner::Lex(e)),
        }
    }
}

/// Words that may never be used as a binding or expression identifier.
const RESERVED: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete",
    "do", "else", "export", "extends", "finally", "for", "function", "if", "import", "in",
    "instanceof", "let", "new", "return", "super", "switch", "this", "throw", "try", "typeof",
    "var", "void", "while", "with",
];

pub fn is_reserved_word(word: &str) -> bool {
    RESERVED.contains(&word) || matches!(word, "true" | "false" | "null")
}

/// Parses an ES module: statements plus import/export declarations.
pub fn parse_module(input: &str) -> Result<Module> {
    let mut p = Parser::new(input)?;
    let mut items = Vec::new();
    while p.peek().is_some() {
        items.push(p.module_item()?);
    }
    Ok(Module { items })
}

/// Parses a classic script: a directive prologue followed by statements.
pub fn parse_script(input: &str) -> Result<Script> {
    let mut p = Parser::new(input)?;
    let directives = p.directive_prologue();
    let mut body = Vec::new();
    while p.peek().is_some() {
        body.push(p.statement()?);
    }
    Ok(Script { directives, body })
}

/// Parses a statement list with no directive prologue, for code fragments.
pub fn parse_statements(input: &str) -> Result<Vec<Stmt>> {
    let mut p = Parser::new(input)?;
    let mut body = Vec::new();
    while p.peek().is_some() {
        body.push(p.statement()?);
    }
    Ok(body)
}

/// Parses a single expression; trailing tokens are an error.
pub fn parse_expr(input: &str) -> Result<Expr> {
    let mut p = Parser::new(input)?;
    let expr = p.expression(false)?;
    match p.peek() {
        Some(_) => Err(p.err("extra tokens remaining after expression")),
        None => Ok(expr),
    }
}

struct Parser<'a> {
    input: &'a str,
    toks: Vec<Tok>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Result<Parser<'a>> {
        Ok(Parser {
            input,
            toks: Lexer::tokenize(input)?,
            pos: 0,
        })
    }

    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn peek_at(&self, n: usize) -> Option<&Tok> {
        self.toks.get(self.pos + n)
    }

    fn bump(&mut self) -> Result<Tok> {
        match self.toks.get(self.pos) {
            Some(t) => {
                let t = t.clone();
                self.pos += 1;
                Ok(t)
            }
            None => Err(self.err("unexpected end of input")),
        }
    }

    fn err(&self, message: impl Into<String>) -> Error {
        let pos = match self.peek() {
            Some(t) => t.pos,
            None => self.input.len(),
        };
        let (line, col) = lexer::line_col(self.input, pos);
        Error::new(line, col, message.into())
    }

    fn is_punct(&self, p: &str) -> bool {
        matches!(self.peek(), Some(Tok { token: Token::Punct(q), .. }) if *q == p)
    }

    fn is_punct_at(&self, n: usize, p: &str) -> bool {
        matches!(self.peek_at(n), Some(Tok { token: Token::Punct(q), .. }) if *q == p)
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.is_punct(p) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: &str) -> Result<()> {
        if self.eat_punct(p) {
            Ok(())
        } else {
            Err(self.err(format!("expected `{p}`")))
        }
    }

    fn is_word(&self, w: &str) -> bool {
        matches!(self.peek(), Some(Tok { token: Token::Word(q), .. }) if q == w)
    }

    fn eat_word(&mut self, w: &str) -> bool {
        if self.is_word(w) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_word(&mut self, w: &str) -> Result<()> {
        if self.eat_word(w) {
            Ok(())
        } else {
            Err(self.err(format!("expected `{w}`")))
        }
    }

    /// Consumes a non-reserved identifier.
    fn ident(&mut self) -> Result<String> {
        match self.peek() {
            Some(Tok { token: Token::Word(w), .. }) if !is_reserved_word(w) => {
                let w = w.clone();
                self.pos += 1;
                Ok(w)
            }
            Some(Tok { token: Token::Word(w), .. }) => {
                Err(self.err(format!("`{w}` is a reserved word")))
            }
            _ => Err(self.err("expected an identifier")),
        }
    }

    /// Consumes any word, for positions where keywords are legal property
    /// names.
    fn property_word(&mut self) -> Result<String> {
        match self.peek() {
            Some(Tok { token: Token::Word(w), .. }) => {
                let w = w.clone();
                self.pos += 1;
                Ok(w)
            }
            _ => Err(self.err("expected a property name")),
        }
    }

    fn newline_before(&self) -> bool {
        match self.peek() {
            Some(t) => t.newline_before,
            None => true,
        }
    }

    /// Automatic semicolon insertion: a `;`, a `}`, end of input, or a line
    /// break terminates the statement.
    fn semicolon(&mut self) -> Result<()> {
        if self.eat_punct(";") {
            return Ok(());
        }
        if self.peek().is_none() || self.is_punct("}") || self.newline_before() {
            return Ok(());
        }
        Err(self.err("expected `;`"))
    }

    fn directive_prologue(&mut self) -> Vec<String> {
        let mut directives = Vec::new();
        loop {
            match self.peek() {
                Some(Tok { token: Token::Str(s), .. }) => {
                    let terminated = match self.peek_at(1) {
                        None => true,
                        Some(Tok { token: Token::Punct(";"), .. }) => true,
                        Some(t) => t.newline_before,
                    };
                    if !terminated {
                        return directives;
                    }
                    directives.push(s.clone());
                    self.pos += 1;
                    self.eat_punct(";");
                }
                _ => return directives,
            }
        }
    }

    // ==== modules =========================================================

    fn module_item(&mut self) -> Result<ModuleItem> {
        if self.is_word("import") {
            Ok(ModuleItem::Import(self.import_decl()?))
        } else if self.is_word("export") {
            Ok(ModuleItem::Export(self.export_decl()?))
        } else {
            Ok(ModuleItem::Stmt(self.statement()?))
        }
    }

    fn import_decl(&mut self) -> Result<ImportDecl> {
        self.expect_word("import")?;

        if let Some(Tok { token: Token::Str(module), .. }) = self.peek() {
            let module = module.clone();
            self.pos += 1;
            self.semicolon()?;
            return Ok(ImportDecl {
                default_binding: None,
                namespace_binding: None,
                named: Vec::new(),
                module,
            });
        }

        let mut default_binding = None;
        let mut namespace_binding = None;
        let mut named = Vec::new();

        if !self.is_punct("{") && !self.is_punct("*") {
            default_binding = Some(self.ident()?);
            if !self.eat_punct(",") {
                return self.import_from(default_binding, namespace_binding, named);
            }
        }

        if self.eat_punct("*") {
            self.expect_word("as")?;
            namespace_binding = Some(self.ident()?);
        } else {
            self.expect_punct("{")?;
            while !self.eat_punct("}") {
                let first = self.property_word()?;
                let spec = if self.eat_word("as") {
                    ImportSpecifier {
                        imported: Some(first),
                        local: self.ident()?,
                    }
                } else {
                    if is_reserved_word(&first) {
                        return Err(self.err(format!("`{first}` is a reserved word")));
                    }
                    ImportSpecifier {
                        imported: None,
                        local: first,
                    }
                };
                named.push(spec);
                if !self.eat_punct(",") {
                    self.expect_punct("}")?;
                    break;
                }
            }
        }

        self.import_from(default_binding, namespace_binding, named)
    }

    fn import_from(
        &mut self,
        default_binding: Option<String>,
        namespace_binding: Option<String>,
        named: Vec<ImportSpecifier>,
    ) -> Result<ImportDecl> {
        self.expect_word("from")?;
        let module = match self.bump()? {
            Tok { token: Token::Str(s), .. } => s,
            _ => return Err(self.err("expected a module specifier string")),
        };
        self.semicolon()?;
        Ok(ImportDecl {
            default_binding,
            namespace_binding,
            named,
            module,
        })
    }

    fn export_decl(&mut self) -> Result<ExportDecl> {
        self.expect_word("export")?;

        if self.eat_punct("{") {
            let mut specifiers = Vec::new();
            while !self.eat_punct("}") {
                let local = self.ident()?;
                let spec = if self.eat_word("as") {
                    ExportSpecifier {
                        local: Some(local),
                        exported: self.property_word()?,
                    }
                } else {
                    ExportSpecifier {
                        local: None,
                        exported: local,
                    }
                };
                specifiers.push(spec);
                if !self.eat_punct(",") {
                    self.expect_punct("}")?;
                    break;
                }
            }
            if self.is_word("from") {
                return Err(self.err("re-exporting from another module is not supported"));
            }
            self.semicolon()?;
            return Ok(ExportDecl::Named(specifiers));
        }

        if self.is_word("default") {
            return Err(self.err("`export default` is not supported"));
        }
        if self.is_word("function")
            || self.is_word("class")
            || self.is_word("var")
            || self.is_word("let")
            || self.is_word("const")
        {
            return Ok(ExportDecl::Decl(self.statement()?));
        }
        Err(self.err("expected a declaration or `{` after `export`"))
    }

    // ==== statements ======================================================

    fn statement(&mut self) -> Result<Stmt> {
        if self.is_punct("{") {
            return Ok(Stmt::Block(self.block()?));
        }
        if self.eat_punct(";") {
            return Ok(Stmt::Empty);
        }

        let word = match self.peek() {
            Some(Tok { token: Token::Word(w), .. }) => Some(w.clone()),
            _ => None,
        };
        match word.as_deref() {
            Some("var") | Some("let") | Some("const") => self.var_statement(),
            Some("function") => {
                self.pos += 1;
                let name = self.ident()?;
                let func = self.function_rest()?;
                Ok(Stmt::Func(FuncDecl { name, func }))
            }
            Some("class") => {
                self.pos += 1;
                let name = self.ident()?;
                let class = self.class_tail()?;
                Ok(Stmt::Class(ClassDecl { name, class }))
            }
            Some("if") => self.if_statement(),
            Some("return") => {
                self.pos += 1;
                let arg = if self.peek().is_none()
                    || self.is_punct(";")
                    || self.is_punct("}")
                    || self.newline_before()
                {
                    None
                } else {
                    Some(self.expression(false)?)
                };
                self.semicolon()?;
                Ok(Stmt::Return(arg))
            }
            Some("throw") => {
                self.pos += 1;
                if self.newline_before() {
                    return Err(self.err("illegal newline after `throw`"));
                }
                let arg = self.expression(false)?;
                self.semicolon()?;
                Ok(Stmt::Throw(arg))
            }
            Some("try") => self.try_statement(),
            Some("while") => {
                self.pos += 1;
                self.expect_punct("(")?;
                let test = self.expression(false)?;
                self.expect_punct(")")?;
                let body = Box::new(self.statement()?);
                Ok(Stmt::While { test, body })
            }
            Some("do") => {
                self.pos += 1;
                let body = Box::new(self.statement()?);
                self.expect_word("while")?;
                self.expect_punct("(")?;
                let test = self.expression(false)?;
                self.expect_punct(")")?;
                self.eat_punct(";");
                Ok(Stmt::DoWhile { body, test })
            }
            Some("for") => self.for_statement(),
            Some("switch") => self.switch_statement(),
            Some("break") | Some("continue") => {
                let is_break = word.as_deref() == Some("break");
                self.pos += 1;
                let label = match self.peek() {
                    Some(Tok { token: Token::Word(w), newline_before: false, .. })
                        if !is_reserved_word(w) =>
                    {
                        let w = w.clone();
                        self.pos += 1;
                        Some(w)
                    }
                    _ => None,
                };
                self.semicolon()?;
                Ok(if is_break {
                    Stmt::Break(label)
                } else {
                    Stmt::Continue(label)
                })
            }
            Some(w) if !is_reserved_word(w) && self.is_punct_at(1, ":") => {
                let label = w.to_string();
                self.pos += 2;
                let body = Box::new(self.statement()?);
                Ok(Stmt::Labeled { label, body })
            }
            _ => {
                let expr = self.expression(false)?;
                self.semicolon()?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn block(&mut self) -> Result<Vec<Stmt>> {
        self.expect_punct("{")?;
        let mut body = Vec::new();
        while !self.eat_punct("}") {
            if self.peek().is_none() {
                return Err(self.err("expected `}`"));
            }
            body.push(self.statement()?);
        }
        Ok(body)
    }

    fn var_kind(&mut self) -> Result<VarKind> {
        let kind = if self.eat_word("var") {
            VarKind::Var
        } else if self.eat_word("let") {
            VarKind::Let
        } else if self.eat_word("const") {
            VarKind::Const
        } else {
            return Err(self.err("expected `var`, `let` or `const`"));
        };
        Ok(kind)
    }

    fn var_statement(&mut self) -> Result<Stmt> {
        let kind = self.var_kind()?;
        let declarators = self.declarators(false)?;
        self.semicolon()?;
        Ok(Stmt::VarDecl { kind, declarators })
    }

    fn declarators(&mut self, no_in: bool) -> Result<Vec<VarDeclarator>> {
        let mut declarators = Vec::new();
        loop {
            let name = self.ident()?;
            let init = if self.eat_punct("=") {
                Some(self.assignment(no_in)?)
            } else {
                None
            };
            declarators.push(VarDeclarator { name, init });
            if !self.eat_punct(",") {
                return Ok(declarators);
            }
        }
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        self.expect_word("if")?;
        self.expect_punct("(")?;
        let test = self.expression(false)?;
        self.expect_punct(")")?;
        let consequent = Box::new(self.statement()?);
        let alternate = if self.eat_word("else") {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            test,
            consequent,
            alternate,
        })
    }

    fn try_statement(&mut self) -> Result<Stmt> {
        self.expect_word("try")?;
        let block = self.block()?;
        let catch = if self.eat_word("catch") {
            let param = if self.eat_punct("(") {
                let p = self.ident()?;
                self.expect_punct(")")?;
                Some(p)
            } else {
                None
            };
            Some(CatchClause {
                param,
                body: self.block()?,
            })
        } else {
            None
        };
        let finally = if self.eat_word("finally") {
            Some(self.block()?)
        } else {
            None
        };
        if catch.is_none() && finally.is_none() {
            return Err(self.err("expected `catch` or `finally` after `try` block"));
        }
        Ok(Stmt::Try {
            block,
            catch,
            finally,
        })
    }

    fn for_statement(&mut self) -> Result<Stmt> {
        self.expect_word("for")?;
        self.expect_punct("(")?;

        let init = if self.eat_punct(";") {
            None
        } else if self.is_word("var") || self.is_word("let") || self.is_word("const") {
            let kind = self.var_kind()?;
            let name = self.ident()?;
            if self.is_word("of") || self.is_word("in") {
                let of = self.eat_word("of");
                if !of {
                    self.expect_word("in")?;
                }
                let right = self.expression(false)?;
                self.expect_punct(")")?;
                let body = Box::new(self.statement()?);
                return Ok(Stmt::ForIn {
                    left: ForHead::VarDecl { kind, name },
                    right,
                    body,
                    of,
                });
            }
            let init = if self.eat_punct("=") {
                Some(self.assignment(true)?)
            } else {
                None
            };
            let mut declarators = vec![VarDeclarator { name, init }];
            if self.eat_punct(",") {
                declarators.extend(self.declarators(true)?);
            }
            self.expect_punct(";")?;
            Some(ForInit::VarDecl { kind, declarators })
        } else {
            let expr = self.expression(true)?;
            if self.is_word("of") || self.is_word("in") {
                let of = self.eat_word("of");
                if !of {
                    self.expect_word("in")?;
                }
                let right = self.expression(false)?;
                self.expect_punct(")")?;
                let body = Box::new(self.statement()?);
                return Ok(Stmt::ForIn {
                    left: ForHead::Target(expr),
                    right,
                    body,
                    of,
                });
            }
            self.expect_punct(";")?;
            Some(ForInit::Expr(expr))
        };

        let test = if self.is_punct(";") {
            None
        } else {
            Some(self.expression(false)?)
        };
        self.expect_punct(";")?;
        let update = if self.is_punct(")") {
            None
        } else {
            Some(self.expression(false)?)
        };
        self.expect_punct(")")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::For {
            init,
            test,
            update,
            body,
        })
    }

    fn switch_statement(&mut self) -> Result<Stmt> {
        self.expect_word("switch")?;
        self.expect_punct("(")?;
        let discriminant = self.expression(false)?;
        self.expect_punct(")")?;
        self.expect_punct("{")?;
        let mut cases = Vec::new();
        while !self.eat_punct("}") {
            let test = if self.eat_word("case") {
                Some(self.expression(false)?)
            } else if self.eat_word("default") {
                None
            } else {
                return Err(self.err("expected `case`, `default` or `}`"));
            };
            self.expect_punct(":")?;
            let mut body = Vec::new();
            while !self.is_punct("}") && !self.is_word("case") && !self.is_word("default") {
                body.push(self.statement()?);
            }
            cases.push(SwitchCase { test, body });
        }
        Ok(Stmt::Switch {
            discriminant,
            cases,
        })
    }

    // ==== functions and classes ===========================================

    /// Parses `(params) { body }`, the name (if any) already consumed.
    fn function_rest(&mut self) -> Result<Func> {
        let (params, rest) = self.params()?;
        let body = self.block()?;
        Ok(Func { params, rest, body })
    }

    fn params(&mut self) -> Result<(Vec<String>, Option<String>)> {
        self.expect_punct("(")?;
        let mut params = Vec::new();
        let mut rest = None;
        while !self.eat_punct(")") {
            if self.eat_punct("...") {
                rest = Some(self.ident()?);
                self.expect_punct(")")?;
                break;
            }
            params.push(self.ident()?);
            if !self.eat_punct(",") {
                self.expect_punct(")")?;
                break;
            }
        }
        Ok((params, rest))
    }

    fn class_tail(&mut self) -> Result<Class> {
        let superclass = if self.eat_word("extends") {
            Some(Box::new(self.lhs_expression()?))
        } else {
            None
        };
        self.expect_punct("{")?;
        let mut methods = Vec::new();
        while !self.eat_punct("}") {
            if self.eat_punct(";") {
                continue;
            }
            let is_static = self.is_word("static") && !self.is_punct_at(1, "(");
            if is_static {
                self.pos += 1;
            }
            let kind = self.accessor_kind();
            let key = self.property_key()?;
            let func = self.function_rest()?;
            methods.push(ClassMethod {
                is_static,
                kind,
                key,
                func,
            });
        }
        Ok(Class {
            superclass,
            methods,
        })
    }

    /// Detects a `get`/`set` accessor prefix: the word `get` or `set`
    /// followed by a property key rather than `(`.
    fn accessor_kind(&mut self) -> MethodKind {
        let kind = if self.is_word("get") {
            MethodKind::Get
        } else if self.is_word("set") {
            MethodKind::Set
        } else {
            return MethodKind::Method;
        };
        let key_follows = matches!(
            self.peek_at(1),
            Some(Tok { token: Token::Word(_), .. })
                | Some(Tok { token: Token::Str(_), .. })
                | Some(Tok { token: Token::Num(_), .. })
        ) || self.is_punct_at(1, "[");
        if key_follows {
            self.pos += 1;
            kind
        } else {
            MethodKind::Method
        }
    }

    fn property_key(&mut self) -> Result<PropKey> {
        if self.eat_punct("[") {
            let expr = self.assignment(false)?;
            self.expect_punct("]")?;
            return Ok(PropKey::Computed(expr));
        }
        match self.bump()? {
            Tok { token: Token::Word(w), .. } => Ok(PropKey::Ident(w)),
            Tok { token: Token::Str(s), .. } => Ok(PropKey::Str(s)),
            Tok { token: Token::Num(n), .. } => Ok(PropKey::Num(n)),
            _ => Err(self.err("expected a property key")),
        }
    }

    // ==== expressions =====================================================

    /// Comma-sequence expression. `no_in` suppresses the `in` operator, for
    /// `for` statement heads.
    fn expression(&mut self, no_in: bool) -> Result<Expr> {
        let first = self.assignment(no_in)?;
        if !self.is_punct(",") {
            return Ok(first);
        }
        let mut exprs = vec![first];
        while self.eat_punct(",") {
            exprs.push(self.assignment(no_in)?);
        }
        Ok(Expr::Seq(exprs))
    }

    fn assignment(&mut self, no_in: bool) -> Result<Expr> {
        // Arrow functions: `x => ...` or `(a, b) => ...`.
        if let Some(Tok { token: Token::Word(w), .. }) = self.peek() {
            if !is_reserved_word(w) && self.is_punct_at(1, "=>") {
                let param = w.clone();
                self.pos += 2;
                let body = self.arrow_body(no_in)?;
                return Ok(Expr::Arrow {
                    params: vec![param],
                    rest: None,
                    body,
                });
            }
        }
        if self.is_punct("(") && self.arrow_ahead() {
            let (params, rest) = self.params()?;
            self.expect_punct("=>")?;
            let body = self.arrow_body(no_in)?;
            return Ok(Expr::Arrow { params, rest, body });
        }

        let expr = self.conditional(no_in)?;

        let op = match self.peek() {
            Some(Tok { token: Token::Punct(p), .. }) => match *p {
                "=" => Some(AssignOp::Assign),
                "+=" => Some(AssignOp::Add),
                "-=" => Some(AssignOp::Sub),
                "*=" => Some(AssignOp::Mul),
                "/=" => Some(AssignOp::Div),
                "%=" => Some(AssignOp::Rem),
                "**=" => Some(AssignOp::Exp),
                "<<=" => Some(AssignOp::Shl),
                ">>=" => Some(AssignOp::Shr),
                ">>>=" => Some(AssignOp::UShr),
                "&=" => Some(AssignOp::BitAnd),
                "|=" => Some(AssignOp::BitOr),
                "^=" => Some(AssignOp::BitXor),
                _ => None,
            },
            _ => None,
        };
        if let Some(op) = op {
            if !matches!(expr, Expr::Ident(_) | Expr::Member { .. }) {
                return Err(self.err("invalid assignment target"));
            }
            self.pos += 1;
            let value = self.assignment(no_in)?;
            return Ok(Expr::Assign {
                op,
                target: Box::new(expr),
                value: Box::new(value),
            });
        }
        Ok(expr)
    }

    /// Looks ahead from a `(` for a matching `)` followed by `=>`.
    fn arrow_ahead(&self) -> bool {
        let mut depth = 0usize;
        let mut n = 0usize;
        while let Some(tok) = self.peek_at(n) {
            match &tok.token {
                Token::Punct("(") => depth += 1,
                Token::Punct(")") => {
                    depth -= 1;
                    if depth == 0 {
                        return self.is_punct_at(n + 1, "=>");
                    }
                }
                _ => {}
            }
            n += 1;
        }
        false
    }

    fn arrow_body(&mut self, no_in: bool) -> Result<ArrowBody> {
        if self.is_punct("{") {
            Ok(ArrowBody::Block(self.block()?))
        } else {
            Ok(ArrowBody::Expr(Box::new(self.assignment(no_in)?)))
        }
    }

    fn conditional(&mut self, no_in: bool) -> Result<Expr> {
        let test = self.binary(no_in, 0)?;
        if !self.eat_punct("?") {
            return Ok(test);
        }
        let consequent = self.assignment(false)?;
        self.expect_punct(":")?;
        let alternate = self.assignment(no_in)?;
        Ok(Expr::Cond {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn binary(&mut self, no_in: bool, min_prec: u8) -> Result<Expr> {
        let mut left = self.unary(no_in)?;
        loop {
            let (prec, right_assoc, op) = match self.binary_op(no_in) {
                Some(v) => v,
                None => return Ok(left),
            };
            if prec < min_prec {
                return Ok(left);
            }
            self.pos += 1;
            let next_min = if right_assoc { prec } else { prec + 1 };
            let right = self.binary(no_in, next_min)?;
            left = match op {
                BinOrLogical::Binary(op) => Expr::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                BinOrLogical::Logical(op) => Expr::Logical {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
        }
    }

    fn binary_op(&self, no_in: bool) -> Option<(u8, bool, BinOrLogical)> {
        use BinOrLogical::*;
        let tok = self.peek()?;
        let (prec, right_assoc, op) = match &tok.token {
            Token::Punct(p) => match *p {
                "??" => (1, false, Logical(LogicalOp::Nullish)),
                "||" => (2, false, Logical(LogicalOp::Or)),
                "&&" => (3, false, Logical(LogicalOp::And)),
                "|" => (4, false, Binary(BinaryOp::BitOr)),
                "^" => (5, false, Binary(BinaryOp::BitXor)),
                "&" => (6, false, Binary(BinaryOp::BitAnd)),
                "==" => (7, false, Binary(BinaryOp::Eq)),
                "!=" => (7, false, Binary(BinaryOp::NotEq)),
                "===" => (7, false, Binary(BinaryOp::StrictEq)),
                "!==" => (7, false, Binary(BinaryOp::StrictNotEq)),
                "<" => (8, false, Binary(BinaryOp::Lt)),
                ">" => (8, false, Binary(BinaryOp::Gt)),
                "<=" => (8, false, Binary(BinaryOp::LtEq)),
                ">=" => (8, false, Binary(BinaryOp::GtEq)),
                "<<" => (9, false, Binary(BinaryOp::Shl)),
                ">>" => (9, false, Binary(BinaryOp::Shr)),
                ">>>" => (9, false, Binary(BinaryOp::UShr)),
                "+" => (10, false, Binary(BinaryOp::Add)),
                "-" => (10, false, Binary(BinaryOp::Sub)),
                "*" => (11, false, Binary(BinaryOp::Mul)),
                "/" => (11, false, Binary(BinaryOp::Div)),
                "%" => (11, false, Binary(BinaryOp::Rem)),
                "**" => (12, true, Binary(BinaryOp::Exp)),
                _ => return None,
            },
            Token::Word(w) => match w.as_str() {
                "in" if !no_in => (8, false, Binary(BinaryOp::In)),
                "instanceof" => (8, false, Binary(BinaryOp::Instanceof)),
                _ => return None,
            },
            _ => return None,
        };
        Some((prec, right_assoc, op))
    }

    fn unary(&mut self, no_in: bool) -> Result<Expr> {
        let op = match self.peek() {
            Some(Tok { token: Token::Punct(p), .. }) => match *p {
                "!" => Some(UnaryOp::Not),
                "~" => Some(UnaryOp::BitNot),
                "+" => Some(UnaryOp::Plus),
                "-" => Some(UnaryOp::Minus),
                "++" | "--" => {
                    let op = if *p == "++" { UpdateOp::Incr } else { UpdateOp::Decr };
                    self.pos += 1;
                    let target = self.unary(no_in)?;
                    return Ok(Expr::Update {
                        op,
                        prefix: true,
                        target: Box::new(target),
                    });
                }
                _ => None,
            },
            Some(Tok { token: Token::Word(w), .. }) => match w.as_str() {
                "typeof" => Some(UnaryOp::Typeof),
                "void" => Some(UnaryOp::Void),
                "delete" => Some(UnaryOp::Delete),
                _ => None,
            },
            _ => None,
        };
        if let Some(op) = op {
            self.pos += 1;
            let expr = self.unary(no_in)?;
            return Ok(Expr::Unary {
                op,
                expr: Box::new(expr),
            });
        }

        let expr = self.lhs_expression()?;

        // Postfix update, forbidden across a line break.
        if (self.is_punct("++") || self.is_punct("--")) && !self.newline_before() {
            let op = if self.is_punct("++") {
                UpdateOp::Incr
            } else {
                UpdateOp::Decr
            };
            self.pos += 1;
            return Ok(Expr::Update {
                op,
                prefix: false,
                target: Box::new(expr),
            });
        }
        Ok(expr)
    }

    /// LeftHandSideExpression: primary or `new`, followed by member accesses
    /// and calls.
    fn lhs_expression(&mut self) -> Result<Expr> {
        let mut expr = if self.is_word("new") {
            self.new_expression()?
        } else {
            self.primary()?
        };
        loop {
            if self.eat_punct(".") {
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: MemberProp::Static(self.property_word()?),
                };
            } else if self.eat_punct("[") {
                let prop = self.expression(false)?;
                self.expect_punct("]")?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: MemberProp::Computed(Box::new(prop)),
                };
            } else if self.is_punct("(") {
                let args = self.arguments()?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn new_expression(&mut self) -> Result<Expr> {
        self.expect_word("new")?;
        let mut callee = if self.is_word("new") {
            self.new_expression()?
        } else {
            self.primary()?
        };
        // Member accesses bind to the constructor, calls do not.
        loop {
            if self.eat_punct(".") {
                callee = Expr::Member {
                    object: Box::new(callee),
                    property: MemberProp::Static(self.property_word()?),
                };
            } else if self.eat_punct("[") {
                let prop = self.expression(false)?;
                self.expect_punct("]")?;
                callee = Expr::Member {
                    object: Box::new(callee),
                    property: MemberProp::Computed(Box::new(prop)),
                };
            } else {
                break;
            }
        }
        let args = if self.is_punct("(") {
            self.arguments()?
        } else {
            Vec::new()
        };
        Ok(Expr::New {
            callee: Box::new(callee),
            args,
        })
    }

    fn arguments(&mut self) -> Result<Vec<ExprOrSpread>> {
        self.expect_punct("(")?;
        let mut args = Vec::new();
        while !self.eat_punct(")") {
            if self.eat_punct("...") {
                args.push(ExprOrSpread::Spread(self.assignment(false)?));
            } else {
                args.push(ExprOrSpread::Expr(self.assignment(false)?));
            }
            if !self.eat_punct(",") {
                self.expect_punct(")")?;
                break;
            }
        }
        Ok(args)
    }

    fn primary(&mut self) -> Result<Expr> {
        let tok = match self.peek() {
            Some(t) => t.clone(),
            None => return Err(self.err("unexpected end of input")),
        };
        match tok.token {
            Token::Num(n) => {
                self.pos += 1;
                Ok(Expr::Num(n))
            }
            Token::Str(s) => {
                self.pos += 1;
                Ok(Expr::Str(s))
            }
            Token::Regex(r) => {
                self.pos += 1;
                Ok(Expr::Regex(r))
            }
            Token::Template(raws) => {
                self.pos += 1;
                let mut parts = Vec::new();
                for raw in raws {
                    match raw {
                        TemplateRaw::Chunk(c) => parts.push(TemplatePart::Chunk(c)),
                        TemplateRaw::Expr(src) => {
                            parts.push(TemplatePart::Expr(parse_expr(&src)?))
                        }
                    }
                }
                Ok(Expr::Template(parts))
            }
            Token::Punct("(") => {
                self.pos += 1;
                let expr = self.expression(false)?;
                self.expect_punct(")")?;
                Ok(expr)
            }
            Token::Punct("[") => self.array_literal(),
            Token::Punct("{") => self.object_literal(),
            Token::Word(w) => match w.as_str() {
                "function" => {
                    self.pos += 1;
                    let name = match self.peek() {
                        Some(Tok { token: Token::Word(n), .. }) if !is_reserved_word(n) => {
                            let n = n.clone();
                            self.pos += 1;
                            Some(n)
                        }
                        _ => None,
                    };
                    let func = self.function_rest()?;
                    Ok(Expr::Func { name, func })
                }
                "class" => {
                    self.pos += 1;
                    let name = match self.peek() {
                        Some(Tok { token: Token::Word(n), .. }) if !is_reserved_word(n) => {
                            let n = n.clone();
                            self.pos += 1;
                            Some(n)
                        }
                        _ => None,
                    };
                    let class = self.class_tail()?;
                    Ok(Expr::Class { name, class })
                }
                "this" => {
                    self.pos += 1;
                    Ok(Expr::This)
                }
                "true" => {
                    self.pos += 1;
                    Ok(Expr::Bool(true))
                }
                "false" => {
                    self.pos += 1;
                    Ok(Expr::Bool(false))
                }
                "null" => {
                    self.pos += 1;
                    Ok(Expr::Null)
                }
                _ if !is_reserved_word(&w) => {
                    self.pos += 1;
                    Ok(Expr::Ident(w))
                }
                _ => Err(self.err(format!("unexpected keyword `{w}`"))),
            },
            Token::Punct(p) => Err(self.err(format!("unexpected token `{p}`"))),
        }
    }

    fn array_literal(&mut self) -> Result<Expr> {
        self.expect_punct("[")?;
        let mut elements = Vec::new();
        while !self.eat_punct("]") {
            if self.is_punct(",") {
                return Err(self.err("array holes are not supported"));
            }
            if self.eat_punct("...") {
                elements.push(ExprOrSpread::Spread(self.assignment(false)?));
            } else {
                elements.push(ExprOrSpread::Expr(self.assignment(false)?));
            }
            if !self.eat_punct(",") {
                self.expect_punct("]")?;
                break;
            }
        }
        Ok(Expr::Array(elements))
    }

    fn object_literal(&mut self) -> Result<Expr> {
        self.expect_punct("{")?;
        let mut properties = Vec::new();
        while !self.eat_punct("}") {
            if self.eat_punct("...") {
                properties.push(Property::Spread(self.assignment(false)?));
            } else {
                let kind = self.accessor_kind();
                let key = self.property_key()?;
                let prop = if kind != MethodKind::Method {
                    Property::Method {
                        kind,
                        key,
                        func: self.function_rest()?,
                    }
                } else if self.eat_punct(":") {
                    Property::KeyValue {
                        key,
                        value: self.assignment(false)?,
                    }
                } else if self.is_punct("(") {
                    Property::Method {
                        kind: MethodKind::Method,
                        key,
                        func: self.function_rest()?,
                    }
                } else {
                    match key {
                        PropKey::Ident(name) if !is_reserved_word(&name) => {
                            Property::Shorthand(name)
                        }
                        _ => return Err(self.err("expected `:` after property key")),
                    }
                };
                properties.push(prop);
            }
            if !self.eat_punct(",") {
                self.expect_punct("}")?;
                break;
            }
        }
        Ok(Expr::Object(properties))
    }
}

enum BinOrLogical {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asi_inserts_at_newlines() {
        let stmts = parse_statements("a = 1\nb = 2").unwrap();
        assert_eq!(stmts.len(), 2);
    }

    #[test]
    fn restricted_return() {
        let stmts = parse_statements("function f() { return\n1; }").unwrap();
        match &stmts[0] {
            Stmt::Func(f) => {
                assert_eq!(f.func.body[0], Stmt::Return(None));
            }
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn arrow_detection() {
        assert!(matches!(parse_expr("(a, b) => a + b").unwrap(), Expr::Arrow { .. }));
        assert!(matches!(parse_expr("(a, b)").unwrap(), Expr::Seq(_)));
    }

    #[test]
    fn import_forms() {
        let module = parse_module("import $, { ajax as a } from \"jQuery\";").unwrap();
        match &module.items[0] {
            ModuleItem::Import(i) => {
                assert_eq!(i.default_binding.as_deref(), Some("$"));
                assert_eq!(i.named[0].imported.as_deref(), Some("ajax"));
                assert_eq!(i.named[0].local, "a");
                assert_eq!(i.module, "jQuery");
            }
            other => panic!("expected import, got {other:?}"),
        }
    }

    #[test]
    fn new_without_call_parens() {
        let expr = parse_expr("new Foo.Bar").unwrap();
        match expr {
            Expr::New { callee, args } => {
                assert!(args.is_empty());
                assert!(matches!(*callee, Expr::Member { .. }));
            }
            other => panic!("expected new, got {other:?}"),
        }
    }
}
