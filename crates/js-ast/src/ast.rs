//! JavaScript AST node definitions plus a few construction helpers.
//!
//! The node set covers the subset of the language accepted by the parser:
//! identifier bindings only (no destructuring patterns), no generators and no
//! `async`/`await`. That subset is all hand-written linker glue needs, and it
//! keeps scope analysis exact.

/// A complete script: a directive prologue (`"use strict"`) followed by
/// top-level statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub directives: Vec<String>,
    pub body: Vec<Stmt>,
}

/// A parsed ES module: statements interleaved with import/export
/// declarations.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    pub items: Vec<ModuleItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModuleItem {
    Import(ImportDecl),
    Export(ExportDecl),
    Stmt(Stmt),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportDecl {
    pub default_binding: Option<String>,
    pub namespace_binding: Option<String>,
    pub named: Vec<ImportSpecifier>,
    pub module: String,
}

/// `{exported_name?, local_binding_name}`; the name transmitted to the
/// source side is the exported name when present, else the local binding.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportSpecifier {
    pub imported: Option<String>,
    pub local: String,
}

impl ImportSpecifier {
    pub fn imported_name(&self) -> &str {
        self.imported.as_deref().unwrap_or(&self.local)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportDecl {
    /// `export { a, b as c };`
    Named(Vec<ExportSpecifier>),
    /// `export <declaration>` — the declaration plus the specifiers it
    /// implies.
    Decl(Stmt),
}

impl ExportDecl {
    /// The export specifiers this declaration implies: the explicit list for
    /// `export { ... }`, or one specifier per declared name for an exported
    /// declaration.
    pub fn specifiers(&self) -> Vec<ExportSpecifier> {
        match self {
            ExportDecl::Named(specifiers) => specifiers.clone(),
            ExportDecl::Decl(stmt) => match stmt {
                Stmt::Func(f) => vec![ExportSpecifier {
                    local: None,
                    exported: f.name.clone(),
                }],
                Stmt::Class(c) => vec![ExportSpecifier {
                    local: None,
                    exported: c.name.clone(),
                }],
                Stmt::VarDecl { declarators, .. } => declarators
                    .iter()
                    .map(|d| ExportSpecifier {
                        local: None,
                        exported: d.name.clone(),
                    })
                    .collect(),
                _ => Vec::new(),
            },
        }
    }
}

/// `{local_name?, exported_name}`; the source-side reference is the local
/// name when present, else the exported name.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSpecifier {
    pub local: Option<String>,
    pub exported: String,
}

impl ExportSpecifier {
    pub fn local_name(&self) -> &str {
        self.local.as_deref().unwrap_or(&self.exported)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Var,
    Let,
    Const,
}

impl VarKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VarKind::Var => "var",
            VarKind::Let => "let",
            VarKind::Const => "const",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDeclarator {
    pub name: String,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    VarDecl {
        kind: VarKind,
        declarators: Vec<VarDeclarator>,
    },
    Func(FuncDecl),
    Class(ClassDecl),
    Return(Option<Expr>),
    If {
        test: Expr,
        consequent: Box<Stmt>,
        alternate: Option<Box<Stmt>>,
    },
    Block(Vec<Stmt>),
    Throw(Expr),
    Try {
        block: Vec<Stmt>,
        catch: Option<CatchClause>,
        finally: Option<Vec<Stmt>>,
    },
    While {
        test: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        test: Expr,
    },
    For {
        init: Option<ForInit>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    /// Covers both `for-in` (`of == false`) and `for-of` (`of == true`).
    ForIn {
        left: ForHead,
        right: Expr,
        body: Box<Stmt>,
        of: bool,
    },
    Switch {
        discriminant: Expr,
        cases: Vec<SwitchCase>,
    },
    Break(Option<String>),
    Continue(Option<String>),
    Labeled {
        label: String,
        body: Box<Stmt>,
    },
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForInit {
    VarDecl {
        kind: VarKind,
        declarators: Vec<VarDeclarator>,
    },
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForHead {
    VarDecl { kind: VarKind, name: String },
    /// An existing binding or member target.
    Target(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    /// `None` for the `default:` clause.
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub param: Option<String>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    pub name: String,
    pub func: Func,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Func {
    pub params: Vec<String>,
    pub rest: Option<String>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: String,
    pub class: Class,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Class {
    pub superclass: Option<Box<Expr>>,
    pub methods: Vec<ClassMethod>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassMethod {
    pub is_static: bool,
    pub kind: MethodKind,
    pub key: PropKey,
    pub func: Func,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Method,
    Get,
    Set,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Ident(String),
    This,
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    Regex(String),
    Template(Vec<TemplatePart>),
    Array(Vec<ExprOrSpread>),
    Object(Vec<Property>),
    Func {
        name: Option<String>,
        func: Func,
    },
    Class {
        name: Option<String>,
        class: Class,
    },
    Arrow {
        params: Vec<String>,
        rest: Option<String>,
        body: ArrowBody,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Update {
        op: UpdateOp,
        prefix: bool,
        target: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Cond {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<ExprOrSpread>,
    },
    New {
        callee: Box<Expr>,
        args: Vec<ExprOrSpread>,
    },
    Member {
        object: Box<Expr>,
        property: MemberProp,
    },
    Seq(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArrowBody {
    Expr(Box<Expr>),
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberProp {
    Static(String),
    Computed(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprOrSpread {
    Expr(Expr),
    Spread(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Chunk(String),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Shorthand(String),
    KeyValue { key: PropKey, value: Expr },
    Method {
        kind: MethodKind,
        key: PropKey,
        func: Func,
    },
    Spread(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropKey {
    Ident(String),
    Str(String),
    Num(f64),
    Computed(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Minus,
    Plus,
    Not,
    BitNot,
    Typeof,
    Void,
    Delete,
}

impl UnaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOp::Minus => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
            UnaryOp::Typeof => "typeof",
            UnaryOp::Void => "void",
            UnaryOp::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Incr,
    Decr,
}

impl UpdateOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateOp::Incr => "++",
            UpdateOp::Decr => "--",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Exp,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    Shl,
    Shr,
    UShr,
    BitAnd,
    BitOr,
    BitXor,
    In,
    Instanceof,
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        use BinaryOp::*;
        match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Rem => "%",
            Exp => "**",
            Eq => "==",
            NotEq => "!=",
            StrictEq => "===",
            StrictNotEq => "!==",
            Lt => "<",
            Gt => ">",
            LtEq => "<=",
            GtEq => ">=",
            Shl => "<<",
            Shr => ">>",
            UShr => ">>>",
            BitAnd => "&",
            BitOr => "|",
            BitXor => "^",
            In => "in",
            Instanceof => "instanceof",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

impl LogicalOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalOp::And => "&&",
            LogicalOp::Or => "||",
            LogicalOp::Nullish => "??",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Exp,
    Shl,
    Shr,
    UShr,
    BitAnd,
    BitOr,
    BitXor,
}

impl AssignOp {
    pub fn as_str(&self) -> &'static str {
        use AssignOp::*;
        match self {
            Assign => "=",
            Add => "+=",
            Sub => "-=",
            Mul => "*=",
            Div => "/=",
            Rem => "%=",
            Exp => "**=",
            Shl => "<<=",
            Shr => ">>=",
            UShr => ">>>=",
            BitAnd => "&=",
            BitOr => "|=",
            BitXor => "^=",
        }
    }
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Expr {
        Expr::Ident(name.into())
    }

    pub fn str(value: impl Into<String>) -> Expr {
        Expr::Str(value.into())
    }

    pub fn num(value: f64) -> Expr {
        Expr::Num(value)
    }

    /// `object.name`
    pub fn member(object: Expr, name: impl Into<String>) -> Expr {
        Expr::Member {
            object: Box::new(object),
            property: MemberProp::Static(name.into()),
        }
    }

    /// `object[prop]`
    pub fn computed_member(object: Expr, prop: Expr) -> Expr {
        Expr::Member {
            object: Box::new(object),
            property: MemberProp::Computed(Box::new(prop)),
        }
    }

    pub fn call(callee: Expr, args: Vec<Expr>) -> Expr {
        Expr::Call {
            callee: Box::new(callee),
            args: args.into_iter().map(ExprOrSpread::Expr).collect(),
        }
    }

    pub fn new_(callee: Expr, args: Vec<Expr>) -> Expr {
        Expr::New {
            callee: Box::new(callee),
            args: args.into_iter().map(ExprOrSpread::Expr).collect(),
        }
    }

    /// `target = value`
    pub fn assign(target: Expr, value: Expr) -> Expr {
        Expr::Assign {
            op: AssignOp::Assign,
            target: Box::new(target),
            value: Box::new(value),
        }
    }
}
