use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use crate::types::Ty;

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `val x: T = e` or `var x: T = e`.
    Binding {
        name: String,
        declared: Option<Ty>,
        value: Expr,
        mutable: bool,
        span: Range<usize>,
    },
    /// `x = e`.
    Assign {
        name: String,
        value: Expr,
        span: Range<usize>,
    },
    Def(Arc<FnDef>),
    Expr(Expr),
}

impl Stmt {
    pub fn span(&self) -> Range<usize> {
        match self {
            Stmt::Binding { span, .. } | Stmt::Assign { span, .. } => span.clone(),
            Stmt::Def(def) => def.span.clone(),
            Stmt::Expr(expr) => expr.span.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Ty,
}

/// A function definition. Only allowed at the top level of a segment.
#[derive(Debug, Clone, PartialEq)]
pub struct FnDef {
    pub name: String,
    pub params: Vec<Param>,
    /// False for `def f: Int = ...`, which is called without parentheses.
    pub has_parens: bool,
    pub result: Option<Ty>,
    pub body: Expr,
    pub span: Range<usize>,
}

impl FnDef {
    /// `def f(x: Int): Int`, as echoed by the REPL.
    pub fn signature_text(&self, result: Ty) -> String {
        let params = if self.has_parens {
            let list: Vec<String> = self
                .params
                .iter()
                .map(|p| format!("{}: {}", p.name, p.ty))
                .collect();
            format!("({})", list.join(", "))
        } else {
            String::new()
        };
        format!("def {}{}: {}", self.name, params, result)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        };
        f.write_str(symbol)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Int(i64),
    Double(f64),
    Bool(bool),
    Str(String),
    Unit,

    Ident(String),

    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),

    If {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Option<Box<Expr>>,
    },
    While {
        condition: Box<Expr>,
        body: Box<Expr>,
    },
    /// `{ stmt; ...; expr }`: the value of the last statement if it is an
    /// expression, else `()`.
    Block(Vec<Stmt>),

    /// `f(args)`, including the `println`, `print` and `assert` builtins.
    Call { name: String, args: Vec<Expr> },
    /// `sys.error(message)`.
    SysError(Box<Expr>),
    /// `throw new XException(message)`.
    Throw {
        exception: String,
        message: Option<Box<Expr>>,
    },
    /// `target.name` or `target.name()`.
    Member { target: Box<Expr>, name: String },
}

impl Expr {
    pub fn new(kind: ExprKind, span: Range<usize>) -> Self {
        Expr { kind, span }
    }

    /// How the compiler shows a literal's type in a mismatch, e.g.
    /// `String("oops")`.
    pub fn literal_type_text(&self) -> Option<String> {
        match &self.kind {
            ExprKind::Int(n) => Some(format!("Int({})", n)),
            ExprKind::Double(n) => Some(format!("Double({:?})", n)),
            ExprKind::Bool(b) => Some(format!("Boolean({})", b)),
            ExprKind::Str(s) => Some(format!("String({:?})", s)),
            _ => None,
        }
    }
}
