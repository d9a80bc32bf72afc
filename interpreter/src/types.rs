//! Static types and the checker that runs over a whole segment before any
//! of its statements execute.

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

use crate::ast::{BinaryOp, Expr, ExprKind, FnDef, Stmt, UnaryOp};
use crate::environment::Globals;
use crate::error::ReplError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ty {
    Int,
    Double,
    Boolean,
    String,
    Unit,
    /// Type of expressions that never complete: `throw`, `sys.error`.
    Nothing,
    Any,
}

impl Ty {
    pub fn from_name(name: &str) -> Option<Ty> {
        match name {
            "Int" => Some(Ty::Int),
            "Double" => Some(Ty::Double),
            "Boolean" => Some(Ty::Boolean),
            "String" => Some(Ty::String),
            "Unit" => Some(Ty::Unit),
            "Nothing" => Some(Ty::Nothing),
            "Any" => Some(Ty::Any),
            _ => None,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Ty::Int | Ty::Double)
    }

    /// Whether a value of type `self` may be used where `required` is
    /// expected. `Int` widens to `Double`.
    pub fn conforms_to(self, required: Ty) -> bool {
        self == required
            || self == Ty::Nothing
            || required == Ty::Any
            || (self == Ty::Int && required == Ty::Double)
    }

    /// Least upper bound of two branch types.
    pub fn lub(self, other: Ty) -> Ty {
        if self.conforms_to(other) {
            other
        } else if other.conforms_to(self) {
            self
        } else {
            Ty::Any
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Ty::Int => "Int",
            Ty::Double => "Double",
            Ty::Boolean => "Boolean",
            Ty::String => "String",
            Ty::Unit => "Unit",
            Ty::Nothing => "Nothing",
            Ty::Any => "Any",
        };
        f.write_str(name)
    }
}

/// Parameter and result types of a function.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub params: Vec<Ty>,
    pub result: Ty,
}

/// Result type of a member selection, or None if the member does not exist.
pub fn member_type(target: Ty, name: &str) -> Option<Ty> {
    let ty = match (target, name) {
        (_, "toString") => Ty::String,
        (Ty::String, "length") => Ty::Int,
        (Ty::String, "toUpperCase" | "toLowerCase" | "trim") => Ty::String,
        (Ty::String, "isEmpty") => Ty::Boolean,
        (Ty::String | Ty::Int | Ty::Double, "toInt") => Ty::Int,
        (Ty::String | Ty::Int | Ty::Double, "toDouble") => Ty::Double,
        (Ty::Int, "abs") => Ty::Int,
        (Ty::Double, "abs") => Ty::Double,
        _ => return None,
    };
    Some(ty)
}

// ---------------------------------------------------------------------------
// Checker
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct ValueInfo {
    ty: Ty,
    mutable: bool,
}

/// Type-check a segment against the session's committed bindings.
///
/// Returns the static type of each top-level statement (for `def`, its
/// result type). Nothing is committed: the checker sees names introduced by
/// earlier statements of the segment through its own overlay.
pub fn check_program(program: &[Stmt], globals: &Globals) -> Result<Vec<Ty>, ReplError> {
    let mut checker = Checker::new(globals);
    program.iter().map(|stmt| checker.check_top(stmt)).collect()
}

struct Checker<'a> {
    globals: &'a Globals,
    values: HashMap<String, ValueInfo>,
    functions: HashMap<String, Signature>,
    /// Block and parameter scopes, innermost last.
    scopes: Vec<HashMap<String, ValueInfo>>,
    /// Function whose body is being checked without a declared result type.
    inferring: Option<String>,
}

impl<'a> Checker<'a> {
    fn new(globals: &'a Globals) -> Self {
        Checker {
            globals,
            values: HashMap::new(),
            functions: HashMap::new(),
            scopes: Vec::new(),
            inferring: None,
        }
    }

    fn lookup_value(&self, name: &str) -> Option<ValueInfo> {
        for scope in self.scopes.iter().rev() {
            if let Some(info) = scope.get(name) {
                return Some(*info);
            }
        }
        if let Some(info) = self.values.get(name) {
            return Some(*info);
        }
        self.globals.values.get(name).map(|binding| ValueInfo {
            ty: binding.ty,
            mutable: binding.mutable,
        })
    }

    fn lookup_function(&self, name: &str, span: &Range<usize>) -> Result<Option<Signature>, ReplError> {
        if self.inferring.as_deref() == Some(name) {
            return Err(ReplError::type_error(
                format!("recursive method {} needs result type", name),
                span.clone(),
            ));
        }
        if let Some(signature) = self.functions.get(name) {
            return Ok(Some(signature.clone()));
        }
        Ok(self
            .globals
            .functions
            .get(name)
            .map(|function| function.signature.clone()))
    }

    fn check_top(&mut self, stmt: &Stmt) -> Result<Ty, ReplError> {
        match stmt {
            Stmt::Binding {
                name,
                declared,
                value,
                mutable,
                ..
            } => {
                let ty = self.check_binding(*declared, value)?;
                self.values.insert(
                    name.clone(),
                    ValueInfo {
                        ty,
                        mutable: *mutable,
                    },
                );
                Ok(ty)
            }
            Stmt::Def(def) => {
                let signature = self.check_def(def)?;
                let result = signature.result;
                self.functions.insert(def.name.clone(), signature);
                Ok(result)
            }
            other => self.check_stmt(other),
        }
    }

    /// Statements inside blocks.
    fn check_stmt(&mut self, stmt: &Stmt) -> Result<Ty, ReplError> {
        match stmt {
            Stmt::Binding {
                name,
                declared,
                value,
                mutable,
                span,
            } => {
                let ty = self.check_binding(*declared, value)?;
                let Some(scope) = self.scopes.last_mut() else {
                    return Err(ReplError::type_error("binding outside of a scope", span.clone()));
                };
                if scope.contains_key(name) {
                    return Err(ReplError::type_error(
                        format!("{} is already defined in the scope", name),
                        span.clone(),
                    ));
                }
                scope.insert(
                    name.clone(),
                    ValueInfo {
                        ty,
                        mutable: *mutable,
                    },
                );
                Ok(Ty::Unit)
            }
            Stmt::Assign { name, value, span } => {
                let Some(info) = self.lookup_value(name) else {
                    return Err(ReplError::not_found(name, span.clone()));
                };
                if !info.mutable {
                    return Err(ReplError::type_error("reassignment to val", span.clone()));
                }
                let found = self.check_expr(value)?;
                self.require(value, found, info.ty)?;
                Ok(Ty::Unit)
            }
            Stmt::Def(def) => Err(ReplError::type_error(
                format!("def {} must be defined at the top level of a segment", def.name),
                def.span.clone(),
            )),
            Stmt::Expr(expr) => self.check_expr(expr),
        }
    }

    fn check_binding(&mut self, declared: Option<Ty>, value: &Expr) -> Result<Ty, ReplError> {
        let found = self.check_expr(value)?;
        match declared {
            Some(required) => {
                self.require(value, found, required)?;
                Ok(required)
            }
            None => Ok(found),
        }
    }

    fn check_def(&mut self, def: &FnDef) -> Result<Signature, ReplError> {
        let params: Vec<Ty> = def.params.iter().map(|p| p.ty).collect();

        let mut scope = HashMap::new();
        for param in &def.params {
            if scope
                .insert(
                    param.name.clone(),
                    ValueInfo {
                        ty: param.ty,
                        mutable: false,
                    },
                )
                .is_some()
            {
                return Err(ReplError::type_error(
                    format!("{} is already defined in the scope", param.name),
                    def.span.clone(),
                ));
            }
        }

        // A declared result type makes the function visible to its own body.
        let previous = match def.result {
            Some(result) => self.functions.insert(
                def.name.clone(),
                Signature {
                    params: params.clone(),
                    result,
                },
            ),
            None => {
                self.inferring = Some(def.name.clone());
                None
            }
        };

        let saved_scopes = std::mem::replace(&mut self.scopes, vec![scope]);
        let body = self.check_expr(&def.body);
        self.scopes = saved_scopes;
        self.inferring = None;
        if let Some(previous) = previous {
            self.functions.insert(def.name.clone(), previous);
        }
        let body = body?;

        let result = match def.result {
            Some(result) => {
                self.require(&def.body, body, result)?;
                result
            }
            None => body,
        };
        Ok(Signature { params, result })
    }

    /// Fail with a `type mismatch` unless `found` conforms to `required`.
    fn require(&self, expr: &Expr, found: Ty, required: Ty) -> Result<(), ReplError> {
        if found.conforms_to(required) {
            return Ok(());
        }
        let found_text = expr
            .literal_type_text()
            .unwrap_or_else(|| found.to_string());
        Err(ReplError::mismatch(found_text, required, expr.span.clone()))
    }

    fn check_expr(&mut self, expr: &Expr) -> Result<Ty, ReplError> {
        let span = &expr.span;
        match &expr.kind {
            ExprKind::Int(_) => Ok(Ty::Int),
            ExprKind::Double(_) => Ok(Ty::Double),
            ExprKind::Bool(_) => Ok(Ty::Boolean),
            ExprKind::Str(_) => Ok(Ty::String),
            ExprKind::Unit => Ok(Ty::Unit),

            ExprKind::Ident(name) => {
                if let Some(info) = self.lookup_value(name) {
                    return Ok(info.ty);
                }
                match self.lookup_function(name, span)? {
                    Some(signature) if signature.params.is_empty() => Ok(signature.result),
                    Some(_) => Err(ReplError::type_error(
                        format!("missing argument list for method {}", name),
                        span.clone(),
                    )),
                    None => Err(ReplError::not_found(name, span.clone())),
                }
            }

            ExprKind::Unary(op, operand) => {
                let ty = self.check_expr(operand)?;
                match (op, ty) {
                    (UnaryOp::Negate, Ty::Int | Ty::Double) => Ok(ty),
                    (UnaryOp::Not, Ty::Boolean) => Ok(Ty::Boolean),
                    (UnaryOp::Negate, _) => Err(ReplError::type_error(
                        format!("value unary_- is not a member of {}", ty),
                        span.clone(),
                    )),
                    (UnaryOp::Not, _) => Err(ReplError::type_error(
                        format!("value unary_! is not a member of {}", ty),
                        span.clone(),
                    )),
                }
            }

            ExprKind::Binary(op, left, right) => self.check_binary(*op, left, right, span),

            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let found = self.check_expr(condition)?;
                self.require(condition, found, Ty::Boolean)?;
                let then_ty = self.check_expr(then_branch)?;
                match else_branch {
                    Some(branch) => {
                        let else_ty = self.check_expr(branch)?;
                        Ok(then_ty.lub(else_ty))
                    }
                    None => Ok(Ty::Unit),
                }
            }

            ExprKind::While { condition, body } => {
                let found = self.check_expr(condition)?;
                self.require(condition, found, Ty::Boolean)?;
                self.check_expr(body)?;
                Ok(Ty::Unit)
            }

            ExprKind::Block(statements) => {
                self.scopes.push(HashMap::new());
                let mut result = Ok(Ty::Unit);
                for (i, stmt) in statements.iter().enumerate() {
                    result = self.check_stmt(stmt);
                    if result.is_err() {
                        break;
                    }
                    let is_last_expr = i + 1 == statements.len() && matches!(stmt, Stmt::Expr(_));
                    if !is_last_expr {
                        result = Ok(Ty::Unit);
                    }
                }
                self.scopes.pop();
                result
            }

            ExprKind::Call { name, args } => self.check_call(name, args, span),

            ExprKind::SysError(message) => {
                let found = self.check_expr(message)?;
                self.require(message, found, Ty::String)?;
                Ok(Ty::Nothing)
            }

            ExprKind::Throw { message, .. } => {
                if let Some(message) = message {
                    let found = self.check_expr(message)?;
                    self.require(message, found, Ty::String)?;
                }
                Ok(Ty::Nothing)
            }

            ExprKind::Member { target, name } => {
                let ty = self.check_expr(target)?;
                member_type(ty, name).ok_or_else(|| {
                    ReplError::type_error(
                        format!("value {} is not a member of {}", name, ty),
                        span.clone(),
                    )
                })
            }
        }
    }

    fn check_binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        span: &Range<usize>,
    ) -> Result<Ty, ReplError> {
        let l = self.check_expr(left)?;
        let r = self.check_expr(right)?;
        let not_member = || {
            Err(ReplError::type_error(
                format!("value {} is not a member of {}", op, l),
                span.clone(),
            ))
        };

        match op {
            BinaryOp::Add if l == Ty::String || r == Ty::String => Ok(Ty::String),
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
                if !l.is_numeric() {
                    return not_member();
                }
                self.require(right, r, Ty::Double)?;
                Ok(if l == Ty::Double || r == Ty::Double {
                    Ty::Double
                } else {
                    Ty::Int
                })
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                if l.is_numeric() {
                    self.require(right, r, Ty::Double)?;
                } else if l == Ty::String {
                    self.require(right, r, Ty::String)?;
                } else {
                    return not_member();
                }
                Ok(Ty::Boolean)
            }
            BinaryOp::Eq | BinaryOp::Ne => Ok(Ty::Boolean),
            BinaryOp::And | BinaryOp::Or => {
                if l != Ty::Boolean {
                    return not_member();
                }
                self.require(right, r, Ty::Boolean)?;
                Ok(Ty::Boolean)
            }
        }
    }

    fn check_call(&mut self, name: &str, args: &[Expr], span: &Range<usize>) -> Result<Ty, ReplError> {
        match name {
            "println" | "print" => {
                if args.len() > 1 {
                    return Err(too_many_arguments(name, span));
                }
                for arg in args {
                    self.check_expr(arg)?;
                }
                return Ok(Ty::Unit);
            }
            "assert" => {
                let [condition] = args else {
                    return Err(ReplError::type_error(
                        "wrong number of arguments for method assert",
                        span.clone(),
                    ));
                };
                let found = self.check_expr(condition)?;
                self.require(condition, found, Ty::Boolean)?;
                return Ok(Ty::Unit);
            }
            _ => {}
        }

        let Some(signature) = self.lookup_function(name, span)? else {
            return Err(ReplError::not_found(name, span.clone()));
        };
        if args.len() > signature.params.len() {
            return Err(too_many_arguments(name, span));
        }
        if args.len() < signature.params.len() {
            return Err(ReplError::type_error(
                format!("not enough arguments for method {}", name),
                span.clone(),
            ));
        }
        for (arg, required) in args.iter().zip(&signature.params) {
            let found = self.check_expr(arg)?;
            self.require(arg, found, *required)?;
        }
        Ok(signature.result)
    }
}

fn too_many_arguments(name: &str, span: &Range<usize>) -> ReplError {
    ReplError::type_error(format!("too many arguments for method {}", name), span.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_program;

    fn check(source: &str) -> Result<Vec<Ty>, ReplError> {
        let program = parse_program(source).expect("parse failed");
        check_program(&program, &Globals::default())
    }

    #[test]
    fn int_widens_to_double() {
        assert_eq!(check("val d: Double = 1").unwrap(), vec![Ty::Double]);
        assert_eq!(check("1 + 2.5").unwrap(), vec![Ty::Double]);
    }

    #[test]
    fn string_concatenation() {
        assert_eq!(check("\"n = \" + 1").unwrap(), vec![Ty::String]);
    }

    #[test]
    fn literal_mismatch_shows_the_literal() {
        let err = check("val y: Int = \"oops\"").unwrap_err();
        assert_eq!(
            err.to_string(),
            "type mismatch;\n found   : String(\"oops\")\n required: Int"
        );
    }

    #[test]
    fn unknown_name() {
        let err = check("z + 1").unwrap_err();
        assert_eq!(err.to_string(), "not found: value z");
    }

    #[test]
    fn later_statements_see_earlier_ones() {
        assert_eq!(
            check("val a = 1\ndef twice(n: Int) = n * 2\ntwice(a)").unwrap(),
            vec![Ty::Int, Ty::Int, Ty::Int]
        );
    }

    #[test]
    fn reassigning_a_val_is_rejected() {
        let err = check("val a = 1\na = 2").unwrap_err();
        assert_eq!(err.to_string(), "reassignment to val");
    }

    #[test]
    fn recursion_needs_a_result_type() {
        let err = check("def f(n: Int) = if (n == 0) 0 else f(n - 1)").unwrap_err();
        assert_eq!(err.to_string(), "recursive method f needs result type");
        assert!(check("def f(n: Int): Int = if (n == 0) 0 else f(n - 1)").is_ok());
    }

    #[test]
    fn if_branches_join() {
        assert_eq!(check("if (true) 1 else 2.0").unwrap(), vec![Ty::Double]);
        assert_eq!(check("if (true) 1 else \"a\"").unwrap(), vec![Ty::Any]);
        assert_eq!(check("if (true) 1 else sys.error(\"no\")").unwrap(), vec![Ty::Int]);
    }

    #[test]
    fn unknown_member() {
        let err = check("true.length").unwrap_err();
        assert_eq!(err.to_string(), "value length is not a member of Boolean");
    }

    #[test]
    fn block_scopes_end_with_the_block() {
        let err = check("{ val inner = 1; inner }\ninner").unwrap_err();
        assert_eq!(err.to_string(), "not found: value inner");
    }
}
