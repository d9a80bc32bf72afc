use std::ops::Range;
use std::time::Instant;

use crate::ast::{BinaryOp, Expr, ExprKind, Stmt, UnaryOp};
use crate::environment::{Binding, Environment, Globals};
use crate::error::ReplError;
use crate::runtime_value::Value;

/// Deepest interpreted call chain before `StackOverflowError`.
pub const MAX_DEPTH: usize = 512;

/// Evaluates checked expressions against a session's globals, appending
/// printed text to `output`.
pub struct Evaluator<'a> {
    globals: &'a mut Globals,
    output: &'a mut String,
    deadline: Instant,
    depth: usize,
}

impl<'a> Evaluator<'a> {
    pub fn new(globals: &'a mut Globals, output: &'a mut String, deadline: Instant) -> Self {
        Evaluator {
            globals,
            output,
            deadline,
            depth: 0,
        }
    }

    /// Evaluate an Expr AST node to produce a Value.
    pub fn eval(&mut self, expr: &Expr, env: &mut Environment) -> Result<Value, ReplError> {
        let span = &expr.span;
        match &expr.kind {
            // --- Literals ---
            ExprKind::Int(n) => Ok(Value::Int(*n)),
            ExprKind::Double(n) => Ok(Value::Double(*n)),
            ExprKind::Bool(b) => Ok(Value::Boolean(*b)),
            ExprKind::Str(s) => Ok(Value::String(s.clone())),
            ExprKind::Unit => Ok(Value::Unit),

            // --- References ---
            ExprKind::Ident(name) => {
                if let Some(binding) = env.get(name) {
                    return Ok(binding.value.clone());
                }
                if let Some(binding) = self.globals.values.get(name) {
                    return Ok(binding.value.clone());
                }
                self.call(name, &[], env, span)
            }

            // --- Operations ---
            ExprKind::Unary(op, operand) => {
                let value = self.eval(operand, env)?;
                match (op, value) {
                    (UnaryOp::Negate, Value::Int(n)) => Ok(Value::Int(n.wrapping_neg())),
                    (UnaryOp::Negate, Value::Double(n)) => Ok(Value::Double(-n)),
                    (UnaryOp::Not, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
                    (_, other) => Err(unsupported(&other, "unary operator", span)),
                }
            }

            ExprKind::Binary(BinaryOp::And, left, right) => {
                if !self.eval_bool(left, env)? {
                    return Ok(Value::Boolean(false));
                }
                Ok(Value::Boolean(self.eval_bool(right, env)?))
            }
            ExprKind::Binary(BinaryOp::Or, left, right) => {
                if self.eval_bool(left, env)? {
                    return Ok(Value::Boolean(true));
                }
                Ok(Value::Boolean(self.eval_bool(right, env)?))
            }
            ExprKind::Binary(op, left, right) => {
                let l = self.eval(left, env)?;
                let r = self.eval(right, env)?;
                eval_binary_op(*op, l, r, span)
            }

            // --- Control flow ---
            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let taken = self.eval_bool(condition, env)?;
                match (taken, else_branch) {
                    (true, Some(_)) => self.eval(then_branch, env),
                    (true, None) => {
                        self.eval(then_branch, env)?;
                        Ok(Value::Unit)
                    }
                    (false, Some(branch)) => self.eval(branch, env),
                    (false, None) => Ok(Value::Unit),
                }
            }

            ExprKind::While { condition, body } => {
                loop {
                    self.check_deadline()?;
                    if !self.eval_bool(condition, env)? {
                        break;
                    }
                    self.eval(body, env)?;
                }
                Ok(Value::Unit)
            }

            ExprKind::Block(statements) => {
                env.push_scope();
                let result = self.eval_block(statements, env);
                env.pop_scope();
                result
            }

            // --- Calls ---
            ExprKind::Call { name, args } => match name.as_str() {
                "println" | "print" => {
                    let text = match args.first() {
                        Some(arg) => self.eval(arg, env)?.to_string(),
                        None => String::new(),
                    };
                    self.output.push_str(&text);
                    if name == "println" {
                        self.output.push('\n');
                    }
                    Ok(Value::Unit)
                }
                "assert" => {
                    let Some(condition) = args.first() else {
                        return Err(ReplError::type_error("missing argument for assert", span.clone()));
                    };
                    if self.eval_bool(condition, env)? {
                        Ok(Value::Unit)
                    } else {
                        Err(ReplError::AssertionFailed)
                    }
                }
                _ => self.call(name, args, env, span),
            },

            ExprKind::SysError(message) => {
                let message = self.eval(message, env)?;
                Err(ReplError::SysError(message.to_string()))
            }

            ExprKind::Throw { exception, message } => {
                let message = match message {
                    Some(message) => Some(self.eval(message, env)?.to_string()),
                    None => None,
                };
                Err(ReplError::Thrown {
                    exception: exception.clone(),
                    message,
                })
            }

            ExprKind::Member { target, name } => {
                let value = self.eval(target, env)?;
                eval_member(value, name, span)
            }
        }
    }

    /// Run a statement inside a block.
    fn exec(&mut self, stmt: &Stmt, env: &mut Environment) -> Result<Value, ReplError> {
        match stmt {
            Stmt::Binding {
                name,
                declared,
                value,
                mutable,
                span,
            } => {
                let value = self.eval(value, env)?;
                let ty = declared.unwrap_or_else(|| value.ty());
                let binding = Binding {
                    value: value.coerce(ty),
                    ty,
                    mutable: *mutable,
                };
                if !env.declare(name, binding) {
                    return Err(ReplError::type_error("binding outside of a scope", span.clone()));
                }
                Ok(Value::Unit)
            }
            Stmt::Assign { name, value, span } => {
                self.assign(name, value, env, span)?;
                Ok(Value::Unit)
            }
            Stmt::Def(def) => Err(ReplError::type_error(
                format!("def {} must be defined at the top level of a segment", def.name),
                def.span.clone(),
            )),
            Stmt::Expr(expr) => self.eval(expr, env),
        }
    }

    fn eval_block(&mut self, statements: &[Stmt], env: &mut Environment) -> Result<Value, ReplError> {
        let mut last = Value::Unit;
        for stmt in statements {
            last = self.exec(stmt, env)?;
        }
        match statements.last() {
            Some(Stmt::Expr(_)) => Ok(last),
            _ => Ok(Value::Unit),
        }
    }

    /// `name = value`, against the innermost binding of `name`.
    pub fn assign(
        &mut self,
        name: &str,
        value: &Expr,
        env: &mut Environment,
        span: &Range<usize>,
    ) -> Result<(), ReplError> {
        let value = self.eval(value, env)?;
        let binding = match env.get_mut(name) {
            Some(binding) => binding,
            None => self
                .globals
                .values
                .get_mut(name)
                .ok_or_else(|| ReplError::not_found(name, span.clone()))?,
        };
        if !binding.mutable {
            return Err(ReplError::type_error("reassignment to val", span.clone()));
        }
        binding.value = value.coerce(binding.ty);
        Ok(())
    }

    fn call(
        &mut self,
        name: &str,
        args: &[Expr],
        env: &mut Environment,
        span: &Range<usize>,
    ) -> Result<Value, ReplError> {
        let Some(function) = self.globals.functions.get(name).cloned() else {
            return Err(ReplError::not_found(name, span.clone()));
        };

        let mut parameters = Vec::with_capacity(args.len());
        for (arg, param) in args.iter().zip(&function.def.params) {
            let value = self.eval(arg, env)?.coerce(param.ty);
            parameters.push((
                param.name.clone(),
                Binding {
                    value,
                    ty: param.ty,
                    mutable: false,
                },
            ));
        }

        if self.depth >= MAX_DEPTH {
            return Err(ReplError::StackOverflow);
        }
        self.check_deadline()?;

        let mut frame = Environment::with_parameters(parameters);
        self.depth += 1;
        let result = self.eval(&function.def.body, &mut frame);
        self.depth -= 1;
        Ok(result?.coerce(function.signature.result))
    }

    fn eval_bool(&mut self, expr: &Expr, env: &mut Environment) -> Result<bool, ReplError> {
        match self.eval(expr, env)? {
            Value::Boolean(b) => Ok(b),
            other => Err(ReplError::mismatch(other.ty(), "Boolean", expr.span.clone())),
        }
    }

    fn check_deadline(&self) -> Result<(), ReplError> {
        if Instant::now() >= self.deadline {
            Err(ReplError::Timeout)
        } else {
            Ok(())
        }
    }
}

fn eval_binary_op(op: BinaryOp, l: Value, r: Value, span: &Range<usize>) -> Result<Value, ReplError> {
    use Value::{Double, Int};

    if op == BinaryOp::Add && (matches!(l, Value::String(_)) || matches!(r, Value::String(_))) {
        return Ok(Value::String(format!("{}{}", l, r)));
    }

    match op {
        BinaryOp::Eq => return Ok(Value::Boolean(l == r)),
        BinaryOp::Ne => return Ok(Value::Boolean(l != r)),
        _ => {}
    }

    match (&l, &r) {
        (Int(a), Int(b)) => {
            let (a, b) = (*a, *b);
            let value = match op {
                BinaryOp::Add => Int(a.wrapping_add(b)),
                BinaryOp::Sub => Int(a.wrapping_sub(b)),
                BinaryOp::Mul => Int(a.wrapping_mul(b)),
                BinaryOp::Div if b == 0 => return Err(ReplError::DivisionByZero),
                BinaryOp::Div => Int(a.wrapping_div(b)),
                BinaryOp::Rem if b == 0 => return Err(ReplError::DivisionByZero),
                BinaryOp::Rem => Int(a.wrapping_rem(b)),
                BinaryOp::Lt => Value::Boolean(a < b),
                BinaryOp::Le => Value::Boolean(a <= b),
                BinaryOp::Gt => Value::Boolean(a > b),
                BinaryOp::Ge => Value::Boolean(a >= b),
                _ => return Err(unsupported(&l, "operator", span)),
            };
            Ok(value)
        }
        (Value::String(a), Value::String(b)) => match op {
            BinaryOp::Lt => Ok(Value::Boolean(a < b)),
            BinaryOp::Le => Ok(Value::Boolean(a <= b)),
            BinaryOp::Gt => Ok(Value::Boolean(a > b)),
            BinaryOp::Ge => Ok(Value::Boolean(a >= b)),
            _ => Err(unsupported(&l, "operator", span)),
        },
        _ => {
            let (Some(a), Some(b)) = (l.as_f64(), r.as_f64()) else {
                return Err(unsupported(&l, "operator", span));
            };
            let value = match op {
                BinaryOp::Add => Double(a + b),
                BinaryOp::Sub => Double(a - b),
                BinaryOp::Mul => Double(a * b),
                BinaryOp::Div => Double(a / b),
                BinaryOp::Rem => Double(a % b),
                BinaryOp::Lt => Value::Boolean(a < b),
                BinaryOp::Le => Value::Boolean(a <= b),
                BinaryOp::Gt => Value::Boolean(a > b),
                BinaryOp::Ge => Value::Boolean(a >= b),
                _ => return Err(unsupported(&l, "operator", span)),
            };
            Ok(value)
        }
    }
}

fn eval_member(value: Value, name: &str, span: &Range<usize>) -> Result<Value, ReplError> {
    let result = match (&value, name) {
        (_, "toString") => Value::String(value.to_string()),

        (Value::String(s), "length") => Value::Int(s.chars().count() as i64),
        (Value::String(s), "toUpperCase") => Value::String(s.to_uppercase()),
        (Value::String(s), "toLowerCase") => Value::String(s.to_lowercase()),
        (Value::String(s), "trim") => Value::String(s.trim().to_string()),
        (Value::String(s), "isEmpty") => Value::Boolean(s.is_empty()),
        (Value::String(s), "toInt") => Value::Int(
            s.parse::<i64>()
                .map_err(|_| ReplError::NumberFormat(s.clone()))?,
        ),
        (Value::String(s), "toDouble") => Value::Double(
            s.trim()
                .parse::<f64>()
                .map_err(|_| ReplError::NumberFormat(s.clone()))?,
        ),

        (Value::Int(n), "abs") => Value::Int(n.wrapping_abs()),
        (Value::Int(n), "toInt") => Value::Int(*n),
        (Value::Int(n), "toDouble") => Value::Double(*n as f64),

        (Value::Double(n), "abs") => Value::Double(n.abs()),
        // Saturating, NaN becomes 0
        (Value::Double(n), "toInt") => Value::Int(*n as i64),
        (Value::Double(n), "toDouble") => Value::Double(*n),

        _ => {
            return Err(ReplError::type_error(
                format!("value {} is not a member of {}", name, value.ty()),
                span.clone(),
            ));
        }
    };
    Ok(result)
}

fn unsupported(value: &Value, what: &str, span: &Range<usize>) -> ReplError {
    ReplError::type_error(
        format!("{} not applicable to {}", what, value.ty()),
        span.clone(),
    )
}
