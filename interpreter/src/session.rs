use std::time::Instant;

use tracing::trace;

use crate::ast::Stmt;
use crate::environment::{Binding, Environment, Function, Globals};
use crate::error::ReplError;
use crate::evaluator::Evaluator;
use crate::parser::parse_program;
use crate::runtime_value::Value;
use crate::types::{Signature, Ty, check_program};

/// What running one segment produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    /// Printed text and REPL echo lines, in order.
    pub output: String,
    pub error: Option<ReplError>,
}

impl Transcript {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Interpreter state of one document: every binding committed so far and
/// the counter behind `resN` names.
#[derive(Debug, Clone, Default)]
pub struct ReplSession {
    globals: Globals,
    next_result: usize,
}

impl ReplSession {
    pub fn new() -> Self {
        ReplSession::default()
    }

    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    /// Value bound to `name`, if any.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.globals.values.get(name).map(|binding| &binding.value)
    }

    /// Parse, check and run a segment.
    ///
    /// The whole segment is checked before anything runs, so a compile
    /// error leaves the session untouched. At runtime each top-level
    /// statement commits its binding as soon as it completes: a failure
    /// keeps what earlier statements defined.
    pub fn run(&mut self, code: &str, deadline: Instant) -> Transcript {
        let mut output = String::new();
        let error = self.run_into(code, deadline, &mut output).err();
        Transcript { output, error }
    }

    fn run_into(&mut self, code: &str, deadline: Instant, output: &mut String) -> Result<(), ReplError> {
        let program = parse_program(code)?;
        let types = check_program(&program, &self.globals)?;
        trace!(statements = program.len(), "segment checked");

        for (stmt, ty) in program.iter().zip(types) {
            self.exec_top(stmt, ty, deadline, output)?;
        }
        Ok(())
    }

    fn exec_top(
        &mut self,
        stmt: &Stmt,
        ty: Ty,
        deadline: Instant,
        output: &mut String,
    ) -> Result<(), ReplError> {
        let mut env = Environment::new();

        match stmt {
            Stmt::Binding {
                name,
                value,
                mutable,
                ..
            } => {
                let value = Evaluator::new(&mut self.globals, output, deadline)
                    .eval(value, &mut env)?
                    .coerce(ty);
                echo(output, name, ty, &value);
                self.globals.values.insert(
                    name.clone(),
                    Binding {
                        value,
                        ty,
                        mutable: *mutable,
                    },
                );
            }
            Stmt::Assign { name, value, span } => {
                Evaluator::new(&mut self.globals, output, deadline).assign(name, value, &mut env, span)?;
                if let Some(binding) = self.globals.values.get(name) {
                    echo(output, name, binding.ty, &binding.value);
                }
            }
            Stmt::Def(def) => {
                output.push_str(&def.signature_text(ty));
                output.push('\n');
                let signature = Signature {
                    params: def.params.iter().map(|p| p.ty).collect(),
                    result: ty,
                };
                self.globals.functions.insert(
                    def.name.clone(),
                    Function {
                        def: def.clone(),
                        signature,
                    },
                );
            }
            Stmt::Expr(expr) => {
                let value = Evaluator::new(&mut self.globals, output, deadline)
                    .eval(expr, &mut env)?
                    .coerce(ty);
                if !matches!(ty, Ty::Unit | Ty::Nothing) {
                    let name = format!("res{}", self.next_result);
                    self.next_result += 1;
                    echo(output, &name, ty, &value);
                    self.globals.values.insert(
                        name,
                        Binding {
                            value,
                            ty,
                            mutable: false,
                        },
                    );
                }
            }
        }
        Ok(())
    }
}

/// `name: Type = value`
fn echo(output: &mut String, name: &str, ty: Ty, value: &Value) {
    output.push_str(&format!("{}: {} = {}\n", name, ty, value));
}
