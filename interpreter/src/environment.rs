use std::collections::HashMap;
use std::sync::Arc;

use crate::ast::FnDef;
use crate::runtime_value::Value;
use crate::types::{Signature, Ty};

/// A named value and the static type it was declared with.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub value: Value,
    pub ty: Ty,
    pub mutable: bool,
}

#[derive(Debug, Clone)]
pub struct Function {
    pub def: Arc<FnDef>,
    pub signature: Signature,
}

/// Bindings committed to a session by completed top-level statements.
#[derive(Debug, Clone, Default)]
pub struct Globals {
    pub values: HashMap<String, Binding>,
    pub functions: HashMap<String, Function>,
}

/// A single block scope.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    variables: HashMap<String, Binding>,
}

/// Local scopes of one call frame, innermost last. Names not found here
/// resolve against the session's `Globals`.
#[derive(Debug, Default)]
pub struct Environment {
    scopes: Vec<Scope>,
}

impl Environment {
    pub fn new() -> Self {
        Environment { scopes: Vec::new() }
    }

    /// Frame for a function call: one scope holding the arguments.
    pub fn with_parameters(parameters: impl IntoIterator<Item = (String, Binding)>) -> Self {
        Environment {
            scopes: vec![Scope {
                variables: parameters.into_iter().collect(),
            }],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub fn pop_scope(&mut self) -> Option<Scope> {
        self.scopes.pop()
    }

    pub fn is_top_level(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Bind a name in the innermost scope. Returns false when there is no
    /// scope to bind in.
    pub fn declare(&mut self, name: &str, binding: Binding) -> bool {
        match self.scopes.last_mut() {
            Some(scope) => {
                scope.variables.insert(name.to_string(), binding);
                true
            }
            None => false,
        }
    }

    /// Look up a variable, searching from innermost scope outward.
    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.variables.get(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Binding> {
        self.scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.variables.get_mut(name))
    }
}
