use std::fmt;

use crate::types::Ty;

/// A runtime value produced by evaluating an expression.
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Double(f64),
    Boolean(bool),
    String(String),
    Unit,
}

impl Value {
    pub fn ty(&self) -> Ty {
        match self {
            Value::Int(_) => Ty::Int,
            Value::Double(_) => Ty::Double,
            Value::Boolean(_) => Ty::Boolean,
            Value::String(_) => Ty::String,
            Value::Unit => Ty::Unit,
        }
    }

    /// Convert to the representation of `ty`; only `Int` to `Double`
    /// changes anything.
    pub fn coerce(self, ty: Ty) -> Value {
        match (self, ty) {
            (Value::Int(n), Ty::Double) => Value::Double(n as f64),
            (value, _) => value,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Double(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Double(n) => write!(f, "{}", format_double(*n)),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::String(s) => write!(f, "{}", s),
            Value::Unit => write!(f, "()"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Unit, Value::Unit) => true,
            // Numeric comparison across Int and Double; NaN != NaN
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }
}

/// Doubles print the way the JVM prints them: `2.0`, `0.1`, `1.0E10`.
pub fn format_double(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let magnitude = n.abs();
    if magnitude != 0.0 && !(1e-3..1e7).contains(&magnitude) {
        let text = format!("{:e}", n);
        let (mantissa, exponent) = text.split_once('e').unwrap_or((&text, "0"));
        let mantissa = if mantissa.contains('.') {
            mantissa.to_string()
        } else {
            format!("{}.0", mantissa)
        };
        return format!("{}E{}", mantissa, exponent);
    }
    let text = format!("{}", n);
    if text.contains('.') {
        text
    } else {
        format!("{}.0", text)
    }
}
