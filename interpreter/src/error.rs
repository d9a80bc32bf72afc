use std::ops::Range;

use thiserror::Error;

/// Why a segment did not run to completion.
///
/// Compile-time errors read like the Scala compiler's; runtime errors like
/// the JVM exception that would have been thrown.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReplError {
    #[error("{message}")]
    Syntax { message: String, span: Range<usize> },

    #[error("{message}")]
    Type { message: String, span: Range<usize> },

    #[error("java.lang.ArithmeticException: / by zero")]
    DivisionByZero,

    #[error("java.lang.RuntimeException: {0}")]
    SysError(String),

    #[error("java.lang.{exception}{}", .message.as_ref().map(|m| format!(": {}", m)).unwrap_or_default())]
    Thrown {
        exception: String,
        message: Option<String>,
    },

    #[error("java.lang.AssertionError: assertion failed")]
    AssertionFailed,

    #[error("java.lang.StackOverflowError")]
    StackOverflow,

    #[error("java.lang.NumberFormatException: For input string: \"{0}\"")]
    NumberFormat(String),

    #[error("execution timed out")]
    Timeout,
}

impl ReplError {
    pub fn type_error(message: impl Into<String>, span: Range<usize>) -> Self {
        ReplError::Type {
            message: message.into(),
            span,
        }
    }

    /// `type mismatch` in the compiler's layout.
    pub fn mismatch(found: impl std::fmt::Display, required: impl std::fmt::Display, span: Range<usize>) -> Self {
        ReplError::type_error(
            format!("type mismatch;\n found   : {}\n required: {}", found, required),
            span,
        )
    }

    pub fn not_found(name: &str, span: Range<usize>) -> Self {
        ReplError::type_error(format!("not found: value {}", name), span)
    }

    /// True for errors reported before any statement ran.
    pub fn is_compile_error(&self) -> bool {
        matches!(self, ReplError::Syntax { .. } | ReplError::Type { .. })
    }
}
