//! The interpreter contract the Session Evaluator runs segments against.

pub mod command;

use std::time::Duration;

pub use command::{CommandBackend, CommandSession};

/// A language runtime able to execute code segments in a persistent session.
///
/// One session is opened per document and passed explicitly to every
/// `execute` call, so nothing a document defines can leak into another.
pub trait Backend: Send + Sync {
    type Session: Send;

    /// Fence language this backend executes, e.g. `scala`.
    fn language(&self) -> &str;

    /// Line-comment prefix used to render captured output.
    fn comment_prefix(&self) -> &str {
        "// "
    }

    /// Stable description of the backend and its settings. A change
    /// invalidates incremental build results.
    fn identity(&self) -> String;

    fn open_session(&self) -> Self::Session;

    /// Run `code` in `session`, giving up after `timeout`.
    fn execute(&self, session: &mut Self::Session, code: &str, timeout: Duration)
    -> ExecutionResult;
}

/// What one segment execution produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub succeeded: bool,
    /// Printed lines and echoed values, unwrapped.
    pub output: String,
    pub error: Option<String>,
    pub timed_out: bool,
    /// The backend could not run the code at all (the program would not
    /// start, its pipes broke). Never satisfies a `fail` segment.
    pub backend_failed: bool,
}

impl ExecutionResult {
    pub fn success(output: impl Into<String>) -> Self {
        ExecutionResult {
            succeeded: true,
            output: output.into(),
            error: None,
            timed_out: false,
            backend_failed: false,
        }
    }

    pub fn failure(output: impl Into<String>, error: impl Into<String>) -> Self {
        ExecutionResult {
            succeeded: false,
            output: output.into(),
            error: Some(error.into()),
            timed_out: false,
            backend_failed: false,
        }
    }

    pub fn timeout(output: impl Into<String>, budget: Duration) -> Self {
        ExecutionResult {
            succeeded: false,
            output: output.into(),
            error: Some(format!("execution timed out after {} ms", budget.as_millis())),
            timed_out: true,
            backend_failed: false,
        }
    }

    pub fn backend_error(error: impl Into<String>) -> Self {
        ExecutionResult {
            succeeded: false,
            output: String::new(),
            error: Some(error.into()),
            timed_out: false,
            backend_failed: true,
        }
    }

    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or("")
    }
}
