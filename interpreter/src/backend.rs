use std::time::{Duration, Instant};

use litbook::{Backend, ExecutionResult};
use tracing::debug;

use crate::error::ReplError;
use crate::session::ReplSession;

/// The built-in Scala-flavoured interpreter as a litbook backend.
#[derive(Debug, Clone, Default)]
pub struct ReplBackend;

impl ReplBackend {
    pub fn new() -> Self {
        ReplBackend
    }
}

impl Backend for ReplBackend {
    type Session = ReplSession;

    fn language(&self) -> &str {
        "scala"
    }

    fn identity(&self) -> String {
        format!("builtin-scala {}", env!("CARGO_PKG_VERSION"))
    }

    fn open_session(&self) -> ReplSession {
        ReplSession::new()
    }

    fn execute(&self, session: &mut ReplSession, code: &str, timeout: Duration) -> ExecutionResult {
        let transcript = session.run(code, Instant::now() + timeout);
        match transcript.error {
            None => ExecutionResult::success(transcript.output),
            Some(ReplError::Timeout) => ExecutionResult::timeout(transcript.output, timeout),
            Some(error) => {
                debug!(compile_error = error.is_compile_error(), "segment raised: {}", error);
                ExecutionResult::failure(transcript.output, error.to_string())
            }
        }
    }
}
