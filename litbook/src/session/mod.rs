//! Session Evaluator: runs a document's code segments, in order, against
//! one session opened for that document alone.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::debug;

use crate::backend::{Backend, ExecutionResult};
use crate::document::{CodeSegment, Document};
use crate::error::{Failure, FailureKind};

/// Per-document evaluation settings.
#[derive(Debug, Clone, Copy)]
pub struct EvalOptions<'a> {
    pub timeout: Duration,
    /// Checked before every segment; set by a fail-fast build.
    pub cancel: Option<&'a AtomicBool>,
}

/// Why evaluation stopped early.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    Failed(Failure),
    Cancelled,
}

/// Results indexed by `CodeSegment::index`; `None` for segments that are
/// not executed.
pub type Results = Vec<Option<ExecutionResult>>;

/// Execute every explicit code segment of `document`.
///
/// The first segment whose outcome contradicts its mode stops evaluation:
/// the session state is unreliable from then on, so nothing after it runs.
pub fn evaluate<B: Backend>(
    document: &Document,
    backend: &B,
    options: &EvalOptions<'_>,
) -> Result<Results, EvalError> {
    let mut results: Results = vec![None; document.code_segment_count()];
    if !document.has_executable_code() {
        return Ok(results);
    }

    let mut session = backend.open_session();

    for segment in document.code_segments().filter(|s| s.is_executable()) {
        if options.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            return Err(EvalError::Cancelled);
        }

        debug!(
            document = %document.path.display(),
            line = segment.line,
            mode = %segment.mode,
            "executing segment"
        );
        let result = backend.execute(&mut session, &segment.code, options.timeout);
        check_outcome(document, segment, &result).map_err(EvalError::Failed)?;
        results[segment.index] = Some(result);
    }

    Ok(results)
}

/// Compare what happened with what the segment's mode promised.
pub fn check_outcome(
    document: &Document,
    segment: &CodeSegment,
    result: &ExecutionResult,
) -> Result<(), Failure> {
    let fail = |kind: FailureKind, message: String| {
        Err(Failure::new(
            document.path.clone(),
            kind,
            segment.line,
            segment.span.clone(),
            message,
        ))
    };

    if result.timed_out {
        return fail(FailureKind::TimeoutError, result.error_message().to_string());
    }
    if result.backend_failed {
        return fail(
            FailureKind::ExecutionError,
            format!("backend failure: {}", result.error_message()),
        );
    }

    match (segment.mode.expects_failure(), result.succeeded) {
        (true, true) => fail(
            FailureKind::UnexpectedSuccessError,
            "expected failure did not occur".to_string(),
        ),
        (false, false) => fail(FailureKind::ExecutionError, result.error_message().to_string()),
        (true, false) | (false, true) => Ok(()),
    }
}
