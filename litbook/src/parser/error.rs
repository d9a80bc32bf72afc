use std::fmt;
use std::ops::Range;
use std::path::PathBuf;

use codespan_reporting::diagnostic::{Diagnostic, Label, Severity};

use crate::document::Mode;
use crate::error::{Failure, FailureKind};

/// Fence errors with source location information.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub path: PathBuf,
    /// 1-based line of the offending fence.
    pub line: usize,
    pub span: Range<usize>,
    pub file_id: usize,
    pub severity: Severity,
    pub notes: Vec<String>,
}

impl ParseError {
    pub fn error(
        message: impl Into<String>,
        path: impl Into<PathBuf>,
        line: usize,
        span: Range<usize>,
        file_id: usize,
    ) -> Self {
        ParseError {
            message: message.into(),
            path: path.into(),
            line,
            span,
            file_id,
            severity: Severity::Error,
            notes: Vec::new(),
        }
    }

    pub fn unterminated_fence(
        fence: &str,
        path: impl Into<PathBuf>,
        line: usize,
        span: Range<usize>,
        file_id: usize,
    ) -> Self {
        ParseError::error(
            format!("unterminated code fence `{}` opened on line {}", fence, line),
            path,
            line,
            span,
            file_id,
        )
        .with_note(format!("close the block with a line containing `{}`", fence))
    }

    pub fn unknown_mode(
        annotation: &str,
        path: impl Into<PathBuf>,
        line: usize,
        span: Range<usize>,
        file_id: usize,
    ) -> Self {
        let known: Vec<&str> = Mode::ALL.iter().map(Mode::as_str).collect();
        ParseError::error(
            format!("unknown mode annotation `{}`", annotation),
            path,
            line,
            span,
            file_id,
        )
        .with_note(format!("known modes: {}", known.join(", ")))
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Convert to a codespan-reporting Diagnostic for display.
    pub fn to_diagnostic(&self) -> Diagnostic<usize> {
        Diagnostic::new(self.severity)
            .with_message(&self.message)
            .with_labels(vec![Label::primary(self.file_id, self.span.clone())])
            .with_notes(self.notes.clone())
    }

    pub fn to_failure(&self) -> Failure {
        Failure::new(
            self.path.clone(),
            FailureKind::ParseError,
            self.line,
            self.span.clone(),
            self.message.clone(),
        )
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.path.display(), self.line, self.message)
    }
}

impl std::error::Error for ParseError {}
