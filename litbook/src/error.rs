use std::fmt;
use std::ops::Range;
use std::path::PathBuf;

use codespan_reporting::diagnostic::{Diagnostic, Label};
use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors that stop a build as a whole, as opposed to a single document.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("input root {} is not a directory", .0.display())]
    InputRoot(PathBuf),

    #[error("output root {} is the input root; rendering would overwrite the sources", .0.display())]
    OutputIsInput(PathBuf),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot serialize build data: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("cannot start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

/// Why a document failed to compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FailureKind {
    /// Malformed fence: unterminated block or unknown mode annotation.
    ParseError,
    /// A segment threw where success was required.
    ExecutionError,
    /// A `fail` segment ran without error.
    UnexpectedSuccessError,
    /// A segment exceeded its execution budget.
    TimeoutError,
    /// Captured output cannot be embedded in the rendered block.
    RenderError,
    /// The source could not be read or the output could not be written.
    IoError,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::ParseError => "ParseError",
            FailureKind::ExecutionError => "ExecutionError",
            FailureKind::UnexpectedSuccessError => "UnexpectedSuccessError",
            FailureKind::TimeoutError => "TimeoutError",
            FailureKind::RenderError => "RenderError",
            FailureKind::IoError => "IoError",
        };
        f.write_str(name)
    }
}

/// One failure of one document, located at a segment's source line.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("{}:{}: {}: {}", .path.display(), .line, .kind, .message)]
pub struct Failure {
    #[serde(skip)]
    pub path: PathBuf,
    #[serde(rename = "segment_line")]
    pub line: usize,
    pub kind: FailureKind,
    pub message: String,
    /// Byte span of the offending segment, for diagnostics.
    #[serde(skip)]
    pub span: Range<usize>,
}

impl Failure {
    pub fn new(
        path: impl Into<PathBuf>,
        kind: FailureKind,
        line: usize,
        span: Range<usize>,
        message: impl Into<String>,
    ) -> Self {
        Failure {
            path: path.into(),
            line,
            kind,
            message: message.into(),
            span,
        }
    }

    /// Failure with no segment to point at (line 0).
    pub fn io(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        Failure::new(path, FailureKind::IoError, 0, 0..0, error.to_string())
    }

    /// Convert to a codespan-reporting diagnostic labelled at the segment.
    pub fn to_diagnostic(&self, file_id: usize) -> Diagnostic<usize> {
        let diagnostic = Diagnostic::error()
            .with_code(self.kind.to_string())
            .with_message(first_line(&self.message));
        let diagnostic = if self.span.is_empty() {
            diagnostic
        } else {
            diagnostic.with_labels(vec![Label::primary(file_id, self.span.clone())])
        };
        let rest: Vec<String> = self.message.lines().skip(1).map(str::to_string).collect();
        if rest.is_empty() {
            diagnostic
        } else {
            diagnostic.with_notes(vec![rest.join("\n")])
        }
    }
}

fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or("")
}
