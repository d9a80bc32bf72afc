use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Execution and rendering policy attached to a code segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Execute, render the code and its captured output.
    Book,
    /// Execute, render nothing.
    Invisible,
    /// Execute for side effects, render the code only.
    Silent,
    /// Execute, require an error, render the code and the error text.
    Fail,
}

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::Book, Mode::Invisible, Mode::Silent, Mode::Fail];

    /// Parse a mode annotation (the part after `:` in `scala:book`).
    pub fn from_annotation(annotation: &str) -> Option<Mode> {
        match annotation {
            "book" => Some(Mode::Book),
            "invisible" => Some(Mode::Invisible),
            "silent" => Some(Mode::Silent),
            "fail" => Some(Mode::Fail),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Book => "book",
            Mode::Invisible => "invisible",
            Mode::Silent => "silent",
            Mode::Fail => "fail",
        }
    }

    pub fn expects_failure(&self) -> bool {
        matches!(self, Mode::Fail)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Prose between code blocks, kept byte-for-byte.
#[derive(Debug, Clone, PartialEq)]
pub struct ProseSegment {
    pub text: String,
}

/// A fenced code block written in the backend's language.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeSegment {
    /// Position among the document's code segments, starting at 0.
    pub index: usize,
    pub language: String,
    pub mode: Mode,
    /// False when the fence carried no mode annotation. Such segments are
    /// rendered verbatim and never executed.
    pub explicit: bool,
    /// Block body with container prefixes removed.
    pub code: String,
    /// Info-string words after the language/mode word.
    pub attributes: String,
    /// The opening fence run, e.g. "```" or "~~~~".
    pub fence: String,
    /// Text between the start of the opening line and the fence
    /// (indentation, block quote markers, list markers).
    pub prefix: String,
    /// Byte span of the whole block, opening line start through the end of
    /// the closing fence line.
    pub span: Range<usize>,
    /// 1-based line of the opening fence.
    pub line: usize,
}

impl CodeSegment {
    pub fn is_executable(&self) -> bool {
        self.explicit
    }

    /// Prefix for lines after the opening one: list markers become spaces,
    /// block quote markers and whitespace are kept.
    pub fn continuation_prefix(&self) -> String {
        self.prefix
            .chars()
            .map(|c| if c == '>' || c.is_whitespace() { c } else { ' ' })
            .collect()
    }

    /// Info string as rendered: the language without its mode annotation.
    pub fn rendered_info(&self) -> String {
        if self.attributes.is_empty() {
            self.language.clone()
        } else {
            format!("{} {}", self.language, self.attributes)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Prose(ProseSegment),
    Code(CodeSegment),
}

/// A parsed source document: its path, its text and its segments in order.
#[derive(Debug, Clone)]
pub struct Document {
    pub path: PathBuf,
    pub source: String,
    pub segments: Vec<Segment>,
}

impl Document {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn code_segments(&self) -> impl Iterator<Item = &CodeSegment> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Code(code) => Some(code),
            Segment::Prose(_) => None,
        })
    }

    pub fn code_segment_count(&self) -> usize {
        self.code_segments().count()
    }

    pub fn has_executable_code(&self) -> bool {
        self.code_segments().any(CodeSegment::is_executable)
    }

    /// Source text of a segment's span.
    pub fn slice(&self, span: &Range<usize>) -> &str {
        &self.source[span.clone()]
    }
}
