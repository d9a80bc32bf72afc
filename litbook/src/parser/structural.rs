use std::ops::Range;
use std::path::{Path, PathBuf};

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser as CmarkParser, Tag, TagEnd};

use crate::document::{CodeSegment, Mode, ProseSegment, Segment};
use crate::parser::error::ParseError;
use crate::parser::info::parse_info;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Split Markdown source into prose and code segments.
///
/// Fences are located with pulldown-cmark so that blocks nested in lists and
/// block quotes are found exactly where a CommonMark renderer would find
/// them. Everything between fences is copied verbatim.
pub fn extract_segments(
    source: &str,
    path: &Path,
    language: &str,
    file_id: usize,
) -> Result<Vec<Segment>, Vec<ParseError>> {
    let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES;
    let mut events = CmarkParser::new_ext(source, options).into_offset_iter();

    let mut state = ExtractState::new(source, path, language, file_id);

    while let Some((event, range)) = events.next() {
        if let Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) = event {
            let mut code = String::new();
            for (inner, _) in events.by_ref() {
                match inner {
                    Event::Text(text) => code.push_str(&text),
                    Event::End(TagEnd::CodeBlock) => break,
                    _ => {}
                }
            }
            state.push_fence(&info, code, range);
        }
    }

    state.finalize()
}

// ---------------------------------------------------------------------------
// Extraction state
// ---------------------------------------------------------------------------

struct ExtractState<'a> {
    source: &'a str,
    path: PathBuf,
    language: &'a str,
    file_id: usize,
    /// Byte offset up to which source has been assigned to a segment.
    cursor: usize,
    segments: Vec<Segment>,
    code_count: usize,
    errors: Vec<ParseError>,
}

/// Where a fenced block sits in the source.
struct FenceLocation {
    line_start: usize,
    end: usize,
    line: usize,
    prefix: String,
    fence: String,
}

impl<'a> ExtractState<'a> {
    fn new(source: &'a str, path: &Path, language: &'a str, file_id: usize) -> Self {
        ExtractState {
            source,
            path: path.to_path_buf(),
            language,
            file_id,
            cursor: 0,
            segments: Vec::new(),
            code_count: 0,
            errors: Vec::new(),
        }
    }

    fn push_fence(&mut self, info: &str, code: String, range: Range<usize>) {
        let location = self.locate(&range);
        let span = location.line_start..location.end;

        if !self.is_closed(&location) {
            self.errors.push(ParseError::unterminated_fence(
                &location.fence,
                self.path.clone(),
                location.line,
                span,
                self.file_id,
            ));
            return;
        }

        let info = parse_info(info);
        // Fences in other languages stay part of the surrounding prose.
        if info.language != self.language {
            return;
        }

        let (mode, explicit) = match info.annotation {
            None => (Mode::Silent, false),
            Some(annotation) => match Mode::from_annotation(annotation) {
                Some(mode) => (mode, true),
                None => {
                    self.errors.push(ParseError::unknown_mode(
                        annotation,
                        self.path.clone(),
                        location.line,
                        span,
                        self.file_id,
                    ));
                    return;
                }
            },
        };

        self.flush_prose(location.line_start);
        self.segments.push(Segment::Code(CodeSegment {
            index: self.code_count,
            language: info.language.to_string(),
            mode,
            explicit,
            code,
            attributes: info.attributes.to_string(),
            fence: location.fence,
            prefix: location.prefix,
            span,
            line: location.line,
        }));
        self.code_count += 1;
        self.cursor = location.end;
    }

    /// Widen the event range to whole lines and read the fence run.
    fn locate(&self, range: &Range<usize>) -> FenceLocation {
        let source = self.source;
        let line_start = source[..range.start].rfind('\n').map(|p| p + 1).unwrap_or(0);

        let end = if range.end > 0 && source[..range.end].ends_with('\n') {
            range.end
        } else {
            source[range.end..]
                .find('\n')
                .map(|p| range.end + p + 1)
                .unwrap_or(source.len())
        };

        let fence_start = source[line_start..]
            .find(['`', '~'])
            .map(|p| line_start + p)
            .unwrap_or(range.start);
        let fence_char = source[fence_start..].chars().next().unwrap_or('`');
        let fence: String = source[fence_start..]
            .chars()
            .take_while(|&c| c == fence_char)
            .collect();

        FenceLocation {
            line_start,
            end,
            line: byte_offset_to_line(source, line_start),
            prefix: source[line_start..fence_start].to_string(),
            fence,
        }
    }

    /// A block is closed when its last line is a fence run of the same
    /// character at least as long as the opening one.
    fn is_closed(&self, location: &FenceLocation) -> bool {
        let block = &self.source[location.line_start..location.end];
        let lines: Vec<&str> = block.lines().collect();
        if lines.len() < 2 {
            return false;
        }
        let Some(fence_char) = location.fence.chars().next() else {
            return false;
        };
        let last = lines[lines.len() - 1]
            .trim_start_matches(|c: char| c.is_whitespace() || c == '>')
            .trim_end();
        !last.is_empty()
            && last.chars().all(|c| c == fence_char)
            && last.chars().count() >= location.fence.chars().count()
    }

    fn flush_prose(&mut self, until: usize) {
        if until > self.cursor {
            self.segments.push(Segment::Prose(ProseSegment {
                text: self.source[self.cursor..until].to_string(),
            }));
        }
        self.cursor = until.max(self.cursor);
    }

    fn finalize(mut self) -> Result<Vec<Segment>, Vec<ParseError>> {
        if !self.errors.is_empty() {
            return Err(self.errors);
        }
        self.flush_prose(self.source.len());
        Ok(self.segments)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Convert a byte offset in `source` to a 1-based line number.
pub fn byte_offset_to_line(source: &str, offset: usize) -> usize {
    source[..offset.min(source.len())]
        .bytes()
        .filter(|&b| b == b'\n')
        .count()
        + 1
}
