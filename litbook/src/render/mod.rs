//! Output Renderer: turns a code segment and its execution result into the
//! Markdown that replaces the original fence.

pub mod wrap;

use thiserror::Error;

use crate::backend::ExecutionResult;
use crate::document::{CodeSegment, Mode};

pub use wrap::{comment_lines, continuation_marker, unwrap_comment_lines};

#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Column budget for comment lines.
    pub width: usize,
    pub comment_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RenderError {
    pub message: String,
}

/// Render an explicit code segment according to its mode.
///
/// `result` is `None` when the segment was not executed; nothing beyond the
/// code is rendered then.
pub fn render_segment(
    segment: &CodeSegment,
    result: Option<&ExecutionResult>,
    options: &RenderOptions,
) -> Result<String, RenderError> {
    let commentary = match (segment.mode, result) {
        (Mode::Invisible, _) => return Ok(String::new()),
        (Mode::Silent, _) | (_, None) => String::new(),
        (Mode::Book, Some(result)) => result.output.clone(),
        (Mode::Fail, Some(result)) => failure_text(result),
    };

    if commentary.contains(segment.fence.as_str()) {
        return Err(RenderError {
            message: format!(
                "captured output contains the fence delimiter `{}` and cannot be embedded",
                segment.fence
            ),
        });
    }

    let first_prefix = segment.prefix.as_str();
    let prefix = segment.continuation_prefix();

    let mut out = String::new();
    out.push_str(first_prefix);
    out.push_str(&segment.fence);
    out.push_str(&segment.rendered_info());
    out.push('\n');

    for line in segment.code.lines() {
        push_line(&mut out, &prefix, line);
    }
    for line in comment_lines(&commentary, &options.comment_prefix, options.width) {
        push_line(&mut out, &prefix, &line);
    }

    out.push_str(&prefix);
    out.push_str(&segment.fence);
    out.push('\n');
    Ok(out)
}

/// Output printed before the error, then the error with an `error: ` lead.
fn failure_text(result: &ExecutionResult) -> String {
    let mut text = result.output.clone();
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    text.push_str("error: ");
    text.push_str(result.error_message());
    text
}

fn push_line(out: &mut String, prefix: &str, line: &str) {
    if line.is_empty() {
        out.push_str(prefix.trim_end());
    } else {
        out.push_str(prefix);
        out.push_str(line);
    }
    out.push('\n');
}
