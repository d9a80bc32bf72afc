//! Document Assembler.

use crate::backend::ExecutionResult;
use crate::document::{Document, Segment};
use crate::error::{Failure, FailureKind};
use crate::render::{RenderOptions, render_segment};

/// Stitch prose and rendered code back together, in source order.
///
/// Prose and unannotated fences are copied from the source unchanged, so a
/// document without executable code assembles to its input. The output is a
/// pure function of the document and `results`.
pub fn assemble(
    document: &Document,
    results: &[Option<ExecutionResult>],
    options: &RenderOptions,
) -> Result<String, Failure> {
    let mut out = String::with_capacity(document.source.len());

    for segment in &document.segments {
        match segment {
            Segment::Prose(prose) => out.push_str(&prose.text),
            Segment::Code(code) if !code.is_executable() => {
                out.push_str(document.slice(&code.span));
            }
            Segment::Code(code) => {
                let result = results.get(code.index).and_then(Option::as_ref);
                let rendered = render_segment(code, result, options).map_err(|e| {
                    Failure::new(
                        document.path.clone(),
                        FailureKind::RenderError,
                        code.line,
                        code.span.clone(),
                        e.message,
                    )
                })?;
                out.push_str(&rendered);
            }
        }
    }

    Ok(out)
}
