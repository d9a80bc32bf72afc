use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};

use litbook::{BuildReport, DocumentReport, DocumentStatus};

fn pass_label(no_color: bool) -> &'static str {
    if no_color { "PASS" } else { "\x1b[32mPASS\x1b[0m" }
}

fn fail_label(no_color: bool) -> &'static str {
    if no_color { "FAIL" } else { "\x1b[31mFAIL\x1b[0m" }
}

fn skip_label(no_color: bool) -> &'static str {
    if no_color { "SKIP" } else { "\x1b[33mSKIP\x1b[0m" }
}

fn status_line(document: &DocumentReport, no_color: bool) -> String {
    match document.status {
        DocumentStatus::Pass if document.cached => {
            format!("  {}  {} (cached)", pass_label(no_color), document.document_path)
        }
        DocumentStatus::Pass => format!("  {}  {}", pass_label(no_color), document.document_path),
        DocumentStatus::Fail => format!("  {}  {}", fail_label(no_color), document.document_path),
        DocumentStatus::Cancelled => {
            format!("  {}  {}", skip_label(no_color), document.document_path)
        }
    }
}

/// Print one line per document, a diagnostic per failure and the totals.
pub fn print_report(report: &BuildReport, no_color: bool) {
    for document in &report.documents {
        eprintln!("{}", status_line(document, no_color));
    }

    let failed: Vec<&DocumentReport> = report
        .documents
        .iter()
        .filter(|d| d.status == DocumentStatus::Fail)
        .collect();
    if !failed.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for document in failed {
            eprintln!();
            emit_failures(document, no_color);
        }
    }

    eprintln!();
    let counts = format!(
        "{} passed, {} failed, {} cancelled",
        report.passed, report.failed, report.cancelled
    );
    match (report.is_success(), no_color) {
        (true, true) => eprintln!("build result: ok. {}", counts),
        (true, false) => eprintln!("build result: \x1b[32mok\x1b[0m. {}", counts),
        (false, true) => eprintln!("build result: FAILED. {}", counts),
        (false, false) => eprintln!("build result: \x1b[31mFAILED\x1b[0m. {}", counts),
    }
}

/// Render a document's failures against its source. Falls back to the plain
/// `path:line: kind: message` form when the source is no longer readable.
fn emit_failures(document: &DocumentReport, no_color: bool) {
    let source = match std::fs::read_to_string(&document.source_path) {
        Ok(source) => source,
        Err(_) => {
            for failure in &document.failures {
                eprintln!("  {}", failure);
            }
            return;
        }
    };

    let color_choice = if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };
    let writer = StandardStream::stderr(color_choice);
    let config = term::Config::default();
    let mut files = SimpleFiles::new();
    let file_id = files.add(document.source_path.display().to_string(), source);

    for failure in &document.failures {
        let diagnostic = failure.to_diagnostic(file_id);
        if term::emit_to_write_style(&mut writer.lock(), &config, &files, &diagnostic).is_err() {
            eprintln!("  {}", failure);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn cached_documents_are_marked() {
        let document = DocumentReport::pass("a.md".to_string(), PathBuf::from("in/a.md"), true);
        assert_eq!(status_line(&document, true), "  PASS  a.md (cached)");
    }

    #[test]
    fn cancelled_documents_are_skipped() {
        let document = DocumentReport::cancelled("b.md".to_string(), PathBuf::from("in/b.md"));
        assert_eq!(status_line(&document, true), "  SKIP  b.md");
    }

    #[test]
    fn colored_labels_use_ansi_codes() {
        let document = DocumentReport::fail("c.md".to_string(), PathBuf::from("in/c.md"), Vec::new());
        assert_eq!(status_line(&document, false), "  \x1b[31mFAIL\x1b[0m  c.md");
    }
}
