mod common;

use std::fs;
use std::path::Path;
use std::time::Duration;

use common::{FakeBackend, line_of};
use litbook::config::DEFAULT_WIDTH;
use litbook::{
    BackendConfig, BuildConfig, CompileError, CompileOptions, DocumentStatus, FailPolicy,
    FailureKind, build, compile_document,
};

fn options() -> CompileOptions<'static> {
    CompileOptions {
        timeout: Duration::from_secs(5),
        width: DEFAULT_WIDTH,
        cancel: None,
    }
}

fn compile(source: &str) -> Result<String, CompileError> {
    compile_document(Path::new("doc.md"), source.to_string(), &FakeBackend::default(), &options())
}

fn compile_ok(source: &str) -> String {
    compile(source).expect("compile failed")
}

fn compile_failure(source: &str) -> litbook::Failure {
    match compile(source) {
        Err(CompileError::Failed(mut failures)) => {
            assert_eq!(failures.len(), 1);
            failures.remove(0)
        }
        other => panic!("expected a failure, got {:?}", other),
    }
}

fn config(input: &Path, output: &Path, jobs: usize, fail_policy: FailPolicy) -> BuildConfig {
    BuildConfig {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        jobs,
        fail_policy,
        timeout: Duration::from_secs(5),
        width: DEFAULT_WIDTH,
        incremental: false,
        report: None,
        extensions: vec!["md".to_string()],
        backend: BackendConfig::Builtin,
    }
}

fn write(root: &Path, relative: &str, text: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

// ---------------------------------------------------------------------------
// Single documents
// ---------------------------------------------------------------------------

#[test]
fn document_without_executable_code_is_unchanged() {
    let source = "# Notes\n\n```fake\ndefine x\n```\n\n```sql:book\nselect 1;\n```\n\n> quoted\n";
    let backend = FakeBackend::default();
    let output =
        compile_document(Path::new("doc.md"), source.to_string(), &backend, &options()).unwrap();
    assert_eq!(output, source);
    assert_eq!(backend.calls(), 0);
}

#[test]
fn book_renders_code_and_output() {
    let source = "Intro.\n\n```fake:book\necho hello\n```\n\nOutro.\n";
    assert_eq!(
        compile_ok(source),
        "Intro.\n\n```fake\necho hello\n// hello\n```\n\nOutro.\n"
    );
}

#[test]
fn silent_renders_code_only() {
    let output = compile_ok("```fake:silent\necho hidden\n```\n");
    assert_eq!(output, "```fake\necho hidden\n```\n");
}

#[test]
fn invisible_renders_nothing_but_defines_state() {
    let source = "A\n\n```fake:invisible\ndefine secret\n```\n\n```fake:book\nuse secret\n```\n";
    let output = compile_ok(source);
    assert!(!output.contains("define secret"));
    assert!(output.contains("use secret\n// secret is defined\n"));
    assert!(output.starts_with("A\n\n\n```fake\n"));
}

#[test]
fn fail_renders_the_error() {
    let source = "```fake:fail\necho before\nthrow boom\n```\n";
    assert_eq!(
        compile_ok(source),
        "```fake\necho before\nthrow boom\n// before\n// error: boom\n```\n"
    );
}

#[test]
fn fail_that_succeeds_is_an_unexpected_success() {
    let source = "Text\n\n```fake:fail\necho fine\n```\n";
    let failure = compile_failure(source);
    assert_eq!(failure.kind, FailureKind::UnexpectedSuccessError);
    assert_eq!(failure.line, 3);
}

#[test]
fn error_in_book_segment_is_an_execution_error() {
    let source = "One\n\n```fake:book\ndefine a\n```\n\nTwo\n\n```fake:book\nuse missing\n```\n";
    let failure = compile_failure(source);
    assert_eq!(failure.kind, FailureKind::ExecutionError);
    assert_eq!(failure.line, line_of(source, "use missing") - 1);
    assert!(failure.message.contains("not found: value missing"));
}

#[test]
fn evaluation_stops_at_the_first_failure() {
    let backend = FakeBackend::default();
    let source = "```fake:silent\nthrow stop\n```\n\n```fake:book\necho later\n```\n";
    let result = compile_document(Path::new("doc.md"), source.to_string(), &backend, &options());
    assert!(matches!(result, Err(CompileError::Failed(_))));
    assert_eq!(backend.calls(), 1);
}

#[test]
fn timeout_is_reported_even_in_fail_mode() {
    let failure = compile_failure("```fake:fail\nhang\n```\n");
    assert_eq!(failure.kind, FailureKind::TimeoutError);
    assert!(failure.message.contains("timed out"));
}

#[test]
fn backend_breakdown_never_counts_as_the_expected_failure() {
    let failure = compile_failure("Intro\n\n```fake:fail\ncrash\n```\n");
    assert_eq!(failure.kind, FailureKind::ExecutionError);
    assert_eq!(failure.line, 3);
    assert!(failure.message.contains("backend failure: interpreter process died"));
}

#[test]
fn output_containing_the_fence_is_a_render_error() {
    let failure = compile_failure("```fake:book\necho ```\n```\n");
    assert_eq!(failure.kind, FailureKind::RenderError);
    assert_eq!(failure.line, 1);
}

#[test]
fn longer_fence_can_embed_backticks() {
    let output = compile_ok("````fake:book\necho ```\n````\n");
    assert_eq!(output, "````fake\necho ```\n// ```\n````\n");
}

#[test]
fn rendered_blocks_keep_block_quote_prefix() {
    let source = "> ```fake:book\n> echo quoted\n> ```\n";
    assert_eq!(
        compile_ok(source),
        "> ```fake\n> echo quoted\n> // quoted\n> ```\n"
    );
}

#[test]
fn long_output_lines_are_wrapped_reversibly() {
    let long = "x".repeat(200);
    let source = format!("```fake:book\necho {}\n```\n", long);
    let output = compile_ok(&source);
    let comments: Vec<&str> = output.lines().filter(|l| l.starts_with("//")).collect();
    assert!(comments.len() > 1);
    assert!(comments.iter().all(|l| l.chars().count() <= DEFAULT_WIDTH));
    assert_eq!(litbook::render::unwrap_comment_lines(comments, "// "), long);
}

#[test]
fn parse_errors_are_reported_with_their_line() {
    let failure = compile_failure("Text\n```fake:book\ndefine a\n");
    assert_eq!(failure.kind, FailureKind::ParseError);
    assert_eq!(failure.line, 2);
}

// ---------------------------------------------------------------------------
// Builds
// ---------------------------------------------------------------------------

#[test]
fn build_mirrors_the_input_tree() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write(input.path(), "intro.md", "```fake:book\necho hi\n```\n");
    write(input.path(), "guide/nested.md", "Plain prose.\n");
    write(input.path(), "notes.txt", "not a document\n");

    let backend = FakeBackend::default();
    let config = config(input.path(), output.path(), 2, FailPolicy::FailSlow);
    let report = build(&config, &backend).unwrap();

    assert!(report.is_success());
    assert_eq!(report.passed, 2);
    assert_eq!(
        fs::read_to_string(output.path().join("intro.md")).unwrap(),
        "```fake\necho hi\n// hi\n```\n"
    );
    assert_eq!(
        fs::read_to_string(output.path().join("guide/nested.md")).unwrap(),
        "Plain prose.\n"
    );
    assert!(!output.path().join("notes.txt").exists());
}

#[test]
fn documents_do_not_share_sessions() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write(input.path(), "a.md", "```fake:silent\ndefine shared\n```\n");
    write(input.path(), "b.md", "Text\n\n```fake:book\nuse shared\n```\n");

    let backend = FakeBackend::default();
    let report = build(&config(input.path(), output.path(), 1, FailPolicy::FailSlow), &backend).unwrap();

    assert_eq!(report.document("a.md").unwrap().status, DocumentStatus::Pass);
    let b = report.document("b.md").unwrap();
    assert_eq!(b.status, DocumentStatus::Fail);
    assert_eq!(b.failures[0].kind, FailureKind::ExecutionError);
    assert_eq!(b.failures[0].line, 3);
    assert!(!output.path().join("b.md").exists());
    assert_eq!(report.exit_code(), 1);
}

#[test]
fn fail_slow_reports_every_failure() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write(input.path(), "a.md", "```fake:book\nthrow first\n```\n");
    write(input.path(), "b.md", "```fake:book\necho fine\n```\n");
    write(input.path(), "c.md", "```fake:fail\necho second\n```\n");

    let report = build(
        &config(input.path(), output.path(), 3, FailPolicy::FailSlow),
        &FakeBackend::default(),
    )
    .unwrap();

    assert_eq!(report.failed, 2);
    assert_eq!(report.passed, 1);
    assert_eq!(report.cancelled, 0);
    assert_eq!(
        report.document("c.md").unwrap().failures[0].kind,
        FailureKind::UnexpectedSuccessError
    );
}

#[test]
fn fail_fast_cancels_remaining_documents() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write(input.path(), "a.md", "```fake:book\nthrow early\n```\n");
    write(input.path(), "b.md", "```fake:book\necho b\n```\n");
    write(input.path(), "c.md", "```fake:book\necho c\n```\n");

    let backend = FakeBackend::default();
    let report = build(&config(input.path(), output.path(), 1, FailPolicy::FailFast), &backend).unwrap();

    assert_eq!(report.document("a.md").unwrap().status, DocumentStatus::Fail);
    assert_eq!(report.document("b.md").unwrap().status, DocumentStatus::Cancelled);
    assert_eq!(report.document("c.md").unwrap().status, DocumentStatus::Cancelled);
    assert_eq!(backend.calls(), 1);
    assert!(!report.is_success());
}

#[test]
fn incremental_rebuild_reuses_unchanged_documents() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write(input.path(), "a.md", "```fake:book\necho one\n```\n");
    write(input.path(), "b.md", "```fake:book\necho two\n```\n");

    let mut config = config(input.path(), output.path(), 2, FailPolicy::FailSlow);
    config.incremental = true;

    let first_backend = FakeBackend::default();
    let first = build(&config, &first_backend).unwrap();
    assert!(first.is_success());
    assert_eq!(first_backend.calls(), 2);
    let a_before = fs::read(output.path().join("a.md")).unwrap();

    let second_backend = FakeBackend::default();
    let second = build(&config, &second_backend).unwrap();
    assert!(second.is_success());
    assert_eq!(second_backend.calls(), 0);
    assert!(second.documents.iter().all(|d| d.cached));
    assert_eq!(fs::read(output.path().join("a.md")).unwrap(), a_before);

    write(input.path(), "b.md", "```fake:book\necho changed\n```\n");
    let third_backend = FakeBackend::default();
    let third = build(&config, &third_backend).unwrap();
    assert_eq!(third_backend.calls(), 1);
    assert!(third.document("a.md").unwrap().cached);
    assert!(!third.document("b.md").unwrap().cached);
}

#[test]
fn incremental_rebuild_notices_changed_width() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write(input.path(), "a.md", "```fake:book\necho one\n```\n");

    let mut config = config(input.path(), output.path(), 1, FailPolicy::FailSlow);
    config.incremental = true;
    build(&config, &FakeBackend::default()).unwrap();

    config.width = 40;
    let backend = FakeBackend::default();
    build(&config, &backend).unwrap();
    assert_eq!(backend.calls(), 1);
}

#[test]
fn output_inside_input_is_not_compiled() {
    let input = tempfile::tempdir().unwrap();
    write(input.path(), "a.md", "```fake:book\necho one\n```\n");
    let output = input.path().join("out");

    let backend = FakeBackend::default();
    let config = config(input.path(), &output, 1, FailPolicy::FailSlow);
    build(&config, &backend).unwrap();
    let report = build(&config, &backend).unwrap();

    assert_eq!(report.documents.len(), 1);
    assert_eq!(report.documents[0].document_path, "a.md");
}

#[test]
fn report_json_lists_failures() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let report_path = output.path().join("reports/build.json");
    write(input.path(), "ok.md", "Prose only.\n");
    write(input.path(), "bad.md", "Line one\n\n```fake:fail\necho fine\n```\n");

    let mut config = config(input.path(), output.path(), 2, FailPolicy::FailSlow);
    config.report = Some(report_path.clone());
    build(&config, &FakeBackend::default()).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(json["failed"], 1);
    assert_eq!(json["passed"], 1);
    let bad = json["documents"]
        .as_array()
        .unwrap()
        .iter()
        .find(|d| d["document_path"] == "bad.md")
        .unwrap();
    assert_eq!(bad["status"], "fail");
    assert_eq!(bad["failures"][0]["kind"], "UnexpectedSuccessError");
    assert_eq!(bad["failures"][0]["segment_line"], 3);
}

#[test]
fn missing_input_root_is_a_build_error() {
    let output = tempfile::tempdir().unwrap();
    let missing = output.path().join("nope");
    let result = build(
        &config(&missing, output.path(), 1, FailPolicy::FailSlow),
        &FakeBackend::default(),
    );
    assert!(matches!(result, Err(litbook::Error::InputRoot(_))));
}

#[test]
fn output_root_equal_to_input_root_is_rejected() {
    let input = tempfile::tempdir().unwrap();
    let source = "# A\n\n```fake:book\necho hi\n```\n";
    write(input.path(), "a.md", source);

    let backend = FakeBackend::default();
    let result = build(&config(input.path(), input.path(), 1, FailPolicy::FailSlow), &backend);

    assert!(matches!(result, Err(litbook::Error::OutputIsInput(_))));
    assert_eq!(backend.calls(), 0);
    assert_eq!(fs::read_to_string(input.path().join("a.md")).unwrap(), source);
}

#[test]
fn failing_document_removes_its_previous_output() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write(input.path(), "a.md", "```fake:book\necho old\n```\n");
    let config = config(input.path(), output.path(), 1, FailPolicy::FailSlow);

    assert!(build(&config, &FakeBackend::default()).unwrap().is_success());
    assert!(output.path().join("a.md").exists());

    write(input.path(), "a.md", "```fake:book\nthrow boom\n```\n");
    let report = build(&config, &FakeBackend::default()).unwrap();

    assert_eq!(report.document("a.md").unwrap().status, DocumentStatus::Fail);
    assert!(!output.path().join("a.md").exists());
}

#[test]
fn cancelled_document_removes_its_previous_output() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write(input.path(), "a.md", "```fake:book\necho a\n```\n");
    write(input.path(), "b.md", "```fake:book\necho b\n```\n");
    let config = config(input.path(), output.path(), 1, FailPolicy::FailFast);

    assert!(build(&config, &FakeBackend::default()).unwrap().is_success());
    assert!(output.path().join("b.md").exists());

    write(input.path(), "a.md", "```fake:book\nthrow early\n```\n");
    let report = build(&config, &FakeBackend::default()).unwrap();

    assert_eq!(report.document("b.md").unwrap().status, DocumentStatus::Cancelled);
    assert!(!output.path().join("a.md").exists());
    assert!(!output.path().join("b.md").exists());
}

#[test]
fn incremental_cache_forgets_deleted_documents() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write(input.path(), "keep.md", "```fake:book\necho keep\n```\n");
    write(input.path(), "gone.md", "```fake:book\necho gone\n```\n");

    let mut config = config(input.path(), output.path(), 1, FailPolicy::FailSlow);
    config.incremental = true;
    build(&config, &FakeBackend::default()).unwrap();

    let cache_path = output.path().join(litbook::build::cache::CACHE_FILE_NAME);
    assert!(fs::read_to_string(&cache_path).unwrap().contains("gone.md"));

    fs::remove_file(input.path().join("gone.md")).unwrap();
    build(&config, &FakeBackend::default()).unwrap();

    let cache = fs::read_to_string(&cache_path).unwrap();
    assert!(cache.contains("keep.md"));
    assert!(!cache.contains("gone.md"));
}
