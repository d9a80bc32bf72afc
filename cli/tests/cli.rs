#![allow(deprecated)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

struct Project {
    dir: TempDir,
}

impl Project {
    fn new() -> Self {
        Project {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn write(&self, relative: &str, text: &str) -> PathBuf {
        let path = self.path().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, text).unwrap();
        path
    }

    fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.path().join(relative)).unwrap()
    }

    fn litbook(&self) -> Command {
        let mut cmd = Command::cargo_bin("litbook").unwrap();
        cmd.current_dir(self.path()).arg("--no-color");
        cmd
    }
}

const PASSING: &str = "# Intro\n\n```scala:book\nval x = 1 + 1\n```\n";

const FAILING: &str = "Text\n\n```scala:book\nval n: Int = \"no\"\n```\n";

#[test]
fn build_writes_rendered_output() {
    let project = Project::new();
    project.write("docs/intro.md", PASSING);

    project
        .litbook()
        .args(["build", "docs", "out", "--jobs", "2", "--fail-slow", "--timeout-ms", "5000"])
        .assert()
        .success()
        .stderr(predicate::str::contains("PASS  intro.md"))
        .stderr(predicate::str::contains("build result: ok. 1 passed, 0 failed, 0 cancelled"));

    assert_eq!(
        project.read("out/intro.md"),
        "# Intro\n\n```scala\nval x = 1 + 1\n// x: Int = 2\n```\n"
    );
}

#[test]
fn failing_document_exits_with_one() {
    let project = Project::new();
    project.write("docs/ok.md", PASSING);
    project.write("docs/bad.md", FAILING);

    project
        .litbook()
        .args(["build", "docs", "out", "--jobs", "1", "--fail-slow", "--timeout-ms", "5000"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("FAIL  bad.md"))
        .stderr(predicate::str::contains("ExecutionError"))
        .stderr(predicate::str::contains("type mismatch"))
        .stderr(predicate::str::contains("build result: FAILED. 1 passed, 1 failed, 0 cancelled"));

    assert!(project.path().join("out/ok.md").exists());
    assert!(!project.path().join("out/bad.md").exists());
}

#[test]
fn settings_come_from_config_file() {
    let project = Project::new();
    project.write("docs/intro.md", PASSING);
    project.write(
        "litbook.toml",
        "input = \"docs\"\noutput = \"site\"\njobs = 1\nfail_fast = true\ntimeout_ms = 5000\n",
    );

    project.litbook().arg("build").assert().success();

    assert!(project.path().join("site/intro.md").exists());
}

#[test]
fn missing_required_setting_is_a_setup_error() {
    let project = Project::new();
    project.write("docs/intro.md", PASSING);

    project
        .litbook()
        .args(["build", "docs", "out", "--fail-fast", "--timeout-ms", "5000"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("missing required setting `jobs`"));
}

#[test]
fn report_is_written_as_json() {
    let project = Project::new();
    project.write("docs/bad.md", FAILING);

    project
        .litbook()
        .args(["build", "docs", "out", "-j", "1", "--fail-fast", "--timeout-ms", "5000"])
        .args(["--report", "report.json"])
        .assert()
        .code(1);

    let report = project.read("report.json");
    assert!(report.contains("\"document_path\": \"bad.md\""));
    assert!(report.contains("\"segment_line\": 3"));
}

#[test]
fn blocks_lists_code_segments() {
    let project = Project::new();
    let file = project.write(
        "doc.md",
        "```scala:silent\nval a = 1\nval b = 2\n```\n\n```scala\nplain\n```\n\n```sql\nselect 1\n```\n",
    );

    project
        .litbook()
        .arg("blocks")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("1  scala      silent    2 line(s)"))
        .stdout(predicate::str::contains("6  scala      -         1 line(s)"))
        .stdout(predicate::str::contains("sql").not());
}

#[test]
fn check_reports_parse_errors() {
    let project = Project::new();
    project.write("docs/good.md", PASSING);
    project.write("docs/bad.md", "```scala:loud\n1\n```\n");

    project
        .litbook()
        .args(["check", "docs"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("loud"))
        .stderr(predicate::str::contains("1 of 2 document(s) failed to parse"));
}

#[test]
fn check_accepts_valid_document() {
    let project = Project::new();
    let file = project.write("good.md", PASSING);

    project
        .litbook()
        .arg("check")
        .arg(&file)
        .assert()
        .success()
        .stderr(predicate::str::contains("1 document(s) parsed successfully"));
}

#[test]
fn parse_commands_follow_the_configured_backend() {
    let project = Project::new();
    project.write(
        "litbook.toml",
        "[backend]\nkind = \"command\"\ncommand = [\"sh\"]\nlanguage = \"sh\"\ncomment_prefix = \"# \"\n",
    );
    let file = project.write("doc.md", "```sh:book\necho hi\n```\n\n```scala:book\n1 + 1\n```\n");

    project
        .litbook()
        .arg("blocks")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("1  sh         book      1 line(s)"))
        .stdout(predicate::str::contains("scala").not());
}

#[test]
fn check_uses_configured_extensions() {
    let project = Project::new();
    project.write("litbook.toml", "extensions = [\"markdown\"]\n");
    project.write("docs/good.markdown", PASSING);
    project.write("docs/bad.markdown", "```scala:loud\n1\n```\n");
    project.write("docs/ignored.md", "```scala:loud\n1\n```\n");

    project
        .litbook()
        .args(["check", "docs"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("1 of 2 document(s) failed to parse"));
}
