use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use litbook::{Backend, ExecutionResult};

/// In-memory backend for a line-oriented toy language:
///
/// - `define NAME` binds NAME in the session
/// - `use NAME` prints "NAME is defined", or fails if NAME is unbound
/// - `echo TEXT` prints TEXT
/// - `throw TEXT` fails with TEXT
/// - `hang` runs out of time
/// - `crash` fails inside the backend itself
#[derive(Default)]
pub struct FakeBackend {
    calls: AtomicUsize,
}

impl FakeBackend {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Backend for FakeBackend {
    type Session = HashSet<String>;

    fn language(&self) -> &str {
        "fake"
    }

    fn identity(&self) -> String {
        "fake".to_string()
    }

    fn open_session(&self) -> HashSet<String> {
        HashSet::new()
    }

    fn execute(
        &self,
        session: &mut HashSet<String>,
        code: &str,
        timeout: Duration,
    ) -> ExecutionResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut output = String::new();
        for line in code.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let (command, arg) = line.split_once(' ').unwrap_or((line, ""));
            match command {
                "define" => {
                    session.insert(arg.to_string());
                }
                "use" if session.contains(arg) => {
                    output.push_str(&format!("{} is defined\n", arg));
                }
                "use" => return ExecutionResult::failure(output, format!("not found: value {}", arg)),
                "echo" => {
                    output.push_str(arg);
                    output.push('\n');
                }
                "throw" => return ExecutionResult::failure(output, arg),
                "hang" => return ExecutionResult::timeout(output, timeout),
                "crash" => return ExecutionResult::backend_error("interpreter process died"),
                other => {
                    return ExecutionResult::failure(output, format!("unknown command {}", other));
                }
            }
        }
        ExecutionResult::success(output)
    }
}

/// 1-based line of the first line containing `needle`.
pub fn line_of(source: &str, needle: &str) -> usize {
    source
        .lines()
        .position(|l| l.contains(needle))
        .map(|i| i + 1)
        .expect("needle not in source")
}
