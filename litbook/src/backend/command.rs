//! Backend that runs an external program once per segment.
//!
//! The program receives the session's accumulated code followed by the new
//! segment on stdin. A session is therefore the transcript of every segment
//! that succeeded so far; its stdout is remembered so only the output of
//! the new segment is reported.

use std::io::{Read, Write};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::backend::{Backend, ExecutionResult};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Debug, Clone)]
pub struct CommandBackend {
    program: Vec<String>,
    language: String,
    comment_prefix: String,
}

/// Replay state for one document.
#[derive(Debug, Default)]
pub struct CommandSession {
    prelude: String,
    prelude_stdout: String,
}

struct Captured {
    status_ok: bool,
    stdout: String,
    stderr: String,
}

impl CommandBackend {
    /// `program` is the argv to spawn; the first element is the executable.
    pub fn new(
        program: Vec<String>,
        language: impl Into<String>,
        comment_prefix: impl Into<String>,
    ) -> Self {
        CommandBackend {
            program,
            language: language.into(),
            comment_prefix: comment_prefix.into(),
        }
    }

    fn run(&self, input: String, timeout: Duration) -> Result<Option<Captured>, String> {
        let (executable, args) = self
            .program
            .split_first()
            .ok_or_else(|| "empty backend command".to_string())?;

        let mut child = Command::new(executable)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| format!("cannot start `{}`: {}", executable, e))?;

        let mut stdin = child.stdin.take();
        let writer = thread::spawn(move || {
            if let Some(stdin) = stdin.as_mut() {
                // The child may exit before reading everything.
                let _ = stdin.write_all(input.as_bytes());
            }
        });
        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());

        let status = match wait_with_deadline(&mut child, Instant::now() + timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                stop(&mut child);
                return Ok(None);
            }
            Err(e) => {
                stop(&mut child);
                return Err(format!("cannot wait for `{}`: {}", executable, e));
            }
        };

        let _ = writer.join();
        Ok(Some(Captured {
            status_ok: status.success(),
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        }))
    }
}

impl Backend for CommandBackend {
    type Session = CommandSession;

    fn language(&self) -> &str {
        &self.language
    }

    fn comment_prefix(&self) -> &str {
        &self.comment_prefix
    }

    fn identity(&self) -> String {
        format!("command:{}", self.program.join(" "))
    }

    fn open_session(&self) -> CommandSession {
        CommandSession::default()
    }

    fn execute(
        &self,
        session: &mut CommandSession,
        code: &str,
        timeout: Duration,
    ) -> ExecutionResult {
        let mut input = session.prelude.clone();
        input.push_str(code);
        if !input.ends_with('\n') {
            input.push('\n');
        }

        debug!(program = %self.program.join(" "), bytes = input.len(), "running command backend");

        let captured = match self.run(input.clone(), timeout) {
            Ok(Some(captured)) => captured,
            Ok(None) => return ExecutionResult::timeout(String::new(), timeout),
            Err(message) => return ExecutionResult::backend_error(message),
        };

        let output = captured
            .stdout
            .strip_prefix(session.prelude_stdout.as_str())
            .unwrap_or(&captured.stdout)
            .to_string();

        if captured.status_ok {
            session.prelude = input;
            session.prelude_stdout = captured.stdout;
            ExecutionResult::success(output)
        } else {
            let message = captured.stderr.trim();
            let message = if message.is_empty() {
                "command exited with a non-zero status"
            } else {
                message
            };
            ExecutionResult::failure(output, message)
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut bytes = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut bytes);
        }
        String::from_utf8_lossy(&bytes).into_owned()
    })
}

/// Kill and reap the child. Reader threads are detached and end when its
/// pipes close.
fn stop(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Poll the child until it exits or the deadline passes (`Ok(None)`).
fn wait_with_deadline(
    child: &mut Child,
    deadline: Instant,
) -> std::io::Result<Option<std::process::ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}
