//! Blocking subprocess execution with a wall-clock bound.

use super::error::AttemptFailure;
use std::fmt;
use std::io::{Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A fully-specified command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

/// Run `invocation`, feeding `stdin` if given, and wait at most `timeout`.
///
/// Stdout and stderr are drained on helper threads so a chatty child cannot
/// block on a full pipe. On timeout the child is killed and the readers are
/// left to finish on their own.
pub(crate) fn run(
    invocation: &Invocation,
    stdin: Option<&[u8]>,
    timeout: Duration,
) -> Result<ProcessOutput, AttemptFailure> {
    let mut child = Command::new(&invocation.program)
        .args(&invocation.args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| AttemptFailure::Spawn {
            program: invocation.program.clone(),
            reason: e.to_string(),
        })?;

    let writer = match (child.stdin.take(), stdin) {
        (Some(mut pipe), Some(data)) => {
            let data = data.to_vec();
            // Broken pipe just means the child stopped reading; its exit status tells the rest.
            Some(thread::spawn(move || {
                let _ = pipe.write_all(&data);
            }))
        }
        _ => None,
    };

    let stdout_reader = child.stdout.take().map(|mut out| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = out.read_to_end(&mut buf);
            buf
        })
    });
    let stderr_reader = child.stderr.take().map(|mut err| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = err.read_to_end(&mut buf);
            buf
        })
    });

    let start = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if start.elapsed() > timeout {
                    log::debug!(
                        "{} timed out after {:.2}s, terminating",
                        invocation.program,
                        start.elapsed().as_secs_f64()
                    );
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(AttemptFailure::Timeout(timeout.as_secs()));
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(AttemptFailure::Io(format!(
                    "failed to wait for {}: {}",
                    invocation.program, e
                )));
            }
        }
    };

    if let Some(handle) = writer {
        let _ = handle.join();
    }
    let stdout = stdout_reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();
    let stderr = stderr_reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();

    Ok(ProcessOutput {
        status,
        stdout,
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::{Invocation, run};
    use crate::render::AttemptFailure;
    use std::time::Duration;

    fn sh(script: &str) -> Invocation {
        Invocation::new("/bin/sh", vec!["-c".to_string(), script.to_string()])
    }

    #[test]
    fn pipes_stdin_through_to_stdout() {
        let output = run(&sh("cat"), Some(b"hello"), Duration::from_secs(10)).expect("runs");
        assert!(output.status.success());
        assert_eq!(output.stdout, b"hello");
    }

    #[test]
    fn captures_stderr_and_exit_code() {
        let output = run(&sh("echo oops >&2; exit 3"), None, Duration::from_secs(10)).expect("runs");
        assert_eq!(output.status.code(), Some(3));
        assert_eq!(output.stderr.trim(), "oops");
    }

    #[test]
    fn missing_program_is_a_spawn_failure() {
        let inv = Invocation::new("/nonexistent/pumlview-tool", Vec::new());
        let err = run(&inv, None, Duration::from_secs(1)).expect_err("cannot spawn");
        assert!(matches!(err, AttemptFailure::Spawn { .. }));
    }

    #[test]
    fn slow_process_times_out() {
        let err = run(&sh("exec sleep 5"), None, Duration::from_millis(200)).expect_err("too slow");
        assert_eq!(err, AttemptFailure::Timeout(0));
    }

    #[test]
    fn display_joins_program_and_args() {
        let inv = Invocation::new("java", vec!["-jar".to_string(), "plantuml.jar".to_string()]);
        assert_eq!(inv.to_string(), "java -jar plantuml.jar");
    }
}
