use std::io::{BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("binary not found: {binary}")]
    MissingBinary { binary: String },
    #[error("failed to spawn {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to wait for {binary}: {source}")]
    Wait {
        binary: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn current_dir(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

/// Runs `spec` to completion, capturing stdout and stderr. With a `timeout`
/// the child runs in its own process group, and the whole group is killed
/// and reaped once the deadline passes. Output captured up to that point is
/// returned with `timed_out` set.
pub fn run_captured(
    spec: &CommandSpec,
    timeout: Option<Duration>,
) -> Result<ProcessOutput, ProcessError> {
    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(cwd) = &spec.cwd {
        command.current_dir(cwd);
    }
    #[cfg(unix)]
    if timeout.is_some() {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(ProcessError::MissingBinary {
                binary: spec.program.clone(),
            })
        }
        Err(source) => {
            return Err(ProcessError::Spawn {
                binary: spec.program.clone(),
                source,
            })
        }
    };

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let stdout_reader = thread::spawn(move || drain(stdout));
    let stderr_reader = thread::spawn(move || drain(stderr));

    let wait_error = |source| ProcessError::Wait {
        binary: spec.program.clone(),
        source,
    };
    let start = Instant::now();
    let mut timed_out = false;
    let exit_status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if timeout.is_some_and(|limit| start.elapsed() > limit) {
                    timed_out = true;
                    terminate(&mut child);
                    break child.wait().map_err(wait_error)?;
                }
                thread::sleep(Duration::from_millis(10));
            }
            Err(err) => {
                terminate(&mut child);
                let _ = child.wait();
                return Err(wait_error(err));
            }
        }
    };

    let stdout = stdout_reader.join().unwrap_or_default();
    let stderr = stderr_reader.join().unwrap_or_default();

    Ok(ProcessOutput {
        exit_code: exit_status.code().unwrap_or(-1),
        stdout,
        stderr,
        timed_out,
    })
}

fn drain<R: Read>(pipe: Option<R>) -> String {
    let Some(pipe) = pipe else {
        return String::new();
    };
    let mut buf = Vec::new();
    let mut reader = BufReader::new(pipe);
    let _ = reader.read_to_end(&mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(unix)]
fn terminate(child: &mut Child) {
    if let Ok(pgid) = i32::try_from(child.id()) {
        // SAFETY: kill(2) with a negative pid only signals the process group
        // created for this child via `process_group(0)`.
        unsafe {
            libc::kill(-pgid, libc::SIGKILL);
        }
    }
    let _ = child.kill();
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    let _ = child.kill();
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_both_streams_and_exit_code() {
        let spec = CommandSpec::new("/bin/sh")
            .arg("-c")
            .arg("echo out; echo err 1>&2; exit 3");
        let output = run_captured(&spec, None).expect("run");
        assert_eq!(output.exit_code, 3);
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        assert!(!output.timed_out);
    }

    #[test]
    fn timeout_kills_process_group_and_keeps_partial_output() {
        let spec = CommandSpec::new("/bin/sh")
            .arg("-c")
            .arg("echo partial; sleep 30 & sleep 30; echo never");
        let started = Instant::now();
        let output = run_captured(&spec, Some(Duration::from_millis(200))).expect("run");
        assert!(output.timed_out);
        assert_eq!(output.stdout, "partial\n");
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn missing_binary_is_explicit() {
        let spec = CommandSpec::new("/definitely/not/here");
        let err = run_captured(&spec, None).expect_err("missing");
        assert!(matches!(err, ProcessError::MissingBinary { .. }));
    }
}
