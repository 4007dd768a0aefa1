//! External command execution.
//!
//! The engine never forks directly: once-per-content actions (install
//! scripts, Brewfiles) go through the [`Executor`] trait so tests can
//! substitute a mock. The real implementation is [`SystemExecutor`], which
//! enforces a per-invocation timeout by polling the child process.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::error::ExecutionError;

/// Default timeout for external commands: five minutes.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Poll interval while waiting for a child process.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A single command invocation: program, arguments, working directory,
/// extra environment, and timeout.
#[derive(Debug, Clone)]
pub struct ExecRequest {
    /// Program to run (resolved via `PATH`).
    pub program: String,
    /// Arguments passed verbatim.
    pub args: Vec<String>,
    /// Working directory; inherits the current one when `None`.
    pub working_dir: Option<PathBuf>,
    /// Extra environment variables layered over the inherited environment.
    pub env: Vec<(String, String)>,
    /// Wall-clock limit; the child is killed when exceeded.
    pub timeout: Duration,
}

impl ExecRequest {
    /// Build a request with the default timeout and inherited environment.
    #[must_use]
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(ToString::to_string).collect(),
            working_dir: None,
            env: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the working directory.
    #[must_use]
    pub fn in_dir(mut self, dir: &Path) -> Self {
        self.working_dir = Some(dir.to_path_buf());
        self
    }

    /// Add an environment variable.
    #[must_use]
    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    /// Override the timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Result of a command execution.
#[derive(Debug, Clone)]
pub struct ExecResult {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// `true` when the exit code was zero.
    pub success: bool,
    /// Exit code; `None` when terminated by a signal.
    pub code: Option<i32>,
}

/// Interface for running external commands.
///
/// `run` returns `Ok` even when the command exits non-zero; the caller
/// inspects [`ExecResult::success`]. Errors are reserved for spawn
/// failures and timeouts.
pub trait Executor: Send + Sync + std::fmt::Debug {
    /// Run a command to completion, honouring the request's timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::Io`] if the program cannot be spawned and
    /// [`ExecutionError::Timeout`] if it exceeds the timeout (the child is
    /// killed first).
    fn run(&self, request: &ExecRequest) -> Result<ExecResult, ExecutionError>;

    /// Check whether a program is available on `PATH`.
    fn which(&self, program: &str) -> bool;
}

/// [`Executor`] backed by [`std::process::Command`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn run(&self, request: &ExecRequest) -> Result<ExecResult, ExecutionError> {
        let mut cmd = Command::new(&request.program);
        cmd.args(&request.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &request.working_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &request.env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|source| ExecutionError::Io {
            path: PathBuf::from(&request.program),
            source,
        })?;

        // Drain pipes on background threads so a chatty child cannot
        // deadlock against a full pipe buffer while we poll.
        let stdout_handle = child.stdout.take().map(spawn_reader);
        let stderr_handle = child.stderr.take().map(spawn_reader);

        let deadline = Instant::now() + request.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(ExecutionError::Timeout {
                            command: request.program.clone(),
                            seconds: request.timeout.as_secs(),
                        });
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(source) => {
                    return Err(ExecutionError::Io {
                        path: PathBuf::from(&request.program),
                        source,
                    });
                }
            }
        };

        let stdout = stdout_handle.map_or_else(String::new, join_reader);
        let stderr = stderr_handle.map_or_else(String::new, join_reader);

        Ok(ExecResult {
            stdout,
            stderr,
            success: status.success(),
            code: status.code(),
        })
    }

    fn which(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

/// Read a child pipe to EOF on a background thread.
fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).to_string()
    })
}

/// Join a reader thread, swallowing panics into an empty string.
fn join_reader(handle: std::thread::JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}
