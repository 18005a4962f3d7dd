//! Local command execution for remote requests.
//!
//! Any peer on the radio network can ask the station to run a command, so
//! execution sits behind the [`Executor`] trait: [`ProcessExecutor`] runs a
//! real program, [`DisabledExecutor`] refuses everything.

use std::io::{self, Read};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use thiserror::Error;
use tracing::{debug, warn};

/// Default limit on how long a remote command may run.
pub const EXEC_TIMEOUT: Duration = Duration::from_secs(10);

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How long output is still collected after the command was killed.
const OUTPUT_GRACE: Duration = Duration::from_millis(200);

const PIPE_CHUNK: usize = 1024;

/// Errors raised when a command cannot be run at all.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The command line was blank.
    #[error("empty command")]
    EmptyCommand,

    /// The program could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        /// Program name.
        program: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Execution is turned off.
    #[error("remote execution is disabled")]
    Disabled,

    /// Waiting on the child process failed.
    #[error("failed to wait for {program}: {source}")]
    Wait {
        /// Program name.
        program: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

/// Runs a command line and returns what it printed.
pub trait Executor {
    /// Execute `command_line`, returning its combined output.
    fn execute(&mut self, command_line: &str) -> Result<Vec<u8>, ExecutorError>;
}

impl<E: Executor + ?Sized> Executor for Box<E> {
    fn execute(&mut self, command_line: &str) -> Result<Vec<u8>, ExecutorError> {
        (**self).execute(command_line)
    }
}

/// Refuses every command.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledExecutor;

impl Executor for DisabledExecutor {
    fn execute(&mut self, _command_line: &str) -> Result<Vec<u8>, ExecutorError> {
        Err(ExecutorError::Disabled)
    }
}

/// Runs the command line as a program with arguments.
///
/// The line is split on whitespace; there is no shell, so no pipes,
/// redirection or globbing. Output is stdout followed by stderr.
///
/// The program runs in its own process group. If it, or anything it started,
/// is still running or holding its output open when the timeout expires, the
/// whole group is killed and whatever was printed is returned with a note
/// appended. The call never takes much longer than the timeout.
#[derive(Debug, Clone, Copy)]
pub struct ProcessExecutor {
    timeout: Duration,
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        ProcessExecutor {
            timeout: EXEC_TIMEOUT,
        }
    }
}

impl ProcessExecutor {
    /// Create an executor with a custom time limit.
    pub fn new(timeout: Duration) -> Self {
        ProcessExecutor { timeout }
    }

    /// The time limit per command.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Executor for ProcessExecutor {
    fn execute(&mut self, command_line: &str) -> Result<Vec<u8>, ExecutorError> {
        let mut args = command_line.split_whitespace();
        let program = args.next().ok_or(ExecutorError::EmptyCommand)?;

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command.spawn().map_err(|source| ExecutorError::Spawn {
            program: program.to_string(),
            source,
        })?;

        let (tx, rx) = crossbeam_channel::unbounded();
        forward(child.stdout.take(), Pipe::Stdout, tx.clone());
        forward(child.stderr.take(), Pipe::Stderr, tx);

        let deadline = Instant::now() + self.timeout;
        let mut output = Output::default();
        let mut status = None;
        while !(status.is_some() && output.closed) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            if status.is_none() {
                status = match child.try_wait() {
                    Ok(polled) => polled,
                    Err(source) => {
                        kill_group(&mut child);
                        return Err(ExecutorError::Wait {
                            program: program.to_string(),
                            source,
                        });
                    }
                };
            }
            let until = (now + EXIT_POLL_INTERVAL).min(deadline);
            if output.closed {
                thread::sleep(until.saturating_duration_since(Instant::now()));
            } else {
                output.collect(&rx, until);
            }
        }

        // Either the command or something it started still holds on.
        let finished = status.is_some() && output.closed;
        if !finished {
            warn!("{} still running after {:?}, killing it", program, self.timeout);
            kill_group(&mut child);
            if status.is_none() {
                status = child.wait().ok();
            }
            output.collect(&rx, Instant::now() + OUTPUT_GRACE);
        }
        if let Some(status) = status {
            debug!("{} exited with {}", program, status);
        }

        let mut bytes = output.stdout;
        bytes.extend(output.stderr);
        if !finished {
            bytes.extend(format!(" [killed after {:?}]", self.timeout).bytes());
        }
        Ok(bytes)
    }
}

#[derive(Debug, Clone, Copy)]
enum Pipe {
    Stdout,
    Stderr,
}

/// Output gathered from the child's pipes.
#[derive(Debug, Default)]
struct Output {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    /// Both pipes reached end of file.
    closed: bool,
}

impl Output {
    /// Take chunks until `until`, or until every pipe is closed.
    fn collect(&mut self, rx: &Receiver<(Pipe, Vec<u8>)>, until: Instant) {
        while !self.closed {
            match rx.recv_deadline(until) {
                Ok((Pipe::Stdout, chunk)) => self.stdout.extend(chunk),
                Ok((Pipe::Stderr, chunk)) => self.stderr.extend(chunk),
                Err(RecvTimeoutError::Timeout) => return,
                Err(RecvTimeoutError::Disconnected) => self.closed = true,
            }
        }
    }
}

/// Forward a child pipe to `tx` on a helper thread until end of file.
///
/// A pipe held open by a process that escaped the kill leaves its thread
/// blocked until that process exits; nothing waits for it.
fn forward<R: Read + Send + 'static>(pipe: Option<R>, which: Pipe, tx: Sender<(Pipe, Vec<u8>)>) {
    let Some(mut pipe) = pipe else {
        return;
    };
    thread::spawn(move || {
        let mut buf = [0u8; PIPE_CHUNK];
        loop {
            match pipe.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send((which, buf[..n].to_vec())).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
    });
}

/// Kill the child and everything else in its process group.
#[cfg(unix)]
fn kill_group(child: &mut Child) {
    // The child leads its own group (process_group(0) at spawn).
    if let Ok(pgid) = libc::pid_t::try_from(child.id()) {
        // SAFETY: killpg takes plain integers and touches no memory.
        unsafe {
            libc::killpg(pgid, libc::SIGKILL);
        }
    }
    let _ = child.kill();
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child) {
    let _ = child.kill();
}
