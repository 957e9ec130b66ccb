//! Line-oriented transport between a session and its engine.
//!
//! [`ProcessChannel`] spawns the engine executable and talks over its
//! stdin/stdout pipes. Reads go through a background thread so that every
//! read can be bounded by a [`Deadline`]; without one a read blocks until the
//! engine prints a full line or exits.

use crate::error::SessionError;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

/// Point in time by which a protocol exchange must have completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    /// Deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
        }
    }

    /// Time left, zero once the deadline has passed.
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// The full budget this deadline was created with.
    pub fn budget(&self) -> Duration {
        self.budget
    }
}

/// Newline-framed text exchange with an engine.
pub trait LineChannel {
    /// Send one line; the newline is appended and the stream flushed.
    fn write_line(&mut self, line: &str) -> Result<(), SessionError>;

    /// Next complete line with trailing whitespace stripped.
    fn read_line(&mut self, deadline: Option<&Deadline>) -> Result<String, SessionError>;
}

/// A spawned engine process.
///
/// Dropping the channel sends `quit`, kills the process and reaps it.
pub struct ProcessChannel {
    /// The child process handle.
    process: Child,
    /// Handle to write commands to the engine's stdin.
    stdin: ChildStdin,
    /// Lines read from the engine's stdout by the reader thread.
    lines: Receiver<std::io::Result<String>>,
    path: PathBuf,
}

impl ProcessChannel {
    /// Spawns a new engine process.
    ///
    /// The environment is inherited and stderr is discarded. A bare name such
    /// as `stockfish` is looked up on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::EngineLaunchFailed`] if the process cannot be
    /// spawned, typically because the executable doesn't exist or lacks
    /// permissions.
    pub fn spawn<P: AsRef<Path>>(path: P) -> Result<Self, SessionError> {
        let path = path.as_ref().to_path_buf();
        let mut process = Command::new(&path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| SessionError::EngineLaunchFailed {
                path: path.clone(),
                source,
            })?;

        let (stdin, stdout) = match (process.stdin.take(), process.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                let _ = process.kill();
                let _ = process.wait();
                return Err(SessionError::ProcessTerminated);
            }
        };

        let (tx, lines) = mpsc::channel();
        let reader = thread::Builder::new()
            .name("uci-reader".to_string())
            .spawn(move || {
                let mut stdout = BufReader::new(stdout);
                loop {
                    let mut line = String::new();
                    match stdout.read_line(&mut line) {
                        Ok(0) => break,
                        Ok(_) => {
                            if tx.send(Ok(line)).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            let _ = tx.send(Err(e));
                            break;
                        }
                    }
                }
            });

        if let Err(e) = reader {
            let _ = process.kill();
            let _ = process.wait();
            return Err(e.into());
        }

        tracing::debug!(path = %path.display(), pid = process.id(), "engine process spawned");

        Ok(Self {
            process,
            stdin,
            lines,
            path,
        })
    }

    fn has_exited(&mut self) -> bool {
        matches!(self.process.try_wait(), Ok(Some(_)))
    }
}

impl LineChannel for ProcessChannel {
    fn write_line(&mut self, line: &str) -> Result<(), SessionError> {
        if self.has_exited() {
            return Err(SessionError::ProcessTerminated);
        }
        writeln!(self.stdin, "{}", line)
            .and_then(|()| self.stdin.flush())
            .map_err(|e| match e.kind() {
                ErrorKind::BrokenPipe => SessionError::ProcessTerminated,
                _ => SessionError::Io(e),
            })
    }

    fn read_line(&mut self, deadline: Option<&Deadline>) -> Result<String, SessionError> {
        let received = match deadline {
            Some(deadline) => self.lines.recv_timeout(deadline.remaining()),
            None => self.lines.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(Ok(line)) => Ok(line.trim_end().to_string()),
            Ok(Err(e)) if e.kind() == ErrorKind::BrokenPipe => Err(SessionError::ProcessTerminated),
            Ok(Err(e)) => Err(SessionError::Io(e)),
            Err(RecvTimeoutError::Timeout) => Err(SessionError::ProtocolTimeout(
                deadline.map(Deadline::budget).unwrap_or_default(),
            )),
            Err(RecvTimeoutError::Disconnected) => Err(SessionError::ProcessTerminated),
        }
    }
}

impl Drop for ProcessChannel {
    fn drop(&mut self) {
        let _ = writeln!(self.stdin, "quit");
        let _ = self.stdin.flush();
        let _ = self.process.kill();
        let _ = self.process.wait();
        tracing::debug!(path = %self.path.display(), "engine process released");
    }
}
