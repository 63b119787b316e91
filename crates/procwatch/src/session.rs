//! Caller-facing process session
//!
//! A [`ProcessSession`] bundles a child process with the timestamped
//! capture of its output: start it (optionally blocking on a startup
//! pattern), read or drain its logs while it runs, signal it, and reap it.

use std::fmt;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::str::FromStr;

use regex::Regex;
use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::config::{SessionConfig, WaitOptions};
use crate::error::{ProcessError, Result};
use crate::line::TimestampedLine;
use crate::log::LineLog;

#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Which captured stream an operation targets.
///
/// The typed enum is the API surface; `FromStr` (accepting `out`/`stdout`
/// and `err`/`stderr`) exists for harnesses that name streams dynamically
/// and surfaces [`ProcessError::UnknownStream`] for anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// The child's stdout (plus stderr, under merged capture)
    Out,
    /// The child's stderr, when captured separately
    Err,
}

impl FromStr for StreamKind {
    type Err = ProcessError;

    fn from_str(s: &str) -> std::result::Result<Self, ProcessError> {
        match s {
            "out" | "stdout" => Ok(StreamKind::Out),
            "err" | "stderr" => Ok(StreamKind::Err),
            other => Err(ProcessError::UnknownStream(other.to_string())),
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Out => f.write_str("out"),
            StreamKind::Err => f.write_str("err"),
        }
    }
}

/// A child process plus the timestamped capture of its output.
///
/// `pid` is set by [`start`](Self::start) and cleared by
/// [`wait_for_exit`](Self::wait_for_exit); a cleared pid is the
/// authoritative sign that the session has been reaped and must not be
/// waited on or signalled again.
#[derive(Debug)]
pub struct ProcessSession {
    config: SessionConfig,
    child: Option<Child>,
    pid: Option<u32>,
    exit_status: Option<ExitStatus>,
    out_log: Option<LineLog>,
    err_log: Option<LineLog>,
}

impl ProcessSession {
    /// Create a session from `config`. Nothing runs until `start`.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            child: None,
            pid: None,
            exit_status: None,
            out_log: None,
            err_log: None,
        }
    }

    /// Spawn the configured command and begin capturing its output.
    ///
    /// stdout is always captured; stderr joins the stdout log unless
    /// `capture_stderr` asked for a separate one. When `wait_for` is
    /// configured this blocks until a stdout-log line matches; on a wait
    /// timeout or EOF the error propagates and the process is left running,
    /// with the session still holding its pid and logs.
    pub async fn start(&mut self) -> Result<()> {
        if self.pid.is_some() || self.child.is_some() {
            return Err(ProcessError::AlreadyStarted);
        }

        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args);
        for (key, value) in &self.config.env {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn()?;
        let pid = child
            .id()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "spawned child has no pid"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "child stdout was not piped"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "child stderr was not piped"))?;

        let echo = self.config.echo_lines;
        let (out_log, err_log) = if self.config.capture_stderr {
            (
                LineLog::capture(stdout, echo, Vec::new()),
                Some(LineLog::capture(stderr, echo, Vec::new())),
            )
        } else {
            (LineLog::capture_merged(stdout, stderr, echo, Vec::new()), None)
        };

        info!(pid, command = %self.config.command, "process started");

        self.child = Some(child);
        self.pid = Some(pid);
        self.out_log = Some(out_log);
        self.err_log = err_log;

        if let Some(pattern) = self.config.wait_for.clone() {
            let mut opts = WaitOptions::default().poll_interval(self.config.poll_interval);
            if let Some(timeout) = self.config.wait_timeout {
                opts = opts.timeout(timeout);
            }
            self.wait_for_output(StreamKind::Out, &pattern, &opts).await?;
        }

        Ok(())
    }

    /// Reap the process once all of its output has been observed.
    ///
    /// Joins every log reader first, so lines racing the kernel-level exit
    /// are never lost, then waits on the child and records the raw exit
    /// status. Returns `true` iff the exit code was exactly 0; any other
    /// code, and death by signal, return `false`.
    pub async fn wait_for_exit(&mut self) -> Result<bool> {
        if self.pid.is_none() {
            return Err(ProcessError::NotRunning);
        }
        if let Some(log) = self.out_log.as_mut() {
            log.wait_for_completion().await;
        }
        if let Some(log) = self.err_log.as_mut() {
            log.wait_for_completion().await;
        }

        let mut child = self.child.take().ok_or(ProcessError::NotRunning)?;
        let status = child.wait().await?;
        debug!(pid = ?self.pid, ?status, "process reaped");

        self.exit_status = Some(status);
        self.pid = None;
        Ok(status.success())
    }

    /// Send SIGTERM to the live process.
    #[cfg(unix)]
    pub fn kill(&mut self) -> Result<()> {
        self.signal(Signal::SIGTERM)
    }

    /// Send `signal` to the live process.
    ///
    /// Delivery does not unblock an in-progress pattern wait; the wait
    /// surfaces its own EOF failure once the pipe closes.
    #[cfg(unix)]
    pub fn signal(&mut self, signal: Signal) -> Result<()> {
        let pid = self.pid.ok_or(ProcessError::NotRunning)?;
        signal::kill(Pid::from_raw(pid as i32), signal)
            .map_err(|source| ProcessError::Signal { pid, source })?;
        debug!(pid, signal = %signal, "signal sent");
        Ok(())
    }

    /// Terminate the live process.
    #[cfg(windows)]
    pub fn kill(&mut self) -> Result<()> {
        if self.pid.is_none() {
            return Err(ProcessError::NotRunning);
        }
        let child = self.child.as_mut().ok_or(ProcessError::NotRunning)?;
        child.start_kill()?;
        Ok(())
    }

    /// Snapshot of the named stream's buffered lines, in arrival order.
    ///
    /// Asking for `Err` under merged capture yields an empty Vec rather
    /// than an error; so does any stream on a never-started session.
    pub async fn log(&self, which: StreamKind) -> Vec<TimestampedLine> {
        match self.line_log(which) {
            Some(log) => log.snapshot().await,
            None => Vec::new(),
        }
    }

    /// Drain the named stream's buffer: return the lines and clear them.
    ///
    /// Lines handed out here never reappear in later drains or snapshots.
    pub async fn drain(&self, which: StreamKind) -> Vec<TimestampedLine> {
        match self.line_log(which) {
            Some(log) => log.drain().await,
            None => Vec::new(),
        }
    }

    /// Block until a line of the named stream matches `pattern`.
    ///
    /// `Err` under merged capture fails with
    /// [`ProcessError::UnexpectedEof`] — that log can never match on its
    /// own. A never-started session fails with
    /// [`ProcessError::NotRunning`].
    pub async fn wait_for_output(
        &self,
        which: StreamKind,
        pattern: &Regex,
        opts: &WaitOptions,
    ) -> Result<()> {
        match which {
            StreamKind::Out => match &self.out_log {
                Some(log) => log.wait_for_pattern(pattern, opts).await,
                None => Err(ProcessError::NotRunning),
            },
            StreamKind::Err => match &self.err_log {
                Some(log) => log.wait_for_pattern(pattern, opts).await,
                None if self.out_log.is_some() => Err(ProcessError::UnexpectedEof {
                    pattern: pattern.to_string(),
                }),
                None => Err(ProcessError::NotRunning),
            },
        }
    }

    /// Pid of the live process; `None` before `start` and after
    /// `wait_for_exit`.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Raw exit status recorded by `wait_for_exit`. Exit codes and
    /// terminating signals are both decodable from it.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    /// Whether the child is still running (non-blocking).
    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    fn line_log(&self, which: StreamKind) -> Option<&LineLog> {
        match which {
            StreamKind::Out => self.out_log.as_ref(),
            StreamKind::Err => self.err_log.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_kind_from_str() {
        assert_eq!("out".parse::<StreamKind>().unwrap(), StreamKind::Out);
        assert_eq!("stdout".parse::<StreamKind>().unwrap(), StreamKind::Out);
        assert_eq!("err".parse::<StreamKind>().unwrap(), StreamKind::Err);
        assert_eq!("stderr".parse::<StreamKind>().unwrap(), StreamKind::Err);
        assert!(matches!(
            "bogus".parse::<StreamKind>(),
            Err(ProcessError::UnknownStream(name)) if name == "bogus"
        ));
    }

    #[tokio::test]
    async fn test_not_started_session() {
        let mut session = ProcessSession::new(SessionConfig::new("true"));
        assert!(session.pid().is_none());
        assert!(!session.is_running());
        assert!(session.log(StreamKind::Out).await.is_empty());
        assert!(matches!(session.kill(), Err(ProcessError::NotRunning)));
        assert!(matches!(
            session.wait_for_exit().await,
            Err(ProcessError::NotRunning)
        ));
    }

    #[tokio::test]
    async fn test_double_start_is_rejected() {
        let mut session = ProcessSession::new(SessionConfig::new("sleep").args(["1"]));
        session.start().await.unwrap();
        assert!(matches!(
            session.start().await,
            Err(ProcessError::AlreadyStarted)
        ));
        session.kill().unwrap();
        let _ = session.wait_for_exit().await;
    }

    #[tokio::test]
    async fn test_extra_env_reaches_child() {
        let config = SessionConfig::new("sh")
            .args(["-c", "echo $PROCWATCH_PROBE"])
            .env("PROCWATCH_PROBE", "present");
        let mut session = ProcessSession::new(config);
        session.start().await.unwrap();
        assert!(session.wait_for_exit().await.unwrap());

        let out = session.log(StreamKind::Out).await;
        assert_eq!(out[0].text(), "present\n");
    }

    #[tokio::test]
    async fn test_reaped_session_rejects_further_lifecycle_calls() {
        let mut session = ProcessSession::new(SessionConfig::new("true"));
        session.start().await.unwrap();
        assert!(session.wait_for_exit().await.unwrap());
        assert!(session.pid().is_none());
        assert!(matches!(session.kill(), Err(ProcessError::NotRunning)));
        assert!(matches!(
            session.wait_for_exit().await,
            Err(ProcessError::NotRunning)
        ));
    }
}
