//! Concurrent line capture over process output streams
//!
//! A [`LineLog`] owns the read end of one (or, for merged capture, two)
//! output streams. A background reader per stream decodes lines, stamps
//! them, and appends them to a shared buffer; foreground callers snapshot,
//! drain, or poll that buffer.

use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, trace};

use crate::config::WaitOptions;
use crate::error::{ProcessError, Result};
use crate::line::TimestampedLine;

/// State shared between reader tasks and foreground callers.
///
/// Every mutation of `lines` or `eof` happens under the owning mutex, and
/// the lock is never held across I/O or a sleep. `eof` flips false→true
/// exactly once, when the last attached stream ends.
#[derive(Debug)]
struct LogState {
    lines: Vec<TimestampedLine>,
    open_streams: usize,
    eof: bool,
}

/// Timestamped, arrival-ordered capture of one logical output stream.
#[derive(Debug)]
pub struct LineLog {
    state: Arc<Mutex<LogState>>,
    echo: bool,
    readers: Vec<JoinHandle<()>>,
}

impl LineLog {
    fn new(echo: bool, prefill: Vec<TimestampedLine>, open_streams: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(LogState {
                lines: prefill,
                open_streams,
                eof: false,
            })),
            echo,
            readers: Vec::new(),
        }
    }

    /// Start capturing `stream` into a fresh log.
    ///
    /// `prefill` seeds the buffer with lines observed before this log
    /// existed. The background reader starts immediately.
    pub fn capture<R>(stream: R, echo: bool, prefill: Vec<TimestampedLine>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let mut log = Self::new(echo, prefill, 1);
        log.spawn_reader(stream);
        log
    }

    /// Start capturing two streams into one shared buffer (merged mode).
    ///
    /// Lines land in arrival order across both streams. End-of-stream is
    /// only reported once both streams have ended.
    pub(crate) fn capture_merged<A, B>(
        out: A,
        err: B,
        echo: bool,
        prefill: Vec<TimestampedLine>,
    ) -> Self
    where
        A: AsyncRead + Unpin + Send + 'static,
        B: AsyncRead + Unpin + Send + 'static,
    {
        let mut log = Self::new(echo, prefill, 2);
        log.spawn_reader(out);
        log.spawn_reader(err);
        log
    }

    fn spawn_reader<R>(&mut self, stream: R)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        self.readers
            .push(tokio::spawn(Self::pump(stream, self.state.clone(), self.echo)));
    }

    /// Reader task: one line at a time until end-of-stream.
    ///
    /// Read errors are treated as end-of-stream and never propagated;
    /// partial output is still useful, and the caller's own waits and
    /// timeouts are the place to detect a dead process.
    async fn pump<R>(stream: R, state: Arc<Mutex<LogState>>, echo: bool)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let mut reader = BufReader::new(stream);
        loop {
            let mut buf = String::new();
            match reader.read_line(&mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = TimestampedLine::new(buf);
                    if echo {
                        // echo precedes the append but is not atomic with it
                        let mut stdout = std::io::stdout();
                        let _ = stdout.write_all(line.text().as_bytes());
                        let _ = stdout.flush();
                    }
                    state.lock().await.lines.push(line);
                }
                Err(error) => {
                    debug!(%error, "read failed, treating as end of stream");
                    break;
                }
            }
        }

        let mut state = state.lock().await;
        state.open_streams -= 1;
        if state.open_streams == 0 {
            state.eof = true;
            trace!(lines = state.lines.len(), "capture complete");
        }
    }

    /// Copy of the buffered lines, in arrival order. Does not modify the
    /// buffer; safe to call while the reader is still running.
    pub async fn snapshot(&self) -> Vec<TimestampedLine> {
        self.state.lock().await.lines.clone()
    }

    /// Atomically return the buffered lines and clear the buffer.
    ///
    /// No line is ever returned by two drains; drains plus a final
    /// snapshot partition the stream with no duplicates and no gaps.
    pub async fn drain(&self) -> Vec<TimestampedLine> {
        std::mem::take(&mut self.state.lock().await.lines)
    }

    /// Concatenation of the buffered line texts.
    pub async fn contents(&self) -> String {
        self.state
            .lock()
            .await
            .lines
            .iter()
            .map(TimestampedLine::text)
            .collect()
    }

    /// Whether every attached stream has ended.
    pub async fn is_eof(&self) -> bool {
        self.state.lock().await.eof
    }

    /// Block until every reader task has finished. Idempotent: a second
    /// call returns immediately.
    pub async fn wait_for_completion(&mut self) {
        for handle in self.readers.drain(..) {
            // readers neither panic nor get aborted, so a join error here
            // carries nothing actionable
            let _ = handle.await;
        }
    }

    /// Block until a buffered line matches `pattern`.
    ///
    /// Each tick checks for a match first and returns immediately on one,
    /// then sleeps one poll interval, then fails on timeout, then fails on
    /// end-of-stream — in that order. The EOF branch re-runs the match
    /// check so a line that arrived exactly at stream close still wins.
    pub async fn wait_for_pattern(&self, pattern: &Regex, opts: &WaitOptions) -> Result<()> {
        let started = Instant::now();
        loop {
            if self.any_match(pattern).await {
                return Ok(());
            }

            sleep(opts.poll_interval).await;

            if started.elapsed() > opts.timeout {
                return Err(ProcessError::PatternTimeout {
                    pattern: pattern.to_string(),
                    timeout: opts.timeout,
                });
            }

            if self.is_eof().await && !self.any_match(pattern).await {
                return Err(ProcessError::UnexpectedEof {
                    pattern: pattern.to_string(),
                });
            }
        }
    }

    async fn any_match(&self, pattern: &Regex) -> bool {
        self.state
            .lock()
            .await
            .lines
            .iter()
            .any(|line| line.is_match(pattern))
    }
}
