//! Session and pattern-wait configuration

use std::collections::HashMap;
use std::time::Duration;

use regex::Regex;

use crate::error::{ProcessError, Result};

const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Configuration for a [`ProcessSession`](crate::ProcessSession)
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Executable to launch
    pub command: String,
    /// Command arguments
    pub args: Vec<String>,
    /// Environment variables (added to the parent env)
    pub env: HashMap<String, String>,
    /// Echo every captured line to this process's stdout as well
    pub echo_lines: bool,
    /// Capture stderr into its own log instead of merging it into stdout
    pub capture_stderr: bool,
    /// How often pattern waits re-examine the buffer
    pub poll_interval: Duration,
    /// Pattern `start` blocks on before returning (stdout log)
    pub wait_for: Option<Regex>,
    /// Timeout for the startup pattern wait (default 30s)
    pub wait_timeout: Option<Duration>,
}

impl SessionConfig {
    /// Create a configuration for `command` with no arguments.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: vec![],
            env: HashMap::new(),
            echo_lines: false,
            capture_stderr: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
            wait_for: None,
            wait_timeout: None,
        }
    }

    /// Build a configuration from an argv-style slice: first element is the
    /// executable, the rest are its arguments.
    pub fn from_argv<S: AsRef<str>>(argv: &[S]) -> Result<Self> {
        let (command, args) = argv
            .split_first()
            .ok_or_else(|| ProcessError::InvalidConfig("empty command line".to_string()))?;
        Ok(Self::new(command.as_ref()).args(args.iter().map(|a| a.as_ref().to_string())))
    }

    /// Set command arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Add an environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Echo captured lines to stdout while buffering them
    pub fn echo_lines(mut self, echo: bool) -> Self {
        self.echo_lines = echo;
        self
    }

    /// Capture stderr separately instead of merging it into the stdout log
    pub fn capture_stderr(mut self, capture: bool) -> Self {
        self.capture_stderr = capture;
        self
    }

    /// Set the buffer poll interval for pattern waits
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Block `start` until a stdout line matches `pattern`
    pub fn wait_for(mut self, pattern: Regex) -> Self {
        self.wait_for = Some(pattern);
        self
    }

    /// Timeout for the startup pattern wait
    pub fn wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }
}

/// Options for a single pattern wait
#[derive(Debug, Clone)]
pub struct WaitOptions {
    /// Give up after this long without a match (default 30s)
    pub timeout: Duration,
    /// How often to re-examine the buffer (default 250ms)
    pub poll_interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_WAIT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl WaitOptions {
    /// Set the wait timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the wait timeout in whole seconds
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// Set the buffer poll interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}
