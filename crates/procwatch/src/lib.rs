//! # procwatch
//!
//! **Purpose**: spawn a child process and assert on its incremental output
//!
//! Captures a child's stdout and stderr as timestamped, line-delimited
//! records while the process runs, and lets a caller block until a line
//! matching a pattern appears, the process exits, or a timeout elapses.
//! Aimed at test harnesses and orchestration scripts that need "wait until
//! the server prints 'listening'" rather than only a final exit code.
//!
//! ## Features
//!
//! - **Line Capture**: one background reader per stream decodes output into
//!   arrival-ordered, timestamped lines behind a mutex
//! - **Pattern Waits**: poll a captured buffer for a regex match with
//!   timeout and end-of-stream detection
//! - **Snapshot & Drain**: copy a buffer, or atomically read-and-clear it
//! - **Merged Capture**: stderr interleaved into the stdout log by default,
//!   or captured separately on request
//! - **Lifecycle**: pid tracking, signal delivery, exit-status decoding
//!
//! ## Usage
//!
//! ```rust,no_run
//! use procwatch::{ProcessSession, SessionConfig};
//! use regex::Regex;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SessionConfig::new("my-server")
//!     .args(["--port", "8080"])
//!     .wait_for(Regex::new("listening")?);
//!
//! let mut session = ProcessSession::new(config);
//! session.start().await?; // returns once "listening" is printed
//!
//! // ... drive the server ...
//!
//! session.kill()?;
//! session.wait_for_exit().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod line;
pub mod log;
pub mod session;

pub use config::{SessionConfig, WaitOptions};
pub use error::{ProcessError, Result};
pub use line::TimestampedLine;
pub use log::LineLog;
pub use session::{ProcessSession, StreamKind};
