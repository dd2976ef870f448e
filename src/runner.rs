//! Supervised subprocess execution with fixed-interval retry
//!
//! External tools are launched from a [`CommandSpec`] (an argument vector, never a
//! shell string). Every line the process writes to stdout or stderr is forwarded
//! to an [`OutputSink`] as soon as it arrives. A non-zero exit status or a launch
//! failure is retried after a fixed cool-down until the attempt budget runs out.
//!
//! # Example
//!
//! ```no_run
//! use panelpress::runner::{CommandRunner, CommandSpec, OutputSink};
//! use std::time::Duration;
//!
//! struct Stdout;
//!
//! impl OutputSink for Stdout {
//!     fn log(&self, line: &str) {
//!         println!("{line}");
//!     }
//!     fn warning(&self, message: &str) {
//!         eprintln!("{message}");
//!     }
//! }
//!
//! # async fn example() {
//! let runner = CommandRunner::new(3, Duration::from_secs(5));
//! let spec = CommandSpec::new("converter", "kcc-c2e").arg("-p").arg("KPW5").arg("/scratch/vol1");
//! let outcome = runner.run(&spec, &Stdout).await;
//! if !outcome.succeeded {
//!     eprintln!("gave up after {} attempts", outcome.attempts);
//! }
//! # }
//! ```

use crate::config::RetryConfig;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

/// Receiver of subprocess output and supervision notices
pub trait OutputSink: Send + Sync {
    /// A single line of subprocess output (stdout or stderr), without the newline
    fn log(&self, line: &str);

    /// A supervision notice: failed attempt, exhausted retries
    fn warning(&self, message: &str);
}

/// An external program invocation as a structured argument vector
#[derive(Clone, Debug)]
pub struct CommandSpec {
    label: String,
    program: PathBuf,
    args: Vec<OsString>,
    fresh_dir: Option<PathBuf>,
}

impl CommandSpec {
    /// Create a spec for `program`; `label` names the tool in log lines
    pub fn new(label: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            program: program.into(),
            args: Vec::new(),
            fresh_dir: None,
        }
    }

    /// Directory emptied before every attempt
    ///
    /// Anything a failed attempt left there is gone when the next one starts.
    pub fn fresh_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fresh_dir = Some(dir.into());
        self
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Tool label used in log lines
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Program to execute
    pub fn program(&self) -> &PathBuf {
        &self.program
    }

    /// Arguments, in order
    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    /// Directory reset before each attempt, if any
    pub fn output_dir(&self) -> Option<&Path> {
        self.fresh_dir.as_deref()
    }

    /// Human-readable rendering for logs (not for execution)
    pub fn display(&self) -> String {
        let mut rendered = self.program.display().to_string();
        for arg in &self.args {
            rendered.push(' ');
            rendered.push_str(&arg.to_string_lossy());
        }
        rendered
    }
}

/// Result of a supervised run
#[must_use]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunOutcome {
    /// Whether some attempt exited with status zero
    pub succeeded: bool,
    /// Number of attempts made
    pub attempts: u32,
}

/// Executes external processes, retrying failures after a fixed cool-down
#[derive(Clone, Debug)]
pub struct CommandRunner {
    max_attempts: u32,
    cooldown: Duration,
}

impl CommandRunner {
    /// Create a runner; `max_attempts` counts the first attempt (minimum 1)
    pub fn new(max_attempts: u32, cooldown: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            cooldown,
        }
    }

    /// Create a runner from the retry configuration
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, config.cooldown)
    }

    /// Maximum attempts per invocation
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `spec` until it exits successfully or the attempt budget is spent
    ///
    /// Output already streamed by a failed attempt stays with the sink. The
    /// runner never returns an error: exhaustion is reported through the sink
    /// and the returned [`RunOutcome`], and the caller decides what it means.
    pub async fn run(&self, spec: &CommandSpec, sink: &dyn OutputSink) -> RunOutcome {
        for attempt in 1..=self.max_attempts {
            tracing::debug!(
                tool = spec.label(),
                attempt,
                command = %spec.display(),
                "launching external process"
            );

            let reason = match reset_output_dir(spec).await {
                Err(e) => format!("cannot reset output directory: {}", e),
                Ok(()) => match run_once(spec, sink).await {
                    Ok(status) if status.success() => {
                        if attempt > 1 {
                            tracing::info!(
                                tool = spec.label(),
                                attempts = attempt,
                                "succeeded after retry"
                            );
                        }
                        return RunOutcome {
                            succeeded: true,
                            attempts: attempt,
                        };
                    }
                    Ok(status) => format!("{}", status),
                    Err(e) => format!("failed to launch {}: {}", spec.program().display(), e),
                },
            };

            if attempt < self.max_attempts {
                let message = format!(
                    "{} attempt {}/{} failed ({}), retrying in {}s",
                    spec.label(),
                    attempt,
                    self.max_attempts,
                    reason,
                    self.cooldown.as_secs()
                );
                tracing::warn!(
                    tool = spec.label(),
                    attempt,
                    reason = %reason,
                    "external process failed, retrying"
                );
                sink.warning(&message);
                tokio::time::sleep(self.cooldown).await;
            } else {
                tracing::error!(
                    tool = spec.label(),
                    attempts = attempt,
                    reason = %reason,
                    "external process failed, retries exhausted"
                );
            }
        }

        sink.warning(&format!(
            "{} failed after {} attempts",
            spec.label(),
            self.max_attempts
        ));
        RunOutcome {
            succeeded: false,
            attempts: self.max_attempts,
        }
    }
}

async fn reset_output_dir(spec: &CommandSpec) -> std::io::Result<()> {
    let Some(dir) = spec.output_dir() else {
        return Ok(());
    };
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    tokio::fs::create_dir_all(dir).await
}

/// Spawn the process once, forward its output line by line, and wait for exit
async fn run_once(spec: &CommandSpec, sink: &dyn OutputSink) -> std::io::Result<ExitStatus> {
    let mut child = Command::new(spec.program())
        .args(spec.arguments())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(tokio::spawn(forward_lines(stdout, tx.clone())));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(tokio::spawn(forward_lines(stderr, tx.clone())));
    }
    // Channel closes once both readers hit EOF
    drop(tx);

    while let Some(line) = rx.recv().await {
        sink.log(&line);
    }

    for reader in readers {
        if let Err(e) = reader.await {
            tracing::warn!(tool = spec.label(), error = %e, "output reader task failed");
        }
    }

    child.wait().await
}

async fn forward_lines<R>(stream: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']);
                if tx.send(line.to_string()).is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "stopped reading process output");
                break;
            }
        }
    }
}
