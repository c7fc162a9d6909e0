//! External reload execution.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use regex::Regex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, error, info};

use crate::error::{ReloadError, Result};

/// Default reload script, relative to the working directory.
pub const DEFAULT_SCRIPT: &str = "console_cmd.sh";

/// Default time limit for one reload.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Status lines worth reporting end in one of these markers.
const STATUS_LINE_PATTERN: &str = r"(?i)\[(failed|succeed)\]$";

/// Result of running a reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    /// Whether the reload as a whole succeeded.
    pub success: bool,

    /// Status lines, in output order.
    pub lines: Vec<String>,
}

impl ExecutionReport {
    pub fn succeeded(lines: Vec<String>) -> Self {
        Self {
            success: true,
            lines,
        }
    }

    pub fn failed(lines: Vec<String>) -> Self {
        Self {
            success: false,
            lines,
        }
    }
}

/// Runs a reload for a target expression such as `*.*.[13].*`.
#[async_trait]
pub trait ReloadExecutor: Send + Sync {
    async fn execute(&self, target: &str) -> ExecutionReport;
}

/// Runs `sh <script> "reload <target>"` and scrapes its status lines.
///
/// Stdout and stderr are read together under one deadline. Every line is
/// logged; only lines ending in `[failed]` or `[succeed]` are reported. A
/// spawn failure, a non-zero exit or a timeout fails the reload, keeping
/// whatever lines were read.
pub struct ConsoleReloadExecutor {
    working_dir: PathBuf,
    script: String,
    timeout: Duration,
    status_line: Regex,
}

impl ConsoleReloadExecutor {
    pub fn new(working_dir: impl Into<PathBuf>) -> Result<Self> {
        let status_line = Regex::new(STATUS_LINE_PATTERN)
            .map_err(|e| ReloadError::InvalidPattern(e.to_string()))?;
        Ok(Self {
            working_dir: working_dir.into(),
            script: DEFAULT_SCRIPT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            status_line,
        })
    }

    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = script.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn working_dir(&self) -> &PathBuf {
        &self.working_dir
    }

    /// Read both streams together until both reach EOF, keeping status lines.
    ///
    /// When both have a line ready, stdout goes first.
    async fn scrape<O, E>(&self, stdout: Option<O>, stderr: Option<E>, lines: &mut Vec<String>)
    where
        O: AsyncRead + Unpin,
        E: AsyncRead + Unpin,
    {
        let mut stdout = stdout.map(|s| BufReader::new(s).lines());
        let mut stderr = stderr.map(|s| BufReader::new(s).lines());

        while stdout.is_some() || stderr.is_some() {
            let (read, from_stdout) = tokio::select! {
                biased;
                read = next_line(stdout.as_mut()), if stdout.is_some() => (read, true),
                read = next_line(stderr.as_mut()), if stderr.is_some() => (read, false),
            };

            let line = read.unwrap_or_else(|e| {
                debug!(error = %e, "Reload output stream closed with error");
                None
            });
            let Some(line) = line else {
                if from_stdout {
                    stdout = None;
                } else {
                    stderr = None;
                }
                continue;
            };

            info!(target: "hotstage_reload::console", "{}", line);
            let line = line.trim();
            if self.status_line.is_match(line) {
                lines.push(line.to_string());
            }
        }
    }
}

async fn next_line<R>(lines: Option<&mut Lines<R>>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    match lines {
        Some(lines) => lines.next_line().await,
        None => Ok(None),
    }
}

#[async_trait]
impl ReloadExecutor for ConsoleReloadExecutor {
    async fn execute(&self, target: &str) -> ExecutionReport {
        let argument = format!("reload {}", target);
        info!(
            script = %self.script,
            dir = %self.working_dir.display(),
            target = %target,
            "Running reload"
        );

        let mut cmd = Command::new("sh");
        cmd.arg(&self.script)
            .arg(&argument)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                error!(error = %e, "Failed to start reload command");
                return ExecutionReport::failed(vec![format!("Start command failed for {}", e)]);
            }
        };

        let deadline = Instant::now() + self.timeout;
        let mut lines = Vec::new();

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let in_time = timeout(self.timeout, self.scrape(stdout, stderr, &mut lines))
            .await
            .is_ok();

        if !in_time {
            let _ = child.kill().await;
            error!(timeout_secs = self.timeout.as_secs(), "Reload command timed out");
            return ExecutionReport::failed(lines);
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        match timeout(remaining, child.wait()).await {
            Ok(Ok(status)) if status.success() => {
                info!(lines = lines.len(), "Reload finished");
                ExecutionReport::succeeded(lines)
            }
            Ok(Ok(status)) => {
                error!(%status, "Reload command failed");
                ExecutionReport::failed(lines)
            }
            Ok(Err(e)) => {
                error!(error = %e, "Failed to wait for reload command");
                ExecutionReport::failed(lines)
            }
            Err(_) => {
                let _ = child.kill().await;
                error!(timeout_secs = self.timeout.as_secs(), "Reload command timed out");
                ExecutionReport::failed(lines)
            }
        }
    }
}
