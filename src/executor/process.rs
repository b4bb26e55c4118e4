//! muninlite process spawning and batch execution.
//!
//! Each batch runs in a fresh child: the commands are written to stdin, stdin
//! is closed, and the whole output stream is read before the exit status is
//! collected. stdout and stderr share one pipe, so diagnostics land in the
//! transcript at the point the node wrote them. The run is bounded by a timeout and can be cancelled through a
//! [`CancellationToken`]; dropping the future kills the child.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use os_pipe::PipeReader;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use super::ExecutionError;
use crate::protocol::{encode_commands, split_responses};

/// Default location of the muninlite binary.
pub const DEFAULT_BINARY_PATH: &str = "/tmp/muninlite";

/// Default upper bound for one batch.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Time between SIGTERM and SIGKILL when a child has to be stopped.
const TERMINATE_GRACE: Duration = Duration::from_secs(2);

/// Runs batches of protocol commands and returns one response per command.
#[async_trait]
pub trait ProtocolExecutor: Send + Sync {
    /// Execute the commands in order.
    ///
    /// The returned vector has exactly one entry per command, in the same
    /// order.
    async fn execute(&self, commands: &[String]) -> Result<Vec<String>, ExecutionError>;
}

/// Executes commands by spawning the muninlite binary once per batch.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    binary: PathBuf,
    args: Vec<String>,
    timeout: Duration,
    cancel: CancellationToken,
}

impl ProcessExecutor {
    /// Create an executor for the given binary.
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            cancel: CancellationToken::new(),
        }
    }

    /// Pass extra arguments to the binary.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the upper bound for one batch.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Abort running batches when the token is cancelled.
    #[must_use]
    pub fn cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Path of the binary.
    #[must_use]
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Run one batch and return the raw transcript of stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError` if the binary is missing, any I/O fails, the
    /// child exits unsuccessfully, times out or is cancelled.
    pub async fn transcript(&self, commands: &[String]) -> Result<String, ExecutionError> {
        if !tokio::fs::try_exists(&self.binary).await? {
            return Err(ExecutionError::ResourceMissing(self.binary.clone()));
        }

        // The command holds the only parent copies of the write end and is
        // dropped right after spawning, so the reader sees EOF once the child
        // exits.
        let (reader, writer) = os_pipe::pipe()?;
        let mut child = Command::new(&self.binary)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(writer.try_clone()?)
            .stderr(writer)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecutionError::from_spawn(&self.binary, e))?;

        tracing::debug!(
            binary = %self.binary.display(),
            pid = ?child.id(),
            commands = commands.len(),
            "Spawned munin process"
        );

        let payload = encode_commands(commands);
        let outcome = tokio::select! {
            result = tokio::time::timeout(self.timeout, exchange(&mut child, reader, payload)) => {
                match result {
                    Ok(result) => Outcome::Finished(result),
                    Err(_) => Outcome::TimedOut,
                }
            }
            () = self.cancel.cancelled() => Outcome::Cancelled,
        };

        match outcome {
            Outcome::Finished(result) => check_exit(result?),
            Outcome::TimedOut => {
                tracing::warn!(timeout = ?self.timeout, "munin process timed out, terminating");
                Err(abort(&mut child, ExecutionError::Timeout(self.timeout)).await)
            }
            Outcome::Cancelled => {
                tracing::warn!("munin process cancelled, terminating");
                Err(abort(&mut child, ExecutionError::Cancelled).await)
            }
        }
    }
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_BINARY_PATH)
    }
}

#[async_trait]
impl ProtocolExecutor for ProcessExecutor {
    async fn execute(&self, commands: &[String]) -> Result<Vec<String>, ExecutionError> {
        let transcript = self.transcript(commands).await?;
        Ok(split_responses(&transcript, commands))
    }
}

enum Outcome {
    Finished(Result<Exchange, ExecutionError>),
    TimedOut,
    Cancelled,
}

/// Everything a finished child produced.
struct Exchange {
    status: ExitStatus,
    output: String,
}

/// Write the payload, drain the shared output pipe and wait for the exit
/// status.
async fn exchange(
    child: &mut Child,
    reader: PipeReader,
    payload: Vec<u8>,
) -> Result<Exchange, ExecutionError> {
    let mut stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;

    let write = async move {
        stdin.write_all(&payload).await?;
        stdin.shutdown().await
    };

    let (written, output) = tokio::join!(write, read_output(reader));
    let status = child.wait().await?;
    let exchange = Exchange {
        status,
        output: String::from_utf8_lossy(&output?).into_owned(),
    };

    // A child may exit without reading all of its input; judge it by its exit
    // status and output instead.
    if let Err(e) = written {
        if e.kind() != std::io::ErrorKind::BrokenPipe && exchange.status.success() {
            return Err(e.into());
        }
        tracing::debug!(error = %e, "Write to munin failed before it exited");
    }

    Ok(exchange)
}

#[cfg(unix)]
async fn read_output(reader: PipeReader) -> std::io::Result<Vec<u8>> {
    use std::os::fd::OwnedFd;
    use tokio::io::AsyncReadExt;
    use tokio::net::unix::pipe;

    let mut receiver = pipe::Receiver::from_file(std::fs::File::from(OwnedFd::from(reader)))?;
    let mut buf = Vec::new();
    receiver.read_to_end(&mut buf).await?;
    Ok(buf)
}

#[cfg(not(unix))]
async fn read_output(mut reader: PipeReader) -> std::io::Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || {
        let mut buf = Vec::new();
        std::io::Read::read_to_end(&mut reader, &mut buf).map(|_| buf)
    })
    .await
    .map_err(std::io::Error::other)?
}

fn check_exit(exchange: Exchange) -> Result<String, ExecutionError> {
    if exchange.status.success() {
        return Ok(exchange.output);
    }

    tracing::error!(status = %exchange.status, "Exit value from munin is not zero");
    tracing::info!(output = %exchange.output, "munin output");
    Err(ExecutionError::NonZeroExit {
        status: exchange.status,
        output: exchange.output,
    })
}

fn missing_pipe(name: &str) -> ExecutionError {
    ExecutionError::IoFailure(std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        format!("munin {name} not available"),
    ))
}

/// Stop an unfinished child and hand back the error that ended the run.
///
/// A failure while stopping is logged; the original error is what callers
/// see.
async fn abort(child: &mut Child, error: ExecutionError) -> ExecutionError {
    if let Err(e) = terminate(child, TERMINATE_GRACE).await {
        tracing::warn!(error = %e, pid = ?child.id(), "Failed to terminate munin process");
    }
    error
}

/// Stop a child: SIGTERM first, SIGKILL once the grace period has passed.
async fn terminate(child: &mut Child, grace: Duration) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = child.id() else {
            // Already reaped.
            return Ok(());
        };
        let nix_pid = Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
        let _ = kill(nix_pid, Signal::SIGTERM);

        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(_) => child.kill().await,
        }
    }

    #[cfg(not(unix))]
    {
        let _ = grace;
        child.kill().await
    }
}
