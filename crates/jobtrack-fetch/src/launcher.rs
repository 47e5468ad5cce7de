//! Supervised execution of an external task.
//!
//! A task runs under a wall-clock limit. When the limit expires the task's
//! process group receives `SIGTERM`; if it is still alive after the grace
//! period it receives `SIGKILL`:
//!
//! ```text
//! Running ──(run timeout)──→ Terminating(Graceful) ──(grace)──→ Terminating(Forced)
//!    │                              │                                  │
//!    └──────────────────────────────┴──────────── exit ────────────────┴──→ Exited
//! ```
//!
//! Whatever state the task exits from, its exit reason is recorded. Any run
//! that needed escalation is reported as [`RunOutcome::TimedOut`], never as a
//! success, even if the task exited cleanly on `SIGTERM`.

use std::fmt;
use std::future::Future;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

use crate::task::TaskCommand;
use crate::{Error, Result};

/// Default wall-clock limit for a task.
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(300);

/// Default wait between the graceful and the forced termination signal.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(1);

/// Environment forced on every task so its output decodes as UTF-8.
const OUTPUT_ENCODING_VAR: (&str, &str) = ("PYTHONIOENCODING", "utf-8");

/// Timing limits applied to a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// How long the task may run before termination starts.
    pub run: Duration,
    /// How long a gracefully-signalled task gets before it is killed.
    pub grace: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            run: DEFAULT_RUN_TIMEOUT,
            grace: DEFAULT_GRACE_PERIOD,
        }
    }
}

/// Termination stage reached by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// `SIGTERM` was sent.
    Graceful,
    /// `SIGKILL` was sent.
    Forced,
}

/// Supervision state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Running within its time limit.
    Running,
    /// Time limit expired, termination signal sent.
    Terminating(Termination),
    /// Process has exited and been reaped.
    Exited,
}

/// How the process ended, as reported by the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Normal exit with a status code.
    Code(i32),
    /// Killed by a signal.
    Signal(i32),
    /// Neither a code nor a signal was available.
    Unknown,
}

impl ExitReason {
    fn from_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self::Code(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Self::Signal(signal);
            }
        }
        Self::Unknown
    }

    /// The exit code, if the process exited normally.
    #[must_use]
    pub const fn code(&self) -> Option<i32> {
        match self {
            Self::Code(code) => Some(*code),
            Self::Signal(_) | Self::Unknown => None,
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "exit code {code}"),
            Self::Signal(signal) => write!(f, "signal {signal}"),
            Self::Unknown => write!(f, "unknown exit status"),
        }
    }
}

/// Everything the task wrote, decoded lossily as UTF-8.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawOutput {
    /// Concatenated standard output.
    pub stdout: String,
    /// Concatenated standard error.
    pub stderr: String,
}

/// Classified result of one task run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Exit code 0 without any termination signal.
    Success(RawOutput),
    /// Unsuccessful exit that the supervisor did not cause.
    Failure {
        /// Observed exit reason.
        reason: ExitReason,
        /// Captured output.
        output: RawOutput,
    },
    /// The time limit expired and termination was escalated.
    TimedOut {
        /// Last termination stage reached.
        stage: Termination,
        /// Observed exit reason.
        reason: ExitReason,
        /// Output captured before the task ended.
        output: RawOutput,
    },
}

impl RunOutcome {
    /// Captured output, whatever the outcome.
    #[must_use]
    pub const fn output(&self) -> &RawOutput {
        match self {
            Self::Success(output)
            | Self::Failure { output, .. }
            | Self::TimedOut { output, .. } => output,
        }
    }

    /// Returns true for [`RunOutcome::Success`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Something that runs an external task with per-invocation arguments.
///
/// This is the seam between process management and everything that
/// interprets the task's output.
pub trait TaskRunner: Send + Sync {
    /// Runs the task to completion (or termination).
    fn run(&self, args: &[String]) -> impl Future<Output = Result<RunOutcome>> + Send;
}

/// Spawns tasks and supervises them until they exit.
#[derive(Debug, Clone, Copy, Default)]
pub struct Launcher {
    timeouts: Timeouts,
}

impl Launcher {
    /// Creates a launcher with the given limits.
    #[must_use]
    pub const fn new(timeouts: Timeouts) -> Self {
        Self { timeouts }
    }

    /// Limits applied to every run.
    #[must_use]
    pub const fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// Runs `task` with `args` appended to its leading arguments.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Launch`] if the process cannot be spawned, or
    /// [`Error::Io`] if waiting on or signalling it fails.
    pub async fn run(&self, task: &TaskCommand, args: &[String]) -> Result<RunOutcome> {
        let working_dir = task.resolved_working_dir();
        let mut command = Command::new(task.program());
        command
            .args(task.leading_args())
            .args(args)
            .current_dir(&working_dir)
            .envs(task.envs().iter().map(|(key, value)| (key, value)))
            .env(OUTPUT_ENCODING_VAR.0, OUTPUT_ENCODING_VAR.1)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        // Arguments carry the mailbox secret, so only their count is logged.
        info!(
            program = %task.program().display(),
            args = task.leading_args().len() + args.len(),
            working_dir = %working_dir.display(),
            "Launching task"
        );

        let started = Instant::now();
        let mut child = command.spawn().map_err(|source| Error::Launch {
            program: task.program().to_path_buf(),
            source,
        })?;

        let stdout = child
            .stdout
            .take()
            .map(|pipe| Capture::spawn(pipe, Stream::Stdout));
        let stderr = child
            .stderr
            .take()
            .map(|pipe| Capture::spawn(pipe, Stream::Stderr));

        let (escalation, status) = self.supervise(&mut child).await?;

        let output = RawOutput {
            stdout: Capture::finish(stdout, self.timeouts.grace).await,
            stderr: Capture::finish(stderr, self.timeouts.grace).await,
        };
        let outcome = classify(escalation, status, output);

        info!(
            elapsed = ?started.elapsed(),
            success = outcome.is_success(),
            ?escalation,
            "Task finished"
        );
        Ok(outcome)
    }

    /// Waits for the child, escalating termination as limits expire.
    async fn supervise(&self, child: &mut Child) -> Result<(Option<Termination>, ExitStatus)> {
        let mut phase = Phase::Running;

        let status = loop {
            let (limit, next) = match phase {
                Phase::Running => (self.timeouts.run, Termination::Graceful),
                Phase::Terminating(Termination::Graceful) => {
                    (self.timeouts.grace, Termination::Forced)
                }
                Phase::Terminating(Termination::Forced) | Phase::Exited => {
                    break child.wait().await?;
                }
            };

            if let Ok(status) = time::timeout(limit, child.wait()).await {
                break status?;
            }
            warn!(?phase, ?next, ?limit, "Task over time limit, escalating");
            signal(child, next)?;
            phase = Phase::Terminating(next);
        };

        let escalation = match phase {
            Phase::Terminating(stage) => Some(stage),
            Phase::Running | Phase::Exited => None,
        };
        phase = Phase::Exited;
        debug!(?phase, reason = %ExitReason::from_status(status), "Task reaped");

        Ok((escalation, status))
    }
}

fn classify(escalation: Option<Termination>, status: ExitStatus, output: RawOutput) -> RunOutcome {
    let reason = ExitReason::from_status(status);
    match escalation {
        Some(stage) => RunOutcome::TimedOut {
            stage,
            reason,
            output,
        },
        None if status.success() => RunOutcome::Success(output),
        None => RunOutcome::Failure { reason, output },
    }
}

/// Delivers the termination signal for `stage` to the task's process group.
#[cfg(unix)]
fn signal(child: &Child, stage: Termination) -> Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    // Already reaped.
    let Some(pid) = child.id() else {
        return Ok(());
    };
    let pid = i32::try_from(pid).map_err(|_| std::io::Error::other("pid out of range"))?;
    let sig = match stage {
        Termination::Graceful => Signal::SIGTERM,
        Termination::Forced => Signal::SIGKILL,
    };

    match killpg(Pid::from_raw(pid), sig) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(std::io::Error::from(errno).into()),
    }
}

#[cfg(not(unix))]
fn signal(child: &mut Child, _stage: Termination) -> Result<()> {
    child.start_kill()?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

/// Background reader that accumulates one output pipe.
struct Capture {
    buffer: Arc<Mutex<Vec<u8>>>,
    handle: JoinHandle<()>,
}

impl Capture {
    fn spawn<R>(mut pipe: R, stream: Stream) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buffer);

        let handle = tokio::spawn(async move {
            let mut chunk = [0u8; 8192];
            loop {
                match pipe.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => {
                        if stream == Stream::Stderr {
                            warn!(
                                chunk = %String::from_utf8_lossy(&chunk[..n]).trim_end(),
                                "Task stderr"
                            );
                        }
                        sink.lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .extend_from_slice(&chunk[..n]);
                    }
                    Err(e) => {
                        warn!(?stream, error = %e, "Reading task output failed");
                        break;
                    }
                }
            }
        });

        Self { buffer, handle }
    }

    /// Waits briefly for the pipe to drain, then returns what was captured.
    ///
    /// A descendant that inherited the pipe can keep it open after the task
    /// itself exited; in that case the capture is cut off after `wait`.
    async fn finish(capture: Option<Self>, wait: Duration) -> String {
        let Some(Self { buffer, mut handle }) = capture else {
            return String::new();
        };

        if time::timeout(wait, &mut handle).await.is_err() {
            warn!("Task output still open after exit, truncating capture");
            handle.abort();
        }

        let bytes = std::mem::take(&mut *buffer.lock().unwrap_or_else(PoisonError::into_inner));
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// A [`TaskCommand`] bound to a [`Launcher`].
#[derive(Debug, Clone)]
pub struct ProcessTask {
    command: TaskCommand,
    launcher: Launcher,
}

impl ProcessTask {
    /// Binds `command` to `launcher`.
    #[must_use]
    pub const fn new(command: TaskCommand, launcher: Launcher) -> Self {
        Self { command, launcher }
    }

    /// The bound command.
    #[must_use]
    pub const fn command(&self) -> &TaskCommand {
        &self.command
    }
}

impl TaskRunner for ProcessTask {
    fn run(&self, args: &[String]) -> impl Future<Output = Result<RunOutcome>> + Send {
        self.launcher.run(&self.command, args)
    }
}
