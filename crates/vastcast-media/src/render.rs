//! Render execution.
//!
//! A [`RenderJob`] is one encoder invocation. The executor runs it in its own
//! process group with a hard deadline, drains stdout and stderr while it
//! runs, and always writes a log artifact. When the deadline passes the whole
//! group is killed, so helpers the encoder forked cannot outlive the job.
//! The same happens when the render future is dropped mid-run.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use vastcast_models::EncodingConfig;

use crate::command::FfmpegCommand;
use crate::composition::CompositionPlan;
use crate::engine::EngineLocation;

/// Deadline for one render.
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(120);

/// Longest diagnostics excerpt returned to callers, in characters.
pub const MAX_DIAGNOSTICS_CHARS: usize = 2000;

/// How long to wait for the pipes to close once the process is gone.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Audio of the ad video, when it has any.
const AD_AUDIO_MAP: &str = "2:a?";

/// Media inputs of the composition, in graph order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderInputs {
    pub background: PathBuf,
    pub qr_code: PathBuf,
    /// Local path or remote URL of the ad video
    pub ad_video: String,
}

/// Lifecycle of a render.
///
/// `Planned -> Running -> {Succeeded | Failed | TimedOut}`, or
/// `Planned -> EngineUnavailable` when the encoder cannot be started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderState {
    Planned,
    Running,
    Succeeded,
    Failed,
    TimedOut,
    EngineUnavailable,
}

impl RenderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderState::Planned => "planned",
            RenderState::Running => "running",
            RenderState::Succeeded => "succeeded",
            RenderState::Failed => "failed",
            RenderState::TimedOut => "timed_out",
            RenderState::EngineUnavailable => "engine_unavailable",
        }
    }
}

impl fmt::Display for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One encoder invocation.
#[derive(Debug, Clone)]
pub struct RenderJob {
    args: Vec<String>,
    output_path: PathBuf,
    log_path: PathBuf,
    timeout: Duration,
}

impl RenderJob {
    /// Create a job from a built command.
    pub fn new(command: &FfmpegCommand, log_path: impl Into<PathBuf>) -> Self {
        Self {
            args: command.build_args(),
            output_path: command.output().to_path_buf(),
            log_path: log_path.into(),
            timeout: DEFAULT_RENDER_TIMEOUT,
        }
    }

    /// Create the job that renders a composition plan.
    pub fn composition(
        inputs: &RenderInputs,
        plan: &CompositionPlan,
        encoding: &EncodingConfig,
        output_path: impl AsRef<Path>,
        log_path: impl Into<PathBuf>,
    ) -> Self {
        let command = FfmpegCommand::new(output_path)
            .input_path(&inputs.background)
            .input_path(&inputs.qr_code)
            .input(inputs.ad_video.clone())
            .composition(plan)
            .map(AD_AUDIO_MAP)
            .output_args(encoding.to_ffmpeg_args());
        Self::new(&command, log_path)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Space-joined command line, as written to the log.
    pub fn command_line(&self, program: &Path) -> String {
        let mut line = program.to_string_lossy().into_owned();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Captured encoder output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub stdout: String,
    pub stderr: String,
}

impl Diagnostics {
    /// Tail of stderr (or stdout when stderr is empty), at most
    /// [`MAX_DIAGNOSTICS_CHARS`] characters.
    pub fn excerpt(&self) -> String {
        let source = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        tail_chars(source.trim_end(), MAX_DIAGNOSTICS_CHARS)
    }
}

fn tail_chars(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max {
        return text.to_string();
    }
    text.chars().skip(count - max).collect()
}

/// Why a finished render counts as failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Encoder exited with a non-zero status or was killed by a signal
    NonZeroExit,
    /// Encoder exited cleanly but wrote no output file
    MissingOutput,
    /// Output file exists but is empty
    EmptyOutput,
    /// Waiting on the process failed
    Wait(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::NonZeroExit => write!(f, "encoder exited with an error"),
            FailureReason::MissingOutput => write!(f, "encoder produced no output file"),
            FailureReason::EmptyOutput => write!(f, "encoder produced an empty output file"),
            FailureReason::Wait(e) => write!(f, "waiting on encoder failed: {e}"),
        }
    }
}

/// Terminal result of a render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    Succeeded {
        output_path: PathBuf,
        log_path: PathBuf,
        elapsed: Duration,
    },
    Failed {
        reason: FailureReason,
        exit_code: Option<i32>,
        diagnostics: Diagnostics,
        log_path: PathBuf,
    },
    TimedOut {
        timeout: Duration,
        diagnostics: Diagnostics,
        log_path: PathBuf,
    },
    EngineUnavailable {
        program: PathBuf,
        reason: String,
        log_path: PathBuf,
    },
}

impl RenderOutcome {
    pub fn state(&self) -> RenderState {
        match self {
            RenderOutcome::Succeeded { .. } => RenderState::Succeeded,
            RenderOutcome::Failed { .. } => RenderState::Failed,
            RenderOutcome::TimedOut { .. } => RenderState::TimedOut,
            RenderOutcome::EngineUnavailable { .. } => RenderState::EngineUnavailable,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RenderOutcome::Succeeded { .. })
    }

    /// Log artifact written for this render.
    pub fn log_path(&self) -> &Path {
        match self {
            RenderOutcome::Succeeded { log_path, .. }
            | RenderOutcome::Failed { log_path, .. }
            | RenderOutcome::TimedOut { log_path, .. }
            | RenderOutcome::EngineUnavailable { log_path, .. } => log_path,
        }
    }
}

/// Runs render jobs against a located encoder.
#[derive(Debug, Clone)]
pub struct RenderExecutor {
    engine: EngineLocation,
}

impl RenderExecutor {
    pub fn new(engine: EngineLocation) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &EngineLocation {
        &self.engine
    }

    /// Run a job to completion or timeout.
    pub async fn execute(&self, job: &RenderJob) -> RenderOutcome {
        let program = self.engine.program();
        let command_line = job.command_line(program);
        debug!(state = %RenderState::Planned, command = %command_line, "Render planned");

        let mut command = Command::new(program);
        command
            .args(job.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let started = Instant::now();
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                let reason = match e.kind() {
                    std::io::ErrorKind::NotFound => format!("FFmpeg executable not found: {e}"),
                    std::io::ErrorKind::PermissionDenied => {
                        format!("FFmpeg executable is not runnable: {e}")
                    }
                    _ => format!("failed to start FFmpeg: {e}"),
                };
                warn!(
                    state = %RenderState::EngineUnavailable,
                    program = %program.display(),
                    reason = %reason,
                    "Render could not start"
                );
                let diagnostics = Diagnostics {
                    stdout: String::new(),
                    stderr: reason.clone(),
                };
                write_log(job.log_path(), &command_line, "not started", &diagnostics).await;
                return RenderOutcome::EngineUnavailable {
                    program: program.to_path_buf(),
                    reason,
                    log_path: job.log_path().to_path_buf(),
                };
            }
        };

        let mut group = ProcessGroupGuard::new(&child);
        info!(
            state = %RenderState::Running,
            pid = child.id(),
            timeout_secs = job.timeout().as_secs(),
            "Render started"
        );

        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());

        let (waited, timed_out) = match tokio::time::timeout(job.timeout(), child.wait()).await {
            Ok(result) => (result, false),
            Err(_) => {
                warn!(
                    timeout_secs = job.timeout().as_secs(),
                    "Render timed out, killing process group"
                );
                terminate_process_group(&mut child);
                (child.wait().await, true)
            }
        };
        group.disarm();

        let diagnostics = Diagnostics {
            stdout: drain(stdout).await,
            stderr: drain(stderr).await,
        };

        let status_line = match (&waited, timed_out) {
            (_, true) => format!("timed out after {}s", job.timeout().as_secs()),
            (Ok(status), false) => status.to_string(),
            (Err(e), false) => format!("wait failed: {e}"),
        };
        write_log(job.log_path(), &command_line, &status_line, &diagnostics).await;

        let elapsed = started.elapsed();
        let outcome = if timed_out {
            RenderOutcome::TimedOut {
                timeout: job.timeout(),
                diagnostics,
                log_path: job.log_path().to_path_buf(),
            }
        } else {
            match waited {
                Ok(status) => classify_exit(job, status, diagnostics, elapsed).await,
                Err(e) => RenderOutcome::Failed {
                    reason: FailureReason::Wait(e.to_string()),
                    exit_code: None,
                    diagnostics,
                    log_path: job.log_path().to_path_buf(),
                },
            }
        };

        match &outcome {
            RenderOutcome::Succeeded { output_path, .. } => info!(
                state = %outcome.state(),
                output = %output_path.display(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Render finished"
            ),
            RenderOutcome::Failed { reason, exit_code, .. } => warn!(
                state = %outcome.state(),
                reason = %reason,
                exit_code = ?exit_code,
                elapsed_ms = elapsed.as_millis() as u64,
                "Render failed"
            ),
            _ => warn!(
                state = %outcome.state(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Render did not complete"
            ),
        }

        outcome
    }
}

async fn classify_exit(
    job: &RenderJob,
    status: ExitStatus,
    diagnostics: Diagnostics,
    elapsed: Duration,
) -> RenderOutcome {
    let failed = |reason| RenderOutcome::Failed {
        reason,
        exit_code: status.code(),
        diagnostics: diagnostics.clone(),
        log_path: job.log_path().to_path_buf(),
    };

    if !status.success() {
        return failed(FailureReason::NonZeroExit);
    }

    match tokio::fs::metadata(job.output_path()).await {
        Ok(meta) if meta.len() > 0 => RenderOutcome::Succeeded {
            output_path: job.output_path().to_path_buf(),
            log_path: job.log_path().to_path_buf(),
            elapsed,
        },
        Ok(_) => failed(FailureReason::EmptyOutput),
        Err(_) => failed(FailureReason::MissingOutput),
    }
}

fn spawn_reader<R>(pipe: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(e) = pipe.read_to_end(&mut buf).await {
                debug!(error = %e, "Encoder pipe read ended early");
            }
        }
        buf
    })
}

async fn drain(mut reader: JoinHandle<Vec<u8>>) -> String {
    match tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, &mut reader).await {
        Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
        Ok(Err(e)) => {
            warn!(error = %e, "Encoder output reader failed");
            String::new()
        }
        Err(_) => {
            reader.abort();
            warn!("Encoder output still open after process exit");
            String::new()
        }
    }
}

#[cfg(unix)]
fn terminate_process_group(child: &mut Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        warn!(pid, error = %e, "Failed to kill encoder process group");
        if let Err(e) = child.start_kill() {
            warn!(pid, error = %e, "Failed to kill encoder");
        }
    }
}

#[cfg(not(unix))]
fn terminate_process_group(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        warn!(error = %e, "Failed to kill encoder");
    }
}

/// Kills the encoder's process group when dropped while armed. Disarmed
/// once the group leader has been reaped, since its id may then be reused.
struct ProcessGroupGuard {
    pgid: Option<i32>,
}

impl ProcessGroupGuard {
    fn new(child: &Child) -> Self {
        Self {
            pgid: child.id().and_then(|id| i32::try_from(id).ok()),
        }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            warn!(pgid, "Render abandoned, killing process group");
            kill_abandoned_group(pgid);
        }
    }
}

#[cfg(unix)]
fn kill_abandoned_group(pgid: i32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Err(e) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        debug!(pgid, error = %e, "Process group already gone");
    }
}

#[cfg(not(unix))]
fn kill_abandoned_group(_pgid: i32) {}

async fn write_log(path: &Path, command_line: &str, status: &str, diagnostics: &Diagnostics) {
    let contents = format!(
        "FFMPEG COMMAND: {command_line}\nEXIT STATUS: {status}\n\n--- STDOUT ---\n{}\n--- STDERR ---\n{}\n",
        diagnostics.stdout, diagnostics.stderr
    );
    if let Err(e) = tokio::fs::write(path, contents).await {
        warn!(path = %path.display(), error = %e, "Failed to write render log");
    }
}
