use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::platform::{self, SignalOutcome};
use crate::repo::cli::{RAD_HOME, RAD_PASSPHRASE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessRole {
    Node,
    Gateway,
}

impl fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessRole::Node => f.write_str("node"),
            ProcessRole::Gateway => f.write_str("gateway"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub role: ProcessRole,
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Exported as `RAD_HOME`; also the working directory.
    pub data_home: PathBuf,
}

impl LaunchSpec {
    pub fn node(program: PathBuf, args: Vec<String>, data_home: &Path) -> Self {
        Self {
            role: ProcessRole::Node,
            program,
            args,
            data_home: data_home.to_path_buf(),
        }
    }

    pub fn gateway(program: PathBuf, port: u16, data_home: &Path) -> Self {
        Self {
            role: ProcessRole::Gateway,
            program,
            args: vec!["--listen".to_string(), format!("127.0.0.1:{port}")],
            data_home: data_home.to_path_buf(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitInfo {
    pub code: Option<i32>,
    pub signal: Option<i32>,
    /// Set when waiting on the child itself failed.
    pub error: Option<String>,
}

impl ExitInfo {
    pub fn code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
            error: None,
        }
    }

    pub fn signal(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
            error: None,
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    fn from_status(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = std::os::unix::process::ExitStatusExt::signal(&status);
        #[cfg(not(unix))]
        let signal = None;
        Self {
            code: status.code(),
            signal,
            error: None,
        }
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal, &self.error) {
            (_, _, Some(e)) => write!(f, "failed: {e}"),
            (Some(code), _, _) => write!(f, "exited with code {code}"),
            (None, Some(sig), _) => write!(f, "killed by signal {sig}"),
            (None, None, None) => f.write_str("exited"),
        }
    }
}

/// How long output is still collected once a process has exited.
const OUTPUT_DRAIN: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    Terminate,
    Kill,
}

/// Our end of a spawned process. Signals are delivered by the task that owns
/// the child; the handle only asks.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    pub role: ProcessRole,
    pub pid: Option<u32>,
    control: mpsc::UnboundedSender<StopSignal>,
}

impl ProcessHandle {
    pub fn new(role: ProcessRole, pid: Option<u32>, control: mpsc::UnboundedSender<StopSignal>) -> Self {
        Self { role, pid, control }
    }

    pub fn terminate(&self) {
        self.send(StopSignal::Terminate);
    }

    pub fn kill(&self) {
        self.send(StopSignal::Kill);
    }

    fn send(&self, signal: StopSignal) {
        if self.control.send(signal).is_err() {
            debug!(role = %self.role, pid = ?self.pid, ?signal, "process already reaped");
        }
    }
}

pub struct Spawned {
    pub handle: ProcessHandle,
    /// Resolves exactly once, when the process is gone.
    pub exit: oneshot::Receiver<ExitInfo>,
}

/// Starts node and gateway processes.
pub trait Spawner: Send + Sync {
    fn spawn(&self, spec: &LaunchSpec) -> Result<Spawned>;
    fn binary_exists(&self, program: &Path) -> bool;
}

/// Spawns real child processes in their own process group, with output
/// forwarded to tracing.
#[derive(Debug, Default)]
pub struct SystemSpawner;

impl Spawner for SystemSpawner {
    fn spawn(&self, spec: &LaunchSpec) -> Result<Spawned> {
        info!(
            role = %spec.role,
            home = %spec.data_home.display(),
            "spawning: {} {}",
            spec.program.display(),
            spec.args.join(" "),
        );

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .env(RAD_HOME, &spec.data_home)
            .env(RAD_PASSPHRASE, "")
            .current_dir(&spec.data_home)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        platform::configure_process_group(&mut cmd);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn {}", spec.program.display()))?;
        let pid = child.id();
        debug!(role = %spec.role, ?pid, "child spawned");

        let stdout = child.stdout.take().map(|out| forward_output(spec.role, false, out));
        let stderr = child.stderr.take().map(|err| forward_output(spec.role, true, err));

        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (exit_tx, exit_rx) = oneshot::channel();
        let role = spec.role;

        tokio::spawn(async move {
            let info = watch_child(role, child, pid, control_rx).await;
            for pump in [stdout, stderr].into_iter().flatten() {
                drain_output(role, pump).await;
            }
            info!(%role, ?pid, "process {}", info);
            let _ = exit_tx.send(info);
        });

        Ok(Spawned {
            handle: ProcessHandle::new(role, pid, control_tx),
            exit: exit_rx,
        })
    }

    fn binary_exists(&self, program: &Path) -> bool {
        platform::find_binary(program).is_some()
    }
}

/// Wait for the child while delivering stop requests to its process group.
async fn watch_child(
    role: ProcessRole,
    mut child: Child,
    pid: Option<u32>,
    mut control: mpsc::UnboundedReceiver<StopSignal>,
) -> ExitInfo {
    loop {
        tokio::select! {
            result = child.wait() => {
                return match result {
                    Ok(status) => ExitInfo::from_status(status),
                    Err(e) => {
                        warn!(%role, error = %e, "wait() failed");
                        ExitInfo { code: None, signal: None, error: Some(e.to_string()) }
                    }
                };
            }
            Some(signal) = control.recv() => deliver(role, &mut child, pid, signal),
        }
    }
}

fn deliver(role: ProcessRole, child: &mut Child, pid: Option<u32>, signal: StopSignal) {
    let outcome = match (pid, signal) {
        (Some(pid), StopSignal::Terminate) => platform::request_terminate(pid),
        (Some(pid), StopSignal::Kill) => platform::force_kill(pid),
        (None, _) => SignalOutcome::Unsupported,
    };
    match outcome {
        SignalOutcome::Delivered => debug!(%role, ?pid, ?signal, "signal sent to process group"),
        SignalOutcome::Gone => debug!(%role, ?pid, "process group already exited"),
        SignalOutcome::Unsupported => {
            if let Err(e) = child.start_kill() {
                debug!(%role, error = %e, "start_kill failed");
            }
        }
    }
}

/// Give a pump a moment to flush the last lines after the child exits. A
/// descendant that inherited the pipe can keep it open indefinitely.
async fn drain_output(role: ProcessRole, mut pump: tokio::task::JoinHandle<()>) {
    if tokio::time::timeout(OUTPUT_DRAIN, &mut pump).await.is_err() {
        debug!(%role, "output still open after exit, detaching");
        pump.abort();
    }
}

fn forward_output<R>(role: ProcessRole, is_stderr: bool, reader: R) -> tokio::task::JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if is_stderr => warn!(%role, stream = "stderr", "{}", line),
                Ok(Some(line)) => info!(%role, stream = "stdout", "{}", line),
                Ok(None) => break,
                Err(e) => {
                    warn!(%role, error = %e, "output read error");
                    break;
                }
            }
        }
    })
}
