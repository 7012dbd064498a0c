//! In-memory stand-ins for the process, network and CLI seams.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use super::launcher::{ExitInfo, LaunchSpec, ProcessHandle, ProcessRole, Spawned, Spawner, StopSignal};
use super::probe::{control_socket, Health, Probe};
use crate::repo::cli::{CliError, CliOutput, RadCli};

// ---------------------------------------------------------------------------
// FakeProbe
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ProbeState {
    open: HashSet<u16>,
    health: HashMap<u16, Health>,
    paths: HashSet<PathBuf>,
}

#[derive(Default)]
pub struct FakeProbe {
    state: Mutex<ProbeState>,
}

impl FakeProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_port(&self, port: u16) {
        self.state.lock().unwrap().open.insert(port);
    }

    pub fn close_port(&self, port: u16) {
        let mut state = self.state.lock().unwrap();
        state.open.remove(&port);
        state.health.remove(&port);
    }

    /// Anything answering HTTP also holds the port.
    pub fn set_health(&self, port: u16, health: Health) {
        let mut state = self.state.lock().unwrap();
        if health != Health::Unreachable {
            state.open.insert(port);
        }
        state.health.insert(port, health);
    }

    pub fn add_path(&self, path: PathBuf) {
        self.state.lock().unwrap().paths.insert(path);
    }

    pub fn remove_path(&self, path: &Path) {
        self.state.lock().unwrap().paths.remove(path);
    }
}

#[async_trait]
impl Probe for FakeProbe {
    async fn is_port_open(&self, port: u16) -> bool {
        self.state.lock().unwrap().open.contains(&port)
    }

    async fn health(&self, port: u16) -> Health {
        self.state
            .lock()
            .unwrap()
            .health
            .get(&port)
            .copied()
            .unwrap_or(Health::Unreachable)
    }

    fn path_exists(&self, path: &Path) -> bool {
        self.state.lock().unwrap().paths.contains(path)
    }
}

// ---------------------------------------------------------------------------
// FakeSpawner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalRecord {
    pub role: ProcessRole,
    pub signal: StopSignal,
    pub at: Instant,
}

struct SpawnerState {
    spawned: Vec<LaunchSpec>,
    signals: Vec<SignalRecord>,
    missing: HashSet<PathBuf>,
    failing: HashSet<ProcessRole>,
    stubborn: HashSet<ProcessRole>,
    node_creates_socket: bool,
    gateway_becomes_healthy: bool,
    exits: HashMap<ProcessRole, mpsc::UnboundedSender<ExitInfo>>,
    next_pid: u32,
}

/// Pretends to launch processes. Nodes create their control socket and
/// gateways answer health checks unless told otherwise; both exit on the
/// first signal unless marked stubborn, in which case only a kill works.
#[derive(Clone)]
pub struct FakeSpawner {
    state: Arc<Mutex<SpawnerState>>,
    probe: Arc<FakeProbe>,
}

impl FakeSpawner {
    pub fn new(probe: Arc<FakeProbe>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SpawnerState {
                spawned: Vec::new(),
                signals: Vec::new(),
                missing: HashSet::new(),
                failing: HashSet::new(),
                stubborn: HashSet::new(),
                node_creates_socket: true,
                gateway_becomes_healthy: true,
                exits: HashMap::new(),
                next_pid: 1000,
            })),
            probe,
        }
    }

    pub fn spawned(&self) -> Vec<LaunchSpec> {
        self.state.lock().unwrap().spawned.clone()
    }

    pub fn spawned_roles(&self) -> Vec<ProcessRole> {
        self.spawned().iter().map(|s| s.role).collect()
    }

    pub fn signals(&self) -> Vec<SignalRecord> {
        self.state.lock().unwrap().signals.clone()
    }

    pub fn set_missing(&self, program: PathBuf) {
        self.state.lock().unwrap().missing.insert(program);
    }

    pub fn fail_spawn(&self, role: ProcessRole) {
        self.state.lock().unwrap().failing.insert(role);
    }

    pub fn ignore_terminate(&self, role: ProcessRole) {
        self.state.lock().unwrap().stubborn.insert(role);
    }

    pub fn node_creates_socket(&self, yes: bool) {
        self.state.lock().unwrap().node_creates_socket = yes;
    }

    pub fn gateway_becomes_healthy(&self, yes: bool) {
        self.state.lock().unwrap().gateway_becomes_healthy = yes;
    }

    /// Make the latest process with `role` exit on its own.
    pub fn exit(&self, role: ProcessRole, info: ExitInfo) {
        if let Some(tx) = self.state.lock().unwrap().exits.get(&role) {
            let _ = tx.send(info);
        }
    }
}

fn listen_port(spec: &LaunchSpec) -> Option<u16> {
    spec.args
        .iter()
        .find_map(|a| a.strip_prefix("127.0.0.1:"))
        .and_then(|p| p.parse().ok())
}

impl Spawner for FakeSpawner {
    fn spawn(&self, spec: &LaunchSpec) -> Result<Spawned> {
        let (pid, stubborn, exit_rx) = {
            let mut state = self.state.lock().unwrap();
            state.spawned.push(spec.clone());
            if state.failing.contains(&spec.role) {
                bail!("failed to spawn {}", spec.program.display());
            }
            match spec.role {
                ProcessRole::Node if state.node_creates_socket => {
                    self.probe.add_path(control_socket(&spec.data_home));
                }
                ProcessRole::Gateway if state.gateway_becomes_healthy => {
                    if let Some(port) = listen_port(spec) {
                        self.probe.set_health(port, Health::Healthy);
                    }
                }
                _ => {}
            }
            state.next_pid += 1;
            let (exit_tx, exit_rx) = mpsc::unbounded_channel();
            state.exits.insert(spec.role, exit_tx);
            (state.next_pid, state.stubborn.contains(&spec.role), exit_rx)
        };

        let (control_tx, mut control_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = oneshot::channel();
        let role = spec.role;
        let state = self.state.clone();
        let probe = self.probe.clone();
        let home = spec.data_home.clone();
        let port = listen_port(spec);
        let mut exit_rx = exit_rx;

        tokio::spawn(async move {
            let info = loop {
                tokio::select! {
                    Some(signal) = control_rx.recv() => {
                        state.lock().unwrap().signals.push(SignalRecord { role, signal, at: Instant::now() });
                        match signal {
                            StopSignal::Kill => break ExitInfo::signal(9),
                            StopSignal::Terminate if !stubborn => break ExitInfo::signal(15),
                            StopSignal::Terminate => {}
                        }
                    }
                    Some(info) = exit_rx.recv() => break info,
                    else => std::future::pending::<()>().await,
                }
            };
            match role {
                ProcessRole::Node => probe.remove_path(&control_socket(&home)),
                ProcessRole::Gateway => {
                    if let Some(port) = port {
                        probe.close_port(port);
                    }
                }
            }
            let _ = done_tx.send(info);
        });

        Ok(Spawned {
            handle: ProcessHandle::new(role, Some(pid), control_tx),
            exit: done_rx,
        })
    }

    fn binary_exists(&self, program: &Path) -> bool {
        !self.state.lock().unwrap().missing.contains(program)
    }
}

// ---------------------------------------------------------------------------
// FakeRadCli
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadCall {
    pub home: PathBuf,
    pub args: Vec<String>,
    pub timeout: Duration,
}

#[derive(Default)]
struct RadState {
    calls: Vec<RadCall>,
    responses: HashMap<String, CliOutput>,
    timeouts: HashSet<String>,
    key_on_auth: Option<String>,
}

/// Records every `rad` invocation and answers with canned output keyed by
/// the first argument. Unconfigured commands succeed silently.
#[derive(Clone, Default)]
pub struct FakeRadCli {
    state: Arc<Mutex<RadState>>,
}

impl FakeRadCli {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<RadCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn respond(&self, command: &str, output: CliOutput) {
        self.state
            .lock()
            .unwrap()
            .responses
            .insert(command.to_string(), output);
    }

    pub fn respond_with_timeout(&self, command: &str) {
        self.state
            .lock()
            .unwrap()
            .timeouts
            .insert(command.to_string());
    }

    /// `rad auth` writes `<home>/keys/<key_name>` like the real one.
    pub fn create_key_on_auth(&self, key_name: &str) {
        self.state.lock().unwrap().key_on_auth = Some(key_name.to_string());
    }
}

#[async_trait]
impl RadCli for FakeRadCli {
    async fn run(
        &self,
        home: &Path,
        args: &[String],
        timeout: Duration,
    ) -> Result<CliOutput, CliError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(RadCall {
            home: home.to_path_buf(),
            args: args.to_vec(),
            timeout,
        });

        let command = args.first().cloned().unwrap_or_default();
        if state.timeouts.contains(&command) {
            return Err(CliError::Timeout {
                command: args.join(" "),
                after: timeout,
            });
        }
        if command == "auth" {
            if let Some(key) = &state.key_on_auth {
                let keys = home.join("keys");
                std::fs::create_dir_all(&keys).unwrap();
                std::fs::write(keys.join(key), "fake key").unwrap();
            }
        }
        Ok(state.responses.get(&command).cloned().unwrap_or(CliOutput {
            success: true,
            code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        }))
    }
}
