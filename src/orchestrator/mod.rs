pub mod health;
pub mod launcher;
pub mod ports;
pub mod probe;
pub mod ready;
pub mod registry;
pub mod shutdown;
pub mod state;

#[cfg(test)]
pub mod testing;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::model::NoderigConfig;
use crate::envelope::OpError;
use crate::identity::{ensure_identity, IdentityError, IdentityOptions};
use crate::repo;
use crate::repo::cli::{RadCli, SystemRadCli};
use crate::repo::rid::validate_rid;
use crate::settings::{Settings, SharedSettings};

use health::HealthTick;
use launcher::{ExitInfo, LaunchSpec, ProcessHandle, ProcessRole, Spawner, SystemSpawner};
use ports::{find_available_port, PortError};
use probe::{control_socket, detect, Health, HttpProbe, Probe};
use ready::{attempts_within, poll_until};
use registry::{ServiceEndpoint, ServiceRegistry};
use shutdown::{Deferred, ShutdownSequence};
use state::{Mode, OrchestratorState, Status, StatusEvent, StatusSnapshot};

/// Name of the endpoint file written under the state directory.
pub const ENDPOINT_FILE: &str = "endpoint.json";

/// Why a start attempt ended in ERROR.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("binary missing: {}", .0.display())]
    BinaryMissing(PathBuf),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    NoPorts(#[from] PortError),

    #[error("failed to spawn {role}: {reason}")]
    Spawn { role: ProcessRole, reason: String },

    #[error("node control socket did not appear within {}s", .0.as_secs())]
    SocketTimeout(Duration),

    #[error("gateway did not become healthy after {0} attempts")]
    HealthTimeout(usize),

    #[error("{role} {exit} during startup")]
    ExitedDuringStartup { role: ProcessRole, exit: ExitInfo },
}

/// The seams the controller talks to the outside world through.
#[derive(Clone)]
pub struct Dependencies {
    pub spawner: Arc<dyn Spawner>,
    pub probe: Arc<dyn Probe>,
    pub cli: Arc<dyn RadCli>,
    pub settings: Arc<dyn Settings>,
}

impl Dependencies {
    pub fn system(config: &NoderigConfig) -> Result<Self> {
        let probe = HttpProbe::new(
            &config.gateway.health_path,
            &config.gateway.service_marker,
            config.timing.probe_timeout(),
        )?;
        Ok(Self {
            spawner: Arc::new(SystemSpawner),
            probe: Arc::new(probe),
            cli: Arc::new(SystemRadCli::new(config.binaries.rad_path())),
            settings: Arc::new(SharedSettings::new(config.integration.enabled)),
        })
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

enum Command {
    Start {
        reply: oneshot::Sender<Result<StatusSnapshot, OpError>>,
    },
    Stop {
        reply: oneshot::Sender<StatusSnapshot>,
    },
    Status {
        reply: oneshot::Sender<StatusSnapshot>,
    },
    CheckBinary {
        reply: oneshot::Sender<bool>,
    },
    Seed {
        rid: String,
        reply: oneshot::Sender<Result<(), OpError>>,
    },
    Sync {
        rid: String,
        reply: oneshot::Sender<Result<String, OpError>>,
    },
    Connections {
        reply: oneshot::Sender<Result<usize, OpError>>,
    },
    SetIdentityInjection {
        enabled: bool,
    },
}

/// Cheap, cloneable handle to the lifecycle controller.
///
/// Every method is a request to the controller task, which is the only place
/// state changes. Dropping the last handle stops whatever is running.
#[derive(Clone)]
pub struct Orchestrator {
    tx: mpsc::Sender<Command>,
    status_tx: broadcast::Sender<StatusEvent>,
    endpoint_rx: watch::Receiver<Option<ServiceEndpoint>>,
    default_port: u16,
}

impl Orchestrator {
    /// Controller backed by real processes, probes and `rad`, publishing its
    /// endpoint under the configured state directory.
    pub fn from_config(config: NoderigConfig) -> Result<Self> {
        let deps = Dependencies::system(&config)?;
        let registry = ServiceRegistry::new(Some(config.node.state_dir().join(ENDPOINT_FILE)));
        Ok(Self::spawn(config, deps, registry))
    }

    pub fn spawn(config: NoderigConfig, deps: Dependencies, registry: ServiceRegistry) -> Self {
        let (tx, rx) = mpsc::channel(64);
        let (status_tx, _) = broadcast::channel(64);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let endpoint_rx = registry.subscribe();
        let default_port = config.gateway.port;

        let controller = Controller {
            state: OrchestratorState::new(default_port, config.node.identity_injection),
            config: Arc::new(config),
            deps,
            node: None,
            gateway: None,
            attempt: 0,
            sequences: 0,
            shutdown: None,
            monitor: None,
            monitors: 0,
            status_tx: status_tx.clone(),
            registry,
            events_tx,
            closing: false,
        };
        tokio::spawn(controller.run(rx, events_rx));

        Self {
            tx,
            status_tx,
            endpoint_rx,
            default_port,
        }
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Option<T> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(make(reply)).await.ok()?;
        rx.await.ok()
    }

    fn gone(&self) -> StatusSnapshot {
        OrchestratorState::new(self.default_port, false).snapshot()
    }

    /// Begin starting. Returns as soon as the request is accepted; follow
    /// progress through [`Orchestrator::subscribe`].
    pub async fn start(&self) -> Result<StatusSnapshot, OpError> {
        self.request(|reply| Command::Start { reply })
            .await
            .unwrap_or_else(|| Err(OpError::Unavailable("orchestrator has shut down".into())))
    }

    /// Resolves once every owned process has exited and status is STOPPED.
    pub async fn stop(&self) -> StatusSnapshot {
        match self.request(|reply| Command::Stop { reply }).await {
            Some(snapshot) => snapshot,
            None => self.gone(),
        }
    }

    pub async fn status(&self) -> StatusSnapshot {
        match self.request(|reply| Command::Status { reply }).await {
            Some(snapshot) => snapshot,
            None => self.gone(),
        }
    }

    pub async fn check_binary(&self) -> bool {
        self.request(|reply| Command::CheckBinary { reply })
            .await
            .unwrap_or(false)
    }

    pub async fn seed(&self, rid: &str) -> Result<(), OpError> {
        let rid = rid.to_string();
        self.request(|reply| Command::Seed { rid, reply })
            .await
            .unwrap_or_else(|| Err(OpError::NotRunning))
    }

    pub async fn sync(&self, rid: &str) -> Result<String, OpError> {
        let rid = rid.to_string();
        self.request(|reply| Command::Sync { rid, reply })
            .await
            .unwrap_or_else(|| Err(OpError::NotRunning))
    }

    pub async fn connections(&self) -> Result<usize, OpError> {
        self.request(|reply| Command::Connections { reply })
            .await
            .unwrap_or_else(|| Err(OpError::NotRunning))
    }

    /// Toggle whether identities are supplied from outside. Takes effect on
    /// the next start.
    pub async fn set_identity_injection(&self, enabled: bool) {
        let _ = self.tx.send(Command::SetIdentityInjection { enabled }).await;
    }

    /// Every status transition, in order.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.status_tx.subscribe()
    }

    /// The published gateway endpoint; `None` outside RUNNING.
    pub fn endpoint(&self) -> watch::Receiver<Option<ServiceEndpoint>> {
        self.endpoint_rx.clone()
    }
}

// ---------------------------------------------------------------------------
// Start planning
// ---------------------------------------------------------------------------

/// What a start attempt will do, decided before anything is spawned.
#[derive(Debug)]
enum Plan {
    /// A node and a healthy gateway already exist; spawn nothing.
    Adopt { home: PathBuf },
    /// Someone else's node; we run only the gateway against it.
    Gateway { home: PathBuf, port: u16 },
    /// Our own node and gateway on the private data home.
    Bundled { home: PathBuf, port: u16 },
}

struct PlanContext {
    config: Arc<NoderigConfig>,
    probe: Arc<dyn Probe>,
    spawner: Arc<dyn Spawner>,
    cli: Arc<dyn RadCli>,
    injection_mode: bool,
    /// A node we spawned earlier is still alive and will be adopted.
    node_running: bool,
}

impl PlanContext {
    fn require(&self, program: PathBuf) -> Result<(), StartError> {
        if self.spawner.binary_exists(&program) {
            Ok(())
        } else {
            Err(StartError::BinaryMissing(program))
        }
    }

    async fn gateway_port(&self) -> Result<u16, PortError> {
        let gw = &self.config.gateway;
        find_available_port(self.probe.as_ref(), gw.port, gw.port_attempts).await
    }

    async fn plan(&self) -> Result<Plan, StartError> {
        let config = &self.config;
        let private = config.node.data_home();
        let found = detect(
            self.probe.as_ref(),
            &config.node.system_home(),
            &private,
            config.gateway.port,
        )
        .await;

        // A node of ours still alive from an earlier start is reused below;
        // reused mode never carries a node handle.
        if let Some(home) = found.system_node.filter(|_| !self.node_running) {
            if found.gateway == Health::Healthy {
                info!(home = %home.display(), "reusing system node and its gateway");
                return Ok(Plan::Adopt { home });
            }
            info!(home = %home.display(), "reusing system node");
            self.require(config.binaries.httpd_path())?;
            let port = self.gateway_port().await?;
            return Ok(Plan::Gateway { home, port });
        }

        if found.gateway == Health::Healthy && !self.node_running {
            info!(port = config.gateway.port, "gateway already running, adopting it");
            return Ok(Plan::Adopt { home: private });
        }

        if !self.node_running {
            self.require(config.binaries.node_path())?;
        }
        self.require(config.binaries.httpd_path())?;

        if !self.node_running {
            let opts = IdentityOptions {
                key_name: config.node.key_name.clone(),
                alias: config.node.alias.clone(),
                preferred_seeds: config.node.preferred_seeds.clone(),
                injection_mode: self.injection_mode,
                timeout: config.timing.identity_timeout(),
            };
            ensure_identity(self.cli.as_ref(), &private, &opts).await?;
        }

        let port = self.gateway_port().await?;
        Ok(Plan::Bundled {
            home: private,
            port,
        })
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Completions of background work, each tagged so late arrivals from an
/// abandoned attempt or sequence are recognized and dropped.
#[derive(Debug)]
enum Event {
    Planned {
        attempt: u64,
        result: Result<Plan, StartError>,
    },
    NodeReady {
        attempt: u64,
        ready: bool,
    },
    GatewayReady {
        attempt: u64,
        ready: bool,
    },
    Exited {
        role: ProcessRole,
        pid: Option<u32>,
        info: ExitInfo,
    },
    Health(HealthTick),
    SignalNode {
        sequence: u64,
    },
    ForceKill {
        sequence: u64,
    },
}

impl From<HealthTick> for Event {
    fn from(tick: HealthTick) -> Self {
        Event::Health(tick)
    }
}

struct Controller {
    config: Arc<NoderigConfig>,
    deps: Dependencies,
    state: OrchestratorState,
    node: Option<ProcessHandle>,
    gateway: Option<ProcessHandle>,
    attempt: u64,
    sequences: u64,
    shutdown: Option<ShutdownSequence>,
    monitor: Option<(u64, CancellationToken)>,
    monitors: u64,
    status_tx: broadcast::Sender<StatusEvent>,
    registry: ServiceRegistry,
    events_tx: mpsc::UnboundedSender<Event>,
    /// Every handle is gone; stop and exit once STOPPED.
    closing: bool,
}

impl Controller {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut events: mpsc::UnboundedReceiver<Event>,
    ) {
        loop {
            tokio::select! {
                cmd = commands.recv(), if !self.closing => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => {
                        debug!("all handles dropped, shutting down");
                        self.closing = true;
                        self.begin_stop(None);
                    }
                },
                Some(event) = events.recv() => self.handle_event(event),
            }
            if self.closing && self.state.status == Status::Stopped && self.shutdown.is_none() {
                break;
            }
        }
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Start { reply } => {
                let result = if self.deps.settings.integration_enabled() {
                    Ok(self.begin_start())
                } else {
                    Err(OpError::Disabled)
                };
                let _ = reply.send(result);
            }
            Command::Stop { reply } => self.begin_stop(Some(reply)),
            Command::Status { reply } => {
                let _ = reply.send(self.state.snapshot());
            }
            Command::CheckBinary { reply } => {
                let bins = &self.config.binaries;
                let found = [bins.node_path(), bins.httpd_path(), bins.rad_path()]
                    .iter()
                    .all(|p| self.deps.spawner.binary_exists(p));
                let _ = reply.send(found);
            }
            Command::Seed { rid, reply } => match self.repo_home(Some(&rid)) {
                Ok(home) => {
                    let cli = self.deps.cli.clone();
                    let timeout = self.config.timing.seed_timeout();
                    tokio::spawn(async move {
                        let _ = reply.send(repo::seed(cli.as_ref(), &home, &rid, timeout).await);
                    });
                }
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            },
            Command::Sync { rid, reply } => match self.repo_home(Some(&rid)) {
                Ok(home) => {
                    let cli = self.deps.cli.clone();
                    let timeout = self.config.timing.sync_timeout();
                    tokio::spawn(async move {
                        let _ = reply.send(repo::sync(cli.as_ref(), &home, &rid, timeout).await);
                    });
                }
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            },
            Command::Connections { reply } => match self.repo_home(None) {
                Ok(home) => {
                    let cli = self.deps.cli.clone();
                    let timeout = self.config.timing.status_timeout();
                    tokio::spawn(async move {
                        let _ = reply.send(repo::connections(cli.as_ref(), &home, timeout).await);
                    });
                }
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            },
            Command::SetIdentityInjection { enabled } => {
                info!(enabled, "identity injection mode changed");
                self.state.identity_injection_mode = enabled;
            }
        }
    }

    /// Gate for repository operations: integration on, RID well formed, node
    /// running. Yields the data home the command must run against.
    fn repo_home(&self, rid: Option<&str>) -> Result<PathBuf, OpError> {
        if !self.deps.settings.integration_enabled() {
            return Err(OpError::Disabled);
        }
        if let Some(rid) = rid {
            validate_rid(rid)?;
        }
        match (self.state.status, &self.state.active_data_home) {
            (Status::Running, Some(home)) => Ok(home.clone()),
            _ => Err(OpError::NotRunning),
        }
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Planned { attempt, result } => {
                if self.is_current(attempt) {
                    self.on_planned(result);
                } else {
                    debug!(attempt, "dropping plan from abandoned start");
                }
            }
            Event::NodeReady { attempt, ready } => {
                if !self.is_current(attempt) {
                    return;
                }
                if ready {
                    self.launch_gateway();
                } else {
                    self.fail_start(StartError::SocketTimeout(self.config.timing.socket_timeout()));
                }
            }
            Event::GatewayReady { attempt, ready } => {
                if !self.is_current(attempt) {
                    return;
                }
                if ready {
                    self.enter_running();
                } else {
                    self.fail_start(StartError::HealthTimeout(
                        self.config.timing.health_attempts as usize,
                    ));
                }
            }
            Event::Exited { role, pid, info } => self.on_exit(role, pid, info),
            Event::Health(tick) => self.on_health(tick),
            Event::SignalNode { sequence } => {
                if let Some(seq) = self.shutdown.as_mut().filter(|s| s.id == sequence) {
                    seq.clear_node_signal();
                    if let Some(node) = &self.node {
                        debug!("terminating node");
                        node.terminate();
                    }
                }
            }
            Event::ForceKill { sequence } => {
                if self.shutdown.as_ref().is_some_and(|s| s.id == sequence) {
                    for handle in [&self.gateway, &self.node].into_iter().flatten() {
                        warn!(role = %handle.role, pid = ?handle.pid, "did not exit in time, killing");
                        handle.kill();
                    }
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Record a new status and broadcast it before anything else happens.
    fn transition(&mut self, status: Status, error: Option<String>) {
        let from = self.state.status;
        if !from.can_transition_to(status) {
            warn!(%from, to = %status, "unexpected status transition");
        }
        self.state.status = status;
        match status {
            Status::Running => self.state.last_error = None,
            Status::Error => self.state.last_error = error.clone(),
            _ => {}
        }
        match &error {
            Some(e) => info!(%from, to = %status, error = %e, "status changed"),
            None => info!(%from, to = %status, "status changed"),
        }
        let _ = self.status_tx.send(StatusEvent { status, error });
    }

    fn is_current(&self, attempt: u64) -> bool {
        self.state.status == Status::Starting && attempt == self.attempt
    }

    fn begin_start(&mut self) -> StatusSnapshot {
        match self.state.status {
            Status::Running | Status::Starting => {
                debug!(status = %self.state.status, "start ignored");
            }
            Status::Stopping => {
                info!("start requested while stopping, deferring until stopped");
                self.state.pending_start = true;
            }
            Status::Error if self.monitor.is_some() => {
                debug!("start ignored: gateway is up and being monitored");
            }
            Status::Error if self.shutdown.is_some() => {
                debug!("start ignored: processes from an earlier start are still exiting");
            }
            Status::Stopped | Status::Error => {
                self.attempt += 1;
                self.transition(Status::Starting, None);
                let ctx = PlanContext {
                    config: self.config.clone(),
                    probe: self.deps.probe.clone(),
                    spawner: self.deps.spawner.clone(),
                    cli: self.deps.cli.clone(),
                    injection_mode: self.state.identity_injection_mode,
                    node_running: self.node.is_some(),
                };
                let attempt = self.attempt;
                let tx = self.events_tx.clone();
                tokio::spawn(async move {
                    let result = ctx.plan().await;
                    let _ = tx.send(Event::Planned { attempt, result });
                });
            }
        }
        self.state.snapshot()
    }

    fn on_planned(&mut self, result: Result<Plan, StartError>) {
        let plan = match result {
            Ok(plan) => plan,
            Err(e) => return self.fail_start(e),
        };
        debug!(?plan, "start planned");
        match plan {
            Plan::Adopt { home } => {
                self.state.mode = Mode::Reused;
                self.state.active_data_home = Some(home);
                self.state.http_port = self.config.gateway.port;
                self.enter_running();
            }
            Plan::Gateway { home, port } => {
                self.state.mode = Mode::Reused;
                self.state.active_data_home = Some(home);
                self.state.http_port = port;
                self.launch_gateway();
            }
            Plan::Bundled { home, port } => {
                self.state.mode = Mode::Bundled;
                self.state.active_data_home = Some(home.clone());
                self.state.http_port = port;
                if self.node.is_some() {
                    info!("adopting node left running by an earlier start");
                } else {
                    let spec = LaunchSpec::node(
                        self.config.binaries.node_path(),
                        self.config.node.node_args.clone(),
                        &home,
                    );
                    if let Err(e) = self.launch(spec) {
                        return self.fail_start(e);
                    }
                }
                self.wait_for_socket(home);
            }
        }
    }

    /// Spawn a process and route its exit back to the controller.
    fn launch(&mut self, spec: LaunchSpec) -> Result<(), StartError> {
        let role = spec.role;
        let spawned = self
            .deps
            .spawner
            .spawn(&spec)
            .map_err(|e| StartError::Spawn {
                role,
                reason: format!("{e:#}"),
            })?;
        let pid = spawned.handle.pid;
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let info = spawned.exit.await.unwrap_or_else(|_| ExitInfo {
                code: None,
                signal: None,
                error: Some("exit status lost".to_string()),
            });
            let _ = tx.send(Event::Exited { role, pid, info });
        });
        match role {
            ProcessRole::Node => self.node = Some(spawned.handle),
            ProcessRole::Gateway => self.gateway = Some(spawned.handle),
        }
        Ok(())
    }

    fn wait_for_socket(&self, home: PathBuf) {
        let timing = &self.config.timing;
        let interval = timing.socket_poll();
        let attempts = attempts_within(timing.socket_timeout(), interval);
        let probe = self.deps.probe.clone();
        let attempt = self.attempt;
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let socket = control_socket(&home);
            let ready = poll_until("node control socket", interval, attempts, || {
                let found = probe.path_exists(&socket);
                async move { found }
            })
            .await
            .is_ok();
            let _ = tx.send(Event::NodeReady { attempt, ready });
        });
    }

    fn launch_gateway(&mut self) {
        let Some(home) = self.state.active_data_home.clone() else {
            return;
        };
        let port = self.state.http_port;
        let spec = LaunchSpec::gateway(self.config.binaries.httpd_path(), port, &home);
        if let Err(e) = self.launch(spec) {
            return self.fail_start(e);
        }

        let timing = &self.config.timing;
        let interval = timing.health_poll();
        let attempts = timing.health_attempts as usize;
        let probe = self.deps.probe.clone();
        let attempt = self.attempt;
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let ready = poll_until("gateway", interval, attempts, || {
                let probe = probe.clone();
                async move { probe.health(port).await == Health::Healthy }
            })
            .await
            .is_ok();
            let _ = tx.send(Event::GatewayReady { attempt, ready });
        });
    }

    fn enter_running(&mut self) {
        let Some(home) = self.state.active_data_home.clone() else {
            return;
        };
        let port = self.state.http_port;
        self.registry
            .publish(ServiceEndpoint::local(port, self.state.mode));
        self.transition(Status::Running, None);
        self.start_monitor(port);

        let rids = self.config.integration.auto_seed.clone();
        if !rids.is_empty() {
            tokio::spawn(repo::auto_seed_defaults(
                self.deps.cli.clone(),
                home,
                rids,
                self.config.timing.seed_timeout(),
            ));
        }
    }

    /// Move to ERROR and terminate whatever this attempt spawned.
    fn fail_start(&mut self, err: StartError) {
        error!(error = %err, "start failed");
        self.transition(Status::Error, Some(err.to_string()));
        self.state.mode = Mode::None;
        self.state.active_data_home = None;
        self.begin_sequence();
    }

    // -----------------------------------------------------------------------
    // Health monitoring
    // -----------------------------------------------------------------------

    fn start_monitor(&mut self, port: u16) {
        self.stop_monitor();
        self.monitors += 1;
        let cancel = CancellationToken::new();
        health::spawn_monitor(
            self.monitors,
            self.deps.probe.clone(),
            port,
            self.config.timing.monitor_interval(),
            cancel.clone(),
            self.events_tx.clone(),
        );
        self.monitor = Some((self.monitors, cancel));
    }

    fn stop_monitor(&mut self) {
        if let Some((_, cancel)) = self.monitor.take() {
            cancel.cancel();
        }
    }

    fn on_health(&mut self, tick: HealthTick) {
        if self.monitor.as_ref().map(|(id, _)| *id) != Some(tick.monitor) {
            return;
        }
        match (self.state.status, tick.healthy) {
            (Status::Running, false) => {
                warn!(port = self.state.http_port, "gateway health check failed");
                self.transition(Status::Error, Some("node unreachable, retrying".to_string()));
            }
            (Status::Error, true) => {
                info!(port = self.state.http_port, "gateway healthy again");
                self.transition(Status::Running, None);
            }
            _ => {}
        }
    }

    // -----------------------------------------------------------------------
    // Stopping
    // -----------------------------------------------------------------------

    fn begin_stop(&mut self, waiter: Option<oneshot::Sender<StatusSnapshot>>) {
        self.state.pending_start = false;
        match self.state.status {
            Status::Stopping => self.add_waiter(waiter),
            Status::Stopped if self.node.is_none() && self.gateway.is_none() => {
                self.add_waiter(waiter);
            }
            Status::Stopped => {
                // A node can outlive a gateway that exited cleanly.
                self.transition(Status::Stopping, None);
                self.begin_sequence();
                self.add_waiter(waiter);
            }
            Status::Starting | Status::Running | Status::Error => {
                self.attempt += 1;
                self.stop_monitor();
                self.registry.retract();
                self.transition(Status::Stopping, None);
                if self.begin_sequence() {
                    self.add_waiter(waiter);
                } else {
                    self.finish_stop(None, waiter);
                }
            }
        }
    }

    fn add_waiter(&mut self, waiter: Option<oneshot::Sender<StatusSnapshot>>) {
        let Some(waiter) = waiter else { return };
        match self.shutdown.as_mut() {
            Some(seq) => seq.add_waiter(waiter),
            None => {
                let _ = waiter.send(self.state.snapshot());
            }
        }
    }

    /// Signal owned processes: the gateway first, the node after a short
    /// delay (at once when there is no gateway). Arms the force-kill timer.
    /// Returns false when there is nothing to terminate.
    fn begin_sequence(&mut self) -> bool {
        if self.node.is_none() && self.gateway.is_none() {
            return false;
        }
        if self.shutdown.is_some() {
            return true;
        }
        self.sequences += 1;
        let id = self.sequences;
        let timing = &self.config.timing;
        let force_kill = Deferred::schedule(
            timing.force_kill(),
            self.events_tx.clone(),
            Event::ForceKill { sequence: id },
        );
        let node_signal = match (&self.gateway, &self.node) {
            (Some(gateway), Some(_)) => {
                gateway.terminate();
                Some(Deferred::schedule(
                    timing.node_signal_delay(),
                    self.events_tx.clone(),
                    Event::SignalNode { sequence: id },
                ))
            }
            (Some(gateway), None) => {
                gateway.terminate();
                None
            }
            (None, Some(node)) => {
                node.terminate();
                None
            }
            (None, None) => None,
        };
        debug!(sequence = id, "shutdown sequence started");
        self.shutdown = Some(ShutdownSequence::new(id, force_kill, node_signal));
        true
    }

    fn finish_stop(
        &mut self,
        sequence: Option<ShutdownSequence>,
        waiter: Option<oneshot::Sender<StatusSnapshot>>,
    ) {
        let replay = std::mem::take(&mut self.state.pending_start);
        self.state.mode = Mode::None;
        self.state.active_data_home = None;
        self.state.http_port = self.config.gateway.port;
        self.transition(Status::Stopped, None);

        let snapshot = self.state.snapshot();
        if let Some(seq) = sequence {
            seq.finish(&snapshot);
        }
        if let Some(waiter) = waiter {
            let _ = waiter.send(snapshot);
        }
        if replay && !self.closing {
            info!("starting again as requested during stop");
            self.begin_start();
        }
    }

    fn on_exit(&mut self, role: ProcessRole, pid: Option<u32>, info: ExitInfo) {
        let slot = match role {
            ProcessRole::Node => &mut self.node,
            ProcessRole::Gateway => &mut self.gateway,
        };
        if slot.as_ref().map(|h| h.pid) != Some(pid) {
            debug!(%role, ?pid, "exit of a process we no longer track");
            return;
        }
        *slot = None;

        if let Some(seq) = self.shutdown.as_mut() {
            if role == ProcessRole::Node {
                seq.clear_node_signal();
            }
            if self.node.is_none() && self.gateway.is_none() {
                let seq = self.shutdown.take();
                if self.state.status == Status::Stopping {
                    self.finish_stop(seq, None);
                } else if let Some(seq) = seq {
                    debug!(sequence = seq.id, "cleanup finished");
                    seq.finish(&self.state.snapshot());
                }
            }
            return;
        }

        match (role, self.state.status) {
            (_, Status::Stopped | Status::Stopping) => {}
            (_, Status::Starting) => {
                self.fail_start(StartError::ExitedDuringStartup { role, exit: info });
            }
            (ProcessRole::Gateway, _) => {
                self.stop_monitor();
                self.registry.retract();
                if info.success() {
                    info!("gateway exited cleanly");
                    self.state.mode = Mode::None;
                    self.state.active_data_home = None;
                    self.transition(Status::Stopped, None);
                } else {
                    self.transition(Status::Error, Some(format!("gateway {info}")));
                }
            }
            (ProcessRole::Node, _) => {
                self.stop_monitor();
                self.registry.retract();
                self.transition(Status::Error, Some(format!("node {info}")));
                // The gateway is useless without its node.
                self.begin_sequence();
            }
        }
    }
}
