use anyhow::{bail, Result};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

use crate::config::model::NoderigConfig;
use crate::envelope::{Envelope, OpError};
use crate::orchestrator::probe::{control_socket, Health, HttpProbe, Probe};
use crate::orchestrator::registry::{self, ServiceEndpoint};
use crate::orchestrator::state::Mode;
use crate::orchestrator::ENDPOINT_FILE;
use crate::repo::{self, cli::RadCli, cli::SystemRadCli, rid::validate_rid};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoOp {
    Seed { rid: String },
    Sync { rid: String },
    Connections,
}

impl RepoOp {
    fn rid(&self) -> Option<&str> {
        match self {
            RepoOp::Seed { rid } | RepoOp::Sync { rid } => Some(rid),
            RepoOp::Connections => None,
        }
    }
}

/// A node some orchestrator is running right now, as recorded in its
/// endpoint file.
#[derive(Debug, Clone)]
pub struct ActiveNode {
    pub home: PathBuf,
    pub endpoint: ServiceEndpoint,
}

/// Read the endpoint file and confirm the gateway behind it still answers.
pub async fn find_active_node(config: &NoderigConfig, probe: &dyn Probe) -> Option<ActiveNode> {
    let endpoint = registry::load(&config.node.state_dir().join(ENDPOINT_FILE))?;
    let port = endpoint.port()?;
    if probe.health(port).await != Health::Healthy {
        return None;
    }

    let private = config.node.data_home();
    let system = config.node.system_home();
    let home = if endpoint.mode == Mode::Reused
        && system != private
        && probe.path_exists(&control_socket(&system))
    {
        system
    } else {
        private
    };
    Some(ActiveNode { home, endpoint })
}

pub async fn execute(
    config: &NoderigConfig,
    probe: &dyn Probe,
    cli: &dyn RadCli,
    op: &RepoOp,
) -> Result<Value, OpError> {
    if !config.integration.enabled {
        return Err(OpError::Disabled);
    }
    if let Some(rid) = op.rid() {
        validate_rid(rid)?;
    }
    let node = find_active_node(config, probe)
        .await
        .ok_or(OpError::NotRunning)?;
    let home: &Path = &node.home;
    let timing = &config.timing;

    match op {
        RepoOp::Seed { rid } => repo::seed(cli, home, rid, timing.seed_timeout())
            .await
            .map(|()| json!({ "rid": rid })),
        RepoOp::Sync { rid } => repo::sync(cli, home, rid, timing.sync_timeout())
            .await
            .map(|summary| json!({ "rid": rid, "summary": summary })),
        RepoOp::Connections => repo::connections(cli, home, timing.status_timeout())
            .await
            .map(|peers| json!(peers)),
    }
}

pub async fn run(config_file: Option<&Path>, op: RepoOp) -> Result<()> {
    let config = super::load(config_file)?;
    let probe = HttpProbe::new(
        &config.gateway.health_path,
        &config.gateway.service_marker,
        config.timing.probe_timeout(),
    )?;
    let cli = SystemRadCli::new(config.binaries.rad_path());

    let result = execute(&config, &probe, &cli, &op).await;
    let envelope = Envelope::from(result.clone());
    println!("{}", serde_json::to_string_pretty(&envelope)?);

    if let Err(e) = result {
        bail!("{e}");
    }
    Ok(())
}
