use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::model::NoderigConfig;
use crate::orchestrator::probe::{detect, Health, HttpProbe, Probe};
use crate::orchestrator::state::{Mode, Status};
use crate::ui::summary;

use super::repo::find_active_node;

/// A read-only view of what is running, assembled without starting anything.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub status: Status,
    pub mode: Mode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_home: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_node: Option<PathBuf>,
    pub default_port: u16,
    pub default_port_state: PortState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    Free,
    Gateway,
    Foreign,
}

impl From<Health> for PortState {
    fn from(health: Health) -> Self {
        match health {
            Health::Healthy => PortState::Gateway,
            Health::Foreign => PortState::Foreign,
            Health::Unreachable => PortState::Free,
        }
    }
}

impl std::fmt::Display for PortState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortState::Free => write!(f, "free"),
            PortState::Gateway => write!(f, "radicle-httpd"),
            PortState::Foreign => write!(f, "in use by another service"),
        }
    }
}

pub async fn report(config: &NoderigConfig, probe: &dyn Probe) -> StatusReport {
    let port = config.gateway.port;
    let detection = detect(
        probe,
        &config.node.system_home(),
        &config.node.data_home(),
        port,
    )
    .await;

    let mut report = StatusReport {
        status: Status::Stopped,
        mode: Mode::None,
        gateway_url: None,
        data_home: None,
        published_at: None,
        system_node: detection.system_node,
        default_port: port,
        default_port_state: detection.gateway.into(),
    };

    if let Some(node) = find_active_node(config, probe).await {
        report.status = Status::Running;
        report.mode = node.endpoint.mode;
        report.gateway_url = Some(node.endpoint.gateway_url);
        report.published_at = Some(node.endpoint.published_at);
        report.data_home = Some(node.home);
    }
    report
}

pub async fn run(config_file: Option<&Path>, json: bool) -> Result<()> {
    let config = super::load(config_file)?;
    let probe = HttpProbe::new(
        &config.gateway.health_path,
        &config.gateway.service_marker,
        config.timing.probe_timeout(),
    )?;

    let report = report(&config, &probe).await;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        summary::print_status(&report);
    }
    Ok(())
}
