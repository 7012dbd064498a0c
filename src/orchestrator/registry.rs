use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing::warn;

use super::state::Mode;

/// Where consumers reach the gateway while the orchestrator is RUNNING.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEndpoint {
    pub api_url: String,
    pub gateway_url: String,
    pub mode: Mode,
    pub published_at: DateTime<Utc>,
}

impl ServiceEndpoint {
    pub fn local(port: u16, mode: Mode) -> Self {
        let url = format!("http://127.0.0.1:{port}");
        Self {
            api_url: url.clone(),
            gateway_url: url,
            mode,
            published_at: Utc::now(),
        }
    }

    pub fn port(&self) -> Option<u16> {
        self.api_url.rsplit(':').next()?.parse().ok()
    }
}

/// Publishes the active endpoint to in-process subscribers and, when a path
/// is configured, to a JSON file other processes can read.
pub struct ServiceRegistry {
    tx: watch::Sender<Option<ServiceEndpoint>>,
    file: Option<PathBuf>,
}

impl ServiceRegistry {
    pub fn new(file: Option<PathBuf>) -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx, file }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<ServiceEndpoint>> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> Option<ServiceEndpoint> {
        self.tx.borrow().clone()
    }

    pub fn publish(&self, endpoint: ServiceEndpoint) {
        if let Some(path) = &self.file {
            if let Err(e) = save(path, &endpoint) {
                warn!(path = %path.display(), error = %e, "failed to write endpoint file");
            }
        }
        self.tx.send_replace(Some(endpoint));
    }

    /// No-op when nothing is published.
    pub fn retract(&self) {
        if self.tx.borrow().is_none() {
            return;
        }
        if let Some(path) = &self.file {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "failed to remove endpoint file"),
            }
        }
        self.tx.send_replace(None);
    }
}

fn save(path: &Path, endpoint: &ServiceEndpoint) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(endpoint)?;
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, &content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Read an endpoint file written by a running orchestrator.
pub fn load(path: &Path) -> Option<ServiceEndpoint> {
    let content = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}
