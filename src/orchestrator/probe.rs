use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

/// Timeout for a single TCP connect when asking whether a port is taken.
pub const PORT_PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// What answered on a gateway port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    /// A gateway of ours answered the health path.
    Healthy,
    /// Something answered, but not a gateway.
    Foreign,
    Unreachable,
}

/// Observations of the outside world the lifecycle controller bases its
/// decisions on.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn is_port_open(&self, port: u16) -> bool;
    async fn health(&self, port: u16) -> Health;
    fn path_exists(&self, path: &Path) -> bool;
}

/// `<home>/node/control.sock`, present while a node serves that home.
pub fn control_socket(home: &Path) -> PathBuf {
    home.join("node").join("control.sock")
}

/// Local TCP connects and HTTP health checks against `127.0.0.1`.
pub struct HttpProbe {
    client: reqwest::Client,
    health_path: String,
    marker: String,
}

impl HttpProbe {
    pub fn new(health_path: &str, marker: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            client,
            health_path: health_path.to_string(),
            marker: marker.to_string(),
        })
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn is_port_open(&self, port: u16) -> bool {
        matches!(
            tokio::time::timeout(
                PORT_PROBE_TIMEOUT,
                tokio::net::TcpStream::connect(("127.0.0.1", port)),
            )
            .await,
            Ok(Ok(_))
        )
    }

    async fn health(&self, port: u16) -> Health {
        let url = format!("http://127.0.0.1:{}{}", port, self.health_path);
        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                debug!(%url, error = %e, "health probe failed");
                return Health::Unreachable;
            }
        };
        if !response.status().is_success() {
            return Health::Foreign;
        }
        match response.text().await {
            Ok(body) if body.contains(&self.marker) => Health::Healthy,
            Ok(_) => Health::Foreign,
            Err(_) => Health::Unreachable,
        }
    }

    fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// What is already running before we start anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    /// Home of a node that is not ours, found through its control socket.
    pub system_node: Option<PathBuf>,
    /// State of the default gateway port.
    pub gateway: Health,
}

/// Look for a system node and for an existing gateway on `port`.
///
/// The system home is skipped when it is the same directory as our own
/// data home; a socket there belongs to a node we spawned earlier.
pub async fn detect(
    probe: &dyn Probe,
    system_home: &Path,
    private_home: &Path,
    port: u16,
) -> Detection {
    let system_node = (system_home != private_home
        && probe.path_exists(&control_socket(system_home)))
    .then(|| system_home.to_path_buf());

    let gateway = if probe.is_port_open(port).await {
        match probe.health(port).await {
            Health::Healthy => Health::Healthy,
            _ => Health::Foreign,
        }
    } else {
        Health::Unreachable
    };

    debug!(?system_node, ?gateway, port, "detection finished");
    Detection {
        system_node,
        gateway,
    }
}
