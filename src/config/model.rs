use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_GATEWAY_PORT: u16 = 8780;

/// The heartwood repository, seeded automatically once the node is healthy.
pub const HEARTWOOD_RID: &str = "rad:z3gqcJUoA1n9HaHKufZs5FCSGazv5";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoderigConfig {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub binaries: BinariesConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub integration: IntegrationConfig,
}

// ---------------------------------------------------------------------------
// [node]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct NodeConfig {
    /// Directory holding noderig's own files (endpoint record, private node home).
    pub state_dir: Option<PathBuf>,
    /// RAD_HOME of the node this application spawns.
    pub data_home: Option<PathBuf>,
    /// RAD_HOME of a node installed system-wide by the user.
    pub system_home: Option<PathBuf>,
    pub alias: String,
    pub preferred_seeds: Vec<String>,
    pub identity_injection: bool,
    pub node_args: Vec<String>,
    pub key_name: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            state_dir: None,
            data_home: None,
            system_home: None,
            alias: "noderig".to_string(),
            preferred_seeds: vec![
                "z6MkrLMMsiPWUcNPHcRajuMi9mDfYckSoJyPwwnknocNYPm7@iris.radicle.xyz:8776"
                    .to_string(),
                "z6Mkmqogy2qEM2ummccUthFEaaHvyYmYBYh3dbe9W4ebScxo@rosa.radicle.xyz:8776"
                    .to_string(),
            ],
            identity_injection: false,
            node_args: Vec::new(),
            key_name: "radicle".to_string(),
        }
    }
}

impl NodeConfig {
    pub fn state_dir(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("noderig")
        })
    }

    pub fn data_home(&self) -> PathBuf {
        self.data_home
            .clone()
            .unwrap_or_else(|| self.state_dir().join("radicle"))
    }

    pub fn system_home(&self) -> PathBuf {
        self.system_home.clone().unwrap_or_else(|| {
            crate::platform::home_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join(".radicle")
        })
    }
}

// ---------------------------------------------------------------------------
// [binaries]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct BinariesConfig {
    /// Install prefix of a bundled toolchain. Bare names are looked up on PATH
    /// when this is unset.
    pub dir: Option<PathBuf>,
    pub rad: String,
    pub node: String,
    pub httpd: String,
}

impl Default for BinariesConfig {
    fn default() -> Self {
        Self {
            dir: None,
            rad: "rad".to_string(),
            node: "radicle-node".to_string(),
            httpd: "radicle-httpd".to_string(),
        }
    }
}

impl BinariesConfig {
    fn path_for(&self, name: &str) -> PathBuf {
        match &self.dir {
            Some(dir) if !Path::new(name).is_absolute() => dir.join(name),
            _ => PathBuf::from(name),
        }
    }

    pub fn rad_path(&self) -> PathBuf {
        self.path_for(&self.rad)
    }

    pub fn node_path(&self) -> PathBuf {
        self.path_for(&self.node)
    }

    pub fn httpd_path(&self) -> PathBuf {
        self.path_for(&self.httpd)
    }
}

// ---------------------------------------------------------------------------
// [gateway]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    pub port: u16,
    pub port_attempts: u16,
    pub health_path: String,
    pub service_marker: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_GATEWAY_PORT,
            port_attempts: 10,
            health_path: "/api/v1".to_string(),
            service_marker: "radicle-httpd".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// [timing]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimingConfig {
    pub socket_poll_ms: u64,
    pub socket_timeout_ms: u64,
    pub health_poll_ms: u64,
    pub health_attempts: u32,
    pub monitor_interval_ms: u64,
    pub node_signal_delay_ms: u64,
    pub force_kill_ms: u64,
    pub seed_timeout_ms: u64,
    pub sync_timeout_ms: u64,
    pub status_timeout_ms: u64,
    pub identity_timeout_ms: u64,
    pub probe_timeout_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            socket_poll_ms: 200,
            socket_timeout_ms: 30_000,
            health_poll_ms: 1_000,
            health_attempts: 60,
            monitor_interval_ms: 5_000,
            node_signal_delay_ms: 500,
            force_kill_ms: 10_000,
            seed_timeout_ms: 120_000,
            sync_timeout_ms: 60_000,
            status_timeout_ms: 15_000,
            identity_timeout_ms: 30_000,
            probe_timeout_ms: 2_000,
        }
    }
}

impl TimingConfig {
    pub fn socket_poll(&self) -> Duration {
        Duration::from_millis(self.socket_poll_ms)
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_timeout_ms)
    }

    pub fn health_poll(&self) -> Duration {
        Duration::from_millis(self.health_poll_ms)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms)
    }

    pub fn node_signal_delay(&self) -> Duration {
        Duration::from_millis(self.node_signal_delay_ms)
    }

    pub fn force_kill(&self) -> Duration {
        Duration::from_millis(self.force_kill_ms)
    }

    pub fn seed_timeout(&self) -> Duration {
        Duration::from_millis(self.seed_timeout_ms)
    }

    pub fn sync_timeout(&self) -> Duration {
        Duration::from_millis(self.sync_timeout_ms)
    }

    pub fn status_timeout(&self) -> Duration {
        Duration::from_millis(self.status_timeout_ms)
    }

    pub fn identity_timeout(&self) -> Duration {
        Duration::from_millis(self.identity_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// [integration]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct IntegrationConfig {
    pub enabled: bool,
    pub auto_seed: Vec<String>,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_seed: vec![HEARTWOOD_RID.to_string()],
        }
    }
}
