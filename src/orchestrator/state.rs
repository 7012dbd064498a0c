use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Stopped,
    Starting,
    Running,
    Stopping,
    Error,
}

impl Status {
    /// Edges of the lifecycle graph. Error → Error is allowed so a later,
    /// more specific cause can replace an earlier one.
    pub fn can_transition_to(self, next: Status) -> bool {
        use Status::*;
        matches!(
            (self, next),
            (Stopped, Starting)
                | (Stopped, Stopping)
                | (Starting, Running)
                | (Starting, Error)
                | (Starting, Stopping)
                | (Running, Error)
                | (Running, Stopping)
                | (Running, Stopped)
                | (Error, Running)
                | (Error, Error)
                | (Error, Starting)
                | (Error, Stopping)
                | (Error, Stopped)
                | (Stopping, Stopped)
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Stopped => "stopped",
            Status::Starting => "starting",
            Status::Running => "running",
            Status::Stopping => "stopping",
            Status::Error => "error",
        };
        f.write_str(s)
    }
}

/// Who owns the node the gateway is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    None,
    /// Both processes were spawned by us.
    Bundled,
    /// An existing node was adopted; we own at most the gateway.
    Reused,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mode::None => "none",
            Mode::Bundled => "bundled",
            Mode::Reused => "reused",
        };
        f.write_str(s)
    }
}

/// What every observer receives on each transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEvent {
    pub status: Status,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub status: Status,
    pub error: Option<String>,
    pub mode: Mode,
    pub http_port: u16,
    pub data_home: Option<PathBuf>,
    pub pending_start: bool,
}

impl StatusSnapshot {
    pub fn gateway_url(&self) -> Option<String> {
        matches!(self.status, Status::Running | Status::Error)
            .then(|| format!("http://127.0.0.1:{}", self.http_port))
            .filter(|_| self.mode != Mode::None)
    }
}

/// The single process-wide record of where the orchestrator stands. Only the
/// lifecycle controller holds one.
#[derive(Debug, Clone)]
pub struct OrchestratorState {
    pub status: Status,
    pub last_error: Option<String>,
    pub mode: Mode,
    pub active_data_home: Option<PathBuf>,
    pub http_port: u16,
    pub pending_start: bool,
    pub identity_injection_mode: bool,
}

impl OrchestratorState {
    pub fn new(http_port: u16, identity_injection_mode: bool) -> Self {
        Self {
            status: Status::Stopped,
            last_error: None,
            mode: Mode::None,
            active_data_home: None,
            http_port,
            pending_start: false,
            identity_injection_mode,
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            status: self.status,
            error: self.last_error.clone(),
            mode: self.mode,
            http_port: self.http_port,
            data_home: self.active_data_home.clone(),
            pending_start: self.pending_start,
        }
    }
}
