//! Result shapes handed back to callers of the command surface.

use serde::Serialize;
use thiserror::Error;

/// Operation-level failures. These never change orchestrator state; they are
/// returned to whoever asked.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OpError {
    #[error("integration is disabled")]
    Disabled,

    #[error("node is not running")]
    NotRunning,

    #[error("invalid repository id `{0}`")]
    InvalidRid(String),

    #[error("repository is already seeded")]
    AlreadySeeded,

    #[error("repository not found on the network")]
    NotFound,

    #[error("command timed out after {0}s")]
    Timeout(u64),

    #[error("{0}")]
    Command(String),

    #[error("rad is unavailable: {0}")]
    Unavailable(String),
}

impl OpError {
    pub fn code(&self) -> &'static str {
        match self {
            OpError::Disabled => "DISABLED",
            OpError::NotRunning => "NOT_RUNNING",
            OpError::InvalidRid(_) => "INVALID_RID",
            OpError::AlreadySeeded => "ALREADY_SEEDED",
            OpError::NotFound => "NOT_FOUND",
            OpError::Timeout(_) => "TIMEOUT",
            OpError::Command(_) => "COMMAND_FAILED",
            OpError::Unavailable(_) => "UNAVAILABLE",
        }
    }
}

/// `{success, error?, code?, data?}` as consumed by the graphical shell.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            error: None,
            code: None,
            data: Some(data),
        }
    }

    pub fn err(error: &OpError) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            code: Some(error.code().to_string()),
            data: None,
        }
    }
}

impl<T> From<Result<T, OpError>> for Envelope<T> {
    fn from(result: Result<T, OpError>) -> Self {
        match result {
            Ok(data) => Envelope::ok(data),
            Err(e) => Envelope::err(&e),
        }
    }
}
