use thiserror::Error;

use crate::config::model::NoderigConfig;
use crate::repo::rid::is_valid_rid;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("gateway.port must not be 0")]
    ZeroPort,

    #[error("gateway.port_attempts must be at least 1")]
    NoPortAttempts,

    #[error("gateway port range {start}+{attempts} runs past 65535")]
    PortRangeOverflow { start: u16, attempts: u16 },

    #[error("timing.{field} must be greater than 0")]
    ZeroTiming { field: &'static str },

    #[error("binaries.{field} is empty")]
    EmptyBinary { field: &'static str },

    #[error("integration.auto_seed entry `{rid}` is not a valid repository id")]
    InvalidAutoSeed { rid: String },

    #[error("node.alias is empty")]
    EmptyAlias,
}

/// Check a parsed config for values the orchestrator cannot work with.
/// Every problem is reported, not just the first.
pub fn validate(config: &NoderigConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let gateway = &config.gateway;
    if gateway.port == 0 {
        errors.push(ConfigError::ZeroPort);
    }
    if gateway.port_attempts == 0 {
        errors.push(ConfigError::NoPortAttempts);
    } else if gateway
        .port
        .checked_add(gateway.port_attempts - 1)
        .is_none()
    {
        errors.push(ConfigError::PortRangeOverflow {
            start: gateway.port,
            attempts: gateway.port_attempts,
        });
    }

    // node_signal_delay_ms may legitimately be 0.
    let t = &config.timing;
    let timings: [(&'static str, u64); 11] = [
        ("socket_poll_ms", t.socket_poll_ms),
        ("socket_timeout_ms", t.socket_timeout_ms),
        ("health_poll_ms", t.health_poll_ms),
        ("health_attempts", u64::from(t.health_attempts)),
        ("monitor_interval_ms", t.monitor_interval_ms),
        ("force_kill_ms", t.force_kill_ms),
        ("seed_timeout_ms", t.seed_timeout_ms),
        ("sync_timeout_ms", t.sync_timeout_ms),
        ("status_timeout_ms", t.status_timeout_ms),
        ("identity_timeout_ms", t.identity_timeout_ms),
        ("probe_timeout_ms", t.probe_timeout_ms),
    ];
    for (field, value) in timings {
        if value == 0 {
            errors.push(ConfigError::ZeroTiming { field });
        }
    }

    let bins = &config.binaries;
    for (field, value) in [("rad", &bins.rad), ("node", &bins.node), ("httpd", &bins.httpd)] {
        if value.trim().is_empty() {
            errors.push(ConfigError::EmptyBinary { field });
        }
    }

    for rid in &config.integration.auto_seed {
        if !is_valid_rid(rid) {
            errors.push(ConfigError::InvalidAutoSeed { rid: rid.clone() });
        }
    }

    if config.node.alias.trim().is_empty() {
        errors.push(ConfigError::EmptyAlias);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
