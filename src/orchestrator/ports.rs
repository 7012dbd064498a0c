use thiserror::Error;
use tracing::{debug, info};

use super::probe::Probe;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PortError {
    #[error("no free port for the gateway: tried {attempts} ports from {start}")]
    Exhausted { start: u16, attempts: u16 },
}

/// First port in `start..start + attempts` nobody is listening on.
pub async fn find_available_port(
    probe: &dyn Probe,
    start: u16,
    attempts: u16,
) -> Result<u16, PortError> {
    for offset in 0..attempts {
        let Some(port) = start.checked_add(offset) else {
            break;
        };
        if probe.is_port_open(port).await {
            debug!(port, "port in use");
            continue;
        }
        if port != start {
            info!("gateway port {start} in use, using {port} instead");
        }
        return Ok(port);
    }
    Err(PortError::Exhausted { start, attempts })
}
