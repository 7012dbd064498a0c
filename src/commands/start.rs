use anyhow::{anyhow, Result};
use std::path::Path;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::orchestrator::state::Status;
use crate::orchestrator::Orchestrator;
use crate::ui::summary;

/// Run the orchestrator in the foreground until Ctrl+C or a fatal error.
pub async fn run(config_file: Option<&Path>, identity_injection: bool) -> Result<()> {
    let mut config = super::load(config_file)?;
    if identity_injection {
        config.node.identity_injection = true;
    }

    let orchestrator = Orchestrator::from_config(config)?;
    let mut events = orchestrator.subscribe();
    let endpoint = orchestrator.endpoint();

    orchestrator.start().await?;

    let mut announced = false;
    let outcome = loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let retracted = endpoint.borrow().is_none();
                    match event.status {
                        Status::Running if !announced => {
                            announced = true;
                            summary::print_running_summary(&orchestrator.status().await);
                        }
                        Status::Running => info!("gateway healthy again"),
                        // Health flaps keep the endpoint published; anything
                        // that retracts it will not recover on its own.
                        Status::Error if retracted => {
                            let error = event.error.unwrap_or_else(|| "unknown error".to_string());
                            break Err(anyhow!(error));
                        }
                        Status::Stopped => break Ok(()),
                        _ => {}
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "missed status events");
                }
                Err(RecvError::Closed) => break Ok(()),
            },
            _ = tokio::signal::ctrl_c() => {
                info!("received Ctrl+C, shutting down");
                break Ok(());
            }
        }
    };

    let snapshot = orchestrator.stop().await;
    info!(status = %snapshot.status, "shutdown complete");
    outcome
}
