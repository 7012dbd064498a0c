//! Repository operations run against the active node: seed, sync, and the
//! connection count scraped from `rad node status`.

pub mod cli;
pub mod rid;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::envelope::OpError;
use cli::{CliError, CliOutput, RadCli};
use rid::validate_rid;

/// Map a failed `rad` run onto an operation error. The text matching is a
/// heuristic over human-oriented output.
pub fn classify_failure(output: &CliOutput) -> OpError {
    let text = output.combined();
    let lower = text.to_lowercase();
    if lower.contains("already tracking") || lower.contains("already seeding") {
        OpError::AlreadySeeded
    } else if lower.contains("not found") {
        OpError::NotFound
    } else if text.is_empty() {
        OpError::Command(format!("rad exited with code {:?}", output.code))
    } else {
        OpError::Command(text)
    }
}

fn map_cli_error(err: CliError) -> OpError {
    match err {
        CliError::Timeout { after, .. } => OpError::Timeout(after.as_secs()),
        CliError::Spawn { .. } => OpError::Unavailable(err.to_string()),
    }
}

async fn run_checked(
    cli: &dyn RadCli,
    home: &Path,
    args: &[String],
    timeout: Duration,
) -> Result<CliOutput, OpError> {
    let output = cli.run(home, args, timeout).await.map_err(map_cli_error)?;
    if output.success {
        Ok(output)
    } else {
        Err(classify_failure(&output))
    }
}

pub async fn seed(
    cli: &dyn RadCli,
    home: &Path,
    rid: &str,
    timeout: Duration,
) -> Result<(), OpError> {
    let rid = validate_rid(rid)?;
    run_checked(cli, home, &["seed".to_string(), rid.to_string()], timeout).await?;
    info!(%rid, "repository seeded");
    Ok(())
}

/// Fetch the latest state of `rid` from the network. Returns rad's summary text.
pub async fn sync(
    cli: &dyn RadCli,
    home: &Path,
    rid: &str,
    timeout: Duration,
) -> Result<String, OpError> {
    let rid = validate_rid(rid)?;
    let output = run_checked(
        cli,
        home,
        &["sync".to_string(), rid.to_string(), "--fetch".to_string()],
        timeout,
    )
    .await?;
    info!(%rid, "repository synced");
    Ok(output.stdout.trim().to_string())
}

pub async fn connections(
    cli: &dyn RadCli,
    home: &Path,
    timeout: Duration,
) -> Result<usize, OpError> {
    let output = run_checked(
        cli,
        home,
        &["node".to_string(), "status".to_string()],
        timeout,
    )
    .await?;
    Ok(count_connected_peers(&output.stdout))
}

/// Count peers reported as connected in `rad node status` output.
///
/// Best effort: the report has no stable schema, so a line counts when it names
/// a node (`z6Mk…` or `did:key:`) and says `connected` (but not `disconnected`).
pub fn count_connected_peers(report: &str) -> usize {
    report
        .lines()
        .filter(|line| line.contains("z6Mk") || line.contains("did:key:"))
        .filter(|line| {
            let lower = line.to_lowercase();
            lower.contains("connected") && !lower.contains("disconnected")
        })
        .count()
}

/// Seed the default repositories once the node is healthy. Failures are
/// logged and otherwise ignored.
pub async fn auto_seed_defaults(
    cli: Arc<dyn RadCli>,
    home: PathBuf,
    rids: Vec<String>,
    timeout: Duration,
) {
    for rid in rids {
        match seed(cli.as_ref(), &home, &rid, timeout).await {
            Ok(()) => info!(%rid, "auto-seeded default repository"),
            Err(OpError::AlreadySeeded) => info!(%rid, "default repository already seeded"),
            Err(e) => warn!(%rid, error = %e, "auto-seed failed"),
        }
    }
}
