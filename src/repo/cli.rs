use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Environment variable naming the node's data directory.
pub const RAD_HOME: &str = "RAD_HOME";
/// Environment variable holding the key passphrase.
pub const RAD_PASSPHRASE: &str = "RAD_PASSPHRASE";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CliOutput {
    /// stderr followed by stdout, trimmed. `rad` prints most diagnostics on
    /// stderr but a few on stdout.
    pub fn combined(&self) -> String {
        let mut text = self.stderr.trim().to_string();
        let out = self.stdout.trim();
        if !out.is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(out);
        }
        text
    }
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("`rad {command}` timed out after {}s", .after.as_secs())]
    Timeout { command: String, after: Duration },

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// One-shot invocations of the `rad` command line against a data home.
#[async_trait]
pub trait RadCli: Send + Sync {
    async fn run(
        &self,
        home: &Path,
        args: &[String],
        timeout: Duration,
    ) -> Result<CliOutput, CliError>;
}

/// Runs the real `rad` binary with `RAD_HOME` pointed at the data home and an
/// empty passphrase; the rest of the environment is inherited.
pub struct SystemRadCli {
    program: PathBuf,
}

impl SystemRadCli {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }
}

#[async_trait]
impl RadCli for SystemRadCli {
    async fn run(
        &self,
        home: &Path,
        args: &[String],
        timeout: Duration,
    ) -> Result<CliOutput, CliError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .env(RAD_HOME, home)
            .env(RAD_PASSPHRASE, "")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(program = %self.program.display(), ?args, home = %home.display(), "running rad");

        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(result) => result.map_err(|source| CliError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?,
            Err(_) => {
                return Err(CliError::Timeout {
                    command: args.join(" "),
                    after: timeout,
                })
            }
        };

        Ok(CliOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}
