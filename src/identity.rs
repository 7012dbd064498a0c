use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::repo::cli::RadCli;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("waiting for identity injection")]
    AwaitingInjection,

    #[error("identity creation failed: {0}")]
    Creation(String),

    #[error("writing node config: {0}")]
    Config(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityOutcome {
    Existing,
    Created,
}

#[derive(Debug, Clone)]
pub struct IdentityOptions {
    pub key_name: String,
    pub alias: String,
    pub preferred_seeds: Vec<String>,
    /// Another component places key material; never generate one here.
    pub injection_mode: bool,
    pub timeout: Duration,
}

/// `<home>/keys/<name>`
pub fn key_path(home: &Path, key_name: &str) -> PathBuf {
    home.join("keys").join(key_name)
}

/// True once key material exists in `home`, whoever put it there.
pub fn has_injected_identity(home: &Path, key_name: &str) -> bool {
    key_path(home, key_name).is_file()
}

/// Make sure the node in `home` has an identity before it is started.
///
/// Existing keys are left alone. Missing keys are created with `rad auth` and
/// an empty passphrase, unless injection mode is on, in which case the caller
/// has to wait for the identity subsystem.
pub async fn ensure_identity(
    cli: &dyn RadCli,
    home: &Path,
    opts: &IdentityOptions,
) -> Result<IdentityOutcome, IdentityError> {
    if has_injected_identity(home, &opts.key_name) {
        return Ok(IdentityOutcome::Existing);
    }
    if opts.injection_mode {
        info!(home = %home.display(), "no identity yet, waiting for injection");
        return Err(IdentityError::AwaitingInjection);
    }

    std::fs::create_dir_all(home)
        .map_err(|e| IdentityError::Creation(format!("creating {}: {}", home.display(), e)))?;

    info!(home = %home.display(), alias = %opts.alias, "creating node identity");
    let args = [
        "auth".to_string(),
        "--alias".to_string(),
        opts.alias.clone(),
    ];
    let output = cli
        .run(home, &args, opts.timeout)
        .await
        .map_err(|e| IdentityError::Creation(e.to_string()))?;
    if !output.success {
        return Err(IdentityError::Creation(output.combined()));
    }
    if !has_injected_identity(home, &opts.key_name) {
        return Err(IdentityError::Creation(format!(
            "rad auth succeeded but {} is missing",
            key_path(home, &opts.key_name).display()
        )));
    }

    merge_node_config(home, &opts.alias, &opts.preferred_seeds)
        .map_err(|e| IdentityError::Config(format!("{e:#}")))?;
    Ok(IdentityOutcome::Created)
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        Some(_) => false,
    }
}

/// Fill in `preferredSeeds` and `node.alias` in `<home>/config.json` where they
/// are missing or empty. Everything already populated is preserved. Returns
/// whether the file was changed.
pub fn merge_node_config(home: &Path, alias: &str, seeds: &[String]) -> anyhow::Result<bool> {
    let path = home.join("config.json");
    let mut root = match std::fs::read_to_string(&path) {
        Ok(content) => match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                warn!(path = %path.display(), "config.json is not a JSON object, leaving it untouched");
                return Ok(false);
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
        Err(e) => return Err(e.into()),
    };

    let mut changed = false;

    if is_blank(root.get("preferredSeeds")) && !seeds.is_empty() {
        root.insert(
            "preferredSeeds".to_string(),
            Value::Array(seeds.iter().cloned().map(Value::String).collect()),
        );
        changed = true;
    }

    let node = root
        .entry("node")
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(node) = node {
        if is_blank(node.get("alias")) {
            node.insert("alias".to_string(), Value::String(alias.to_string()));
            changed = true;
        }
    }

    if changed {
        let content = serde_json::to_string_pretty(&Value::Object(root))?;
        // Atomic write: write to tmp file then rename
        let tmp_path = home.join("config.json.tmp");
        std::fs::write(&tmp_path, content)?;
        std::fs::rename(&tmp_path, &path)?;
    }
    Ok(changed)
}
