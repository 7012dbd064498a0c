pub mod model;
pub mod resolve;
pub mod validate;

use std::path::Path;

use model::NoderigConfig;

pub fn load_config(path: &Path) -> anyhow::Result<NoderigConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e))?;
    let config: NoderigConfig = toml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse config file {}: {}", path.display(), e))?;
    Ok(config)
}

/// Load the config at `path` (or defaults when there is none) and validate it.
pub fn load_validated(path: Option<&Path>) -> anyhow::Result<NoderigConfig> {
    let config = match path {
        Some(p) => load_config(p)?,
        None => NoderigConfig::default(),
    };

    if let Err(errors) = validate::validate(&config) {
        let mut msg = String::from("Configuration errors:\n");
        for err in &errors {
            msg.push_str(&format!("  - {}\n", err));
        }
        anyhow::bail!("{}", msg.trim_end());
    }

    Ok(config)
}
