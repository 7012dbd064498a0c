pub mod doctor;
pub mod repo;
pub mod start;
pub mod status;

use anyhow::Result;
use std::path::Path;

use crate::config::{self, model::NoderigConfig, resolve::resolve_config};

/// Resolve the config file (if any) and load it.
pub(crate) fn load(config_file: Option<&Path>) -> Result<NoderigConfig> {
    let path = resolve_config(config_file)?;
    config::load_validated(path.as_deref())
}
