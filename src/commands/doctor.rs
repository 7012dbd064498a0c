use anyhow::Result;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::model::NoderigConfig;
use crate::identity::key_path;
use crate::orchestrator::probe::control_socket;
use crate::platform::find_binary;

/// First non-empty line a binary prints for `--version`; some tools use stderr.
fn version_of(binary: &Path) -> Option<String> {
    let output = Command::new(binary).arg("--version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let text = if stdout.trim().is_empty() {
        String::from_utf8_lossy(&output.stderr).to_string()
    } else {
        stdout.to_string()
    };
    text.lines().map(str::trim).find(|l| !l.is_empty()).map(String::from)
}

fn binaries(config: &NoderigConfig) -> [(&'static str, PathBuf); 3] {
    [
        ("rad", config.binaries.rad_path()),
        ("radicle-node", config.binaries.node_path()),
        ("radicle-httpd", config.binaries.httpd_path()),
    ]
}

pub fn run(config_file: Option<&Path>) -> Result<()> {
    let config = super::load(config_file)?;

    println!("noderig doctor");
    println!("==============");
    println!();

    let mut all_ok = true;
    for (name, program) in binaries(&config) {
        match find_binary(&program) {
            Some(path) => {
                let version = version_of(&path).unwrap_or_else(|| path.display().to_string());
                println!("  [ok] {:<16} {}", name, version);
            }
            None => {
                println!("  [!!] {:<16} not found ({})", name, program.display());
                all_ok = false;
            }
        }
    }

    println!();
    let data_home = config.node.data_home();
    let system_home = config.node.system_home();
    println!("  state dir        {}", config.node.state_dir().display());
    println!("  data home        {}", data_home.display());
    let key = key_path(&data_home, &config.node.key_name);
    println!(
        "  identity         {}",
        if key.exists() { "present" } else { "not created yet" }
    );
    println!(
        "  system node      {}",
        if control_socket(&system_home).exists() {
            format!("running ({})", system_home.display())
        } else {
            "not detected".to_string()
        }
    );

    println!();
    if all_ok {
        println!("All binaries found.");
    } else {
        println!("Some binaries are missing. Install radicle or set [binaries] in noderig.toml.");
    }

    Ok(())
}
