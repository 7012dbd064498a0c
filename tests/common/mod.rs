#![allow(dead_code)]
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// A scratch directory with a `noderig.toml` whose state and homes all live
/// inside it, so tests never touch a real radicle installation.
pub struct TestProject {
    pub dir: TempDir,
    pub config_path: PathBuf,
}

impl TestProject {
    /// `extra` is appended after the generated `[node]` table.
    pub fn new(extra: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().display().to_string();
        let config = format!(
            r#"
[node]
state_dir = "{root}/state"
system_home = "{root}/system"
alias = "test"
preferred_seeds = []

{extra}
"#
        );
        let config_path = dir.path().join("noderig.toml");
        std::fs::write(&config_path, config).unwrap();
        Self { dir, config_path }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn config_arg(&self) -> &str {
        self.config_path.to_str().unwrap()
    }

    pub fn endpoint_file(&self) -> PathBuf {
        self.path().join("state").join("endpoint.json")
    }

    pub fn data_home(&self) -> PathBuf {
        self.path().join("state").join("radicle")
    }

    pub fn control_socket(&self) -> PathBuf {
        self.data_home().join("node").join("control.sock")
    }

    pub fn read_endpoint(&self) -> Option<serde_json::Value> {
        let content = std::fs::read_to_string(self.endpoint_file()).ok()?;
        serde_json::from_str(&content).ok()
    }
}

pub fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Two adjacent free ports, `(p, p + 1)`.
pub fn free_port_pair() -> u16 {
    for _ in 0..50 {
        let port = free_port();
        if port < u16::MAX && TcpListener::bind(("127.0.0.1", port + 1)).is_ok() {
            return port;
        }
    }
    panic!("no adjacent free ports");
}

pub async fn wait_for_port(port: u16, timeout: Duration) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if TcpStream::connect(("127.0.0.1", port)).is_ok() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

pub async fn wait_for_port_release(port: u16, timeout: Duration) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if TcpListener::bind(("127.0.0.1", port)).is_ok() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

pub async fn wait_for_path(path: &Path, present: bool, timeout: Duration) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if path.exists() == present {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

const FAKE_NODE: &str = r#"#!/bin/sh
mkdir -p "$RAD_HOME/node"
touch "$RAD_HOME/node/control.sock"
trap 'rm -f "$RAD_HOME/node/control.sock"; exit 0' TERM INT
while true; do sleep 0.2; done
"#;

// `--listen 127.0.0.1:<port>`; GET /crash exits with code 3.
const FAKE_HTTPD: &str = r#"#!/usr/bin/env python3
import http.server
import os
import sys

host, port = sys.argv[2].rsplit(":", 1)

class Handler(http.server.BaseHTTPRequestHandler):
    def do_GET(self):
        if self.path == "/crash":
            os._exit(3)
        body = b'{"service":"radicle-httpd","version":"0.0.0-test"}'
        self.send_response(200)
        self.send_header("Content-Type", "application/json")
        self.send_header("Content-Length", str(len(body)))
        self.end_headers()
        self.wfile.write(body)

    def log_message(self, *args):
        pass

http.server.HTTPServer((host, int(port)), Handler).serve_forever()
"#;

const FAKE_RAD: &str = r#"#!/bin/sh
case "$1" in
  --version) echo "rad 0.0.0-test" ;;
  auth)
    mkdir -p "$RAD_HOME/keys"
    echo "fake key" > "$RAD_HOME/keys/radicle"
    echo "did:key:z6MkTestIdentity"
    ;;
  seed) echo "Seeding policy updated for $2" ;;
  sync) echo "Fetched $2 from 1 seed(s)" ;;
  node) printf 'z6MkPeerOne connected\nz6MkPeerTwo disconnected\n' ;;
esac
exit 0
"#;

/// Write stand-ins for `rad`, `radicle-node` and `radicle-httpd` into
/// `<project>/bin` and return that directory.
#[cfg(unix)]
pub fn install_fake_binaries(project: &TestProject) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let bin = project.path().join("bin");
    std::fs::create_dir_all(&bin).unwrap();
    for (name, script) in [
        ("radicle-node", FAKE_NODE),
        ("radicle-httpd", FAKE_HTTPD),
        ("rad", FAKE_RAD),
    ] {
        let path = bin.join(name);
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    bin
}

/// Config tables pointing the orchestrator at the fake binaries with short
/// timings.
pub fn fake_stack_config(bin: &Path, port: u16) -> String {
    format!(
        r#"
[binaries]
dir = "{bin}"

[gateway]
port = {port}
port_attempts = 5

[timing]
socket_poll_ms = 50
socket_timeout_ms = 5000
health_poll_ms = 100
health_attempts = 50
monitor_interval_ms = 500
force_kill_ms = 3000
"#,
        bin = bin.display()
    )
}

#[cfg(unix)]
pub fn interrupt(child: &tokio::process::Child) {
    let pid = child.id().unwrap();
    nix::sys::signal::kill(
        nix::unistd::Pid::from_raw(pid as i32),
        nix::sys::signal::Signal::SIGINT,
    )
    .ok();
}
