use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, warn};

use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;

use super::SignalOutcome;

pub fn configure_process_group(cmd: &mut Command) {
    cmd.process_group(0);
}

fn signal_group(pid: u32, signal: Signal) -> SignalOutcome {
    let pgid = Pid::from_raw(pid as i32);
    match killpg(pgid, signal) {
        Ok(()) => {
            debug!(pid, ?signal, "signalled process group");
            SignalOutcome::Delivered
        }
        Err(nix::errno::Errno::ESRCH) => {
            debug!(pid, "process group already exited");
            SignalOutcome::Gone
        }
        Err(e) => {
            warn!(pid, ?signal, error = %e, "killpg failed");
            SignalOutcome::Unsupported
        }
    }
}

pub fn request_terminate(pid: u32) -> SignalOutcome {
    signal_group(pid, Signal::SIGTERM)
}

pub fn force_kill(pid: u32) -> SignalOutcome {
    signal_group(pid, Signal::SIGKILL)
}

pub fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}
