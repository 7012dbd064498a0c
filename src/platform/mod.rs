use std::path::{Path, PathBuf};
use tokio::process::Command;

#[cfg(unix)]
mod unix;
#[cfg(not(unix))]
mod fallback;

#[cfg(unix)]
use unix as imp;
#[cfg(not(unix))]
use fallback as imp;

/// Outcome of delivering a signal to a process group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    Delivered,
    /// The process (group) is already gone.
    Gone,
    /// Signals are not usable here; the caller should fall back to `Child::start_kill`.
    Unsupported,
}

/// Configure the command to run in a new process group.
/// Unix: `process_group(0)`, elsewhere a no-op.
pub fn configure_process_group(cmd: &mut Command) {
    imp::configure_process_group(cmd)
}

/// Ask the process group led by `pid` to exit (SIGTERM on Unix).
pub fn request_terminate(pid: u32) -> SignalOutcome {
    imp::request_terminate(pid)
}

/// Kill the process group led by `pid` without grace (SIGKILL on Unix).
pub fn force_kill(pid: u32) -> SignalOutcome {
    imp::force_kill(pid)
}

/// Get the current user's home directory.
pub fn home_dir() -> Option<PathBuf> {
    dirs::home_dir()
}

/// Resolve a binary the way the shell would: paths containing a separator
/// are checked directly, bare names are searched for on `PATH`.
pub fn find_binary(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 || program.is_absolute() {
        return imp::is_executable(program).then(|| program.to_path_buf());
    }
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(program))
        .find(|candidate| imp::is_executable(candidate))
}
