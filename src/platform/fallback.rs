use std::path::Path;
use tokio::process::Command;

use super::SignalOutcome;

pub fn configure_process_group(_cmd: &mut Command) {}

pub fn request_terminate(_pid: u32) -> SignalOutcome {
    SignalOutcome::Unsupported
}

pub fn force_kill(_pid: u32) -> SignalOutcome {
    SignalOutcome::Unsupported
}

pub fn is_executable(path: &Path) -> bool {
    path.is_file()
}
