use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Read side of the user-facing settings the orchestrator consults before
/// acting.
pub trait Settings: Send + Sync {
    fn integration_enabled(&self) -> bool;
}

/// In-memory settings that can be flipped at runtime.
#[derive(Debug, Clone)]
pub struct SharedSettings {
    enabled: Arc<AtomicBool>,
}

impl SharedSettings {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(enabled)),
        }
    }

    pub fn set_integration_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }
}

impl Settings for SharedSettings {
    fn integration_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}
