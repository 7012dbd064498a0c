use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::state::StatusSnapshot;

/// A message delivered to the controller after `delay`, unless cancelled
/// first. Dropping it cancels it.
#[derive(Debug)]
pub struct Deferred {
    cancel: CancellationToken,
}

impl Deferred {
    pub fn schedule<E>(delay: Duration, tx: mpsc::UnboundedSender<E>, event: E) -> Self
    where
        E: Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    let _ = tx.send(event);
                }
                _ = token.cancelled() => {}
            }
        });
        Self { cancel }
    }
}

impl Drop for Deferred {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Bookkeeping for one round of terminating our processes, either because
/// stop() was called or to clean up after a failure.
///
/// The force-kill timer is armed when the sequence begins and is cancelled
/// when the sequence is dropped, which happens once every process exited.
#[derive(Debug)]
pub struct ShutdownSequence {
    pub id: u64,
    waiters: Vec<oneshot::Sender<StatusSnapshot>>,
    _force_kill: Deferred,
    node_signal: Option<Deferred>,
}

impl ShutdownSequence {
    pub fn new(id: u64, force_kill: Deferred, node_signal: Option<Deferred>) -> Self {
        Self {
            id,
            waiters: Vec::new(),
            _force_kill: force_kill,
            node_signal,
        }
    }

    pub fn add_waiter(&mut self, waiter: oneshot::Sender<StatusSnapshot>) {
        self.waiters.push(waiter);
    }

    /// The delayed node signal fired or is no longer needed.
    pub fn clear_node_signal(&mut self) {
        self.node_signal = None;
    }

    /// Resolve every caller waiting on this sequence.
    pub fn finish(self, snapshot: &StatusSnapshot) {
        for waiter in self.waiters {
            let _ = waiter.send(snapshot.clone());
        }
    }
}
