use std::future::Future;
use std::time::Duration;

use backon::{ConstantBuilder, Retryable};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{what} not ready after {attempts} attempts")]
pub struct NotReady {
    pub what: String,
    pub attempts: usize,
}

#[derive(Debug)]
struct Pending;

/// How many polls of `interval` fit in `timeout` (at least one).
pub fn attempts_within(timeout: Duration, interval: Duration) -> usize {
    if interval.is_zero() {
        return 1;
    }
    timeout.as_millis().div_ceil(interval.as_millis()).max(1) as usize
}

/// Poll `check` every `interval` until it returns true, at most `attempts`
/// times. The first check runs immediately.
pub async fn poll_until<F, Fut>(
    what: &str,
    interval: Duration,
    attempts: usize,
    mut check: F,
) -> Result<(), NotReady>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let attempts = attempts.max(1);
    let result = (|| {
        let probe = check();
        async move {
            if probe.await {
                Ok(())
            } else {
                Err(Pending)
            }
        }
    })
    .retry(
        ConstantBuilder::default()
            .with_delay(interval)
            .with_max_times(attempts - 1),
    )
    .notify(|_: &Pending, dur: Duration| {
        tracing::trace!(what, "not ready, checking again in {:?}", dur);
    })
    .await;

    result.map_err(|Pending| NotReady {
        what: what.to_string(),
        attempts,
    })
}
