//! Bounded, cancellable polling of async inference jobs

use crate::error::{PipelineError, Result};
use crate::inference::{AsyncInference, JobHandle, JobStatus};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Flipped to `true` by the owner of the matching `watch::Sender` to stop polling.
pub type CancelSignal = watch::Receiver<bool>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_wait: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_wait: Duration::from_secs(30 * 60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    pub status: JobStatus,
    pub checks: u32,
    pub sleeps: u32,
    pub waited: Duration,
}

/// Query `handle` until it is terminal.
///
/// `Completed` returns the outcome. `Failed` returns `JobFailed` immediately.
/// No status check happens after `max_wait` has elapsed; the last sleep is
/// shortened so the final check lands on the deadline.
pub async fn poll_until_terminal(
    inference: &dyn AsyncInference,
    handle: &JobHandle,
    policy: &PollPolicy,
    mut cancel: Option<CancelSignal>,
) -> Result<PollOutcome> {
    let started = Instant::now();
    let mut checks = 0u32;
    let mut sleeps = 0u32;

    loop {
        if is_cancelled(&cancel) {
            return Err(PipelineError::Cancelled(handle.to_string()));
        }

        let status = inference.status(handle).await?;
        checks += 1;
        debug!("Invocation status for {}: {:?}", handle, status);

        match status {
            JobStatus::Completed => {
                info!("Job completed: {}", handle);
                return Ok(PollOutcome {
                    status: JobStatus::Completed,
                    checks,
                    sleeps,
                    waited: started.elapsed(),
                });
            }
            JobStatus::Failed(message) => {
                let message = message.unwrap_or_else(|| "no failure message".to_string());
                warn!("Job failed: {} ({})", handle, message);
                return Err(PipelineError::JobFailed {
                    job: handle.to_string(),
                    message,
                });
            }
            JobStatus::InProgress => {}
        }

        let waited = started.elapsed();
        if waited >= policy.max_wait {
            return Err(PipelineError::JobTimeout {
                job: handle.to_string(),
                waited,
            });
        }

        let pause = policy.interval.min(policy.max_wait - waited);
        if sleep_or_cancel(pause, &mut cancel).await {
            return Err(PipelineError::Cancelled(handle.to_string()));
        }
        sleeps += 1;
    }
}

pub fn is_cancelled(cancel: &Option<CancelSignal>) -> bool {
    cancel.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
}

/// `Cancelled(what)` once the signal has fired, for checks between batch items.
pub fn ensure_not_cancelled(cancel: &Option<CancelSignal>, what: &str) -> Result<()> {
    if is_cancelled(cancel) {
        warn!("Cancelled before {}", what);
        return Err(PipelineError::Cancelled(what.to_string()));
    }
    Ok(())
}

/// Returns true if cancellation fired before the pause elapsed.
async fn sleep_or_cancel(pause: Duration, cancel: &mut Option<CancelSignal>) -> bool {
    let deadline = Instant::now() + pause;
    let Some(rx) = cancel.as_mut() else {
        tokio::time::sleep_until(deadline).await;
        return false;
    };

    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => return false,
            changed = rx.changed() => {
                if changed.is_err() {
                    // Sender gone: nobody can cancel any more.
                    tokio::time::sleep_until(deadline).await;
                    return false;
                }
                if *rx.borrow() {
                    return true;
                }
            }
        }
    }
}
