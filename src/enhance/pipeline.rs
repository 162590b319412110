//! Per-segment enhancement task.
//!
//! Each eligible segment runs as its own tokio task: call the remote
//! service, normalize the result, retry with exponential backoff on
//! failure, and report every outcome back to the reducer. The semaphore
//! permit is held only across the network call, so a backoff sleep never
//! occupies a concurrency slot.

use crate::enhance::EnhancementService;
use crate::transcript::normalize::{is_degenerate, normalize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, warn};

/// Outcome messages a task reports to the reducer.
///
/// Every variant carries the session epoch the task was dispatched under;
/// the reducer drops events from a cleared session.
#[derive(Debug)]
pub(crate) enum PipelineEvent {
    /// One attempt failed and a retry is scheduled.
    AttemptFailed { id: String, epoch: u64 },
    /// The automatic retry budget is exhausted; the audio lease is returned.
    GaveUp {
        id: String,
        epoch: u64,
        audio: Vec<u8>,
    },
    /// The service answered, but with nothing usable; no improvement,
    /// not a failure.
    Degenerate { id: String, epoch: u64 },
    /// Normalized, non-degenerate enhanced text.
    Enhanced {
        id: String,
        epoch: u64,
        text: String,
    },
}

/// Everything a spawned enhancement task needs, cheap to clone per segment.
#[derive(Clone)]
pub(crate) struct EnhancementContext {
    pub service: Arc<dyn EnhancementService>,
    pub semaphore: Arc<Semaphore>,
    pub events: mpsc::Sender<PipelineEvent>,
    pub max_retries: u32,
    pub base_delay: Duration,
}

/// Backoff before the retry after `failed_attempts` failures:
/// `base * 2^(failed_attempts - 1)`.
pub(crate) fn backoff_delay(base: Duration, failed_attempts: u32) -> Duration {
    base * 2u32.saturating_pow(failed_attempts.saturating_sub(1))
}

/// Runs the enhancement attempts for one segment to completion.
///
/// The task owns the audio bytes for its whole lifetime and releases them
/// on success (dropped) or permanent failure (returned with
/// [`PipelineEvent::GaveUp`]).
pub(crate) async fn run(ctx: EnhancementContext, epoch: u64, id: String, audio: Vec<u8>) {
    let mut failures = 0u32;

    loop {
        // Closed semaphore means the engine is shutting down.
        let permit = match ctx.semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };
        let result = ctx.service.transcribe(&audio).await;
        drop(permit);

        match result {
            Ok(raw) => {
                let cleaned = normalize(&raw);
                let event = if is_degenerate(&cleaned) {
                    debug!(segment = %id, raw = %raw, "discarding degenerate enhancement result");
                    PipelineEvent::Degenerate { id, epoch }
                } else {
                    PipelineEvent::Enhanced {
                        id,
                        epoch,
                        text: cleaned,
                    }
                };
                let _ = ctx.events.send(event).await;
                return;
            }
            Err(e) => {
                failures += 1;
                if failures >= ctx.max_retries {
                    warn!(
                        segment = %id,
                        attempts = failures,
                        error = %e,
                        "enhancement failed permanently, keeping local text"
                    );
                    let _ = ctx.events.send(PipelineEvent::GaveUp { id, epoch, audio }).await;
                    return;
                }

                let delay = backoff_delay(ctx.base_delay, failures);
                debug!(
                    segment = %id,
                    attempt = failures,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "enhancement attempt failed, retrying"
                );
                let _ = ctx
                    .events
                    .send(PipelineEvent::AttemptFailed {
                        id: id.clone(),
                        epoch,
                    })
                    .await;
                tokio::time::sleep(delay).await;
            }
        }
    }
}
