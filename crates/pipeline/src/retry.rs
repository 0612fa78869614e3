//! Exponential-backoff retry driver for stage adapter calls.
//!
//! Every attempt, success or failure, is appended to the run's audit
//! record before the driver moves on, so a crash mid-stage still
//! leaves the attempt history on disk. Only transient failures
//! (collaborator unavailability) are retried; invalid output and
//! configuration/storage errors abort immediately.

use std::time::Duration;

use chrono::Utc;

use reelforge_adapters::StageAdapter;
use reelforge_core::{PipelineError, RetryConfig, RunId};
use reelforge_store::{AuditLog, StageEvent};

/// Calculate the next backoff delay from the current delay and config.
///
/// The result is clamped to [`RetryConfig::max_delay`].
pub fn next_delay(current: Duration, config: &RetryConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

/// Invoke a stage adapter under the retry policy.
///
/// Returns the adapter's output on the first successful attempt, or
/// the last error once the attempt budget is exhausted or a
/// non-transient failure occurs.
pub async fn run_with_retry<A: StageAdapter>(
    adapter: &A,
    input: &A::Input,
    retry: &RetryConfig,
    audit: &AuditLog,
    run_id: &RunId,
) -> Result<A::Output, PipelineError> {
    let stage = adapter.stage();
    let mut delay = retry.initial_delay;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let started_at = Utc::now();

        match adapter.invoke(input).await {
            Ok(output) => {
                let mut event = StageEvent::completed(stage, attempt, started_at);
                if let Some(detail) = adapter.annotations(&output) {
                    event = event.with_detail(detail);
                }
                audit.append(run_id, event).await?;
                return Ok(output);
            }
            Err(err) => {
                audit
                    .append(
                        run_id,
                        StageEvent::failed(stage, attempt, started_at, err.to_string()),
                    )
                    .await?;

                if !err.is_transient() || attempt >= retry.max_attempts {
                    tracing::error!(
                        run_id = %run_id,
                        stage = %stage,
                        attempt,
                        error = %err,
                        "Stage failed",
                    );
                    return Err(err);
                }

                tracing::warn!(
                    run_id = %run_id,
                    stage = %stage,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Stage attempt failed, backing off",
                );
                tokio::time::sleep(delay).await;
                delay = next_delay(delay, retry);
            }
        }
    }
}
