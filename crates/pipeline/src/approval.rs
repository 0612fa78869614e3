//! The approval gate: an explicit suspension point with a resumption
//! channel.
//!
//! A run that is not auto-approved suspends in `AwaitingApproval`
//! until exactly one external decision arrives. The suspension is
//! cancellable: triggering the handle's cancellation (or dropping the
//! handle without deciding) resolves to a rejection with a recorded
//! reason, so the run can never hang or leak scratch assets.

use std::path::Path;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use reelforge_core::{Decision, RunId};

/// A reviewer's verdict plus optional note.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub decision: Decision,
    pub note: Option<String>,
}

impl Verdict {
    pub fn approved(note: Option<String>) -> Self {
        Self {
            decision: Decision::Approved,
            note,
        }
    }

    pub fn rejected(note: impl Into<String>) -> Self {
        Self {
            decision: Decision::Rejected,
            note: Some(note.into()),
        }
    }
}

/// The external reviewer's side of the gate.
///
/// Not clonable: a run is resumable by exactly one decision, and
/// [`submit`](ReviewerHandle::submit) consumes the handle to enforce
/// that.
pub struct ReviewerHandle {
    tx: mpsc::Sender<Verdict>,
    cancel: CancellationToken,
}

impl ReviewerHandle {
    /// Deliver the decision, resuming the suspended run.
    ///
    /// Returns `false` when the gate is already gone (the run was
    /// auto-approved or has been cancelled).
    pub async fn submit(self, verdict: Verdict) -> bool {
        self.tx.send(verdict).await.is_ok()
    }

    /// Cancel the review; the run resumes with a rejection.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// The orchestrator's side of the gate.
pub struct ApprovalGate {
    rx: mpsc::Receiver<Verdict>,
    cancel: CancellationToken,
}

/// Create a connected reviewer handle / approval gate pair.
pub fn review_channel() -> (ReviewerHandle, ApprovalGate) {
    let (tx, rx) = mpsc::channel(1);
    let cancel = CancellationToken::new();
    (
        ReviewerHandle {
            tx,
            cancel: cancel.clone(),
        },
        ApprovalGate { rx, cancel },
    )
}

impl ApprovalGate {
    /// Present the assembled artifact and wait for the decision.
    ///
    /// With `auto_approve` the verdict is `Approved` immediately and
    /// deterministically, with no note and no suspension. Otherwise the
    /// call suspends for an unbounded period until the first of:
    ///
    /// - a verdict from the reviewer handle,
    /// - cancellation (mapped to `Rejected`),
    /// - the handle being dropped without a decision (also `Rejected`).
    ///
    /// Consumes the gate: there is exactly one decision per run.
    pub async fn review(mut self, run_id: &RunId, video: &Path, auto_approve: bool) -> Verdict {
        if auto_approve {
            tracing::info!(run_id = %run_id, "Auto-approve enabled, skipping review");
            return Verdict::approved(None);
        }

        tracing::info!(
            run_id = %run_id,
            video = %video.display(),
            "Awaiting review decision",
        );

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                tracing::info!(run_id = %run_id, "Review cancelled");
                Verdict::rejected("Review cancelled before a decision was made")
            }
            verdict = self.rx.recv() => match verdict {
                Some(verdict) => {
                    tracing::info!(run_id = %run_id, decision = ?verdict.decision, "Review decision received");
                    verdict
                }
                None => Verdict::rejected("Reviewer went away without a decision"),
            }
        }
    }
}
