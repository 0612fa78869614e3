//! The pipeline orchestrator: stage sequencing, retry policy, and the
//! approval gate.

pub mod approval;
pub mod orchestrator;
pub mod retry;

pub use approval::{review_channel, ApprovalGate, ReviewerHandle, Verdict};
pub use orchestrator::{Collaborators, Orchestrator, RunRequest, RunResult};
pub use retry::{next_delay, run_with_retry};
