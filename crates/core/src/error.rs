//! Shared error taxonomy for the pipeline.
//!
//! Every failure that reaches the orchestrator is one of these four
//! kinds. Adapters translate collaborator-specific errors into this
//! taxonomy before they cross the boundary; the retry policy keys off
//! [`PipelineError::is_transient`].

use serde::{Deserialize, Serialize};

use crate::stage::Stage;

/// A pipeline failure, attributed to the stage that produced it where
/// one is involved.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Bad or unknown input parameters (empty topic, unrecognized
    /// style/mood tag, invalid state transition). Fatal, never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A collaborator was unreachable or failed on its own side.
    /// Transient: retried with backoff up to the configured bound.
    #[error("{stage} stage unavailable: {message}")]
    StageUnavailable { stage: Stage, message: String },

    /// A collaborator responded but its output violates the data-model
    /// invariants (empty script, non-image bytes, zero-length audio).
    /// Fatal, not retried.
    #[error("{stage} stage returned invalid output: {message}")]
    InvalidStageOutput { stage: Stage, message: String },

    /// Scratch or output storage was unreadable or unwritable. Fatal.
    #[error("Asset storage error: {0}")]
    AssetIo(String),
}

impl PipelineError {
    /// The taxonomy kind, as recorded in audit records.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Configuration(_) => ErrorKind::Configuration,
            PipelineError::StageUnavailable { .. } => ErrorKind::StageUnavailable,
            PipelineError::InvalidStageOutput { .. } => ErrorKind::InvalidStageOutput,
            PipelineError::AssetIo(_) => ErrorKind::AssetIo,
        }
    }

    /// Whether the retry policy may attempt this stage call again.
    /// Only collaborator unavailability is worth retrying; the other
    /// kinds will fail the same way on every attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, PipelineError::StageUnavailable { .. })
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        PipelineError::AssetIo(e.to_string())
    }
}

/// Serializable discriminant of [`PipelineError`] for audit records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    StageUnavailable,
    InvalidStageOutput,
    AssetIo,
}

impl ErrorKind {
    /// Stable string name used in audit records.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::StageUnavailable => "stage_unavailable",
            ErrorKind::InvalidStageOutput => "invalid_stage_output",
            ErrorKind::AssetIo => "asset_io",
        }
    }
}
