//! The uniform stage adapter interface and collaborator error
//! normalization.

use async_trait::async_trait;

use reelforge_core::{PipelineError, Stage};

/// Uniform interface every stage adapter implements.
///
/// `Input` carries only the upstream data the stage needs; adapters
/// must not reach into run-global state beyond their declared inputs.
/// That isolation is what allows the retry driver to treat all stages
/// alike and lets the media stages run concurrently.
#[async_trait]
pub trait StageAdapter: Send + Sync {
    type Input: Send + Sync;
    type Output: Send;

    /// The stage this adapter drives.
    fn stage(&self) -> Stage;

    /// Invoke the collaborator once and normalize its output.
    ///
    /// Failures are already translated into the shared taxonomy; the
    /// retry policy decides whether to call again based on
    /// [`PipelineError::is_transient`].
    async fn invoke(&self, input: &Self::Input) -> Result<Self::Output, PipelineError>;

    /// Annotations for the stage's completed audit event (scene counts,
    /// image counts). `None` records the event without a detail object.
    fn annotations(&self, _output: &Self::Output) -> Option<serde_json::Value> {
        None
    }
}

/// Failure modes of a collaborator client, before normalization.
///
/// These are the only shapes collaborator clients may fail with;
/// adapters map them into [`PipelineError`] via [`normalize`] so the
/// orchestrator never sees transport-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The collaborator could not be reached or started (network error,
    /// missing binary).
    #[error("service unreachable: {0}")]
    Unreachable(String),

    /// The collaborator ran and reported failure on its own side
    /// (non-2xx response, non-zero exit).
    #[error("service failed: {0}")]
    Failed(String),

    /// The collaborator responded but its payload is unusable.
    #[error("malformed service response: {0}")]
    Malformed(String),

    /// Reading or writing collaborator data on local storage failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        ServiceError::Unreachable(e.to_string())
    }
}

/// Translate a collaborator failure into the shared taxonomy for the
/// given stage.
///
/// Unreachable and service-side failures are transient (the retry
/// policy will back off and try again); malformed payloads are invalid
/// stage output and never retried.
pub fn normalize(stage: Stage, err: ServiceError) -> PipelineError {
    match err {
        ServiceError::Unreachable(m) => PipelineError::StageUnavailable { stage, message: m },
        ServiceError::Failed(m) => PipelineError::StageUnavailable { stage, message: m },
        ServiceError::Malformed(m) => PipelineError::InvalidStageOutput { stage, message: m },
        ServiceError::Io(e) => PipelineError::AssetIo(e.to_string()),
    }
}

/// Ensure an HTTP response has a success status, capturing the body
/// text of failures for diagnostics.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(ServiceError::Failed(format!(
            "status {}: {body}",
            status.as_u16()
        )));
    }
    Ok(response)
}
