//! Per-run scratch area management.
//!
//! [`AssetStore`] owns every intermediate file a run produces: it
//! creates the run's scratch directory, hands out deterministic write
//! locations tagged by stage and logical name, and guarantees cleanup
//! once the run reaches a terminal state. On approval the assembled
//! video is promoted to the permanent output directory before the
//! scratch area is removed; on any other terminal status everything is
//! removed unconditionally.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use reelforge_core::{Asset, PipelineError, RunId, RunStatus, Stage};

/// Manages scratch areas for in-flight runs and the permanent output
/// location for approved ones.
///
/// All mutating operations are safe under concurrent invocation from
/// the parallel media-generation stages: the registry is guarded by an
/// async mutex and every filesystem path is scoped to a single run's
/// directory, so no two runs (and no two stages of one run) ever touch
/// the same file.
pub struct AssetStore {
    scratch_root: PathBuf,
    output_dir: PathBuf,
    /// Committed assets per run, referenced by the audit log and tests.
    registry: Mutex<HashMap<RunId, Vec<Asset>>>,
}

impl AssetStore {
    pub fn new(scratch_root: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_root: scratch_root.into(),
            output_dir: output_dir.into(),
            registry: Mutex::new(HashMap::new()),
        }
    }

    /// The scratch directory owned by one run.
    pub fn run_dir(&self, run_id: &RunId) -> PathBuf {
        self.scratch_root.join(run_id.as_str())
    }

    /// Create the scratch area for a run.
    pub async fn create_run_scope(&self, run_id: &RunId) -> Result<(), PipelineError> {
        tokio::fs::create_dir_all(self.run_dir(run_id)).await?;
        self.registry
            .lock()
            .await
            .entry(run_id.clone())
            .or_default();
        tracing::debug!(run_id = %run_id, "Created scratch scope");
        Ok(())
    }

    /// Hand out the write location for a stage output.
    ///
    /// Idempotent per `(run_id, stage, logical_name)`: calling twice
    /// with the same key returns the same location, which is what makes
    /// retried stage writes safe. The logical name must be a plain
    /// filename; anything that could escape the run's directory is
    /// rejected.
    pub async fn allocate(
        &self,
        run_id: &RunId,
        stage: Stage,
        logical_name: &str,
    ) -> Result<PathBuf, PipelineError> {
        validate_logical_name(logical_name)?;
        let dir = self.run_dir(run_id);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir.join(format!("{stage}_{logical_name}")))
    }

    /// Check that a previously written asset exists and is non-empty.
    ///
    /// The orchestrator calls this for every upstream asset before
    /// invoking the stage that consumes it.
    pub async fn verify(&self, path: &Path) -> Result<(), PipelineError> {
        let meta = tokio::fs::metadata(path).await.map_err(|e| {
            PipelineError::AssetIo(format!("Asset {} unreadable: {e}", path.display()))
        })?;
        if meta.len() == 0 {
            return Err(PipelineError::AssetIo(format!(
                "Asset {} is empty",
                path.display()
            )));
        }
        Ok(())
    }

    /// Record a written asset in the run's registry after verifying it.
    pub async fn commit(&self, run_id: &RunId, asset: Asset) -> Result<(), PipelineError> {
        self.verify(&asset.path).await?;
        self.registry
            .lock()
            .await
            .entry(run_id.clone())
            .or_default()
            .push(asset);
        Ok(())
    }

    /// Committed assets for a run, in commit order.
    pub async fn assets_for(&self, run_id: &RunId) -> Vec<Asset> {
        self.registry
            .lock()
            .await
            .get(run_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Tear down a run's scratch state at a terminal status.
    ///
    /// On [`RunStatus::Approved`] the assembled `video` is first moved
    /// to the permanent output directory under `output_filename`; the
    /// scratch directory is then removed. On every other terminal
    /// status the scratch directory is removed unconditionally (even
    /// when a stage failed) and no output file is produced.
    ///
    /// Returns the permanent output path for approved runs.
    pub async fn finalize(
        &self,
        run_id: &RunId,
        status: RunStatus,
        video: Option<&Asset>,
        output_filename: &str,
    ) -> Result<Option<PathBuf>, PipelineError> {
        let promoted = if status == RunStatus::Approved {
            let video = video.ok_or_else(|| {
                PipelineError::AssetIo("No assembled video to promote on approval".to_string())
            })?;
            match self.promote(&video.path, output_filename).await {
                Ok(dest) => Some(dest),
                Err(e) => {
                    // Scratch must not outlive the run even when the
                    // promote itself fails.
                    self.cleanup(run_id).await;
                    return Err(e);
                }
            }
        } else {
            None
        };

        self.cleanup(run_id).await;
        tracing::info!(run_id = %run_id, status = ?status, "Finalized scratch scope");
        Ok(promoted)
    }

    // ---- private helpers ----

    /// Move the assembled video into the output directory.
    ///
    /// `rename` first; falls back to copy + remove when the scratch and
    /// output directories live on different filesystems.
    async fn promote(&self, src: &Path, output_filename: &str) -> Result<PathBuf, PipelineError> {
        self.verify(src).await?;
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let dest = self.output_dir.join(output_filename);

        if tokio::fs::rename(src, &dest).await.is_err() {
            tokio::fs::copy(src, &dest).await?;
            tokio::fs::remove_file(src).await?;
        }
        Ok(dest)
    }

    /// Remove the run's scratch directory and registry entry. A missing
    /// directory is not an error.
    async fn cleanup(&self, run_id: &RunId) {
        let dir = self.run_dir(run_id);
        if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(run_id = %run_id, error = %e, "Failed to remove scratch directory");
            }
        }
        self.registry.lock().await.remove(run_id);
    }
}

/// Reject logical names that are empty or could escape the run's
/// scratch directory.
fn validate_logical_name(name: &str) -> Result<(), PipelineError> {
    if name.is_empty() {
        return Err(PipelineError::AssetIo(
            "Logical asset name must not be empty".to_string(),
        ));
    }
    let safe = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');
    if !safe || name.contains("..") {
        return Err(PipelineError::AssetIo(format!(
            "Logical asset name '{name}' must be a plain filename"
        )));
    }
    Ok(())
}
