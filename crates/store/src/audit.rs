//! Durable per-run audit records.
//!
//! One structured JSON file per run under the logs directory, named by
//! the run's creation-timestamp-derived id. The stage event list is
//! append-only: events are never edited or removed once appended, and
//! every mutation is persisted durably (temp file, fsync, rename)
//! before the call returns. The orchestrator cannot reach the next
//! stage transition without the previous one being on disk, so a crash
//! mid-run leaves a diagnosable partial record instead of silent loss.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use reelforge_core::{Asset, Decision, ErrorKind, PipelineError, RunId, RunStatus, Stage};

// ---------------------------------------------------------------------------
// Record shapes
// ---------------------------------------------------------------------------

/// Outcome of one stage adapter attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageEventStatus {
    Completed,
    Failed,
}

/// One attempt of one stage, success or failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageEvent {
    pub stage: Stage,
    /// 1-based attempt number within the stage's retry budget.
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub status: StageEventStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Free-form annotations, e.g. scene counts or
    /// `{"source": "user-supplied"}` for substituted music.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

impl StageEvent {
    pub fn completed(stage: Stage, attempt: u32, started_at: DateTime<Utc>) -> Self {
        Self {
            stage,
            attempt,
            started_at,
            ended_at: Utc::now(),
            status: StageEventStatus::Completed,
            error: None,
            detail: None,
        }
    }

    pub fn failed(
        stage: Stage,
        attempt: u32,
        started_at: DateTime<Utc>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            stage,
            attempt,
            started_at,
            ended_at: Utc::now(),
            status: StageEventStatus::Failed,
            error: Some(error.into()),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = Some(detail);
        self
    }
}

/// The final review decision for a run.
///
/// `reviewer_note` is serialized even when absent so the field is
/// visibly `null` for auto-approved runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub approval_status: Decision,
    pub reviewer_note: Option<String>,
    pub reviewed_at: DateTime<Utc>,
}

/// Terminal error summary for failed runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub message: String,
}

/// The full audit record for one run.
///
/// Field names are part of the on-disk format and stable across
/// versions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub run_id: RunId,
    pub topic: String,
    /// Raw caller-supplied tag; recorded before vocabulary parsing so
    /// configuration failures still leave a faithful record.
    pub style: String,
    pub mood: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub stages: Vec<StageEvent>,
    pub assets: Vec<Asset>,
    pub approval: Option<ApprovalRecord>,
    pub error: Option<ErrorRecord>,
}

// ---------------------------------------------------------------------------
// AuditLog
// ---------------------------------------------------------------------------

/// Writer for per-run audit records.
///
/// Appending is the only mutation; the in-memory record is rewritten to
/// its JSON file on every change. Safe for concurrent appends from the
/// parallel media stages of one run.
pub struct AuditLog {
    logs_dir: PathBuf,
    records: Mutex<HashMap<RunId, AuditRecord>>,
}

impl AuditLog {
    pub fn new(logs_dir: impl Into<PathBuf>) -> Self {
        Self {
            logs_dir: logs_dir.into(),
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Path of the persisted record for a run.
    pub fn path_for(&self, run_id: &RunId) -> PathBuf {
        self.logs_dir.join(format!("run_{run_id}.json"))
    }

    /// Open the record for a new run and persist it immediately.
    ///
    /// `style`/`mood` are the raw caller-supplied tags so a run that
    /// fails vocabulary validation still gets a terminal record.
    pub async fn open(
        &self,
        run_id: &RunId,
        topic: &str,
        style: &str,
        mood: &str,
        started_at: DateTime<Utc>,
    ) -> Result<(), PipelineError> {
        let record = AuditRecord {
            run_id: run_id.clone(),
            topic: topic.to_string(),
            style: style.to_string(),
            mood: mood.to_string(),
            started_at,
            completed_at: None,
            status: RunStatus::Pending,
            stages: Vec::new(),
            assets: Vec::new(),
            approval: None,
            error: None,
        };

        let mut records = self.records.lock().await;
        self.persist(&record).await?;
        records.insert(run_id.clone(), record);
        Ok(())
    }

    /// Append one stage attempt event and persist durably.
    pub async fn append(&self, run_id: &RunId, event: StageEvent) -> Result<(), PipelineError> {
        let mut records = self.records.lock().await;
        let record = Self::record_mut(&mut records, run_id)?;
        record.stages.push(event);
        self.persist(record).await
    }

    /// Reference a produced asset and persist durably.
    pub async fn record_asset(&self, run_id: &RunId, asset: &Asset) -> Result<(), PipelineError> {
        let mut records = self.records.lock().await;
        let record = Self::record_mut(&mut records, run_id)?;
        record.assets.push(asset.clone());
        self.persist(record).await
    }

    /// Record the reviewer's decision and persist durably.
    pub async fn record_approval(
        &self,
        run_id: &RunId,
        approval: ApprovalRecord,
    ) -> Result<(), PipelineError> {
        let mut records = self.records.lock().await;
        let record = Self::record_mut(&mut records, run_id)?;
        record.approval = Some(approval);
        self.persist(record).await
    }

    /// Seal the record with its terminal status and optional error.
    ///
    /// Returns the path of the persisted file. The record is dropped
    /// from memory afterwards; the file is the durable copy.
    pub async fn finalize(
        &self,
        run_id: &RunId,
        status: RunStatus,
        error: Option<ErrorRecord>,
    ) -> Result<PathBuf, PipelineError> {
        let mut records = self.records.lock().await;
        let record = Self::record_mut(&mut records, run_id)?;
        record.status = status;
        record.completed_at = Some(Utc::now());
        record.error = error;
        self.persist(record).await?;
        records.remove(run_id);
        Ok(self.path_for(run_id))
    }

    /// A copy of the in-memory record, for observers and tests.
    pub async fn snapshot(&self, run_id: &RunId) -> Option<AuditRecord> {
        self.records.lock().await.get(run_id).cloned()
    }

    // ---- private helpers ----

    fn record_mut<'a>(
        records: &'a mut HashMap<RunId, AuditRecord>,
        run_id: &RunId,
    ) -> Result<&'a mut AuditRecord, PipelineError> {
        records.get_mut(run_id).ok_or_else(|| {
            PipelineError::Configuration(format!("No audit record open for run {run_id}"))
        })
    }

    /// Write the record to disk durably: temp file, fsync, rename.
    async fn persist(&self, record: &AuditRecord) -> Result<(), PipelineError> {
        tokio::fs::create_dir_all(&self.logs_dir).await?;
        let path = self.path_for(&record.run_id);
        let tmp = path.with_extension("json.tmp");

        let bytes = serde_json::to_vec_pretty(record).map_err(|e| {
            PipelineError::AssetIo(format!("Failed to serialize audit record: {e}"))
        })?;

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
