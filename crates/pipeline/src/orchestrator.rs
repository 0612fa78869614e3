//! The pipeline orchestrator.
//!
//! Drives one run through the stage graph: script first, then the
//! three independent media stages concurrently, then assembly behind
//! the barrier, then the approval gate. Every stage transition is
//! durably recorded in the audit log before the next one starts, and
//! every terminal state finalizes both the audit record and the
//! scratch area, so a run can never end without a diagnosable record
//! or leak intermediate files.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;

use reelforge_adapters::{
    find_user_music, AssemblyAdapter, AssemblyRequest, AssemblyService, ImageService,
    MusicAdapter, MusicRequest, MusicService, SceneTarget, ScriptAdapter, ScriptRequest,
    ScriptService, SpeechService, VisualAdapter, VisualRequest, VoiceAdapter, VoiceRequest,
};
use reelforge_core::script::validate_script;
use reelforge_core::{
    naming, Asset, AssetKind, Mood, PipelineConfig, PipelineError, Run, RunId, RunState,
    RunStatus, Script, Stage, Style,
};
use reelforge_events::{event_types, EventBus, RunEvent};
use reelforge_store::{ApprovalRecord, AssetStore, AuditLog, ErrorRecord, StageEvent};

use crate::approval::ApprovalGate;
use crate::retry::run_with_retry;

// ---------------------------------------------------------------------------
// Public request/result types
// ---------------------------------------------------------------------------

/// Caller inputs for one run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// What the reel is about. Must be non-empty.
    pub topic: String,
    /// Raw style tag; validated against the vocabulary at run start.
    pub style: String,
    /// Raw mood tag; validated against the vocabulary at run start.
    pub mood: String,
    /// Skip the interactive review and approve deterministically.
    pub auto_approve: bool,
    /// Override for the output filename (slugified); defaults to a
    /// run-id-derived name.
    pub output_name: Option<String>,
    /// Pre-written script supplied by the caller; when present the
    /// script collaborator is bypassed entirely, and the topic may be
    /// empty.
    pub custom_script: Option<Script>,
}

/// Terminal outcome of a run.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub run_id: RunId,
    pub status: RunStatus,
    /// The permanent output file, present only for approved runs.
    pub output: Option<PathBuf>,
    /// The persisted audit record for the run.
    pub audit_path: PathBuf,
}

/// The set of external collaborators behind the five stage adapters.
pub struct Collaborators {
    pub script: Arc<dyn ScriptService>,
    pub image: Arc<dyn ImageService>,
    pub speech: Arc<dyn SpeechService>,
    pub music: Arc<dyn MusicService>,
    pub assembly: Arc<dyn AssemblyService>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Runs the fixed stage sequence for one topic at a time.
///
/// Holds no per-run state of its own: the asset store and audit log
/// key everything by run id, so multiple runs may execute concurrently
/// on one orchestrator (or on several with different configurations).
pub struct Orchestrator {
    config: PipelineConfig,
    store: AssetStore,
    audit: AuditLog,
    bus: EventBus,
    script_adapter: ScriptAdapter,
    visual_adapter: VisualAdapter,
    voice_adapter: VoiceAdapter,
    music_adapter: MusicAdapter,
    assembly_adapter: AssemblyAdapter,
}

impl Orchestrator {
    pub fn new(config: PipelineConfig, collaborators: Collaborators) -> Self {
        let store = AssetStore::new(&config.scratch_dir, &config.output_dir);
        let audit = AuditLog::new(&config.logs_dir);
        let script_adapter = ScriptAdapter::new(
            collaborators.script,
            config.render.default_scene_duration_secs,
        );
        Self {
            store,
            audit,
            bus: EventBus::default(),
            script_adapter,
            visual_adapter: VisualAdapter::new(collaborators.image),
            voice_adapter: VoiceAdapter::new(collaborators.speech),
            music_adapter: MusicAdapter::new(collaborators.music),
            assembly_adapter: AssemblyAdapter::new(collaborators.assembly),
            config,
        }
    }

    /// Subscribe to run progress events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<RunEvent> {
        self.bus.subscribe()
    }

    /// The audit log backing this orchestrator.
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Execute one run end to end.
    ///
    /// The caller keeps the [`ReviewerHandle`](crate::ReviewerHandle)
    /// paired with `gate` to deliver the decision when `auto_approve`
    /// is off. Every failure finalizes the audit record and cleans the
    /// scratch area before the error is returned, so the caller is
    /// never left without a terminal record.
    pub async fn execute(
        &self,
        request: RunRequest,
        gate: ApprovalGate,
    ) -> Result<RunResult, PipelineError> {
        // The audit record opens before input validation so that even a
        // configuration error leaves a terminal record on disk.
        let created_at = Utc::now();
        let run_id = RunId::generate(created_at);
        self.audit
            .open(
                &run_id,
                &request.topic,
                &request.style,
                &request.mood,
                created_at,
            )
            .await?;

        let (style, mood) = match validate_request(&request) {
            Ok(parsed) => parsed,
            Err(err) => return Err(self.fail_before_start(&run_id, err).await),
        };

        let mut run = Run {
            id: run_id,
            topic: request.topic.clone(),
            style,
            mood,
            created_at,
            state: RunState::Created,
            status: RunStatus::Pending,
        };

        tracing::info!(
            run_id = %run.id,
            topic = %run.topic,
            style = %run.style,
            mood = %run.mood,
            auto_approve = request.auto_approve,
            "Run created",
        );

        match self.drive(&mut run, &request, gate).await {
            Ok(result) => Ok(result),
            Err(err) => Err(self.fail_run(&mut run, err).await),
        }
    }

    // ---- run body ----

    /// The happy-path body; any error bubbles to [`Self::fail_run`].
    async fn drive(
        &self,
        run: &mut Run,
        request: &RunRequest,
        gate: ApprovalGate,
    ) -> Result<RunResult, PipelineError> {
        let retry = &self.config.retry;
        self.store.create_run_scope(&run.id).await?;
        self.bus.publish(
            RunEvent::new(event_types::RUN_CREATED, run.id.clone()).with_payload(
                serde_json::json!({
                    "topic": run.topic,
                    "style": run.style.as_str(),
                    "mood": run.mood.as_str(),
                }),
            ),
        );

        // -- Script: hard prerequisite for everything else. A caller-
        // supplied script bypasses the collaborator, like user music
        // bypasses the music stage. --
        run.advance(RunState::Scripting)?;
        self.publish_stage(event_types::STAGE_STARTED, &run.id, Stage::Script);
        let script = match &request.custom_script {
            Some(custom) => self.adopt_custom_script(&run.id, custom).await,
            None => {
                let script_request = ScriptRequest {
                    topic: run.topic.clone(),
                    style: run.style,
                    mood: run.mood,
                };
                run_with_retry(
                    &self.script_adapter,
                    &script_request,
                    retry,
                    &self.audit,
                    &run.id,
                )
                .await
            }
        }
        .inspect_err(|_| self.publish_stage(event_types::STAGE_FAILED, &run.id, Stage::Script))?;
        self.bus.publish(
            RunEvent::new(event_types::STAGE_COMPLETED, run.id.clone())
                .with_stage(Stage::Script)
                .with_payload(serde_json::json!({
                    "title": script.title,
                    "scenes": script.scenes.len(),
                })),
        );

        // -- Media generation: three independent branches, no ordering
        // guarantees between them. --
        run.advance(RunState::MediaGeneration)?;
        let (images, voice, music) = self.generate_media(&run.id, run.style, run.mood, &script).await?;

        // -- Assembly: strict barrier; every upstream asset must exist
        // and be non-empty before the collaborator is invoked. --
        run.advance(RunState::Assembling)?;
        for asset in images.iter().chain([&voice, &music]) {
            self.store.verify(&asset.path).await?;
        }
        self.publish_stage(event_types::STAGE_STARTED, &run.id, Stage::Assembly);
        let video_path = self
            .store
            .allocate(&run.id, Stage::Assembly, "reel.mp4")
            .await?;
        let assembly_request = AssemblyRequest {
            script: script.clone(),
            images,
            voice,
            music,
            output_path: video_path,
            render: self.config.render.clone(),
        };
        let video = run_with_retry(
            &self.assembly_adapter,
            &assembly_request,
            retry,
            &self.audit,
            &run.id,
        )
        .await
        .inspect_err(|_| self.publish_stage(event_types::STAGE_FAILED, &run.id, Stage::Assembly))?;
        self.store.commit(&run.id, video.clone()).await?;
        self.audit.record_asset(&run.id, &video).await?;
        self.publish_stage(event_types::STAGE_COMPLETED, &run.id, Stage::Assembly);

        // -- Approval gate: the one suspension point. --
        run.advance(RunState::AwaitingApproval)?;
        self.bus.publish(RunEvent::new(
            event_types::RUN_AWAITING_APPROVAL,
            run.id.clone(),
        ));
        let verdict = gate
            .review(&run.id, &video.path, request.auto_approve)
            .await;
        self.audit
            .record_approval(
                &run.id,
                ApprovalRecord {
                    approval_status: verdict.decision,
                    reviewer_note: verdict.note.clone(),
                    reviewed_at: Utc::now(),
                },
            )
            .await?;

        // -- Finalize. --
        let status = RunStatus::from(verdict.decision);
        run.advance(match status {
            RunStatus::Approved => RunState::Approved,
            _ => RunState::Rejected,
        })?;
        run.status = status;

        let output_filename = naming::output_filename(request.output_name.as_deref(), &run.id);
        let output = self
            .store
            .finalize(&run.id, status, Some(&video), &output_filename)
            .await?;

        run.advance(RunState::Done)?;
        let audit_path = self.audit.finalize(&run.id, status, None).await?;
        self.bus.publish(
            RunEvent::new(event_types::RUN_FINALIZED, run.id.clone()).with_payload(
                serde_json::json!({
                    "status": status,
                    "output": output.as_ref().map(|p| p.display().to_string()),
                }),
            ),
        );
        tracing::info!(run_id = %run.id, status = ?status, "Run finished");

        Ok(RunResult {
            run_id: run.id.clone(),
            status,
            output,
            audit_path,
        })
    }

    /// Run the visual, voice, and music branches concurrently and apply
    /// the barrier policy: if any branch failed, the run fails with the
    /// first failure in stage order, after all three have settled and
    /// recorded their own outcomes.
    async fn generate_media(
        &self,
        run_id: &RunId,
        style: Style,
        mood: Mood,
        script: &Script,
    ) -> Result<(Vec<Asset>, Asset, Asset), PipelineError> {
        let retry = &self.config.retry;

        let visual_branch = async {
            self.publish_stage(event_types::STAGE_STARTED, run_id, Stage::Visual);
            let mut targets = Vec::with_capacity(script.scenes.len());
            for scene in &script.scenes {
                let path = self
                    .store
                    .allocate(
                        run_id,
                        Stage::Visual,
                        &format!("scene_{:02}.png", scene.index),
                    )
                    .await?;
                targets.push(SceneTarget {
                    scene: scene.clone(),
                    output_path: path,
                });
            }
            let visual_request = VisualRequest {
                style,
                mood,
                targets,
            };
            let assets = run_with_retry(
                &self.visual_adapter,
                &visual_request,
                retry,
                &self.audit,
                run_id,
            )
            .await
            .inspect_err(|_| self.publish_stage(event_types::STAGE_FAILED, run_id, Stage::Visual))?;
            for asset in &assets {
                self.store.commit(run_id, asset.clone()).await?;
                self.audit.record_asset(run_id, asset).await?;
            }
            self.publish_stage(event_types::STAGE_COMPLETED, run_id, Stage::Visual);
            Ok::<Vec<Asset>, PipelineError>(assets)
        };

        let voice_branch = async {
            self.publish_stage(event_types::STAGE_STARTED, run_id, Stage::Voice);
            let voice_request = VoiceRequest {
                narration: script.full_narration(),
                voice: self.config.voice.clone(),
                output_path: self
                    .store
                    .allocate(run_id, Stage::Voice, "narration.mp3")
                    .await?,
            };
            let asset = run_with_retry(
                &self.voice_adapter,
                &voice_request,
                retry,
                &self.audit,
                run_id,
            )
            .await
            .inspect_err(|_| self.publish_stage(event_types::STAGE_FAILED, run_id, Stage::Voice))?;
            self.store.commit(run_id, asset.clone()).await?;
            self.audit.record_asset(run_id, &asset).await?;
            self.publish_stage(event_types::STAGE_COMPLETED, run_id, Stage::Voice);
            Ok::<Asset, PipelineError>(asset)
        };

        let music_branch = async {
            self.publish_stage(event_types::STAGE_STARTED, run_id, Stage::Music);
            let asset = match find_user_music(&self.config.music_dir).await {
                // Capability check: a user-supplied file bypasses the
                // collaborator entirely, recorded as such.
                Some(user_file) => self.substitute_user_music(run_id, &user_file).await?,
                None => {
                    let music_request = MusicRequest {
                        mood,
                        duration_secs: script.total_duration_secs()
                            + self.config.render.music_fade_out_secs,
                        output_path: self
                            .store
                            .allocate(run_id, Stage::Music, "background.wav")
                            .await?,
                    };
                    run_with_retry(
                        &self.music_adapter,
                        &music_request,
                        retry,
                        &self.audit,
                        run_id,
                    )
                    .await
                    .inspect_err(|_| {
                        self.publish_stage(event_types::STAGE_FAILED, run_id, Stage::Music)
                    })?
                }
            };
            self.store.commit(run_id, asset.clone()).await?;
            self.audit.record_asset(run_id, &asset).await?;
            self.publish_stage(event_types::STAGE_COMPLETED, run_id, Stage::Music);
            Ok::<Asset, PipelineError>(asset)
        };

        let (visual_result, voice_result, music_result) =
            tokio::join!(visual_branch, voice_branch, music_branch);

        match (visual_result, voice_result, music_result) {
            (Ok(images), Ok(voice), Ok(music)) => Ok((images, voice, music)),
            (Err(e), _, _) => Err(e),
            (_, Err(e), _) => Err(e),
            (_, _, Err(e)) => Err(e),
        }
    }

    /// Validate and adopt a caller-supplied script, recording the
    /// collaborator bypass in the audit record.
    async fn adopt_custom_script(
        &self,
        run_id: &RunId,
        script: &Script,
    ) -> Result<Script, PipelineError> {
        let started_at = Utc::now();
        match validate_script(script) {
            Ok(()) => {
                tracing::info!(run_id = %run_id, title = %script.title, "Using caller-supplied script");
                self.audit
                    .append(
                        run_id,
                        StageEvent::completed(Stage::Script, 1, started_at).with_detail(
                            serde_json::json!({
                                "source": "caller-supplied",
                                "title": script.title,
                                "scenes": script.scenes.len(),
                            }),
                        ),
                    )
                    .await?;
                Ok(script.clone())
            }
            Err(err) => {
                self.audit
                    .append(
                        run_id,
                        StageEvent::failed(Stage::Script, 1, started_at, err.to_string()),
                    )
                    .await?;
                Err(err)
            }
        }
    }

    /// Copy the user-supplied music file into the run's scratch area
    /// and record the substitution.
    async fn substitute_user_music(
        &self,
        run_id: &RunId,
        user_file: &std::path::Path,
    ) -> Result<Asset, PipelineError> {
        let started_at = Utc::now();
        let extension = user_file
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp3")
            .to_ascii_lowercase();
        let dest = self
            .store
            .allocate(run_id, Stage::Music, &format!("background.{extension}"))
            .await?;
        tokio::fs::copy(user_file, &dest).await?;

        tracing::info!(
            run_id = %run_id,
            file = %user_file.display(),
            "Using user-supplied background music",
        );
        self.audit
            .append(
                run_id,
                StageEvent::completed(Stage::Music, 1, started_at).with_detail(
                    serde_json::json!({
                        "source": "user-supplied",
                        "file": user_file.display().to_string(),
                    }),
                ),
            )
            .await?;

        Ok(Asset::new(AssetKind::AudioMusic, Stage::Music, None, dest))
    }

    // ---- failure paths ----

    /// Terminal handling for errors raised before the run object exists
    /// (input validation): seal the audit record and surface the error.
    async fn fail_before_start(&self, run_id: &RunId, err: PipelineError) -> PipelineError {
        tracing::error!(run_id = %run_id, error = %err, "Run rejected before start");
        if let Err(audit_err) = self
            .audit
            .finalize(
                run_id,
                RunStatus::Failed,
                Some(ErrorRecord {
                    kind: err.kind(),
                    message: err.to_string(),
                }),
            )
            .await
        {
            tracing::error!(run_id = %run_id, error = %audit_err, "Failed to seal audit record");
        }
        self.bus.publish(
            RunEvent::new(event_types::RUN_FINALIZED, run_id.clone())
                .with_payload(serde_json::json!({"status": "failed"})),
        );
        err
    }

    /// Terminal handling for a failed run: transition to `Failed`,
    /// remove scratch assets unconditionally, seal the audit record
    /// with the error, and surface it to the caller.
    async fn fail_run(&self, run: &mut Run, err: PipelineError) -> PipelineError {
        if run.state.can_transition(RunState::Failed) {
            let _ = run.advance(RunState::Failed);
        }
        run.status = RunStatus::Failed;

        let output_filename = naming::output_filename(None, &run.id);
        if let Err(store_err) = self
            .store
            .finalize(&run.id, RunStatus::Failed, None, &output_filename)
            .await
        {
            tracing::error!(run_id = %run.id, error = %store_err, "Scratch cleanup failed");
        }
        if let Err(audit_err) = self
            .audit
            .finalize(
                &run.id,
                RunStatus::Failed,
                Some(ErrorRecord {
                    kind: err.kind(),
                    message: err.to_string(),
                }),
            )
            .await
        {
            tracing::error!(run_id = %run.id, error = %audit_err, "Failed to seal audit record");
        }

        self.bus.publish(
            RunEvent::new(event_types::RUN_FINALIZED, run.id.clone())
                .with_payload(serde_json::json!({"status": "failed"})),
        );
        tracing::error!(run_id = %run.id, error = %err, "Run failed");
        err
    }

    fn publish_stage(&self, event_type: &str, run_id: &RunId, stage: Stage) {
        self.bus
            .publish(RunEvent::new(event_type, run_id.clone()).with_stage(stage));
    }
}

/// Validate caller inputs against the vocabularies. Fails fast with a
/// configuration error; no silent defaults.
fn validate_request(request: &RunRequest) -> Result<(Style, Mood), PipelineError> {
    if request.topic.trim().is_empty() && request.custom_script.is_none() {
        return Err(PipelineError::Configuration(
            "Topic must not be empty unless a script is supplied".to_string(),
        ));
    }
    let style = Style::from_name(&request.style)?;
    let mood = Mood::from_name(&request.mood)?;
    Ok((style, mood))
}
