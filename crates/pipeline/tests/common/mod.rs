//! In-memory collaborator doubles and harness shared by the
//! integration scenarios.
#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use reelforge_adapters::{
    AssemblyRequest, AssemblyService, ImageService, MusicService, RawScene, RawScript,
    ScriptRequest, ScriptService, ServiceError, SpeechService,
};
use reelforge_core::{Mood, PipelineConfig, RetryConfig, Scene, Script, Stage, Style};
use reelforge_pipeline::{Collaborators, Orchestrator, RunRequest};
use reelforge_store::{AuditRecord, StageEvent};

// ---------------------------------------------------------------------------
// Collaborator doubles
// ---------------------------------------------------------------------------

/// PNG magic header plus filler, enough to pass the header-level image
/// check.
pub fn png_bytes() -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(&[0u8; 64]);
    bytes
}

/// Script collaborator returning a fixed number of well-formed scenes.
pub struct StaticScript {
    pub scenes: usize,
}

#[async_trait]
impl ScriptService for StaticScript {
    async fn generate(&self, request: &ScriptRequest) -> Result<RawScript, ServiceError> {
        Ok(RawScript {
            title: Some(format!("Reel about {}", request.topic)),
            scenes: (0..self.scenes)
                .map(|i| RawScene {
                    visual_prompt: format!("scene {i} visual"),
                    text_overlay: Some(format!("overlay {i}")),
                    narration: Some(format!("narration line {i}")),
                    duration: Some(4.0),
                })
                .collect(),
        })
    }
}

/// Script collaborator that is permanently down; runs that bypass it
/// must still succeed.
pub struct DownScript;

#[async_trait]
impl ScriptService for DownScript {
    async fn generate(&self, _request: &ScriptRequest) -> Result<RawScript, ServiceError> {
        Err(ServiceError::Unreachable("script service down".into()))
    }
}

/// A well-formed pre-written script, as a caller would supply it.
pub fn custom_script(scenes: usize) -> Script {
    Script {
        title: "Prewritten Reel".into(),
        scenes: (0..scenes)
            .map(|i| Scene {
                index: i,
                visual_prompt: format!("custom visual {i}"),
                overlay_text: Some(format!("custom overlay {i}")),
                narration: format!("custom narration {i}"),
                duration_secs: 3.5,
            })
            .collect(),
    }
}

/// Image collaborator that fails transiently a configurable number of
/// times before succeeding. `u32::MAX` failures means "always down".
pub struct FlakyImages {
    remaining_failures: AtomicU32,
    pub calls: AtomicU32,
}

impl FlakyImages {
    pub fn reliable() -> Self {
        Self::failing(0)
    }

    pub fn failing(failures: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(failures),
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl ImageService for FlakyImages {
    async fn generate_image(
        &self,
        _prompt: &str,
        _style: Style,
        _mood: Mood,
    ) -> Result<Vec<u8>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.remaining_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            if remaining != u32::MAX {
                self.remaining_failures.fetch_sub(1, Ordering::SeqCst);
            }
            return Err(ServiceError::Unreachable("image service down".into()));
        }
        Ok(png_bytes())
    }
}

/// Speech collaborator returning fixed audio bytes.
pub struct StaticSpeech;

#[async_trait]
impl SpeechService for StaticSpeech {
    async fn synthesize(&self, _text: &str, _voice: &str) -> Result<Vec<u8>, ServiceError> {
        Ok(vec![7u8; 64])
    }
}

/// Music collaborator that counts how often it is invoked, so the
/// user-supplied substitution can assert it was bypassed.
#[derive(Default)]
pub struct CountingMusic {
    pub calls: AtomicU32,
}

#[async_trait]
impl MusicService for CountingMusic {
    async fn compose(&self, _mood: Mood, _duration_secs: f64) -> Result<Vec<u8>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![3u8; 64])
    }
}

/// Assembly collaborator that writes a small video file.
pub struct WriteVideo;

#[async_trait]
impl AssemblyService for WriteVideo {
    async fn render(&self, request: &AssemblyRequest) -> Result<(), ServiceError> {
        tokio::fs::write(&request.output_path, b"final video bytes").await?;
        Ok(())
    }
}

/// Assembly collaborator that is permanently down.
pub struct BrokenAssembly;

#[async_trait]
impl AssemblyService for BrokenAssembly {
    async fn render(&self, _request: &AssemblyRequest) -> Result<(), ServiceError> {
        Err(ServiceError::Failed("compositor crashed".into()))
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct TestHarness {
    pub orchestrator: Orchestrator,
    pub config: PipelineConfig,
    pub images: Arc<FlakyImages>,
    pub music: Arc<CountingMusic>,
}

/// Install the test tracing subscriber once; respects `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Harness with a well-behaved collaborator set.
pub fn harness(base: &Path, scenes: usize) -> TestHarness {
    harness_with(base, StaticScript { scenes }, FlakyImages::reliable())
}

/// Harness with custom script and image collaborators; retry delays
/// are shrunk to keep the scenarios fast.
pub fn harness_with(
    base: &Path,
    script: impl ScriptService + 'static,
    images: FlakyImages,
) -> TestHarness {
    init_tracing();
    let mut config = PipelineConfig::rooted_at(base);
    config.retry = RetryConfig {
        max_attempts: 3,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
        multiplier: 2.0,
    };

    let images = Arc::new(images);
    let music = Arc::new(CountingMusic::default());
    let collaborators = Collaborators {
        script: Arc::new(script),
        image: images.clone(),
        speech: Arc::new(StaticSpeech),
        music: music.clone(),
        assembly: Arc::new(WriteVideo),
    };

    TestHarness {
        orchestrator: Orchestrator::new(config.clone(), collaborators),
        config,
        images,
        music,
    }
}

/// Harness whose assembly collaborator is permanently down.
pub fn harness_with_broken_assembly(base: &Path, scenes: usize) -> TestHarness {
    init_tracing();
    let mut config = PipelineConfig::rooted_at(base);
    config.retry = RetryConfig {
        max_attempts: 3,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
        multiplier: 2.0,
    };

    let images = Arc::new(FlakyImages::reliable());
    let music = Arc::new(CountingMusic::default());
    let collaborators = Collaborators {
        script: Arc::new(StaticScript { scenes }),
        image: images.clone(),
        speech: Arc::new(StaticSpeech),
        music: music.clone(),
        assembly: Arc::new(BrokenAssembly),
    };

    TestHarness {
        orchestrator: Orchestrator::new(config.clone(), collaborators),
        config,
        images,
        music,
    }
}

/// A standard request for the canonical scenario topic.
pub fn request(auto_approve: bool) -> RunRequest {
    RunRequest {
        topic: "ocean waves and peace".into(),
        style: "cinematic".into(),
        mood: "calm".into(),
        auto_approve,
        output_name: None,
        custom_script: None,
    }
}

// ---------------------------------------------------------------------------
// Assertion helpers
// ---------------------------------------------------------------------------

/// Read the single persisted audit record under `logs_dir`.
pub async fn read_audit(logs_dir: &Path) -> AuditRecord {
    let mut entries = tokio::fs::read_dir(logs_dir).await.expect("logs dir missing");
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await.unwrap() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            paths.push(path);
        }
    }
    assert_eq!(paths.len(), 1, "expected exactly one audit record");
    let bytes = tokio::fs::read(&paths[0]).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// All stage events for one stage, in append order.
pub fn stage_events(record: &AuditRecord, stage: Stage) -> Vec<&StageEvent> {
    record.stages.iter().filter(|e| e.stage == stage).collect()
}

/// Number of entries in a directory; 0 when it does not exist.
pub async fn dir_file_count(dir: &Path) -> usize {
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return 0;
    };
    let mut count = 0;
    while let Ok(Some(_)) = entries.next_entry().await {
        count += 1;
    }
    count
}
