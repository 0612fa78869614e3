//! Music stage: background music collaborator wrapper and the
//! user-supplied music probe.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use reelforge_core::{Asset, AssetKind, Mood, PipelineError, Stage};

use crate::adapter::{ensure_success, normalize, ServiceError, StageAdapter};

/// Audio file extensions accepted from the user-supplied music directory.
const MUSIC_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "m4a"];

// ---------------------------------------------------------------------------
// Collaborator contract
// ---------------------------------------------------------------------------

/// Input for one music stage invocation.
#[derive(Debug, Clone)]
pub struct MusicRequest {
    pub mood: Mood,
    /// Target length: total scene duration plus fade-out headroom.
    pub duration_secs: f64,
    pub output_path: PathBuf,
}

/// The external music collaborator.
#[async_trait]
pub trait MusicService: Send + Sync {
    async fn compose(&self, mood: Mood, duration_secs: f64) -> Result<Vec<u8>, ServiceError>;
}

// ---------------------------------------------------------------------------
// User-supplied music probe
// ---------------------------------------------------------------------------

/// Look for a user-supplied music file in `music_dir`.
///
/// This is the capability check the orchestrator performs before
/// invoking the music adapter: when a file is present the collaborator
/// is bypassed entirely and the substitution is recorded in the audit
/// record. Candidates are sorted so the pick is deterministic.
pub async fn find_user_music(music_dir: &Path) -> Option<PathBuf> {
    let mut entries = tokio::fs::read_dir(music_dir).await.ok()?;
    let mut candidates = Vec::new();

    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| MUSIC_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if supported {
            candidates.push(path);
        }
    }

    candidates.sort();
    candidates.into_iter().next()
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Wraps the music collaborator into a single run-scoped music asset.
pub struct MusicAdapter {
    service: Arc<dyn MusicService>,
}

impl MusicAdapter {
    pub fn new(service: Arc<dyn MusicService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl StageAdapter for MusicAdapter {
    type Input = MusicRequest;
    type Output = Asset;

    fn stage(&self) -> Stage {
        Stage::Music
    }

    async fn invoke(&self, input: &MusicRequest) -> Result<Asset, PipelineError> {
        let bytes = self
            .service
            .compose(input.mood, input.duration_secs)
            .await
            .map_err(|e| normalize(Stage::Music, e))?;

        if bytes.is_empty() {
            return Err(PipelineError::InvalidStageOutput {
                stage: Stage::Music,
                message: "Music collaborator returned zero bytes".to_string(),
            });
        }

        tokio::fs::write(&input.output_path, &bytes).await?;
        tracing::info!(
            mood = %input.mood,
            duration_secs = input.duration_secs,
            "Background music composed",
        );

        Ok(Asset::new(
            AssetKind::AudioMusic,
            Stage::Music,
            None,
            input.output_path.clone(),
        ))
    }
}

// ---------------------------------------------------------------------------
// HTTP collaborator client
// ---------------------------------------------------------------------------

/// Client for a music collaborator answering raw audio bytes.
pub struct HttpMusicService {
    client: reqwest::Client,
    api_url: String,
}

impl HttpMusicService {
    pub fn new(api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
        }
    }
}

#[async_trait]
impl MusicService for HttpMusicService {
    async fn compose(&self, mood: Mood, duration_secs: f64) -> Result<Vec<u8>, ServiceError> {
        let body = serde_json::json!({
            "mood": mood.as_str(),
            "duration_secs": duration_secs,
        });

        let response = self.client.post(&self.api_url).json(&body).send().await?;
        let response = ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
