//! Voice stage: narration TTS collaborator wrapper.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use reelforge_core::{Asset, AssetKind, PipelineError, Stage};

use crate::adapter::{ensure_success, normalize, ServiceError, StageAdapter};

// ---------------------------------------------------------------------------
// Collaborator contract
// ---------------------------------------------------------------------------

/// Input for one voice stage invocation: the script's full narration
/// text (scene narrations joined with pauses) and the target voice.
#[derive(Debug, Clone)]
pub struct VoiceRequest {
    pub narration: String,
    pub voice: String,
    pub output_path: PathBuf,
}

/// The external speech synthesis collaborator.
#[async_trait]
pub trait SpeechService: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>, ServiceError>;
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Wraps the speech collaborator into a single run-scoped voice asset.
pub struct VoiceAdapter {
    service: Arc<dyn SpeechService>,
}

impl VoiceAdapter {
    pub fn new(service: Arc<dyn SpeechService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl StageAdapter for VoiceAdapter {
    type Input = VoiceRequest;
    type Output = Asset;

    fn stage(&self) -> Stage {
        Stage::Voice
    }

    async fn invoke(&self, input: &VoiceRequest) -> Result<Asset, PipelineError> {
        // Assembly requires a non-empty voice asset; a script with no
        // narration at all fails here rather than there.
        if input.narration.trim().is_empty() {
            return Err(PipelineError::InvalidStageOutput {
                stage: Stage::Voice,
                message: "Script has no narration text".to_string(),
            });
        }

        let bytes = self
            .service
            .synthesize(&input.narration, &input.voice)
            .await
            .map_err(|e| normalize(Stage::Voice, e))?;

        if bytes.is_empty() {
            return Err(PipelineError::InvalidStageOutput {
                stage: Stage::Voice,
                message: "Speech collaborator returned zero bytes".to_string(),
            });
        }

        tokio::fs::write(&input.output_path, &bytes).await?;
        tracing::info!(
            chars = input.narration.len(),
            voice = %input.voice,
            "Narration synthesized",
        );

        Ok(Asset::new(
            AssetKind::AudioVoice,
            Stage::Voice,
            None,
            input.output_path.clone(),
        ))
    }
}

// ---------------------------------------------------------------------------
// HTTP collaborator client
// ---------------------------------------------------------------------------

/// Client for a speech collaborator answering raw audio bytes.
pub struct HttpSpeechService {
    client: reqwest::Client,
    api_url: String,
    /// Speaking rate adjustment passed through verbatim, e.g. `"-10%"`.
    rate: String,
    /// Pitch adjustment passed through verbatim, e.g. `"-5Hz"`.
    pitch: String,
}

impl HttpSpeechService {
    pub fn new(api_url: String, rate: String, pitch: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            rate,
            pitch,
        }
    }
}

#[async_trait]
impl SpeechService for HttpSpeechService {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>, ServiceError> {
        let body = serde_json::json!({
            "text": text,
            "voice": voice,
            "rate": self.rate,
            "pitch": self.pitch,
        });

        let response = self.client.post(&self.api_url).json(&body).send().await?;
        let response = ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
