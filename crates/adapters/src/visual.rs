//! Visual stage: per-scene image collaborator wrapper.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use reelforge_core::{Asset, AssetKind, Mood, PipelineError, Scene, Stage, Style};

use crate::adapter::{ensure_success, normalize, ServiceError, StageAdapter};

// ---------------------------------------------------------------------------
// Collaborator contract
// ---------------------------------------------------------------------------

/// One scene plus the scratch location its image must be written to.
#[derive(Debug, Clone)]
pub struct SceneTarget {
    pub scene: Scene,
    pub output_path: PathBuf,
}

/// Input for one visual stage invocation: the whole scene batch.
///
/// A single invocation covers every scene so that a successful run
/// records exactly one visual stage event; the collaborator is called
/// once per scene inside it, and a retried invocation rewrites the same
/// pre-allocated paths.
#[derive(Debug, Clone)]
pub struct VisualRequest {
    pub style: Style,
    pub mood: Mood,
    pub targets: Vec<SceneTarget>,
}

/// The external image collaborator.
#[async_trait]
pub trait ImageService: Send + Sync {
    /// Produce one image for a scene's visual prompt.
    async fn generate_image(
        &self,
        prompt: &str,
        style: Style,
        mood: Mood,
    ) -> Result<Vec<u8>, ServiceError>;
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Wraps the image collaborator: one image asset per scene, with the
/// payload header-checked as an actual image before it is written.
pub struct VisualAdapter {
    service: Arc<dyn ImageService>,
}

impl VisualAdapter {
    pub fn new(service: Arc<dyn ImageService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl StageAdapter for VisualAdapter {
    type Input = VisualRequest;
    type Output = Vec<Asset>;

    fn stage(&self) -> Stage {
        Stage::Visual
    }

    async fn invoke(&self, input: &VisualRequest) -> Result<Vec<Asset>, PipelineError> {
        let mut assets = Vec::with_capacity(input.targets.len());

        for target in &input.targets {
            let index = target.scene.index;
            let bytes = self
                .service
                .generate_image(&target.scene.visual_prompt, input.style, input.mood)
                .await
                .map_err(|e| normalize(Stage::Visual, e))?;

            if bytes.is_empty() || image::guess_format(&bytes).is_err() {
                return Err(PipelineError::InvalidStageOutput {
                    stage: Stage::Visual,
                    message: format!("Scene {index} payload is not a recognized image"),
                });
            }

            tokio::fs::write(&target.output_path, &bytes).await?;
            tracing::debug!(scene = index, path = %target.output_path.display(), "Scene image written");

            assets.push(Asset::new(
                AssetKind::Image,
                Stage::Visual,
                Some(index),
                target.output_path.clone(),
            ));
        }

        tracing::info!(images = assets.len(), "Scene visuals generated");
        Ok(assets)
    }

    fn annotations(&self, output: &Vec<Asset>) -> Option<serde_json::Value> {
        Some(serde_json::json!({ "images": output.len() }))
    }
}

// ---------------------------------------------------------------------------
// HTTP collaborator client
// ---------------------------------------------------------------------------

/// Client for an image collaborator that renders a prompt passed via
/// query parameters and answers with raw image bytes.
pub struct HttpImageService {
    client: reqwest::Client,
    api_url: String,
    width: u32,
    height: u32,
}

impl HttpImageService {
    /// * `api_url` - base generation endpoint URL.
    pub fn new(api_url: String, width: u32, height: u32) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            width,
            height,
        }
    }
}

#[async_trait]
impl ImageService for HttpImageService {
    async fn generate_image(
        &self,
        prompt: &str,
        style: Style,
        mood: Mood,
    ) -> Result<Vec<u8>, ServiceError> {
        let full_prompt = format!("{prompt}, {style} style, {mood} mood, vertical 9:16");
        // Fresh seed per request so a retry produces a new render.
        let seed = (uuid::Uuid::new_v4().as_u128() as u32).to_string();
        let width = self.width.to_string();
        let height = self.height.to_string();

        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("prompt", full_prompt.as_str()),
                ("width", width.as_str()),
                ("height", height.as_str()),
                ("seed", seed.as_str()),
            ])
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let bytes = response.bytes().await?;

        if !content_type.contains("image") {
            return Err(ServiceError::Malformed(format!(
                "expected an image payload, got content type '{content_type}'"
            )));
        }
        Ok(bytes.to_vec())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
