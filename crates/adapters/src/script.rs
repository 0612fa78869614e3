//! Script stage: LLM collaborator wrapper and output normalization.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use reelforge_core::script::validate_script;
use reelforge_core::{Mood, PipelineError, Scene, Script, Stage, Style};

use crate::adapter::{ensure_success, normalize, ServiceError, StageAdapter};

// ---------------------------------------------------------------------------
// Collaborator contract
// ---------------------------------------------------------------------------

/// Input for one script generation call.
#[derive(Debug, Clone)]
pub struct ScriptRequest {
    pub topic: String,
    pub style: Style,
    pub mood: Mood,
}

/// Raw script payload as returned by the collaborator, before
/// normalization into the shared data model.
#[derive(Debug, Clone, Deserialize)]
pub struct RawScript {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub scenes: Vec<RawScene>,
}

/// One raw scene from the collaborator.
#[derive(Debug, Clone, Deserialize)]
pub struct RawScene {
    pub visual_prompt: String,
    #[serde(default)]
    pub text_overlay: Option<String>,
    #[serde(default)]
    pub narration: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
}

/// The external script collaborator.
#[async_trait]
pub trait ScriptService: Send + Sync {
    async fn generate(&self, request: &ScriptRequest) -> Result<RawScript, ServiceError>;
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Wraps the script collaborator and enforces the script invariants.
pub struct ScriptAdapter {
    service: Arc<dyn ScriptService>,
    /// Fallback duration for scenes the collaborator returns without one.
    default_scene_duration_secs: f64,
}

impl ScriptAdapter {
    pub fn new(service: Arc<dyn ScriptService>, default_scene_duration_secs: f64) -> Self {
        Self {
            service,
            default_scene_duration_secs,
        }
    }

    /// Normalize a raw collaborator script: 0-based contiguous indexes
    /// in payload order, default durations filled in, blank overlays
    /// dropped.
    fn normalize_raw(&self, raw: RawScript) -> Script {
        let scenes = raw
            .scenes
            .into_iter()
            .enumerate()
            .map(|(index, raw_scene)| Scene {
                index,
                visual_prompt: raw_scene.visual_prompt.trim().to_string(),
                overlay_text: raw_scene
                    .text_overlay
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty()),
                narration: raw_scene.narration.unwrap_or_default().trim().to_string(),
                duration_secs: raw_scene
                    .duration
                    .unwrap_or(self.default_scene_duration_secs),
            })
            .collect();

        Script {
            title: raw
                .title
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Untitled".to_string()),
            scenes,
        }
    }
}

#[async_trait]
impl StageAdapter for ScriptAdapter {
    type Input = ScriptRequest;
    type Output = Script;

    fn stage(&self) -> Stage {
        Stage::Script
    }

    async fn invoke(&self, input: &ScriptRequest) -> Result<Script, PipelineError> {
        let raw = self
            .service
            .generate(input)
            .await
            .map_err(|e| normalize(Stage::Script, e))?;

        let script = self.normalize_raw(raw);
        validate_script(&script)?;

        tracing::info!(
            title = %script.title,
            scenes = script.scenes.len(),
            total_secs = script.total_duration_secs(),
            "Script generated",
        );
        Ok(script)
    }

    fn annotations(&self, output: &Script) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "title": output.title,
            "scenes": output.scenes.len(),
        }))
    }
}

// ---------------------------------------------------------------------------
// HTTP collaborator client
// ---------------------------------------------------------------------------

/// Instructs the model to answer with the raw script JSON and nothing
/// else. Fenced output is tolerated anyway (see [`strip_code_fence`]).
const SYSTEM_PROMPT: &str = "You write scripts for short-form vertical video. \
Respond with ONLY a JSON object of the form \
{\"title\": string, \"scenes\": [{\"visual_prompt\": string, \
\"text_overlay\": string, \"narration\": string, \"duration\": number}]} \
with 3 to 6 scenes of 3-5 seconds each.";

/// Chat-completions style client for an LLM script collaborator.
pub struct HttpScriptService {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

impl HttpScriptService {
    /// * `api_url` - full chat-completions endpoint URL.
    /// * `model`   - model identifier passed through to the service.
    pub fn new(api_url: String, api_key: Option<String>, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl ScriptService for HttpScriptService {
    async fn generate(&self, request: &ScriptRequest) -> Result<RawScript, ServiceError> {
        let user_prompt = format!(
            "Create a reel script about: {}\nVisual style: {}\nMood: {}",
            request.topic, request.style, request.mood
        );

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user_prompt},
            ],
            "temperature": 0.85,
        });

        let mut http_request = self.client.post(&self.api_url).json(&body);
        if let Some(key) = &self.api_key {
            http_request = http_request.bearer_auth(key);
        }

        let response = ensure_success(http_request.send().await?).await?;
        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Malformed(format!("chat response: {e}")))?;

        let content = chat
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| ServiceError::Malformed("chat response has no choices".into()))?;

        serde_json::from_str(strip_code_fence(content))
            .map_err(|e| ServiceError::Malformed(format!("script JSON: {e}")))
    }
}

/// Strip a Markdown code fence around a JSON payload, tolerating an
/// optional `json` language tag. Models wrap their output this way
/// often enough that the original treated it as a first-class case.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
