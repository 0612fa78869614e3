//! Script and scene data model plus the invariants the orchestrator
//! enforces on collaborator output.

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::stage::Stage;

/// Collaborators are expected to return this many scenes. Counts outside
/// the range are logged but only zero scenes is an invariant violation.
pub const EXPECTED_SCENES_MIN: usize = 3;
pub const EXPECTED_SCENES_MAX: usize = 6;

/// Pause inserted between scene narrations when building the combined
/// voiceover text; the ellipsis reads as a natural breath in TTS output.
const NARRATION_PAUSE: &str = " ... ";

/// One scene of the reel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    /// 0-based position; defines playback order.
    pub index: usize,
    /// Prompt handed to the visual collaborator. Never empty.
    pub visual_prompt: String,
    /// Short on-screen text, if any.
    pub overlay_text: Option<String>,
    /// Voiceover text for this scene. May be empty for silent scenes.
    pub narration: String,
    /// Target playback duration in seconds. Always positive.
    pub duration_secs: f64,
}

/// Ordered sequence of scenes produced once per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
    /// Display title from the script collaborator, used in logs and the
    /// audit record.
    pub title: String,
    pub scenes: Vec<Scene>,
}

impl Script {
    /// Total playback duration across all scenes, in seconds.
    pub fn total_duration_secs(&self) -> f64 {
        self.scenes.iter().map(|s| s.duration_secs).sum()
    }

    /// The full voiceover text: non-empty scene narrations joined with
    /// ellipsis pauses.
    pub fn full_narration(&self) -> String {
        self.scenes
            .iter()
            .map(|s| s.narration.trim())
            .filter(|n| !n.is_empty())
            .collect::<Vec<_>>()
            .join(NARRATION_PAUSE)
    }
}

/// Validate a script against the data-model invariants.
///
/// - At least one scene (zero scenes is invalid collaborator output).
/// - Scene indexes are 0-based and contiguous.
/// - Every scene has a non-empty visual prompt and a positive duration.
///
/// A scene count outside the expected 3–6 range is logged as a warning
/// but accepted.
pub fn validate_script(script: &Script) -> Result<(), PipelineError> {
    if script.scenes.is_empty() {
        return Err(PipelineError::InvalidStageOutput {
            stage: Stage::Script,
            message: "Script contains zero scenes".to_string(),
        });
    }

    if script.scenes.len() < EXPECTED_SCENES_MIN || script.scenes.len() > EXPECTED_SCENES_MAX {
        tracing::warn!(
            scenes = script.scenes.len(),
            "Script scene count outside the expected {EXPECTED_SCENES_MIN}-{EXPECTED_SCENES_MAX} range",
        );
    }

    for (i, scene) in script.scenes.iter().enumerate() {
        if scene.index != i {
            return Err(PipelineError::InvalidStageOutput {
                stage: Stage::Script,
                message: format!("Scene at position {i} has index {}", scene.index),
            });
        }
        if scene.visual_prompt.trim().is_empty() {
            return Err(PipelineError::InvalidStageOutput {
                stage: Stage::Script,
                message: format!("Scene {i} has an empty visual prompt"),
            });
        }
        if scene.duration_secs <= 0.0 {
            return Err(PipelineError::InvalidStageOutput {
                stage: Stage::Script,
                message: format!(
                    "Scene {i} has non-positive duration {}",
                    scene.duration_secs
                ),
            });
        }
    }

    Ok(())
}
