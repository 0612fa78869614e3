//! Intermediate asset references.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::stage::Stage;

/// What kind of file an asset points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Image,
    AudioVoice,
    AudioMusic,
    Video,
}

impl AssetKind {
    /// Stable string name used in audit records.
    pub fn as_str(self) -> &'static str {
        match self {
            AssetKind::Image => "image",
            AssetKind::AudioVoice => "audio_voice",
            AssetKind::AudioMusic => "audio_music",
            AssetKind::Video => "video",
        }
    }
}

/// Reference to one stage output file in the run's scratch area.
///
/// The asset store owns the underlying files; everything else (script,
/// run, audit record) holds references only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub kind: AssetKind,
    /// Stage that produced the file.
    pub stage: Stage,
    /// Owning scene for scene-scoped assets; `None` for run-scoped ones
    /// (voice, music, video).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_index: Option<usize>,
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
}

impl Asset {
    pub fn new(kind: AssetKind, stage: Stage, scene_index: Option<usize>, path: PathBuf) -> Self {
        Asset {
            kind,
            stage,
            scene_index,
            path,
            created_at: Utc::now(),
        }
    }
}
