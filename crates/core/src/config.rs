//! Immutable pipeline configuration.
//!
//! The orchestrator receives a [`PipelineConfig`] value at construction
//! instead of reading ambient process-wide state, so two concurrent
//! runs can safely use different configurations.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

// ---------------------------------------------------------------------------
// Style / mood vocabularies
// ---------------------------------------------------------------------------

/// Visual style tag for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Style {
    Cinematic,
    Dreamy,
    Documentary,
    Anime,
    Minimal,
    Neon,
}

impl Style {
    pub const ALL: &'static [Style] = &[
        Style::Cinematic,
        Style::Dreamy,
        Style::Documentary,
        Style::Anime,
        Style::Minimal,
        Style::Neon,
    ];

    /// Parse a caller-supplied tag. Unknown values are a configuration
    /// error, never a silent default.
    pub fn from_name(name: &str) -> Result<Self, PipelineError> {
        match name {
            "cinematic" => Ok(Style::Cinematic),
            "dreamy" => Ok(Style::Dreamy),
            "documentary" => Ok(Style::Documentary),
            "anime" => Ok(Style::Anime),
            "minimal" => Ok(Style::Minimal),
            "neon" => Ok(Style::Neon),
            other => Err(PipelineError::Configuration(format!(
                "Unknown style '{other}'. Must be one of: {}",
                names(Self::ALL.iter().map(|s| s.as_str()))
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Style::Cinematic => "cinematic",
            Style::Dreamy => "dreamy",
            Style::Documentary => "documentary",
            Style::Anime => "anime",
            Style::Minimal => "minimal",
            Style::Neon => "neon",
        }
    }
}

impl std::fmt::Display for Style {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emotional mood tag for a run. Drives the music stage and colors the
/// script/visual prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Inspirational,
    Nostalgic,
    Calm,
    Epic,
    Melancholic,
    Dreamy,
    Energetic,
}

impl Mood {
    pub const ALL: &'static [Mood] = &[
        Mood::Inspirational,
        Mood::Nostalgic,
        Mood::Calm,
        Mood::Epic,
        Mood::Melancholic,
        Mood::Dreamy,
        Mood::Energetic,
    ];

    /// Parse a caller-supplied tag. Unknown values are a configuration
    /// error, never a silent default.
    pub fn from_name(name: &str) -> Result<Self, PipelineError> {
        match name {
            "inspirational" => Ok(Mood::Inspirational),
            "nostalgic" => Ok(Mood::Nostalgic),
            "calm" => Ok(Mood::Calm),
            "epic" => Ok(Mood::Epic),
            "melancholic" => Ok(Mood::Melancholic),
            "dreamy" => Ok(Mood::Dreamy),
            "energetic" => Ok(Mood::Energetic),
            other => Err(PipelineError::Configuration(format!(
                "Unknown mood '{other}'. Must be one of: {}",
                names(Self::ALL.iter().map(|m| m.as_str()))
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mood::Inspirational => "inspirational",
            Mood::Nostalgic => "nostalgic",
            Mood::Calm => "calm",
            Mood::Epic => "epic",
            Mood::Melancholic => "melancholic",
            Mood::Dreamy => "dreamy",
            Mood::Energetic => "energetic",
        }
    }
}

impl std::fmt::Display for Mood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn names<'a>(iter: impl Iterator<Item = &'a str>) -> String {
    iter.collect::<Vec<_>>().join(", ")
}

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// Tunable parameters for the per-stage retry policy.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts per stage adapter call (including the
    /// first one).
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Render settings
// ---------------------------------------------------------------------------

/// Export profile for the assembled video.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    /// Frame width in pixels (vertical 9:16 by default).
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Output frame rate.
    pub fps: u32,
    /// Scene duration used when a collaborator omits one, in seconds.
    pub default_scene_duration_secs: f64,
    /// Crossfade between scenes, in seconds.
    pub crossfade_secs: f64,
    /// Background music volume relative to the voice track (0.0 to 1.0).
    pub music_volume: f64,
    /// Music fade-in length in seconds.
    pub music_fade_in_secs: f64,
    /// Music fade-out length in seconds.
    pub music_fade_out_secs: f64,
    /// Video codec passed to the assembly collaborator.
    pub video_codec: String,
    /// Audio codec passed to the assembly collaborator.
    pub audio_codec: String,
    /// Target video bitrate, e.g. `"8M"`.
    pub video_bitrate: String,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            fps: 30,
            default_scene_duration_secs: 5.0,
            crossfade_secs: 0.4,
            music_volume: 0.15,
            music_fade_in_secs: 1.0,
            music_fade_out_secs: 2.0,
            video_codec: "libx264".into(),
            audio_codec: "aac".into(),
            video_bitrate: "8M".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline configuration
// ---------------------------------------------------------------------------

/// Everything the orchestrator needs to run, fixed at construction.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root of the per-run scratch areas.
    pub scratch_dir: PathBuf,
    /// Permanent location for approved output videos.
    pub output_dir: PathBuf,
    /// Location for per-run audit record files.
    pub logs_dir: PathBuf,
    /// Directory probed for user-supplied background music.
    pub music_dir: PathBuf,
    /// Voice identifier handed to the speech collaborator.
    pub voice: String,
    pub retry: RetryConfig,
    pub render: RenderSettings,
}

impl PipelineConfig {
    /// Build a configuration with the conventional directory layout
    /// (`temp/`, `output/`, `logs/`, `assets/music/`) under `base`.
    pub fn rooted_at(base: &Path) -> Self {
        Self {
            scratch_dir: base.join("temp"),
            output_dir: base.join("output"),
            logs_dir: base.join("logs"),
            music_dir: base.join("assets").join("music"),
            voice: "en-US-AriaNeural".into(),
            retry: RetryConfig::default(),
            render: RenderSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn style_round_trips_every_name() {
        for style in Style::ALL {
            assert_eq!(Style::from_name(style.as_str()).unwrap(), *style);
        }
    }

    #[test]
    fn mood_round_trips_every_name() {
        for mood in Mood::ALL {
            assert_eq!(Mood::from_name(mood.as_str()).unwrap(), *mood);
        }
    }

    #[test]
    fn unknown_style_is_configuration_error() {
        let err = Style::from_name("vaporwave").unwrap_err();
        assert_matches!(err, PipelineError::Configuration(_));
        assert!(err.to_string().contains("cinematic"));
    }

    #[test]
    fn unknown_mood_is_configuration_error() {
        let err = Mood::from_name("furious").unwrap_err();
        assert_matches!(err, PipelineError::Configuration(_));
    }

    #[test]
    fn empty_tag_rejected() {
        assert!(Style::from_name("").is_err());
        assert!(Mood::from_name("").is_err());
    }

    #[test]
    fn retry_defaults() {
        let retry = RetryConfig::default();
        assert_eq!(retry.max_attempts, 3);
        assert_eq!(retry.initial_delay, Duration::from_secs(1));
        assert_eq!(retry.max_delay, Duration::from_secs(30));
    }

    #[test]
    fn render_defaults_are_vertical() {
        let render = RenderSettings::default();
        assert_eq!((render.width, render.height), (1080, 1920));
        assert!(render.music_volume > 0.0 && render.music_volume < 1.0);
    }

    #[test]
    fn rooted_at_uses_conventional_layout() {
        let config = PipelineConfig::rooted_at(Path::new("/srv/reels"));
        assert_eq!(config.scratch_dir, Path::new("/srv/reels/temp"));
        assert_eq!(config.output_dir, Path::new("/srv/reels/output"));
        assert_eq!(config.logs_dir, Path::new("/srv/reels/logs"));
        assert_eq!(config.music_dir, Path::new("/srv/reels/assets/music"));
    }
}
