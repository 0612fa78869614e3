//! Assembly stage: stitches scene images, narration, and music into
//! the final video via an external compositor.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use reelforge_core::{Asset, AssetKind, PipelineError, RenderSettings, Script, Stage};

use crate::adapter::{normalize, ServiceError, StageAdapter};

// ---------------------------------------------------------------------------
// Collaborator contract
// ---------------------------------------------------------------------------

/// Input for one assembly invocation: the script plus every upstream
/// asset, and the scratch location the video must be written to.
#[derive(Debug, Clone)]
pub struct AssemblyRequest {
    pub script: Script,
    /// One image asset per scene, in scene order.
    pub images: Vec<Asset>,
    pub voice: Asset,
    pub music: Asset,
    pub output_path: PathBuf,
    pub render: RenderSettings,
}

/// The external assembly collaborator. Writes the finished video to
/// `request.output_path`.
#[async_trait]
pub trait AssemblyService: Send + Sync {
    async fn render(&self, request: &AssemblyRequest) -> Result<(), ServiceError>;
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Wraps the assembly collaborator into the final video asset.
pub struct AssemblyAdapter {
    service: Arc<dyn AssemblyService>,
}

impl AssemblyAdapter {
    pub fn new(service: Arc<dyn AssemblyService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl StageAdapter for AssemblyAdapter {
    type Input = AssemblyRequest;
    type Output = Asset;

    fn stage(&self) -> Stage {
        Stage::Assembly
    }

    async fn invoke(&self, input: &AssemblyRequest) -> Result<Asset, PipelineError> {
        if input.images.len() != input.script.scenes.len() {
            return Err(PipelineError::InvalidStageOutput {
                stage: Stage::Assembly,
                message: format!(
                    "Expected {} scene images, got {}",
                    input.script.scenes.len(),
                    input.images.len()
                ),
            });
        }

        self.service
            .render(input)
            .await
            .map_err(|e| normalize(Stage::Assembly, e))?;

        // The collaborator reports success; make sure it actually
        // produced a file before anything downstream references it.
        let meta = tokio::fs::metadata(&input.output_path).await.map_err(|e| {
            PipelineError::InvalidStageOutput {
                stage: Stage::Assembly,
                message: format!("Collaborator produced no output file: {e}"),
            }
        })?;
        if meta.len() == 0 {
            return Err(PipelineError::InvalidStageOutput {
                stage: Stage::Assembly,
                message: "Collaborator produced an empty output file".to_string(),
            });
        }

        tracing::info!(
            scenes = input.script.scenes.len(),
            bytes = meta.len(),
            path = %input.output_path.display(),
            "Reel assembled",
        );

        Ok(Asset::new(
            AssetKind::Video,
            Stage::Assembly,
            None,
            input.output_path.clone(),
        ))
    }
}

// ---------------------------------------------------------------------------
// FFmpeg collaborator client
// ---------------------------------------------------------------------------

/// Drives the system `ffmpeg` binary: one looped image input per scene
/// with its duration, concatenated and mixed with the voice track and
/// volume-scaled music.
pub struct FfmpegAssemblyService {
    ffmpeg_bin: String,
}

impl FfmpegAssemblyService {
    pub fn new() -> Self {
        Self {
            ffmpeg_bin: "ffmpeg".to_string(),
        }
    }

    /// Use a specific ffmpeg binary instead of the one on `PATH`.
    pub fn with_binary(ffmpeg_bin: impl Into<String>) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
        }
    }
}

impl Default for FfmpegAssemblyService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssemblyService for FfmpegAssemblyService {
    async fn render(&self, request: &AssemblyRequest) -> Result<(), ServiceError> {
        let args = build_ffmpeg_args(request);
        tracing::debug!(args = ?args, "Invoking ffmpeg");

        let output = tokio::process::Command::new(&self.ffmpeg_bin)
            .args(&args)
            .output()
            .await
            .map_err(|e| {
                ServiceError::Unreachable(format!("ffmpeg binary not found: {e}"))
            })?;

        if !output.status.success() {
            return Err(ServiceError::Failed(format!(
                "ffmpeg exited with {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(())
    }
}

/// Build the full ffmpeg argument list for a request.
///
/// Input layout: scene images at indexes `0..n`, voice at `n`, music at
/// `n + 1`. Each image is normalized to the target frame, the scenes
/// are concatenated, and the two audio tracks are mixed with the music
/// faded and volume-scaled under the narration.
fn build_ffmpeg_args(request: &AssemblyRequest) -> Vec<String> {
    let render = &request.render;
    let n = request.script.scenes.len();
    let mut args: Vec<String> = vec!["-y".into()];

    for (scene, image) in request.script.scenes.iter().zip(&request.images) {
        args.extend([
            "-loop".into(),
            "1".into(),
            "-t".into(),
            format!("{:.3}", scene.duration_secs),
            "-i".into(),
            image.path.to_string_lossy().into_owned(),
        ]);
    }
    args.extend(["-i".into(), request.voice.path.to_string_lossy().into_owned()]);
    args.extend(["-i".into(), request.music.path.to_string_lossy().into_owned()]);

    let mut filter = String::new();
    for i in 0..n {
        filter.push_str(&format!(
            "[{i}:v]scale={w}:{h}:force_original_aspect_ratio=decrease,\
             pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={fps}[v{i}];",
            w = render.width,
            h = render.height,
            fps = render.fps,
        ));
    }
    for i in 0..n {
        filter.push_str(&format!("[v{i}]"));
    }
    filter.push_str(&format!("concat=n={n}:v=1:a=0[v];"));

    let fade_out_start =
        (request.script.total_duration_secs() - render.music_fade_out_secs).max(0.0);
    filter.push_str(&format!(
        "[{music}:a]volume={vol},afade=t=in:d={fade_in},afade=t=out:st={st:.3}:d={fade_out}[bg];",
        music = n + 1,
        vol = render.music_volume,
        fade_in = render.music_fade_in_secs,
        st = fade_out_start,
        fade_out = render.music_fade_out_secs,
    ));
    filter.push_str(&format!(
        "[{voice}:a][bg]amix=inputs=2:duration=first[a]",
        voice = n,
    ));

    args.extend(["-filter_complex".into(), filter]);
    args.extend([
        "-map".into(),
        "[v]".into(),
        "-map".into(),
        "[a]".into(),
        "-c:v".into(),
        render.video_codec.clone(),
        "-b:v".into(),
        render.video_bitrate.clone(),
        "-c:a".into(),
        render.audio_codec.clone(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-r".into(),
        render.fps.to_string(),
        "-shortest".into(),
        request.output_path.to_string_lossy().into_owned(),
    ]);
    args
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
