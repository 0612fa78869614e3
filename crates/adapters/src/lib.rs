//! Stage adapters and collaborator clients.
//!
//! Each pipeline stage is an external collaborator wrapped by an
//! adapter implementing the uniform [`StageAdapter`] interface. The
//! adapter normalizes collaborator output into the shared data model
//! and translates collaborator-specific failures into the shared error
//! taxonomy; collaborator-native error shapes never cross the boundary.

pub mod adapter;
pub mod assembly;
pub mod music;
pub mod script;
pub mod visual;
pub mod voice;

pub use adapter::{ServiceError, StageAdapter};
pub use assembly::{AssemblyAdapter, AssemblyRequest, AssemblyService, FfmpegAssemblyService};
pub use music::{find_user_music, HttpMusicService, MusicAdapter, MusicRequest, MusicService};
pub use script::{HttpScriptService, RawScene, RawScript, ScriptAdapter, ScriptRequest, ScriptService};
pub use visual::{HttpImageService, ImageService, SceneTarget, VisualAdapter, VisualRequest};
pub use voice::{HttpSpeechService, SpeechService, VoiceAdapter, VoiceRequest};
