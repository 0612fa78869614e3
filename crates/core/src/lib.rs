//! Domain model for the reel generation pipeline.
//!
//! This crate has zero internal dependencies so it can be used by the
//! store, adapter, and pipeline layers alike. It holds the run state
//! machine, the script/scene/asset data model, the shared error
//! taxonomy, and the immutable pipeline configuration.

pub mod asset;
pub mod config;
pub mod error;
pub mod naming;
pub mod run;
pub mod script;
pub mod stage;

pub use asset::{Asset, AssetKind};
pub use config::{Mood, PipelineConfig, RenderSettings, RetryConfig, Style};
pub use error::{ErrorKind, PipelineError};
pub use run::{Decision, Run, RunId, RunState, RunStatus};
pub use script::{Scene, Script};
pub use stage::Stage;
