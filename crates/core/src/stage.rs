//! Pipeline stage identifiers.

use serde::{Deserialize, Serialize};

/// One step of the generation pipeline.
///
/// The order of the variants matches dependency order: `Script` gates
/// everything else, `Visual`/`Voice`/`Music` are mutually independent,
/// and `Assembly` consumes all of their outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Script,
    Visual,
    Voice,
    Music,
    Assembly,
}

impl Stage {
    /// All stages in dependency order.
    pub const ALL: &'static [Stage] = &[
        Stage::Script,
        Stage::Visual,
        Stage::Voice,
        Stage::Music,
        Stage::Assembly,
    ];

    /// Stable string name used in audit records, filenames, and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Script => "script",
            Stage::Visual => "visual",
            Stage::Voice => "voice",
            Stage::Music => "music",
            Stage::Assembly => "assembly",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
