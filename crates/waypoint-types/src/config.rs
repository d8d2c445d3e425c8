//! Engine configuration types for Waypoint.
//!
//! `EngineConfig` is the `waypoint.toml` that controls engine-wide defaults.

use serde::{Deserialize, Serialize};

/// Engine-wide defaults.
///
/// Loaded from `waypoint.toml`. All fields have sensible defaults, so an
/// empty file (or no file at all) is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Attempts for task steps that do not declare `max_attempts`.
    #[serde(default = "default_max_attempts")]
    pub default_max_attempts: u32,

    /// Memory keys surfaced as a run's `final_output` when the workflow
    /// itself declares no deliverables.
    #[serde(default)]
    pub deliverable_keys: Vec<String>,

    /// Text shown in place of a gate summary when the summarizer fails.
    #[serde(default = "default_summary_placeholder")]
    pub summary_placeholder: String,

    /// Whether runs pause at approval gates unless told otherwise.
    #[serde(default)]
    pub interactive: bool,
}

fn default_max_attempts() -> u32 {
    1
}

fn default_summary_placeholder() -> String {
    "summary unavailable".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_max_attempts: default_max_attempts(),
            deliverable_keys: Vec::new(),
            summary_placeholder: default_summary_placeholder(),
            interactive: false,
        }
    }
}
