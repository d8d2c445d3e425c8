//! Declarative workflow manifest types.
//!
//! A manifest is the serializable form of a workflow: the same ordered step
//! list a programmatic definition holds, with executors described as config
//! and conditions written as JEXL expressions instead of closures.
//!
//! ```yaml
//! name: triage
//! version: "1.0"
//! deliverables: [classification, analysis]
//! steps:
//!   - type: task
//!     id: classify
//!     memory_key: classification
//!     max_attempts: 2
//!     executor:
//!       type: command
//!       program: ./agents/classify.sh
//!   - type: gate
//!     id: review
//!     summary: "Area: {{ classification.area }}"
//!     condition: "classification.urgency == 'urgent'"
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The canonical manifest for one workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowManifest {
    /// Registry name; `run` looks workflows up by this.
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Memory keys surfaced as the run's `final_output`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deliverables: Vec<String>,
    /// Steps in execution order.
    pub steps: Vec<ManifestStep>,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// One step of a manifest, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ManifestStep {
    Task(TaskManifest),
    Gate(GateManifest),
}

impl ManifestStep {
    pub fn id(&self) -> &str {
        match self {
            ManifestStep::Task(task) => &task.id,
            ManifestStep::Gate(gate) => &gate.id,
        }
    }

    pub fn condition(&self) -> Option<&str> {
        match self {
            ManifestStep::Task(task) => task.condition.as_deref(),
            ManifestStep::Gate(gate) => gate.condition.as_deref(),
        }
    }
}

/// A task step: run an executor, write its output under `memory_key`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskManifest {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub memory_key: String,
    pub executor: ExecutorConfig,
    #[serde(default = "default_required")]
    pub required: bool,
    /// Total attempts (1 = no retry). Falls back to the engine default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    /// Advisory; forwarded to the executor, never enforced by the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

fn default_required() -> bool {
    true
}

/// An approval gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateManifest {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Template with `{{ key.path }}` placeholders resolved against memory.
    /// When absent, the deliverable keys are rendered as JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default = "default_required")]
    pub require_approval: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// How a task step's executor is built, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutorConfig {
    /// Spawn a process; memory goes in on stdin as JSON, the outcome comes
    /// back on stdout as JSON.
    Command {
        program: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<String>,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        env: HashMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        working_dir: Option<String>,
    },
    /// Return a fixed output. Used for dry runs and demos.
    Fixed {
        #[serde(default)]
        output: Map<String, Value>,
        #[serde(default = "default_fixed_confidence")]
        confidence: f64,
        /// Fail this many leading attempts before succeeding.
        #[serde(default, skip_serializing_if = "is_zero")]
        fail_attempts: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

fn default_fixed_confidence() -> f64 {
    1.0
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

impl ExecutorConfig {
    /// Short label used as the executor name in traces.
    pub fn label(&self) -> String {
        match self {
            ExecutorConfig::Command { program, .. } => format!("command:{program}"),
            ExecutorConfig::Fixed { .. } => "fixed".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE: &str = r#"
name: petition
description: Full petition with review gate
deliverables: [classification, draft]
steps:
  - type: task
    id: classify
    memory_key: classification
    max_attempts: 2
    executor:
      type: command
      program: ./agents/classify.sh
      args: ["--fast"]
  - type: task
    id: draft
    memory_key: draft
    required: false
    condition: "classification.confidence >= 0.5"
    executor:
      type: fixed
      output:
        kind: petition
  - type: gate
    id: approval
    summary: "Area: {{ classification.area }}"
"#;

    #[test]
    fn test_manifest_yaml_defaults() {
        let manifest: WorkflowManifest = serde_yaml_ng::from_str(SAMPLE).unwrap();
        assert_eq!(manifest.name, "petition");
        assert_eq!(manifest.version, "1.0");
        assert_eq!(manifest.deliverables, vec!["classification", "draft"]);
        assert_eq!(manifest.steps.len(), 3);

        let ManifestStep::Task(classify) = &manifest.steps[0] else {
            panic!("expected task step");
        };
        assert!(classify.required);
        assert_eq!(classify.max_attempts, Some(2));
        assert_eq!(classify.executor.label(), "command:./agents/classify.sh");

        let ManifestStep::Task(draft) = &manifest.steps[1] else {
            panic!("expected task step");
        };
        assert!(!draft.required);
        assert_eq!(draft.condition.as_deref(), Some("classification.confidence >= 0.5"));
        match &draft.executor {
            ExecutorConfig::Fixed { output, confidence, fail_attempts, .. } => {
                assert_eq!(output["kind"], json!("petition"));
                assert_eq!(*confidence, 1.0);
                assert_eq!(*fail_attempts, 0);
            }
            other => panic!("expected fixed executor, got {other:?}"),
        }

        let ManifestStep::Gate(gate) = &manifest.steps[2] else {
            panic!("expected gate step");
        };
        assert!(gate.require_approval);
        assert_eq!(manifest.steps[2].id(), "approval");
        assert_eq!(manifest.steps[2].condition(), None);
    }

    #[test]
    fn test_unknown_step_type_rejected() {
        let yaml = r#"
name: bad
steps:
  - type: parallel
    id: fan-out
"#;
        assert!(serde_yaml_ng::from_str::<WorkflowManifest>(yaml).is_err());
    }
}
