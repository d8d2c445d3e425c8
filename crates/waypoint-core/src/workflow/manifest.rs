//! YAML manifests: parsing, validation, and conversion to definitions.
//!
//! Executors are described as config in a manifest, so building a runnable
//! [`WorkflowDefinition`] takes a factory that turns each task's
//! [`ExecutorConfig`](waypoint_types::manifest::ExecutorConfig) into a
//! [`BoxTaskExecutor`]. The infra crate supplies the real one.

use std::collections::HashSet;
use std::time::Duration;

use thiserror::Error;
use waypoint_types::config::EngineConfig;
use waypoint_types::manifest::{GateManifest, ManifestStep, TaskManifest, WorkflowManifest};

use super::condition::Condition;
use super::definition::{DefinitionError, WorkflowDefinition};
use super::gate::{JsonSummarizer, TemplateSummarizer};
use super::step::{GateStep, TaskStep};
use super::task::BoxTaskExecutor;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid manifest: {0}")]
    Invalid(#[from] DefinitionError),

    #[error("cannot build executor for step '{step_id}': {message}")]
    Executor { step_id: String, message: String },
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse and validate a YAML manifest.
pub fn parse_manifest_yaml(yaml: &str) -> Result<WorkflowManifest, ManifestError> {
    let manifest: WorkflowManifest =
        serde_yaml_ng::from_str(yaml).map_err(|e| ManifestError::Parse(e.to_string()))?;
    validate_manifest(&manifest)?;
    Ok(manifest)
}

pub fn serialize_manifest_yaml(manifest: &WorkflowManifest) -> Result<String, ManifestError> {
    serde_yaml_ng::to_string(manifest).map_err(|e| ManifestError::Parse(e.to_string()))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Same structural rules as [`validate_definition`](super::definition::validate_definition).
///
/// Condition expressions are not parsed here; a malformed one fails open at
/// run time.
pub fn validate_manifest(manifest: &WorkflowManifest) -> Result<(), DefinitionError> {
    if manifest.name.trim().is_empty() {
        return Err(DefinitionError::EmptyName);
    }

    let mut seen = HashSet::new();
    for (index, step) in manifest.steps.iter().enumerate() {
        let id = step.id();
        if id.trim().is_empty() {
            return Err(DefinitionError::EmptyStepId(index));
        }
        if !seen.insert(id) {
            return Err(DefinitionError::DuplicateStepId(id.to_string()));
        }

        if let ManifestStep::Task(task) = step {
            if task.max_attempts == Some(0) {
                return Err(DefinitionError::ZeroAttempts(task.id.clone()));
            }
            if task.memory_key.trim().is_empty() {
                return Err(DefinitionError::EmptyMemoryKey(task.id.clone()));
            }
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

/// Convert a manifest into a runnable definition.
///
/// Tasks without `max_attempts` use `config.default_max_attempts`. Gates
/// without a summary template render the deliverable keys as JSON.
pub fn build_definition<F>(
    manifest: &WorkflowManifest,
    config: &EngineConfig,
    mut executor_for: F,
) -> Result<WorkflowDefinition, ManifestError>
where
    F: FnMut(&TaskManifest) -> Result<BoxTaskExecutor, ManifestError>,
{
    validate_manifest(manifest)?;

    let summary_keys = if manifest.deliverables.is_empty() {
        config.deliverable_keys.clone()
    } else {
        manifest.deliverables.clone()
    };

    let mut definition = WorkflowDefinition::new(&manifest.name)
        .version(&manifest.version)
        .description(manifest.description.clone().unwrap_or_default())
        .deliverables(manifest.deliverables.iter().cloned());

    for step in &manifest.steps {
        definition = match step {
            ManifestStep::Task(task) => {
                let executor = executor_for(task)?;
                definition.task(task_step(task, executor, config))
            }
            ManifestStep::Gate(gate) => definition.gate(gate_step(gate, &summary_keys)),
        };
    }

    Ok(definition)
}

fn task_step(task: &TaskManifest, executor: BoxTaskExecutor, config: &EngineConfig) -> TaskStep {
    let mut step = TaskStep::new(&task.id, &task.memory_key, executor)
        .description(task.description.clone().unwrap_or_default())
        .required(task.required)
        .max_attempts(task.max_attempts.unwrap_or(config.default_max_attempts));
    if let Some(secs) = task.timeout_secs {
        step = step.timeout(Duration::from_secs(secs));
    }
    if let Some(expr) = &task.condition {
        step = step.condition(Condition::expression(expr));
    }
    step
}

fn gate_step(gate: &GateManifest, summary_keys: &[String]) -> GateStep {
    let mut step = GateStep::new(&gate.id)
        .description(gate.description.clone().unwrap_or_default())
        .require_approval(gate.require_approval);
    step = match &gate.summary {
        Some(template) => step.summarizer(TemplateSummarizer::new(template)),
        None => step.summarizer(JsonSummarizer::new(summary_keys.iter().cloned())),
    };
    if let Some(expr) = &gate.condition {
        step = step.condition(Condition::expression(expr));
    }
    step
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
