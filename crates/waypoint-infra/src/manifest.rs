//! Manifest files on disk.

use std::path::{Path, PathBuf};

use thiserror::Error;
use waypoint_core::workflow::definition::WorkflowDefinition;
use waypoint_core::workflow::manifest::{ManifestError, build_definition, parse_manifest_yaml};
use waypoint_types::config::EngineConfig;
use waypoint_types::manifest::WorkflowManifest;

use crate::executor::build_executor;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{}: {source}", .path.display())]
    Manifest {
        path: PathBuf,
        source: ManifestError,
    },
}

/// Read, parse, and validate a manifest file.
pub async fn load_manifest(path: &Path) -> Result<WorkflowManifest, LoadError> {
    let yaml = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    let manifest = parse_manifest_yaml(&yaml).map_err(|source| LoadError::Manifest {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!(
        workflow = %manifest.name,
        steps = manifest.steps.len(),
        "loaded manifest from {}",
        path.display()
    );
    Ok(manifest)
}

/// Build a runnable definition from a manifest, wiring the infra executors.
pub fn runnable_definition(
    manifest: &WorkflowManifest,
    config: &EngineConfig,
) -> Result<WorkflowDefinition, ManifestError> {
    build_definition(manifest, config, |task| Ok(build_executor(&task.executor)))
}

/// [`load_manifest`] followed by [`runnable_definition`].
pub async fn load_definition(
    path: &Path,
    config: &EngineConfig,
) -> Result<WorkflowDefinition, LoadError> {
    let manifest = load_manifest(path).await?;
    runnable_definition(&manifest, config).map_err(|source| LoadError::Manifest {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, json};
    use tempfile::TempDir;
    use waypoint_core::workflow::engine::{RunMode, WorkflowEngine};
    use waypoint_types::workflow::{StepStatus, WorkflowStatus};

    const DRY_RUN: &str = r#"
name: dry-run
deliverables: [classification, draft]
steps:
  - type: task
    id: classify
    memory_key: classification
    executor:
      type: fixed
      confidence: 0.9
      output:
        area: labor
  - type: task
    id: research
    memory_key: research
    condition: "classification.area == 'civil'"
    executor:
      type: fixed
  - type: task
    id: draft
    memory_key: draft
    max_attempts: 2
    executor:
      type: fixed
      fail_attempts: 1
      output:
        text: "Petition"
  - type: gate
    id: review
    summary: "{{ draft.text }}"
"#;

    async fn write_manifest(dir: &TempDir, yaml: &str) -> PathBuf {
        let path = dir.path().join("workflow.yaml");
        tokio::fs::write(&path, yaml).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_load_and_run_manifest() {
        let tmp = TempDir::new().unwrap();
        let path = write_manifest(&tmp, DRY_RUN).await;

        let definition = load_definition(&path, &EngineConfig::default()).await.unwrap();
        let mut engine = WorkflowEngine::new(EngineConfig::default());
        engine.register(definition).unwrap();

        let result = engine
            .run("dry-run", Map::new(), RunMode::Autonomous)
            .await
            .unwrap();

        assert_eq!(result.status, WorkflowStatus::Completed);
        assert_eq!(result.trace.step("research").unwrap().status, StepStatus::Skipped);
        assert_eq!(result.trace.step("draft").unwrap().retry_count, 1);
        assert_eq!(result.trace.gates_approved(), 1);
        assert_eq!(
            result.final_output,
            serde_json::from_value::<Map<String, serde_json::Value>>(json!({
                "classification": { "area": "labor" },
                "draft": { "text": "Petition" },
            }))
            .unwrap()
        );
    }

    #[tokio::test]
    async fn test_missing_file() {
        let tmp = TempDir::new().unwrap();
        let err = load_manifest(&tmp.path().join("absent.yaml")).await.unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[tokio::test]
    async fn test_invalid_manifest_reports_path() {
        let tmp = TempDir::new().unwrap();
        let path = write_manifest(&tmp, "name: ''\nsteps: []\n").await;
        let err = load_manifest(&path).await.unwrap_err();
        assert!(matches!(err, LoadError::Manifest { .. }));
        assert!(err.to_string().contains("workflow.yaml"));
    }

    #[tokio::test]
    async fn test_bundled_petition_workflow_runs() {
        let manifest =
            parse_manifest_yaml(include_str!("../../../workflows/initial-petition.yaml")).unwrap();
        let definition = runnable_definition(&manifest, &EngineConfig::default()).unwrap();
        let mut engine = WorkflowEngine::new(EngineConfig::default());
        engine.register(definition).unwrap();

        let mut input = Map::new();
        input.insert("case".to_string(), json!("Dismissed after 5 years"));
        let result = engine
            .run("initial-petition", input, RunMode::Autonomous)
            .await
            .unwrap();

        assert_eq!(result.status, WorkflowStatus::Completed);
        assert_eq!(result.trace.step("research").unwrap().retry_count, 1);
        assert_eq!(
            result.trace.step("urgent_relief").unwrap().status,
            StepStatus::Skipped
        );
        assert_eq!(result.trace.gates_encountered(), 1);
        assert_eq!(result.final_output.len(), 5);
    }

    #[tokio::test]
    async fn test_bundled_appeal_workflow_runs_unattended() {
        let manifest =
            parse_manifest_yaml(include_str!("../../../workflows/ordinary-appeal.yaml")).unwrap();
        let definition = runnable_definition(&manifest, &EngineConfig::default()).unwrap();
        let mut engine = WorkflowEngine::new(EngineConfig::default());
        engine.register(definition).unwrap();

        let result = engine
            .run("ordinary-appeal", Map::new(), RunMode::Autonomous)
            .await
            .unwrap();

        assert_eq!(result.status, WorkflowStatus::Completed);
        assert_eq!(result.trace.gates_encountered(), 0);
        assert_eq!(result.trace.step("draft").unwrap().status, StepStatus::Completed);
        assert_eq!(result.final_output.len(), 4);
    }

    const REVIEW_GATE: &str = r#"
name: reviewed-draft
steps:
  - type: task
    id: draft
    memory_key: draft
    executor:
      type: fixed
      output:
        title: Initial Petition
  - type: task
    id: review
    memory_key: review
    required: false
    executor:
      type: fixed
      fail_attempts: 99
  - type: gate
    id: final_review
    condition: >-
      (review.recommendation || 'approve') == 'revise'
      || (review.score || 1.0) < 0.8
"#;

    #[tokio::test]
    async fn test_review_gate_skipped_when_review_never_written() {
        let tmp = TempDir::new().unwrap();
        let path = write_manifest(&tmp, REVIEW_GATE).await;
        let definition = load_definition(&path, &EngineConfig::default()).await.unwrap();
        let mut engine = WorkflowEngine::new(EngineConfig::default());
        engine.register(definition).unwrap();

        let result = engine
            .run("reviewed-draft", Map::new(), RunMode::Autonomous)
            .await
            .unwrap();

        assert_eq!(result.status, WorkflowStatus::Completed);
        assert_eq!(result.trace.step("review").unwrap().status, StepStatus::Failed);
        assert_eq!(
            result.trace.step("final_review").unwrap().status,
            StepStatus::Skipped
        );
        assert_eq!(result.trace.gates_encountered(), 0);
    }

    #[test]
    fn test_bundled_triage_workflow_is_valid() {
        let manifest = parse_manifest_yaml(include_str!("../../../workflows/triage.yaml")).unwrap();
        assert_eq!(manifest.steps.len(), 5);
        assert!(runnable_definition(&manifest, &EngineConfig::default()).is_ok());
    }
}
