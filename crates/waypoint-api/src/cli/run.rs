//! `wpt run`: load a manifest, run it, report the result.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Args;
use console::style;
use serde_json::{Map, Value};
use waypoint_core::workflow::engine::{RunMode, WorkflowEngine, WorkflowResult};
use waypoint_infra::config::{load_engine_config, resolve_config_path};
use waypoint_infra::manifest::load_definition;

use super::approval::ConsoleApproval;
use super::render;

/// Memory key that `--case` text is stored under.
pub const CASE_KEY: &str = "case";

#[derive(Args)]
pub struct RunArgs {
    /// Path to the workflow YAML file.
    pub manifest: PathBuf,

    /// JSON file whose top-level object seeds memory.
    #[arg(long, conflicts_with = "case")]
    pub input: Option<PathBuf>,

    /// Free-text case description, stored in memory under `case`.
    #[arg(long)]
    pub case: Option<String>,

    /// Stop at approval gates and ask on the terminal.
    #[arg(long)]
    pub interactive: bool,

    /// Write the full result as JSON to this file.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print only the execution trace as JSON.
    #[arg(long)]
    pub trace_only: bool,

    /// Engine config file (defaults to ~/.waypoint/waypoint.toml).
    #[arg(long, env = "WAYPOINT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Export workflow and step spans through OpenTelemetry to stdout.
    #[arg(long)]
    pub otel: bool,
}

/// Handle `wpt run`. Exits 0 only when the run completed.
pub async fn run_workflow(args: RunArgs, json: bool, quiet: bool) -> Result<ExitCode> {
    let result = execute(&args).await?;

    if args.trace_only {
        println!("{}", result.trace.to_json_pretty()?);
    } else if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if !quiet {
        render::print_run_summary(&result);
        if let Some(ref path) = args.output {
            println!("  Result written to {}", style(path.display()).cyan());
            println!();
        }
    }

    Ok(if result.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Load config and manifest, run the workflow, and write `--output`.
pub async fn execute(args: &RunArgs) -> Result<WorkflowResult> {
    let config_path = args.config.clone().unwrap_or_else(resolve_config_path);
    let config = load_engine_config(&config_path).await;

    let definition = load_definition(&args.manifest, &config)
        .await
        .with_context(|| format!("Failed to load workflow '{}'", args.manifest.display()))?;
    let name = definition.name.clone();

    let input = load_input(args.input.as_deref(), args.case.as_deref()).await?;
    let mode = RunMode::from_interactive(args.interactive || config.interactive);

    let mut engine = WorkflowEngine::new(config).with_approval_channel(ConsoleApproval);
    engine.register(definition)?;

    tracing::info!(workflow = %name, ?mode, "starting run");
    let result = engine.run(&name, input, mode).await?;

    if let Some(ref path) = args.output {
        write_result(path, &result).await?;
    }

    Ok(result)
}

/// Build the initial memory from `--input` or `--case`.
pub async fn load_input(input: Option<&Path>, case: Option<&str>) -> Result<Map<String, Value>> {
    if let Some(path) = input {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read input '{}'", path.display()))?;
        let value: Value = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid JSON in '{}'", path.display()))?;
        return match value {
            Value::Object(map) => Ok(map),
            _ => bail!("Input '{}' must contain a JSON object", path.display()),
        };
    }

    let mut memory = Map::new();
    if let Some(text) = case {
        memory.insert(CASE_KEY.to_string(), Value::String(text.to_string()));
    }
    Ok(memory)
}

async fn write_result(path: &Path, result: &WorkflowResult) -> Result<()> {
    let body = serde_json::to_string_pretty(result)?;
    tokio::fs::write(path, body)
        .await
        .with_context(|| format!("Failed to write result to '{}'", path.display()))?;
    tracing::debug!("wrote result to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"
name: dry-run
deliverables: [classification]
steps:
  - type: task
    id: classify
    memory_key: classification
    executor:
      type: fixed
      output: { area: labor }
"#;

    fn args(dir: &TempDir, manifest: &str) -> RunArgs {
        let manifest_path = dir.path().join("workflow.yaml");
        std::fs::write(&manifest_path, manifest).unwrap();
        RunArgs {
            manifest: manifest_path,
            input: None,
            case: Some("Dismissed after five years".to_string()),
            interactive: false,
            output: Some(dir.path().join("result.json")),
            trace_only: false,
            config: Some(dir.path().join("missing.toml")),
            otel: false,
        }
    }

    #[tokio::test]
    async fn test_case_text_seeds_memory() {
        let memory = load_input(None, Some("unpaid overtime")).await.unwrap();
        assert_eq!(memory[CASE_KEY], json!("unpaid overtime"));

        assert!(load_input(None, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_input_file_must_be_object() {
        let tmp = TempDir::new().unwrap();
        let good = tmp.path().join("good.json");
        tokio::fs::write(&good, r#"{"case": "text", "client": {"name": "Ana"}}"#)
            .await
            .unwrap();
        let memory = load_input(Some(&good), None).await.unwrap();
        assert_eq!(memory["client"]["name"], json!("Ana"));

        let bad = tmp.path().join("bad.json");
        tokio::fs::write(&bad, "[1, 2]").await.unwrap();
        let err = load_input(Some(&bad), None).await.unwrap_err();
        assert!(err.to_string().contains("must contain a JSON object"));
    }

    #[tokio::test]
    async fn test_run_writes_result() {
        let tmp = TempDir::new().unwrap();
        let run_args = args(&tmp, MANIFEST);
        let output = run_args.output.clone().unwrap();

        let result = execute(&run_args).await.unwrap();
        assert!(result.succeeded());

        let written: Value =
            serde_json::from_str(&tokio::fs::read_to_string(&output).await.unwrap()).unwrap();
        assert_eq!(written["status"], json!("completed"));
        assert_eq!(written["memory"]["case"], json!("Dismissed after five years"));
        assert_eq!(written["final_output"]["classification"]["area"], json!("labor"));
    }

    #[tokio::test]
    async fn test_failed_run_reports_error() {
        let tmp = TempDir::new().unwrap();
        let manifest = r#"
name: failing
steps:
  - type: task
    id: draft
    memory_key: draft
    executor:
      type: fixed
      fail_attempts: 1
      error: "model refused"
"#;
        let run_args = args(&tmp, manifest);
        let output = run_args.output.clone().unwrap();

        let result = execute(&run_args).await.unwrap();
        assert!(result.failed());

        let written: Value =
            serde_json::from_str(&tokio::fs::read_to_string(&output).await.unwrap()).unwrap();
        assert_eq!(written["status"], json!("failed"));
        assert!(written["error"].as_str().unwrap().contains("model refused"));
    }

    #[tokio::test]
    async fn test_missing_manifest_is_error() {
        let tmp = TempDir::new().unwrap();
        let mut run_args = args(&tmp, MANIFEST);
        run_args.manifest = tmp.path().join("absent.yaml");
        let err = execute(&run_args).await.unwrap_err();
        assert!(err.to_string().contains("Failed to load workflow"));
    }
}
